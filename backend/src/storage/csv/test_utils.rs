//! Test utilities for storage-backed tests.
//!
//! Provides RAII-based cleanup that guarantees test data is removed even if
//! tests panic or fail.

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;

use super::attendance_repository::AttendanceRepository;
use super::child_repository::ChildRepository;
use super::connection::CsvConnection;

/// Test environment with a temporary data directory that is cleaned up when
/// dropped.
pub struct TestEnvironment {
    pub connection: Arc<CsvConnection>,
    /// Base directory path for manual inspection if needed
    pub base_path: std::path::PathBuf,
    _temp_dir: TempDir, // Keep alive to prevent cleanup
}

impl TestEnvironment {
    /// Create a new test environment with a temporary directory
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let connection = Arc::new(CsvConnection::new(temp_dir.path())?);
        Ok(Self {
            connection,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        })
    }

    pub fn child_repository(&self) -> ChildRepository {
        ChildRepository::new(self.connection.clone())
    }

    pub fn attendance_repository(&self) -> AttendanceRepository {
        AttendanceRepository::new(self.connection.clone())
    }
}
