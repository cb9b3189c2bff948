use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// CsvConnection manages file paths under the data directory and hands out
/// the per-child scan locks that serialize read-decide-write sequences.
#[derive(Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
    /// One mutex per child id, created lazily on first scan. Holding a
    /// child's lock across the whole read-decide-write sequence is what
    /// keeps two stations from both recording a drop-off or a pickup.
    scan_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl CsvConnection {
    /// Create a new CSV connection with a base directory
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self {
            base_directory: base_path,
            scan_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Create a connection in the default data directory,
    /// honouring the JUNIOR_CHURCH_DATA_DIR environment variable.
    pub fn new_default() -> Result<Self> {
        if let Ok(dir) = std::env::var("JUNIOR_CHURCH_DATA_DIR") {
            info!("Using data directory from environment: {}", dir);
            return Self::new(PathBuf::from(dir));
        }

        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;

        let data_dir = PathBuf::from(home_dir)
            .join("Documents")
            .join("Junior Church");
        info!("Using default data directory: {}", data_dir.display());
        Self::new(data_dir)
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Get the directory holding a child's data. Directories are keyed by
    /// the barcode token: unique, immutable, and filesystem safe.
    pub fn get_child_directory(&self, barcode_id: &str) -> PathBuf {
        self.base_directory.join(barcode_id)
    }

    /// Path to a child's attendance ledger file
    pub fn get_attendance_file_path(&self, barcode_id: &str) -> PathBuf {
        self.get_child_directory(barcode_id).join("attendance.csv")
    }

    /// Path to the staff token file used by the auth verifier
    pub fn get_staff_file_path(&self) -> PathBuf {
        self.base_directory.join("staff.yaml")
    }

    /// Get (or create) the scan lock for a child
    pub fn child_scan_lock(&self, child_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.scan_locks.lock().unwrap();
        locks
            .entry(child_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
