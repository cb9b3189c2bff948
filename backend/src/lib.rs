//! # Junior Church Backend
//!
//! Check-in/check-out service for a junior-church program: a child registry
//! with barcode resolution, an append-style attendance ledger, and the
//! verification engine that guards pickups against each child's authorized
//! releaser list.

use anyhow::Result;
use std::sync::Arc;

pub mod auth;
pub mod domain;
pub mod rest;
pub mod storage;

pub use storage::csv::CsvConnection;

/// Main backend struct that orchestrates all services
pub struct Backend {
    pub connection: Arc<CsvConnection>,
    pub child_service: domain::ChildService,
    pub attendance_service: domain::AttendanceService,
}

impl Backend {
    /// Create a backend over the given data directory connection
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        let child_service = domain::ChildService::new(connection.clone());
        let attendance_service =
            domain::AttendanceService::new(connection.clone(), child_service.clone());

        Backend {
            connection,
            child_service,
            attendance_service,
        }
    }

    /// Create a backend using the default data directory
    pub fn new_default() -> Result<Self> {
        let connection = Arc::new(CsvConnection::new_default()?);
        Ok(Self::new(connection))
    }
}
