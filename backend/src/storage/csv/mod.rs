//! # File-based Storage Module
//!
//! Storage implementation backed by plain files under a single data
//! directory. Each child owns one directory keyed by their barcode token:
//!
//! ```text
//! <data dir>/
//!   JC2024001/
//!     child.yaml       — the registry record
//!     attendance.csv   — the per-child attendance ledger
//!   staff.yaml         — bearer tokens for the auth verifier
//! ```
//!
//! Ledger files have the following structure:
//! ```csv
//! id,child_id,date,status,dropoff_time,dropoff_by,pickup_time,picked_up_by,override_used,verified_by
//! attendance::9f0c...,child::1710000000000,2024-03-10,picked_up,2024-03-10T09:01:12Z,Sarah Johnson,2024-03-10T11:32:40Z,Mike Johnson,false,
//! ```
//!
//! All writes are atomic (temp file + rename) so a half-written transition
//! can never be observed.

pub mod attendance_repository;
pub mod child_repository;
pub mod connection;

#[cfg(test)]
pub mod test_utils;

pub use attendance_repository::AttendanceRepository;
pub use child_repository::ChildRepository;
pub use connection::CsvConnection;
