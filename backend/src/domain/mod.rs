//! # Domain Module
//!
//! Business logic for the junior-church check-in system.
//!
//! The safety-critical piece is the check-in/check-out protocol in
//! `attendance_service`: barcode scans resolve to a registered child, the
//! day's ledger state decides drop-off vs pickup, and pickups by people not
//! on the child's authorized releaser list require an explicit,
//! staff-verified override that is always audited.
//!
//! ## Module Organization
//!
//! - **child_service**: registry operations (register, edit, deactivate) and
//!   barcode resolution
//! - **attendance_service**: the verification engine and ledger queries
//! - **commands**: internal command/result types used between the REST layer
//!   and the services
//! - **models**: domain entities and the attendance error taxonomy

pub mod attendance_service;
pub mod child_service;
pub mod commands;
pub mod models;

pub use attendance_service::AttendanceService;
pub use child_service::ChildService;
