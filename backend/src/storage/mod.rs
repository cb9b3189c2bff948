//! Storage layer: trait abstractions plus the file-based implementation.

pub mod csv;
pub mod traits;

pub use traits::{AttendanceStorage, ChildStorage};
