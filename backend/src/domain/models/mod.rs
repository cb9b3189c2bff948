//! Domain models for the junior-church check-in system.

pub mod attendance;
pub mod child;
