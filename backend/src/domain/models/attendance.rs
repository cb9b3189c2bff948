//! Domain model for attendance events.
//!
//! One event per child per calendar day. Events are created on drop-off,
//! mutated exactly once on pickup, and immutable thereafter, so the ledger
//! doubles as the audit trail.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an attendance event for a given day.
///
/// The per-day state machine is `none -> DroppedOff -> PickedUp`, with
/// `PickedUp` terminal. `NoShow` is representable for roster reconciliation
/// but is never produced by the scan flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    DroppedOff,
    PickedUp,
    NoShow,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::DroppedOff => "dropped_off",
            AttendanceStatus::PickedUp => "picked_up",
            AttendanceStatus::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dropped_off" => Some(AttendanceStatus::DroppedOff),
            "picked_up" => Some(AttendanceStatus::PickedUp),
            "no_show" => Some(AttendanceStatus::NoShow),
            _ => None,
        }
    }
}

/// A single drop-off/pickup record for one child on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: String,
    pub child_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub dropoff_time: DateTime<Utc>,
    /// Free-text name of the adult who dropped the child off. No
    /// authorization check applies to drop-off.
    pub dropoff_by: String,
    pub pickup_time: Option<DateTime<Utc>>,
    pub picked_up_by: Option<String>,
    /// True when the pickup person was not on the authorized list and a
    /// staff member explicitly confirmed the release.
    pub override_used: bool,
    /// Staff identity that confirmed an override. Required whenever
    /// `override_used` is true.
    pub verified_by: Option<String>,
}

impl AttendanceEvent {
    /// Generate a unique ID for an attendance event
    pub fn generate_id() -> String {
        format!("attendance::{}", Uuid::new_v4())
    }

    /// Create a new open event recording a drop-off.
    pub fn new_dropoff(child_id: &str, date: NaiveDate, dropoff_by: &str) -> Self {
        Self {
            id: Self::generate_id(),
            child_id: child_id.to_string(),
            date,
            status: AttendanceStatus::DroppedOff,
            dropoff_time: Utc::now(),
            dropoff_by: dropoff_by.trim().to_string(),
            pickup_time: None,
            picked_up_by: None,
            override_used: false,
            verified_by: None,
        }
    }

    /// An open event is awaiting pickup.
    pub fn is_open(&self) -> bool {
        self.status == AttendanceStatus::DroppedOff
    }
}

/// Outcome of a successfully processed scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    DroppedOff {
        event: AttendanceEvent,
    },
    PickedUp {
        event: AttendanceEvent,
        was_override: bool,
    },
    /// The pickup person is not on the authorized list and no override was
    /// requested. Nothing was mutated; the caller must confirm with staff
    /// and re-submit with the override flag set.
    RequiresOverride {
        authorized_releasers: Vec<String>,
    },
}

/// Error taxonomy for the check-in/check-out protocol.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("No active child matches barcode '{0}'")]
    UnknownBarcode(String),
    #[error("Child has already been picked up today")]
    AlreadyPickedUp,
    #[error("A concurrent scan updated this child's attendance; please retry")]
    ConcurrencyConflict,
    #[error("An override pickup requires an acting staff identity")]
    MissingVerifier,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AttendanceStatus::DroppedOff,
            AttendanceStatus::PickedUp,
            AttendanceStatus::NoShow,
        ] {
            assert_eq!(AttendanceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttendanceStatus::parse("checked_in"), None);
    }

    #[test]
    fn test_new_dropoff_is_open() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let event = AttendanceEvent::new_dropoff("child::1", date, "  Sarah Johnson ");

        assert!(event.is_open());
        assert_eq!(event.dropoff_by, "Sarah Johnson");
        assert_eq!(event.pickup_time, None);
        assert!(!event.override_used);
        assert!(event.id.starts_with("attendance::"));
    }
}
