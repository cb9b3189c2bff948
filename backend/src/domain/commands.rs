//! Domain-level command and query types.
//!
//! These structs are used by services inside the domain layer and are **not**
//! exposed over the public API. The REST layer is responsible for mapping the
//! public DTOs defined in the `shared` crate to these internal types.

pub mod child {
    use crate::domain::models::child::Child;

    /// Input for registering a new child.
    #[derive(Debug, Clone)]
    pub struct RegisterChildCommand {
        pub first_name: String,
        pub last_name: String,
        /// Birthdate in YYYY-MM-DD format
        pub birthdate: String,
        pub authorized_releasers: Vec<String>,
        pub allergies: Option<String>,
        pub medical_notes: Option<String>,
        /// Explicit token; one is generated when absent.
        pub barcode_id: Option<String>,
    }

    /// Input for editing a child. `None` fields are left unchanged.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateChildCommand {
        pub child_id: String,
        pub first_name: Option<String>,
        pub last_name: Option<String>,
        pub birthdate: Option<String>,
        pub authorized_releasers: Option<Vec<String>>,
        pub allergies: Option<String>,
        pub medical_notes: Option<String>,
    }

    #[derive(Debug, Clone)]
    pub struct GetChildCommand {
        pub child_id: String,
    }

    #[derive(Debug, Clone)]
    pub struct DeactivateChildCommand {
        pub child_id: String,
    }

    #[derive(Debug, Clone)]
    pub struct RegisterChildResult {
        pub child: Child,
    }

    #[derive(Debug, Clone)]
    pub struct UpdateChildResult {
        pub child: Child,
    }

    #[derive(Debug, Clone)]
    pub struct GetChildResult {
        pub child: Option<Child>,
    }

    #[derive(Debug, Clone)]
    pub struct ListChildrenResult {
        pub children: Vec<Child>,
    }

    #[derive(Debug, Clone)]
    pub struct DeactivateChildResult {
        pub child: Child,
        pub success_message: String,
    }
}

pub mod attendance {
    use crate::domain::models::attendance::AttendanceEvent;
    use chrono::NaiveDate;

    /// Input for processing a barcode scan.
    ///
    /// The verification engine decides drop-off vs pickup from the day's
    /// ledger state; the command only supplies who is acting and whether a
    /// staff-confirmed override accompanies the request.
    #[derive(Debug, Clone)]
    pub struct ProcessScanCommand {
        pub barcode_id: String,
        pub date: NaiveDate,
        /// Name of the adult dropping off or requesting pickup.
        pub actor_name: String,
        pub override_requested: bool,
        /// Acting staff identity, taken from the verified auth token.
        /// Required when `override_requested` is true.
        pub verified_by: Option<String>,
    }

    /// Query for a child's attendance history over a date range.
    #[derive(Debug, Clone)]
    pub struct HistoryQuery {
        pub child_id: String,
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    #[derive(Debug, Clone)]
    pub struct AttendanceDayResult {
        pub date: NaiveDate,
        pub events: Vec<AttendanceEvent>,
    }
}
