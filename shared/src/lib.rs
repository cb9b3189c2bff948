use serde::{Deserialize, Serialize};

/// Public representation of a registered child.
///
/// Dates travel as strings on the wire: `date_of_birth` is `YYYY-MM-DD`,
/// timestamps are RFC 3339. The domain layer owns the typed versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildDto {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    /// Birthdate in YYYY-MM-DD format (age is derived, never stored)
    pub date_of_birth: String,
    /// Ordered list of full names permitted to pick the child up
    pub authorized_releasers: Vec<String>,
    /// Advisory free text
    pub allergies: Option<String>,
    /// Advisory free text
    pub medical_notes: Option<String>,
    /// Unique scan token assigned at registration
    pub barcode_id: String,
    pub is_active: bool,
}

/// Request body for registering a new child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterChildRequest {
    pub first_name: String,
    pub last_name: String,
    /// Birthdate in YYYY-MM-DD format
    pub date_of_birth: String,
    /// Must be non-empty at registration time
    pub authorized_releasers: Vec<String>,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    /// Optional explicit token; one is generated when absent
    pub barcode_id: Option<String>,
}

/// Request body for editing a child. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChildRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub authorized_releasers: Option<Vec<String>>,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildListResponse {
    pub children: Vec<ChildDto>,
}

/// The scan action, modelled as a tagged union so each variant carries
/// exactly the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ScanAction {
    Dropoff,
    Pickup {
        /// Staff-confirmed exception for an unlisted pickup person
        #[serde(default, rename = "override")]
        override_requested: bool,
    },
}

/// Request body for POST /junior-church/attendance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceScanRequest {
    pub barcode_id: String,
    /// Name of the adult dropping off or requesting pickup
    pub person_name: String,
    #[serde(flatten)]
    pub action: ScanAction,
}

/// Structured outcome of a scan. `requires_override` set with the
/// authorized list means the caller must confirm and re-submit with
/// `override: true`; nothing was mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceScanResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_override: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_persons: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_override: Option<bool>,
}

/// One attendance record as returned by the day view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEventDto {
    pub id: String,
    pub child_id: String,
    /// Convenience field so the day view doesn't need a second lookup
    pub child_name: String,
    /// Calendar day in YYYY-MM-DD format
    pub date: String,
    /// One of "dropped_off", "picked_up", "no_show"
    pub status: String,
    pub dropoff_time: String,
    pub dropoff_by: String,
    pub pickup_time: Option<String>,
    pub picked_up_by: Option<String>,
    pub override_used: bool,
    pub verified_by: Option<String>,
}

/// Response for GET /junior-church/attendance?date=YYYY-MM-DD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDayResponse {
    pub date: String,
    pub events: Vec<AttendanceEventDto>,
}

/// Uniform error body returned by the REST layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}
