//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use anyhow::Result;
use chrono::NaiveDate;

use crate::domain::models::attendance::AttendanceEvent;
use crate::domain::models::child::Child as DomainChild;

/// Trait defining the interface for child storage operations
pub trait ChildStorage: Send + Sync {
    /// Store a new child
    fn store_child(&self, child: &DomainChild) -> Result<()>;

    /// Retrieve a specific child by ID
    fn get_child(&self, child_id: &str) -> Result<Option<DomainChild>>;

    /// Retrieve a specific child by their unique barcode token.
    /// Case-sensitive exact match; deactivated children are not returned.
    fn get_child_by_barcode(&self, barcode_id: &str) -> Result<Option<DomainChild>>;

    /// List all children ordered by name, including deactivated ones
    fn list_children(&self) -> Result<Vec<DomainChild>>;

    /// Update an existing child
    fn update_child(&self, child: &DomainChild) -> Result<()>;
}

/// Trait defining the interface for the attendance ledger.
///
/// The ledger is append-style: events are created on drop-off and rewritten
/// exactly once by `complete_pickup`. There is no general update or delete.
pub trait AttendanceStorage: Send + Sync {
    /// Store a new open event recording a drop-off.
    ///
    /// Enforces the at-most-one-event-per-(child, date) uniqueness guard at
    /// the storage layer. Returns false when an event for that child and day
    /// already exists; the caller treats that as a concurrency conflict.
    fn store_event(&self, event: &AttendanceEvent) -> Result<bool>;

    /// Get the event for a specific child and day, if any
    fn get_event(&self, child_id: &str, date: NaiveDate) -> Result<Option<AttendanceEvent>>;

    /// Rewrite the open event for (child, date) with its picked-up form.
    ///
    /// Returns false when no open event remained for that day, meaning a
    /// concurrent writer completed the pickup first.
    fn complete_pickup(&self, event: &AttendanceEvent) -> Result<bool>;

    /// All events for a specific calendar day, across children
    fn events_for_date(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>>;

    /// All events for a specific child, in chronological order
    fn events_for_child(&self, child_id: &str) -> Result<Vec<AttendanceEvent>>;

    /// Events for a child within an inclusive date range, in chronological order
    fn events_for_child_between(
        &self,
        child_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>>;
}
