use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{Reader, Writer};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use tracing::{info, warn};

use super::child_repository::ChildRepository;
use super::connection::CsvConnection;
use crate::domain::models::attendance::{AttendanceEvent, AttendanceStatus};
use crate::storage::traits::{AttendanceStorage, ChildStorage};

const CSV_HEADER: [&str; 10] = [
    "id",
    "child_id",
    "date",
    "status",
    "dropoff_time",
    "dropoff_by",
    "pickup_time",
    "picked_up_by",
    "override_used",
    "verified_by",
];

/// File-based attendance ledger. One `attendance.csv` per child directory,
/// append-style: rows are added on drop-off and rewritten exactly once on
/// pickup. Rewrites go through a temp file so a transition is all-or-nothing.
#[derive(Clone)]
pub struct AttendanceRepository {
    connection: Arc<CsvConnection>,
    child_repository: ChildRepository,
}

impl AttendanceRepository {
    /// Create a new attendance repository
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        let child_repository = ChildRepository::new(connection.clone());
        Self {
            connection,
            child_repository,
        }
    }

    /// Find the ledger directory key (barcode) for a child id
    fn barcode_for_child(&self, child_id: &str) -> Result<String> {
        let child = self
            .child_repository
            .get_child(child_id)?
            .ok_or_else(|| anyhow::anyhow!("Child not found: {}", child_id))?;
        Ok(child.barcode_id)
    }

    /// Read all events from a child's ledger file
    fn read_events(&self, barcode_id: &str) -> Result<Vec<AttendanceEvent>> {
        let file_path = self.connection.get_attendance_file_path(barcode_id);

        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let mut csv_reader = Reader::from_reader(reader);

        let mut events = Vec::new();

        for result in csv_reader.records() {
            let record = result?;
            match Self::parse_record(&record) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Skipping malformed ledger row in {}: {}", barcode_id, e);
                }
            }
        }

        events.sort_by_key(|e| (e.date, e.dropoff_time));
        Ok(events)
    }

    fn parse_record(record: &csv::StringRecord) -> Result<AttendanceEvent> {
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let optional = |i: usize| {
            let value = field(i);
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        };

        let status_str = field(3);
        let status = AttendanceStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("Unknown attendance status '{}'", status_str))?;

        let pickup_time = match optional(6) {
            Some(value) => Some(
                chrono::DateTime::parse_from_rfc3339(&value)
                    .context("Failed to parse pickup_time")?
                    .with_timezone(&chrono::Utc),
            ),
            None => None,
        };

        Ok(AttendanceEvent {
            id: field(0),
            child_id: field(1),
            date: NaiveDate::parse_from_str(&field(2), "%Y-%m-%d")
                .context("Failed to parse event date")?,
            status,
            dropoff_time: chrono::DateTime::parse_from_rfc3339(&field(4))
                .context("Failed to parse dropoff_time")?
                .with_timezone(&chrono::Utc),
            dropoff_by: field(5),
            pickup_time,
            picked_up_by: optional(7),
            override_used: field(8) == "true",
            verified_by: optional(9),
        })
    }

    /// Write a child's full ledger atomically (temp file + rename)
    fn write_events(&self, barcode_id: &str, events: &[AttendanceEvent]) -> Result<()> {
        let child_dir = self.connection.get_child_directory(barcode_id);
        if !child_dir.exists() {
            std::fs::create_dir_all(&child_dir)?;
        }

        let file_path = self.connection.get_attendance_file_path(barcode_id);
        let temp_path = file_path.with_extension("tmp");

        {
            let file = File::create(&temp_path)?;
            let writer = BufWriter::new(file);
            let mut csv_writer = Writer::from_writer(writer);

            csv_writer.write_record(CSV_HEADER)?;

            for event in events {
                csv_writer.write_record(&[
                    event.id.as_str(),
                    event.child_id.as_str(),
                    &event.date.format("%Y-%m-%d").to_string(),
                    event.status.as_str(),
                    &event.dropoff_time.to_rfc3339(),
                    event.dropoff_by.as_str(),
                    &event
                        .pickup_time
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default(),
                    event.picked_up_by.as_deref().unwrap_or(""),
                    if event.override_used { "true" } else { "false" },
                    event.verified_by.as_deref().unwrap_or(""),
                ])?;
            }

            csv_writer.flush()?;
        }

        std::fs::rename(&temp_path, &file_path)?;
        Ok(())
    }
}

impl AttendanceStorage for AttendanceRepository {
    fn store_event(&self, event: &AttendanceEvent) -> Result<bool> {
        let barcode_id = self.barcode_for_child(&event.child_id)?;
        let mut events = self.read_events(&barcode_id)?;

        // Uniqueness guard: one event per child per calendar day
        if events.iter().any(|e| e.date == event.date) {
            warn!(
                "Rejected duplicate event for child {} on {}",
                event.child_id, event.date
            );
            return Ok(false);
        }

        events.push(event.clone());
        self.write_events(&barcode_id, &events)?;
        info!(
            "Recorded drop-off for child {} on {} by {}",
            event.child_id, event.date, event.dropoff_by
        );
        Ok(true)
    }

    fn get_event(&self, child_id: &str, date: NaiveDate) -> Result<Option<AttendanceEvent>> {
        let barcode_id = self.barcode_for_child(child_id)?;
        let events = self.read_events(&barcode_id)?;
        Ok(events.into_iter().find(|e| e.date == date))
    }

    fn complete_pickup(&self, event: &AttendanceEvent) -> Result<bool> {
        let barcode_id = self.barcode_for_child(&event.child_id)?;
        let mut events = self.read_events(&barcode_id)?;

        let Some(stored) = events
            .iter_mut()
            .find(|e| e.id == event.id && e.date == event.date)
        else {
            return Ok(false);
        };

        // Only the dropped_off -> picked_up transition is allowed; a racing
        // writer that completed the pickup first makes this a conflict.
        if !stored.is_open() {
            return Ok(false);
        }

        *stored = event.clone();
        self.write_events(&barcode_id, &events)?;
        info!(
            "Recorded pickup for child {} on {} by {:?} (override: {})",
            event.child_id, event.date, event.picked_up_by, event.override_used
        );
        Ok(true)
    }

    fn events_for_date(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>> {
        let mut events = Vec::new();
        for child in self.child_repository.list_children()? {
            let child_events = self.read_events(&child.barcode_id)?;
            events.extend(child_events.into_iter().filter(|e| e.date == date));
        }
        events.sort_by_key(|e| e.dropoff_time);
        Ok(events)
    }

    fn events_for_child(&self, child_id: &str) -> Result<Vec<AttendanceEvent>> {
        let barcode_id = self.barcode_for_child(child_id)?;
        self.read_events(&barcode_id)
    }

    fn events_for_child_between(
        &self,
        child_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let events = self.events_for_child(child_id)?;
        Ok(events
            .into_iter()
            .filter(|e| e.date >= from && e.date <= to)
            .collect())
    }
}
