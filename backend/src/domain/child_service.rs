use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::commands::child::{
    DeactivateChildCommand, DeactivateChildResult, GetChildCommand, GetChildResult,
    ListChildrenResult, RegisterChildCommand, RegisterChildResult, UpdateChildCommand,
    UpdateChildResult,
};
use crate::domain::models::child::Child as DomainChild;
use crate::storage::csv::{ChildRepository, CsvConnection};
use crate::storage::traits::ChildStorage;

/// Service for the child registry: registration, edits, deactivation, and
/// barcode resolution.
#[derive(Clone)]
pub struct ChildService {
    child_repository: ChildRepository,
}

impl ChildService {
    /// Create a new ChildService
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        let child_repository = ChildRepository::new(connection);
        Self { child_repository }
    }

    /// Register a new child
    pub fn register_child(&self, command: RegisterChildCommand) -> Result<RegisterChildResult> {
        info!(
            "Registering child: {} {}",
            command.first_name, command.last_name
        );

        self.validate_register_command(&command)?;

        let now = Utc::now();
        let birthdate = NaiveDate::parse_from_str(&command.birthdate, "%Y-%m-%d")
            .context("Invalid birthdate format in register_child command")?;

        let barcode_id = match command.barcode_id {
            Some(token) => {
                let token = token.trim().to_string();
                if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(anyhow::anyhow!(
                        "Barcode tokens must be non-empty and alphanumeric"
                    ));
                }
                if self.barcode_in_use(&token)? {
                    return Err(anyhow::anyhow!("Barcode '{}' is already assigned", token));
                }
                token
            }
            None => self.generate_barcode(now.year(), now.timestamp_millis() as u64)?,
        };

        let child = DomainChild {
            id: DomainChild::generate_id(now.timestamp_millis() as u64),
            first_name: command.first_name.trim().to_string(),
            last_name: command.last_name.trim().to_string(),
            birthdate,
            authorized_releasers: command
                .authorized_releasers
                .iter()
                .map(|r| r.trim().to_string())
                .collect(),
            allergies: command.allergies,
            medical_notes: command.medical_notes,
            barcode_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.child_repository.store_child(&child)?;

        info!(
            "Registered child {} with ID {} and barcode {}",
            child.full_name(),
            child.id,
            child.barcode_id
        );

        Ok(RegisterChildResult { child })
    }

    /// Get a child by ID
    pub fn get_child(&self, command: GetChildCommand) -> Result<GetChildResult> {
        let child = self.child_repository.get_child(&command.child_id)?;

        if child.is_none() {
            warn!("Child not found: {}", command.child_id);
        }

        Ok(GetChildResult { child })
    }

    /// List all children, including deactivated ones
    pub fn list_children(&self) -> Result<ListChildrenResult> {
        let children = self.child_repository.list_children()?;
        Ok(ListChildrenResult { children })
    }

    /// Resolve a scanned barcode token to an active child.
    ///
    /// Case-sensitive exact match, no side effects. `None` means no active
    /// child owns the token; callers must not guess or fuzzy-match.
    pub fn resolve_barcode(&self, token: &str) -> Result<Option<DomainChild>> {
        self.child_repository.get_child_by_barcode(token)
    }

    /// Update an existing child
    pub fn update_child(&self, command: UpdateChildCommand) -> Result<UpdateChildResult> {
        info!("Updating child: {}", command.child_id);

        let mut child = self
            .child_repository
            .get_child(&command.child_id)?
            .ok_or_else(|| anyhow::anyhow!("Child not found: {}", command.child_id))?;

        self.validate_update_command(&command)?;

        if let Some(first_name) = command.first_name {
            child.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = command.last_name {
            child.last_name = last_name.trim().to_string();
        }
        if let Some(birthdate_str) = command.birthdate {
            child.birthdate = NaiveDate::parse_from_str(&birthdate_str, "%Y-%m-%d")
                .context("Invalid birthdate format in update_child command")?;
        }
        if let Some(releasers) = command.authorized_releasers {
            child.authorized_releasers = releasers.iter().map(|r| r.trim().to_string()).collect();
        }
        if let Some(allergies) = command.allergies {
            child.allergies = if allergies.trim().is_empty() {
                None
            } else {
                Some(allergies)
            };
        }
        if let Some(notes) = command.medical_notes {
            child.medical_notes = if notes.trim().is_empty() {
                None
            } else {
                Some(notes)
            };
        }

        child.updated_at = Utc::now();

        self.child_repository.update_child(&child)?;

        info!("Updated child {} ({})", child.full_name(), child.id);

        Ok(UpdateChildResult { child })
    }

    /// Deactivate a child (soft delete; attendance history remains valid)
    pub fn deactivate_child(
        &self,
        command: DeactivateChildCommand,
    ) -> Result<DeactivateChildResult> {
        info!("Deactivating child: {}", command.child_id);

        let mut child = self
            .child_repository
            .get_child(&command.child_id)?
            .ok_or_else(|| anyhow::anyhow!("Child not found: {}", command.child_id))?;

        child.is_active = false;
        child.updated_at = Utc::now();
        self.child_repository.update_child(&child)?;

        info!("Deactivated child {} ({})", child.full_name(), child.id);

        Ok(DeactivateChildResult {
            success_message: format!("Child '{}' deactivated", child.full_name()),
            child,
        })
    }

    fn barcode_in_use(&self, token: &str) -> Result<bool> {
        let children = self.child_repository.list_children()?;
        Ok(children.iter().any(|c| c.barcode_id == token))
    }

    /// Generate a unique barcode token, `JC<year><5 digits>`
    fn generate_barcode(&self, year: i32, timestamp_millis: u64) -> Result<String> {
        let mut seq = timestamp_millis % 100_000;
        for _ in 0..100_000 {
            let candidate = format!("JC{}{:05}", year, seq);
            if !self.barcode_in_use(&candidate)? {
                return Ok(candidate);
            }
            seq = (seq + 1) % 100_000;
        }
        Err(anyhow::anyhow!("Exhausted barcode space for year {}", year))
    }

    /// Validate register child command
    fn validate_register_command(&self, command: &RegisterChildCommand) -> Result<()> {
        Self::validate_name(&command.first_name, "First name")?;
        Self::validate_name(&command.last_name, "Last name")?;

        if command
            .authorized_releasers
            .iter()
            .filter(|r| !r.trim().is_empty())
            .count()
            == 0
        {
            return Err(anyhow::anyhow!(
                "At least one authorized pickup person is required"
            ));
        }

        self.validate_birthdate(&command.birthdate)?;

        Ok(())
    }

    /// Validate update child command
    fn validate_update_command(&self, command: &UpdateChildCommand) -> Result<()> {
        if let Some(ref first_name) = command.first_name {
            Self::validate_name(first_name, "First name")?;
        }
        if let Some(ref last_name) = command.last_name {
            Self::validate_name(last_name, "Last name")?;
        }
        if let Some(ref releasers) = command.authorized_releasers {
            if releasers.iter().filter(|r| !r.trim().is_empty()).count() == 0 {
                return Err(anyhow::anyhow!(
                    "At least one authorized pickup person is required"
                ));
            }
        }
        if let Some(ref birthdate) = command.birthdate {
            self.validate_birthdate(birthdate)?;
        }

        Ok(())
    }

    fn validate_name(name: &str, label: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow::anyhow!("{} cannot be empty", label));
        }
        if name.len() > 100 {
            return Err(anyhow::anyhow!("{} cannot exceed 100 characters", label));
        }
        Ok(())
    }

    /// Validate birthdate format (ISO 8601: YYYY-MM-DD)
    fn validate_birthdate(&self, birthdate: &str) -> Result<()> {
        let date_parts: Vec<&str> = birthdate.split('-').collect();
        if date_parts.len() != 3 {
            return Err(anyhow::anyhow!("Invalid birthdate format. Use YYYY-MM-DD."));
        }

        let year: u32 = date_parts[0]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid year in birthdate"))?;
        let month: u32 = date_parts[1]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid month in birthdate"))?;
        let day: u32 = date_parts[2]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid day in birthdate"))?;

        if year < 1900 || year > 2100 {
            return Err(anyhow::anyhow!("Year must be between 1900 and 2100"));
        }
        if !(1..=12).contains(&month) {
            return Err(anyhow::anyhow!("Month must be between 1 and 12"));
        }
        if !(1..=31).contains(&day) {
            return Err(anyhow::anyhow!("Day must be between 1 and 31"));
        }

        Ok(())
    }
}
