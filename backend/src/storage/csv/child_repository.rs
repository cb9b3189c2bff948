use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::connection::CsvConnection;
use crate::domain::models::child::Child as DomainChild;
use crate::storage::traits::ChildStorage;

/// Intermediate struct for YAML serialization with string date fields
#[derive(Debug, Clone, Serialize, Deserialize)]
struct YamlChild {
    id: String,
    first_name: String,
    last_name: String,
    birthdate: String,
    authorized_releasers: Vec<String>,
    allergies: Option<String>,
    medical_notes: Option<String>,
    barcode_id: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

/// File-based child repository. Each child owns one directory, keyed by
/// their barcode token, containing a `child.yaml` record and the attendance
/// ledger.
#[derive(Clone)]
pub struct ChildRepository {
    connection: Arc<CsvConnection>,
}

impl ChildRepository {
    /// Create a new child repository
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    /// Get the path to a child's YAML record file
    fn get_child_yaml_path(&self, barcode_id: &str) -> PathBuf {
        self.connection.get_child_directory(barcode_id).join("child.yaml")
    }

    /// Discover all children by scanning directories
    fn discover_children(&self) -> Result<Vec<DomainChild>> {
        let base_dir = self.connection.base_directory();

        if !base_dir.exists() {
            debug!("Base directory doesn't exist, returning empty children list");
            return Ok(Vec::new());
        }

        let mut children = Vec::new();

        for entry in fs::read_dir(base_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_dir() {
                continue;
            }

            let dir_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => {
                    warn!("Skipping directory with invalid name: {:?}", path);
                    continue;
                }
            };

            match self.load_child_from_directory(dir_name) {
                Ok(Some(child)) => {
                    debug!("Discovered child {} in directory {}", child.id, dir_name);
                    children.push(child);
                }
                Ok(None) => {
                    debug!("Directory {} doesn't contain a child record", dir_name);
                }
                Err(e) => {
                    warn!("Error loading child from directory {}: {}", dir_name, e);
                }
            }
        }

        children.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str())
                .cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });

        Ok(children)
    }

    /// Load a child from a specific directory
    fn load_child_from_directory(&self, barcode_id: &str) -> Result<Option<DomainChild>> {
        let yaml_path = self.get_child_yaml_path(barcode_id);

        if !yaml_path.exists() {
            return Ok(None);
        }

        let yaml_content = fs::read_to_string(&yaml_path)?;
        let yaml_child: YamlChild = serde_yaml::from_str(&yaml_content)?;

        let domain_child = DomainChild {
            id: yaml_child.id,
            first_name: yaml_child.first_name,
            last_name: yaml_child.last_name,
            birthdate: chrono::NaiveDate::parse_from_str(&yaml_child.birthdate, "%Y-%m-%d")
                .map_err(|e| anyhow::anyhow!("Failed to parse birthdate: {}", e))?,
            authorized_releasers: yaml_child.authorized_releasers,
            allergies: yaml_child.allergies,
            medical_notes: yaml_child.medical_notes,
            barcode_id: yaml_child.barcode_id,
            is_active: yaml_child.is_active,
            created_at: chrono::DateTime::parse_from_rfc3339(&yaml_child.created_at)
                .map_err(|e| anyhow::anyhow!("Failed to parse created_at: {}", e))?
                .with_timezone(&chrono::Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&yaml_child.updated_at)
                .map_err(|e| anyhow::anyhow!("Failed to parse updated_at: {}", e))?
                .with_timezone(&chrono::Utc),
        };

        Ok(Some(domain_child))
    }

    /// Save a child record into their directory
    fn save_child_to_directory(&self, child: &DomainChild) -> Result<()> {
        let child_dir = self.connection.get_child_directory(&child.barcode_id);
        if !child_dir.exists() {
            fs::create_dir_all(&child_dir)?;
            info!("Created child directory: {:?}", child_dir);
        }

        let yaml_child = YamlChild {
            id: child.id.clone(),
            first_name: child.first_name.clone(),
            last_name: child.last_name.clone(),
            birthdate: child.birthdate.format("%Y-%m-%d").to_string(),
            authorized_releasers: child.authorized_releasers.clone(),
            allergies: child.allergies.clone(),
            medical_notes: child.medical_notes.clone(),
            barcode_id: child.barcode_id.clone(),
            is_active: child.is_active,
            created_at: child.created_at.to_rfc3339(),
            updated_at: child.updated_at.to_rfc3339(),
        };

        let yaml_path = self.get_child_yaml_path(&child.barcode_id);
        let yaml_content = serde_yaml::to_string(&yaml_child)?;

        // Atomic write using temp file
        let temp_path = yaml_path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, &yaml_path)?;

        Ok(())
    }
}

impl ChildStorage for ChildRepository {
    /// Store a new child
    fn store_child(&self, child: &DomainChild) -> Result<()> {
        self.save_child_to_directory(child)?;
        info!("Stored child {} ({})", child.full_name(), child.id);
        Ok(())
    }

    /// Retrieve a specific child by ID
    fn get_child(&self, child_id: &str) -> Result<Option<DomainChild>> {
        let children = self.discover_children()?;
        Ok(children.into_iter().find(|c| c.id == child_id))
    }

    /// Retrieve an active child by barcode token, case-sensitive exact match
    fn get_child_by_barcode(&self, barcode_id: &str) -> Result<Option<DomainChild>> {
        // Tokens are plain alphanumerics; anything path-like cannot name a record
        if barcode_id.is_empty() || !barcode_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(None);
        }
        let child = self.load_child_from_directory(barcode_id)?;
        Ok(child.filter(|c| c.barcode_id == barcode_id && c.is_active))
    }

    /// List all children ordered by name
    fn list_children(&self) -> Result<Vec<DomainChild>> {
        self.discover_children()
    }

    /// Update an existing child
    fn update_child(&self, child: &DomainChild) -> Result<()> {
        let yaml_path = self.get_child_yaml_path(&child.barcode_id);
        if !yaml_path.exists() {
            warn!("Attempted to update a non-existent child: {}", child.id);
            return Err(anyhow::anyhow!("Child not found for update"));
        }
        self.save_child_to_directory(child)
    }
}
