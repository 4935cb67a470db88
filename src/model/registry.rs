//! Reference data: workers and workstations.
//!
//! Owned by a separate registry. Metrics never need it for the math;
//! it answers "does this id exist" and supplies display fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub name: String,
    #[serde(default = "default_department")]
    pub department: String,
    #[serde(default = "default_shift")]
    pub shift: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workstation {
    pub station_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub station_type: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_capacity")]
    pub capacity: i32,
}

fn default_department() -> String {
    "Production".to_string()
}

fn default_shift() -> String {
    "Morning".to_string()
}

fn default_location() -> String {
    "Floor A".to_string()
}

fn default_capacity() -> i32 {
    1
}

/// Registry manifest loaded from TOML:
///
/// ```toml
/// [[worker]]
/// worker_id = "W1"
/// name = "Alice Johnson"
///
/// [[workstation]]
/// station_id = "S1"
/// name = "Assembly Line A"
/// type = "Assembly"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryManifest {
    #[serde(default, rename = "worker")]
    pub workers: Vec<Worker>,
    #[serde(default, rename = "workstation")]
    pub workstations: Vec<Workstation>,
}

impl RegistryManifest {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("bad registry manifest: {e}")))
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
