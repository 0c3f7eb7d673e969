// ── Domain model ──
//
// Vehicle identity is fetched once at setup and cached for the
// coordinator's lifetime; VehicleStatus records are produced fresh each
// refresh cycle by the merge layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use viperlink_api::VehicleRecord;

/// Consolidated status for one vehicle, merged from the two independent
/// status reads.
///
/// Every field is independently optional: `None` means the backend did
/// not report the field this cycle, which is distinct from a reported
/// `false` or `0`. Never default these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    // Position / motion (active read)
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<String>,
    pub heading: Option<i64>,
    pub battery_voltage: Option<f64>,
    pub doors_open: Option<bool>,
    pub ignition_on: Option<bool>,
    pub trunk_open: Option<bool>,
    pub hood_open: Option<bool>,
    // Locks / security (current read)
    pub doors_locked: Option<bool>,
    pub remote_starter_active: Option<bool>,
    pub security_system_armed: Option<bool>,
    pub panic_on: Option<bool>,
    pub valet_on: Option<bool>,
}

/// Static vehicle identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

impl Vehicle {
    /// Display string built from the available identity parts, e.g.
    /// `"2021 Subaru Outback"`. `None` when no parts are known.
    pub fn model_description(&self) -> Option<String> {
        let parts: Vec<&str> = [self.year.as_deref(), self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

impl From<VehicleRecord> for Vehicle {
    fn from(record: VehicleRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            make: record.make,
            model: record.model,
            year: record.year,
        }
    }
}

/// The coordinator's published state: vehicle id -> current status.
pub type Snapshot = HashMap<String, VehicleStatus>;
