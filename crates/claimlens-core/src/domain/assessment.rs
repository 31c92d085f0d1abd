//! Damage assessment model: damage inventory, scope of work and photo
//! organization, as produced by the photo description provider.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Damage severity, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Interior,
    Exterior,
}

/// Exterior elevation a damage item sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Elevation {
    North,
    South,
    East,
    West,
    Roof,
}

/// One observed damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageItem {
    pub item_id: String,
    pub location: String,
    pub location_type: LocationType,
    #[serde(default)]
    pub elevation: Option<Elevation>,
    pub damage_type: String,
    pub severity: Severity,
    #[serde(default)]
    pub affected_area: Option<String>,
    pub description: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub safety_concerns: Vec<String>,
    #[serde(default)]
    pub urgent: bool,
}

impl DamageItem {
    pub fn is_severe_or_critical(&self) -> bool {
        matches!(self.severity, Severity::Severe | Severity::Critical)
    }
}

/// One repair task. Quantity, unit and trade are optional at the schema
/// boundary; their absence is a scope-alignment failure, not a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub description: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub trade: Option<String>,
}

impl Task {
    /// Quantity is present and non-zero, unit and trade are non-blank.
    pub fn has_required_fields(&self) -> bool {
        let quantity_ok = self.quantity.is_some_and(|q| q.is_finite() && q != 0.0);
        let unit_ok = self.unit.as_deref().is_some_and(|u| !u.trim().is_empty());
        let trade_ok = self.trade.as_deref().is_some_and(|t| !t.trim().is_empty());
        quantity_ok && unit_ok && trade_ok
    }

    pub fn quantity_or_zero(&self) -> f64 {
        self.quantity.filter(|q| q.is_finite()).unwrap_or(0.0)
    }

    /// Trimmed, lowercased unit (empty when absent).
    pub fn unit_normalized(&self) -> String {
        self.unit
            .as_deref()
            .map(|u| u.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Trimmed, lowercased trade (empty when absent).
    pub fn trade_normalized(&self) -> String {
        self.trade
            .as_deref()
            .map(|t| t.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn is_trade(&self, trade: &str) -> bool {
        self.trade_normalized() == trade
    }
}

/// Repair scope for one damage item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub damage_item_id: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Photo ids grouped by where they were taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoOrganization {
    /// Exterior elevation -> photo ids
    #[serde(default)]
    pub exterior: BTreeMap<String, Vec<String>>,
    /// Interior room name -> photo ids
    #[serde(default)]
    pub interior: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub unassigned: Vec<String>,
}

impl PhotoOrganization {
    /// Combined index of every organized photo id (exterior, interior, unassigned).
    pub fn all_photo_ids(&self) -> HashSet<&str> {
        self.exterior
            .values()
            .chain(self.interior.values())
            .flatten()
            .chain(self.unassigned.iter())
            .map(String::as_str)
            .collect()
    }

    /// Number of photo slots across all buckets.
    pub fn total_count(&self) -> usize {
        let exterior: usize = self.exterior.values().map(Vec::len).sum();
        let interior: usize = self.interior.values().map(Vec::len).sum();
        exterior + interior + self.unassigned.len()
    }

    pub fn unassigned_count(&self) -> usize {
        self.unassigned.len()
    }
}

/// Property summary echoed back by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,
}

/// Normalized damage assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub assessment_id: Option<String>,
    #[serde(default)]
    pub property: Option<PropertySummary>,
    pub damage_inventory: Vec<DamageItem>,
    pub scope_of_work: Vec<ScopeEntry>,
    pub photo_organization: PhotoOrganization,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Assessment {
    pub fn damage_item(&self, item_id: &str) -> Option<&DamageItem> {
        self.damage_inventory.iter().find(|d| d.item_id == item_id)
    }

    pub fn has_scope(&self, item_id: &str) -> bool {
        self.scope_of_work
            .iter()
            .any(|s| s.damage_item_id == item_id)
    }

    /// Tasks across every scope entry referencing `item_id`.
    pub fn tasks_for(&self, item_id: &str) -> impl Iterator<Item = &Task> + '_ {
        let item_id = item_id.to_string();
        self.scope_of_work
            .iter()
            .filter(move |s| s.damage_item_id == item_id)
            .flat_map(|s| s.tasks.iter())
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        self.scope_of_work.iter().flat_map(|s| s.tasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.scope_of_work.iter().map(|s| s.tasks.len()).sum()
    }

    pub fn items_without_scope(&self) -> usize {
        self.damage_inventory
            .iter()
            .filter(|d| !self.has_scope(&d.item_id))
            .count()
    }

    pub fn items_without_photos(&self) -> usize {
        self.damage_inventory
            .iter()
            .filter(|d| d.photos.is_empty())
            .count()
    }
}
