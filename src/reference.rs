//! Read-only reference data: time-slot catalogs per scheduling domain and
//! per-channel capacity profiles.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::model::*;

#[derive(Debug)]
pub enum ReferenceError {
    UnknownDomain(String),
    Unavailable(String),
    Invalid(String),
}

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceError::UnknownDomain(d) => write!(f, "unknown scheduling domain: {d}"),
            ReferenceError::Unavailable(e) => write!(f, "reference data unavailable: {e}"),
            ReferenceError::Invalid(e) => write!(f, "invalid reference data: {e}"),
        }
    }
}

impl std::error::Error for ReferenceError {}

/// Active slots for a scheduling domain, ascending by name.
#[async_trait]
pub trait TimeSlotCatalog: Send + Sync {
    async fn active_time_slots(&self, domain: &str) -> Result<Vec<TimeSlot>, ReferenceError>;
}

/// `Ok(None)` means the channel has no profile and is exempt.
#[async_trait]
pub trait CapacityProfiles: Send + Sync {
    async fn capacity_profile(&self, channel_id: &str) -> Result<Option<ChannelCapacityProfile>, ReferenceError>;
}

/// Ordered slot names of one domain, with next-slot navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotSequence {
    names: Vec<String>,
}

impl SlotSequence {
    /// Keeps active slots only, sorted ascending by name, duplicates removed.
    pub fn from_slots(slots: impl IntoIterator<Item = TimeSlot>) -> Self {
        let mut names: Vec<String> = slots
            .into_iter()
            .filter(|s| s.active)
            .map(|s| s.name)
            .collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn slot_count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, hour: &str) -> Option<usize> {
        self.names.iter().position(|n| n == hour)
    }

    /// The slot after `hour`. An hour outside the catalog maps to the first
    /// slot; the last slot has no successor.
    pub fn next_after(&self, hour: &str) -> Option<&str> {
        let idx = match self.position(hour) {
            Some(i) => i + 1,
            None => 0,
        };
        self.names.get(idx).map(String::as_str)
    }
}

// ── Static implementations ───────────────────────────────────────

/// In-memory catalog. Slots are stored as given; filtering and ordering
/// happen on read.
#[derive(Default)]
pub struct StaticCatalog {
    domains: DashMap<String, Vec<TimeSlot>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_domain(&self, domain: impl Into<String>, slots: Vec<TimeSlot>) {
        self.domains.insert(domain.into(), slots);
    }

    pub fn with_domain(self, domain: impl Into<String>, slots: Vec<TimeSlot>) -> Self {
        self.set_domain(domain, slots);
        self
    }
}

#[async_trait]
impl TimeSlotCatalog for StaticCatalog {
    async fn active_time_slots(&self, domain: &str) -> Result<Vec<TimeSlot>, ReferenceError> {
        let slots = self
            .domains
            .get(domain)
            .ok_or_else(|| ReferenceError::UnknownDomain(domain.to_string()))?;
        let mut active: Vec<TimeSlot> = slots.iter().filter(|s| s.active).cloned().collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }
}

#[derive(Default)]
pub struct StaticProfiles {
    profiles: DashMap<String, ChannelCapacityProfile>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: ChannelCapacityProfile) {
        self.profiles.insert(profile.channel_id.clone(), profile);
    }

    /// Shorthand for a capped channel.
    pub fn with_limit(self, channel_id: impl Into<String>, max_per_slot: Quantity) -> Self {
        self.insert(ChannelCapacityProfile {
            channel_id: channel_id.into(),
            max_per_slot: Some(max_per_slot),
        });
        self
    }
}

#[async_trait]
impl CapacityProfiles for StaticProfiles {
    async fn capacity_profile(&self, channel_id: &str) -> Result<Option<ChannelCapacityProfile>, ReferenceError> {
        Ok(self.profiles.get(channel_id).map(|p| p.value().clone()))
    }
}

/// On-disk reference document.
///
/// ```json
/// { "domains": { "crm": [{ "name": "08:00" }, { "name": "08:30", "active": false }] },
///   "channels": [{ "channel_id": "email", "max_per_slot": 10 }] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub domains: HashMap<String, Vec<TimeSlot>>,
    #[serde(default)]
    pub channels: Vec<ChannelCapacityProfile>,
}

impl ReferenceData {
    pub fn from_json(text: &str) -> Result<Self, ReferenceError> {
        serde_json::from_str(text).map_err(|e| ReferenceError::Invalid(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReferenceError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn into_providers(self) -> (StaticCatalog, StaticProfiles) {
        let catalog = StaticCatalog::new();
        for (domain, slots) in self.domains {
            catalog.set_domain(domain, slots);
        }
        let profiles = StaticProfiles::new();
        for profile in self.channels {
            profiles.insert(profile);
        }
        (catalog, profiles)
    }
}
