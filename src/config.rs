use std::path::PathBuf;

use crate::allocator::SharedHours;

pub const DEFAULT_SHARED_HOURS: &str = "08:00,08:30";

/// Runtime settings, read from `CAPALLOC_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding the ledger journal.
    pub data_dir: PathBuf,
    pub shared_hours: SharedHours,
    pub metrics_port: Option<u16>,
    /// Time-slot catalogs and channel capacity profiles (JSON).
    pub reference_data: PathBuf,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = PathBuf::from(lookup("CAPALLOC_DATA_DIR").unwrap_or_else(|| "./data".into()));
        let shared_hours = SharedHours::parse(
            &lookup("CAPALLOC_SHARED_HOURS").unwrap_or_else(|| DEFAULT_SHARED_HOURS.into()),
        );
        let metrics_port = lookup("CAPALLOC_METRICS_PORT").and_then(|s| s.parse().ok());
        let reference_data = lookup("CAPALLOC_REFERENCE_DATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("reference.json"));
        Self {
            data_dir,
            shared_hours,
            metrics_port,
            reference_data,
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("ledger.journal")
    }
}
