use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Whole dispatch units. Capacities and demands never go negative.
pub type Quantity = u32;

/// A named daily time bucket ("08:00"). Ordering is by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl TimeSlot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
        }
    }

    pub fn inactive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: false,
        }
    }
}

/// Per-channel ceiling for a single slot. `max_per_slot: None` means the
/// channel is exempt from allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCapacityProfile {
    pub channel_id: String,
    pub max_per_slot: Option<Quantity>,
}

/// Bucket identity in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub channel_id: String,
    pub date: NaiveDate,
    pub hour: String,
}

impl SlotKey {
    pub fn new(channel_id: impl Into<String>, date: NaiveDate, hour: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            date,
            hour: hour.into(),
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} {}", self.channel_id, self.date, self.hour)
    }
}

/// What a ledger row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationKind {
    /// Committed by the scheduler.
    Booking,
    /// Soft, area-scoped reservation placed outside the scheduler.
    Hold,
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: Ulid,
    pub channel_id: String,
    pub date: NaiveDate,
    pub hour: String,
    pub quantity: Quantity,
    pub kind: ReservationKind,
    pub requesting_area: Option<String>,
    pub owner: Option<String>,
}

impl ReservationRecord {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.channel_id.clone(), self.date, self.hour.clone())
    }
}

/// Unvalidated demand as it arrives from the form layer. Anything that is
/// not one of the four scheduling fields is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDemand {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub hour: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A well-formed dispatch request. `quantity > 0` always holds once an entry
/// has passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandEntry {
    pub channel_id: String,
    pub date: NaiveDate,
    pub hour: String,
    pub quantity: Quantity,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DemandEntry {
    pub fn new(channel_id: impl Into<String>, date: NaiveDate, hour: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            channel_id: channel_id.into(),
            date,
            hour: hour.into(),
            quantity,
            extra: Map::new(),
        }
    }

    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.channel_id.clone(), self.date, self.hour.clone())
    }

    pub fn is_well_formed(&self) -> bool {
        !self.channel_id.is_empty() && !self.hour.is_empty() && self.quantity > 0
    }

    /// Back to the inbound shape, with the date in canonical day form.
    pub fn into_raw(self) -> RawDemand {
        RawDemand {
            channel_id: Some(self.channel_id),
            date: Some(self.date.format("%Y-%m-%d").to_string()),
            hour: Some(self.hour),
            quantity: Some(i64::from(self.quantity)),
            extra: self.extra,
        }
    }
}

/// One form submission's worth of demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Scheduling domain whose slot catalog applies ("crm", "gam").
    pub domain: String,
    #[serde(default)]
    pub requesting_area: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub demands: Vec<RawDemand>,
}

/// Journal record format. Flat, one variant per ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BookingAppended(ReservationRecord),
    HoldPlaced(ReservationRecord),
}

impl LedgerEvent {
    pub fn record(&self) -> &ReservationRecord {
        match self {
            LedgerEvent::BookingAppended(r) | LedgerEvent::HoldPlaced(r) => r,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// Totals for one bucket, split by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketTotals {
    pub booked: Quantity,
    pub held: Quantity,
}
