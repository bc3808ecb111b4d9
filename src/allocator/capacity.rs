use std::collections::BTreeSet;

use crate::model::Quantity;

/// Hours that draw from one pool split with an adjacent hour. Each of them
/// gets half the channel's per-slot maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedHours {
    hours: BTreeSet<String>,
}

impl Default for SharedHours {
    fn default() -> Self {
        Self::new(["08:00", "08:30"])
    }
}

impl SharedHours {
    pub fn new<I, S>(hours: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hours: hours.into_iter().map(Into::into).collect(),
        }
    }

    pub fn none() -> Self {
        Self {
            hours: BTreeSet::new(),
        }
    }

    /// Comma-separated list ("08:00,08:30"). Blank items are ignored.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty()),
        )
    }

    pub fn contains(&self, hour: &str) -> bool {
        self.hours.contains(hour)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hours.iter().map(String::as_str)
    }

    /// Per-slot ceiling for `hour`. Odd maxima round down on shared hours.
    pub fn effective_max(&self, hour: &str, max_per_slot: Quantity) -> Quantity {
        if self.contains(hour) {
            max_per_slot / 2
        } else {
            max_per_slot
        }
    }
}

/// Remaining room in a bucket given what the ledger and this pass have
/// already committed.
pub fn available(effective_max: Quantity, committed: Quantity, staged: Quantity) -> Quantity {
    effective_max.saturating_sub(committed.saturating_add(staged))
}

/// Upper bound on fixed-point passes for `entries` inputs over `slots`
/// active slots.
///
/// Every restart happens at a position no earlier than the previous one, and
/// an entry mutates at most `slots + 2` times: up to `slots` forward moves,
/// one fallback reassignment and one terminal split or drop. Each split
/// closes a bucket, so at most `entries * (slots + 1)` splits add new
/// entries. One extra pass confirms the fixed point.
pub fn pass_limit(entries: usize, slots: usize) -> usize {
    entries
        .saturating_mul(slots + 2)
        .saturating_mul(slots + 2)
        .saturating_add(1)
}
