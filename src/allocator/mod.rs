mod capacity;
mod error;

pub use capacity::{SharedHours, available, pass_limit};
pub use error::AllocationError;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::ledger::ReservationLedger;
use crate::model::*;
use crate::reference::{CapacityProfiles, SlotSequence, TimeSlotCatalog};

type EntryId = usize;

/// Working list for one run. Entries live in `slots` under a stable id and
/// `order` holds the current sequence; drops and splits only touch `order`.
struct Arena {
    slots: Vec<Option<DemandEntry>>,
    order: Vec<EntryId>,
}

impl Arena {
    fn new(entries: Vec<DemandEntry>) -> Self {
        let order = (0..entries.len()).collect();
        Self {
            slots: entries.into_iter().map(Some).collect(),
            order,
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn at(&self, pos: usize) -> Option<&DemandEntry> {
        self.slots.get(self.order[pos]).and_then(Option::as_ref)
    }

    fn at_mut(&mut self, pos: usize) -> Option<&mut DemandEntry> {
        let id = self.order[pos];
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    fn remove_at(&mut self, pos: usize) -> Option<DemandEntry> {
        let id = self.order.remove(pos);
        self.slots.get_mut(id).and_then(Option::take)
    }

    fn insert_after(&mut self, pos: usize, entry: DemandEntry) {
        let id = self.slots.len();
        self.slots.push(Some(entry));
        self.order.insert(pos + 1, id);
    }

    fn into_entries(mut self) -> Vec<DemandEntry> {
        self.order
            .iter()
            .filter_map(|id| self.slots.get_mut(*id).and_then(Option::take))
            .collect()
    }
}

/// What one run did besides producing the final list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocationReport {
    pub passes: usize,
    pub splits: usize,
    pub moves: usize,
    pub reassignments: usize,
    pub dropped_entries: usize,
    pub dropped_quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub entries: Vec<DemandEntry>,
    pub report: AllocationReport,
}

/// Inputs that stay fixed for a whole run.
struct RunContext<'a> {
    slots: &'a SlotSequence,
    requesting_area: Option<&'a str>,
    /// Profile lookups are read-only for the run; ledger reads are not cached.
    max_per_slot: HashMap<String, Option<Quantity>>,
}

enum Step {
    Continue,
    Restart,
}

/// Spreads demand across time slots so that no (channel, date, hour) bucket
/// exceeds its remaining capacity.
pub struct CapacityAllocator<'a> {
    catalog: &'a dyn TimeSlotCatalog,
    profiles: &'a dyn CapacityProfiles,
    ledger: &'a dyn ReservationLedger,
    shared_hours: &'a SharedHours,
}

impl<'a> CapacityAllocator<'a> {
    pub fn new(
        catalog: &'a dyn TimeSlotCatalog,
        profiles: &'a dyn CapacityProfiles,
        ledger: &'a dyn ReservationLedger,
        shared_hours: &'a SharedHours,
    ) -> Self {
        Self {
            catalog,
            profiles,
            ledger,
            shared_hours,
        }
    }

    /// Run the allocation for one submission's validated demand.
    pub async fn allocate(
        &self,
        domain: &str,
        requesting_area: Option<&str>,
        entries: Vec<DemandEntry>,
    ) -> Result<Allocation, AllocationError> {
        let slots = SlotSequence::from_slots(self.catalog.active_time_slots(domain).await?);
        self.allocate_with_slots(&slots, requesting_area, entries).await
    }

    /// Same as [`allocate`](Self::allocate) with the slot sequence already resolved.
    pub async fn allocate_with_slots(
        &self,
        slots: &SlotSequence,
        requesting_area: Option<&str>,
        entries: Vec<DemandEntry>,
    ) -> Result<Allocation, AllocationError> {
        let limit = pass_limit(entries.len(), slots.slot_count());
        let mut arena = Arena::new(entries);
        let mut ctx = RunContext {
            slots,
            requesting_area,
            max_per_slot: HashMap::new(),
        };
        let mut report = AllocationReport::default();

        loop {
            report.passes += 1;
            if report.passes > limit {
                return Err(AllocationError::PassLimitExceeded {
                    passes: report.passes,
                    limit,
                });
            }
            if !self.run_pass(&mut arena, &mut ctx, &mut report).await? {
                break;
            }
        }

        let mut entries = arena.into_entries();
        entries.retain(|e| e.quantity > 0);

        metrics::histogram!(crate::observability::ALLOCATION_PASSES).record(report.passes as f64);
        debug!(
            passes = report.passes,
            splits = report.splits,
            moves = report.moves,
            reassignments = report.reassignments,
            dropped = report.dropped_entries,
            "allocation settled"
        );
        Ok(Allocation { entries, report })
    }

    /// One scan from the top. `Ok(true)` means the list changed and the scan
    /// must restart with fresh staging.
    async fn run_pass(
        &self,
        arena: &mut Arena,
        ctx: &mut RunContext<'_>,
        report: &mut AllocationReport,
    ) -> Result<bool, AllocationError> {
        let mut staged: HashMap<SlotKey, Quantity> = HashMap::new();
        let mut pos = 0;
        while pos < arena.len() {
            match self.step(arena, pos, ctx, &mut staged, report).await? {
                Step::Continue => pos += 1,
                Step::Restart => return Ok(true),
            }
        }
        Ok(false)
    }

    async fn step(
        &self,
        arena: &mut Arena,
        pos: usize,
        ctx: &mut RunContext<'_>,
        staged: &mut HashMap<SlotKey, Quantity>,
        report: &mut AllocationReport,
    ) -> Result<Step, AllocationError> {
        let Some(entry) = arena.at(pos).filter(|e| e.is_well_formed()).cloned() else {
            if let Some(e) = arena.remove_at(pos) {
                debug!(channel = %e.channel_id, hour = %e.hour, "removing malformed entry during allocation");
            }
            return Ok(Step::Restart);
        };

        let Some(max_per_slot) = self.max_per_slot(&entry.channel_id, ctx).await? else {
            return Ok(Step::Continue);
        };

        let key = entry.key();
        let free = self.available_in(&key, max_per_slot, staged, ctx.requesting_area).await?;

        if entry.quantity <= free {
            *staged.entry(key).or_default() += entry.quantity;
            return Ok(Step::Continue);
        }

        if free == 0 {
            self.relocate(arena, pos, &entry, max_per_slot, ctx, staged, report).await?;
            return Ok(Step::Restart);
        }

        // Partial fit: keep what fits here, push the rest to the next slot.
        let remainder = entry.quantity - free;
        if let Some(current) = arena.at_mut(pos) {
            current.quantity = free;
        }
        *staged.entry(key).or_default() += free;

        let mut tail = entry.clone();
        tail.quantity = remainder;
        if let Some(next) = ctx.slots.next_after(&entry.hour) {
            tail.hour = next.to_string();
        }
        debug!(
            channel = %entry.channel_id,
            date = %entry.date,
            hour = %entry.hour,
            kept = free,
            remainder,
            next_hour = %tail.hour,
            "splitting demand across slots"
        );
        arena.insert_after(pos, tail);
        report.splits += 1;
        metrics::counter!(crate::observability::SPLITS_TOTAL).increment(1);
        Ok(Step::Restart)
    }

    /// Entry has no room at its hour: move it whole to the next slot, or to
    /// any slot of the day that still has room, or drop it.
    #[allow(clippy::too_many_arguments)]
    async fn relocate(
        &self,
        arena: &mut Arena,
        pos: usize,
        entry: &DemandEntry,
        max_per_slot: Quantity,
        ctx: &RunContext<'_>,
        staged: &HashMap<SlotKey, Quantity>,
        report: &mut AllocationReport,
    ) -> Result<(), AllocationError> {
        if let Some(next) = ctx.slots.next_after(&entry.hour) {
            if let Some(current) = arena.at_mut(pos) {
                current.hour = next.to_string();
            }
            report.moves += 1;
            return Ok(());
        }

        for candidate in ctx.slots.names() {
            let key = SlotKey::new(entry.channel_id.clone(), entry.date, candidate.clone());
            if self.available_in(&key, max_per_slot, staged, ctx.requesting_area).await? > 0 {
                debug!(
                    channel = %entry.channel_id,
                    date = %entry.date,
                    from = %entry.hour,
                    to = %candidate,
                    "no later slot, reassigning to earlier slot with room"
                );
                if let Some(current) = arena.at_mut(pos) {
                    current.hour = candidate.clone();
                }
                report.reassignments += 1;
                return Ok(());
            }
        }

        arena.remove_at(pos);
        warn!(
            channel = %entry.channel_id,
            date = %entry.date,
            hour = %entry.hour,
            quantity = entry.quantity,
            "no slot with remaining capacity, dropping demand"
        );
        report.dropped_entries += 1;
        report.dropped_quantity = report.dropped_quantity.saturating_add(entry.quantity);
        metrics::counter!(crate::observability::DROPPED_QUANTITY_TOTAL).increment(u64::from(entry.quantity));
        Ok(())
    }

    async fn available_in(
        &self,
        key: &SlotKey,
        max_per_slot: Quantity,
        staged: &HashMap<SlotKey, Quantity>,
        requesting_area: Option<&str>,
    ) -> Result<Quantity, AllocationError> {
        let effective_max = self.shared_hours.effective_max(&key.hour, max_per_slot);
        let committed = self.ledger.sum_reserved_quantity(key, requesting_area).await?;
        let staged = staged.get(key).copied().unwrap_or(0);
        Ok(available(effective_max, committed, staged))
    }

    /// `None` for exempt channels.
    async fn max_per_slot(
        &self,
        channel_id: &str,
        ctx: &mut RunContext<'_>,
    ) -> Result<Option<Quantity>, AllocationError> {
        if let Some(cached) = ctx.max_per_slot.get(channel_id) {
            return Ok(*cached);
        }
        let max = self
            .profiles
            .capacity_profile(channel_id)
            .await?
            .and_then(|p| p.max_per_slot);
        ctx.max_per_slot.insert(channel_id.to_string(), max);
        Ok(max)
    }
}
