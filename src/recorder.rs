use serde::Serialize;
use tracing::{error, info};
use ulid::Ulid;

use crate::ledger::ReservationLedger;
use crate::model::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub written: usize,
    pub failed: usize,
}

/// Booking row for one allocated entry.
pub fn booking_for(entry: &DemandEntry, requesting_area: Option<&str>, owner: Option<&str>) -> ReservationRecord {
    ReservationRecord {
        id: Ulid::new(),
        channel_id: entry.channel_id.clone(),
        date: entry.date,
        hour: entry.hour.clone(),
        quantity: entry.quantity,
        kind: ReservationKind::Booking,
        requesting_area: requesting_area.map(String::from),
        owner: owner.map(String::from),
    }
}

/// Persist the final allocation, one booking per entry.
///
/// Best effort: the allocation has already been handed to the board, so a
/// failed row is logged and skipped rather than failing the submission.
pub async fn record_schedule(
    ledger: &dyn ReservationLedger,
    entries: &[DemandEntry],
    requesting_area: Option<&str>,
    owner: Option<&str>,
) -> RecordSummary {
    let mut summary = RecordSummary::default();
    for entry in entries {
        let record = booking_for(entry, requesting_area, owner);
        let id = record.id;
        match ledger.append_booking(record).await {
            Ok(()) => summary.written += 1,
            Err(e) => {
                error!(
                    booking = %id,
                    channel = %entry.channel_id,
                    date = %entry.date,
                    hour = %entry.hour,
                    quantity = entry.quantity,
                    "failed to record booking: {e}"
                );
                metrics::counter!(crate::observability::LEDGER_WRITE_FAILURES_TOTAL).increment(1);
                summary.failed += 1;
            }
        }
    }
    if summary.failed > 0 {
        info!(written = summary.written, failed = summary.failed, "schedule recorded with failures");
    }
    summary
}
