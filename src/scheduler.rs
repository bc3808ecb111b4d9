use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::allocator::{Allocation, AllocationError, AllocationReport, CapacityAllocator, SharedHours};
use crate::ledger::{ReservationLedger, normalize_area};
use crate::limits::*;
use crate::model::*;
use crate::recorder::{RecordSummary, record_schedule};
use crate::reference::{CapacityProfiles, TimeSlotCatalog};
use crate::validator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleOutcome {
    /// Final allocation, handed on to remote item creation.
    pub entries: Vec<DemandEntry>,
    /// Inbound entries dropped as malformed.
    pub rejected: usize,
    pub report: AllocationReport,
    pub recorded: RecordSummary,
}

/// Validate, allocate and record one submission.
///
/// `schedule` is the whole capacity-check-then-commit sequence. There is no
/// lock across it: two submissions racing for the same nearly full bucket can
/// both commit. Isolation, when added, belongs around this call or inside the
/// `ReservationLedger` implementation.
pub struct Scheduler {
    catalog: Arc<dyn TimeSlotCatalog>,
    profiles: Arc<dyn CapacityProfiles>,
    ledger: Arc<dyn ReservationLedger>,
    shared_hours: SharedHours,
}

impl Scheduler {
    pub fn new(
        catalog: Arc<dyn TimeSlotCatalog>,
        profiles: Arc<dyn CapacityProfiles>,
        ledger: Arc<dyn ReservationLedger>,
        shared_hours: SharedHours,
    ) -> Self {
        Self {
            catalog,
            profiles,
            ledger,
            shared_hours,
        }
    }

    pub fn shared_hours(&self) -> &SharedHours {
        &self.shared_hours
    }

    fn allocator(&self) -> CapacityAllocator<'_> {
        CapacityAllocator::new(
            self.catalog.as_ref(),
            self.profiles.as_ref(),
            self.ledger.as_ref(),
            &self.shared_hours,
        )
    }

    /// Allocation only, nothing written. Returns the allocation and the
    /// number of malformed entries dropped.
    pub async fn plan(&self, submission: &Submission) -> Result<(Allocation, usize), AllocationError> {
        check_submission(submission)?;
        let inbound = submission.demands.len();
        let entries = validator::validate(submission.demands.clone());
        let rejected = inbound - entries.len();
        let area = normalize_area(submission.requesting_area.as_deref());
        let allocation = self.allocator().allocate(&submission.domain, area, entries).await?;
        Ok((allocation, rejected))
    }

    pub async fn schedule(&self, submission: &Submission) -> Result<ScheduleOutcome, AllocationError> {
        let result = self.plan(submission).await;
        let (allocation, rejected) = match result {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!(crate::observability::SUBMISSIONS_TOTAL, "status" => "failed").increment(1);
                return Err(e);
            }
        };

        let area = normalize_area(submission.requesting_area.as_deref());
        let owner = submission.owner.as_deref().map(str::trim).filter(|o| !o.is_empty());
        let recorded = record_schedule(self.ledger.as_ref(), &allocation.entries, area, owner).await;

        metrics::counter!(crate::observability::SUBMISSIONS_TOTAL, "status" => "ok").increment(1);
        info!(
            domain = %submission.domain,
            area = area.unwrap_or("-"),
            inbound = submission.demands.len(),
            rejected,
            allocated = allocation.entries.len(),
            dropped_quantity = allocation.report.dropped_quantity,
            recorded = recorded.written,
            "submission scheduled"
        );

        Ok(ScheduleOutcome {
            entries: allocation.entries,
            rejected,
            report: allocation.report,
            recorded,
        })
    }
}

fn check_submission(submission: &Submission) -> Result<(), AllocationError> {
    if submission.demands.len() > MAX_DEMANDS_PER_SUBMISSION {
        return Err(AllocationError::LimitExceeded("too many demand entries"));
    }
    if submission.domain.len() > MAX_DOMAIN_LEN {
        return Err(AllocationError::LimitExceeded("domain name too long"));
    }
    let too_long = |s: &Option<String>| s.as_ref().is_some_and(|v| v.len() > MAX_AREA_LEN);
    if too_long(&submission.requesting_area) || too_long(&submission.owner) {
        return Err(AllocationError::LimitExceeded("area or owner too long"));
    }
    submission.demands.iter().try_for_each(check_demand)
}

/// Size limits on one demand. Measured after trimming, as validation will.
fn check_demand(demand: &RawDemand) -> Result<(), AllocationError> {
    let longer_than = |s: &Option<String>, max: usize| s.as_deref().is_some_and(|v| v.trim().len() > max);
    if longer_than(&demand.channel_id, MAX_CHANNEL_ID_LEN) {
        return Err(AllocationError::LimitExceeded("channel id too long"));
    }
    if longer_than(&demand.hour, MAX_HOUR_LEN) {
        return Err(AllocationError::LimitExceeded("hour too long"));
    }
    if demand.quantity.is_some_and(|q| q > i64::from(MAX_QUANTITY)) {
        return Err(AllocationError::LimitExceeded("quantity above per-entry maximum"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> Submission {
        Submission {
            domain: "crm".into(),
            ..Default::default()
        }
    }

    #[test]
    fn submission_within_limits() {
        assert!(check_submission(&submission()).is_ok());
    }

    #[test]
    fn long_domain_rejected() {
        let sub = Submission {
            domain: "d".repeat(MAX_DOMAIN_LEN + 1),
            ..submission()
        };
        assert!(matches!(check_submission(&sub), Err(AllocationError::LimitExceeded(_))));
    }

    fn with_demand(demand: RawDemand) -> Submission {
        Submission {
            demands: vec![demand],
            ..submission()
        }
    }

    fn demand(channel: &str, hour: &str, quantity: i64) -> RawDemand {
        RawDemand {
            channel_id: Some(channel.into()),
            date: Some("2025-09-15".into()),
            hour: Some(hour.into()),
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    #[test]
    fn demand_at_limits_accepted() {
        let channel = "c".repeat(MAX_CHANNEL_ID_LEN);
        let sub = with_demand(demand(&channel, "08:00", i64::from(MAX_QUANTITY)));
        assert!(check_submission(&sub).is_ok());
    }

    #[test]
    fn oversized_demand_rejects_submission() {
        let cases = [
            demand(&"c".repeat(MAX_CHANNEL_ID_LEN + 1), "08:00", 1),
            demand("email", &"h".repeat(MAX_HOUR_LEN + 1), 1),
            demand("email", "08:00", i64::from(MAX_QUANTITY) + 1),
        ];
        for case in cases {
            assert!(matches!(
                check_submission(&with_demand(case)),
                Err(AllocationError::LimitExceeded(_))
            ));
        }
    }

    #[test]
    fn malformed_demand_left_to_validation() {
        let sub = with_demand(demand("", "", -4));
        assert!(check_submission(&sub).is_ok());
    }

    #[test]
    fn long_owner_rejected() {
        let sub = Submission {
            owner: Some("o".repeat(MAX_AREA_LEN + 1)),
            ..submission()
        };
        assert!(matches!(check_submission(&sub), Err(AllocationError::LimitExceeded(_))));
    }
}
