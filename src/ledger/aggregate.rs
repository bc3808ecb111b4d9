use crate::model::*;

// ── Committed-quantity aggregation ────────────────────────────────

/// Trim an area name; blank counts as absent.
pub fn normalize_area(area: Option<&str>) -> Option<&str> {
    area.map(str::trim).filter(|a| !a.is_empty())
}

/// A hold is "owned" by the caller only when both sides name the same area.
/// An unnamed caller owns nothing and an unnamed hold belongs to nobody.
pub fn hold_owned_by(hold_area: Option<&str>, requesting_area: Option<&str>) -> bool {
    match (normalize_area(hold_area), normalize_area(requesting_area)) {
        (Some(hold), Some(caller)) => hold == caller,
        _ => false,
    }
}

/// Quantity already committed in one bucket, as seen by `requesting_area`.
///
/// Bookings always count. Holds count unless the caller's own area placed
/// them, which lets an area consume its own soft hold instead of counting it
/// twice.
pub fn committed_quantity<'a>(
    records: impl IntoIterator<Item = &'a ReservationRecord>,
    requesting_area: Option<&str>,
) -> Quantity {
    records
        .into_iter()
        .filter(|r| match r.kind {
            ReservationKind::Booking => true,
            ReservationKind::Hold => !hold_owned_by(r.requesting_area.as_deref(), requesting_area),
        })
        .fold(0, |acc: Quantity, r| acc.saturating_add(r.quantity))
}

pub fn bucket_totals<'a>(records: impl IntoIterator<Item = &'a ReservationRecord>) -> BucketTotals {
    records
        .into_iter()
        .fold(BucketTotals::default(), |mut totals, r| {
            match r.kind {
                ReservationKind::Booking => totals.booked = totals.booked.saturating_add(r.quantity),
                ReservationKind::Hold => totals.held = totals.held.saturating_add(r.quantity),
            }
            totals
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn record(kind: ReservationKind, qty: Quantity, area: Option<&str>) -> ReservationRecord {
        ReservationRecord {
            id: Ulid::new(),
            channel_id: "email".into(),
            date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            hour: "08:00".into(),
            quantity: qty,
            kind,
            requesting_area: area.map(String::from),
            owner: None,
        }
    }

    #[test]
    fn bookings_count_for_every_area() {
        let records = vec![
            record(ReservationKind::Booking, 3, Some("Marketing")),
            record(ReservationKind::Booking, 2, None),
        ];
        assert_eq!(committed_quantity(&records, Some("Marketing")), 5);
        assert_eq!(committed_quantity(&records, Some("Sales")), 5);
        assert_eq!(committed_quantity(&records, None), 5);
    }

    #[test]
    fn own_area_hold_is_excluded() {
        let records = vec![record(ReservationKind::Hold, 4, Some("Marketing"))];
        assert_eq!(committed_quantity(&records, Some("Marketing")), 0);
        assert_eq!(committed_quantity(&records, Some("Sales")), 4);
    }

    #[test]
    fn unnamed_hold_counts_against_named_caller() {
        let records = vec![record(ReservationKind::Hold, 4, None)];
        assert_eq!(committed_quantity(&records, Some("Marketing")), 4);
    }

    #[test]
    fn unnamed_caller_sees_every_hold() {
        let records = vec![
            record(ReservationKind::Hold, 4, Some("Marketing")),
            record(ReservationKind::Hold, 1, None),
        ];
        assert_eq!(committed_quantity(&records, None), 5);
        assert_eq!(committed_quantity(&records, Some("   ")), 5);
    }

    #[test]
    fn area_match_ignores_surrounding_whitespace() {
        assert!(hold_owned_by(Some(" Marketing "), Some("Marketing")));
        assert!(!hold_owned_by(Some("marketing"), Some("Marketing")));
        assert!(!hold_owned_by(None, None));
    }

    #[test]
    fn mixed_bucket() {
        let records = vec![
            record(ReservationKind::Booking, 3, Some("Sales")),
            record(ReservationKind::Hold, 4, Some("Marketing")),
            record(ReservationKind::Hold, 2, Some("Sales")),
        ];
        assert_eq!(committed_quantity(&records, Some("Marketing")), 5);
        assert_eq!(committed_quantity(&records, Some("Sales")), 7);
        assert_eq!(bucket_totals(&records), BucketTotals { booked: 3, held: 6 });
    }

    #[test]
    fn empty_bucket_is_zero() {
        let records: Vec<ReservationRecord> = Vec::new();
        assert_eq!(committed_quantity(&records, Some("Marketing")), 0);
        assert_eq!(bucket_totals(&records), BucketTotals::default());
    }
}
