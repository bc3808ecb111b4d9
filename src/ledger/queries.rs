use chrono::NaiveDate;

use crate::model::*;

use super::aggregate::bucket_totals;
use super::{LedgerStore, SharedBucket};

impl LedgerStore {
    fn day_buckets(&self, channel_id: &str, date: NaiveDate) -> Vec<(SlotKey, SharedBucket)> {
        let mut buckets: Vec<_> = self
            .buckets
            .iter()
            .filter(|e| e.key().channel_id == channel_id && e.key().date == date)
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }

    /// Booking rows for one channel and day, in hour order.
    pub async fn bookings(&self, channel_id: &str, date: NaiveDate) -> Vec<ReservationRecord> {
        let mut out = Vec::new();
        for (_, bucket) in self.day_buckets(channel_id, date) {
            let guard = bucket.read().await;
            out.extend(guard.records.iter().filter(|r| r.kind == ReservationKind::Booking).cloned());
        }
        out
    }

    pub async fn totals(&self, key: &SlotKey) -> BucketTotals {
        match self.get_bucket(key) {
            Some(bucket) => bucket_totals(&bucket.read().await.records),
            None => BucketTotals::default(),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ReservationLedger;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_journal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("capalloc_test_ledger_queries");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn record(channel: &str, day: u32, hour: &str, kind: ReservationKind, qty: Quantity) -> ReservationRecord {
        ReservationRecord {
            id: Ulid::new(),
            channel_id: channel.into(),
            date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            hour: hour.into(),
            quantity: qty,
            kind,
            requesting_area: Some("Marketing".into()),
            owner: Some("planner".into()),
        }
    }

    #[tokio::test]
    async fn bookings_listed_by_day_in_hour_order() {
        let store = LedgerStore::open(test_journal_path("listing.journal")).unwrap();
        store.append_booking(record("email", 1, "09:00", ReservationKind::Booking, 2)).await.unwrap();
        store.append_booking(record("email", 1, "08:00", ReservationKind::Booking, 1)).await.unwrap();
        store.place_hold(record("email", 1, "08:00", ReservationKind::Hold, 5)).await.unwrap();
        store.append_booking(record("email", 2, "08:00", ReservationKind::Booking, 7)).await.unwrap();
        store.append_booking(record("sms", 1, "08:00", ReservationKind::Booking, 7)).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let bookings = store.bookings("email", date).await;
        assert_eq!(bookings.len(), 2);
        assert_eq!(bookings[0].hour, "08:00");
        assert_eq!(bookings[1].hour, "09:00");

        assert!(bookings.iter().all(|r| r.kind == ReservationKind::Booking));
        assert_eq!(store.bucket_count(), 4);
    }

    #[tokio::test]
    async fn totals_split_by_kind() {
        let store = LedgerStore::open(test_journal_path("totals.journal")).unwrap();
        store.append_booking(record("email", 3, "08:30", ReservationKind::Booking, 2)).await.unwrap();
        store.place_hold(record("email", 3, "08:30", ReservationKind::Hold, 3)).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        let key = SlotKey::new("email", date, "08:30");
        assert_eq!(store.totals(&key).await, BucketTotals { booked: 2, held: 3 });

        let missing = SlotKey::new("email", date, "23:00");
        assert_eq!(store.totals(&missing).await, BucketTotals::default());
    }
}
