mod aggregate;
mod error;
mod queries;

pub use aggregate::{bucket_totals, committed_quantity, hold_owned_by, normalize_area};
pub use error::LedgerError;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::journal::Journal;
use crate::limits::*;
use crate::model::*;

/// Read/write port onto committed capacity.
///
/// The allocator reads through `sum_reserved_quantity` and the recorder writes
/// through `append_booking`. Nothing here holds a bucket between the read and
/// the later write; an implementation that needs read-then-commit isolation
/// wraps this trait rather than changing the allocator.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    /// Committed quantity for the bucket, excluding holds owned by `requesting_area`.
    async fn sum_reserved_quantity(
        &self,
        key: &SlotKey,
        requesting_area: Option<&str>,
    ) -> Result<Quantity, LedgerError>;

    async fn append_booking(&self, record: ReservationRecord) -> Result<(), LedgerError>;
}

#[derive(Debug, Default)]
pub struct Bucket {
    pub records: Vec<ReservationRecord>,
}

pub type SharedBucket = Arc<RwLock<Bucket>>;

// ── Group-commit journal channel ─────────────────────────

enum JournalCommand {
    Append {
        event: LedgerEvent,
        response: oneshot::Sender<io::Result<()>>,
    },
    Appended {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the journal. Appends that arrive while a flush is pending are
/// batched behind a single fsync.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            JournalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(JournalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut journal, &batch);
                metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                if let Err(e) = &result {
                    tracing::error!(path = %journal.path().display(), "journal flush failed: {e}");
                }
                for (_, tx) in batch {
                    let r = match &result {
                        Ok(()) => Ok(()),
                        Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
                    };
                    let _ = tx.send(r);
                }

                if let Some(JournalCommand::Appended { response }) = deferred {
                    let _ = response.send(journal.appended());
                }
            }
            JournalCommand::Appended { response } => {
                let _ = response.send(journal.appended());
            }
        }
    }
}

fn flush_batch(journal: &mut Journal, batch: &[(LedgerEvent, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    let result = match append_err {
        Some(e) => Err(e),
        None => journal.flush_sync(),
    };
    // A failed batch must not leave bytes that later entries would sit behind.
    if result.is_err() {
        if let Err(e) = journal.rollback() {
            tracing::error!(path = %journal.path().display(), "journal rollback failed: {e}");
        }
    }
    result
}

/// Journal-backed reservation ledger.
///
/// Rows live in per-bucket `RwLock`s inside a `DashMap`, so reads on different
/// (channel, date, hour) buckets never contend. Every write is journaled
/// before it becomes visible.
pub struct LedgerStore {
    buckets: DashMap<SlotKey, SharedBucket>,
    journal_tx: mpsc::Sender<JournalCommand>,
}

impl LedgerStore {
    /// Replay the journal at `path` and start the writer task.
    /// Must be called from within a tokio runtime.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let (journal, events) = Journal::recover(&path)?;
        let journal_bytes = journal.synced_len();
        let (journal_tx, journal_rx) = mpsc::channel(JOURNAL_CHANNEL_DEPTH);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let mut replayed: HashMap<SlotKey, Vec<ReservationRecord>> = HashMap::new();
        for event in events {
            let record = match event {
                LedgerEvent::BookingAppended(r) | LedgerEvent::HoldPlaced(r) => r,
            };
            replayed.entry(record.key()).or_default().push(record);
        }
        let record_count: usize = replayed.values().map(Vec::len).sum();

        let buckets = DashMap::new();
        for (key, records) in replayed {
            buckets.insert(key, Arc::new(RwLock::new(Bucket { records })));
        }
        tracing::info!(
            path = %path.display(),
            bytes = journal_bytes,
            buckets = buckets.len(),
            records = record_count,
            "ledger replayed"
        );

        Ok(Self { buckets, journal_tx })
    }

    async fn journal_append(&self, event: &LedgerEvent) -> Result<(), LedgerError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| LedgerError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| LedgerError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| LedgerError::JournalError(e.to_string()))
    }

    pub fn get_bucket(&self, key: &SlotKey) -> Option<SharedBucket> {
        self.buckets.get(key).map(|e| e.value().clone())
    }

    fn bucket_or_default(&self, key: SlotKey) -> SharedBucket {
        self.buckets.entry(key).or_default().value().clone()
    }

    /// Journal + apply under the bucket's write lock.
    async fn persist_and_apply(&self, event: LedgerEvent) -> Result<(), LedgerError> {
        let record = event.record();
        validate_record(record)?;
        let key = record.key();
        let bucket = self.bucket_or_default(key.clone());
        let mut guard = bucket.write().await;
        if guard.records.len() >= MAX_RECORDS_PER_BUCKET {
            return Err(LedgerError::BucketFull(key));
        }
        self.journal_append(&event).await?;
        let record = match event {
            LedgerEvent::BookingAppended(r) | LedgerEvent::HoldPlaced(r) => r,
        };
        guard.records.push(record);
        Ok(())
    }

    pub async fn confirm_booking(&self, record: ReservationRecord) -> Result<(), LedgerError> {
        if record.kind != ReservationKind::Booking {
            return Err(LedgerError::InvalidRecord("expected a booking"));
        }
        self.persist_and_apply(LedgerEvent::BookingAppended(record)).await
    }

    /// Entry point for the manual-hold workflow; the scheduler never places holds.
    pub async fn place_hold(&self, record: ReservationRecord) -> Result<(), LedgerError> {
        if record.kind != ReservationKind::Hold {
            return Err(LedgerError::InvalidRecord("expected a hold"));
        }
        self.persist_and_apply(LedgerEvent::HoldPlaced(record)).await
    }

    /// Events written to the journal by this process.
    pub async fn journal_appends(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::Appended { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate_record(record: &ReservationRecord) -> Result<(), LedgerError> {
    if record.quantity == 0 {
        return Err(LedgerError::InvalidRecord("quantity must be positive"));
    }
    if record.channel_id.trim().is_empty() {
        return Err(LedgerError::InvalidRecord("missing channel id"));
    }
    if record.hour.trim().is_empty() {
        return Err(LedgerError::InvalidRecord("missing hour"));
    }
    if record.channel_id.len() > MAX_CHANNEL_ID_LEN {
        return Err(LedgerError::LimitExceeded("channel id too long"));
    }
    if record.hour.len() > MAX_HOUR_LEN {
        return Err(LedgerError::LimitExceeded("hour too long"));
    }
    let too_long = |s: &Option<String>| s.as_ref().is_some_and(|v| v.len() > MAX_AREA_LEN);
    if too_long(&record.requesting_area) || too_long(&record.owner) {
        return Err(LedgerError::LimitExceeded("area or owner too long"));
    }
    Ok(())
}

#[async_trait]
impl ReservationLedger for LedgerStore {
    async fn sum_reserved_quantity(
        &self,
        key: &SlotKey,
        requesting_area: Option<&str>,
    ) -> Result<Quantity, LedgerError> {
        let Some(bucket) = self.get_bucket(key) else {
            return Ok(0);
        };
        let guard = bucket.read().await;
        Ok(committed_quantity(&guard.records, requesting_area))
    }

    async fn append_booking(&self, record: ReservationRecord) -> Result<(), LedgerError> {
        self.confirm_booking(record).await
    }
}
