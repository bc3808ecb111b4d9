use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::LedgerEvent;

/// Encode a single ledger event to [len][bincode][crc32] format.
fn encode_event(event: &LedgerEvent) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "ledger event too large"))?;
    let crc = crc32fast::hash(&payload);
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

/// Cut the file back to `len` bytes and sync.
fn truncate_to(path: &Path, len: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()
}

/// Intact prefix of a journal file.
#[derive(Debug, Default, PartialEq)]
pub struct Replay {
    pub events: Vec<LedgerEvent>,
    /// Byte length of the intact entries. Anything after it is a torn or
    /// corrupt tail.
    pub intact_len: u64,
}

/// Append-only reservation journal.
///
/// Format per entry: `[u32: len][bincode: LedgerEvent][u32: crc32]`.
/// The ledger never rewrites or deletes rows, so the journal is never compacted.
/// A torn tail is cut off on `recover`, and a failed flush is rolled back to
/// the last synced length, so new entries always follow intact ones.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// Bytes known durable on disk.
    synced_len: u64,
    pending_len: u64,
    pending_events: u64,
    appended: u64,
}

impl Journal {
    /// Open for appending without replaying. The file is assumed intact.
    pub fn open(path: &Path) -> io::Result<Self> {
        let writer = open_append(path)?;
        let synced_len = writer.get_ref().metadata()?.len();
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            synced_len,
            pending_len: 0,
            pending_events: 0,
            appended: 0,
        })
    }

    /// Replay the intact entries, cut off anything after them, then open for
    /// appending.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<LedgerEvent>)> {
        let replay = Self::replay(path)?;
        let on_disk = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        if on_disk > replay.intact_len {
            tracing::warn!(
                path = %path.display(),
                intact = replay.intact_len,
                discarded = on_disk - replay.intact_len,
                "truncating damaged journal tail"
            );
            truncate_to(path, replay.intact_len)?;
        }
        Ok((Self::open(path)?, replay.events))
    }

    /// Append and fsync one event. Tests only; the ledger batches through
    /// `append_buffered` + `flush_sync`.
    #[cfg(test)]
    pub fn append(&mut self, event: &LedgerEvent) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &LedgerEvent) -> io::Result<()> {
        let frame = encode_event(event)?;
        self.writer.write_all(&frame)?;
        self.pending_len += frame.len() as u64;
        self.pending_events += 1;
        self.appended += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.synced_len += self.pending_len;
        self.pending_len = 0;
        self.pending_events = 0;
        Ok(())
    }

    /// Drop everything since the last successful `flush_sync`, both the
    /// buffer and any bytes that partially reached the file.
    pub fn rollback(&mut self) -> io::Result<()> {
        let fresh = open_append(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, fresh);
        // into_parts hands back the buffer without writing it.
        let _ = stale.into_parts();
        self.appended -= self.pending_events;
        self.pending_len = 0;
        self.pending_events = 0;
        truncate_to(&self.path, self.synced_len)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events durably appended through this handle since it was opened.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn synced_len(&self) -> u64 {
        self.synced_len
    }

    /// Read every intact event from disk, in write order.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();

        loop {
            let mut len_buf = [0u8; 4];
            if !read_or_eof(&mut reader, &mut len_buf)? {
                break;
            }
            let len = u32::from_le_bytes(len_buf) as u64;
            if replay.intact_len + 8 + len > file_len {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            if !read_or_eof(&mut reader, &mut payload)? {
                break;
            }

            let mut crc_buf = [0u8; 4];
            if !read_or_eof(&mut reader, &mut crc_buf)? {
                break;
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                tracing::warn!(path = %path.display(), "journal checksum mismatch, stopping replay");
                break;
            }

            match bincode::deserialize::<LedgerEvent>(&payload) {
                Ok(event) => {
                    replay.events.push(event);
                    replay.intact_len += 8 + len;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "undecodable journal entry: {e}");
                    break;
                }
            }
        }

        Ok(replay)
    }
}

/// `Ok(false)` on a short read at end of file.
fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReservationKind, ReservationRecord};
    use chrono::NaiveDate;
    use std::fs;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("capalloc_test_journal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn booking(qty: u32) -> LedgerEvent {
        LedgerEvent::BookingAppended(ReservationRecord {
            id: Ulid::new(),
            channel_id: "email".into(),
            date: NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            hour: "09:00".into(),
            quantity: qty,
            kind: ReservationKind::Booking,
            requesting_area: Some("Marketing".into()),
            owner: Some("ops@example.com".into()),
        })
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.journal");
        let events = vec![booking(1), booking(2), booking(3)];
        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append(e).unwrap();
            }
            assert_eq!(journal.appended(), 3);
        }
        assert_eq!(Journal::replay(&path).unwrap().events, events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn reopen_appends_after_existing_entries() {
        let path = tmp_path("reopen.journal");
        let first = booking(4);
        let second = booking(5);
        Journal::open(&path).unwrap().append(&first).unwrap();
        Journal::open(&path).unwrap().append(&second).unwrap();
        assert_eq!(Journal::replay(&path).unwrap().events, vec![first, second]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_drops_torn_tail() {
        let path = tmp_path("torn.journal");
        let event = booking(2);
        Journal::open(&path).unwrap().append(&event).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(Journal::replay(&path).unwrap().events, vec![event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("never_written.journal");
        assert!(Journal::replay(&path).unwrap().events.is_empty());
    }

    #[test]
    fn replay_stops_at_bad_checksum() {
        let path = tmp_path("bad_crc.journal");
        let good = booking(1);
        Journal::open(&path).unwrap().append(&good).unwrap();
        {
            let payload = bincode::serialize(&booking(9)).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        assert_eq!(Journal::replay(&path).unwrap().events, vec![good]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recover_cuts_torn_tail_before_new_appends() {
        let path = tmp_path("recover_torn.journal");
        let first = booking(2);
        Journal::open(&path).unwrap().append(&first).unwrap();
        let intact = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap();
        }

        let second = booking(7);
        {
            let (mut journal, replayed) = Journal::recover(&path).unwrap();
            assert_eq!(replayed, vec![first.clone()]);
            assert_eq!(journal.synced_len(), intact);
            journal.append(&second).unwrap();
        }

        let (_, replayed) = Journal::recover(&path).unwrap();
        assert_eq!(replayed, vec![first, second]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recover_cuts_corrupt_entry() {
        let path = tmp_path("recover_crc.journal");
        let good = booking(1);
        Journal::open(&path).unwrap().append(&good).unwrap();
        {
            let payload = bincode::serialize(&booking(9)).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        let after = booking(3);
        Journal::recover(&path).unwrap().0.append(&after).unwrap();
        assert_eq!(Journal::replay(&path).unwrap().events, vec![good, after]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_reports_intact_length() {
        let path = tmp_path("intact_len.journal");
        Journal::open(&path).unwrap().append(&booking(1)).unwrap();
        let len = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0xFF, 0xFF, 0xFF, 0x7F]).unwrap();
        }
        let replay = Journal::replay(&path).unwrap();
        assert_eq!(replay.events.len(), 1);
        assert_eq!(replay.intact_len, len);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rollback_discards_unsynced_bytes() {
        let path = tmp_path("rollback.journal");
        let kept = booking(1);
        let mut journal = Journal::open(&path).unwrap();
        journal.append(&kept).unwrap();
        let synced = journal.synced_len();

        journal.append_buffered(&booking(2)).unwrap();
        journal.writer.flush().unwrap();
        {
            // A partial frame that reached the file before the failure.
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[1, 2, 3]).unwrap();
        }
        journal.append_buffered(&booking(3)).unwrap();
        journal.rollback().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), synced);
        assert_eq!(journal.appended(), 1);

        let next = booking(4);
        journal.append(&next).unwrap();
        drop(journal);
        assert_eq!(Journal::replay(&path).unwrap().events, vec![kept, next]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_visible_after_flush() {
        let path = tmp_path("buffered.journal");
        let events: Vec<_> = (1..=4).map(booking).collect();
        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append_buffered(e).unwrap();
            }
            journal.flush_sync().unwrap();
        }
        assert_eq!(Journal::replay(&path).unwrap().events, events);
        let _ = fs::remove_file(&path);
    }
}
