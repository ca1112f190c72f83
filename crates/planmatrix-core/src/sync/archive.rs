//! Archive drain.
//!
//! Flagged rows move to the append-only archive log exactly once per
//! flag-assertion. The drain rescans until a pass finds nothing, so flags
//! asserted while a batch is being written are picked up before the lock
//! is released. At most one drain is ever in flight.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Instant;

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::schema::Schema;
use crate::service::CalendarService;
use crate::storage::{ArchiveLog, TableStore};
use crate::sync::compact;

/// Mutual exclusion for the drain, with a bounded wait.
///
/// The drain is triggered both by the sync cycle and by out-of-band
/// archive requests; whichever loses the race waits here.
pub struct DrainLock {
    inner: Mutex<()>,
}

impl DrainLock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(()),
        }
    }

    /// Acquire within the configured wait window, polling. Timing out
    /// surfaces as an error; the caller skips the drain rather than
    /// proceeding unsafely.
    pub(crate) fn acquire(&self, cfg: &SyncConfig) -> Result<MutexGuard<'_, ()>, CoreError> {
        let started = Instant::now();
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {}
            }
            if started.elapsed().as_millis() as u64 >= cfg.drain_lock_wait_ms {
                return Err(CoreError::LockTimeout {
                    waited_ms: cfg.drain_lock_wait_ms,
                });
            }
            std::thread::sleep(std::time::Duration::from_millis(cfg.lock_poll_ms));
        }
    }
}

impl Default for DrainLock {
    fn default() -> Self {
        Self::new()
    }
}

/// What one drain did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Rows moved to the archive log.
    pub archived: usize,
    /// Scan passes that found flagged rows.
    pub passes: usize,
}

/// Move every flagged row to the archive log and delete it from the
/// table. Re-entrant under concurrent flagging: the scan repeats until a
/// pass comes up empty.
pub fn drain_flagged<S>(
    lock: &DrainLock,
    store: &mut S,
    schema: &Schema,
    cfg: &SyncConfig,
) -> Result<DrainOutcome, CoreError>
where
    S: TableStore + ArchiveLog + ?Sized,
{
    let _guard = lock.acquire(cfg)?;

    let mut outcome = DrainOutcome::default();
    loop {
        let rows = store.read_rows()?;

        let mut batch = Vec::new();
        let mut doomed = Vec::new();
        // Bottom-to-top, so the batch lands in table order after the
        // unshift below and deletions coalesce cleanly.
        for (i, row) in rows.iter().enumerate().rev() {
            if schema.archive_flag(row) {
                let mut outgoing = row.clone();
                schema.set_archive_flag(&mut outgoing, false);
                batch.insert(0, schema.archive_row(&outgoing));
                doomed.push(i);
            }
        }

        if doomed.is_empty() {
            break;
        }

        store.append_archive(&batch)?;
        compact::delete_rows(store, &doomed)?;
        outcome.archived += batch.len();
        outcome.passes += 1;
    }
    Ok(outcome)
}

/// Archive rows whose event is gone for good: a title and a sync stamp
/// but no event id. These are relabeled orphans the user has dealt with,
/// or rows whose event was retired out from under them.
pub fn sweep_unlinked<S>(
    lock: &DrainLock,
    store: &mut S,
    schema: &Schema,
    cfg: &SyncConfig,
) -> Result<usize, CoreError>
where
    S: TableStore + ArchiveLog + ?Sized,
{
    let _guard = lock.acquire(cfg)?;

    let rows = store.read_rows()?;
    let mut batch = Vec::new();
    let mut doomed = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let record = schema.record(row);
        if !record.title.is_empty() && record.synced_at.is_some() && record.event_id.is_none() {
            let mut outgoing = row.clone();
            schema.set_archive_flag(&mut outgoing, false);
            batch.push(schema.archive_row(&outgoing));
            doomed.push(i);
        }
    }

    if !doomed.is_empty() {
        store.append_archive(&batch)?;
        compact::delete_rows(store, &doomed)?;
    }
    Ok(doomed.len())
}

/// Delete the service events recorded in the archive log and blank their
/// id column. The blank id marks the entry "no longer live"; an event
/// that is already gone counts as deleted.
pub fn retire_archived<S, C>(
    store: &mut S,
    service: &mut C,
    schema: &Schema,
) -> Result<usize, CoreError>
where
    S: ArchiveLog + ?Sized,
    C: CalendarService + ?Sized,
{
    let col = schema.archive_id_column();
    let pending: Vec<(usize, String)> = store
        .archive_rows()?
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            entry
                .get(col)
                .and_then(|cell| cell.as_text())
                .map(|id| (i, id.to_string()))
        })
        .collect();

    let mut retired = 0;
    for (entry, id) in pending {
        match service.delete_event(&id) {
            Ok(()) => {}
            Err(e) if e.is_gone() => {}
            Err(e) => return Err(e.into()),
        }
        store.blank_archive_cell(entry, col)?;
        retired += 1;
    }
    Ok(retired)
}
