//! Sync cycle orchestration.
//!
//! One cycle: validate -> drain explicit archive flags -> retire archived
//! events -> pull -> push -> sweep implicit orphans -> sort. Pull always
//! completes before push so imports are visible to the conflict checks,
//! and every phase re-reads the table rather than trusting an earlier
//! snapshot.

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::{CoreError, StoreError};
use crate::model::RecordState;
use crate::schema::Schema;
use crate::service::CalendarService;
use crate::storage::{ArchiveLog, TableStore};
use crate::sync::archive::{self, DrainLock, DrainOutcome};
use crate::sync::pull::{self, PullOutcome};
use crate::sync::push::{self, PushOutcome};
use crate::sync::{sort, validate};

/// What a full cycle did, per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub drained: DrainOutcome,
    pub retired: usize,
    pub pull: PullOutcome,
    pub push: PushOutcome,
    pub swept: usize,
    pub sorted: bool,
}

/// Row counts by sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStatus {
    pub total: usize,
    pub linked: usize,
    pub untracked: usize,
    pub orphaned: usize,
    pub flagged: usize,
}

/// The synchronization engine. Owns its store and service handles; there
/// is no ambient "current document" anywhere.
pub struct SyncEngine<S, C>
where
    S: TableStore + ArchiveLog,
    C: CalendarService,
{
    store: S,
    service: C,
    config: Config,
    drain_lock: DrainLock,
}

impl<S, C> SyncEngine<S, C>
where
    S: TableStore + ArchiveLog,
    C: CalendarService,
{
    pub fn new(store: S, service: C, config: Config) -> Self {
        Self {
            store,
            service,
            config,
            drain_lock: DrainLock::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn service(&self) -> &C {
        &self.service
    }

    /// Resolve the schema from the current header.
    pub fn schema(&self) -> Result<Schema, CoreError> {
        let header = self.store.header()?;
        Ok(Schema::resolve(&header)?)
    }

    /// Run one full sync cycle.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        let schema = self.schema()?;
        let window = (
            self.config.calendar.window_begin,
            self.config.calendar.window_end,
        );
        let cfg = self.config.sync.clone();

        // Fail-fast gate: no mutation happens past an invalid table.
        let rows = self.store.read_rows()?;
        validate::validate(&rows, &schema)?;

        self.scrub_untitled(&schema)?;

        let drained = archive::drain_flagged(&self.drain_lock, &mut self.store, &schema, &cfg)?;
        let retired = archive::retire_archived(&mut self.store, &mut self.service, &schema)?;

        let pull = pull::pull(
            &mut self.store,
            &mut self.service,
            &schema,
            window,
            Utc::now(),
        )?;
        let push = push::push(
            &mut self.store,
            &mut self.service,
            &schema,
            &cfg,
            window,
            Utc::now(),
        )?;

        let swept = archive::sweep_unlinked(&self.drain_lock, &mut self.store, &schema, &cfg)?;

        let structural = pull.structural() || drained.archived > 0 || swept > 0;
        let sorted = if structural {
            sort::sort_date_prefix(&mut self.store, &schema)?
        } else {
            false
        };

        Ok(CycleReport {
            drained,
            retired,
            pull,
            push,
            swept,
            sorted,
        })
    }

    /// Inbound edit notification from the editing surface: stamp the
    /// row's edit time so the next push sees it.
    pub fn mark_edited(&mut self, row: usize, at: DateTime<Utc>) -> Result<(), CoreError> {
        let schema = self.schema()?;
        let mut rows = self.store.read_rows()?;
        let len = rows.len();
        let target = rows
            .get_mut(row)
            .ok_or(StoreError::RangeOutOfBounds {
                start: row,
                count: 1,
                len,
            })?;
        schema.set_edited_at(target, Some(at));
        self.store.overwrite_rows(&rows)?;
        Ok(())
    }

    /// Inbound archive request: flag the row, then drain immediately.
    pub fn request_archive(&mut self, row: usize) -> Result<DrainOutcome, CoreError> {
        let schema = self.schema()?;
        let mut rows = self.store.read_rows()?;
        let len = rows.len();
        let target = rows
            .get_mut(row)
            .ok_or(StoreError::RangeOutOfBounds {
                start: row,
                count: 1,
                len,
            })?;
        schema.set_archive_flag(target, true);
        self.store.overwrite_rows(&rows)?;
        self.drain()
    }

    /// Out-of-band drain trigger. Serialized against any other drain by
    /// the lock; times out rather than running concurrently.
    pub fn drain(&mut self) -> Result<DrainOutcome, CoreError> {
        let schema = self.schema()?;
        archive::drain_flagged(
            &self.drain_lock,
            &mut self.store,
            &schema,
            &self.config.sync,
        )
    }

    /// Row counts by state, against the live service window.
    pub fn status(&mut self) -> Result<TableStatus, CoreError> {
        let schema = self.schema()?;
        let events = self.service.list_events(
            self.config.calendar.window_begin,
            self.config.calendar.window_end,
        )?;
        let live_ids: std::collections::HashSet<String> =
            events.into_iter().map(|e| e.id).collect();

        let mut status = TableStatus::default();
        for row in self.store.read_rows()? {
            let record = schema.record(&row);
            status.total += 1;
            if record.archive {
                status.flagged += 1;
            }
            match record.state(&live_ids) {
                RecordState::Linked => status.linked += 1,
                RecordState::Untracked => status.untracked += 1,
                RecordState::Orphaned => status.orphaned += 1,
            }
        }
        Ok(status)
    }

    /// A titleless row is not publishable; its stale identity would
    /// shadow a live event id, so every sync marker on it is blanked.
    fn scrub_untitled(&mut self, schema: &Schema) -> Result<(), CoreError> {
        let mut rows = self.store.read_rows()?;
        let mut changed = false;
        for row in rows.iter_mut() {
            if schema.title(row).is_empty()
                && (schema.event_id(row).is_some()
                    || schema.registered_at(row).is_some()
                    || schema.synced_at(row).is_some()
                    || schema.edited_at(row).is_some())
            {
                schema.set_event_id(row, None);
                schema.set_registered_at(row, None);
                schema.set_synced_at(row, None);
                schema.set_edited_at(row, None);
                changed = true;
            }
        }
        if changed {
            self.store.overwrite_rows(&rows)?;
        }
        Ok(())
    }
}
