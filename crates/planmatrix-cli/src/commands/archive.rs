//! Archive management.
//!
//! Flagging and draining are store-only operations; no calendar access is
//! needed, so these work offline and without a configured calendar.

use clap::Subcommand;

use planmatrix_core::sync::archive::{drain_flagged, DrainLock};
use planmatrix_core::{Config, MatrixDb, Schema, TableStore};

#[derive(Subcommand)]
pub enum ArchiveAction {
    /// Flag a row (0-based) for archiving and drain immediately
    Flag { row: usize },
    /// Drain every currently flagged row into the archive log
    Drain,
}

pub fn run(action: ArchiveAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut store = MatrixDb::open()?;
    let schema = Schema::resolve(&store.header()?)?;

    if let ArchiveAction::Flag { row } = &action {
        let mut rows = store.read_rows()?;
        let len = rows.len();
        let target = rows
            .get_mut(*row)
            .ok_or_else(|| format!("row {row} out of bounds (table has {len} rows)"))?;
        schema.set_archive_flag(target, true);
        store.overwrite_rows(&rows)?;
    }

    let lock = DrainLock::new();
    let outcome = drain_flagged(&lock, &mut store, &schema, &config.sync)?;
    println!(
        "Archived {} row(s) in {} pass(es).",
        outcome.archived, outcome.passes
    );
    println!("Their calendar events are retired on the next sync.");
    Ok(())
}
