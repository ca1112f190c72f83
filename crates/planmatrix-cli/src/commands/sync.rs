//! Run one full sync cycle.

use chrono::Utc;

use super::build_engine;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (runtime, mut engine) = build_engine()?;
    let _guard = runtime.enter();

    let report = engine.run_cycle()?;
    engine
        .store()
        .kv_set("last_cycle_at", &Utc::now().to_rfc3339())?;

    println!("Sync complete.");
    if report.drained.archived > 0 {
        println!("  archived:  {} row(s)", report.drained.archived);
    }
    if report.retired > 0 {
        println!("  retired:   {} calendar event(s)", report.retired);
    }
    println!(
        "  pulled:    {} new, {} updated, {} removed",
        report.pull.imported, report.pull.updated, report.pull.removed
    );
    println!(
        "  pushed:    {} created, {} updated, {} orphaned",
        report.push.created, report.push.updated, report.push.orphaned
    );
    if report.push.retries > 0 {
        println!("  retries:   {} rate-limited call(s) retried", report.push.retries);
    }
    if report.swept > 0 {
        println!("  swept:     {} unlinked row(s) to the archive", report.swept);
    }
    if report.sorted {
        println!("  table re-sorted");
    }
    Ok(())
}
