//! Row counts by sync state, against the live calendar.

use serde_json::json;

use super::build_engine;

pub fn run(as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (runtime, mut engine) = build_engine()?;
    let _guard = runtime.enter();

    let status = engine.status()?;
    let last_cycle = engine.store().kv_get("last_cycle_at")?;

    if as_json {
        let payload = json!({
            "total": status.total,
            "linked": status.linked,
            "untracked": status.untracked,
            "orphaned": status.orphaned,
            "flagged": status.flagged,
            "lastCycleAt": last_cycle,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{} row(s)", status.total);
    println!("  linked:    {}", status.linked);
    println!("  untracked: {}", status.untracked);
    println!("  orphaned:  {}", status.orphaned);
    println!("  flagged:   {}", status.flagged);
    match last_cycle {
        Some(at) => println!("last cycle: {at}"),
        None => println!("last cycle: never"),
    }
    Ok(())
}
