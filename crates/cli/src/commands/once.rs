//! `optic once`: a single poll cycle.

use optic_core::event::EventBus;
use optic_workflow::CycleOutcome;
use std::sync::Arc;

use super::{GlobalOpts, build_poll_loop};

pub async fn run(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config = opts.load_config()?;
    let poll_loop = build_poll_loop(&config, Arc::new(EventBus::default()))?;

    let report = poll_loop.run_once().await;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("🔭 Optic — one cycle");
        println!("   Outcome:     {:?}", report.outcome);
        println!("   Fetched:     {}", report.fetched);
        println!("   Replied:     {}", report.replied);
        println!("   Skipped:     {}", report.skipped);
        println!(
            "   Checkpoint:  {}",
            report
                .checkpoint
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "(none)".into())
        );
        println!("   Next wait:   {}s", report.next_wait.as_secs());
    }

    if let CycleOutcome::Fatal(message) = report.outcome {
        return Err(format!("Mention fetch rejected: {message}").into());
    }
    Ok(())
}
