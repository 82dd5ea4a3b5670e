//! `optic status`: Show configuration and checkpoint.

use optic_core::memory::CheckpointStore;
use optic_memory::FileCheckpointStore;

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config = opts.load_config()?;
    let checkpoint_path = config.checkpoint.resolved_path();
    let checkpoint = FileCheckpointStore::new(&checkpoint_path).load().await;

    if opts.json {
        let status = serde_json::json!({
            "config_path": opts.config_path,
            "config_found": opts.config_path.exists(),
            "account_id": config.account.user_id,
            "handle": config.account.bare_handle(),
            "interval_secs": config.polling.interval_secs,
            "page_size": config.polling.page_size,
            "provider": config.inference.provider,
            "credentials": config.inference.api_keys.len(),
            "credential_mode": config.inference.credential_mode,
            "checkpoint_path": checkpoint_path,
            "checkpoint": checkpoint,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("🔭 Optic Status");
    println!("===============");
    println!("  Config:       {}", opts.config_path.display());
    println!(
        "  Account:      {}",
        if config.account.user_id.is_empty() {
            "(not set)"
        } else {
            config.account.user_id.as_str()
        }
    );
    println!("  Handle:       @{}", config.account.bare_handle());
    println!("  Interval:     {}s", config.polling.interval_secs);
    println!("  Page size:    {}", config.polling.page_size);
    println!("  Provider:     {}", config.inference.provider);
    println!("  Credentials:  {}", config.inference.api_keys.len());
    println!("  Mode:         {}", config.inference.credential_mode);
    println!("  Checkpoint:   {}", checkpoint_path.display());
    println!(
        "  Last seen:    {}",
        checkpoint
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(none, first run)".into())
    );

    if opts.config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `optic onboard` first");
    }

    Ok(())
}
