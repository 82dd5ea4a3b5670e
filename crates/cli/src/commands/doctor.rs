//! `optic doctor`: Diagnose configuration and credentials.

use optic_config::AppConfig;
use optic_core::InferenceProvider;
use std::path::Path;

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts, probe: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Optic Doctor — Diagnostics");
    println!("=============================\n");

    let mut issues = 0;

    if opts.config_path.exists() {
        println!("  ✅ Config file found at {}", opts.config_path.display());
    } else {
        println!("  ⚠️  No config file — using defaults and environment");
    }

    let config = match AppConfig::load_path(&opts.config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            return Err("1 issue found".into());
        }
    };

    match config.require_runtime() {
        Ok(()) => println!("  ✅ Account, credentials and Twitter tokens present"),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    let checkpoint_path = config.checkpoint.resolved_path();
    match checkpoint_writable(&checkpoint_path) {
        Ok(dir) => println!("  ✅ Checkpoint location writable: {}", dir.display()),
        Err(e) => {
            println!("  ❌ Checkpoint {} not writable: {e}", checkpoint_path.display());
            issues += 1;
        }
    }

    if probe && !config.inference.api_keys.is_empty() {
        println!("\n  Probing {} credential(s)...", config.inference.api_keys.len());
        let (provider, _) = optic_providers::build_from_config(&config)?;
        for credential in config.credentials() {
            match provider.probe(&credential).await {
                Ok(()) => println!("  ✅ {credential} accepted by {}", provider.name()),
                Err(e) => {
                    println!("  ❌ {credential} rejected: {e}");
                    issues += 1;
                }
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
        Ok(())
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} issue(s) found").into())
    }
}

/// Check that the checkpoint could be saved, without creating anything.
///
/// Missing directories are fine as long as the nearest existing ancestor is a
/// directory that accepts a scratch file. Returns the directory written to.
fn checkpoint_writable(path: &Path) -> Result<&Path, String> {
    if path.is_dir() {
        return Err("path is a directory".into());
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let existing = parent
        .ancestors()
        .find(|p| p.exists())
        .ok_or_else(|| format!("no existing ancestor of {}", parent.display()))?;
    if !existing.is_dir() {
        return Err(format!("{} is not a directory", existing.display()));
    }

    let scratch = existing.join(format!(".optic-doctor-{}", std::process::id()));
    std::fs::write(&scratch, b"").map_err(|e| e.to_string())?;
    std::fs::remove_file(&scratch).map_err(|e| e.to_string())?;
    Ok(existing)
}
