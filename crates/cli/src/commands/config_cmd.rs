//! `optic config`: Configuration management commands.

use optic_config::AppConfig;

use super::GlobalOpts;

const REDACTED: &str = "[REDACTED]";

pub async fn validate(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load_path(&opts.config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            match config.require_runtime() {
                Ok(()) => println!("   ✅ Ready to run"),
                Err(e) => println!("   ⚠️  {e}"),
            }

            println!();
            println!("   Account:   {}", config.account.user_id);
            println!("   Handle:    @{}", config.account.bare_handle());
            println!("   Provider:  {}", config.inference.provider);
            println!("   Keys:      {}", config.inference.api_keys.len());
            println!("   Mode:      {}", config.inference.credential_mode);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config = redacted(opts.load_config()?);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", opts.config_path.display());
    Ok(())
}

/// Replace every secret with a placeholder, keeping the pool size visible.
fn redacted(mut config: AppConfig) -> AppConfig {
    for key in &mut config.inference.api_keys {
        *key = REDACTED.into();
    }
    if config.twitter.bearer_token.is_some() {
        config.twitter.bearer_token = Some(REDACTED.into());
    }
    if config.twitter.user_access_token.is_some() {
        config.twitter.user_access_token = Some(REDACTED.into());
    }
    config
}
