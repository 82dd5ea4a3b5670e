//! `optic onboard`: First-time setup.

use optic_config::AppConfig;

use super::GlobalOpts;

pub async fn run(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = &opts.config_path;

    println!("🔭 Optic — First-Time Setup");
    println!("===========================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("✅ Created config directory: {}", dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set account.user_id and account.handle in the config");
    println!("   2. Export MOONDREAM_API_KEY_1 (and _2, _3, … for rotation)");
    println!("   3. Export TWITTER_BEARER_TOKEN and TWITTER_USER_ACCESS_TOKEN");
    println!("   4. Run: optic doctor, then optic run\n");

    Ok(())
}
