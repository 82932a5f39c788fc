//! `tandem onboard`: First-time setup.

use tandem_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");

    println!("Tandem - First-Time Setup");
    println!("=========================\n");

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or re-run with --force to overwrite.\n");
        return Ok(());
    }

    AppConfig::write_default(&config_path)?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set OPENAI_API_KEY (or api_key in {})", config_path.display());
    println!("  2. Optionally set BING_SUBSCRIPTION_KEY to enable web search");
    println!("  3. Run: tandem agent\n");

    Ok(())
}
