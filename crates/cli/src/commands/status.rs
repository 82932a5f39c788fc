//! `tandem status`: Show configuration status.

use tandem_config::AppConfig;

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Tandem Status");
    println!("=============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Agent:        {}", config.identity.name);
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {} (fast: {})", config.default_model, config.fast_model);
    println!("  Temperature:  {}", config.temperature);
    println!("  API key:      {}", if config.has_api_key() { "configured" } else { "missing" });
    println!(
        "  Search:       {}",
        if config.search.api_key.is_some() { "configured" } else { "disabled" }
    );
    println!("  Credit:       {} actions per query", config.agent.action_credit);

    let shares = runtime::budget_shares(&config);
    println!(
        "  Budget:       {} tokens (short-term {}, long-term {}, history {})",
        shares.total, shares.short_term, shares.long_term, shares.history
    );
    println!(
        "  Memory:       {} store, {} embedder",
        config.memory.store, config.memory.embedder
    );
    if config.memory.store == "file" {
        println!("  Memory file:  {}", config.memory.resolved_path().display());
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file - run `tandem onboard` first");
    }

    Ok(())
}
