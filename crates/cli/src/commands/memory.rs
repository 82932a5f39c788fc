//! `tandem memory`: Long-term memory curation.

use std::sync::Arc;

use tandem_config::AppConfig;
use tandem_core::memory::LongTermEntry;
use tandem_memory::{HashEmbedder, LongTermMemory};

use crate::runtime::{self, Runtime};

/// Open long-term memory without requiring an API key unless the
/// configured embedder needs one.
fn open() -> Result<(AppConfig, LongTermMemory), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.memory.embedder == "provider" && config.has_api_key() {
        let runtime = Runtime::from_config(config)?;
        let memory = runtime.long_term.clone();
        return Ok((runtime.config, memory));
    }
    let memory = LongTermMemory::new(
        runtime::build_store(&config)?,
        Arc::new(HashEmbedder::new(config.memory.hash_dimensions)),
    );
    Ok((config, memory))
}

pub async fn stats() -> Result<(), Box<dyn std::error::Error>> {
    let (config, memory) = open()?;

    println!("Memory Statistics");
    println!("=================");
    println!("  Store:      {}", memory.store().name());
    println!("  Embedder:   {}", config.memory.embedder);
    println!("  Entries:    {}", memory.count().await?);
    println!(
        "  Thresholds: relevance <= {:.2}, dedup <= {:.2} (cosine distance)",
        config.memory.relevance_threshold, config.memory.dedup_threshold
    );

    if config.memory.store == "file" {
        let path = config.memory.resolved_path();
        if path.exists() {
            let size_kb = std::fs::metadata(&path)?.len() as f64 / 1024.0;
            println!("  File:       {} ({:.1} KB)", path.display(), size_kb);
        } else {
            println!("  File:       {} (not created yet)", path.display());
        }
    }

    Ok(())
}

pub async fn list(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, memory) = open()?;
    let mut entries = memory.list().await?;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if entries.is_empty() {
        println!("No long-term memories yet.");
        return Ok(());
    }
    for entry in entries.iter().take(limit) {
        print_entry(entry, None);
    }
    if entries.len() > limit {
        println!("... {} more", entries.len() - limit);
    }
    Ok(())
}

pub async fn search(query: &str, limit: usize, threshold: Option<f32>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, memory) = open()?;
    let threshold = threshold.unwrap_or(config.memory.relevance_threshold);

    println!("Searching memories for: \"{query}\" (distance <= {threshold:.2})");
    println!();

    let hits = memory.query(query, limit, threshold).await?;
    if hits.is_empty() {
        println!("  No memories within the threshold.");
    }
    for hit in &hits {
        print_entry(&hit.entry, Some(hit.distance));
    }
    Ok(())
}

pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, memory) = open()?;
    if memory.delete(id).await? {
        println!("Deleted {id}");
    } else {
        println!("No entry with id {id}");
    }
    Ok(())
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("This will delete ALL long-term memories permanently.");
        println!("Run with --confirm to proceed:");
        println!("  tandem memory clear --confirm");
        return Ok(());
    }

    let (_config, memory) = open()?;
    let count = memory.count().await?;
    memory.clear().await?;
    println!("Cleared {count} memories.");
    Ok(())
}

fn print_entry(entry: &LongTermEntry, distance: Option<f32>) {
    let preview: String = entry.render().chars().take(80).collect();
    match distance {
        Some(d) => println!("  [{d:.3}] {}  {preview}", entry.id),
        None => println!(
            "  {}  {}  {preview}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.id
        ),
    }
}
