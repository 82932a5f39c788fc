//! Tandem CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write a default config
//! - `agent`: Interactive chat or single-message mode
//! - `memory`: Inspect and curate long-term memory
//! - `status`: Show configuration status

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "tandem",
    about = "Tandem - a planning agent with short- and long-term memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Inspect and curate long-term memory
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },

    /// Show configuration status
    Status,
}

#[derive(Subcommand)]
enum MemoryCommands {
    /// Show store statistics
    Stats,

    /// List stored entries
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Search by similarity
    Search {
        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Distance threshold (defaults to the configured relevance threshold)
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Delete one entry by id
    Delete { id: String },

    /// Delete every entry
    Clear {
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard { force } => commands::onboard::run(force).await?,
        Commands::Agent { message } => commands::agent::run(message).await?,
        Commands::Memory { command } => match command {
            MemoryCommands::Stats => commands::memory::stats().await?,
            MemoryCommands::List { limit } => commands::memory::list(limit).await?,
            MemoryCommands::Search {
                query,
                limit,
                threshold,
            } => commands::memory::search(&query, limit, threshold).await?,
            MemoryCommands::Delete { id } => commands::memory::delete(&id).await?,
            MemoryCommands::Clear { confirm } => commands::memory::clear(confirm).await?,
        },
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
