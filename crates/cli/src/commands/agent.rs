//! `tandem agent`: Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use tandem_agent::{AgentLoop, AgentReply, AgentSession, ReplyOutcome};
use tandem_config::AppConfig;
use tandem_core::event::{AgentEvent, ChannelSink, SessionEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::runtime::Runtime;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!("    TANDEM_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = Runtime::from_config(config)?;
    let (sink, mut events) = ChannelSink::new();
    let agent = runtime.agent(Arc::new(sink));
    let mut session = runtime.session();

    if let Some(msg) = message {
        // Single message mode: progress on stderr, answer on stdout
        let reply = run_query(&agent, &mut session, &msg, &mut events, false).await;
        println!("{}", reply.response);
        return Ok(());
    }

    println!();
    println!("  Tandem Agent - Interactive Mode");
    println!();
    println!("  Provider:  {}", runtime.config.default_provider);
    println!("  Model:     {}", runtime.config.default_model);
    println!("  Memory:    {} long-term entries", runtime.long_term.count().await?);
    println!("  Agent:     {}", session.identity().name);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C stops the current query; type 'exit' or press Ctrl+D to quit.");
    println!();

    let stop = session.stop_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let reply = run_query(&agent, &mut session, line, &mut events, true).await;
        if matches!(reply.outcome, ReplyOutcome::Exhausted | ReplyOutcome::Stopped) {
            println!("  {} > {}", session.identity().name, reply.response);
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Run one query, printing events as they arrive.
async fn run_query(
    agent: &AgentLoop,
    session: &mut AgentSession,
    query: &str,
    events: &mut UnboundedReceiver<SessionEvent>,
    interactive: bool,
) -> AgentReply {
    let name = session.identity().name.clone();
    let run = agent.run(session, query);
    tokio::pin!(run);

    let reply = loop {
        tokio::select! {
            reply = &mut run => break reply,
            Some(event) = events.recv() => print_event(&name, &event.event, interactive),
        }
    };
    while let Ok(event) = events.try_recv() {
        print_event(&name, &event.event, interactive);
    }
    reply
}

fn print_event(name: &str, event: &AgentEvent, interactive: bool) {
    match event {
        AgentEvent::Speak { content } if interactive => {
            for line in content.lines() {
                println!("  {name} > {line}");
            }
        }
        // In single-message mode the answer goes to stdout once, at the end.
        AgentEvent::Speak { .. } => {}
        other => eprintln!("  [{}] {other}", other.style()),
    }
}
