//! AI Provider Orchestrator (v1)
//!
//! Routes chat and embedding calls across interchangeable AI backends with
//! circuit breakers, retry with backoff, priority failover and a degradation
//! fallback chain.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────────┐
//!                      │                  PROVIDER ORCHESTRATOR                    │
//!                      │                                                          │
//!   caller             │  ┌──────────────┐    ┌──────────────┐    ┌────────────┐  │
//!   ───────────────────┼─▶│ orchestrator │───▶│   registry   │───▶│ providers  │──┼──▶ OpenAI
//!                      │  │ retry/failover│   │ handle: cb + │    │ openai /   │  │
//!   ◀──────────────────┼──│ degradation  │◀───│ perf + flag  │◀───│ ollama     │──┼──▶ Ollama
//!   Outcome / error    │  └──────┬───────┘    └──────▲───────┘    └────────────┘  │
//!                      │         │                   │                            │
//!                      │         ▼                   │                            │
//!                      │  ┌──────────────┐    ┌──────┴───────┐                    │
//!                      │  │  resilience  │    │    health    │  periodic probes   │
//!                      │  │ breaker/back-│    │   monitor    │                    │
//!                      │  │ off/timeouts │    └──────────────┘                    │
//!                      │  └──────────────┘                                        │
//!                      │  ┌────────────────────────────────────────────────────┐ │
//!                      │  │              Cross-Cutting Concerns                 │ │
//!                      │  │  config (+watch) · observability · lifecycle · admin │ │
//!                      │  └────────────────────────────────────────────────────┘ │
//!                      └──────────────────────────────────────────────────────────┘
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use provider_orchestrator::config::loader::{load_config, load_preset};
use provider_orchestrator::config::{OrchestratorConfig, Preset};
use provider_orchestrator::lifecycle::{signals, startup};
use provider_orchestrator::observability::logging::init_logging;
use provider_orchestrator::providers::factory::build_providers;
use provider_orchestrator::providers::{ChatMessage, ChatOptions};
use provider_orchestrator::{Orchestrator, Outcome};

#[derive(Parser)]
#[command(name = "provider-orchestrator", version)]
#[command(about = "Resilient routing of chat and embedding calls across AI providers", long_about = None)]
struct Args {
    /// TOML configuration file. Routing changes are hot-reloaded.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preset used when no configuration file is given (development, production, testing).
    #[arg(long, default_value = "production")]
    preset: Preset,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run health monitoring, config reload and the admin API until signalled (default)
    Serve,
    /// Send one prompt through the orchestrator and print the answer
    Chat {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        stream: bool,
    },
    /// Embed one text and report which provider served it
    Embed {
        text: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// Probe every configured provider once
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_preset(args.preset)?,
    };
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "provider-orchestrator starting"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, args.config.as_deref()).await?,
        Command::Chat {
            prompt,
            system,
            model,
            stream,
        } => {
            let orchestrator = one_shot(&config)?;
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(ChatMessage::system(system));
            }
            messages.push(ChatMessage::user(prompt));
            let options = ChatOptions::default();

            if stream {
                let outcome = orchestrator
                    .chat_stream(&messages, model.as_deref(), &options)
                    .await?;
                report_degraded(&outcome);
                let mut fragments = outcome.into_value();
                let mut stdout = std::io::stdout();
                while let Some(fragment) = fragments.next().await {
                    write!(stdout, "{}", fragment?)?;
                    stdout.flush()?;
                }
                writeln!(stdout)?;
            } else {
                let outcome = orchestrator.chat(&messages, model.as_deref(), &options).await?;
                report_degraded(&outcome);
                println!("{}", outcome.value().content);
            }
        }
        Command::Embed { text, model } => {
            let orchestrator = one_shot(&config)?;
            let outcome = orchestrator.embed(&text, model.as_deref()).await?;
            report_degraded(&outcome);
            println!(
                "{} dimensions from {}",
                outcome.value().len(),
                outcome.served_by()
            );
        }
        Command::Check => {
            let orchestrator = one_shot(&config)?;
            for provider in orchestrator.registry().provider_types() {
                let report = orchestrator.test_provider(provider).await?;
                println!("{}: {}", provider, serde_json::to_string(&report)?);
            }
        }
    }

    Ok(())
}

async fn serve(
    config: OrchestratorConfig,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = startup::start(config, config_path).await?;

    let signal = signals::wait_for_shutdown().await;
    tracing::info!(signal, "Shutdown signal received");

    services.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Orchestrator without background tasks, for single commands.
fn one_shot(config: &OrchestratorConfig) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let providers = build_providers(config)?;
    if providers.is_empty() {
        return Err("no AI providers configured".into());
    }
    Ok(Orchestrator::new(providers, config))
}

fn report_degraded<T>(outcome: &Outcome<T>) {
    if let Outcome::Degraded {
        fallback,
        original_error,
        ..
    } = outcome
    {
        eprintln!("(degraded: served by {} after: {})", fallback, original_error);
    }
}
