use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "orchestrator-cli")]
#[command(about = "Management CLI for the AI Provider Orchestrator", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate status: providers, routing, preferred provider
    Status,
    /// Per-provider health, circuit breaker and performance
    Providers,
    /// Reset one provider's circuit breaker, or all with --all
    ResetBreaker {
        provider: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Replace the failover priority list (e.g. `openai ollama`)
    SetPriority { providers: Vec<String> },
    /// Replace the degradation fallback order
    SetFallback { providers: Vec<String> },
    /// Enable or disable service degradation
    Degradation {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Reset performance counters for one provider or all
    ResetPerformance { provider: Option<String> },
    /// Run a health check against one provider now
    Test { provider: String },
    /// List models per provider
    Models,
    /// Degradation status report
    DegradationStatus,
    /// Error counts by type and provider, with recent errors
    Errors,
    /// Provider reliability and recommended actions
    ErrorAnalysis,
    /// Clear error counters and history
    ClearErrors,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, body): (Method, String, Option<Value>) = match cli.command {
        Commands::Status => (Method::GET, "/admin/status".into(), None),
        Commands::Providers => (Method::GET, "/admin/providers".into(), None),
        Commands::ResetBreaker { provider, all } => match (provider, all) {
            (_, true) => (Method::POST, "/admin/circuit-breakers/reset".into(), None),
            (Some(p), false) => (Method::POST, format!("/admin/providers/{}/reset", p), None),
            (None, false) => {
                eprintln!("Error: name a provider or pass --all");
                std::process::exit(2);
            }
        },
        Commands::SetPriority { providers } => (
            Method::PUT,
            "/admin/routing/priority".into(),
            Some(json!({ "providers": providers })),
        ),
        Commands::SetFallback { providers } => (
            Method::PUT,
            "/admin/routing/fallback".into(),
            Some(json!({ "providers": providers })),
        ),
        Commands::Degradation { enabled } => (
            Method::PUT,
            "/admin/routing/degradation".into(),
            Some(json!({ "enabled": enabled })),
        ),
        Commands::ResetPerformance { provider } => {
            let path = match provider {
                Some(p) => format!("/admin/performance/reset?provider={}", p),
                None => "/admin/performance/reset".into(),
            };
            (Method::POST, path, None)
        }
        Commands::Test { provider } => (Method::POST, format!("/admin/providers/{}/test", provider), None),
        Commands::Models => (Method::GET, "/admin/models".into(), None),
        Commands::DegradationStatus => (Method::GET, "/admin/degradation".into(), None),
        Commands::Errors => (Method::GET, "/admin/errors/dashboard".into(), None),
        Commands::ErrorAnalysis => (Method::GET, "/admin/errors/analysis".into(), None),
        Commands::ClearErrors => (Method::POST, "/admin/errors/clear".into(), None),
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
