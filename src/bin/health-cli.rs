use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "health-cli")]
#[command(about = "Query the health endpoints of a running service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full system health report
    Health,
    /// Readiness (fails only when unhealthy)
    Ready,
    /// Liveness
    Live,
    /// Circuit breaker summary and per-breaker stats
    Breakers,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Health => "/health",
            Commands::Ready => "/health/ready",
            Commands::Live => "/health/live",
            Commands::Breakers => "/health/breakers",
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).send().await?;
    print_response(res).await
}

/// Pretty-print the body. Non-2xx statuses (503 when unhealthy) still carry
/// a JSON report, so it is printed before exiting non-zero.
async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if status.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error: service returned status {}", status);
        Ok(ExitCode::FAILURE)
    }
}
