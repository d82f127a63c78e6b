//! wellbeing-report service entry point.
//!
//! Usage:
//!   wellbeing-report serve [--bind 0.0.0.0:8787]
//!   wellbeing-report extract [FILE]    # reads stdin when FILE is omitted

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wellbeing_report::config::{Config, RuntimeConfig};
use wellbeing_report::http::{HttpState, start_http_server};
use wellbeing_report::{RawModelText, build_orchestrator};

#[derive(Parser)]
#[command(name = "wellbeing-report")]
#[command(about = "Structured wellbeing reports from language model output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Override WELLBEING_HTTP_BIND
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Extract scores, assessment and suggestions from saved model output
    Extract {
        /// File containing raw model text; stdin when omitted
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { bind } => serve(bind).await,
        Commands::Extract { file } => extract(file),
    }
}

fn init_tracing() {
    // RUST_LOG wins; otherwise WELLBEING_LOG_LEVEL or the built-in default
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(RuntimeConfig::load_from_env().log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(bind: Option<SocketAddr>) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(bind) = bind {
        config.runtime.http_bind = bind;
    }
    if config.runtime.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; generation requests will fail until it is");
    }
    let config = Arc::new(config);

    let orchestrator = build_orchestrator(config.clone()).await?;
    start_http_server(HttpState {
        config,
        orchestrator,
    })
    .await?;
    Ok(())
}

fn extract(file: Option<PathBuf>) -> Result<()> {
    let bytes = match file {
        Some(path) => {
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let result = RawModelText::from_bytes(&bytes).extract();
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
