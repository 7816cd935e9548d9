//! Dealroom - deal intake, memo drafting and founder outreach backend

use anyhow::Result;
use clap::{Parser, Subcommand};
use dealroom::config::{DealroomConfig, GeneratorProvider};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dealroom")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Deal intake, memo drafting and founder outreach backend")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DEALROOM_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "DEALROOM_LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check configuration and backend selection
    Doctor,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dealroom={},tower_http=info", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = DealroomConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!("Starting Dealroom");
            dealroom::server::serve(config).await?;
        }
        Commands::Doctor => {
            run_doctor(&config, cli.config.as_deref())?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

fn run_doctor(config: &DealroomConfig, path: Option<&std::path::Path>) -> Result<()> {
    println!("Dealroom Doctor");
    println!();

    println!("Configuration:");
    match path {
        Some(path) => println!("  ✓ Loaded {}", path.display()),
        None => println!("  ℹ No configuration file given (defaults + environment)"),
    }
    println!(
        "  Project: {}",
        config.gcp.project_id.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Credentials: {}",
        if config.gcp.has_credentials() {
            "configured"
        } else {
            "none"
        }
    );

    println!();
    println!("Backends:");
    println!("  Deal store: {:?}", config.resolved_deal_backend());
    println!("  Artefact store: {:?}", config.resolved_artefact_backend());
    println!("  Data directory: {}", config.storage.data_dir.display());
    match config.generator.provider {
        GeneratorProvider::Heuristic => println!("  Generator: heuristic"),
        GeneratorProvider::Gemini => {
            let key = if config.generator.resolve_api_key().is_some() {
                "✓ API key found"
            } else {
                "✗ API key missing"
            };
            println!(
                "  Generator: gemini ({}), {} in ${}",
                config.generator.model, key, config.generator.api_key_ref
            );
        }
    }

    println!();
    println!("Doctor check complete!");
    Ok(())
}

fn show_config(config: Option<&DealroomConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
