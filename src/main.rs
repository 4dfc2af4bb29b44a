// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Pantryscan: AI Grocery & Freshness Scanner
//!
//! Backend API and CLI for detecting grocery items and assessing produce
//! freshness from images using a multimodal AI model.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use pantryscan::config::AppConfig;
use pantryscan::detector::Detector;
use pantryscan::gemini::GeminiClient;
use pantryscan::{PantryscanError, Result};

/// Pantryscan CLI - AI Grocery & Freshness Scanner
#[derive(Parser, Debug)]
#[command(name = "pantryscan")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "0.1.0")]
#[command(about = "AI-powered grocery inventory and produce freshness API", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip the Gemini reachability check on startup
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Analyze a local image file
    Analyze {
        /// Image file to analyze
        path: PathBuf,

        /// Which detection to run
        #[arg(short, long, default_value = "both", value_parser = ["items", "freshness", "both"])]
        kind: String,

        /// Output format for results
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show AI engine status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Pantryscan v0.1.0 - AI Grocery & Freshness Scanner");
    }

    // Load configuration
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port, skip_health_check }) => {
            run_serve(config, host, port, skip_health_check).await
        }
        Some(Commands::Analyze { path, kind, format }) => {
            run_analyze(config, path, &kind, &format).await
        }
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config).await,
        None => {
            // Default: run the API server
            run_serve(config, None, None, false).await
        }
    }
}

/// Build the Gemini-backed detection pipeline from config
fn build_detector(config: &AppConfig) -> (Detector, Arc<GeminiClient>) {
    let api_key = match config.ai_engine.resolve_api_key() {
        Some(key) => {
            info!("API key available: yes");
            key
        }
        None => {
            warn!("No Gemini API key found. Set GOOGLE_API_KEY or GEMINI_API_KEY.");
            String::new()
        }
    };

    let client = Arc::new(GeminiClient::new(
        &config.ai_engine.url,
        &api_key,
        &config.ai_engine.resolve_model(),
        config.ai_engine.timeout_secs,
    ));

    let detector = Detector::new(
        client.clone(),
        config.prompts.clone(),
        config.normalizer.clone(),
        config.uploads.max_bytes(),
    );

    (detector, client)
}

/// Run the API server
async fn run_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    skip_health_check: bool,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let (detector, health_client) = build_detector(&config);

    if !skip_health_check {
        info!("Checking Gemini availability...");
        match health_client.health_check().await {
            Ok(()) => info!("Gemini is reachable (model: {})", health_client.model()),
            Err(e) => warn!("Gemini health check failed: {}. Detection requests will error.", e),
        }
    }

    pantryscan::web::start_server(config, detector).await
}

/// Run detection against a local image file
async fn run_analyze(config: AppConfig, path: PathBuf, kind: &str, format: &str) -> Result<()> {
    let image = std::fs::read(&path)?;
    info!("Analyzing: {:?} ({} bytes)", path, image.len());

    let (detector, _) = build_detector(&config);

    let items = if kind == "items" || kind == "both" {
        Some(detector.detect_inventory(&image).await?)
    } else {
        None
    };
    let produce = if kind == "freshness" || kind == "both" {
        Some(detector.detect_freshness(&image).await?)
    } else {
        None
    };

    match format {
        "json" => {
            let output = serde_json::json!({
                "items": items,
                "produce": produce,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            if let Some(items) = &items {
                println!("Items ({}):", items.len());
                for item in items {
                    println!("  {} x{}", item.item_name, item.count);
                }
            }
            if let Some(produce) = &produce {
                println!("Produce ({}):", produce.len());
                for p in produce {
                    println!(
                        "  {} [{}] {} - {}",
                        p.produce,
                        p.bucket().label(),
                        p.expected_lifespan,
                        p.freshness
                    );
                }
            }
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    let (_, client) = build_detector(&config);

    println!("Pantryscan v0.1.0 Status");
    println!("========================");

    match client.health_check().await {
        Ok(()) => println!("Gemini: Reachable"),
        Err(e) => println!("Gemini: Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Engine URL: {}", config.ai_engine.url);
    println!("  Model: {}", config.ai_engine.resolve_model());
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Upload limit: {} MB", config.uploads.max_size_mb);
    println!("  Uploads dir: {}", config.uploads.dir);

    Ok(())
}

/// Run config commands
async fn run_config_command(
    config: AppConfig,
    action: ConfigCommands,
    config_path: &Path,
) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            if output.exists() {
                return Err(PantryscanError::Config(format!(
                    "{:?} already exists, refusing to overwrite",
                    output
                )));
            }
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Model: {}", config.ai_engine.model);
            println!("  CORS origins: {:?}", config.server.cors_origins);
        }
    }

    Ok(())
}
