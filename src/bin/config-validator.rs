//! # Aggregator Configuration Validator
//!
//! Command-line tool for validating aggregator configuration directories
//! across environments before deploying the scheduler.

use batch_aggregator::config::{AggregatorConfig, ConfigLoader};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate batch aggregator configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path
    #[arg(short, long, default_value = "config")]
    config_dir: String,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load, validate and print the merged configuration
    Validate,

    /// List environments with an override file in the configuration directory
    Environments,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::Validate) | None => validate(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            process::exit(1);
        }
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔧 Validating Aggregator Configuration");
    println!("Environment: {}", cli.environment);
    println!("Config Directory: {}", cli.config_dir);
    println!();

    let config = match ConfigLoader::new(&cli.config_dir)
        .with_environment(&cli.environment)
        .load()
    {
        Ok(config) => {
            println!("✅ Configuration loaded and validated");
            config
        }
        Err(e) => {
            println!("❌ Failed to load configuration: {}", e);
            return Err(Box::new(e));
        }
    };

    print_summary(&config);
    println!();
    println!("{}", serde_json::to_string_pretty(&config.to_json())?);
    Ok(())
}

fn print_summary(config: &AggregatorConfig) {
    println!("   📦 Landing zone bucket: {}", config.buckets.landing_zone);
    println!("   📦 Raw landing bucket:  {}", config.buckets.raw);
    println!(
        "   🗂️  Watermarks: {}/{}",
        config.buckets.document_db, config.document_db_root
    );
    println!(
        "   📨 Tier topics: {} / {} / {}",
        config.topics.batch_process_small,
        config.topics.batch_process_medium,
        config.topics.batch_process_large
    );
    println!("   ⏳ Delay topic: {}", config.topics.delay);
    println!("   ❌ Error topic: {}", config.topics.error);
}

fn list_environments(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("📋 Available Environments:");

    let config_dir = Path::new(&cli.config_dir);
    if !config_dir.exists() {
        println!(
            "❌ Configuration directory not found: {}",
            config_dir.display()
        );
        return Ok(());
    }

    let mut environments = Vec::new();
    for entry in std::fs::read_dir(config_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(environment) = name
            .strip_prefix("aggregator.")
            .and_then(|rest| rest.strip_suffix(".toml"))
        {
            environments.push(environment.to_string());
        }
    }

    environments.sort();
    for environment in environments {
        println!("  • {}", environment);
    }

    Ok(())
}
