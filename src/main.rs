use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slotbot::config::Config;
use slotbot::models::ParsedPage;
use slotbot::parser::SchedulePageParser;
use slotbot::pipeline::BookingPipeline;

#[derive(Parser)]
#[command(
    name = "slotbot",
    version,
    about = "Books recurring class slots on a OneFitStop listing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one booking pass and send the report
    Book {
        /// Configuration file (TOML); SLOTBOT_* variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Parse a saved listing page and print its slots
    Parse {
        /// HTML file saved from the class listing
        html_file: PathBuf,
    },

    /// Load and validate a configuration without contacting the site
    CheckConfig {
        /// Configuration file (TOML); SLOTBOT_* variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Book { config } => {
            tracing::info!(config = ?config, "Starting book command");
            book(config.as_deref()).await?;
        }

        Commands::Parse { html_file } => {
            tracing::info!(file = %html_file.display(), "Starting parse command");
            parse(&html_file)?;
        }

        Commands::CheckConfig { config } => {
            check_config(config.as_deref())?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("slotbot=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("slotbot=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to initialize tracing")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize tracing")?;
        }
    }

    Ok(())
}

async fn book(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let pipeline = BookingPipeline::from_config(config)?;

    let report = pipeline.run_and_notify().await?;

    println!("{report}");
    Ok(())
}

fn parse(html_file: &Path) -> Result<()> {
    let html = std::fs::read_to_string(html_file)
        .with_context(|| format!("Failed to read {}", html_file.display()))?;

    let parser = SchedulePageParser::new();
    match parser.parse(&html)? {
        ParsedPage::NoClasses => println!("No classes scheduled (end of listing)"),
        ParsedPage::Schedule(page) => {
            println!("{} slots", page.len());
            for slot in page.slots() {
                println!(
                    "  {} {} {}  {:<18} {}",
                    slot.day,
                    slot.time,
                    slot.date,
                    slot.classification,
                    slot.action_url.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}

fn check_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    config.validate()?;

    let today = chrono::Local::now().date_naive();
    println!("Configuration OK");
    println!("  Site: {} (trid {})", config.site.base_url, config.site.trid);
    println!("  Account: {}", config.account.email);
    println!("  Desired slots:");
    for slot in &config.booking.desired_slots {
        println!("    {slot}");
    }
    println!("  Windows:");
    for window in config.date_windows(today) {
        println!("    {window}");
    }
    println!(
        "  Notifications: {}",
        config.notifications.webhook_url.as_deref().unwrap_or("log only")
    );
    Ok(())
}
