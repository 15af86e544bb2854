//! dem-restore - offline restoration of persisted event memory images
//!
//! Loads a bank/event configuration and the last persisted entry image, runs
//! the start-of-day restoration against in-memory collaborators and reports:
//! - per-bank restoration results and chronology
//! - re-derived event status
//! - repaired blocks and reported faults

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dem_types::{MemoryConfig, MemoryImage};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod report;

use error::CliResult;
use report::OutputFormat;

/// Event memory restoration CLI
#[derive(Parser)]
#[command(name = "dem-restore")]
#[command(about = "Restore and inspect persisted event memory images", long_about = None)]
#[command(version)]
struct Cli {
    /// Event memory configuration (TOML)
    #[arg(short, long, env = "DEM_CONFIG")]
    config: PathBuf,

    /// Log level
    #[arg(long, env = "DEM_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "DEM_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the bank layout
    Check,

    /// Restore a persisted image and report what was repaired
    Restore {
        /// Persisted image (JSON)
        image: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,

        /// Write the repaired image here
        #[arg(short, long)]
        write: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = MemoryConfig::load(&cli.config)?;
    info!(path = %cli.config.display(), banks = config.banks.len(), "Configuration loaded");

    match cli.command {
        Commands::Check => {
            let mut offset = 0usize;
            for bank in &config.banks {
                let end = offset + bank.capacity as usize;
                println!(
                    "{} {:?} slots {}..{} trigger {:?}",
                    bank.id, bank.kind, offset, end, bank.trigger
                );
                offset = end;
            }
            println!("{} events, {} combination groups", config.events.len(), config.groups.len());
        }
        Commands::Restore {
            image,
            output,
            write,
        } => {
            let image: MemoryImage = serde_json::from_str(&fs::read_to_string(&image)?)?;
            let (summary, repaired) = report::restore(config, &image)?;
            println!("{}", report::render(&summary, output)?);
            if let Some(path) = write {
                fs::write(&path, serde_json::to_string_pretty(&repaired)?)?;
                info!(path = %path.display(), "Repaired image written");
            }
        }
    }
    Ok(())
}
