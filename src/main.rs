//! statusflow - Workflow definition tool
//!
//! Checks and inspects workflow definition files and manages the workflows
//! kept in a file store.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use statusflow_storage::StorageConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "statusflow")]
#[command(about = "Check, inspect and store statusflow workflow definitions")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "STATUSFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate definition files (JSON or YAML)
    Check {
        /// Definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show initial/final statuses and available actions of a definition
    Inspect {
        /// Definition file
        file: PathBuf,
    },

    /// List workflows in the file store
    List,

    /// Validate definition files and save them into the file store
    Import {
        /// Definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete a workflow from the file store
    Delete {
        /// Workflow id
        id: u64,
    },
}

fn load_config(path: Option<&Path>) -> Result<StorageConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = StorageConfig::from_file(path)?;
            config.apply_env_overrides();
            config.validate()?;
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => StorageConfig::load()?,
    };
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    match commands::execute(&config, cli.command) {
        Ok(output) => {
            println!("{}", output.text);
            if !output.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
