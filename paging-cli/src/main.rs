//! # pagekit
//!
//! CLI tool for exercising the pagekit paging engine.
//!
//! ## Commands
//!
//! - `simulate`: Page through a synthetic source and print every update
//! - `config`: Print the effective paging configuration
//!
//! ## Example
//!
//! ```bash
//! # Load five pages of ten items, failing every fourth call
//! pagekit simulate --pages 5 --page-size 10 --fail-every 4
//!
//! # Same run, one JSON object per update
//! pagekit simulate --pages 5 --json
//!
//! # Show what a config file resolves to
//! pagekit config --config paging.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{show, simulate};

/// CLI tool for exercising the pagekit paging engine.
#[derive(Parser, Debug)]
#[command(name = "pagekit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Paging configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Page through a synthetic source and print the fused update stream
    Simulate {
        /// Number of pages the source holds
        #[arg(long, default_value = "5")]
        pages: u64,

        /// Items per page (overrides the config file)
        #[arg(long)]
        page_size: Option<usize>,

        /// Make every Nth page empty (it still names a next key)
        #[arg(long)]
        empty_every: Option<u64>,

        /// Fail every Nth source call
        #[arg(long)]
        fail_every: Option<u64>,

        /// Stop after this many append requests
        #[arg(long)]
        appends: Option<usize>,

        /// Give up after this many retries
        #[arg(long, default_value = "3")]
        max_retries: u32,

        /// Random delay per source call, up to this many milliseconds
        #[arg(long, default_value = "0")]
        jitter_ms: u64,

        /// Print one JSON object per update
        #[arg(long)]
        json: bool,
    },

    /// Print the effective paging configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paging = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            pages,
            page_size,
            empty_every,
            fail_every,
            appends,
            max_retries,
            jitter_ms,
            json,
        } => {
            let args = simulate::SimulateArgs {
                pages,
                page_size,
                empty_every,
                fail_every,
                appends,
                max_retries,
                jitter_ms,
                json,
            };
            let mut stdout = std::io::stdout();
            simulate::run(paging, &args, &mut stdout).await?;
        }
        Commands::Config => {
            show::run(&paging, &mut std::io::stdout())?;
        }
    }

    Ok(())
}
