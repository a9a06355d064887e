//! yydb CLI
//!
//! Offline maintenance tools for a yydb data directory.
//!
//! # Commands
//!
//! - `inspect` - Summarize the row log per table
//! - `verify` - Check every record in the row log
//! - `dump` - List row records for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// yydb command-line storage tools.
#[derive(Parser)]
#[command(name = "yydb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize the row log per table
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify row log integrity
    Verify,

    /// Dump row records for debugging
    Dump {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only dump rows for this table id
        #[arg(short, long)]
        table: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data directory path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Data directory path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Dump {
            limit,
            table,
            format,
        } => {
            let path = cli.path.ok_or("Data directory path required for dump")?;
            commands::dump::run(&path, limit, table, &format)?;
        }
        Commands::Version => {
            println!("yydb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Row log format: {}",
                String::from_utf8_lossy(&yydb_storage::ROW_MAGIC)
            );
        }
    }

    Ok(())
}
