//! Replica CLI
//!
//! Command-line tools for synchronized local replicas.
//!
//! # Commands
//!
//! - `resolve` - Build a sync configuration and show the resolved locator
//! - `layout` - Show where a replica is stored locally
//! - `open` - Open a file-backed replica against a simulated server

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Synchronized replica tools.
#[derive(Parser)]
#[command(name = "replica")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Identity of the authority owning the remote store
    #[arg(global = true, short, long, default_value = "demo")]
    identity: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a sync configuration and show the resolved locator
    Resolve {
        /// Unresolved locator, e.g. realms://example.org/~/notes
        locator: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show where a replica is stored locally
    Layout {
        /// Unresolved locator
        locator: String,

        /// Storage root directory
        #[arg(short, long)]
        root: PathBuf,
    },

    /// Open a file-backed replica against a simulated server
    Open {
        /// Unresolved locator
        locator: String,

        /// Storage root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Wait for the initial server download
        #[arg(short, long)]
        wait: bool,

        /// Wait bound in seconds (0 or negative waits indefinitely)
        #[arg(short, long, allow_negative_numbers = true)]
        timeout: Option<f64>,

        /// Read the open policy from a JSON file instead
        #[arg(long, conflicts_with_all = ["wait", "timeout"])]
        policy: Option<PathBuf>,

        /// Simulated download duration in milliseconds
        #[arg(long, default_value = "0")]
        download_ms: u64,

        /// Make the simulated download fail with this message
        #[arg(long)]
        fail: Option<String>,

        /// Use the asynchronous open path
        #[arg(long = "async")]
        asynchronous: bool,

        /// Treat the calling thread as non-blockable
        #[arg(long)]
        non_blockable: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Resolve { locator, format } => {
            commands::resolve::run(&cli.identity, &locator, &format)?;
        }
        Commands::Layout { locator, root } => {
            commands::layout::run(&cli.identity, &locator, &root)?;
        }
        Commands::Open {
            locator,
            root,
            wait,
            timeout,
            policy,
            download_ms,
            fail,
            asynchronous,
            non_blockable,
        } => {
            let options = commands::open::OpenOptions {
                root,
                wait,
                timeout,
                policy_file: policy,
                download_ms,
                fail,
                asynchronous,
                non_blockable,
            };
            commands::open::run(&cli.identity, &locator, options)?;
        }
        Commands::Version => {
            println!("Replica CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
