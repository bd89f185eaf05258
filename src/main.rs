//! docwire - Command-line interface for document database servers
//!
//! Runs one-shot commands over the docwire client driver.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use docwire_client::Client;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docwire")]
#[command(about = "Command-line interface for document database servers")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "DOCWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Server address (host:port)
    #[arg(short, long)]
    server: Option<String>,

    /// Database name
    #[arg(short, long)]
    database: Option<String>,

    /// Reply deadline in seconds
    #[arg(long)]
    request_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert a document
    Insert {
        /// Collection name
        collection: String,

        /// Document JSON (or @file.json to read from file)
        document: String,
    },

    /// Query a collection
    Find {
        /// Collection name
        collection: String,

        /// Query JSON (matches everything when omitted)
        query: Option<String>,

        /// Field projection JSON
        #[arg(short, long)]
        fields: Option<String>,

        /// Sort order JSON
        #[arg(long)]
        sort: Option<String>,

        /// Number of documents to skip
        #[arg(long, default_value = "0")]
        skip: i32,

        /// Maximum documents to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Documents per batch (0 = server default)
        #[arg(short, long, default_value = "0")]
        batch_size: i32,
    },

    /// Count documents in a collection
    Count {
        /// Collection name
        collection: String,

        /// Query JSON
        query: Option<String>,
    },

    /// Update documents
    Update {
        /// Collection name
        collection: String,

        /// Selector JSON
        selector: String,

        /// Update JSON
        update: String,

        /// Insert when nothing matches
        #[arg(long)]
        upsert: bool,

        /// Update every match instead of the first
        #[arg(long)]
        multi: bool,
    },

    /// Remove documents
    Remove {
        /// Collection name
        collection: String,

        /// Selector JSON (removes everything when omitted)
        selector: Option<String>,

        /// Remove only the first match
        #[arg(long)]
        first: bool,
    },

    /// Run a database command
    Command {
        /// Command JSON, e.g. '{"ping": 1}'
        command: String,
    },

    /// Drop a collection
    Drop {
        /// Collection name
        collection: String,
    },

    /// Show database statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("{}: {}", "Configuration error".red(), e);
        e
    })?;
    if let Some(server) = cli.server {
        config.server.addr = server;
    }
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(secs) = cli.request_timeout {
        config.server.request_timeout_secs = Some(secs);
    }
    config.validate()?;

    tracing::info!("Connecting to {}", config.server.addr);
    let client = Client::connect(config.connection_config())
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;

    let result = commands::execute(&client, &config.database, cli.command).await;

    match result {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;

    Ok(())
}
