///
/// This module implements the CLI interface for blob-relay: command parsing, the async
/// entrypoint [`run`], and wiring of the loaded config into a [`Relay`].
///
/// All copy semantics (naming, idempotence check, error classification) live in
/// `blob-relay-core`. This module is strictly glue.
///
/// ## Commands
/// - `copy`: copy one blob that already sits in the source container
/// - `upload`: copy local content (a file, or stdin with `-`) as if it had been uploaded
/// - `serve`: run the Event Grid webhook
use crate::load_config::load_config;
use crate::relay::Relay;
use crate::server;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Port variable set by the Functions host for custom handlers.
pub const CUSTOM_HANDLER_PORT_VAR: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";
const DEFAULT_PORT: u16 = 8080;

/// CLI for blob-relay: copy uploaded blobs into the processed container.
#[derive(Parser)]
#[clap(
    name = "blob-relay",
    version,
    about = "Copy blobs uploaded to an unprocessed container into a processed container"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy one blob from the source container to the destination container
    Copy {
        /// Path to the YAML config file (defaults apply when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
        /// Name of the blob in the source container
        #[clap(long)]
        name: String,
    },
    /// Copy local content into the destination container under its derived name
    Upload {
        #[clap(long)]
        config: Option<PathBuf>,
        /// Source blob name the content is copied under
        #[clap(long)]
        name: String,
        /// File to read, or `-` for stdin
        #[clap(long)]
        file: PathBuf,
    },
    /// Serve the Event Grid webhook
    Serve {
        #[clap(long)]
        config: Option<PathBuf>,
        /// Listen address; defaults to 0.0.0.0 on FUNCTIONS_CUSTOMHANDLER_PORT or 8080
        #[clap(long)]
        addr: Option<SocketAddr>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Copy { config, name } => {
            let relay = Relay::connect(&load_config(config)?)?;
            tracing::info!(command = "copy", blob = %name, "Copying blob");
            let outcome = relay
                .copy_named(&name)
                .await
                .with_context(|| format!("Error processing blob {name}"))?;
            tracing::info!(command = "copy", ?outcome, "Copy finished");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Upload { config, name, file } => {
            let relay = Relay::connect(&load_config(config)?)?;
            tracing::info!(command = "upload", blob = %name, file = %file.display(), "Copying local content");
            let result = if file.as_os_str() == "-" {
                relay.copy_stream(&name, tokio::io::stdin()).await
            } else {
                let handle = tokio::fs::File::open(&file)
                    .await
                    .with_context(|| format!("Failed to open {}", file.display()))?;
                relay.copy_stream(&name, handle).await
            };
            let outcome = result.with_context(|| format!("Error processing blob {name}"))?;
            tracing::info!(command = "upload", ?outcome, "Copy finished");
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Serve { config, addr } => {
            let relay = Relay::connect(&load_config(config)?)?;
            let addr = match addr {
                Some(addr) => addr,
                None => default_addr()?,
            };
            server::serve(relay, addr).await
        }
    }
}

fn default_addr() -> Result<SocketAddr> {
    let port = match std::env::var(CUSTOM_HANDLER_PORT_VAR) {
        Ok(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("{CUSTOM_HANDLER_PORT_VAR} must be a port number"))?,
        Err(_) => DEFAULT_PORT,
    };
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}
