//! Assetbook MCP Server
//!
//! Line-delimited JSON-RPC 2.0 over stdin/stdout. Logs go to stderr.
//!
//! Tools:
//! - preview_run: Classify every in-service asset for a month and store the preview
//! - apply_run: Commit a stored preview (once)
//! - asset_schedule: Month-by-month plan of one asset
//! - reset_asset: Clear accumulated depreciation and the last run date
//! - set_depreciation_status: Pause or resume an asset
//! - yearly_summary: Depreciation per class and month for a year
//! - class_positions: Cost, accumulated depreciation and net value per class

mod protocol;
mod tools;

use assetbook::{Assetbook, Settings};
use protocol::Server;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, Level};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compact stderr logging; `RUST_LOG` wins over the configured level
fn init_logging(configured: &str) {
    let level = env::var("RUST_LOG")
        .ok()
        .and_then(|v| Level::from_str(v.trim()).ok())
        .or_else(|| Level::from_str(configured).ok())
        .unwrap_or(Level::INFO);

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        // stdout carries the protocol; keep stderr free of escape codes
        .with_ansi(false)
        .with_target(false)
        .with_max_level(level)
        .compact()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Logging already initialized: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::from_env();
    init_logging(settings.as_ref().map(|s| s.log_level.as_str()).unwrap_or("info"));

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!(code = %e.code, "{}", e);
            return ExitCode::from(2);
        }
    };

    let book = match Assetbook::open(&settings) {
        Ok(book) => book,
        Err(e) => {
            error!(code = %e.code, path = %settings.data_path.display(), "{}", e);
            return ExitCode::from(1);
        }
    };

    info!(version = SERVER_VERSION, protocol = protocol::PROTOCOL_VERSION, "Assetbook MCP server started");

    let mut server = Server::new(book);
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        match lines.next_line().await {
            Ok(None) => {
                info!("Client disconnected (EOF)");
                break;
            }
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Notifications produce no response
                let Some(response) = server.handle_line(line).await else {
                    continue;
                };

                let response_json = match serde_json::to_string(&response) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Error encoding response: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write_line(&mut stdout, &response_json).await {
                    error!("Error writing response: {}", e);
                    break;
                }
            }
            Err(e) => {
                error!("Error reading input: {}", e);
                break;
            }
        }
    }

    info!("Server shutting down");
    ExitCode::SUCCESS
}

async fn write_line(stdout: &mut io::Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
