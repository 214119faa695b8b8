mod cli;
mod config;
mod format;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use waveplus_core::{BtleAdapter, Scanner};

use crate::cli::Cli;
use crate::config::{Config, Settings};
use crate::format::{FormatOptions, format_event};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, &config);
    tracing::debug!(?settings, "resolved settings");

    let adapter = BtleAdapter::first()
        .await
        .context("Failed to open Bluetooth adapter")?;
    let mut scanner = Scanner::new(Arc::new(adapter), settings.scanner_config())
        .context("Invalid scanner settings")?;
    let mut events = scanner.subscribe();

    let cancel = CancellationToken::new();
    let scan = tokio::spawn({
        let cancel = cancel.clone();
        async move { scanner.run(cancel).await }
    });

    let opts = FormatOptions {
        format: settings.format,
        pci: settings.pci,
        color: settings.color,
    };
    let mut stdout = io::stdout().lock();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    writeln!(stdout, "{}", format_event(&event, &opts)?)?;
                    stdout.flush()?;
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "output fell behind, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    scan.await.context("Scanner task panicked")??;
    Ok(())
}
