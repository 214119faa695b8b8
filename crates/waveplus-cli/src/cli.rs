//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Output format for events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human-readable line per event
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "waveplus")]
#[command(author, version, about = "Listen for Airthings Wave Plus readings", long_about = None)]
pub struct Cli {
    /// Only read the device with this serial number, or use WAVEPLUS_SERIAL env var
    #[arg(short, long, env = "WAVEPLUS_SERIAL")]
    pub serial: Option<u32>,

    /// Read session time budget in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub watchdog: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Show radon in pCi/L instead of Bq/m³
    #[arg(long)]
    pub pci: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "waveplus", "--serial", "12345", "--watchdog", "30", "--format", "json", "--pci",
        ])
        .unwrap();
        assert_eq!(cli.serial, Some(12345));
        assert_eq!(cli.watchdog, Some(30));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(cli.pci);
        assert!(!cli.no_color);
    }

    #[test]
    fn test_rejects_zero_watchdog() {
        assert!(Cli::try_parse_from(["waveplus", "--watchdog", "0"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["waveplus", "-v", "-q"]).is_err());
    }
}
