//! Configuration file management.
//!
//! The file lives at `<config dir>/waveplus/config.toml`. Every field is
//! optional; values given on the command line win.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use waveplus_core::{DEFAULT_WATCHDOG, ScannerConfig};

use crate::cli::{Cli, OutputFormat};

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Only read the device with this serial number
    #[serde(default)]
    pub serial: Option<u32>,

    /// Read session time budget in seconds
    #[serde(default)]
    pub watchdog: Option<u64>,

    /// Default output format
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Show radon in pCi/L
    #[serde(default)]
    pub pci: bool,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

impl Config {
    /// Get the default config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("waveplus")
            .join("config.toml")
    }

    /// Read and parse a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Load the config file.
    ///
    /// An explicitly requested file must exist and parse. The default file
    /// is optional; if it is broken a warning is printed and defaults are
    /// used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let path = Self::path();
        if !path.exists() {
            return Ok(Self::default());
        }
        match Self::load_from(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: {e:#}");
                Ok(Self::default())
            }
        }
    }
}

/// Effective settings after merging the command line over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub serial: Option<u32>,
    pub watchdog: Duration,
    pub format: OutputFormat,
    pub pci: bool,
    pub color: bool,
}

impl Settings {
    /// Merge command-line arguments over the config file.
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        let watchdog = cli
            .watchdog
            .or(config.watchdog)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_WATCHDOG);

        Self {
            serial: cli.serial.or(config.serial),
            watchdog,
            format: cli.format.or(config.format).unwrap_or_default(),
            pci: cli.pci || config.pci,
            color: !(cli.no_color || config.no_color),
        }
    }

    /// Scanner options for these settings.
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig::new()
            .serial_filter(self.serial)
            .watchdog(self.watchdog)
    }
}
