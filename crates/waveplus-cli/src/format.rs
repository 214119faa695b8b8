//! Output formatting for device events.

use anyhow::Result;
use owo_colors::OwoColorize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use waveplus_core::DeviceEvent;
use waveplus_types::{Device, SensorReading};

use crate::cli::OutputFormat;

/// Formatting options resolved from the command line and config.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub format: OutputFormat,
    /// Radon in pCi/L instead of Bq/m³
    pub pci: bool,
    pub color: bool,
}

impl FormatOptions {
    fn label(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn radon(&self, reading: &SensorReading) -> String {
        if self.pci {
            format!(
                "{:.2}/{:.2} pCi/L",
                reading.radon_short_term_pci_l(),
                reading.radon_long_term_pci_l()
            )
        } else {
            format!(
                "{}/{} Bq/m³",
                reading.radon_short_term_avg, reading.radon_long_term_avg
            )
        }
    }
}

/// Format one event as a single output line (without trailing newline).
pub fn format_event(event: &DeviceEvent, opts: &FormatOptions) -> Result<String> {
    match opts.format {
        OutputFormat::Json => Ok(serde_json::to_string(event)?),
        OutputFormat::Text => Ok(match event {
            DeviceEvent::Found { device } => format_found_text(device, opts),
            DeviceEvent::Updated {
                device,
                reading,
                received_at,
            } => format_updated_text(device, reading, *received_at, opts),
        }),
    }
}

fn format_found_text(device: &Device, opts: &FormatOptions) -> String {
    let tag = if opts.color {
        "found".green().bold().to_string()
    } else {
        "found".to_string()
    };
    format!(
        "{tag} Wave Plus {} at {} ({})",
        opts.label(&device.serial_number.to_string()),
        device.address,
        device.id
    )
}

fn format_updated_text(
    device: &Device,
    reading: &SensorReading,
    received_at: OffsetDateTime,
    opts: &FormatOptions,
) -> String {
    let timestamp = received_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| "???".to_string());
    format!(
        "{timestamp} {} radon {}, {:.2} °C, {:.1} %RH, {:.2} hPa, CO2 {} ppm, VOC {} ppb, RSSI {} dBm",
        opts.label(&device.serial_number.to_string()),
        opts.radon(reading),
        reading.temperature,
        reading.humidity,
        reading.pressure,
        reading.co2,
        reading.voc,
        reading.rssi,
    )
}
