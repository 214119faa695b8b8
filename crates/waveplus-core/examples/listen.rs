//! Example: Listening for Wave Plus readings
//!
//! This example scans for Airthings Wave Plus devices, reads each one as it
//! advertises and prints every reading until Ctrl-C is pressed.
//!
//! Run with: `cargo run --example listen [serial]`

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use waveplus_core::{BtleAdapter, DeviceEvent, Scanner, ScannerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let serial = std::env::args().nth(1).map(|s| s.parse::<u32>()).transpose()?;

    let adapter = Arc::new(BtleAdapter::first().await?);
    let mut scanner = Scanner::new(adapter, ScannerConfig::new().serial_filter(serial))?;
    let mut events = scanner.subscribe();

    let cancel = CancellationToken::new();
    let scan = tokio::spawn({
        let cancel = cancel.clone();
        async move { scanner.run(cancel).await }
    });

    println!("Listening for Wave Plus devices (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(DeviceEvent::Found { device }) => {
                    println!("Found serial {} at {}", device.serial_number, device.address);
                }
                Ok(DeviceEvent::Updated { device, reading, .. }) => {
                    println!("[{}] {}", device.serial_number, reading);
                    println!(
                        "         radon {:.2}/{:.2} pCi/L",
                        reading.radon_short_term_pci_l(),
                        reading.radon_long_term_pci_l()
                    );
                }
                Err(_) => break,
            },
        }
    }

    cancel.cancel();
    scan.await??;
    Ok(())
}
