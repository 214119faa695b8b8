//! Helpers for turning btleplug identifiers into display strings.

use btleplug::platform::PeripheralId as BtlePeripheralId;

use waveplus_types::PeripheralId;

/// Address reported by CoreBluetooth, which hides real MAC addresses.
const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a platform peripheral ID as a stable string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap a
/// D-Bus path or MAC address. Either way the `Debug` output is
/// `PeripheralId(<inner>)` and the inner part is what we keep.
pub fn format_peripheral_id(id: &BtlePeripheralId) -> PeripheralId {
    PeripheralId::new(strip_debug_wrapper(&format!("{id:?}")))
}

fn strip_debug_wrapper(debug: &str) -> &str {
    debug
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .trim_matches('"')
}

/// Choose the address to show for a peripheral.
///
/// Falls back to the peripheral id where the platform hides the address.
pub fn display_address(address: &str, id: &PeripheralId) -> String {
    if address == HIDDEN_ADDRESS || address.is_empty() {
        id.to_string()
    } else {
        address.to_string()
    }
}
