//! vlflash-vl805 - VIA VL805 SPI programmer support
//!
//! This crate drives the SPI flash interface of the VIA VL805 USB 3.0
//! xHCI host controller (PCI ID 1106:3483), best known from the
//! Raspberry Pi 4 add-in card ecosystem. The controller firmware lives
//! in an external SPI flash chip which this programmer can read and
//! reprogram in-system.
//!
//! # Overview
//!
//! The VL805 exposes no SPI BAR. All access goes through an index/data
//! register pair in PCI configuration space that windows into the
//! controller's internal register file, and SPI transfers are chunked
//! into 4-byte hardware cycles. The bring-up sequence replays a captured
//! register script; several of the registers it touches have unknown
//! purpose, and reordering the script is known to break the device.
//!
//! # Example
//!
//! ```no_run
//! use vlflash_vl805::{Vl805, Vl805Config};
//! use vlflash_core::protocol;
//!
//! let mut dev = Vl805::open(&Vl805Config::new())?;
//!
//! let (mfr, id) = protocol::read_jedec_id(&mut dev)?;
//! println!("JEDEC ID: {:02X} {:04X}", mfr, id);
//!
//! dev.shutdown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux with sysfs PCI support
//! - Write access to the device's sysfs `config` file (run as root)

pub mod device;
pub mod error;
pub mod pci;
pub mod regs;

// Re-exports
pub use device::{parse_options, Vl805, Vl805Config, MAX_DATA_READ, MAX_DATA_WRITE};
pub use error::{Result, Vl805Error};
pub use pci::{scan_pci_bus, ConfigSpace, PciDevice, SysfsConfigSpace};

use vlflash_core::programmer::{ProgrammerInfo, SpiMaster};

/// Open a VL805 programmer and return a boxed SpiMaster
///
/// This is a convenience function for use in programmer dispatch tables.
///
/// # Arguments
///
/// * `options` - Slice of (key, value) pairs from programmer string parsing
///
/// # Example Options
///
/// - `bdf=03:00.0` - Optional: select one of several VL805 controllers
pub fn open_vl805(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn SpiMaster + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let dev = Vl805::open(&config)?;
    Ok(Box::new(dev))
}

/// Programmer information
pub fn programmer_info() -> ProgrammerInfo {
    ProgrammerInfo {
        name: "vl805",
        description: "VIA VL805 USB 3.0 host controller SPI programmer",
        requires_root: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programmer_info() {
        let info = programmer_info();
        assert_eq!(info.name, "vl805");
        assert!(info.requires_root);
    }
}
