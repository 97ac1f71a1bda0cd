//! Error types for the VL805 programmer

use thiserror::Error;

/// VL805 specific errors
#[derive(Debug, Error)]
pub enum Vl805Error {
    /// No matching PCI device found
    #[error("no VL805 device ({vendor_id:04x}:{device_id:04x}) found")]
    DeviceNotFound { vendor_id: u16, device_id: u16 },

    /// More than one matching device and no explicit selection
    #[error("multiple VL805 devices found; select one with bdf=BB:DD.F")]
    MultipleDevices,

    /// Failed to scan the PCI bus
    #[error("failed to scan PCI bus: {0}")]
    Scan(#[source] std::io::Error),

    /// Failed to open the device's config space
    #[error("failed to open PCI config space of {bdf}: {source}")]
    ConfigOpen {
        bdf: String,
        #[source]
        source: std::io::Error,
    },

    /// PCI config space read failed
    #[error("PCI config read at offset {offset:#04x} failed: {source}")]
    ConfigRead {
        offset: u8,
        #[source]
        source: std::io::Error,
    },

    /// PCI config space write failed
    #[error("PCI config write at offset {offset:#04x} failed: {source}")]
    ConfigWrite {
        offset: u8,
        #[source]
        source: std::io::Error,
    },

    /// Invalid programmer option
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for VL805 operations
pub type Result<T> = std::result::Result<T, Vl805Error>;
