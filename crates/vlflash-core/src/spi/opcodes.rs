//! Standard JEDEC SPI flash opcodes
//!
//! The subset of JESD216 command opcodes used by the protocol helpers.

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Write Status Register 1
pub const WRSR: u8 = 0x01;

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

/// Read Data (up to ~33 MHz)
pub const READ: u8 = 0x03;
/// Fast Read (with dummy byte, up to max frequency)
pub const FAST_READ: u8 = 0x0B;
/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;

/// Page Program (3-byte address)
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;

/// Sector Erase (4 KiB, 3-byte address)
pub const SE: u8 = 0x20;

/// Status register 1: Write In Progress bit
pub const SR1_WIP: u8 = 1 << 0;
/// Status register 1: Write Enable Latch bit
pub const SR1_WEL: u8 = 1 << 1;
