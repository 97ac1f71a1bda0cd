//! VL805 register map and config-space offsets
//!
//! The internal register space is reached indirectly through an
//! index/data window in PCI config space. Some of the registers have
//! unknown purpose and are only touched inside the bring-up sequence
//! replay.

/// PCI vendor ID (VIA Technologies)
pub const VL805_VENDOR_ID: u16 = 0x1106;
/// PCI device ID (VL805 xHCI host controller)
pub const VL805_DEVICE_ID: u16 = 0x3483;

/// Config-space offset of the index register (selects an internal address)
pub const PCI_REG_INDEX: u8 = 0x78;
/// Config-space offset of the data register (value at the selected address)
pub const PCI_REG_DATA: u8 = 0x7c;
/// Config-space offset of the MCU-active control byte
pub const PCI_REG_MCU_ACTIVE: u8 = 0x43;
/// Config-space offset of the firmware version register (diagnostic only)
pub const PCI_REG_FW_VERSION: u8 = 0x50;

/// Unknown purpose, seen in captured traffic; kept for reference
pub const REG_0X30004: u32 = 0x0003_0004;
/// Stop-polling control, bit 0 set during bring-up
pub const REG_STOP_POLLING: u32 = 0x0004_000c;
/// Write-buffer enable, bit 0 set during bring-up
pub const REG_WB_EN: u32 = 0x0004_0020;
/// Outgoing data word for the next SPI cycle
pub const REG_SPI_OUTDATA: u32 = 0x0004_00d0;
/// Incoming data word from the last SPI cycle
pub const REG_SPI_INDATA: u32 = 0x0004_00e0;
/// Transaction control; writing it triggers a bus cycle
pub const REG_SPI_TRANSACTION: u32 = 0x0004_00f0;
/// SPI clock divider
pub const REG_CLK_DIV: u32 = 0x0004_00f8;
/// Chip-select level: 0 asserts, 1 deasserts
pub const REG_SPI_CHIP_ENABLE_LEVEL: u32 = 0x0004_00fc;

/// Fixed flag bits in every transaction control word
pub const TRANSACTION_FLAGS: u32 = 0x0000_0580;

/// Transaction control word triggering a cycle with `len` active bytes (1-4)
pub const fn transaction_word(len: usize) -> u32 {
    TRANSACTION_FLAGS | ((len as u32) << 3)
}

/// Priming control word replayed during bring-up; the controller sends 4
/// bytes of its own choosing to the flash chip
pub const INIT_TRANSACTION: u32 = 0x0000_05a0;

/// Clock divider value used after bring-up
pub const CLK_DIV_DEFAULT: u32 = 0x0000_000a;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_word() {
        assert_eq!(transaction_word(1), 0x588);
        assert_eq!(transaction_word(2), 0x590);
        assert_eq!(transaction_word(3), 0x598);
        assert_eq!(transaction_word(4), 0x5a0);
    }
}
