//! VL805 device implementation
//!
//! The VL805 has no dedicated SPI memory-mapped region. Its internal
//! register space is reached through an index/data window in PCI config
//! space, and SPI traffic is pushed through that window four bytes per
//! hardware cycle. This module owns the register window, the transaction
//! encoder that hides the 4-byte granularity behind an arbitrary-length
//! command interface, and the bring-up/shutdown lifecycle.

use crate::error::{Result, Vl805Error};
use crate::pci::{self, ConfigSpace, SysfsConfigSpace};
use crate::regs::*;

use vlflash_core::error::{Error as CoreError, Result as CoreResult};
use vlflash_core::programmer::{SpiFeatures, SpiMaster};

/// Maximum data read size in one go (excluding opcode+address)
pub const MAX_DATA_READ: usize = 64 * 1024;
/// Maximum data write size in one go (excluding opcode+address)
pub const MAX_DATA_WRITE: usize = 256;

/// Configuration for opening a VL805 programmer
#[derive(Debug, Clone, Default)]
pub struct Vl805Config {
    /// Select a specific controller when more than one is present
    pub bdf: Option<(u8, u8, u8)>,
}

impl Vl805Config {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the controller at the given bus/device/function
    pub fn with_bdf(mut self, bus: u8, device: u8, function: u8) -> Self {
        self.bdf = Some((bus, device, function));
        self
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// Supported options:
/// - `bdf=BB:DD.F` - select one of several VL805 controllers
pub fn parse_options(options: &[(&str, &str)]) -> Result<Vl805Config> {
    let mut config = Vl805Config::default();

    for (key, value) in options {
        match *key {
            "bdf" => {
                config.bdf = Some(pci::parse_bdf(value).ok_or_else(|| {
                    Vl805Error::InvalidParameter(format!(
                        "invalid bdf value: {} (expected BB:DD.F)",
                        value
                    ))
                })?);
            }
            _ => {
                log::warn!("vl805: unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

/// VL805 SPI programmer
///
/// Owns the config-space handle exclusively; the handle is released when
/// the value is dropped or consumed by [`shutdown`](Vl805::shutdown).
pub struct Vl805<C: ConfigSpace> {
    bus: C,
}

impl Vl805<SysfsConfigSpace> {
    /// Locate a VL805 controller and bring it up
    ///
    /// Fails if no controller matches, if several match and none was
    /// selected via [`Vl805Config::bdf`], or if any register access of
    /// the bring-up sequence fails. On failure no device state is left
    /// behind.
    pub fn open(config: &Vl805Config) -> Result<Self> {
        let dev = pci::find_device(VL805_VENDOR_ID, VL805_DEVICE_ID, config.bdf)?;
        log::info!(
            "vl805: found VIA VL805 ({:04x}:{:04x}) at {}",
            dev.vendor_id,
            dev.device_id,
            dev.bdf()
        );

        let bus = SysfsConfigSpace::open(&dev)?;
        Self::bring_up(bus)
    }
}

impl<C: ConfigSpace> Vl805<C> {
    /// Bring up a device over an already-opened config-space handle
    pub fn bring_up(bus: C) -> Result<Self> {
        let mut dev = Self { bus };
        dev.init()?;
        // The controller processes transactions only while MCU-active is
        // set; it stays set from here until shutdown.
        dev.programmer_active(1)?;
        Ok(dev)
    }

    /// Write an internal register through the index/data window
    ///
    /// The index write must always precede the data write; the device
    /// latches the address on the first access.
    fn set_regval(&mut self, reg: u32, val: u32) -> Result<()> {
        self.bus.write_config32(PCI_REG_INDEX, reg)?;
        self.bus.write_config32(PCI_REG_DATA, val)
    }

    /// Read an internal register through the index/data window
    fn get_regval(&mut self, reg: u32) -> Result<u32> {
        self.bus.write_config32(PCI_REG_INDEX, reg)?;
        self.bus.read_config32(PCI_REG_DATA)
    }

    fn programmer_active(&mut self, val: u8) -> Result<()> {
        self.bus.write_config8(PCI_REG_MCU_ACTIVE, val)
    }

    /// Read the firmware version register (diagnostic only)
    pub fn firmware_version(&mut self) -> Result<u32> {
        self.bus.read_config32(PCI_REG_FW_VERSION)
    }

    /// Run the bring-up sequence
    ///
    /// The sequence is replayed from captured traffic; the order of the
    /// steps and the read-modify-write masking are the contract, their
    /// meaning is not fully understood.
    fn init(&mut self) -> Result<()> {
        self.programmer_active(1)?;
        let fw = self.firmware_version()?;
        log::debug!("vl805: firmware version {:#010x}", fw);

        self.set_regval(REG_SPI_CHIP_ENABLE_LEVEL, 0x0000_0001)?;
        let val = self.get_regval(REG_WB_EN)?;
        self.set_regval(REG_WB_EN, (val & 0xffff_ff00) | 0x01)?;
        let val = self.get_regval(REG_STOP_POLLING)?;
        self.set_regval(REG_STOP_POLLING, (val & 0xffff_ff00) | 0x01)?;

        // This clocks 4 bytes we do not control out to the flash chip.
        self.set_regval(REG_SPI_TRANSACTION, INIT_TRANSACTION)?;
        self.set_regval(REG_CLK_DIV, CLK_DIV_DEFAULT)?;

        self.programmer_active(0)
    }

    /// Send one SPI command to the flash chip
    ///
    /// Asserts chip-select, pushes `write` followed by `read_buf.len()`
    /// read slots through the 4-byte transaction window, and deasserts
    /// chip-select on every exit path, error or not.
    fn spi_send_command(&mut self, write: &[u8], read_buf: &mut [u8]) -> Result<()> {
        self.set_regval(REG_SPI_CHIP_ENABLE_LEVEL, 0x0000_0000)?;

        let result = self.transfer(write, read_buf);

        let deassert = self.set_regval(REG_SPI_CHIP_ENABLE_LEVEL, 0x0000_0001);
        result?;
        deassert
    }

    /// Push a byte stream through the 4-byte transaction window
    ///
    /// Each cycle carries up to 4 bytes: the write portion fills the
    /// chunk from the front, read slots are whatever the write portion
    /// left free in the same chunk. Write bytes are packed into OUTDATA
    /// most significant byte first; read bytes come out of INDATA most
    /// significant active byte first.
    fn transfer(&mut self, write: &[u8], read_buf: &mut [u8]) -> Result<()> {
        let total = write.len() + read_buf.len();
        let mut writes_left = write.len();
        let mut reads_left = read_buf.len();
        let mut readpos = 0;

        let mut j = 0;
        while j < total {
            let cur_total = usize::min(4, total - j);
            let cur_writes = usize::min(4, writes_left);
            let cur_reads = usize::min(4 - cur_writes, reads_left);

            let mut outdata: u32 = 0;
            for i in 0..cur_total {
                outdata <<= 8;
                if i < cur_writes {
                    outdata |= write[j + i] as u32;
                }
            }
            writes_left -= cur_writes;

            self.set_regval(REG_SPI_OUTDATA, outdata)?;
            self.set_regval(REG_SPI_TRANSACTION, transaction_word(cur_total))?;
            let indata = self.get_regval(REG_SPI_INDATA)?;

            for i in (1..=cur_reads).rev() {
                read_buf[readpos] = (indata >> (8 * (i - 1))) as u8;
                readpos += 1;
            }
            reads_left -= cur_reads;

            j += 4;
        }

        Ok(())
    }

    /// Shut the device down, releasing the config-space handle
    ///
    /// Consumes the device, so shutting down twice is impossible.
    pub fn shutdown(mut self) -> Result<()> {
        self.programmer_active(0)
    }
}

impl<C: ConfigSpace> SpiMaster for Vl805<C> {
    fn features(&self) -> SpiFeatures {
        SpiFeatures::empty()
    }

    fn max_read_len(&self) -> usize {
        MAX_DATA_READ
    }

    fn max_write_len(&self) -> usize {
        MAX_DATA_WRITE
    }

    fn command(&mut self, write: &[u8], read_buf: &mut [u8]) -> CoreResult<()> {
        self.spi_send_command(write, read_buf).map_err(|e| {
            log::error!("vl805: SPI command failed: {}", e);
            CoreError::SpiTransferFailed
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}
