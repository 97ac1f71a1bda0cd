//! Programmer trait definitions

use crate::error::Result;
#[cfg(feature = "alloc")]
use crate::spi::SpiCommand;
use bitflags::bitflags;

bitflags! {
    /// SPI master feature flags
    ///
    /// These flags indicate what capabilities a programmer supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiFeatures: u32 {
        /// Supports 4-byte addressing commands
        const FOUR_BYTE_ADDR = 1 << 0;
    }
}

impl Default for SpiFeatures {
    fn default() -> Self {
        SpiFeatures::empty()
    }
}

/// SPI master trait
///
/// This trait represents a programmer that can execute SPI commands. It is
/// fully synchronous: every operation blocks until the underlying hardware
/// access has completed, and the caller is expected to serialize all
/// commands against one master (exactly one transaction outstanding at a
/// time).
///
/// Backends only need to provide the raw byte-level [`command`] primitive
/// together with their feature flags and size limits; `execute`,
/// `multicommand`, `read` and `write` have default implementations built
/// on top of it.
///
/// [`command`]: SpiMaster::command
pub trait SpiMaster {
    /// Get the features supported by this programmer
    fn features(&self) -> SpiFeatures;

    /// Maximum number of data bytes that can be read in a single command
    /// (excluding opcode and address)
    fn max_read_len(&self) -> usize;

    /// Maximum number of data bytes that can be written in a single command
    /// (excluding opcode and address)
    fn max_write_len(&self) -> usize;

    /// Run one SPI command cycle
    ///
    /// Clocks out all of `write` (opcode, address and data already
    /// encoded into one buffer), then clocks `read_buf.len()` bytes in,
    /// all under a single chip-select assertion. Either phase may be
    /// empty.
    fn command(&mut self, write: &[u8], read_buf: &mut [u8]) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Execute a single structured SPI command
    ///
    /// Encodes the command header (opcode + address) and write data into
    /// one buffer and issues it via [`command`](SpiMaster::command).
    #[cfg(feature = "alloc")]
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let header_len = cmd.header_len();
        let mut out = alloc::vec![0u8; header_len + cmd.write_data.len()];
        cmd.encode_header(&mut out);
        out[header_len..].copy_from_slice(cmd.write_data);
        self.command(&out, cmd.read_buf)
    }

    /// Execute a batch of SPI commands in order
    ///
    /// The first failing command aborts the batch.
    #[cfg(feature = "alloc")]
    fn multicommand(&mut self, cmds: &mut [SpiCommand<'_>]) -> Result<()> {
        for cmd in cmds.iter_mut() {
            self.execute(cmd)?;
        }
        Ok(())
    }

    /// Bulk read from flash
    ///
    /// Splits the read into chunks of at most `max_read_len()` bytes and
    /// picks 3- or 4-byte addressing based on the end address and
    /// `features()`.
    #[cfg(feature = "alloc")]
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        crate::protocol::read_auto(self, addr, buf)
    }

    /// Bulk page write to flash
    ///
    /// Assumes the target region is erased. Writes page by page (256-byte
    /// pages, further limited by `max_write_len()`), issuing WREN before
    /// each page program and polling WIP afterwards.
    #[cfg(feature = "alloc")]
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        crate::protocol::write_chunked(self, addr, data)
    }
}

// Forwarding impl for boxed SPI masters to allow trait objects
#[cfg(feature = "alloc")]
impl SpiMaster for alloc::boxed::Box<dyn SpiMaster + Send> {
    fn features(&self) -> SpiFeatures {
        (**self).features()
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn command(&mut self, write: &[u8], read_buf: &mut [u8]) -> Result<()> {
        (**self).command(write, read_buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Information about a programmer
#[derive(Debug, Clone)]
pub struct ProgrammerInfo {
    /// Name of the programmer
    pub name: &'static str,
    /// Description
    pub description: &'static str,
    /// Whether this programmer requires elevated privileges
    pub requires_root: bool,
}
