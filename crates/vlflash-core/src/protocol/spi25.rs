//! SPI25 protocol implementation
//!
//! This module implements the common SPI flash command sequences as
//! defined by JEDEC, on top of any [`SpiMaster`].

use crate::error::{Error, Result};
use crate::programmer::{SpiFeatures, SpiMaster};
use crate::spi::{opcodes, AddressWidth, SpiCommand};

/// Standard SPI flash page size in bytes
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Read the JEDEC ID from a flash chip
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);

    Ok((manufacturer, device))
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Send the Write Disable command
pub fn write_disable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    master.execute(&mut cmd)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Polls the status register until the Write In Progress bit clears.
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between status register polls
/// * `timeout_us` - Maximum time to wait before returning `Error::Timeout`
pub fn wait_ready<M: SpiMaster + ?Sized>(
    master: &mut M,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        timeout_us / poll_delay_us
    } else {
        timeout_us
    };

    for _ in 0..max_polls {
        let status = read_status1(master)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        if poll_delay_us > 0 {
            master.delay_us(poll_delay_us);
        }
    }

    log::warn!("flash still busy after {} us", timeout_us);
    Err(Error::Timeout)
}

/// Read data from flash using 3-byte addressing
pub fn read_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    let max_len = master.max_read_len();
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read_3b(opcodes::READ, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Read data from flash using 4-byte addressing
pub fn read_4b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    let max_len = master.max_read_len();
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read_4b(opcodes::READ_4B, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Read data from flash, picking the address width automatically
///
/// Uses 3-byte addressing when the whole range fits below 16 MiB,
/// 4-byte addressing when the programmer supports it, and fails with
/// `Error::AddressOutOfBounds` otherwise.
pub fn read_auto<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    if needs_4ba(addr, buf.len()) {
        if !master.features().contains(SpiFeatures::FOUR_BYTE_ADDR) {
            log::error!("read beyond 16 MiB needs 4-byte addressing support");
            return Err(Error::AddressOutOfBounds);
        }
        read_4b(master, addr, buf)
    } else {
        read_3b(master, addr, buf)
    }
}

/// Program a single page using 3-byte addressing
///
/// The data must not cross a page boundary. Sends WREN first and polls
/// WIP afterwards (page program typically takes 0.7-5 ms).
pub fn program_page_3b<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(master)?;
    let mut cmd = SpiCommand::write_3b(opcodes::PP, addr, data);
    master.execute(&mut cmd)?;
    wait_ready(master, 10, 10_000)
}

/// Program a single page using 4-byte addressing
pub fn program_page_4b<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(master)?;
    let mut cmd = SpiCommand::write_4b(opcodes::PP_4B, addr, data);
    master.execute(&mut cmd)?;
    wait_ready(master, 10, 10_000)
}

/// Write data to flash page by page
///
/// Assumes the target region is already erased. Each chunk respects both
/// page boundaries and the master's maximum write length.
pub fn write_chunked<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, data: &[u8]) -> Result<()> {
    let max_write = core::cmp::min(master.max_write_len(), DEFAULT_PAGE_SIZE);
    if max_write == 0 {
        return Err(Error::ProgrammerNotReady);
    }

    let four_byte = needs_4ba(addr, data.len());
    if four_byte && !master.features().contains(SpiFeatures::FOUR_BYTE_ADDR) {
        return Err(Error::AddressOutOfBounds);
    }

    let mut offset = 0;
    while offset < data.len() {
        let current_addr = addr + offset as u32;
        let page_offset = current_addr as usize % DEFAULT_PAGE_SIZE;
        let bytes_to_page_end = DEFAULT_PAGE_SIZE - page_offset;
        let chunk_size = core::cmp::min(
            core::cmp::min(bytes_to_page_end, data.len() - offset),
            max_write,
        );
        let chunk = &data[offset..offset + chunk_size];

        if four_byte {
            program_page_4b(master, current_addr, chunk)?;
        } else {
            program_page_3b(master, current_addr, chunk)?;
        }

        offset += chunk_size;
    }

    Ok(())
}

fn needs_4ba(addr: u32, len: usize) -> bool {
    addr as u64 + len as u64 > AddressWidth::ThreeByte.max_size() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Records every command cycle and synthesizes read data
    struct FakeMaster {
        max_read: usize,
        max_write: usize,
        features: SpiFeatures,
        /// (bytes clocked out, read length) per command cycle
        log: Vec<(Vec<u8>, usize)>,
        /// How many RDSR polls still report WIP
        busy_polls: usize,
        jedec_id: [u8; 3],
    }

    impl FakeMaster {
        fn new() -> Self {
            Self {
                max_read: 16,
                max_write: 8,
                features: SpiFeatures::empty(),
                log: Vec::new(),
                busy_polls: 0,
                jedec_id: [0xEF, 0x40, 0x16],
            }
        }

        fn opcodes_sent(&self) -> Vec<u8> {
            self.log.iter().map(|(w, _)| w[0]).collect()
        }
    }

    impl SpiMaster for FakeMaster {
        fn features(&self) -> SpiFeatures {
            self.features
        }

        fn max_read_len(&self) -> usize {
            self.max_read
        }

        fn max_write_len(&self) -> usize {
            self.max_write
        }

        fn command(&mut self, write: &[u8], read_buf: &mut [u8]) -> Result<()> {
            self.log.push((write.to_vec(), read_buf.len()));
            match write.first() {
                Some(&opcodes::RDSR) => {
                    if self.busy_polls > 0 {
                        self.busy_polls -= 1;
                        read_buf[0] = opcodes::SR1_WIP;
                    } else {
                        read_buf[0] = 0;
                    }
                }
                Some(&opcodes::RDID) => {
                    read_buf.copy_from_slice(&self.jedec_id);
                }
                _ => read_buf.fill(0xA5),
            }
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_read_jedec_id() {
        let mut master = FakeMaster::new();
        let (mfr, dev) = read_jedec_id(&mut master).unwrap();
        assert_eq!(mfr, 0xEF);
        assert_eq!(dev, 0x4016);
        assert_eq!(master.log.len(), 1);
        assert_eq!(master.log[0].0, alloc::vec![opcodes::RDID]);
        assert_eq!(master.log[0].1, 3);
    }

    #[test]
    fn test_read_chunked_by_max_read_len() {
        let mut master = FakeMaster::new();
        let mut buf = [0u8; 40];
        master.read(0x1000, &mut buf).unwrap();

        // 40 bytes at 16 bytes per command: 3 cycles
        assert_eq!(master.log.len(), 3);
        assert_eq!(master.log[0].0, alloc::vec![opcodes::READ, 0x00, 0x10, 0x00]);
        assert_eq!(master.log[0].1, 16);
        assert_eq!(master.log[1].0, alloc::vec![opcodes::READ, 0x00, 0x10, 0x10]);
        assert_eq!(master.log[2].0, alloc::vec![opcodes::READ, 0x00, 0x10, 0x20]);
        assert_eq!(master.log[2].1, 8);
        assert!(buf.iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn test_read_above_16mib_needs_feature() {
        let mut master = FakeMaster::new();
        let mut buf = [0u8; 4];
        assert_eq!(
            master.read(0x0100_0000, &mut buf),
            Err(Error::AddressOutOfBounds)
        );

        master.features = SpiFeatures::FOUR_BYTE_ADDR;
        master.read(0x0100_0000, &mut buf).unwrap();
        assert_eq!(
            master.log[0].0,
            alloc::vec![opcodes::READ_4B, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_write_splits_on_page_boundary() {
        let mut master = FakeMaster::new();
        master.max_write = 256;
        let data = [0x55u8; 16];
        // Starts 8 bytes before a page boundary: expect two pages
        master.write(0x00F8, &data).unwrap();

        let ops = master.opcodes_sent();
        assert_eq!(
            ops,
            alloc::vec![
                opcodes::WREN,
                opcodes::PP,
                opcodes::RDSR,
                opcodes::WREN,
                opcodes::PP,
                opcodes::RDSR,
            ]
        );
        // First page program carries 8 bytes after the 4-byte header
        let first_pp = &master.log[1].0;
        assert_eq!(&first_pp[..4], &[opcodes::PP, 0x00, 0x00, 0xF8]);
        assert_eq!(first_pp.len(), 4 + 8);
        let second_pp = &master.log[4].0;
        assert_eq!(&second_pp[..4], &[opcodes::PP, 0x00, 0x01, 0x00]);
        assert_eq!(second_pp.len(), 4 + 8);
    }

    #[test]
    fn test_write_respects_max_write_len() {
        let mut master = FakeMaster::new();
        master.max_write = 8;
        let data = [0xAAu8; 16];
        master.write(0x0000, &data).unwrap();

        // 16 bytes at 8 per program: two WREN/PP/RDSR rounds
        let pp_count = master
            .opcodes_sent()
            .iter()
            .filter(|&&op| op == opcodes::PP)
            .count();
        assert_eq!(pp_count, 2);
    }

    #[test]
    fn test_wait_ready_polls_until_clear() {
        let mut master = FakeMaster::new();
        master.busy_polls = 3;
        wait_ready(&mut master, 10, 1_000).unwrap();
        assert_eq!(master.log.len(), 4);
    }

    #[test]
    fn test_wait_ready_timeout() {
        let mut master = FakeMaster::new();
        master.busy_polls = usize::MAX;
        assert_eq!(wait_ready(&mut master, 10, 100), Err(Error::Timeout));
    }

    #[test]
    fn test_multicommand_order() {
        let mut master = FakeMaster::new();
        let mut status = [0u8; 1];
        let mut cmds = [
            SpiCommand::simple(opcodes::WREN),
            SpiCommand::erase_3b(opcodes::SE, 0x2000),
            SpiCommand::read_reg(opcodes::RDSR, &mut status),
        ];
        master.multicommand(&mut cmds).unwrap();
        assert_eq!(
            master.opcodes_sent(),
            alloc::vec![opcodes::WREN, opcodes::SE, opcodes::RDSR]
        );
        assert_eq!(master.log[1].0, alloc::vec![opcodes::SE, 0x00, 0x20, 0x00]);
    }

    #[test]
    fn test_boxed_master_forwards() {
        let mut boxed: alloc::boxed::Box<dyn SpiMaster + Send> =
            alloc::boxed::Box::new(FakeMaster::new());
        let mut buf = [0u8; 4];
        read_3b(&mut boxed, 0, &mut buf).unwrap();
        assert_eq!(buf, [0xA5; 4]);
    }
}
