//! SPI command structure

use super::AddressWidth;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Data to write after opcode/address
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create a read command with 3-byte address (e.g., READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a read command with 4-byte address
    pub fn read_4b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::FourByte,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create a write command with 4-byte address
    pub fn write_4b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::FourByte,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an erase command with 3-byte address
    pub fn erase_3b(opcode: u8, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Number of header bytes (opcode + address) sent before the write data
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize
    }

    /// Encode the opcode and address into the start of `buf`
    ///
    /// `buf` must be at least `header_len()` bytes long.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[1..]);
        }
    }

    /// Calculate the total number of bytes clocked on the bus
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn test_simple_command() {
        let cmd = SpiCommand::simple(opcodes::WREN);
        assert_eq!(cmd.header_len(), 1);
        assert_eq!(cmd.total_bytes(), 1);
        assert!(!cmd.has_read());
        assert!(!cmd.has_write());
        assert!(!cmd.has_address());
    }

    #[test]
    fn test_encode_header_3b() {
        let mut buf = [0u8; 8];
        let data = [0xAA];
        let cmd = SpiCommand::write_3b(opcodes::PP, 0x012345, &data);
        assert_eq!(cmd.header_len(), 4);
        cmd.encode_header(&mut buf);
        assert_eq!(&buf[..4], &[opcodes::PP, 0x01, 0x23, 0x45]);
    }

    #[test]
    fn test_encode_header_4b() {
        let mut buf = [0u8; 8];
        let mut read = [0u8; 2];
        let cmd = SpiCommand::read_4b(opcodes::READ_4B, 0x0100_0000, &mut read);
        assert_eq!(cmd.header_len(), 5);
        cmd.encode_header(&mut buf);
        assert_eq!(&buf[..5], &[opcodes::READ_4B, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(cmd.total_bytes(), 7);
    }

    #[test]
    fn test_read_reg() {
        let mut buf = [0u8; 3];
        let cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
        assert!(cmd.has_read());
        assert_eq!(cmd.total_bytes(), 4);
    }
}
