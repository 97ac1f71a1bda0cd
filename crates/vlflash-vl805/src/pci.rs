//! PCI device scanning and configuration space access
//!
//! This module provides PCI device scanning via the Linux sysfs interface
//! (/sys/bus/pci/devices) and raw config-space access for the one device
//! the programmer claims. The [`ConfigSpace`] trait is the seam between
//! the VL805 register logic and the bus: production code uses
//! [`SysfsConfigSpace`], the tests use a mock.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, Vl805Error};

/// PCI device information
#[derive(Debug, Clone)]
pub struct PciDevice {
    /// PCI domain (usually 0)
    pub domain: u16,
    /// PCI bus number
    pub bus: u8,
    /// PCI device (slot) number
    pub device: u8,
    /// PCI function number
    pub function: u8,
    /// Vendor ID
    pub vendor_id: u16,
    /// Device ID
    pub device_id: u16,
    /// Revision ID
    pub revision_id: u8,
}

impl PciDevice {
    /// Check if this device matches a vendor/device ID pair
    pub fn matches(&self, vendor_id: u16, device_id: u16) -> bool {
        self.vendor_id == vendor_id && self.device_id == device_id
    }

    /// Get the BDF (Bus:Device.Function) string
    pub fn bdf(&self) -> String {
        format!("{:02x}:{:02x}.{:x}", self.bus, self.device, self.function)
    }

    fn sysfs_path(&self) -> String {
        format!(
            "/sys/bus/pci/devices/{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

/// Scan the PCI bus for devices
///
/// This uses the Linux sysfs interface to enumerate PCI devices.
pub fn scan_pci_bus() -> Result<Vec<PciDevice>> {
    let pci_path = Path::new("/sys/bus/pci/devices");

    let entries = fs::read_dir(pci_path).map_err(Vl805Error::Scan)?;

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(Vl805Error::Scan)?;
        let name = entry.file_name();

        if let Some(dev) = parse_pci_device(&entry.path(), &name.to_string_lossy()) {
            devices.push(dev);
        }
    }

    Ok(devices)
}

/// Parse a PCI device from its sysfs directory
fn parse_pci_device(path: &Path, name: &str) -> Option<PciDevice> {
    // Directory name format: "0000:00:1f.0"
    let (domain, bus, device, function) = parse_sysfs_name(name)?;

    let vendor_id = read_sysfs_hex(&path.join("vendor"))? as u16;
    let device_id = read_sysfs_hex(&path.join("device"))? as u16;
    let revision_id = read_sysfs_hex(&path.join("revision")).unwrap_or(0) as u8;

    Some(PciDevice {
        domain,
        bus,
        device,
        function,
        vendor_id,
        device_id,
        revision_id,
    })
}

/// Parse "dddd:bb:dd.f" into (domain, bus, device, function)
fn parse_sysfs_name(name: &str) -> Option<(u16, u8, u8, u8)> {
    let parts: Vec<&str> = name.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let domain = u16::from_str_radix(parts[0], 16).ok()?;
    let bus = u8::from_str_radix(parts[1], 16).ok()?;

    let dev_func: Vec<&str> = parts[2].split('.').collect();
    if dev_func.len() != 2 {
        return None;
    }

    let device = u8::from_str_radix(dev_func[0], 16).ok()?;
    let function = u8::from_str_radix(dev_func[1], 16).ok()?;

    Some((domain, bus, device, function))
}

/// Parse a "bb:dd.f" device selector as given in programmer options
pub fn parse_bdf(s: &str) -> Option<(u8, u8, u8)> {
    let (bus, dev_func) = s.split_once(':')?;
    let (device, function) = dev_func.split_once('.')?;

    Some((
        u8::from_str_radix(bus, 16).ok()?,
        u8::from_str_radix(device, 16).ok()?,
        u8::from_str_radix(function, 16).ok()?,
    ))
}

/// Read a hex value from a sysfs file
fn read_sysfs_hex(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    parse_hex(content.trim())
}

/// Parse a hex string with optional "0x" prefix
fn parse_hex(s: &str) -> Option<u32> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    u32::from_str_radix(hex_str, 16).ok()
}

/// Find a device by vendor/device ID, optionally narrowed to one BDF
///
/// Zero matches is a discovery failure. Multiple matches without an
/// explicit selector is ambiguous and also fails.
pub fn find_device(
    vendor_id: u16,
    device_id: u16,
    bdf: Option<(u8, u8, u8)>,
) -> Result<PciDevice> {
    let mut matches: Vec<PciDevice> = scan_pci_bus()?
        .into_iter()
        .filter(|dev| dev.matches(vendor_id, device_id))
        .collect();

    if let Some((bus, device, function)) = bdf {
        matches.retain(|d| d.bus == bus && d.device == device && d.function == function);
    }

    match matches.len() {
        0 => Err(Vl805Error::DeviceNotFound {
            vendor_id,
            device_id,
        }),
        1 => Ok(matches.remove(0)),
        _ => {
            log::warn!("Multiple matching devices found:");
            for dev in &matches {
                log::warn!("  {:04x}:{:04x} at {}", dev.vendor_id, dev.device_id, dev.bdf());
            }
            Err(Vl805Error::MultipleDevices)
        }
    }
}

/// Raw PCI configuration space access
///
/// This is the bus primitive everything else is built on. No validation
/// or retry happens at this layer; errors surface as-is.
pub trait ConfigSpace {
    /// Read a byte from config space
    fn read_config8(&mut self, offset: u8) -> Result<u8>;
    /// Read a dword from config space
    fn read_config32(&mut self, offset: u8) -> Result<u32>;
    /// Write a byte to config space
    fn write_config8(&mut self, offset: u8, value: u8) -> Result<()>;
    /// Write a dword to config space
    fn write_config32(&mut self, offset: u8, value: u32) -> Result<()>;
}

impl<C: ConfigSpace> ConfigSpace for &mut C {
    fn read_config8(&mut self, offset: u8) -> Result<u8> {
        (**self).read_config8(offset)
    }

    fn read_config32(&mut self, offset: u8) -> Result<u32> {
        (**self).read_config32(offset)
    }

    fn write_config8(&mut self, offset: u8, value: u8) -> Result<()> {
        (**self).write_config8(offset, value)
    }

    fn write_config32(&mut self, offset: u8, value: u32) -> Result<()> {
        (**self).write_config32(offset, value)
    }
}

/// Config space access through the sysfs `config` file
///
/// Holds the opened file for the lifetime of the programmer, so the
/// device handle has a single exclusive owner.
pub struct SysfsConfigSpace {
    file: File,
    bdf: String,
}

impl SysfsConfigSpace {
    /// Open the config space of a scanned device
    ///
    /// Requires write access to the sysfs config file, which normally
    /// means running as root.
    pub fn open(dev: &PciDevice) -> Result<Self> {
        let path = format!("{}/config", dev.sysfs_path());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Vl805Error::ConfigOpen {
                bdf: dev.bdf(),
                source: e,
            })?;

        log::debug!("vl805: opened config space of {}", dev.bdf());

        Ok(Self {
            file,
            bdf: dev.bdf(),
        })
    }

    /// The BDF string of the underlying device
    pub fn bdf(&self) -> &str {
        &self.bdf
    }

    fn read_at(&mut self, offset: u8, buf: &mut [u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)
    }

    fn write_at(&mut self, offset: u8, buf: &[u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(buf)
    }
}

impl ConfigSpace for SysfsConfigSpace {
    fn read_config8(&mut self, offset: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_at(offset, &mut buf)
            .map_err(|e| Vl805Error::ConfigRead { offset, source: e })?;
        Ok(buf[0])
    }

    fn read_config32(&mut self, offset: u8) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_at(offset, &mut buf)
            .map_err(|e| Vl805Error::ConfigRead { offset, source: e })?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_config8(&mut self, offset: u8, value: u8) -> Result<()> {
        self.write_at(offset, &[value])
            .map_err(|e| Vl805Error::ConfigWrite { offset, source: e })
    }

    fn write_config32(&mut self, offset: u8, value: u32) -> Result<()> {
        self.write_at(offset, &value.to_le_bytes())
            .map_err(|e| Vl805Error::ConfigWrite { offset, source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sysfs_name() {
        assert_eq!(parse_sysfs_name("0000:03:00.0"), Some((0, 0x03, 0x00, 0)));
        assert_eq!(parse_sysfs_name("0001:a2:1f.7"), Some((1, 0xa2, 0x1f, 7)));
        assert_eq!(parse_sysfs_name("03:00.0"), None);
        assert_eq!(parse_sysfs_name("0000:03:00"), None);
        assert_eq!(parse_sysfs_name("zz:03:00.0"), None);
    }

    #[test]
    fn test_parse_bdf() {
        assert_eq!(parse_bdf("03:00.0"), Some((0x03, 0x00, 0)));
        assert_eq!(parse_bdf("a2:1f.7"), Some((0xa2, 0x1f, 7)));
        assert_eq!(parse_bdf("030.0"), None);
        assert_eq!(parse_bdf("03:00"), None);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x1106"), Some(0x1106));
        assert_eq!(parse_hex("3483"), Some(0x3483));
        assert_eq!(parse_hex("not hex"), None);
    }

    #[test]
    fn test_matches() {
        let dev = PciDevice {
            domain: 0,
            bus: 3,
            device: 0,
            function: 0,
            vendor_id: 0x1106,
            device_id: 0x3483,
            revision_id: 1,
        };
        assert!(dev.matches(0x1106, 0x3483));
        assert!(!dev.matches(0x1106, 0x3484));
        assert_eq!(dev.bdf(), "03:00.0");
    }
}
