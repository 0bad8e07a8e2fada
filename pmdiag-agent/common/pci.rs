use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use pmdiag::{diag, diag_pci_reg, site, Diagnostics, Subsystem, Verbosity};

use crate::common::errno_of;
use crate::config::AgentConfig;
use crate::error::AgentError;

/// Segment/bus/device/function of a PCI configuration space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddress {
    pub group_number: u32,
    pub bus: u32,
    pub device: u32,
    pub function: u32,
}

impl PciAddress {
    pub fn new(group_number: u32, bus: u32, device: u32, function: u32) -> Self {
        Self {
            group_number,
            bus,
            device,
            function,
        }
    }

    /// Location below the `/proc/bus/pci` root
    pub fn relative_path(&self) -> PathBuf {
        let path = if self.group_number > 0 {
            format!(
                "{:04x}:{:02x}/{:02x}.{}",
                self.group_number, self.bus, self.device, self.function
            )
        } else {
            format!("{:02x}/{:02x}.{}", self.bus, self.device, self.function)
        };
        PathBuf::from(path)
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04X}:{:02X}:{:02X}.{}",
            self.group_number, self.bus, self.device, self.function
        )
    }
}

/// Accepts `bus:device.function` or `segment:bus:device.function`, hex
/// fields, as printed by `lspci`
impl FromStr for PciAddress {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AgentError::ParseError(format!("invalid PCI address '{s}'"));
        let hex = |field: &str| u32::from_str_radix(field, 16).map_err(|_| invalid());

        let (head, function) = s.trim().rsplit_once('.').ok_or_else(invalid)?;
        let fields: Vec<&str> = head.split(':').collect();
        let (group_number, bus, device) = match fields.as_slice() {
            [bus, device] => (0, hex(*bus)?, hex(*device)?),
            [group, bus, device] => (hex(*group)?, hex(*bus)?, hex(*device)?),
            _ => return Err(invalid()),
        };
        let function: u32 = function.parse().map_err(|_| invalid())?;

        if bus > 0xFF || device > 0x1F || function > 7 {
            return Err(invalid());
        }

        Ok(Self::new(group_number, bus, device, function))
    }
}

pub struct PciHandle {
    file: File,
    address: PciAddress,
}

impl PciHandle {
    pub fn open(path: &Path, address: PciAddress) -> nix::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(errno_of)?;

        tracing::info!("Opened PCI handle for device {address}");

        Ok(Self { file, address })
    }

    pub fn read32(&self, offset: u32) -> nix::Result<u32> {
        let mut buffer = [0u8; 4];
        self.file
            .read_exact_at(&mut buffer, u64::from(offset))
            .map_err(errno_of)?;

        let value = u32::from_le_bytes(buffer);
        diag_pci_reg!(
            Verbosity::Develop,
            self.address.bus,
            self.address.device,
            u64::from(offset),
            u64::from(value),
            "PCI read"
        );
        Ok(value)
    }

    pub fn write32(&self, offset: u32, value: u32) -> nix::Result<()> {
        diag_pci_reg!(
            Verbosity::Develop,
            self.address.bus,
            self.address.device,
            u64::from(offset),
            u64::from(value),
            "PCI write"
        );
        self.file
            .write_all_at(&value.to_le_bytes(), u64::from(offset))
            .map_err(errno_of)
    }
}

/// PCI configuration-space handles, opened on first use
pub struct Pci {
    root: PathBuf,
    handles: RwLock<HashMap<PciAddress, Arc<PciHandle>>>,
}

impl Pci {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handles: RwLock::new(HashMap::new()),
        }
    }

    fn global() -> &'static Arc<Pci> {
        static INSTANCE: Lazy<Arc<Pci>> =
            Lazy::new(|| Arc::new(Pci::new(AgentConfig::from_env().pci_root)));
        &INSTANCE
    }

    pub fn instance() -> &'static Pci {
        Self::global().as_ref()
    }

    pub fn shared() -> Arc<Pci> {
        Arc::clone(Self::global())
    }

    pub fn device_path(&self, address: PciAddress) -> PathBuf {
        self.root.join(address.relative_path())
    }

    fn get_or_create_handle(&self, address: PciAddress) -> nix::Result<Arc<PciHandle>> {
        {
            let handles = self.handles.read();
            if let Some(handle) = handles.get(&address) {
                return Ok(Arc::clone(handle));
            }
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&address) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(PciHandle::open(&self.device_path(address), address)?);
        handles.insert(address, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn read32(&self, address: PciAddress, offset: u32) -> nix::Result<u32> {
        let handle = self.get_or_create_handle(address)?;
        handle.read32(offset)
    }

    pub fn write32(&self, address: PciAddress, offset: u32, value: u32) -> nix::Result<()> {
        let handle = self.get_or_create_handle(address)?;
        handle.write32(offset, value)
    }

    pub fn read32_checked(
        &self,
        diag: &Diagnostics,
        address: PciAddress,
        offset: u32,
    ) -> pmdiag::Result<u32> {
        diag.check_pci_read(site!(), || self.read32(address, offset))
    }

    pub fn write32_checked(
        &self,
        diag: &Diagnostics,
        address: PciAddress,
        offset: u32,
        value: u32,
    ) -> pmdiag::Result<()> {
        diag.check_pci_write(site!(), || self.write32(address, offset, value))
    }

    pub fn open_handles(&self) -> usize {
        self.handles.read().len()
    }

    /// Close every open handle. Safe to call repeatedly or before any access.
    pub fn finalize(&self) {
        let released = {
            let mut handles = self.handles.write();
            let count = handles.len();
            handles.clear();
            count
        };
        diag!(
            Verbosity::Detail,
            "Finalized PCI subsystem, released {released} handles"
        );
    }
}

impl Subsystem for Pci {
    fn name(&self) -> &'static str {
        "pci"
    }

    fn finalize(&self) {
        Pci::finalize(self);
    }
}
