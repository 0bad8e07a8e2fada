#![allow(dead_code)] // each test binary uses a different subset

use std::fs::{self, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use pmdiag_agent::{AgentConfig, PciAddress};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Throwaway directory laid out like `/dev/cpu` and `/proc/bus/pci`
pub struct FakeDevices {
    root: PathBuf,
}

impl FakeDevices {
    pub fn new(name: &str) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
        let root = std::env::temp_dir().join(format!(
            "pmdiag-{name}-{}-{id}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> AgentConfig {
        AgentConfig::with_prefix(&self.root)
    }

    /// Create `/dev/cpu/<cpu>/msr` covering the first `size` register addresses
    pub fn add_msr(&self, cpu: u32, size: u64) -> PathBuf {
        let dir = self.config().msr_root.join(cpu.to_string());
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("msr");
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        file.set_len(size).unwrap();
        path
    }

    pub fn set_msr(&self, cpu: u32, reg: u64, value: u64) {
        let path = self.config().msr_root.join(cpu.to_string()).join("msr");
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.write_all_at(&value.to_ne_bytes(), reg).unwrap();
    }

    pub fn get_msr(&self, cpu: u32, reg: u64) -> u64 {
        let path = self.config().msr_root.join(cpu.to_string()).join("msr");
        let file = OpenOptions::new().read(true).open(path).unwrap();
        let mut buffer = [0u8; 8];
        file.read_exact_at(&mut buffer, reg).unwrap();
        u64::from_ne_bytes(buffer)
    }

    /// Create a 4 KiB extended configuration space for `address`
    pub fn add_pci(&self, address: PciAddress) -> PathBuf {
        let path = self.config().pci_root.join(address.relative_path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .unwrap();
        file.set_len(4096).unwrap();
        path
    }

    pub fn set_pci(&self, address: PciAddress, offset: u32, value: u32) {
        let path = self.config().pci_root.join(address.relative_path());
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.write_all_at(&value.to_le_bytes(), u64::from(offset)).unwrap();
    }
}

impl Drop for FakeDevices {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
