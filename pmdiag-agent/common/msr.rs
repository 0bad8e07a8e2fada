use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pmdiag::{diag, diag_reg, site, Diagnostics, Subsystem, Verbosity};

use crate::common::errno_of;
use crate::config::AgentConfig;

pub struct MsrHandle {
    file: File,
    cpu_id: u32,
}

impl MsrHandle {
    pub fn open(path: &Path, cpu: u32) -> nix::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(errno_of)?;

        tracing::info!("Opened MSR handle {} for core {}", file.as_raw_fd(), cpu);

        Ok(Self { file, cpu_id: cpu })
    }

    pub fn read(&self, addr: u64) -> nix::Result<u64> {
        let mut buffer = [0u8; 8];
        self.file
            .read_exact_at(&mut buffer, addr)
            .map_err(errno_of)?;

        let value = u64::from_ne_bytes(buffer);
        diag_reg!(Verbosity::Develop, self.cpu_id, addr, value, "MSR read");
        Ok(value)
    }

    pub fn write(&self, addr: u64, value: u64) -> nix::Result<()> {
        diag_reg!(Verbosity::Develop, self.cpu_id, addr, value, "MSR write");
        self.file
            .write_all_at(&value.to_ne_bytes(), addr)
            .map_err(errno_of)
    }
}

/// Per-CPU MSR device handles, opened on first use
pub struct Msr {
    root: PathBuf,
    handles: RwLock<HashMap<u32, Arc<MsrHandle>>>,
}

impl Msr {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handles: RwLock::new(HashMap::new()),
        }
    }

    fn global() -> &'static Arc<Msr> {
        static INSTANCE: Lazy<Arc<Msr>> =
            Lazy::new(|| Arc::new(Msr::new(AgentConfig::from_env().msr_root)));
        &INSTANCE
    }

    pub fn instance() -> &'static Msr {
        Self::global().as_ref()
    }

    /// Shared handle to the process-wide registry, for finalizer registration
    pub fn shared() -> Arc<Msr> {
        Arc::clone(Self::global())
    }

    pub fn device_path(&self, cpu: u32) -> PathBuf {
        self.root.join(cpu.to_string()).join("msr")
    }

    fn get_handle(&self, cpu: u32) -> nix::Result<Arc<MsrHandle>> {
        {
            let handles = self.handles.read();
            if let Some(handle) = handles.get(&cpu) {
                return Ok(Arc::clone(handle));
            }
        }

        let mut handles = self.handles.write();
        if let Some(handle) = handles.get(&cpu) {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(MsrHandle::open(&self.device_path(cpu), cpu)?);
        handles.insert(cpu, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn read(&self, cpu: u32, addr: u64) -> nix::Result<u64> {
        let handle = self.get_handle(cpu)?;
        handle.read(addr)
    }

    pub fn write(&self, cpu: u32, addr: u64, value: u64) -> nix::Result<()> {
        let handle = self.get_handle(cpu)?;
        handle.write(addr, value)
    }

    pub fn read_checked(&self, diag: &Diagnostics, cpu: u32, addr: u64) -> pmdiag::Result<u64> {
        diag.check_msr_read(site!(), || self.read(cpu, addr))
    }

    pub fn write_checked(
        &self,
        diag: &Diagnostics,
        cpu: u32,
        addr: u64,
        value: u64,
    ) -> pmdiag::Result<()> {
        diag.check_msr_write(site!(), || self.write(cpu, addr, value))
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
            "Finalized MSR subsystem, released {released} handles"
        );
    }
}

impl Subsystem for Msr {
    fn name(&self) -> &'static str {
        "msr"
    }

    fn finalize(&self) {
        Msr::finalize(self);
    }
}
