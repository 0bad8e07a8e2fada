use std::path::{Path, PathBuf};

pub const DEVICE_ROOT_ENV: &str = "PMDIAG_DEVICE_ROOT";

const MSR_DIR: &str = "dev/cpu";
const PCI_DIR: &str = "proc/bus/pci";

/// Widest range accepted in a CPU list
pub const MAX_CPU_RANGE: u32 = 4096;

/// Locations of the MSR and PCI device trees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub msr_root: PathBuf,
    pub pci_root: PathBuf,
}

impl AgentConfig {
    /// Device trees below `prefix` (`/` for the host)
    pub fn with_prefix(prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        Self {
            msr_root: prefix.join(MSR_DIR),
            pci_root: prefix.join(PCI_DIR),
        }
    }

    /// Honor `PMDIAG_DEVICE_ROOT`, or the `/pcm` bind mount when running in
    /// a container
    pub fn from_env() -> Self {
        if let Ok(prefix) = std::env::var(DEVICE_ROOT_ENV) {
            tracing::info!("Using device root {prefix} from {DEVICE_ROOT_ENV}");
            return Self::with_prefix(prefix);
        }

        if std::env::var("DOCKER_RUNNING").is_ok() {
            Self::with_prefix("/pcm")
        } else {
            Self::default()
        }
    }

    /// Parse CPU list like "0-3,8-11" into Vec<u32>. Ranges wider than
    /// [`MAX_CPU_RANGE`] are rejected.
    pub fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
        let mut cpus = Vec::new();
        for part in s.trim().split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().ok()?;
                let end: u32 = end.trim().parse().ok()?;
                if start > end || end - start >= MAX_CPU_RANGE {
                    return None;
                }
                cpus.extend(start..=end);
            } else {
                cpus.push(part.parse().ok()?);
            }
        }
        cpus.sort_unstable();
        cpus.dedup();
        Some(cpus)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::with_prefix("/")
    }
}
