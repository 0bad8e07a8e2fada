pub mod common;
pub mod config;
pub mod counters;
pub mod error;

use pmdiag::{DiagConfig, Diagnostics, Finalizer};

pub use common::{Msr, Pci, PciAddress};
pub use config::AgentConfig;
pub use counters::rapl::{PowerDomain, RaplMonitor};
pub use counters::thermal::ThermalMonitor;
pub use error::{AgentError, Result};

/// Finalize actions for the process-wide MSR and PCI registries
pub fn hardware_finalizer() -> Finalizer {
    Finalizer::new(Msr::shared(), Pci::shared())
}

/// Publish the process-wide diagnostics context with both hardware
/// subsystems registered for teardown on fatal failures.
///
/// Must run before anything reaches `Diagnostics::global()`, including
/// register accesses, or it fails with `DiagError::AlreadyInstalled`.
pub fn init(config: &DiagConfig) -> Result<&'static Diagnostics> {
    let diag = Diagnostics::from_config(config, hardware_finalizer()).install()?;
    tracing::debug!("Diagnostics installed at verbosity {}", config.verbosity);
    Ok(diag)
}
