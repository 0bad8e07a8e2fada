//! Teardown of the MSR and PCI access subsystems on failure paths

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A hardware access subsystem that owns device handles.
///
/// `finalize` releases everything the subsystem holds. It must be idempotent
/// and must be a no-op when the subsystem was never initialized.
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &'static str;

    fn finalize(&self);
}

/// Placeholder used until real subsystems are registered
#[derive(Debug, Clone, Copy)]
pub struct Detached(pub &'static str);

impl Subsystem for Detached {
    fn name(&self) -> &'static str {
        self.0
    }

    fn finalize(&self) {}
}

/// Invokes both subsystem teardowns
#[derive(Clone)]
pub struct Finalizer {
    msr: Arc<dyn Subsystem>,
    pci: Arc<dyn Subsystem>,
}

impl Finalizer {
    pub fn new(msr: Arc<dyn Subsystem>, pci: Arc<dyn Subsystem>) -> Self {
        Self { msr, pci }
    }

    /// Finalize MSR, then PCI.
    ///
    /// Both are always attempted: a panic raised by one subsystem's teardown
    /// is caught and logged, and the other subsystem is still finalized.
    pub fn finalize_all(&self) {
        Self::finalize_one(self.msr.as_ref());
        Self::finalize_one(self.pci.as_ref());
    }

    fn finalize_one(subsystem: &dyn Subsystem) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| subsystem.finalize()));
        if outcome.is_err() {
            tracing::warn!("Finalizing {} subsystem panicked", subsystem.name());
        }
    }
}

impl Default for Finalizer {
    fn default() -> Self {
        Self::new(Arc::new(Detached("msr")), Arc::new(Detached("pci")))
    }
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer")
            .field("msr", &self.msr.name())
            .field("pci", &self.pci.name())
            .finish()
    }
}
