//! # pmdiag
//!
//! Diagnostic and failure-handling layer for MSR and PCI configuration-space
//! register access.
//!
//! The crate has three jobs:
//! - turn negative-status/errno failures of register operations into
//!   uniformly formatted error lines carrying the call site and OS cause,
//! - make sure the MSR and PCI subsystems release their device handles before
//!   the process exits on an unrecoverable failure,
//! - offer a verbosity-gated trace facility cheap enough for hot register
//!   paths.
//!
//! ## Usage
//!
//! ```ignore
//! use pmdiag::{diag_reg, site, Diagnostics, Verbosity};
//!
//! let diag = Diagnostics::global();
//! diag.set_level(Verbosity::Develop);
//!
//! let value = diag.check_msr_read(site!(), || msr.read(cpu, 0x611))?;
//! diag_reg!(Verbosity::Develop, cpu, 0x611, value, "PKG_ENERGY_STATUS");
//!
//! // Unrecoverable: log, finalize both subsystems, exit(EXIT_FAILURE)
//! diag.check_fatal(site!(), || msr.write(cpu, 0x38F, 0), "Cannot clear PERF_GLOBAL_CTRL");
//! ```

#[macro_use]
pub mod macros;

pub mod check;
pub mod config;
pub mod context;
pub mod emit;
pub mod error;
pub mod finalize;
pub mod report;
pub mod sink;
pub mod verbosity;

pub use check::Status;
pub use config::{DiagConfig, SinkKind};
pub use context::Diagnostics;
pub use emit::{RegisterAccess, Site};
pub use error::{DiagError, Result};
pub use finalize::{Detached, Finalizer, Subsystem};
pub use sink::{Channel, MemorySink, Sink, StdSink, TracingSink};
pub use verbosity::{Verbosity, VerbosityGate};

pub use nix::errno::Errno;

/// Set the process-wide verbosity.
///
/// This touches [`Diagnostics::global`], which publishes the default context
/// if none is installed yet. Install the real one first: a later
/// [`Diagnostics::install`] fails with [`DiagError::AlreadyInstalled`].
pub fn set_level(level: Verbosity) {
    Diagnostics::global().set_level(level);
}

/// Current process-wide verbosity. Same caveat as [`set_level`].
pub fn current_level() -> Verbosity {
    Diagnostics::global().current_level()
}
