use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::config::{DiagConfig, SinkKind};
use crate::error::{DiagError, Result};
use crate::finalize::Finalizer;
use crate::sink::{Sink, StdSink, TracingSink};
use crate::verbosity::{Verbosity, VerbosityGate};

static GLOBAL: OnceCell<Diagnostics> = OnceCell::new();

/// Verbosity gate, output sink and finalize actions bundled together.
///
/// Library code reaches the process-wide instance through
/// [`Diagnostics::global`]; tests and embedders can build private ones.
pub struct Diagnostics {
    gate: VerbosityGate,
    sink: Arc<dyn Sink>,
    finalizer: Finalizer,
}

impl Diagnostics {
    pub fn new(level: Verbosity, sink: Arc<dyn Sink>, finalizer: Finalizer) -> Self {
        Self {
            gate: VerbosityGate::new(level),
            sink,
            finalizer,
        }
    }

    pub fn from_config(config: &DiagConfig, finalizer: Finalizer) -> Self {
        let sink: Arc<dyn Sink> = match config.sink {
            SinkKind::Std => Arc::new(StdSink),
            SinkKind::Tracing => Arc::new(TracingSink),
        };
        Self::new(config.verbosity, sink, finalizer)
    }

    /// Process-wide instance.
    ///
    /// Falls back to stdout/stderr output, `OnlyError` verbosity and detached
    /// finalize actions when nothing has been installed. That fallback is
    /// published on first use, after which [`Diagnostics::install`] fails.
    pub fn global() -> &'static Diagnostics {
        GLOBAL.get_or_init(Diagnostics::default)
    }

    /// Publish `self` as the process-wide instance. Only the first call wins.
    pub fn install(self) -> Result<&'static Diagnostics> {
        GLOBAL
            .set(self)
            .map_err(|_| DiagError::AlreadyInstalled)?;
        Ok(Self::global())
    }

    pub fn gate(&self) -> &VerbosityGate {
        &self.gate
    }

    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    pub fn finalizer(&self) -> &Finalizer {
        &self.finalizer
    }

    pub fn set_level(&self, level: Verbosity) {
        self.gate.set_level(level);
    }

    pub fn current_level(&self) -> Verbosity {
        self.gate.current_level()
    }

    /// Run both subsystem teardowns
    pub fn finalize_all(&self) {
        self.finalizer.finalize_all();
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Verbosity::OnlyError, Arc::new(StdSink), Finalizer::default())
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("level", &self.current_level())
            .field("finalizer", &self.finalizer)
            .finish()
    }
}
