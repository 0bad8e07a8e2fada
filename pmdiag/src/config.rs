use std::str::FromStr;

use crate::error::DiagError;
use crate::verbosity::Verbosity;

pub const VERBOSITY_ENV: &str = "PMDIAG_VERBOSITY";
pub const SINK_ENV: &str = "PMDIAG_SINK";

/// Where diagnostic and error lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// Diagnostics on stdout, errors on stderr
    #[default]
    Std,
    /// Forward every line as a `tracing` event
    Tracing,
}

impl FromStr for SinkKind {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "std" | "stdio" => Ok(SinkKind::Std),
            "tracing" => Ok(SinkKind::Tracing),
            other => Err(DiagError::InvalidSink(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagConfig {
    pub verbosity: Verbosity,
    pub sink: SinkKind,
}

impl DiagConfig {
    pub fn new(verbosity: Verbosity, sink: SinkKind) -> Self {
        Self { verbosity, sink }
    }

    /// Read `PMDIAG_VERBOSITY` and `PMDIAG_SINK`, keeping defaults for
    /// missing or malformed values
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(VERBOSITY_ENV) {
            match raw.parse() {
                Ok(level) => config.verbosity = level,
                Err(e) => tracing::warn!("Ignoring {VERBOSITY_ENV}: {e}"),
            }
        }

        if let Some(raw) = lookup(SINK_ENV) {
            match raw.parse() {
                Ok(sink) => config.sink = sink,
                Err(e) => tracing::warn!("Ignoring {SINK_ENV}: {e}"),
            }
        }

        config
    }
}
