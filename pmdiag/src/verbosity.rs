//! Process-wide diagnostic detail level

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::DiagError;

/// Diagnostic detail levels, ordered by increasing detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Verbosity {
    #[default]
    OnlyError = 0,
    Info = 1,
    Detail = 2,
    Develop = 3,
}

impl Verbosity {
    pub fn name(&self) -> &'static str {
        match self {
            Verbosity::OnlyError => "only-error",
            Verbosity::Info => "info",
            Verbosity::Detail => "detail",
            Verbosity::Develop => "develop",
        }
    }

    pub fn all() -> Vec<Verbosity> {
        vec![
            Verbosity::OnlyError,
            Verbosity::Info,
            Verbosity::Detail,
            Verbosity::Develop,
        ]
    }

    /// Map a repeated `-v` count onto a level, saturating at `Develop`
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Verbosity::OnlyError,
            1 => Verbosity::Info,
            2 => Verbosity::Detail,
            _ => Verbosity::Develop,
        }
    }

    /// Equivalent `tracing` level for the subscriber max level
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            Verbosity::OnlyError => tracing::Level::ERROR,
            Verbosity::Info => tracing::Level::INFO,
            Verbosity::Detail => tracing::Level::DEBUG,
            Verbosity::Develop => tracing::Level::TRACE,
        }
    }
}

impl TryFrom<u8> for Verbosity {
    type Error = DiagError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Verbosity::OnlyError),
            1 => Ok(Verbosity::Info),
            2 => Ok(Verbosity::Detail),
            3 => Ok(Verbosity::Develop),
            other => Err(DiagError::InvalidVerbosity(other.to_string())),
        }
    }
}

impl FromStr for Verbosity {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(level) = s.parse::<u8>() {
            return Verbosity::try_from(level);
        }

        match s.to_ascii_lowercase().as_str() {
            "only-error" | "only_error" | "error" => Ok(Verbosity::OnlyError),
            "info" => Ok(Verbosity::Info),
            "detail" => Ok(Verbosity::Detail),
            "develop" => Ok(Verbosity::Develop),
            _ => Err(DiagError::InvalidVerbosity(s.to_string())),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Write-once, read-many holder of the current level.
///
/// The level is published with release ordering and read with acquire
/// ordering; callers are expected to set it during initialization, before
/// any concurrent diagnostic call.
#[derive(Debug)]
pub struct VerbosityGate {
    level: AtomicU8,
}

impl VerbosityGate {
    pub const fn new(level: Verbosity) -> Self {
        Self {
            level: AtomicU8::new(level as u8),
        }
    }

    pub fn set_level(&self, level: Verbosity) {
        self.level.store(level as u8, Ordering::Release);
    }

    pub fn current_level(&self) -> Verbosity {
        // Only valid discriminants are ever stored
        Verbosity::try_from(self.level.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Whether a message of `severity` is within the current detail budget
    #[inline]
    pub fn enabled(&self, severity: Verbosity) -> bool {
        severity as u8 <= self.level.load(Ordering::Acquire)
    }
}

impl Default for VerbosityGate {
    fn default() -> Self {
        Self::new(Verbosity::OnlyError)
    }
}
