use nix::errno::Errno;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiagError>;

/// Errors surfaced by the diagnostic layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagError {
    /// A register access failed and the caller chose to propagate it
    #[error("{message}: {}", .errno.desc())]
    Io { message: String, errno: Errno },

    #[error("Invalid verbosity level: {0}")]
    InvalidVerbosity(String),

    #[error("Invalid diagnostic sink: {0}")]
    InvalidSink(String),

    #[error("Diagnostics context is already installed")]
    AlreadyInstalled,
}

impl DiagError {
    pub fn io(message: impl Into<String>, errno: Errno) -> Self {
        Self::Io {
            message: message.into(),
            errno,
        }
    }

    /// OS error behind this failure, if there is one
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Io { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}
