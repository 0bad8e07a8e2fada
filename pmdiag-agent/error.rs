use pmdiag::DiagError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Diag(#[from] DiagError),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
