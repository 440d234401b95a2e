//! Error types for network generation and cascade runs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContagionError {
    /// Malformed generator parameters, network, shock set or cascade options.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A caller-imposed round cap was reached before the cascade settled.
    #[error("cascade did not converge within {max_rounds} rounds")]
    NonConvergence { max_rounds: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ContagionError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ContagionError>;
