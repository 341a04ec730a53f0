//! Error types for rank fusion

use thiserror::Error;

/// Errors surfaced by the fusion layer.
///
/// An empty fused list is never an error: it means no retriever matched.
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("retriever '{retriever}' (position {index}) failed: {source:#}")]
    RetrieverFailure {
        retriever: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("misconfigured weights: {retrievers} retrievers but only {weights} weights")]
    MisconfiguredWeights { retrievers: usize, weights: usize },

    #[error("invalid weight {weight} for retriever '{retriever}': must be finite")]
    InvalidWeight { retriever: String, weight: f64 },

    #[error("invalid RRF constant {0}: must be finite and greater than zero")]
    InvalidConstant(f64),

    #[error("fusion cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FusionError {
    /// Name of the failing retriever, if this is a retrieval failure.
    #[must_use]
    pub fn retriever(&self) -> Option<&str> {
        match self {
            Self::RetrieverFailure { retriever, .. } => Some(retriever),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FusionError>;
