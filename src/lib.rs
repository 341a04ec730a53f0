//! rrf-fusion - weighted Reciprocal Rank Fusion for hybrid retrieval
//!
//! Combines ranked document lists from a semantic retriever and a lexical
//! retriever (or any number of [`Retriever`]s) into one deduplicated ranking
//! without comparing their raw relevance scores.
//!
//! ```no_run
//! use rrf_fusion::{Document, EnsembleRetriever, StaticRetriever};
//!
//! let ensemble = EnsembleRetriever::builder()
//!     .retriever(StaticRetriever::from_contents("semantic", ["a", "b"]), 0.6)
//!     .retriever(StaticRetriever::from_contents("lexical", ["b", "c"]), 0.4)
//!     .build()?;
//! let docs: Vec<Document> = ensemble.fuse("arm's length principle")?;
//! # Ok::<(), rrf_fusion::FusionError>(())
//! ```

pub mod config;
pub mod error;
pub mod search;
pub mod test_utils;

pub use config::FusionSettings;
pub use error::{FusionError, Result};
pub use search::{
    CancellationToken, DedupStrategy, Document, EnsembleRetriever, Execution, FusedDocument,
    Retriever, StaticRetriever, WeightPolicy,
};
