//! Hybrid retrieval fusion
//!
//! Merges ranked lists from independent retrievers (semantic, lexical) into a
//! single deduplicated ranking with weighted Reciprocal Rank Fusion.

pub mod cancel;
pub mod document;
pub mod ensemble;
pub mod hybrid;
pub mod retriever;

pub use cancel::CancellationToken;
pub use document::{DedupStrategy, Document, DocumentKey};
pub use ensemble::{EnsembleBuilder, EnsembleRetriever, Execution, WeightPolicy, resolve_weights};
pub use hybrid::{
    Contribution, DEFAULT_RRF_C, FusedDocument, RankedList, RrfAccumulator, RrfConfig,
    reciprocal_rank_fusion, rrf_contribution,
};
pub use retriever::{FnRetriever, Retriever, StaticRetriever};
