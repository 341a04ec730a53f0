//! RRF (Reciprocal Rank Fusion) for hybrid search
//!
//! Scores each document by `Σ weight / (rank + c)` over every ranked list it
//! appears in. Only rank positions are used, so retrievers with incomparable
//! score scales (cosine similarity, BM25) fuse without normalization.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::document::{DedupStrategy, Document, DocumentKey};
use crate::error::{FusionError, Result};

/// Canonical RRF smoothing constant.
pub const DEFAULT_RRF_C: f64 = 60.0;

/// Reciprocal Rank Fusion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrfConfig {
    /// Rank-decay constant (default: 60)
    pub c: f64,
    /// Identity key used to merge documents across lists
    pub dedup: DedupStrategy,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            c: DEFAULT_RRF_C,
            dedup: DedupStrategy::Content,
        }
    }
}

impl RrfConfig {
    /// Reject constants that would make `rank + c` zero, negative, or NaN.
    pub fn validate(&self) -> Result<()> {
        validate_constant(self.c)
    }
}

pub(crate) fn validate_constant(c: f64) -> Result<()> {
    if c.is_finite() && c > 0.0 {
        Ok(())
    } else {
        Err(FusionError::InvalidConstant(c))
    }
}

/// Score contribution of a document at 0-indexed `rank` in a list weighted `weight`.
#[must_use]
pub fn rrf_contribution(weight: f64, rank: usize, c: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let rank = rank as f64;
    weight / (rank + c)
}

/// One retriever's ranked output, ready for fusion.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub retriever: String,
    pub weight: f64,
    pub documents: Vec<Document>,
}

impl RankedList {
    pub fn new(retriever: impl Into<String>, weight: f64, documents: Vec<Document>) -> Self {
        Self {
            retriever: retriever.into(),
            weight,
            documents,
        }
    }
}

/// A single list's share of a fused score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Retriever that ranked the document
    pub retriever: String,
    /// 0-indexed rank within that retriever's list
    pub rank: usize,
    /// `weight / (rank + c)`
    pub score: f64,
}

/// A fused result: the first-seen document instance and its accumulated score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedDocument {
    pub document: Document,
    pub score: f64,
    pub contributions: Vec<Contribution>,
}

impl FusedDocument {
    /// Rank assigned by the named retriever, if it returned this document.
    #[must_use]
    pub fn rank_in(&self, retriever: &str) -> Option<usize> {
        self.contributions
            .iter()
            .find(|c| c.retriever == retriever)
            .map(|c| c.rank)
    }
}

/// Accumulates weighted RRF scores across ranked lists.
///
/// Lists must be added in configured retriever order: insertion order is the
/// tie-break for exactly equal scores.
#[derive(Debug)]
pub struct RrfAccumulator {
    c: f64,
    dedup: DedupStrategy,
    slots: HashMap<DocumentKey, usize>,
    entries: Vec<FusedDocument>,
}

impl RrfAccumulator {
    pub fn new(config: RrfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            c: config.c,
            dedup: config.dedup,
            slots: HashMap::new(),
            entries: Vec::new(),
        })
    }

    /// Fold one ranked list into the running totals.
    pub fn add(&mut self, list: RankedList) {
        let RankedList {
            retriever,
            weight,
            documents,
        } = list;

        for (rank, doc) in documents.into_iter().enumerate() {
            let score = rrf_contribution(weight, rank, self.c);
            let contribution = Contribution {
                retriever: retriever.clone(),
                rank,
                score,
            };

            match self.slots.entry(self.dedup.key(&doc)) {
                Entry::Occupied(slot) => {
                    let entry = &mut self.entries[*slot.get()];
                    entry.score += score;
                    entry.contributions.push(contribution);
                }
                Entry::Vacant(slot) => {
                    slot.insert(self.entries.len());
                    self.entries.push(FusedDocument {
                        document: doc,
                        score,
                        contributions: vec![contribution],
                    });
                }
            }
        }
    }

    /// Number of distinct identity keys seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort by fused score, descending. The sort is stable, so ties keep first-seen order.
    #[must_use]
    pub fn finish(self) -> Vec<FusedDocument> {
        let mut fused = self.entries;
        for entry in &mut fused {
            // -0.0 + 0.0 is 0.0; zero scores must compare equal.
            entry.score += 0.0;
        }
        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(
            distinct = fused.len(),
            top_score = fused.first().map_or(0.0, |f| f.score),
            "rrf merge complete"
        );
        fused
    }
}

/// Fuse already-retrieved ranked lists.
pub fn reciprocal_rank_fusion(
    lists: impl IntoIterator<Item = RankedList>,
    config: &RrfConfig,
) -> Result<Vec<FusedDocument>> {
    let mut acc = RrfAccumulator::new(*config)?;
    for list in lists {
        acc.add(list);
    }
    Ok(acc.finish())
}
