//! Weighted ensemble of retrievers fused with RRF
//!
//! The ensemble invokes each configured retriever with the same query, then
//! merges the ranked lists with [`RrfAccumulator`]. Fusion is all-or-nothing:
//! a failing retriever or a cancellation aborts the run with no partial output.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cancel::CancellationToken;
use super::document::{DedupStrategy, Document};
use super::hybrid::{DEFAULT_RRF_C, FusedDocument, RankedList, RrfAccumulator, RrfConfig};
use super::retriever::Retriever;
use crate::config::FusionSettings;
use crate::error::{FusionError, Result};

/// What to do when fewer weights than retrievers are configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Missing weights default to 1.0, with a warning.
    #[default]
    Lenient,
    /// Missing weights are a configuration error.
    Strict,
}

impl std::str::FromStr for WeightPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown weight policy: {other}")),
        }
    }
}

/// How retrievers are invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// One after another, in configured order.
    #[default]
    Sequential,
    /// Concurrently on the rayon pool; merged only after all return.
    Parallel,
}

/// Pair each retriever position with a weight.
///
/// Surplus weights are ignored. Missing weights become 1.0 under
/// [`WeightPolicy::Lenient`] and an error under [`WeightPolicy::Strict`].
pub fn resolve_weights(
    retrievers: usize,
    weights: &[f64],
    policy: WeightPolicy,
) -> Result<Vec<f64>> {
    if weights.len() < retrievers {
        match policy {
            WeightPolicy::Strict => {
                return Err(FusionError::MisconfiguredWeights {
                    retrievers,
                    weights: weights.len(),
                });
            }
            WeightPolicy::Lenient => warn!(
                retrievers,
                weights = weights.len(),
                "fewer weights than retrievers; missing weights default to 1.0"
            ),
        }
    } else if weights.len() > retrievers {
        debug!(
            retrievers,
            weights = weights.len(),
            "ignoring surplus fusion weights"
        );
    }

    Ok((0..retrievers)
        .map(|i| weights.get(i).copied().unwrap_or(1.0))
        .collect())
}

struct Member {
    retriever: Arc<dyn Retriever>,
    weight: f64,
}

/// Retrievers with weights, fused by weighted Reciprocal Rank Fusion.
pub struct EnsembleRetriever {
    name: String,
    members: Vec<Member>,
    config: RrfConfig,
    execution: Execution,
}

impl std::fmt::Debug for EnsembleRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members: Vec<(&str, f64)> = self
            .members
            .iter()
            .map(|m| (m.retriever.name(), m.weight))
            .collect();
        f.debug_struct("EnsembleRetriever")
            .field("name", &self.name)
            .field("members", &members)
            .field("config", &self.config)
            .field("execution", &self.execution)
            .finish()
    }
}

impl EnsembleRetriever {
    /// Parallel lists of retrievers and weights, `c = 60`, lenient weights.
    ///
    /// Non-finite weights are treated as missing and become 1.0.
    pub fn new(retrievers: Vec<Arc<dyn Retriever>>, weights: &[f64]) -> Self {
        let resolved = resolve_weights(retrievers.len(), weights, WeightPolicy::Lenient)
            .unwrap_or_else(|_| vec![1.0; retrievers.len()])
            .into_iter()
            .zip(&retrievers)
            .map(|(weight, retriever)| {
                if weight.is_finite() {
                    weight
                } else {
                    warn!(
                        retriever = retriever.name(),
                        weight, "non-finite fusion weight replaced with 1.0"
                    );
                    1.0
                }
            })
            .collect::<Vec<_>>();
        Self::from_parts(
            "ensemble".to_string(),
            retrievers.into_iter().zip(resolved).collect(),
            RrfConfig::default(),
            Execution::Sequential,
        )
    }

    pub fn builder() -> EnsembleBuilder {
        EnsembleBuilder::default()
    }

    /// Build from loaded settings. `settings.weights` pair with `retrievers` by position.
    pub fn from_settings(
        retrievers: Vec<Arc<dyn Retriever>>,
        settings: &FusionSettings,
    ) -> Result<Self> {
        let mut builder = Self::builder()
            .c(settings.c)
            .dedup(settings.dedup)
            .weight_policy(settings.weight_policy)
            .execution(if settings.parallel {
                Execution::Parallel
            } else {
                Execution::Sequential
            });
        for retriever in retrievers {
            builder = builder.shared(retriever);
        }
        builder.weights(&settings.weights).build()
    }

    fn from_parts(
        name: String,
        members: Vec<(Arc<dyn Retriever>, f64)>,
        config: RrfConfig,
        execution: Execution,
    ) -> Self {
        for (retriever, weight) in &members {
            if *weight <= 0.0 {
                warn!(
                    retriever = retriever.name(),
                    weight, "non-positive fusion weight"
                );
            }
        }
        Self {
            name,
            members: members
                .into_iter()
                .map(|(retriever, weight)| Member { retriever, weight })
                .collect(),
            config,
            execution,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RrfConfig {
        &self.config
    }

    #[must_use]
    pub const fn execution(&self) -> Execution {
        self.execution
    }

    /// Resolved weights in configured order.
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        self.members.iter().map(|m| m.weight).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fused, deduplicated documents for `query`, best first.
    pub fn fuse(&self, query: &str) -> Result<Vec<Document>> {
        Ok(into_documents(self.run(query, None)?))
    }

    /// Like [`fuse`](Self::fuse), keeping scores and per-retriever ranks.
    pub fn fuse_scored(&self, query: &str) -> Result<Vec<FusedDocument>> {
        self.run(query, None)
    }

    /// Like [`fuse`](Self::fuse), aborting with `Cancelled` once `token` fires.
    pub fn fuse_with_cancel(
        &self,
        query: &str,
        token: &CancellationToken,
    ) -> Result<Vec<Document>> {
        Ok(into_documents(self.run(query, Some(token))?))
    }

    pub fn fuse_scored_with_cancel(
        &self,
        query: &str,
        token: &CancellationToken,
    ) -> Result<Vec<FusedDocument>> {
        self.run(query, Some(token))
    }

    fn run(&self, query: &str, cancel: Option<&CancellationToken>) -> Result<Vec<FusedDocument>> {
        check(cancel)?;

        if self.members.is_empty() {
            warn!(ensemble = %self.name, "fusing with no retrievers configured");
        }

        let lists = match self.execution {
            Execution::Sequential => self.retrieve_sequential(query, cancel)?,
            Execution::Parallel => self.retrieve_parallel(query, cancel)?,
        };

        // Results of calls that finished after cancellation are discarded here.
        check(cancel)?;

        let mut acc = RrfAccumulator::new(self.config)?;
        for list in lists {
            acc.add(list);
        }
        Ok(acc.finish())
    }

    fn retrieve_sequential(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<RankedList>> {
        self.members
            .iter()
            .enumerate()
            .map(|(index, member)| {
                check(cancel)?;
                invoke(index, member, query)
            })
            .collect()
    }

    fn retrieve_parallel(
        &self,
        query: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<RankedList>> {
        // Indexed collect keeps configured order regardless of completion order.
        let outcomes: Vec<Result<RankedList>> = self
            .members
            .par_iter()
            .enumerate()
            .map(|(index, member)| {
                check(cancel)?;
                invoke(index, member, query)
            })
            .collect();

        // Lowest configured index wins when several retrievers fail.
        outcomes.into_iter().collect()
    }
}

impl Retriever for EnsembleRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self.fuse(query)?)
    }
}

fn check(cancel: Option<&CancellationToken>) -> Result<()> {
    cancel.map_or(Ok(()), CancellationToken::check)
}

fn invoke(index: usize, member: &Member, query: &str) -> Result<RankedList> {
    let name = member.retriever.name();
    let start = Instant::now();
    let documents = member.retriever.retrieve(query).map_err(|source| {
        warn!(retriever = name, index, error = %source, "retriever failed");
        FusionError::RetrieverFailure {
            retriever: name.to_string(),
            index,
            source,
        }
    })?;
    debug!(
        retriever = name,
        index,
        count = documents.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "retriever returned"
    );
    Ok(RankedList::new(name, member.weight, documents))
}

fn into_documents(fused: Vec<FusedDocument>) -> Vec<Document> {
    fused.into_iter().map(|f| f.document).collect()
}

/// Builder for [`EnsembleRetriever`].
pub struct EnsembleBuilder {
    name: String,
    members: Vec<(Arc<dyn Retriever>, Option<f64>)>,
    c: f64,
    dedup: DedupStrategy,
    policy: WeightPolicy,
    execution: Execution,
}

impl Default for EnsembleBuilder {
    fn default() -> Self {
        Self {
            name: "ensemble".to_string(),
            members: Vec::new(),
            c: DEFAULT_RRF_C,
            dedup: DedupStrategy::default(),
            policy: WeightPolicy::default(),
            execution: Execution::default(),
        }
    }
}

impl EnsembleBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a retriever with its weight.
    #[must_use]
    pub fn retriever(mut self, retriever: impl Retriever + 'static, weight: f64) -> Self {
        self.members.push((Arc::new(retriever), Some(weight)));
        self
    }

    /// Add a shared retriever without a weight; see [`weights`](Self::weights).
    #[must_use]
    pub fn shared(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.members.push((retriever, None));
        self
    }

    /// Assign weights by position to the retrievers added so far.
    ///
    /// Positions beyond `weights` lose any weight set earlier.
    #[must_use]
    pub fn weights(mut self, weights: &[f64]) -> Self {
        if weights.len() > self.members.len() {
            debug!(
                retrievers = self.members.len(),
                weights = weights.len(),
                "ignoring surplus fusion weights"
            );
        }
        for (i, (_, weight)) in self.members.iter_mut().enumerate() {
            *weight = weights.get(i).copied();
        }
        self
    }

    #[must_use]
    pub const fn c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    #[must_use]
    pub const fn dedup(mut self, dedup: DedupStrategy) -> Self {
        self.dedup = dedup;
        self
    }

    #[must_use]
    pub const fn weight_policy(mut self, policy: WeightPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn build(self) -> Result<EnsembleRetriever> {
        let config = RrfConfig {
            c: self.c,
            dedup: self.dedup,
        };
        config.validate()?;

        if let Some((retriever, weight)) = self
            .members
            .iter()
            .find_map(|(r, w)| w.filter(|w| !w.is_finite()).map(|w| (r, w)))
        {
            return Err(FusionError::InvalidWeight {
                retriever: retriever.name().to_string(),
                weight,
            });
        }

        let missing = self.members.iter().filter(|(_, w)| w.is_none()).count();
        if missing > 0 {
            match self.policy {
                WeightPolicy::Strict => {
                    return Err(FusionError::MisconfiguredWeights {
                        retrievers: self.members.len(),
                        weights: self.members.len() - missing,
                    });
                }
                WeightPolicy::Lenient => warn!(
                    retrievers = self.members.len(),
                    missing, "retrievers without weight default to 1.0"
                ),
            }
        }

        let members = self
            .members
            .into_iter()
            .map(|(retriever, weight)| (retriever, weight.unwrap_or(1.0)))
            .collect();

        Ok(EnsembleRetriever::from_parts(
            self.name,
            members,
            config,
            self.execution,
        ))
    }
}
