//! Retriever abstraction
//!
//! A retriever maps a query to an ordered list of documents, most relevant
//! first. Semantic (embedding) and lexical (BM25) backends live outside this
//! crate and plug in by implementing [`Retriever`].

use std::sync::Arc;

use super::document::Document;

/// A search backend producing a ranked document list for a query.
///
/// Implementations must not mutate shared caller state: the ensemble may
/// invoke several retrievers concurrently.
pub trait Retriever: Send + Sync {
    /// Human-readable name, used to identify the retriever in errors and logs.
    fn name(&self) -> &str {
        "retriever"
    }

    /// Return documents for `query`, rank 0 first.
    fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>>;
}

impl<R: Retriever + ?Sized> Retriever for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>> {
        (**self).retrieve(query)
    }
}

impl<R: Retriever + ?Sized> Retriever for Arc<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>> {
        (**self).retrieve(query)
    }
}

/// Retriever backed by a closure.
pub struct FnRetriever<F> {
    name: String,
    func: F,
}

impl<F> FnRetriever<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<Document>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Retriever for FnRetriever<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<Document>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>> {
        (self.func)(query)
    }
}

/// Retriever returning the same fixed ranking for every query.
#[derive(Debug, Clone)]
pub struct StaticRetriever {
    name: String,
    docs: Vec<Document>,
}

impl StaticRetriever {
    pub fn new(name: impl Into<String>, docs: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            docs,
        }
    }

    /// Build from bare content strings.
    pub fn from_contents<I, S>(name: impl Into<String>, contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, contents.into_iter().map(Document::new).collect())
    }
}

impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
        Ok(self.docs.clone())
    }
}
