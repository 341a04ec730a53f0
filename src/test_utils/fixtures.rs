//! Retriever and settings fixtures.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use crate::search::document::Document;
use crate::search::retriever::Retriever;

/// Documents with the given contents, in order.
#[must_use]
pub fn docs(contents: &[&str]) -> Vec<Document> {
    contents.iter().map(|c| Document::new(*c)).collect()
}

/// Contents of `docs`, in order.
#[must_use]
pub fn contents(docs: &[Document]) -> Vec<String> {
    docs.iter().map(|d| d.content.clone()).collect()
}

/// Retriever that always fails with `message`.
#[derive(Debug, Clone)]
pub struct FailingRetriever {
    name: String,
    message: String,
}

impl FailingRetriever {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Retriever returning fixed documents and recording every query it sees.
#[derive(Debug, Clone)]
pub struct RecordingRetriever {
    name: String,
    docs: Vec<Document>,
    calls: Arc<AtomicUsize>,
    queries: Arc<std::sync::Mutex<Vec<String>>>,
}

impl RecordingRetriever {
    pub fn new(name: impl Into<String>, docs: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            docs,
            calls: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl Retriever for RecordingRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        Ok(self.docs.clone())
    }
}

/// Temporary directory for settings files.
pub struct SettingsFixture {
    pub temp_dir: TempDir,
}

impl SettingsFixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Write `content` to `name` inside the fixture and return its path.
    #[must_use]
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write settings file");
        path
    }
}

impl Default for SettingsFixture {
    fn default() -> Self {
        Self::new()
    }
}
