//! Retrieved documents and their identity keys

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key conventionally holding the origin file or URL.
pub const SOURCE_KEY: &str = "source";

/// A retrieved document: text payload plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text payload
    pub content: String,
    /// Arbitrary metadata (e.g. `source`)
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_source(self, source: impl Into<String>) -> Self {
        self.with_metadata(SOURCE_KEY, source.into())
    }

    /// The `source` metadata entry, when it is a string.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }
}

/// How two documents from different retrievers are judged to be the same result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Byte-identical content; metadata ignored.
    #[default]
    Content,
    /// Content plus metadata, so identical text from distinct sources stays separate.
    ContentAndMetadata,
}

impl DedupStrategy {
    /// Compute the identity key for a document.
    #[must_use]
    pub fn key(self, doc: &Document) -> DocumentKey {
        match self {
            Self::Content => DocumentKey::Content(doc.content.clone()),
            // BTreeMap serializes in key order, so equal maps give equal strings.
            Self::ContentAndMetadata => DocumentKey::ContentAndMetadata(
                doc.content.clone(),
                serde_json::to_string(&doc.metadata).unwrap_or_default(),
            ),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::ContentAndMetadata => "content_and_metadata",
        }
    }
}

impl std::str::FromStr for DedupStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "content_and_metadata" | "content-and-metadata" | "content+metadata" => {
                Ok(Self::ContentAndMetadata)
            }
            other => Err(format!("unknown dedup strategy: {other}")),
        }
    }
}

/// Identity key used during accumulation. Not a storage identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Content(String),
    ContentAndMetadata(String, String),
}
