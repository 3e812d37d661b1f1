//! Corpus records
//!
//! Historical news items used as retrieval context. Records are identified by
//! their position in load order; nothing else about them is persisted as an ID.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod loaders;

// Re-exports for convenience
pub use loaders::*;

/// A single corpus entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    /// Text used for embedding, keyword indexing and prompt context
    pub text: String,
    /// Headline of the source article, if the corpus file carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CorpusRecord {
    /// Create a record from bare text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
        }
    }

    /// Attach a headline
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Raw news object as written by the crawler
///
/// Only `TITLE` and `DETAIL` are read. Other crawler fields (`NEWS_ID`,
/// `DATE`, links) are ignored whatever their type, and a non-string title or
/// body counts as missing instead of failing the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(rename = "TITLE", default)]
    pub title: Option<Value>,
    #[serde(rename = "DETAIL", default)]
    pub detail: Option<Value>,
}

impl NewsArticle {
    /// Convert into a corpus record, dropping articles without body text
    pub fn into_record(self) -> Option<CorpusRecord> {
        let text = non_blank(self.detail)?;
        Some(CorpusRecord {
            text,
            title: non_blank(self.title),
        })
    }
}

fn non_blank(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}
