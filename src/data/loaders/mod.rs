//! Corpus loading
//!
//! Reads the crawler's JSON array of news objects. A missing or malformed file
//! is a degenerate-but-valid state: callers get an empty corpus and a warning.

use crate::data::{CorpusRecord, NewsArticle};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Outcome of a lenient corpus load
#[derive(Debug, Default)]
pub struct CorpusLoad {
    /// Non-empty records in file order
    pub records: Vec<CorpusRecord>,
    /// Why the corpus is empty, when loading failed
    pub warning: Option<Error>,
}

impl CorpusLoad {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Load corpus records strictly, surfacing the reason on failure
pub fn load(path: &Path) -> Result<Vec<CorpusRecord>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Corpus(format!("failed to read {}: {}", path.display(), e)))?;

    let articles: Vec<NewsArticle> = serde_json::from_str(&raw)
        .map_err(|e| Error::Corpus(format!("malformed corpus {}: {}", path.display(), e)))?;

    let total = articles.len();
    let records: Vec<CorpusRecord> = articles
        .into_iter()
        .filter_map(NewsArticle::into_record)
        .collect();

    tracing::debug!(
        "Loaded {} records from {:?} ({} empty entries dropped)",
        records.len(),
        path,
        total - records.len()
    );

    Ok(records)
}

/// Load corpus records, degrading to an empty corpus on any failure
pub fn load_or_empty(path: &Path) -> CorpusLoad {
    match load(path) {
        Ok(records) => {
            tracing::info!("Corpus loaded: {} records from {:?}", records.len(), path);
            CorpusLoad {
                records,
                warning: None,
            }
        }
        Err(e) => {
            tracing::warn!("{}; continuing with an empty corpus", e);
            CorpusLoad {
                records: Vec::new(),
                warning: Some(e),
            }
        }
    }
}

/// Size statistics for a loaded corpus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total_records: usize,
    /// Position of the longest record
    pub longest_index: Option<usize>,
    /// Length of the longest record in characters
    pub max_chars: usize,
    /// Rough token estimate for the longest record (~4 characters per token)
    pub approx_max_tokens: usize,
}

/// Compute corpus statistics
pub fn stats(records: &[CorpusRecord]) -> CorpusStats {
    let mut longest_index = None;
    let mut max_chars = 0;

    for (idx, record) in records.iter().enumerate() {
        let chars = record.text.chars().count();
        if chars > max_chars {
            max_chars = chars;
            longest_index = Some(idx);
        }
    }

    CorpusStats {
        total_records: records.len(),
        longest_index,
        max_chars,
        approx_max_tokens: max_chars / 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_corpus(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn test_load_drops_empty_entries() {
        let file = write_corpus(
            r#"[
                {"NEWS_ID": "1", "TITLE": "a", "DETAIL": "삼성전자 반도체 호황"},
                {"NEWS_ID": "2", "TITLE": "b", "DETAIL": ""},
                {"NEWS_ID": "3", "TITLE": "c", "DETAIL": null},
                {"NEWS_ID": "4", "TITLE": "d"},
                {"NEWS_ID": "5", "DETAIL": "연준 금리 인상"}
            ]"#,
        );

        let records = load(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "삼성전자 반도체 호황");
        assert_eq!(records[0].title.as_deref(), Some("a"));
        assert_eq!(records[1].text, "연준 금리 인상");
    }

    #[test]
    fn test_load_tolerates_auxiliary_field_types() {
        let file = write_corpus(
            r#"[
                {"NEWS_ID": "1", "DETAIL": "삼성전자, 반도체 수요 급증"},
                {"NEWS_ID": 2, "DATE": 20240105, "PROVIDER_LINK_PAGE": null, "DETAIL": "유가 급등"},
                {"NEWS_ID": [3], "TITLE": {"ko": "제목"}, "DETAIL": "금리 동결"}
            ]"#,
        );

        let records = load(file.path()).unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["삼성전자, 반도체 수요 급증", "유가 급등", "금리 동결"]);
        assert_eq!(records[2].title, None);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load_or_empty(&dir.path().join("missing.json"));

        assert!(outcome.records.is_empty());
        assert!(outcome.is_degraded());
        assert!(matches!(outcome.warning, Some(Error::Corpus(_))));
    }

    #[test]
    fn test_malformed_file_degrades_to_empty() {
        let file = write_corpus("{ not json");
        let outcome = load_or_empty(file.path());

        assert!(outcome.records.is_empty());
        assert!(outcome.is_degraded());
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn test_stats() {
        let records = vec![
            CorpusRecord::new("짧은 글"),
            CorpusRecord::new("조금 더 긴 뉴스 본문입니다"),
        ];

        let stats = stats(&records);
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.longest_index, Some(1));
        assert_eq!(stats.max_chars, "조금 더 긴 뉴스 본문입니다".chars().count());
        assert_eq!(stats.approx_max_tokens, stats.max_chars / 4);

        let empty = super::stats(&[]);
        assert_eq!(empty.longest_index, None);
        assert_eq!(empty.max_chars, 0);
    }
}
