//! Request matching logic.
//!
//! Finds the first mock record whose method and URL pattern accept a call.

use crate::error::{HotMockError, Result};
use crate::mock::{HttpMethod, MockRecord};
use regex::Regex;

/// Result of matching a call against records.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// The matched record
    pub record: &'a MockRecord,
    /// Position of the record in the candidate list
    pub index: usize,
}

/// Request matcher over one loaded collection.
///
/// Patterns are compiled once, when the matcher is built. A pattern that
/// fails to compile is only reported when a call reaches its record.
#[derive(Debug)]
pub struct Matcher {
    records: Vec<MockRecord>,
    patterns: Vec<std::result::Result<Regex, regex::Error>>,
}

impl Matcher {
    pub fn new(records: Vec<MockRecord>) -> Self {
        let patterns = records
            .iter()
            .map(|record| Regex::new(&record.url_pattern))
            .collect();
        Self { records, patterns }
    }

    pub fn records(&self) -> &[MockRecord] {
        &self.records
    }

    /// Find the first record accepting `method` and `url`.
    ///
    /// Records are tried in order; the first match wins. A record without a
    /// method accepts every method. Patterns match anywhere in the URL unless
    /// they anchor themselves.
    pub fn find(&self, method: HttpMethod, url: &str) -> Result<Option<MatchResult<'_>>> {
        for (index, (record, pattern)) in self.records.iter().zip(&self.patterns).enumerate() {
            if !matches_method(record, method) {
                continue;
            }

            let regex = pattern.as_ref().map_err(|source| HotMockError::InvalidPattern {
                pattern: record.url_pattern.clone(),
                source: source.clone(),
            })?;
            if regex.is_match(url) {
                return Ok(Some(MatchResult { record, index }));
            }
        }

        Ok(None)
    }
}

fn matches_method(record: &MockRecord, method: HttpMethod) -> bool {
    record.method.map(|m| m == method).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(method: Option<HttpMethod>, pattern: &str, status: u16) -> MockRecord {
        MockRecord {
            method,
            ..MockRecord::new(HttpMethod::Get, pattern).with_status(status)
        }
    }

    #[test]
    fn test_partial_url_matching() {
        let matcher = Matcher::new(vec![record(Some(HttpMethod::Get), "widgets/1", 418)]);

        let result = matcher.find(HttpMethod::Get, "https://api.test/widgets/1?x=y").unwrap();
        assert_eq!(result.unwrap().record.status, 418);

        let result = matcher.find(HttpMethod::Get, "https://api.test/widgets/2").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_anchored_pattern() {
        let matcher = Matcher::new(vec![record(
            Some(HttpMethod::Get),
            "^https://api\\.test/widgets$",
            200,
        )]);

        assert!(matcher
            .find(HttpMethod::Get, "https://api.test/widgets")
            .unwrap()
            .is_some());
        assert!(matcher
            .find(HttpMethod::Get, "https://api.test/widgets/1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_escaped_literal_url() {
        let url = "https://api.test/dogs?breed=pug&size=(small)";
        let matcher = Matcher::new(vec![record(
            Some(HttpMethod::Get),
            &format!("^{}$", regex::escape(url)),
            200,
        )]);

        assert!(matcher.find(HttpMethod::Get, url).unwrap().is_some());
        assert!(matcher
            .find(HttpMethod::Get, "https://api.test/dogsXbreed=pug&size=(small)")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_method_matching() {
        let matcher = Matcher::new(vec![record(Some(HttpMethod::Get), "widgets", 200)]);

        assert!(matcher.find(HttpMethod::Get, "/widgets").unwrap().is_some());
        assert!(matcher.find(HttpMethod::Post, "/widgets").unwrap().is_none());
    }

    #[test]
    fn test_missing_method_matches_any() {
        let matcher = Matcher::new(vec![record(None, "widgets", 200)]);

        assert!(matcher.find(HttpMethod::Delete, "/widgets").unwrap().is_some());
        assert!(matcher.find(HttpMethod::Put, "/widgets").unwrap().is_some());
    }

    #[test]
    fn test_first_match_wins() {
        let matcher = Matcher::new(vec![
            record(Some(HttpMethod::Post), "widgets", 201),
            record(Some(HttpMethod::Get), "widgets", 202),
            record(Some(HttpMethod::Get), "widgets/1", 203),
        ]);

        let result = matcher.find(HttpMethod::Get, "/widgets/1").unwrap().unwrap();
        assert_eq!(result.record.status, 202);
        assert_eq!(result.index, 1);
        assert_eq!(matcher.records().len(), 3);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let matcher = Matcher::new(vec![record(Some(HttpMethod::Get), "widgets/(", 200)]);

        let result = matcher.find(HttpMethod::Get, "/widgets/1");
        assert!(matches!(result, Err(HotMockError::InvalidPattern { .. })));

        // Reported again on every call that reaches it.
        let result = matcher.find(HttpMethod::Get, "/widgets/2");
        assert!(matches!(result, Err(HotMockError::InvalidPattern { .. })));
    }

    #[test]
    fn test_invalid_pattern_behind_method_filter_is_skipped() {
        let matcher = Matcher::new(vec![
            record(Some(HttpMethod::Post), "widgets/(", 200),
            record(Some(HttpMethod::Get), "widgets", 204),
        ]);

        let result = matcher.find(HttpMethod::Get, "/widgets").unwrap();
        assert_eq!(result.unwrap().record.status, 204);
    }
}
