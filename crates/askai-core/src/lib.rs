//! Backend-agnostic types and traits for `askai`, plus the pure snippet matcher.
//!
//! Nothing in this crate performs IO. Paragraph retrieval and AI completion are
//! expressed as traits ([`ParagraphSource`], [`AiBackend`]) and implemented in
//! `askai-local`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod citations;
pub mod context;
pub mod finder;
pub mod matcher;
pub mod normalize;
pub mod parnum;
pub mod reference;

pub use finder::{find_snippet, FindOutcome, FindParagraphLimits, MatchPart, SnippetFinder};
pub use reference::{FragmentStyle, SourceReference};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid paragraph range: {0}")]
    InvalidRange(String),
    #[error("invalid page name: {0}")]
    InvalidPage(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Supplies the ordered plain-text paragraphs of a page.
///
/// Implementations return `Ok(vec![])` when the page does not exist or cannot be
/// rendered, and `Err(..)` only for retrieval failures (network, storage). Callers
/// rely on that split: an empty page degrades to "no match", a failure does not.
#[async_trait::async_trait]
pub trait ParagraphSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn paragraphs(&self, page: &str) -> Result<Vec<String>>;
}

/// A text-completion service.
#[async_trait::async_trait]
pub trait AiBackend: Send + Sync {
    /// Short service name, e.g. "openai".
    fn name(&self) -> &'static str;
    /// Send `prompt` with `instructions` as the system/context text.
    async fn query(&self, prompt: &str, instructions: &str) -> Result<String>;
}

/// Batch request: page name -> snippet to look for on that page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindParagraphsRequest {
    pub pages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindParagraphsResponse {
    /// References like `"Page name#p1-3,7"`.
    pub found: Vec<String>,
    /// Plain page names where nothing usable matched.
    pub notfound: Vec<String>,
    /// Warning codes raised while matching, keyed by page name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub warnings: BTreeMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_paragraphs_request_is_a_plain_json_object() {
        let req: FindParagraphsRequest =
            serde_json::from_str(r#"{"Page one":"some text","Page two":"more"}"#).unwrap();
        assert_eq!(req.pages.len(), 2);
        assert_eq!(req.pages["Page one"], "some text");
    }

    #[test]
    fn find_paragraphs_response_omits_empty_warnings() {
        let resp = FindParagraphsResponse {
            found: vec!["A#p1".to_string()],
            notfound: vec!["B".to_string()],
            warnings: BTreeMap::new(),
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["found"][0], "A#p1");
        assert_eq!(v["notfound"][0], "B");
        assert!(v.get("warnings").is_none());
    }
}
