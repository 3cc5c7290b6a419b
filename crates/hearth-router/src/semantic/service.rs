//! Contract for the external semantic similarity service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SimilarityResult;

const INTENT_TAG_OPEN: &str = "[Intent:";

/// One search hit: the stored text and its similarity to the query in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub content: String,
    pub similarity: f64,
}

/// Embedding-backed similarity search. The router never computes embeddings itself.
#[async_trait]
pub trait SimilarityService: Send + Sync {
    async fn is_healthy(&self) -> SimilarityResult<bool>;

    /// Store a text. Intent examples carry a trailing `[Intent: <name>]` tag.
    async fn store(&self, text: &str) -> SimilarityResult<()>;

    async fn search(&self, query: &str, limit: usize) -> SimilarityResult<Vec<SimilarityHit>>;

    async fn count(&self) -> SimilarityResult<usize>;

    /// Backend label for logs.
    fn name(&self) -> &str;
}

/// `"<phrase> [Intent: <name>]"`
pub fn tag_with_intent(phrase: &str, intent: &str) -> String {
    format!("{} {} {}]", phrase.trim(), INTENT_TAG_OPEN, intent)
}

/// Extract the intent name from a tagged text (last tag wins).
pub fn parse_intent_tag(content: &str) -> Option<&str> {
    let start = content.rfind(INTENT_TAG_OPEN)? + INTENT_TAG_OPEN.len();
    let rest = &content[start..];
    let end = rest.find(']')?;
    let name = rest[..end].trim();
    (!name.is_empty()).then_some(name)
}

/// Strip a trailing intent tag, leaving the example phrase.
pub fn strip_intent_tag(content: &str) -> &str {
    match content.rfind(INTENT_TAG_OPEN) {
        Some(idx) => content[..idx].trim_end(),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips() {
        let tagged = tag_with_intent("start a focus session ", "pomodoro");
        assert_eq!(tagged, "start a focus session [Intent: pomodoro]");
        assert_eq!(parse_intent_tag(&tagged), Some("pomodoro"));
        assert_eq!(strip_intent_tag(&tagged), "start a focus session");
    }

    #[test]
    fn untagged_content_has_no_intent() {
        assert_eq!(parse_intent_tag("just some text"), None);
        assert_eq!(parse_intent_tag("broken [Intent: ]"), None);
        assert_eq!(parse_intent_tag("unterminated [Intent: notes"), None);
        assert_eq!(strip_intent_tag("just some text"), "just some text");
    }
}
