//! In-process similarity backend: bag-of-words cosine over stored texts.
//!
//! Used when no remote similarity service is configured, and in tests. Intent tags are
//! excluded from the vectors so only the example phrase contributes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::service::{strip_intent_tag, SimilarityHit, SimilarityService};
use crate::error::SimilarityResult;

struct StoredText {
    content: String,
    terms: HashMap<String, f64>,
    norm: f64,
}

#[derive(Default)]
pub struct LocalSimilarityService {
    texts: RwLock<Vec<StoredText>>,
}

impl LocalSimilarityService {
    pub fn new() -> Self {
        Self::default()
    }
}

fn term_vector(text: &str) -> (HashMap<String, f64>, f64) {
    let mut terms: HashMap<String, f64> = HashMap::new();
    for tok in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
    {
        *terms.entry(tok.to_string()).or_insert(0.0) += 1.0;
    }
    let norm = terms.values().map(|v| v * v).sum::<f64>().sqrt();
    (terms, norm)
}

fn cosine(a: &HashMap<String, f64>, a_norm: f64, b: &HashMap<String, f64>, b_norm: f64) -> f64 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(t, w)| b.get(t).map(|v| w * v))
        .sum();
    (dot / (a_norm * b_norm)).clamp(0.0, 1.0)
}

#[async_trait]
impl SimilarityService for LocalSimilarityService {
    async fn is_healthy(&self) -> SimilarityResult<bool> {
        Ok(true)
    }

    async fn store(&self, text: &str) -> SimilarityResult<()> {
        let (terms, norm) = term_vector(strip_intent_tag(text));
        let mut texts = self.texts.write().unwrap_or_else(|e| e.into_inner());
        texts.push(StoredText {
            content: text.to_string(),
            terms,
            norm,
        });
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> SimilarityResult<Vec<SimilarityHit>> {
        let (q_terms, q_norm) = term_vector(query);
        let texts = self.texts.read().unwrap_or_else(|e| e.into_inner());
        let mut hits: Vec<SimilarityHit> = texts
            .iter()
            .map(|t| SimilarityHit {
                content: t.content.clone(),
                similarity: cosine(&q_terms, q_norm, &t.terms, t.norm),
            })
            .filter(|h| h.similarity > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> SimilarityResult<usize> {
        Ok(self.texts.read().unwrap_or_else(|e| e.into_inner()).len())
    }

    fn name(&self) -> &str {
        "local-bag-of-words"
    }
}
