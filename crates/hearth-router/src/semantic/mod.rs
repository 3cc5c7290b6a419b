//! Semantic index: per-intent confidence from a similarity service, with a bounded cache.
//!
//! Health is probed once at construction. An unhealthy index answers zero for every intent
//! and never probes again. A batch of N intents costs at most one similarity search: the
//! top-K hits are bucketed by their `[Intent: ..]` tag.

mod http;
mod local;
mod service;

pub use http::HttpSimilarityService;
pub use local::LocalSimilarityService;
pub use service::{parse_intent_tag, strip_intent_tag, tag_with_intent, SimilarityHit, SimilarityService};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::BoundedCache;
use crate::config::SemanticConfig;
use crate::error::{SimilarityError, SimilarityResult};

pub struct SemanticIndex {
    service: Arc<dyn SimilarityService>,
    healthy: AtomicBool,
    cache: Mutex<BoundedCache<String, f64>>,
    search_limit: usize,
}

fn cache_key(query: &str, intent: &str) -> String {
    format!("{}::{}", query, intent)
}

impl SemanticIndex {
    /// Build the index and run the one-time health probe (bounded by the probe timeout).
    pub async fn connect(service: Arc<dyn SimilarityService>, config: &SemanticConfig) -> Self {
        let probe = tokio::time::timeout(config.health_probe_timeout(), service.is_healthy()).await;
        let healthy = match probe {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                warn!(target: "hearth::semantic", backend = service.name(), "similarity service reported unhealthy");
                false
            }
            Ok(Err(e)) => {
                warn!(target: "hearth::semantic", backend = service.name(), error = %e, "health probe failed");
                false
            }
            Err(_) => {
                warn!(
                    target: "hearth::semantic",
                    backend = service.name(),
                    timeout_ms = config.health_probe_timeout_ms,
                    "health probe timed out"
                );
                false
            }
        };
        info!(target: "hearth::semantic", backend = service.name(), healthy, "semantic index ready");
        Self::with_health(service, config, healthy)
    }

    /// Build without probing. Used when health is already known.
    pub fn with_health(service: Arc<dyn SimilarityService>, config: &SemanticConfig, healthy: bool) -> Self {
        Self {
            service,
            healthy: AtomicBool::new(healthy),
            cache: Mutex::new(BoundedCache::new(
                config.cache_max_entries,
                config.cache_ttl(),
                config.eviction_fraction,
            )),
            search_limit: config.search_limit.max(1),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Embed the example phrases for an intent. Returns how many were stored.
    pub async fn register_intent(&self, intent: &str, phrases: &[&str]) -> SimilarityResult<usize> {
        if !self.is_healthy() {
            return Err(SimilarityError::Unavailable);
        }
        let mut stored = 0;
        for phrase in phrases.iter().filter(|p| !p.trim().is_empty()) {
            self.service.store(&tag_with_intent(phrase, intent)).await?;
            stored += 1;
        }
        debug!(target: "hearth::semantic", intent, stored, "intent examples stored");
        Ok(stored)
    }

    pub async fn indexed_count(&self) -> SimilarityResult<usize> {
        if !self.is_healthy() {
            return Err(SimilarityError::Unavailable);
        }
        self.service.count().await
    }

    pub async fn confidence(&self, query: &str, intent: &str) -> f64 {
        let intents = [intent.to_string()];
        self.batch_confidence(query, &intents)
            .await
            .get(intent)
            .copied()
            .unwrap_or(0.0)
    }

    /// Score every intent against `query` with at most one similarity search.
    pub async fn batch_confidence(&self, query: &str, intents: &[String]) -> HashMap<String, f64> {
        let mut scores: HashMap<String, f64> = HashMap::with_capacity(intents.len());
        if !self.is_healthy() {
            for intent in intents {
                scores.insert(intent.clone(), 0.0);
            }
            return scores;
        }

        let mut missing: Vec<&String> = Vec::new();
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            for intent in intents {
                match cache.get(&cache_key(query, intent)) {
                    Some(v) => {
                        scores.insert(intent.clone(), v);
                    }
                    None => missing.push(intent),
                }
            }
        }
        if missing.is_empty() {
            debug!(target: "hearth::semantic", intents = intents.len(), "batch served from cache");
            return scores;
        }

        let fresh: HashMap<&str, f64> = match self.service.search(query, self.search_limit).await {
            Ok(hits) => best_per_intent(&hits, &missing),
            Err(e) => {
                warn!(target: "hearth::semantic", error = %e, intents = missing.len(), "similarity search failed, scoring zero");
                HashMap::new()
            }
        };

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        for intent in missing {
            let v = fresh.get(intent.as_str()).copied().unwrap_or(0.0);
            cache.insert(cache_key(query, intent), v);
            scores.insert(intent.clone(), v);
        }
        scores
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Highest similarity per requested intent among tagged hits.
fn best_per_intent<'a>(hits: &[SimilarityHit], wanted: &[&'a String]) -> HashMap<&'a str, f64> {
    let mut best: HashMap<&'a str, f64> = HashMap::new();
    for hit in hits {
        let Some(tag) = parse_intent_tag(&hit.content) else {
            continue;
        };
        if let Some(&intent) = wanted.iter().find(|w| w.as_str() == tag) {
            let sim = if hit.similarity.is_finite() {
                hit.similarity.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let slot = best.entry(intent.as_str()).or_insert(0.0);
            if sim > *slot {
                *slot = sim;
            }
        }
    }
    best
}
