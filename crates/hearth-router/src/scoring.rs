//! Confidence scorer: blends semantic, keyword and context signals into one score per adapter.
//!
//! One pass issues the batched semantic lookup and every adapter's keyword scoring
//! concurrently, then sorts once everything has resolved. Whole result sets are cached by
//! normalized query. Uncached passes run on a spawned task, so an abandoned caller still
//! leaves a populated cache behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::BoundedCache;
use crate::config::{RouterConfig, ScoreWeights, ScoringConfig};
use crate::preprocess::{PreprocessedQuery, QueryPreprocessor};
use crate::registry::{AdapterHandle, AdapterRegistry, AppContextData};
use crate::semantic::SemanticIndex;

/// Scorer-scale thresholds. The chat router applies its own looser pair
/// (`RoutingConfig::high` / `medium`); the two scales are intentionally independent.
pub mod thresholds {
    pub const HIGH: f64 = 0.85;
    pub const MEDIUM: f64 = 0.65;
    pub const LOW: f64 = 0.45;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    BelowThreshold,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= thresholds::HIGH {
            Self::High
        } else if score >= thresholds::MEDIUM {
            Self::Medium
        } else if score >= thresholds::LOW {
            Self::Low
        } else {
            Self::BelowThreshold
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub semantic: f64,
    pub keyword: f64,
    pub context: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreMetadata {
    pub is_active: bool,
    pub last_used: i64,
    pub cache_hit: bool,
}

/// One adapter's score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceScore {
    pub app_name: String,
    pub display_name: String,
    /// Raw blend; may exceed 1.0 with non-normalized weights. Use `clamped_total` for display.
    pub total_score: f64,
    pub breakdown: ScoreBreakdown,
    pub weights: ScoreWeights,
    pub level: ConfidenceLevel,
    pub metadata: ScoreMetadata,
}

impl ConfidenceScore {
    pub fn clamped_total(&self) -> f64 {
        clamp01(self.total_score)
    }
}

#[derive(Clone)]
struct CachedBatch {
    generation: u64,
    adapters: Vec<String>,
    scores: Vec<ConfidenceScore>,
}

struct ScorerInner {
    preprocessor: QueryPreprocessor,
    semantic: Arc<SemanticIndex>,
    registry: AdapterRegistry,
    weights: ScoreWeights,
    config: ScoringConfig,
    cache: Mutex<BoundedCache<String, CachedBatch>>,
}

#[derive(Clone)]
pub struct ConfidenceScorer {
    inner: Arc<ScorerInner>,
}

impl ConfidenceScorer {
    pub fn new(
        preprocessor: QueryPreprocessor,
        semantic: Arc<SemanticIndex>,
        registry: AdapterRegistry,
        config: &RouterConfig,
    ) -> Self {
        let cache = BoundedCache::new(
            config.scoring.batch_cache_max_entries,
            config.scoring.batch_cache_ttl(),
            config.semantic.eviction_fraction,
        );
        Self {
            inner: Arc::new(ScorerInner {
                preprocessor,
                semantic,
                registry,
                weights: config.weights,
                config: config.scoring.clone(),
                cache: Mutex::new(cache),
            }),
        }
    }

    pub fn preprocessor(&self) -> &QueryPreprocessor {
        &self.inner.preprocessor
    }

    /// Score `adapters` against a raw query, sorted by total descending.
    pub async fn score(&self, query: &str, adapters: &[AdapterHandle]) -> Vec<ConfidenceScore> {
        let pre = self.inner.preprocessor.preprocess(query);
        self.score_preprocessed(&pre, adapters).await
    }

    /// Score every registered adapter.
    pub async fn score_registered(&self, query: &str) -> Vec<ConfidenceScore> {
        let adapters = self.inner.registry.handles();
        self.score(query, &adapters).await
    }

    pub async fn score_preprocessed(
        &self,
        pre: &PreprocessedQuery,
        adapters: &[AdapterHandle],
    ) -> Vec<ConfidenceScore> {
        let key = pre.normalized.clone();
        let generation = self.inner.registry.generation();
        let names: Vec<String> = adapters.iter().map(|h| h.name().to_string()).collect();

        if let Some(hit) = self.cached(&key, generation, &names) {
            return hit;
        }

        let inner = Arc::clone(&self.inner);
        let owned: Vec<AdapterHandle> = adapters.to_vec();
        let task = tokio::spawn(async move {
            let scores = inner.compute(&key, &owned).await;
            inner
                .cache
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(
                    key,
                    CachedBatch {
                        generation,
                        adapters: names,
                        scores: scores.clone(),
                    },
                );
            scores
        });

        match task.await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(target: "hearth::scoring", error = %e, "scoring task failed");
                Vec::new()
            }
        }
    }

    fn cached(&self, key: &String, generation: u64, names: &[String]) -> Option<Vec<ConfidenceScore>> {
        let cache = self.inner.cache.lock().unwrap_or_else(|e| e.into_inner());
        let batch = cache.get(key)?;
        if batch.generation != generation || batch.adapters != names {
            return None;
        }
        debug!(target: "hearth::scoring", query = %key, "score cache hit");
        Some(
            batch
                .scores
                .into_iter()
                .map(|mut s| {
                    s.metadata.cache_hit = true;
                    s
                })
                .collect(),
        )
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear_cache(&self) {
        self.inner.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl ScorerInner {
    async fn compute(&self, query: &str, adapters: &[AdapterHandle]) -> Vec<ConfidenceScore> {
        let intents: Vec<String> = adapters.iter().map(|h| h.name().to_string()).collect();
        let (semantic, keywords) = tokio::join!(
            self.semantic.batch_confidence(query, &intents),
            join_all(adapters.iter().map(|h| self.keyword_score(h, query))),
        );

        let now_ms = Utc::now().timestamp_millis();
        let mut scores: Vec<ConfidenceScore> = adapters
            .iter()
            .zip(keywords)
            .map(|(h, keyword)| self.assemble(h, &semantic, keyword, now_ms))
            .collect();

        // Stable: ties keep registration order.
        scores.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scores
    }

    fn assemble(
        &self,
        handle: &AdapterHandle,
        semantic: &HashMap<String, f64>,
        keyword: f64,
        now_ms: i64,
    ) -> ConfidenceScore {
        let name = handle.name();
        let sem = clamp01(semantic.get(name).copied().unwrap_or(0.0));
        let ctx_data = self.context_for(handle);
        let ctx = ctx_data
            .as_ref()
            .map(|c| context_score(c, now_ms, &self.config))
            .unwrap_or(0.0);
        let total = blend(sem, keyword, ctx, &self.weights, &self.config);

        debug!(
            target: "hearth::scoring",
            app = %name,
            semantic = sem,
            keyword,
            context = ctx,
            total,
            "adapter scored"
        );

        ConfidenceScore {
            app_name: name.to_string(),
            display_name: handle.display_name().to_string(),
            total_score: total,
            breakdown: ScoreBreakdown {
                semantic: sem,
                keyword,
                context: ctx,
            },
            weights: self.weights,
            level: ConfidenceLevel::from_score(clamp01(total)),
            metadata: ScoreMetadata {
                is_active: ctx_data.as_ref().map(|c| c.is_active).unwrap_or(false),
                last_used: ctx_data.as_ref().map(|c| c.last_used).unwrap_or(0),
                cache_hit: false,
            },
        }
    }

    /// Registered adapters use the snapshot cache; ad-hoc ones are asked directly.
    fn context_for(&self, handle: &AdapterHandle) -> Option<AppContextData> {
        if self.registry.get(handle.name()).is_some() {
            return self.registry.app_data(handle.name()).map(|s| s.context);
        }
        handle.adapter.context_data().ok()
    }

    async fn keyword_score(&self, handle: &AdapterHandle, query: &str) -> f64 {
        if !handle.capabilities.confidence {
            return keyword_overlap(&handle.adapter.keywords(), query);
        }
        match handle.adapter.confidence(query).await {
            Ok(v) => clamp01(v),
            Err(e) => {
                warn!(target: "hearth::scoring", app = %handle.name(), error = %e, "adapter confidence failed");
                0.0
            }
        }
    }
}

fn clamp01(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Share of the adapter's keywords that occur in the normalized query.
pub fn keyword_overlap(keywords: &[String], normalized_query: &str) -> f64 {
    let usable: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if usable.is_empty() {
        return 0.0;
    }
    let hits = usable.iter().filter(|k| normalized_query.contains(k.as_str())).count();
    hits as f64 / usable.len() as f64
}

/// Active bonus plus recent-use bonus, capped at 1.0.
pub fn context_score(ctx: &AppContextData, now_ms: i64, config: &ScoringConfig) -> f64 {
    let mut score = 0.0;
    if ctx.is_active {
        score += config.active_bonus;
    }
    let window_ms = i64::try_from(config.recency_window().as_millis()).unwrap_or(i64::MAX);
    if ctx.last_used > 0 && now_ms.saturating_sub(ctx.last_used) <= window_ms {
        score += config.recency_bonus;
    }
    clamp01(score)
}

/// Weighted blend. At or below the semantic gate the semantic signal is dropped and the
/// keyword score counts in full; above it the keyword score is damped.
pub fn blend(semantic: f64, keyword: f64, context: f64, weights: &ScoreWeights, config: &ScoringConfig) -> f64 {
    let (sem, kw) = if semantic > config.semantic_gate {
        (semantic, keyword * config.keyword_damping)
    } else {
        (0.0, keyword)
    };
    weights.semantic * sem + weights.keyword * kw + weights.context * context
}
