//! Router configuration.
//!
//! Precedence: built-in defaults < TOML file (`HEARTH_CONFIG`, default `config/hearth.toml`)
//! < environment (`HEARTH__SECTION__FIELD`, e.g. `HEARTH__WEIGHTS__SEMANTIC=0.5`).
//!
//! | Section | Field | Default | Description |
//! |---------|-------|---------|-------------|
//! | weights | semantic / keyword / context | 0.6 / 0.3 / 0.1 | Blend weights for the confidence score. |
//! | scoring | semantic_gate | 0.3 | Semantic scores at or below this are treated as "no match". |
//! | scoring | batch_cache_ttl_secs | 30 | Whole-query score cache TTL. |
//! | semantic | cache_ttl_secs | 300 | Per-intent confidence cache TTL. |
//! | semantic | cache_max_entries | 1000 | Per-intent cache bound. |
//! | registry | snapshot_ttl_ms | 5000 | Adapter context snapshot TTL. |
//! | routing | high / medium | 0.8 / 0.5 | Chat routing thresholds. |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "config/hearth.toml";

/// Blend weights for semantic, keyword and context signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub semantic: f64,
    pub keyword: f64,
    pub context: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            keyword: 0.3,
            context: 0.1,
        }
    }
}

impl ScoreWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.semantic, self.keyword, self.context];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid(format!(
                "weights must be finite and non-negative: {:?}",
                self
            )));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::Invalid("weights sum to zero".to_string()));
        }
        Ok(())
    }
}

/// Confidence scorer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Semantic scores at or below this gate contribute nothing; keyword overlap takes over.
    pub semantic_gate: f64,
    /// Multiplier applied to the keyword score when the semantic signal is above the gate.
    pub keyword_damping: f64,
    pub active_bonus: f64,
    pub recency_bonus: f64,
    pub recency_window_secs: u64,
    pub batch_cache_ttl_secs: u64,
    pub batch_cache_max_entries: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            semantic_gate: 0.3,
            keyword_damping: 0.5,
            active_bonus: 0.5,
            recency_bonus: 0.5,
            recency_window_secs: 300,
            batch_cache_ttl_secs: 30,
            batch_cache_max_entries: 200,
        }
    }
}

impl ScoringConfig {
    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }

    pub fn batch_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.batch_cache_ttl_secs)
    }
}

/// Semantic index tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Share of entries dropped when the cache is full and nothing has expired.
    pub eviction_fraction: f64,
    /// Top-K hits requested from the similarity service per batch.
    pub search_limit: usize,
    pub health_probe_timeout_ms: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            cache_max_entries: 1000,
            eviction_fraction: 0.2,
            search_limit: 10,
            health_probe_timeout_ms: 3000,
        }
    }
}

impl SemanticConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub snapshot_ttl_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_ms: 5000,
        }
    }
}

impl RegistryConfig {
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_millis(self.snapshot_ttl_ms)
    }
}

/// Chat routing thresholds. Deliberately looser than the scorer's own
/// HIGH/MEDIUM/LOW scale (see `scoring::thresholds`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub high: f64,
    pub medium: f64,
    /// Separator between labeled sections of a merged multi-app answer.
    pub merge_separator: String,
    /// Upper bound on a single adapter `response` call.
    pub adapter_timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.5,
            merge_separator: "\n\n".to_string(),
            adapter_timeout_ms: 5_000,
        }
    }
}

impl RoutingConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }
}

/// Full router configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub weights: ScoreWeights,
    pub scoring: ScoringConfig,
    pub semantic: SemanticConfig,
    pub registry: RegistryConfig,
    pub routing: RoutingConfig,
}

impl RouterConfig {
    /// Load from `HEARTH_CONFIG` (or `config/hearth.toml` when present) and `HEARTH__*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HEARTH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(Path::new(&path))
    }

    /// Load from a specific file (skipped when missing) plus environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("HEARTH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: RouterConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: RouterConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.routing.medium) || !(0.0..=1.0).contains(&self.routing.high) {
            return Err(ConfigError::Invalid("routing thresholds must lie in [0, 1]".to_string()));
        }
        if self.routing.medium > self.routing.high {
            return Err(ConfigError::Invalid(format!(
                "routing.medium ({}) exceeds routing.high ({})",
                self.routing.medium, self.routing.high
            )));
        }
        if self.semantic.cache_max_entries == 0 || self.scoring.batch_cache_max_entries == 0 {
            return Err(ConfigError::Invalid("cache sizes must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.semantic.eviction_fraction) {
            return Err(ConfigError::Invalid("semantic.eviction_fraction must lie in [0, 1]".to_string()));
        }
        Ok(())
    }
}
