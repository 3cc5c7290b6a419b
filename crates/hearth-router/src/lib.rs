//! hearth-router: confidence-based routing and cross-app aggregation for the Hearth dashboard chat.
//!
//! Data flows one way: preprocessor, then scorer (consulting the semantic index and the
//! adapter registry), then router, which calls the aggregator only on the aggregation path.

mod cache;
mod config;
mod error;
mod preprocess;

pub mod aggregate;
pub mod registry;
pub mod router;
pub mod scoring;
pub mod semantic;

pub use cache::{BoundedCache, CacheEntry};
pub use crate::config::{RegistryConfig, RouterConfig, RoutingConfig, ScoreWeights, ScoringConfig, SemanticConfig};
pub use error::{AdapterError, ConfigError, SimilarityError, SimilarityResult};
pub use preprocess::{Correction, Expansion, PreprocessedQuery, QueryPreprocessor, MAX_EXPANSIONS};

// Core types for adapters and the chat pipeline
pub use aggregate::{AggregationResult, AggregationStrategy, CrossAppAggregator, CrossAppConcept};
pub use registry::{
    AdapterCapabilities, AdapterHandle, AdapterRegistry, AggregateType, AggregateableData, AppAdapter,
    AppContextData, AppSnapshot, ChangeNotifier, ChangeNotify, ListenerId, Subscription,
};
pub use router::{RouteMode, RouteOutcome, Router};
pub use scoring::{ConfidenceLevel, ConfidenceScore, ConfidenceScorer, ScoreBreakdown, ScoreMetadata};
pub use semantic::{HttpSimilarityService, LocalSimilarityService, SemanticIndex, SimilarityHit, SimilarityService};

use std::sync::Arc;

/// Wire the full pipeline from a config and a similarity backend. Runs the semantic health
/// probe once.
pub async fn build_router(
    config: &RouterConfig,
    similarity: Arc<dyn SimilarityService>,
    registry: AdapterRegistry,
) -> (Router, Arc<SemanticIndex>) {
    let semantic = Arc::new(SemanticIndex::connect(similarity, &config.semantic).await);
    let scorer = ConfidenceScorer::new(QueryPreprocessor::new(), Arc::clone(&semantic), registry.clone(), config);
    let router = Router::new(registry, scorer, CrossAppAggregator::new(), config.routing.clone());
    (router, semantic)
}
