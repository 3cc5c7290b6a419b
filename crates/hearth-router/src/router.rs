//! Chat routing entry point.
//!
//! `route_query` never fails: adapter errors, timeouts and semantic outages are absorbed and
//! the decision degrades towards [`RouteMode::None`], a plain model call with no app context.
//! Rules are tried in order: aggregate, merged, direct, context, none.

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::CrossAppAggregator;
use crate::config::RoutingConfig;
use crate::error::AdapterError;
use crate::registry::{AdapterHandle, AdapterRegistry};
use crate::scoring::{ConfidenceScore, ConfidenceScorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    /// One adapter answered.
    Direct,
    /// Several adapters answered; sections labeled by display name.
    Merged,
    /// Cross-app totals rendered by the aggregator.
    Aggregate,
    /// The model answers, with an adapter's summary spliced into the prompt.
    Context,
    /// Plain model call.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOutcome {
    pub mode: RouteMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_addendum: Option<String>,
    pub source_adapters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RouteOutcome {
    pub fn none() -> Self {
        Self {
            mode: RouteMode::None,
            text: None,
            context_addendum: None,
            source_adapters: Vec::new(),
            confidence: None,
        }
    }

    fn answered(mode: RouteMode, text: String, sources: Vec<String>, confidence: Option<f64>) -> Self {
        Self {
            mode,
            text: Some(text),
            context_addendum: None,
            source_adapters: sources,
            confidence,
        }
    }

    /// The prompt to send to the model: the user's prompt with any context addendum
    /// placed ahead of it. Unchanged outside context mode.
    pub fn augment_prompt(&self, user_prompt: &str) -> String {
        match (&self.mode, &self.context_addendum) {
            (RouteMode::Context, Some(addendum)) => format!("{}\n\n{}", addendum, user_prompt),
            _ => user_prompt.to_string(),
        }
    }
}

pub struct Router {
    registry: AdapterRegistry,
    scorer: ConfidenceScorer,
    aggregator: CrossAppAggregator,
    config: RoutingConfig,
}

impl Router {
    pub fn new(
        registry: AdapterRegistry,
        scorer: ConfidenceScorer,
        aggregator: CrossAppAggregator,
        config: RoutingConfig,
    ) -> Self {
        Self {
            registry,
            scorer,
            aggregator,
            config,
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    pub async fn route_query(&self, raw: &str) -> RouteOutcome {
        let pre = self.scorer.preprocessor().preprocess(raw);
        if pre.normalized.is_empty() {
            return RouteOutcome::none();
        }
        let handles = self.registry.handles();
        if handles.is_empty() {
            debug!(target: "hearth::router", "no adapters registered");
            return RouteOutcome::none();
        }

        if let Some(out) = self.try_aggregate(&pre.normalized, &handles) {
            return self.log_outcome(out);
        }

        let scores = self.scorer.score_preprocessed(&pre, &handles).await;
        let Some(top) = scores.first() else {
            return self.log_outcome(RouteOutcome::none());
        };
        let top_score = top.clamped_total();
        debug!(
            target: "hearth::router",
            top = %top.app_name,
            score = top_score,
            candidates = scores.len(),
            "scored adapters"
        );

        if let Some(out) = self.try_merge(raw, &pre.normalized, &scores).await {
            return self.log_outcome(out);
        }
        if top_score >= self.config.high {
            if let Some(out) = self.try_direct(raw, top).await {
                return self.log_outcome(out);
            }
        }
        if top_score >= self.config.medium {
            if let Some(out) = self.try_context(top) {
                return self.log_outcome(out);
            }
        }
        self.log_outcome(RouteOutcome::none())
    }

    fn log_outcome(&self, out: RouteOutcome) -> RouteOutcome {
        info!(
            target: "hearth::router",
            mode = ?out.mode,
            sources = ?out.source_adapters,
            confidence = ?out.confidence,
            "route decided"
        );
        out
    }

    fn try_aggregate(&self, query: &str, handles: &[AdapterHandle]) -> Option<RouteOutcome> {
        if !self.aggregator.should_aggregate(query, handles) {
            return None;
        }
        let snapshots: Vec<_> = self
            .aggregator
            .sources(query, handles)
            .iter()
            .filter_map(|h| self.registry.app_data(h.name()))
            .collect();
        if snapshots.is_empty() {
            return None;
        }
        let result = self.aggregator.aggregate(query, &snapshots);
        let sources = if result.source_adapters.is_empty() {
            snapshots.iter().map(|s| s.app_name.clone()).collect()
        } else {
            result.source_adapters
        };
        Some(RouteOutcome::answered(RouteMode::Aggregate, result.text, sources, None))
    }

    async fn try_merge(&self, raw: &str, normalized: &str, scores: &[ConfidenceScore]) -> Option<RouteOutcome> {
        let cross_app =
            self.aggregator.is_cross_app_query(normalized) || !self.aggregator.detect_concepts(normalized).is_empty();
        if !cross_app {
            return None;
        }
        let qualifying: Vec<(AdapterHandle, &ConfidenceScore)> = scores
            .iter()
            .filter(|s| s.clamped_total() >= self.config.medium)
            .filter_map(|s| self.registry.get(&s.app_name).map(|h| (h, s)))
            .collect();
        if qualifying.len() < 2 {
            return None;
        }

        // Context-only adapters count toward the gate but have nothing to say.
        let callable: Vec<&(AdapterHandle, &ConfidenceScore)> =
            qualifying.iter().filter(|(h, _)| h.capabilities.response).collect();
        let answers = join_all(callable.iter().map(|(h, _)| self.fetch_response(h, raw))).await;
        let answered: Vec<(&AdapterHandle, &ConfidenceScore, String)> = callable
            .into_iter()
            .zip(answers)
            .filter_map(|((h, s), text)| text.map(|t| (h, *s, t)))
            .collect();

        match answered.as_slice() {
            [] => None,
            [(h, s, text)] => Some(RouteOutcome::answered(
                RouteMode::Direct,
                text.clone(),
                vec![h.name().to_string()],
                Some(s.clamped_total()),
            )),
            many => {
                let text = many
                    .iter()
                    .map(|(h, _, t)| format!("{}: {}", h.display_name(), t))
                    .collect::<Vec<_>>()
                    .join(&self.config.merge_separator);
                let sources = many.iter().map(|(h, _, _)| h.name().to_string()).collect();
                let confidence = many.iter().map(|(_, s, _)| s.clamped_total()).fold(0.0, f64::max);
                Some(RouteOutcome::answered(RouteMode::Merged, text, sources, Some(confidence)))
            }
        }
    }

    async fn try_direct(&self, raw: &str, top: &ConfidenceScore) -> Option<RouteOutcome> {
        let handle = self.registry.get(&top.app_name)?;
        if !handle.capabilities.response {
            return None;
        }
        let text = self.fetch_response(&handle, raw).await?;
        Some(RouteOutcome::answered(
            RouteMode::Direct,
            text,
            vec![top.app_name.clone()],
            Some(top.clamped_total()),
        ))
    }

    fn try_context(&self, top: &ConfidenceScore) -> Option<RouteOutcome> {
        let snapshot = self.registry.app_data(&top.app_name)?;
        let summary = snapshot.context.summary.trim();
        if summary.is_empty() {
            return None;
        }
        Some(RouteOutcome {
            mode: RouteMode::Context,
            text: None,
            context_addendum: Some(format!("[Context from {}] {}", snapshot.display_name, summary)),
            source_adapters: vec![top.app_name.clone()],
            confidence: Some(top.clamped_total()),
        })
    }

    /// An adapter's non-empty answer, or `None` on error, timeout or an empty reply.
    async fn fetch_response(&self, handle: &AdapterHandle, raw: &str) -> Option<String> {
        let call = handle.adapter.response(raw.trim());
        let result = match tokio::time::timeout(self.config.adapter_timeout(), call).await {
            Ok(r) => r,
            Err(_) => Err(AdapterError::Timeout),
        };
        match result {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                debug!(target: "hearth::router", app = %handle.name(), "adapter returned no answer");
                None
            }
            Err(e) => {
                warn!(target: "hearth::router", app = %handle.name(), error = %e, "adapter response failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augment_only_in_context_mode() {
        let ctx = RouteOutcome {
            mode: RouteMode::Context,
            text: None,
            context_addendum: Some("[Context from Notes] 3 notes".into()),
            source_adapters: vec!["notes".into()],
            confidence: Some(0.6),
        };
        assert_eq!(ctx.augment_prompt("what did I write?"), "[Context from Notes] 3 notes\n\nwhat did I write?");
        assert_eq!(RouteOutcome::none().augment_prompt("hi"), "hi");
    }

    #[test]
    fn outcome_serializes_lowercase_mode() {
        let json = serde_json::to_value(RouteOutcome::none()).unwrap();
        assert_eq!(json["mode"], "none");
        assert!(json.get("text").is_none());
        assert_eq!(json["source_adapters"], serde_json::json!([]));
    }
}
