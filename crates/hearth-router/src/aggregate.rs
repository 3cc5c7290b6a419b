//! Cross-app aggregation: spots queries that span several mini-apps and sums the facts each
//! one reports into a single sentence ("You have 8 favorite photos: 5 in Photos and 3 in
//! Gallery.").

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::registry::{AdapterHandle, AggregateType, AggregateableData, AppSnapshot};

/// Phrases that mark a query as explicitly spanning every app.
pub const CROSS_APP_PHRASES: &[&str] = &[
    "all apps",
    "all my apps",
    "all of my apps",
    "across apps",
    "across all",
    "every app",
    "everywhere",
    "combined",
    "entire dashboard",
    "whole dashboard",
    "everything",
    "all my",
    "in total",
    "altogether",
];

pub type CustomRenderer = Arc<dyn Fn(&[AggregateableData]) -> String + Send + Sync>;

#[derive(Clone)]
pub enum AggregationStrategy {
    Sum,
    List,
    Custom(CustomRenderer),
}

impl fmt::Debug for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => f.write_str("Sum"),
            Self::List => f.write_str("List"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A named cluster of trigger keywords plus the filter it applies to reported facts.
#[derive(Debug, Clone)]
pub struct CrossAppConcept {
    pub name: String,
    pub keywords: Vec<String>,
    /// Fact types this concept counts; empty accepts any type.
    pub types: Vec<AggregateType>,
    /// Terms one of which must appear in a fact's label; empty accepts any label.
    pub label_terms: Vec<String>,
    /// Word placed before the noun when rendering ("favorite photos").
    pub qualifier: Option<String>,
    pub strategy: AggregationStrategy,
}

impl CrossAppConcept {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            types: Vec::new(),
            label_terms: Vec::new(),
            qualifier: None,
            strategy: AggregationStrategy::Sum,
        }
    }

    pub fn with_types(mut self, types: &[AggregateType]) -> Self {
        self.types = types.to_vec();
        self
    }

    pub fn with_label_terms(mut self, terms: &[&str]) -> Self {
        self.label_terms = terms.iter().map(|t| t.to_lowercase()).collect();
        self
    }

    pub fn with_qualifier(mut self, qualifier: &str) -> Self {
        self.qualifier = Some(qualifier.to_string());
        self
    }

    pub fn with_strategy(mut self, strategy: AggregationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn matches_query(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    pub fn accepts(&self, item: &AggregateableData) -> bool {
        if !self.types.is_empty() && !self.types.contains(&item.kind) {
            return false;
        }
        if self.label_terms.is_empty() {
            return true;
        }
        let label = item.label.to_lowercase();
        self.label_terms.iter().any(|t| label.contains(t.as_str()))
    }
}

pub fn default_concepts() -> Vec<CrossAppConcept> {
    vec![
        CrossAppConcept::new("favorites", &["favorite", "favourite", "starred", "liked"])
            .with_label_terms(&["favorite", "favourite", "starred", "liked"])
            .with_qualifier("favorite"),
        CrossAppConcept::new("images", &["photo", "picture", "image", "pic"]).with_types(&[AggregateType::Image]),
        CrossAppConcept::new("videos", &["video", "clip", "movie"]).with_types(&[AggregateType::Video]),
        CrossAppConcept::new("documents", &["note", "document", "doc"]).with_types(&[AggregateType::Document]),
        CrossAppConcept::new("audio", &["recording", "audio", "voice memo"]).with_types(&[AggregateType::Audio]),
        CrossAppConcept::new("scores", &["score", "points"]).with_types(&[AggregateType::Score]),
        CrossAppConcept::new("sessions", &["session", "streak"]).with_types(&[AggregateType::Count]),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub text: String,
    pub total: u64,
    pub concepts: Vec<String>,
    pub items: Vec<AggregateableData>,
    pub source_adapters: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CrossAppAggregator {
    concepts: Vec<CrossAppConcept>,
}

impl Default for CrossAppAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CrossAppAggregator {
    pub fn new() -> Self {
        Self::with_concepts(default_concepts())
    }

    pub fn with_concepts(concepts: Vec<CrossAppConcept>) -> Self {
        Self { concepts }
    }

    pub fn concepts(&self) -> &[CrossAppConcept] {
        &self.concepts
    }

    pub fn is_cross_app_query(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        CROSS_APP_PHRASES.iter().any(|p| lowered.contains(p))
    }

    pub fn detect_concepts(&self, query: &str) -> Vec<&CrossAppConcept> {
        let lowered = query.to_lowercase();
        self.concepts.iter().filter(|c| c.matches_query(&lowered)).collect()
    }

    /// Adapters that would contribute facts for this query. Explicit cross-app phrasing
    /// takes every aggregation-capable adapter; otherwise the adapter must also accept the
    /// query through `can_answer`.
    pub fn sources(&self, query: &str, handles: &[AdapterHandle]) -> Vec<AdapterHandle> {
        let explicit = self.is_cross_app_query(query);
        handles
            .iter()
            .filter(|h| h.capabilities.aggregation)
            .filter(|h| explicit || h.adapter.can_answer(query))
            .cloned()
            .collect()
    }

    pub fn should_aggregate(&self, query: &str, handles: &[AdapterHandle]) -> bool {
        if self.is_cross_app_query(query) {
            return !self.sources(query, handles).is_empty();
        }
        !self.detect_concepts(query).is_empty() && self.sources(query, handles).len() >= 2
    }

    /// Sum the facts in `snapshots` that pass every detected concept and render them.
    pub fn aggregate(&self, query: &str, snapshots: &[AppSnapshot]) -> AggregationResult {
        let concepts = self.detect_concepts(query);
        let displays: HashMap<&str, &str> = snapshots
            .iter()
            .map(|s| (s.app_name.as_str(), s.display_name.as_str()))
            .collect();

        let items: Vec<AggregateableData> = snapshots
            .iter()
            .flat_map(|s| s.aggregates.iter())
            .filter(|item| concepts.iter().all(|c| c.accepts(item)))
            .cloned()
            .collect();

        let total = items.iter().map(|i| i.count).sum();
        let mut sources: Vec<String> = Vec::new();
        for item in items.iter().filter(|i| i.count > 0) {
            if !sources.contains(&item.app_name) {
                sources.push(item.app_name.clone());
            }
        }

        let strategy = concepts
            .iter()
            .map(|c| &c.strategy)
            .find(|s| !matches!(s, AggregationStrategy::Sum))
            .cloned()
            .unwrap_or(AggregationStrategy::Sum);
        let qualifier = concepts.iter().find_map(|c| c.qualifier.as_deref());

        let text = match strategy {
            AggregationStrategy::Custom(render) => render(&items),
            AggregationStrategy::List => render_list(&items, &displays, qualifier, &concepts),
            AggregationStrategy::Sum => render_sum(&items, &displays, qualifier, &concepts),
        };

        debug!(
            target: "hearth::aggregate",
            concepts = ?concepts.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            items = items.len(),
            total,
            "aggregation rendered"
        );

        AggregationResult {
            text,
            total,
            concepts: concepts.iter().map(|c| c.name.clone()).collect(),
            items,
            source_adapters: sources,
        }
    }
}

/// "a", "a and b", "a, b and c".
pub fn join_natural(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn noun_phrase(count: u64, kind: AggregateType, qualifier: Option<&str>) -> String {
    let (singular, plural) = kind.nouns();
    let noun = if count == 1 { singular } else { plural };
    match qualifier {
        Some(q) => format!("{} {} {}", count, q, noun),
        None => format!("{} {}", count, noun),
    }
}

/// Noun used for the empty answer, taken from the first type-restricted concept.
fn empty_noun(concepts: &[&CrossAppConcept], qualifier: Option<&str>) -> String {
    let plural = concepts
        .iter()
        .find_map(|c| c.types.first())
        .map(|t| t.nouns().1)
        .unwrap_or("items");
    match qualifier {
        Some(q) => format!("{} {}", q, plural),
        None => plural.to_string(),
    }
}

fn display<'a>(displays: &HashMap<&str, &'a str>, app: &'a str) -> &'a str {
    displays.get(app).copied().unwrap_or(app)
}

/// Totals grouped by key, in first-seen order.
fn group_counts<'a, K, F>(items: &'a [AggregateableData], key: F) -> Vec<(K, u64)>
where
    K: PartialEq,
    F: Fn(&'a AggregateableData) -> K,
{
    let mut out: Vec<(K, u64)> = Vec::new();
    for item in items {
        let k = key(item);
        match out.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, n)) => *n += item.count,
            None => out.push((k, item.count)),
        }
    }
    out
}

fn render_sum(
    items: &[AggregateableData],
    displays: &HashMap<&str, &str>,
    qualifier: Option<&str>,
    concepts: &[&CrossAppConcept],
) -> String {
    let total: u64 = items.iter().map(|i| i.count).sum();
    if total == 0 {
        return format!("You don't have any {} yet.", empty_noun(concepts, qualifier));
    }

    let by_type: Vec<(AggregateType, u64)> = group_counts(items, |i| i.kind)
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect();
    let by_app: Vec<(&str, u64)> = group_counts(items, |i| i.app_name.as_str())
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect();

    if let [(kind, type_total)] = by_type.as_slice() {
        let headline = noun_phrase(*type_total, *kind, qualifier);
        return match by_app.as_slice() {
            [(app, _)] => format!("You have {} in {}.", headline, display(displays, app)),
            apps => {
                let parts: Vec<String> = apps
                    .iter()
                    .map(|(app, n)| format!("{} in {}", n, display(displays, app)))
                    .collect();
                format!("You have {}: {}.", headline, join_natural(&parts))
            }
        };
    }

    let per_type: Vec<String> = by_type
        .iter()
        .map(|(kind, n)| noun_phrase(*n, *kind, qualifier))
        .collect();
    let apps: Vec<String> = by_app
        .iter()
        .map(|(app, _)| display(displays, app).to_string())
        .collect();
    format!("You have {} across {}.", join_natural(&per_type), join_natural(&apps))
}

fn render_list(
    items: &[AggregateableData],
    displays: &HashMap<&str, &str>,
    qualifier: Option<&str>,
    concepts: &[&CrossAppConcept],
) -> String {
    let lines: Vec<String> = items
        .iter()
        .filter(|i| i.count > 0)
        .map(|i| format!("{}: {} ({})", display(displays, &i.app_name), i.label, i.count))
        .collect();
    if lines.is_empty() {
        return format!("You don't have any {} yet.", empty_noun(concepts, qualifier));
    }
    format!("Here's what I found:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{AdapterCapabilities, AppContextData};

    fn snapshot(app: &str, display: &str, aggregates: Vec<AggregateableData>) -> AppSnapshot {
        AppSnapshot {
            app_name: app.to_string(),
            display_name: display.to_string(),
            icon: None,
            capabilities: AdapterCapabilities { aggregation: true, ..Default::default() },
            context: AppContextData::default(),
            aggregates,
        }
    }

    #[test]
    fn joiner_has_no_oxford_comma() {
        let parts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_natural(&parts), "a, b and c");
        assert_eq!(join_natural(&parts[..2]), "a and b");
        assert_eq!(join_natural(&parts[..1]), "a");
        assert_eq!(join_natural(&[]), "");
    }

    #[test]
    fn detects_multiple_concepts() {
        let agg = CrossAppAggregator::new();
        let names: Vec<&str> = agg
            .detect_concepts("Show my FAVORITE photos")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["favorites", "images"]);
        assert!(agg.detect_concepts("what's the weather").is_empty());
    }

    #[test]
    fn explicit_phrasing_is_cross_app() {
        let agg = CrossAppAggregator::new();
        assert!(agg.is_cross_app_query("How many notes across all apps?"));
        assert!(agg.is_cross_app_query("count everything"));
        assert!(!agg.is_cross_app_query("open my notes"));
    }

    #[test]
    fn favorites_are_summed_across_apps() {
        let agg = CrossAppAggregator::new();
        let snaps = vec![
            snapshot(
                "photos",
                "Photos",
                vec![
                    AggregateableData::new(AggregateType::Image, 5, "favorite photos", "photos"),
                    AggregateableData::new(AggregateType::Image, 120, "all photos", "photos"),
                ],
            ),
            snapshot(
                "gallery",
                "Gallery",
                vec![AggregateableData::new(AggregateType::Image, 3, "favorites", "gallery")],
            ),
        ];
        let result = agg.aggregate("show my favorite photos", &snaps);
        assert_eq!(result.total, 8);
        assert_eq!(result.text, "You have 8 favorite photos: 5 in Photos and 3 in Gallery.");
        assert_eq!(result.source_adapters, vec!["photos", "gallery"]);
    }

    #[test]
    fn singular_noun_for_one_item() {
        let agg = CrossAppAggregator::new();
        let snaps = vec![snapshot(
            "gallery",
            "Gallery",
            vec![AggregateableData::new(AggregateType::Image, 1, "starred", "gallery")],
        )];
        let result = agg.aggregate("favorite pictures", &snaps);
        assert_eq!(result.text, "You have 1 favorite photo in Gallery.");
    }

    #[test]
    fn zero_total_renders_graceful_answer() {
        let agg = CrossAppAggregator::new();
        let snaps = vec![snapshot(
            "photos",
            "Photos",
            vec![AggregateableData::new(AggregateType::Image, 40, "all photos", "photos")],
        )];
        let result = agg.aggregate("show my favorite photos", &snaps);
        assert_eq!(result.total, 0);
        assert_eq!(result.text, "You don't have any favorite photos yet.");
        assert!(result.source_adapters.is_empty());
    }

    #[test]
    fn mixed_types_render_per_type_totals() {
        let agg = CrossAppAggregator::new();
        let snaps = vec![
            snapshot(
                "photos",
                "Photos",
                vec![
                    AggregateableData::new(AggregateType::Image, 4, "favorite photos", "photos"),
                    AggregateableData::new(AggregateType::Video, 2, "favorite videos", "photos"),
                ],
            ),
            snapshot(
                "notes",
                "Notes",
                vec![AggregateableData::new(AggregateType::Document, 1, "starred notes", "notes")],
            ),
        ];
        let result = agg.aggregate("all my favorites", &snaps);
        assert_eq!(result.total, 7);
        assert_eq!(
            result.text,
            "You have 4 favorite photos, 2 favorite videos and 1 favorite document across Photos and Notes."
        );
    }

    #[test]
    fn custom_strategy_renders_through_closure() {
        let concept = CrossAppConcept::new("sessions", &["session"])
            .with_types(&[AggregateType::Count])
            .with_strategy(AggregationStrategy::Custom(Arc::new(|items: &[AggregateableData]| {
                let n: u64 = items.iter().map(|i| i.count).sum();
                format!("{n} focus sessions logged")
            })));
        let agg = CrossAppAggregator::with_concepts(vec![concept]);
        let snaps = vec![snapshot(
            "pomodoro",
            "Pomodoro",
            vec![AggregateableData::new(AggregateType::Count, 6, "sessions today", "pomodoro")],
        )];
        assert_eq!(agg.aggregate("my sessions", &snaps).text, "6 focus sessions logged");
    }
}
