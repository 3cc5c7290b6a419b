//! Shared fixtures: scripted mini-app adapters and a similarity service that counts searches.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hearth_router::{
    build_router, AdapterCapabilities, AdapterError, AdapterRegistry, AggregateType, AggregateableData, AppAdapter,
    AppContextData, LocalSimilarityService, Router, RouterConfig, SemanticIndex, SimilarityError, SimilarityHit,
    SimilarityResult, SimilarityService,
};

pub enum Reply {
    Text(&'static str),
    Empty,
    Fail,
    Slow(Duration, &'static str),
}

pub struct ScriptedAdapter {
    name: String,
    display: String,
    keywords: Vec<String>,
    confidence: Option<f64>,
    reply: Option<Reply>,
    summary: String,
    active: bool,
    fail_context: bool,
    aggregates: Vec<AggregateableData>,
    pub response_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(name: &str, display: &str) -> Self {
        Self {
            name: name.to_string(),
            display: display.to_string(),
            keywords: Vec::new(),
            confidence: None,
            reply: None,
            summary: String::new(),
            active: false,
            fail_context: false,
            aggregates: Vec::new(),
            response_calls: AtomicUsize::new(0),
        }
    }

    pub fn keywords(mut self, kws: &[&str]) -> Self {
        self.keywords = kws.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn confidence(mut self, c: f64) -> Self {
        self.confidence = Some(c);
        self
    }

    pub fn reply(mut self, reply: Reply) -> Self {
        self.reply = Some(reply);
        self
    }

    pub fn summary(mut self, s: &str) -> Self {
        self.summary = s.to_string();
        self
    }

    pub fn active(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn failing_context(mut self) -> Self {
        self.fail_context = true;
        self
    }

    pub fn aggregate(mut self, kind: AggregateType, count: u64, label: &str) -> Self {
        let item = AggregateableData::new(kind, count, label, self.name.clone());
        self.aggregates.push(item);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl AppAdapter for ScriptedAdapter {
    fn app_name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            response: self.reply.is_some(),
            confidence: self.confidence.is_some(),
            aggregation: !self.aggregates.is_empty(),
            ..Default::default()
        }
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError> {
        if self.fail_context {
            return Err(AdapterError::failed("storage offline"));
        }
        Ok(AppContextData {
            is_active: self.active,
            last_used: 0,
            summary: self.summary.clone(),
            capabilities: self.capabilities().labels().iter().map(|s| s.to_string()).collect(),
            data: serde_json::Value::Null,
        })
    }

    fn can_answer(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.keywords.iter().any(|k| q.contains(k.as_str()))
    }

    fn keywords(&self) -> Vec<String> {
        self.keywords.clone()
    }

    async fn response(&self, _query: &str) -> Result<Option<String>, AdapterError> {
        self.response_calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(Reply::Text(t)) => Ok(Some(t.to_string())),
            Some(Reply::Empty) => Ok(Some("   ".to_string())),
            Some(Reply::Fail) => Err(AdapterError::failed("boom")),
            Some(Reply::Slow(d, t)) => {
                tokio::time::sleep(*d).await;
                Ok(Some(t.to_string()))
            }
            None => Err(AdapterError::Unsupported("response")),
        }
    }

    async fn confidence(&self, _query: &str) -> Result<f64, AdapterError> {
        self.confidence.ok_or(AdapterError::Unsupported("confidence"))
    }

    fn aggregate_data(&self) -> Result<Vec<AggregateableData>, AdapterError> {
        Ok(self.aggregates.clone())
    }
}

/// Local bag-of-words backend that counts searches and can be switched into failure modes.
pub struct CountingSimilarityService {
    inner: LocalSimilarityService,
    healthy: bool,
    fail_search: AtomicBool,
    searches: AtomicUsize,
}

impl CountingSimilarityService {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSimilarityService::new(),
            healthy: true,
            fail_search: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
        })
    }

    pub fn unhealthy() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalSimilarityService::new(),
            healthy: false,
            fail_search: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
        })
    }

    pub fn fail_searches(&self) {
        self.fail_search.store(true, Ordering::SeqCst);
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimilarityService for CountingSimilarityService {
    async fn is_healthy(&self) -> SimilarityResult<bool> {
        Ok(self.healthy)
    }

    async fn store(&self, text: &str) -> SimilarityResult<()> {
        self.inner.store(text).await
    }

    async fn search(&self, query: &str, limit: usize) -> SimilarityResult<Vec<SimilarityHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(SimilarityError::Request("scripted failure".into()));
        }
        self.inner.search(query, limit).await
    }

    async fn count(&self) -> SimilarityResult<usize> {
        self.inner.count().await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

pub struct Harness {
    pub router: Router,
    pub registry: AdapterRegistry,
    pub semantic: Arc<SemanticIndex>,
}

pub async fn harness(
    config: RouterConfig,
    service: Arc<dyn SimilarityService>,
    adapters: &[Arc<ScriptedAdapter>],
) -> Harness {
    let registry = AdapterRegistry::new(&config.registry);
    for adapter in adapters {
        registry.register_adapter(adapter.clone());
    }
    let (router, semantic) = build_router(&config, service, registry.clone()).await;
    Harness {
        router,
        registry,
        semantic,
    }
}

/// Weights that make the total equal the adapter's own confidence.
pub fn keyword_only_config() -> RouterConfig {
    let mut config = RouterConfig::default();
    config.weights.semantic = 0.0;
    config.weights.keyword = 1.0;
    config.weights.context = 0.0;
    config
}
