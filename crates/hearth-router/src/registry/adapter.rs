//! Mini-app adapter contract.
//!
//! Each dashboard mini-app (notes, photos, pomodoro, maps, ...) plugs into the router
//! through [`AppAdapter`]. Optional capabilities are declared up front through
//! [`AdapterCapabilities`]; the registry records them at registration and callers branch on
//! the recorded flags instead of probing methods at call time.
//!
//! ```rust,ignore
//! struct NotesApp { notes: Vec<Note> }
//!
//! #[async_trait]
//! impl AppAdapter for NotesApp {
//!     fn app_name(&self) -> &str { "notes" }
//!     fn display_name(&self) -> &str { "Notes" }
//!     fn capabilities(&self) -> AdapterCapabilities {
//!         AdapterCapabilities { response: true, aggregation: true, ..Default::default() }
//!     }
//!     // ...
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Snapshot of one adapter's self-reported state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppContextData {
    pub is_active: bool,
    /// Epoch milliseconds; 0 when never used.
    pub last_used: i64,
    pub summary: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Image,
    Video,
    Audio,
    Document,
    Score,
    Count,
    Custom,
}

impl AggregateType {
    /// Singular/plural noun used when rendering totals.
    pub fn nouns(&self) -> (&'static str, &'static str) {
        match self {
            Self::Image => ("photo", "photos"),
            Self::Video => ("video", "videos"),
            Self::Audio => ("recording", "recordings"),
            Self::Document => ("document", "documents"),
            Self::Score => ("point", "points"),
            Self::Count => ("item", "items"),
            Self::Custom => ("item", "items"),
        }
    }
}

/// A quantifiable fact an adapter contributes to cross-app totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateableData {
    #[serde(rename = "type")]
    pub kind: AggregateType,
    pub count: u64,
    pub label: String,
    pub app_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AggregateableData {
    pub fn new(kind: AggregateType, count: u64, label: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            kind,
            count,
            label: label.into(),
            app_name: app_name.into(),
            metadata: None,
        }
    }
}

/// Optional capabilities an adapter implements beyond the required core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterCapabilities {
    /// `response` answers queries directly.
    pub response: bool,
    /// `search` returns structured hits.
    pub search: bool,
    /// `confidence` scores queries itself (replaces keyword overlap).
    pub confidence: bool,
    /// `aggregate_data` contributes to cross-app totals.
    pub aggregation: bool,
    /// `subscribe` pushes change notifications.
    pub push_updates: bool,
}

impl AdapterCapabilities {
    pub fn labels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.response {
            out.push("response");
        }
        if self.search {
            out.push("search");
        }
        if self.confidence {
            out.push("confidence");
        }
        if self.aggregation {
            out.push("aggregation");
        }
        if self.push_updates {
            out.push("push_updates");
        }
        out
    }
}

/// Handed to push-capable adapters; `notify` marks the adapter's snapshot stale.
pub trait ChangeNotify: Send + Sync {
    fn notify(&self);
}

pub type ChangeNotifier = Arc<dyn ChangeNotify>;

/// Release hook returned by `subscribe`; called on unregistration.
pub type Subscription = Box<dyn FnOnce() + Send + Sync>;

#[async_trait]
pub trait AppAdapter: Send + Sync {
    /// Stable identifier; also the intent name in the semantic index.
    fn app_name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn icon(&self) -> Option<&str> {
        None
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::default()
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError>;

    fn can_answer(&self, query: &str) -> bool;

    fn keywords(&self) -> Vec<String>;

    async fn response(&self, _query: &str) -> Result<Option<String>, AdapterError> {
        Err(AdapterError::Unsupported("response"))
    }

    async fn search(&self, _query: &str) -> Result<Vec<serde_json::Value>, AdapterError> {
        Err(AdapterError::Unsupported("search"))
    }

    /// Self-assessed confidence in [0, 1].
    async fn confidence(&self, _query: &str) -> Result<f64, AdapterError> {
        Err(AdapterError::Unsupported("confidence"))
    }

    fn aggregate_data(&self) -> Result<Vec<AggregateableData>, AdapterError> {
        Err(AdapterError::Unsupported("aggregation"))
    }

    fn subscribe(&self, _notifier: ChangeNotifier) -> Option<Subscription> {
        None
    }
}

/// A registered adapter together with the capabilities recorded at registration.
#[derive(Clone)]
pub struct AdapterHandle {
    pub adapter: Arc<dyn AppAdapter>,
    pub capabilities: AdapterCapabilities,
}

impl AdapterHandle {
    pub fn new(adapter: Arc<dyn AppAdapter>) -> Self {
        let capabilities = adapter.capabilities();
        Self { adapter, capabilities }
    }

    pub fn name(&self) -> &str {
        self.adapter.app_name()
    }

    pub fn display_name(&self) -> &str {
        self.adapter.display_name()
    }
}

impl std::fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterHandle")
            .field("app_name", &self.adapter.app_name())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
