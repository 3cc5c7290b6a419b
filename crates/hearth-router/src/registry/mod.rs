//! Adapter registry: the live set of mini-app adapters plus a short-TTL snapshot cache of
//! their self-reported context.
//!
//! Snapshot errors are isolated per adapter: a failing `context_data` is logged and the
//! adapter is left out of that round. Listeners get the current snapshot on subscribe and
//! again after every registration change or adapter-pushed update.

mod adapter;

pub use adapter::{
    AdapterCapabilities, AdapterHandle, AggregateType, AggregateableData, AppAdapter, AppContextData,
    ChangeNotifier, ChangeNotify, Subscription,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::CacheEntry;
use crate::config::RegistryConfig;

/// One adapter's cached view, as served to the scorer, router and listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSnapshot {
    pub app_name: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub capabilities: AdapterCapabilities,
    pub context: AppContextData,
    /// Empty unless the adapter declared aggregation.
    pub aggregates: Vec<AggregateableData>,
}

pub type SnapshotListener = Arc<dyn Fn(&[AppSnapshot]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registered {
    handle: AdapterHandle,
    seq: u64,
    subscription: Mutex<Option<Subscription>>,
}

struct RegistryInner {
    adapters: DashMap<String, Registered>,
    snapshots: DashMap<String, CacheEntry<AppSnapshot>>,
    listeners: Mutex<Vec<(ListenerId, SnapshotListener)>>,
    next_seq: AtomicU64,
    generation: AtomicU64,
    snapshot_ttl: Duration,
}

/// Cheap to clone; clones share the same adapters and caches.
#[derive(Clone)]
pub struct AdapterRegistry {
    inner: Arc<RegistryInner>,
}

struct AdapterNotifier {
    app_name: String,
    registry: Weak<RegistryInner>,
}

impl ChangeNotify for AdapterNotifier {
    fn notify(&self) {
        if let Some(inner) = self.registry.upgrade() {
            debug!(target: "hearth::registry", app = %self.app_name, "adapter pushed update");
            inner.snapshots.remove(&self.app_name);
            inner.notify_listeners();
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(&RegistryConfig::default())
    }
}

impl AdapterRegistry {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                adapters: DashMap::new(),
                snapshots: DashMap::new(),
                listeners: Mutex::new(Vec::new()),
                next_seq: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                snapshot_ttl: config.snapshot_ttl(),
            }),
        }
    }

    /// Register (or replace) an adapter under its `app_name`.
    pub fn register_adapter(&self, adapter: Arc<dyn AppAdapter>) {
        let handle = AdapterHandle::new(adapter);
        let name = handle.name().to_string();
        if self.inner.adapters.contains_key(&name) {
            self.release(&name);
        }

        let subscription = if handle.capabilities.push_updates {
            let notifier: ChangeNotifier = Arc::new(AdapterNotifier {
                app_name: name.clone(),
                registry: Arc::downgrade(&self.inner),
            });
            handle.adapter.subscribe(notifier)
        } else {
            None
        };

        info!(
            target: "hearth::registry",
            app = %name,
            capabilities = ?handle.capabilities.labels(),
            "adapter registered"
        );
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner.adapters.insert(
            name.clone(),
            Registered {
                handle,
                seq,
                subscription: Mutex::new(subscription),
            },
        );
        self.inner.snapshots.remove(&name);
        self.inner.generation.fetch_add(1, Ordering::Relaxed);
        self.inner.notify_listeners();
    }

    /// Remove an adapter and its cached snapshot. Returns false when it was not registered.
    pub fn unregister_adapter(&self, app_name: &str) -> bool {
        if !self.release(app_name) {
            return false;
        }
        info!(target: "hearth::registry", app = %app_name, "adapter unregistered");
        self.inner.generation.fetch_add(1, Ordering::Relaxed);
        self.inner.notify_listeners();
        true
    }

    fn release(&self, app_name: &str) -> bool {
        self.inner.snapshots.remove(app_name);
        let Some((_, registered)) = self.inner.adapters.remove(app_name) else {
            return false;
        };
        let subscription = registered
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(release) = subscription {
            release();
        }
        true
    }

    /// Bumped on every register/unregister; lets downstream caches detect a changed adapter set.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.adapters.is_empty()
    }

    pub fn get(&self, app_name: &str) -> Option<AdapterHandle> {
        self.inner.adapters.get(app_name).map(|r| r.handle.clone())
    }

    /// All adapters in registration order.
    pub fn handles(&self) -> Vec<AdapterHandle> {
        self.inner.handles()
    }

    pub fn app_data(&self, app_name: &str) -> Option<AppSnapshot> {
        self.inner.app_data_at(app_name, Instant::now())
    }

    pub fn all_app_data(&self) -> Vec<AppSnapshot> {
        self.inner.all_app_data()
    }

    /// Adapters whose `can_answer` accepts the query.
    pub fn find_apps_for_query(&self, query: &str) -> Vec<AdapterHandle> {
        self.handles()
            .into_iter()
            .filter(|h| h.adapter.can_answer(query))
            .collect()
    }

    /// Fires immediately with the current snapshot, then on every change.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&[AppSnapshot]) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_seq.fetch_add(1, Ordering::Relaxed));
        let listener: SnapshotListener = Arc::new(listener);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::clone(&listener)));
        listener(&self.all_app_data());
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    #[cfg(test)]
    fn app_data_at(&self, app_name: &str, now: Instant) -> Option<AppSnapshot> {
        self.inner.app_data_at(app_name, now)
    }
}

impl RegistryInner {
    fn handles(&self) -> Vec<AdapterHandle> {
        let mut all: Vec<(u64, AdapterHandle)> = self
            .adapters
            .iter()
            .map(|r| (r.seq, r.handle.clone()))
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, h)| h).collect()
    }

    fn app_data_at(&self, app_name: &str, now: Instant) -> Option<AppSnapshot> {
        if let Some(entry) = self.snapshots.get(app_name) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }

        // Clone the handle out so no map guard is held while the adapter runs.
        let (handle, seq) = self.adapters.get(app_name).map(|r| (r.handle.clone(), r.seq))?;
        let snapshot = snapshot_of(&handle)?;
        // Unregistered or replaced while the adapter ran.
        if self.adapters.get(app_name).map(|r| r.seq) != Some(seq) {
            debug!(target: "hearth::registry", app = %app_name, "adapter changed during snapshot, discarding");
            return None;
        }
        self.snapshots.insert(
            app_name.to_string(),
            CacheEntry {
                value: snapshot.clone(),
                inserted_at: now,
                ttl: self.snapshot_ttl,
            },
        );
        Some(snapshot)
    }

    fn all_app_data(&self) -> Vec<AppSnapshot> {
        let now = Instant::now();
        self.handles()
            .iter()
            .filter_map(|h| self.app_data_at(h.name(), now))
            .collect()
    }

    fn notify_listeners(&self) {
        let listeners: Vec<SnapshotListener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.all_app_data();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

fn snapshot_of(handle: &AdapterHandle) -> Option<AppSnapshot> {
    let adapter = &handle.adapter;
    let context = match adapter.context_data() {
        Ok(c) => c,
        Err(e) => {
            warn!(target: "hearth::registry", app = %adapter.app_name(), error = %e, "context snapshot failed, skipping adapter");
            return None;
        }
    };
    let aggregates = if handle.capabilities.aggregation {
        adapter.aggregate_data().unwrap_or_else(|e| {
            warn!(target: "hearth::registry", app = %adapter.app_name(), error = %e, "aggregate data failed");
            Vec::new()
        })
    } else {
        Vec::new()
    };
    Some(AppSnapshot {
        app_name: adapter.app_name().to_string(),
        display_name: adapter.display_name().to_string(),
        icon: adapter.icon().map(str::to_string),
        capabilities: handle.capabilities,
        context,
        aggregates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Probe {
        name: &'static str,
        calls: AtomicUsize,
        fail: bool,
        notifier: Mutex<Option<ChangeNotifier>>,
        released: Arc<AtomicUsize>,
    }

    impl Probe {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicUsize::new(0),
                fail: false,
                notifier: Mutex::new(None),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl AppAdapter for Probe {
        fn app_name(&self) -> &str {
            self.name
        }
        fn display_name(&self) -> &str {
            self.name
        }
        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities { push_updates: true, ..Default::default() }
        }
        fn context_data(&self) -> Result<AppContextData, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AdapterError::failed("boom"));
            }
            Ok(AppContextData { summary: format!("{} summary", self.name), ..Default::default() })
        }
        fn can_answer(&self, query: &str) -> bool {
            query.contains(self.name)
        }
        fn keywords(&self) -> Vec<String> {
            vec![self.name.to_string()]
        }
        fn subscribe(&self, notifier: ChangeNotifier) -> Option<Subscription> {
            *self.notifier.lock().unwrap() = Some(notifier);
            let released = Arc::clone(&self.released);
            Some(Box::new(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    #[test]
    fn snapshot_is_cached_within_ttl() {
        let registry = AdapterRegistry::default();
        let probe = Arc::new(Probe::new("notes"));
        registry.register_adapter(probe.clone());

        let t0 = Instant::now();
        assert!(registry.app_data_at("notes", t0).is_some());
        assert!(registry.app_data_at("notes", t0 + Duration::from_secs(4)).is_some());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        assert!(registry.app_data_at("notes", t0 + Duration::from_secs(6)).is_some());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_adapter_is_omitted() {
        let registry = AdapterRegistry::default();
        registry.register_adapter(Arc::new(Probe::new("notes")));
        let mut bad = Probe::new("photos");
        bad.fail = true;
        registry.register_adapter(Arc::new(bad));

        let all = registry.all_app_data();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].app_name, "notes");
        assert!(registry.app_data("photos").is_none());
    }

    #[test]
    fn pushed_update_invalidates_only_that_adapter() {
        let registry = AdapterRegistry::default();
        let notes = Arc::new(Probe::new("notes"));
        let maps = Arc::new(Probe::new("maps"));
        registry.register_adapter(notes.clone());
        registry.register_adapter(maps.clone());
        registry.all_app_data();
        let (n0, m0) = (notes.calls.load(Ordering::SeqCst), maps.calls.load(Ordering::SeqCst));

        let notifier = notes.notifier.lock().unwrap().clone().unwrap();
        notifier.notify();
        registry.all_app_data();
        assert_eq!(notes.calls.load(Ordering::SeqCst), n0 + 1);
        assert_eq!(maps.calls.load(Ordering::SeqCst), m0);
    }

    #[test]
    fn unregister_releases_subscription_and_bumps_generation() {
        let registry = AdapterRegistry::default();
        let notes = Arc::new(Probe::new("notes"));
        registry.register_adapter(notes.clone());
        let g = registry.generation();

        assert!(registry.unregister_adapter("notes"));
        assert!(!registry.unregister_adapter("notes"));
        assert_eq!(notes.released.load(Ordering::SeqCst), 1);
        assert!(registry.generation() > g);
        assert!(registry.app_data("notes").is_none());
        assert!(registry.is_empty());
    }

    struct Vanishing {
        registry: Mutex<Option<AdapterRegistry>>,
    }

    #[async_trait]
    impl AppAdapter for Vanishing {
        fn app_name(&self) -> &str {
            "weather"
        }
        fn display_name(&self) -> &str {
            "Weather"
        }
        fn context_data(&self) -> Result<AppContextData, AdapterError> {
            if let Some(registry) = self.registry.lock().unwrap().take() {
                registry.unregister_adapter("weather");
            }
            Ok(AppContextData { summary: "Sunny".into(), ..Default::default() })
        }
        fn can_answer(&self, _query: &str) -> bool {
            false
        }
        fn keywords(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn snapshot_of_adapter_removed_mid_read_is_not_cached() {
        let registry = AdapterRegistry::default();
        let weather = Arc::new(Vanishing { registry: Mutex::new(Some(registry.clone())) });
        registry.register_adapter(weather);

        assert!(registry.app_data("weather").is_none());
        assert!(registry.inner.snapshots.get("weather").is_none());
        assert!(registry.app_data("weather").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn listeners_fire_on_subscribe_and_change() {
        let registry = AdapterRegistry::default();
        registry.register_adapter(Arc::new(Probe::new("notes")));

        let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
        let sink = Arc::clone(&seen);
        let id = registry.subscribe(move |snap| sink.lock().unwrap().push(snap.len()));
        registry.register_adapter(Arc::new(Probe::new("maps")));
        registry.unregister_adapter("notes");
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1]);

        assert!(registry.unsubscribe(id));
        registry.register_adapter(Arc::new(Probe::new("photos")));
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn handles_keep_registration_order_and_filter_by_query() {
        let registry = AdapterRegistry::default();
        for name in ["photos", "notes", "maps"] {
            registry.register_adapter(Arc::new(Probe::new(name)));
        }
        let names: Vec<String> = registry.handles().iter().map(|h| h.name().to_string()).collect();
        assert_eq!(names, vec!["photos", "notes", "maps"]);

        let hits = registry.find_apps_for_query("open notes and maps");
        let hit_names: Vec<&str> = hits.iter().map(|h| h.name()).collect();
        assert_eq!(hit_names, vec!["notes", "maps"]);
    }
}
