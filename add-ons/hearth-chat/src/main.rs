//! Hearth chat shell
//!
//! Reads utterances from stdin, routes each through the confidence router and prints the
//! outcome as JSON. Logs go to stderr so stdout stays machine-readable.
//!
//! Commands: `:apps` (registry snapshot), `:scores <query>` (ranked scores),
//! `:note <text>` (add a note; exercises push updates), `:quit`.

mod apps;

use std::sync::Arc;

use hearth_router::{
    build_router, AdapterRegistry, HttpSimilarityService, LocalSimilarityService, Router, RouterConfig,
    SimilarityService,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apps::{GalleryApp, MapsApp, NotesApp, PhotosApp, PomodoroApp, INTENT_EXAMPLES};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[hearth-chat] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match RouterConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "config not loaded; using defaults");
            RouterConfig::default()
        }
    };

    let similarity = similarity_backend();
    let registry = AdapterRegistry::new(&config.registry);
    let notes = Arc::new(NotesApp::new());
    registry.register_adapter(notes.clone());
    registry.register_adapter(Arc::new(PhotosApp));
    registry.register_adapter(Arc::new(GalleryApp));
    registry.register_adapter(Arc::new(PomodoroApp));
    registry.register_adapter(Arc::new(MapsApp));
    registry.subscribe(|snapshots| {
        tracing::debug!(apps = snapshots.len(), "dashboard snapshot refreshed");
    });

    let (router, semantic) = build_router(&config, similarity, registry.clone()).await;
    if semantic.is_healthy() {
        for (intent, phrases) in INTENT_EXAMPLES {
            if let Err(e) = semantic.register_intent(intent, phrases).await {
                tracing::warn!(intent, error = %e, "intent seeding failed");
            }
        }
    }

    tracing::info!(
        apps = registry.len(),
        semantic = semantic.is_healthy(),
        "hearth chat ready; type a message, :apps, :scores <q>, :note <text> or :quit"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(line.trim(), &router, &registry, &notes).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down");
                break;
            }
        }
    }
}

fn similarity_backend() -> Arc<dyn SimilarityService> {
    match std::env::var("HEARTH_SIMILARITY_URL") {
        Ok(url) if !url.trim().is_empty() => match HttpSimilarityService::new(&url) {
            Ok(svc) => {
                tracing::info!(url = %url, "using remote similarity service");
                Arc::new(svc)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "remote similarity client failed; using local backend");
                Arc::new(LocalSimilarityService::new())
            }
        },
        _ => Arc::new(LocalSimilarityService::new()),
    }
}

/// Returns false when the shell should exit.
async fn handle_line(line: &str, router: &Router, registry: &AdapterRegistry, notes: &NotesApp) -> bool {
    if line.is_empty() {
        return true;
    }
    if line == ":quit" {
        return false;
    }
    if line == ":apps" {
        print_json(&registry.all_app_data());
        return true;
    }
    if let Some(text) = line.strip_prefix(":note ") {
        notes.add_note(text);
        println!("{}", serde_json::json!({ "added": text.trim() }));
        return true;
    }
    if let Some(query) = line.strip_prefix(":scores ") {
        print_json(&router.scorer().score_registered(query).await);
        return true;
    }

    let outcome = router.route_query(line).await;
    print_json(&serde_json::json!({
        "outcome": outcome,
        "prompt": outcome.augment_prompt(line),
    }));
    true
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => tracing::warn!(error = %e, "could not serialize output"),
    }
}
