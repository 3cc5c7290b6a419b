//! Demo mini-apps wired into the shell: notes, photos, gallery, pomodoro and maps.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use hearth_router::{
    AdapterCapabilities, AdapterError, AggregateType, AggregateableData, AppAdapter, AppContextData, ChangeNotifier,
    Subscription,
};

/// Example phrases seeded into the semantic index, one intent per app.
pub const INTENT_EXAMPLES: &[(&str, &[&str])] = &[
    ("notes", &["write a note", "show my notes", "what did I write", "read my latest note"]),
    ("photos", &["show my photos", "open my camera roll", "how many pictures did I take"]),
    ("gallery", &["open the gallery", "show my albums", "browse saved images"]),
    ("pomodoro", &["start a focus timer", "begin a pomodoro", "how long is left on my timer"]),
    ("maps", &["directions home", "where am I", "open the map"]),
];

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn lowered_contains_any(query: &str, words: &[&str]) -> bool {
    let q = query.to_lowercase();
    words.iter().any(|w| q.contains(w))
}

struct Note {
    text: String,
    starred: bool,
}

/// Notes pushes a change notification whenever a note is added from the shell.
pub struct NotesApp {
    notes: Mutex<Vec<Note>>,
    notifier: Arc<Mutex<Option<ChangeNotifier>>>,
    last_used: Mutex<i64>,
}

impl Default for NotesApp {
    fn default() -> Self {
        Self::new()
    }
}

impl NotesApp {
    const KEYWORDS: &'static [&'static str] = &["note", "notes", "memo", "write", "jot"];

    pub fn new() -> Self {
        Self {
            notes: Mutex::new(vec![
                Note { text: "Buy oat milk".into(), starred: false },
                Note { text: "Dentist on Thursday at 3pm".into(), starred: true },
                Note { text: "Gift ideas for Sam".into(), starred: true },
            ]),
            notifier: Arc::new(Mutex::new(None)),
            last_used: Mutex::new(0),
        }
    }

    pub fn add_note(&self, text: &str) {
        self.notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Note { text: text.trim().to_string(), starred: false });
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = now_ms();
        let notifier = self.notifier.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(n) = notifier {
            n.notify();
        }
    }
}

#[async_trait]
impl AppAdapter for NotesApp {
    fn app_name(&self) -> &str {
        "notes"
    }

    fn display_name(&self) -> &str {
        "Notes"
    }

    fn icon(&self) -> Option<&str> {
        Some("📝")
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            response: true,
            aggregation: true,
            push_updates: true,
            ..Default::default()
        }
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError> {
        let notes = self.notes.lock().map_err(|_| AdapterError::failed("notes lock poisoned"))?;
        let latest = notes.last().map(|n| n.text.as_str()).unwrap_or("none");
        Ok(AppContextData {
            is_active: false,
            last_used: *self.last_used.lock().unwrap_or_else(|e| e.into_inner()),
            summary: format!("{} notes; latest: \"{}\"", notes.len(), latest),
            capabilities: self.capabilities().labels().iter().map(|s| s.to_string()).collect(),
            data: serde_json::json!({ "count": notes.len() }),
        })
    }

    fn can_answer(&self, query: &str) -> bool {
        lowered_contains_any(query, Self::KEYWORDS)
    }

    fn keywords(&self) -> Vec<String> {
        Self::KEYWORDS.iter().map(|s| s.to_string()).collect()
    }

    async fn response(&self, query: &str) -> Result<Option<String>, AdapterError> {
        let notes = self.notes.lock().map_err(|_| AdapterError::failed("notes lock poisoned"))?;
        if lowered_contains_any(query, &["latest", "last"]) {
            return Ok(notes.last().map(|n| format!("Your latest note: \"{}\"", n.text)));
        }
        let listing: Vec<String> = notes.iter().map(|n| format!("- {}", n.text)).collect();
        Ok(Some(format!("You have {} notes:\n{}", notes.len(), listing.join("\n"))))
    }

    fn aggregate_data(&self) -> Result<Vec<AggregateableData>, AdapterError> {
        let notes = self.notes.lock().map_err(|_| AdapterError::failed("notes lock poisoned"))?;
        let starred = notes.iter().filter(|n| n.starred).count() as u64;
        Ok(vec![
            AggregateableData::new(AggregateType::Document, starred, "starred notes", "notes"),
            AggregateableData::new(AggregateType::Document, notes.len() as u64 - starred, "notes", "notes"),
        ])
    }

    fn subscribe(&self, notifier: ChangeNotifier) -> Option<Subscription> {
        *self.notifier.lock().unwrap_or_else(|e| e.into_inner()) = Some(notifier);
        let slot = Arc::clone(&self.notifier);
        Some(Box::new(move || {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }))
    }
}

pub struct PhotosApp;

#[async_trait]
impl AppAdapter for PhotosApp {
    fn app_name(&self) -> &str {
        "photos"
    }

    fn display_name(&self) -> &str {
        "Photos"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { response: true, aggregation: true, ..Default::default() }
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError> {
        Ok(AppContextData {
            is_active: false,
            last_used: now_ms() - 90_000,
            summary: "248 photos, 5 favorites; last import yesterday".into(),
            capabilities: self.capabilities().labels().iter().map(|s| s.to_string()).collect(),
            data: serde_json::Value::Null,
        })
    }

    fn can_answer(&self, query: &str) -> bool {
        lowered_contains_any(query, &["photo", "picture", "image", "video", "camera"])
    }

    fn keywords(&self) -> Vec<String> {
        ["photo", "photos", "picture", "camera", "video"].iter().map(|s| s.to_string()).collect()
    }

    async fn response(&self, _query: &str) -> Result<Option<String>, AdapterError> {
        Ok(Some("248 photos and 12 videos in your library. Latest import: 14 photos yesterday.".into()))
    }

    fn aggregate_data(&self) -> Result<Vec<AggregateableData>, AdapterError> {
        Ok(vec![
            AggregateableData::new(AggregateType::Image, 5, "favorite photos", "photos"),
            AggregateableData::new(AggregateType::Image, 243, "photos", "photos"),
            AggregateableData::new(AggregateType::Video, 2, "favorite videos", "photos"),
            AggregateableData::new(AggregateType::Video, 10, "videos", "photos"),
        ])
    }
}

pub struct GalleryApp;

#[async_trait]
impl AppAdapter for GalleryApp {
    fn app_name(&self) -> &str {
        "gallery"
    }

    fn display_name(&self) -> &str {
        "Gallery"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { aggregation: true, ..Default::default() }
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError> {
        Ok(AppContextData {
            is_active: false,
            last_used: 0,
            summary: "3 shared albums; 3 starred images".into(),
            capabilities: self.capabilities().labels().iter().map(|s| s.to_string()).collect(),
            data: serde_json::Value::Null,
        })
    }

    fn can_answer(&self, query: &str) -> bool {
        lowered_contains_any(query, &["photo", "picture", "image", "album", "gallery"])
    }

    fn keywords(&self) -> Vec<String> {
        ["gallery", "album", "image", "picture"].iter().map(|s| s.to_string()).collect()
    }

    fn aggregate_data(&self) -> Result<Vec<AggregateableData>, AdapterError> {
        Ok(vec![AggregateableData::new(AggregateType::Image, 3, "starred images", "gallery")])
    }
}

/// Scores itself instead of relying on keyword overlap.
pub struct PomodoroApp;

#[async_trait]
impl AppAdapter for PomodoroApp {
    fn app_name(&self) -> &str {
        "pomodoro"
    }

    fn display_name(&self) -> &str {
        "Pomodoro"
    }

    fn icon(&self) -> Option<&str> {
        Some("🍅")
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            response: true,
            confidence: true,
            aggregation: true,
            ..Default::default()
        }
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError> {
        Ok(AppContextData {
            is_active: true,
            last_used: now_ms(),
            summary: "Focus session running, 12 minutes left; 4 sessions today".into(),
            capabilities: self.capabilities().labels().iter().map(|s| s.to_string()).collect(),
            data: serde_json::json!({ "remaining_secs": 720 }),
        })
    }

    fn can_answer(&self, query: &str) -> bool {
        lowered_contains_any(query, &["pomodoro", "timer", "focus", "session"])
    }

    fn keywords(&self) -> Vec<String> {
        ["pomodoro", "timer", "focus", "session"].iter().map(|s| s.to_string()).collect()
    }

    async fn confidence(&self, query: &str) -> Result<f64, AdapterError> {
        let q = query.to_lowercase();
        Ok(if q.contains("pomodoro") {
            1.0
        } else if q.contains("timer") || q.contains("focus") {
            0.9
        } else if q.contains("session") {
            0.6
        } else {
            0.0
        })
    }

    async fn response(&self, _query: &str) -> Result<Option<String>, AdapterError> {
        Ok(Some("Focus session in progress: 12 minutes left.".into()))
    }

    fn aggregate_data(&self) -> Result<Vec<AggregateableData>, AdapterError> {
        Ok(vec![AggregateableData::new(AggregateType::Count, 4, "sessions today", "pomodoro")])
    }
}

/// Context-only app: never answers directly.
pub struct MapsApp;

#[async_trait]
impl AppAdapter for MapsApp {
    fn app_name(&self) -> &str {
        "maps"
    }

    fn display_name(&self) -> &str {
        "Maps"
    }

    fn context_data(&self) -> Result<AppContextData, AdapterError> {
        Ok(AppContextData {
            is_active: false,
            last_used: now_ms() - 3_600_000,
            summary: "Saved places: Home, Work, Climbing gym".into(),
            capabilities: Vec::new(),
            data: serde_json::Value::Null,
        })
    }

    fn can_answer(&self, query: &str) -> bool {
        lowered_contains_any(query, &["map", "directions", "where", "location", "route"])
    }

    fn keywords(&self) -> Vec<String> {
        ["map", "directions", "location", "where"].iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notes_lists_and_aggregates() {
        let notes = NotesApp::new();
        notes.add_note("Call the plumber");
        let ctx = notes.context_data().unwrap();
        assert!(ctx.summary.starts_with("4 notes"));
        let agg = notes.aggregate_data().unwrap();
        assert_eq!(agg[0].count, 2);
        assert_eq!(agg[1].count, 2);
        let latest = notes.response("show my latest note").await.unwrap();
        assert_eq!(latest.as_deref(), Some("Your latest note: \"Call the plumber\""));
    }

    #[tokio::test]
    async fn pomodoro_scores_itself() {
        assert_eq!(PomodoroApp.confidence("start a pomodoro").await.unwrap(), 1.0);
        assert_eq!(PomodoroApp.confidence("what's the weather").await.unwrap(), 0.0);
    }
}
