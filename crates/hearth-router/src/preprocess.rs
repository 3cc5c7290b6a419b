//! Query normalization: case folding, typo correction, synonym expansion.
//!
//! Expansions are appended after the corrected words so keyword matching against
//! adapter vocabularies sees both the user's phrasing and the canonical terms.
//! Punctuation is only stripped for dictionary lookup: a query nothing applies to comes
//! back as the raw text, lower-cased and trimmed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Cap on appended expansion terms.
pub const MAX_EXPANSIONS: usize = 5;

const DEFAULT_CORRECTIONS: &[(&str, &str)] = &[
    ("pomodro", "pomodoro"),
    ("pomodor", "pomodoro"),
    ("pomadoro", "pomodoro"),
    ("fotos", "photos"),
    ("phtos", "photos"),
    ("photoes", "photos"),
    ("favourite", "favorite"),
    ("favourites", "favorites"),
    ("favorit", "favorite"),
    ("notez", "notes"),
    ("ntoes", "notes"),
    ("remider", "reminder"),
    ("reminer", "reminder"),
    ("calender", "calendar"),
    ("wether", "weather"),
    ("adress", "address"),
    ("direcitons", "directions"),
    ("timmer", "timer"),
    ("vidoes", "videos"),
];

const DEFAULT_SYNONYMS: &[(&str, &[&str])] = &[
    ("pics", &["photos", "images"]),
    ("pic", &["photo", "image"]),
    ("pictures", &["photos"]),
    ("picture", &["photo"]),
    ("snaps", &["photos"]),
    ("memo", &["note"]),
    ("memos", &["notes"]),
    ("jot", &["note"]),
    ("timer", &["pomodoro"]),
    ("focus", &["pomodoro"]),
    ("map", &["location", "directions"]),
    ("where", &["location"]),
    ("navigate", &["directions", "map"]),
    ("fav", &["favorite"]),
    ("favs", &["favorites"]),
    ("starred", &["favorite"]),
    ("clips", &["videos"]),
    ("todo", &["task"]),
    ("todos", &["tasks"]),
];

/// A single-word typo fix applied during preprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub from: String,
    pub to: String,
}

/// Terms appended because `term` appeared in the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    pub term: String,
    pub added: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessedQuery {
    pub original: String,
    pub normalized: String,
    pub corrections: Vec<Correction>,
    pub expansions: Vec<Expansion>,
}

/// Stateless once built; `preprocess` is a pure function of its input.
#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    corrections: HashMap<String, String>,
    synonyms: HashMap<String, Vec<String>>,
}

impl Default for QueryPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPreprocessor {
    pub fn new() -> Self {
        let corrections = DEFAULT_CORRECTIONS
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        let synonyms = DEFAULT_SYNONYMS
            .iter()
            .map(|(term, adds)| (term.to_string(), adds.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self { corrections, synonyms }
    }

    /// A preprocessor with no dictionaries: only case folding and whitespace cleanup.
    pub fn empty() -> Self {
        Self {
            corrections: HashMap::new(),
            synonyms: HashMap::new(),
        }
    }

    pub fn with_correction(mut self, from: &str, to: &str) -> Self {
        self.corrections.insert(from.to_lowercase(), to.to_lowercase());
        self
    }

    pub fn with_synonyms(mut self, term: &str, adds: &[&str]) -> Self {
        self.synonyms.insert(
            term.to_lowercase(),
            adds.iter().map(|s| s.to_lowercase()).collect(),
        );
        self
    }

    pub fn preprocess(&self, raw: &str) -> PreprocessedQuery {
        let base = normalize(raw);
        let mut corrections = Vec::new();

        let words: Vec<String> = base
            .split_whitespace()
            .map(|w| match self.corrections.get(w) {
                Some(fixed) => {
                    corrections.push(Correction {
                        from: w.to_string(),
                        to: fixed.clone(),
                    });
                    fixed.clone()
                }
                None => w.to_string(),
            })
            .collect();

        let mut expansions = Vec::new();
        let mut appended: Vec<String> = Vec::new();
        for w in &words {
            let Some(adds) = self.synonyms.get(w.as_str()) else {
                continue;
            };
            let fresh: Vec<String> = adds
                .iter()
                .filter(|a| !words.contains(a) && !appended.contains(a))
                .take(MAX_EXPANSIONS.saturating_sub(appended.len()))
                .cloned()
                .collect();
            if fresh.is_empty() {
                continue;
            }
            appended.extend(fresh.iter().cloned());
            expansions.push(Expansion {
                term: w.clone(),
                added: fresh,
            });
        }

        let mut normalized = words.join(" ");
        if !appended.is_empty() {
            normalized.push(' ');
            normalized.push_str(&appended.join(" "));
        }
        if corrections.is_empty() && expansions.is_empty() {
            normalized = raw.trim().to_lowercase();
        }

        PreprocessedQuery {
            original: raw.to_string(),
            normalized,
            corrections,
            expansions,
        }
    }
}

/// Lower-case, strip sentence punctuation, collapse whitespace. Used for dictionary lookup.
fn normalize(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '?' | '!' | '.' | ',' | ';' | ':' | '"' | '(' | ')' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
