use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::models::task::normalize_title;

/// Persisted set of recently-completed task titles.
///
/// The backend is eventually consistent: a confirmed completion can take a
/// while to show up in the course payload. Every synthesis pass reads this
/// set and forces matching tasks to completed so the user never watches a
/// finished task flip back to pending. Append-only from this client's
/// perspective, and intentionally never cleared on course switch.
#[derive(Debug)]
pub struct RecentlyCompleted {
    path: PathBuf,
    titles: HashSet<String>,
}

impl RecentlyCompleted {
    /// Load the overlay from disk. A missing or unreadable file is an
    /// empty set, not an error; the overlay only ever masks display lag.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let titles = match fs::read_to_string(&path) {
            Ok(body) => match serde_json::from_str::<Vec<String>>(&body) {
                Ok(entries) => entries.into_iter().collect(),
                Err(e) => {
                    warn!("Ignoring malformed overlay file {}: {}", path.display(), e);
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };
        Self { path, titles }
    }

    /// In-memory overlay, used by tests and by callers that opt out of
    /// persistence.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            titles: HashSet::new(),
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    /// Add a confirmed completion and persist. Write failures are logged
    /// and swallowed; losing the overlay entry only means a brief flash of
    /// stale status on the next reload.
    pub fn insert(&mut self, title: &str) {
        self.titles.insert(normalize_title(title));
        self.save();
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    fn save(&self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        let mut entries: Vec<&String> = self.titles.iter().collect();
        entries.sort();
        match serde_json::to_string(&entries) {
            Ok(body) => {
                if let Err(e) = fs::write(&self.path, body) {
                    warn!("Failed to persist overlay to {}: {}", self.path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize overlay: {}", e),
        }
    }
}
