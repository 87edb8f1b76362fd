use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Pending,
    /// "stuck" and "upcoming" are the same bucket; older backend versions
    /// used one word, newer ones the other.
    Stuck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub video_links: Vec<String>,
    pub due_date: Option<String>,
    pub completion_date: Option<String>,
    pub status: TaskStatus,
    pub points: i64,
    pub module_id: i64,
}

impl Task {
    /// Secondary matching key for the recently-completed overlay. Some
    /// backend responses key tasks by title rather than a stable
    /// per-enrollment id, so overlay membership is decided on this form.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}
