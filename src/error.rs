use thiserror::Error;

/// Failure categories surfaced to the caller. Fetch failures map onto the
/// user-facing buckets the UI knows how to render (retry affordance vs
/// not-found screen); nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Course not found or inaccessible")]
    NotFound,

    #[error("Server error, retry later")]
    ServerError,

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Classify an HTTP status plus the best available error message from
    /// the response body. 404 and 422 both mean the course is gone or the
    /// student is not enrolled; the backend uses them interchangeably.
    pub fn from_status(status: u16, body_message: Option<String>) -> Self {
        match status {
            404 | 422 => AppError::NotFound,
            401 | 403 => AppError::Unauthenticated,
            500..=599 => AppError::ServerError,
            _ => AppError::Generic(
                body_message.unwrap_or_else(|| format!("Request failed with status {}", status)),
            ),
        }
    }

    /// True when retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ServerError | AppError::Connectivity(_) | AppError::Generic(_)
        )
    }
}
