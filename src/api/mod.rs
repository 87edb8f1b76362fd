pub mod dto;

use std::collections::VecDeque;
use std::env;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::AppError;
use dto::CompletionAck;

#[derive(Clone, Debug)]
pub struct CoachConfig {
    pub base_url: String,
    pub access_token: String,
    /// Actor id derived from the stored session. Absent when no profile
    /// has been persisted yet; mutations fail fast in that case.
    pub student_id: Option<i64>,
}

impl CoachConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("COACH_API_BASE_URL")
            .map_err(|_| AppError::BadRequest("COACH_API_BASE_URL is not set".to_string()))?;
        let access_token = env::var("COACH_ACCESS_TOKEN")
            .map_err(|_| AppError::BadRequest("COACH_ACCESS_TOKEN is not set".to_string()))?;
        let student_id = env::var("COACH_STUDENT_ID")
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok());

        Ok(Self {
            base_url,
            access_token,
            student_id,
        })
    }
}

/// Remote coaching backend. Everything the core consumes goes through this
/// trait so tests can swap in a canned implementation.
#[async_trait]
pub trait CoachClient: Send + Sync {
    /// Raw course payload; shape varies per backend version, so this stays
    /// untyped and the synthesis layer resolves the aliases.
    async fn fetch_course_detail(&self, course_id: i64) -> Result<Value, AppError>;
    async fn fetch_my_courses(&self) -> Result<Vec<Value>, AppError>;
    async fn mark_task_completed(
        &self,
        student_id: i64,
        task_title: &str,
        points: i64,
    ) -> Result<CompletionAck, AppError>;
    async fn fetch_points(&self, student_id: i64) -> Result<Value, AppError>;
    async fn fetch_leaderboard(
        &self,
        course_id: i64,
        month_date: Option<&str>,
    ) -> Result<Value, AppError>;
    async fn fetch_rewards(&self, course_id: i64) -> Result<Value, AppError>;
}

pub struct CoachHttpClient {
    client: Client,
    config: CoachConfig,
}

impl CoachHttpClient {
    pub fn new(config: CoachConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::BadRequest(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, AppError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.config.access_token)
            .query(query)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(AppError::from_status(status, best_error_message(&body)));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::Generic(format!("Malformed response body: {}", e)))
    }
}

fn classify_transport(e: reqwest::Error) -> AppError {
    if e.is_connect() || e.is_timeout() {
        AppError::Connectivity(e.to_string())
    } else {
        AppError::Generic(e.to_string())
    }
}

/// Pull the most useful human-readable message out of an error body. The
/// backend has used `message`, `error` and `detail` at different times.
fn best_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .filter_map(|k| value.get(*k))
        .find_map(|v| v.as_str().map(str::to_string))
}

#[async_trait]
impl CoachClient for CoachHttpClient {
    async fn fetch_course_detail(&self, course_id: i64) -> Result<Value, AppError> {
        self.get_json(&format!("/courses/{}", course_id), &[]).await
    }

    async fn fetch_my_courses(&self) -> Result<Vec<Value>, AppError> {
        let body = self.get_json("/my-courses", &[]).await?;
        // Anything other than a non-empty array renders as "no courses".
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    async fn mark_task_completed(
        &self,
        student_id: i64,
        task_title: &str,
        points: i64,
    ) -> Result<CompletionAck, AppError> {
        // The backend takes these as query params, not a JSON body.
        let response = self
            .client
            .put(self.url("/api/mark_as_completed"))
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("student_id", student_id.to_string()),
                ("task_title", task_title.to_string()),
                ("points", points.to_string()),
            ])
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(AppError::from_status(status, best_error_message(&body)));
        }

        // An unparseable ack is ambiguous, and ambiguity means non-success.
        Ok(serde_json::from_str(&body).unwrap_or(CompletionAck {
            success: false,
            message: None,
        }))
    }

    async fn fetch_points(&self, student_id: i64) -> Result<Value, AppError> {
        self.get_json("/api/points", &[("student_id", student_id.to_string())])
            .await
    }

    async fn fetch_leaderboard(
        &self,
        course_id: i64,
        month_date: Option<&str>,
    ) -> Result<Value, AppError> {
        let mut query = vec![("course_id", course_id.to_string())];
        if let Some(month) = month_date {
            query.push(("month_date", month.to_string()));
        }
        self.get_json("/api/leaderboard", &query).await
    }

    async fn fetch_rewards(&self, course_id: i64) -> Result<Value, AppError> {
        self.get_json(&format!("/courses/{}/rewards", course_id), &[])
            .await
    }
}

/// Canned in-memory client for tests.
///
/// Course payloads are served as a queue: each fetch pops the next one,
/// and the final payload is sticky, so tests can script "first fetch sees
/// pending, the re-fetch after a failed mutation sees the server truth".
/// Completion calls are counted so tests can assert exactly-once delivery
/// through the in-flight guard.
pub struct StaticCoachClient {
    payloads: Mutex<VecDeque<Value>>,
    ack_success: bool,
    completion_delay: Duration,
    completion_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fail_refetches: bool,
}

impl StaticCoachClient {
    pub fn new(payload: Value) -> Self {
        Self {
            payloads: Mutex::new(VecDeque::from([payload])),
            ack_success: true,
            completion_delay: Duration::ZERO,
            completion_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fail_refetches: false,
        }
    }

    pub fn with_ack(mut self, success: bool) -> Self {
        self.ack_success = success;
        self
    }

    /// Hold each completion call open for this long, so tests can overlap
    /// a second submission with an outstanding one.
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    /// Serve the first course fetch, then fail every later one, so tests
    /// can exercise a reconciliation whose re-fetch errs.
    pub fn with_failing_refetches(mut self) -> Self {
        self.fail_refetches = true;
        self
    }

    pub fn push_payload(&self, payload: Value) {
        self.payloads.lock().unwrap().push_back(payload);
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    fn next_payload(&self) -> Value {
        let mut payloads = self.payloads.lock().unwrap();
        if payloads.len() > 1 {
            payloads.pop_front().unwrap_or(Value::Null)
        } else {
            payloads.front().cloned().unwrap_or(Value::Null)
        }
    }
}

#[async_trait]
impl CoachClient for StaticCoachClient {
    async fn fetch_course_detail(&self, _course_id: i64) -> Result<Value, AppError> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refetches && call > 0 {
            return Err(AppError::ServerError);
        }
        Ok(self.next_payload())
    }

    async fn fetch_my_courses(&self) -> Result<Vec<Value>, AppError> {
        Ok(Vec::new())
    }

    async fn mark_task_completed(
        &self,
        _student_id: i64,
        _task_title: &str,
        _points: i64,
    ) -> Result<CompletionAck, AppError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        if !self.completion_delay.is_zero() {
            tokio::time::sleep(self.completion_delay).await;
        }
        Ok(CompletionAck {
            success: self.ack_success,
            message: None,
        })
    }

    async fn fetch_points(&self, _student_id: i64) -> Result<Value, AppError> {
        Ok(Value::Null)
    }

    async fn fetch_leaderboard(
        &self,
        _course_id: i64,
        _month_date: Option<&str>,
    ) -> Result<Value, AppError> {
        Ok(Value::Null)
    }

    async fn fetch_rewards(&self, _course_id: i64) -> Result<Value, AppError> {
        Ok(Value::Null)
    }
}
