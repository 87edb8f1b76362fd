use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::CoachClient;
use crate::error::AppError;
use crate::models::{Course, TaskStatus};
use crate::overlay::RecentlyCompleted;
use crate::synthesis::build_course;

/// Shared refresh counter for the points view. The points screen polls the
/// epoch and reloads when it moves; the bump is delayed after a confirmed
/// completion to give the backend time to post the ledger entry.
#[derive(Debug, Default)]
pub struct PointsRefreshSignal {
    epoch: AtomicU64,
}

impl PointsRefreshSignal {
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Final state of one completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Remote confirmed; the optimistic patch stands and the overlay
    /// remembers the title.
    Confirmed,
    /// Remote failed or would not confirm; the tree was replaced by a
    /// fresh fetch instead of a fine-grained rollback.
    Reverted,
    /// Same task already had a completion in flight; this call did nothing.
    DuplicateInFlight,
}

/// Drives a "mark task completed" action to a consistent end state across
/// the local tree and the remote store.
///
/// While a completion is outstanding its `(task id, normalized title)` key
/// sits in the in-flight set and the task id in the pending-optimistic
/// set: the first deduplicates resubmission, the second lets the UI render
/// the unconfirmed state distinctly.
pub struct CompletionCoordinator {
    in_flight: Mutex<HashSet<(i64, String)>>,
    pending: Mutex<HashSet<i64>>,
    points_signal: Arc<PointsRefreshSignal>,
    refresh_delay: Duration,
}

impl CompletionCoordinator {
    pub fn new(points_signal: Arc<PointsRefreshSignal>, refresh_delay: Duration) -> Self {
        Self {
            in_flight: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashSet::new()),
            points_signal,
            refresh_delay,
        }
    }

    /// True while the task is completed locally but not yet confirmed.
    pub fn is_pending_optimistic(&self, task_id: i64) -> bool {
        self.pending.lock().unwrap().contains(&task_id)
    }

    pub async fn complete(
        &self,
        client: &dyn CoachClient,
        course_slot: &Mutex<Option<Course>>,
        overlay: &Mutex<RecentlyCompleted>,
        student_id: Option<i64>,
        task_id: i64,
    ) -> Result<CompletionOutcome, AppError> {
        // Fail fast before touching the tree: no actor id, no mutation.
        let student_id = student_id.ok_or(AppError::Unauthenticated)?;

        let (course_id, title, normalized_title, points) = {
            let slot = course_slot.lock().unwrap();
            let course = slot
                .as_ref()
                .ok_or_else(|| AppError::BadRequest("No course loaded".to_string()))?;
            let task = course
                .all_tasks()
                .find(|t| t.id == task_id)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown task id {}", task_id)))?;
            (
                course.id,
                task.title.clone(),
                task.normalized_title(),
                task.points,
            )
        };

        let key = (task_id, normalized_title);
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight, key) else {
            debug!("Dropping duplicate completion for task {} ({})", task_id, title);
            return Ok(CompletionOutcome::DuplicateInFlight);
        };

        // Optimistic patch: exact id match only, so a same-titled task in
        // another module is left alone. Aggregates follow immediately.
        // The prior status is kept so a failed reconciliation can restore
        // the task instead of leaving a rejected completion on screen.
        let mut prior = None;
        {
            let mut slot = course_slot.lock().unwrap();
            if let Some(course) = slot.as_mut() {
                if let Some(task) = course.task_by_id_mut(task_id) {
                    prior = Some((task.status, task.completion_date.clone()));
                    task.status = TaskStatus::Completed;
                    task.completion_date = Some(Utc::now().to_rfc3339());
                }
                course.recompute_totals();
            }
            self.pending.lock().unwrap().insert(task_id);
        }

        let result = client.mark_task_completed(student_id, &title, points).await;

        match result {
            Ok(ack) if ack.success => {
                self.pending.lock().unwrap().remove(&task_id);
                info!("Task {} ({}) confirmed completed", task_id, title);
                overlay.lock().unwrap().insert(&title);
                self.schedule_points_refresh();
                Ok(CompletionOutcome::Confirmed)
            }
            Ok(ack) => {
                // No explicit success means no success; discard the patch
                // by re-synthesizing from a fresh fetch.
                warn!(
                    "Completion of task {} not confirmed ({:?}), resyncing",
                    task_id, ack.message
                );
                self.revert(client, course_slot, overlay, course_id, task_id, prior)
                    .await
            }
            Err(e) => {
                warn!("Completion of task {} failed: {}, resyncing", task_id, e);
                self.revert(client, course_slot, overlay, course_id, task_id, prior)
                    .await
            }
        }
    }

    /// Unconfirmed completion: drop the optimistic patch by replacing the
    /// tree from a fresh fetch. When the re-fetch itself fails, the single
    /// patched task is restored to its prior state instead, so the tree
    /// never shows a rejected completion as confirmed. The task stays in
    /// the pending-optimistic set until either path has settled.
    async fn revert(
        &self,
        client: &dyn CoachClient,
        course_slot: &Mutex<Option<Course>>,
        overlay: &Mutex<RecentlyCompleted>,
        course_id: i64,
        task_id: i64,
        prior: Option<(TaskStatus, Option<String>)>,
    ) -> Result<CompletionOutcome, AppError> {
        let resynced = self.resync(client, course_slot, overlay, course_id).await;
        if let Err(e) = resynced {
            if let Some((status, completion_date)) = prior {
                let mut slot = course_slot.lock().unwrap();
                if let Some(course) = slot.as_mut() {
                    if let Some(task) = course.task_by_id_mut(task_id) {
                        task.status = status;
                        task.completion_date = completion_date;
                    }
                    course.recompute_totals();
                }
            }
            self.pending.lock().unwrap().remove(&task_id);
            return Err(e);
        }
        self.pending.lock().unwrap().remove(&task_id);
        Ok(CompletionOutcome::Reverted)
    }

    /// Replace the whole tree from a fresh fetch. Accepting the brief
    /// flash is safer than hand-rolling a partial rollback.
    async fn resync(
        &self,
        client: &dyn CoachClient,
        course_slot: &Mutex<Option<Course>>,
        overlay: &Mutex<RecentlyCompleted>,
        course_id: i64,
    ) -> Result<(), AppError> {
        let raw = client.fetch_course_detail(course_id).await?;
        let rebuilt = {
            let overlay = overlay.lock().unwrap();
            build_course(course_id, &raw, &overlay)
        };
        *course_slot.lock().unwrap() = Some(rebuilt);
        Ok(())
    }

    fn schedule_points_refresh(&self) {
        if self.refresh_delay.is_zero() {
            self.points_signal.bump();
            return;
        }
        let signal = self.points_signal.clone();
        let delay = self.refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            signal.bump();
        });
    }
}

/// Holds the in-flight key for one completion attempt; releases it on drop
/// so success, failure and early returns all clean up the same way.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<(i64, String)>>,
    key: (i64, String),
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(set: &'a Mutex<HashSet<(i64, String)>>, key: (i64, String)) -> Option<Self> {
        if !set.lock().unwrap().insert(key.clone()) {
            return None;
        }
        Some(Self { set, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.key);
    }
}
