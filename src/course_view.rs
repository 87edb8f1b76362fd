use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::api::CoachClient;
use crate::completion::{CompletionCoordinator, CompletionOutcome, PointsRefreshSignal};
use crate::error::AppError;
use crate::models::{Course, CourseSummary};
use crate::overlay::RecentlyCompleted;
use crate::synthesis::{build_course, normalize_course_summary};

/// How long a confirmed completion waits before poking the points view,
/// covering backend ledger propagation.
const POINTS_REFRESH_DELAY: Duration = Duration::from_secs(2);

/// Owns the course tree for one detail view and everything that mutates
/// it: the overlay, the completion coordinator and the refresh signal.
///
/// All methods take `&self`; callers share the service behind an `Arc` and
/// completions for different tasks may overlap freely. Locks are never
/// held across an await.
pub struct CourseViewService {
    client: Arc<dyn CoachClient>,
    course: Mutex<Option<Course>>,
    overlay: Mutex<RecentlyCompleted>,
    coordinator: CompletionCoordinator,
    points_signal: Arc<PointsRefreshSignal>,
    student_id: Option<i64>,
}

impl CourseViewService {
    pub fn new(
        client: Arc<dyn CoachClient>,
        overlay: RecentlyCompleted,
        student_id: Option<i64>,
    ) -> Self {
        Self::with_refresh_delay(client, overlay, student_id, POINTS_REFRESH_DELAY)
    }

    pub fn with_refresh_delay(
        client: Arc<dyn CoachClient>,
        overlay: RecentlyCompleted,
        student_id: Option<i64>,
        refresh_delay: Duration,
    ) -> Self {
        let points_signal = Arc::new(PointsRefreshSignal::default());
        Self {
            client,
            course: Mutex::new(None),
            overlay: Mutex::new(overlay),
            coordinator: CompletionCoordinator::new(points_signal.clone(), refresh_delay),
            points_signal,
            student_id,
        }
    }

    /// Fetch and synthesize one course. On a fetch failure the previous
    /// tree (if any) is kept untouched and the classified error returned,
    /// so the caller can keep rendering and offer a retry.
    pub async fn load_course(&self, course_id: i64) -> Result<(), AppError> {
        let raw = match self.client.fetch_course_detail(course_id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to load course {}: {}", course_id, e);
                return Err(e);
            }
        };

        let course = {
            let overlay = self.overlay.lock().unwrap();
            build_course(course_id, &raw, &overlay)
        };
        info!(
            "Synthesized course {} ({} modules, {} tasks)",
            course.id,
            course.modules.len(),
            course.total_tasks
        );
        *self.course.lock().unwrap() = Some(course);
        Ok(())
    }

    /// Current tree, cloned. `None` until the first successful load.
    pub fn snapshot(&self) -> Option<Course> {
        self.course.lock().unwrap().clone()
    }

    pub async fn complete_task(&self, task_id: i64) -> Result<CompletionOutcome, AppError> {
        self.coordinator
            .complete(
                self.client.as_ref(),
                &self.course,
                &self.overlay,
                self.student_id,
                task_id,
            )
            .await
    }

    pub fn is_pending_optimistic(&self, task_id: i64) -> bool {
        self.coordinator.is_pending_optimistic(task_id)
    }

    /// Epoch of the shared points-refresh signal; the points view reloads
    /// when this moves.
    pub fn points_epoch(&self) -> u64 {
        self.points_signal.epoch()
    }

    pub fn overlay_contains(&self, title: &str) -> bool {
        self.overlay.lock().unwrap().contains(title)
    }

    /// Listing screen rows, normalized but otherwise passed through.
    pub async fn load_course_summaries(&self) -> Result<Vec<CourseSummary>, AppError> {
        let rows = self.client.fetch_my_courses().await?;
        Ok(rows.iter().map(normalize_course_summary).collect())
    }
}
