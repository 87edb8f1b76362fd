pub mod api;
pub mod completion;
pub mod course_view;
pub mod error;
pub mod models;
pub mod overlay;
pub mod projection;
pub mod synthesis;

pub use api::{CoachClient, CoachConfig, CoachHttpClient, StaticCoachClient};
pub use completion::{CompletionCoordinator, CompletionOutcome, PointsRefreshSignal};
pub use course_view::CourseViewService;
pub use error::AppError;
pub use models::{Course, CourseSummary, Module, Task, TaskStatus};
pub use overlay::RecentlyCompleted;
pub use projection::TaskFilter;
