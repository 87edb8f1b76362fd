use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coach_client::api::{CoachConfig, CoachHttpClient};
use coach_client::course_view::CourseViewService;
use coach_client::overlay::RecentlyCompleted;
use coach_client::projection;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "coach_client=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let course_id: i64 = std::env::args()
        .nth(1)
        .ok_or("usage: coach-client <course-id>")?
        .parse()?;

    let config = CoachConfig::new_from_env()?;
    let student_id = config.student_id;
    let client = Arc::new(CoachHttpClient::new(config)?);

    let overlay_path = std::env::var("COACH_OVERLAY_PATH")
        .unwrap_or_else(|_| "recently_completed.json".to_string());
    let overlay = RecentlyCompleted::load(&overlay_path);

    let service = CourseViewService::new(client, overlay, student_id);
    service.load_course(course_id).await?;

    let course = service.snapshot().ok_or("course did not load")?;
    println!("{} (v{})", course.title, course.version);
    println!(
        "{}/{} tasks completed ({}%), {} pts of {}",
        course.completed_tasks,
        course.total_tasks,
        projection::course_progress(&course),
        course.earned_points,
        course.total_points
    );
    for module in &course.modules {
        println!(
            "  [{:>3}%] {} ({} tasks)",
            projection::module_progress(module),
            module.title,
            module.tasks.len()
        );
    }

    Ok(())
}
