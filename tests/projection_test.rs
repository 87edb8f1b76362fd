use serde_json::json;

use coach_client::models::TaskStatus;
use coach_client::overlay::RecentlyCompleted;
use coach_client::projection::{
    TaskFilter, course_progress, filter_tasks, module_progress, percent_complete,
};
use coach_client::synthesis::build_course;

fn sample_course() -> coach_client::models::Course {
    let raw = json!({
        "modules": [
            {
                "id": 1,
                "title": "M1",
                "tasks": [
                    { "id": 1, "title": "A", "status": "completed", "points": 10 },
                    { "id": 2, "title": "B", "status": "pending", "points": 10 },
                    { "id": 3, "title": "C", "status": "stuck", "points": 10 }
                ]
            },
            { "id": 2, "title": "Empty", "tasks": [] }
        ]
    });
    build_course(1, &raw, &RecentlyCompleted::ephemeral())
}

#[test]
fn filters_project_by_status() {
    let course = sample_course();

    assert_eq!(filter_tasks(&course, TaskFilter::All).len(), 3);
    let completed = filter_tasks(&course, TaskFilter::Completed);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, TaskStatus::Completed);
    assert_eq!(filter_tasks(&course, TaskFilter::Pending).len(), 1);
    assert_eq!(filter_tasks(&course, TaskFilter::Stuck).len(), 1);
}

#[test]
fn progress_percentages_round_and_tolerate_empty_scope() {
    assert_eq!(percent_complete(0, 0), 0);
    assert_eq!(percent_complete(1, 3), 33);
    assert_eq!(percent_complete(2, 3), 67);
    assert_eq!(percent_complete(3, 3), 100);

    let course = sample_course();
    assert_eq!(module_progress(&course.modules[0]), 33);
    assert_eq!(module_progress(&course.modules[1]), 0);
    assert_eq!(course_progress(&course), 33);
}

#[test]
fn filtering_is_side_effect_free() {
    let course = sample_course();
    let before = serde_json::to_string(&course).expect("serialize");
    let _ = filter_tasks(&course, TaskFilter::Completed);
    let _ = module_progress(&course.modules[0]);
    let after = serde_json::to_string(&course).expect("serialize");
    assert_eq!(before, after);
}
