use serde_json::Value;
use tracing::debug;

use crate::models::{Course, CourseSummary, Module, Task, TaskStatus};
use crate::overlay::RecentlyCompleted;

// The backend has shipped several payload shapes over its life. Every
// accepted spelling for a field lives in one ordered table here so version
// drift stays out of the rest of the crate; first non-null match wins.
const MODULE_LIST_KEYS: &[&str] = &["modules", "course_modules"];
const MODULE_ID_KEYS: &[&str] = &["id", "module_id", "moduleId"];
const TASK_ID_KEYS: &[&str] = &["id", "task_id", "taskId"];
const TASK_TITLE_KEYS: &[&str] = &["title", "name", "task_title"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc"];
const VIDEO_LINK_KEYS: &[&str] = &["video_links", "videoLinks", "content_links", "contentLinks"];
const DUE_DATE_KEYS: &[&str] = &["due_date", "dueDate"];
const COMPLETION_DATE_KEYS: &[&str] = &["completion_date", "completionDate", "completed_at"];
const POINTS_KEYS: &[&str] = &["points", "point_value", "task_points"];
const TASK_MODULE_REF_KEYS: &[&str] = &[
    "module_id",
    "moduleId",
    "mod_id",
    "module",
    "moduleID",
    "version_module_id",
];

/// Title given to the module synthesized when a payload carries tasks that
/// reference no module at all.
pub const FLAT_TASKS_MODULE_TITLE: &str = "Course Tasks";

/// Title of the placeholder module synthesized for an empty payload so the
/// caller always gets a renderable tree.
pub const PLACEHOLDER_MODULE_TITLE: &str = "Course Content";

fn first_of<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

/// Integers arrive as JSON numbers from some backend versions and as
/// decimal strings from others.
fn int_of(raw: &Value, keys: &[&str]) -> Option<i64> {
    first_of(raw, keys).and_then(lenient_i64)
}

fn lenient_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn string_of(raw: &Value, keys: &[&str]) -> Option<String> {
    first_of(raw, keys).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// JS-style truthiness for the `is_completed` flag, which has been a bool,
/// a 0/1 number, and a "true"/"false" string in different backend versions.
fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("false") && s != "0"
        }
        Value::Null => false,
        _ => true,
    }
}

/// Module reference carried by a task, resolved through the ordered alias
/// table. `None` means the task carries no reference under any spelling.
pub fn resolve_module_ref(raw_task: &Value) -> Option<i64> {
    int_of(raw_task, TASK_MODULE_REF_KEYS)
}

fn normalize_status(raw_task: &Value) -> TaskStatus {
    let status = string_of(raw_task, &["status"])
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default();
    if status == "completed" || raw_task.get("is_completed").map(truthy).unwrap_or(false) {
        TaskStatus::Completed
    } else if status == "stuck" || status == "upcoming" {
        TaskStatus::Stuck
    } else {
        TaskStatus::Pending
    }
}

/// Normalize one task-like object. `fallback_module_id` is the enclosing
/// module when the task came nested; `fallback_task_id` is a synthetic id
/// for payloads that key tasks by title only.
pub fn normalize_task(raw_task: &Value, fallback_module_id: i64, fallback_task_id: i64) -> Task {
    let video_links = first_of(raw_task, VIDEO_LINK_KEYS)
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Task {
        id: int_of(raw_task, TASK_ID_KEYS).unwrap_or(fallback_task_id),
        title: string_of(raw_task, TASK_TITLE_KEYS).unwrap_or_else(|| "Task".to_string()),
        description: string_of(raw_task, DESCRIPTION_KEYS).unwrap_or_default(),
        video_links,
        due_date: string_of(raw_task, DUE_DATE_KEYS),
        completion_date: string_of(raw_task, COMPLETION_DATE_KEYS),
        status: normalize_status(raw_task),
        points: int_of(raw_task, POINTS_KEYS).unwrap_or(0),
        module_id: resolve_module_ref(raw_task).unwrap_or(fallback_module_id),
    }
}

fn normalize_module(raw_module: &Value, fallback_id: i64, position: i64) -> Module {
    let id = int_of(raw_module, MODULE_ID_KEYS).unwrap_or(fallback_id);
    let tasks = raw_module
        .get("tasks")
        .and_then(Value::as_array)
        .map(|raw_tasks| {
            raw_tasks
                .iter()
                .enumerate()
                .map(|(i, t)| normalize_task(t, id, synthetic_task_id(id, i)))
                .collect()
        })
        .unwrap_or_default();

    Module {
        id,
        title: string_of(raw_module, &["title", "name"]).unwrap_or_else(|| "Module".to_string()),
        description: string_of(raw_module, DESCRIPTION_KEYS).unwrap_or_default(),
        order: int_of(raw_module, &["order", "position"]).unwrap_or(position),
        tasks,
    }
}

// Synthetic ids are negative so they can never collide with server-issued
// ones, and stable per (module, position) so re-synthesis is deterministic.
// Saturating arithmetic keeps this total even for snowflake-scale module
// ids (including i64::MIN, where `abs` alone would overflow).
fn synthetic_task_id(module_id: i64, position: usize) -> i64 {
    let base = module_id
        .unsigned_abs()
        .saturating_mul(1000)
        .saturating_add(position as u64 + 1)
        .min(i64::MAX as u64);
    -(base as i64)
}

/// Build the normalized Course tree from one raw course payload.
///
/// Total over its input domain: any JSON value in, a renderable Course out.
/// Missing fields default, unknown shapes collapse to the placeholder
/// module, and the overlay is applied last so confirmed completions never
/// regress while the backend catches up.
pub fn build_course(course_id: i64, raw: &Value, overlay: &RecentlyCompleted) -> Course {
    let mut modules: Vec<Module> = first_of(raw, MODULE_LIST_KEYS)
        .and_then(Value::as_array)
        .map(|raw_modules| {
            raw_modules
                .iter()
                .enumerate()
                .map(|(i, m)| normalize_module(m, -(i as i64 + 1), i as i64))
                .collect()
        })
        .unwrap_or_default();

    attach_flat_tasks(raw, &mut modules);

    if modules.is_empty() {
        debug!("Course {} payload had no modules, synthesizing placeholder", course_id);
        modules.push(Module {
            id: 0,
            title: PLACEHOLDER_MODULE_TITLE.to_string(),
            description: String::new(),
            order: 0,
            tasks: Vec::new(),
        });
    }

    let mut course = Course {
        id: int_of(raw, &["id", "course_id", "courseId"]).unwrap_or(course_id),
        title: string_of(raw, &["title", "name"]).unwrap_or_else(|| "Course".to_string()),
        version: int_of(raw, &["version"]).unwrap_or(1),
        modules,
        total_tasks: 0,
        completed_tasks: 0,
        pending_tasks: 0,
        stuck_tasks: 0,
        total_points: 0,
        earned_points: 0,
    };

    for task in course.modules.iter_mut().flat_map(|m| m.tasks.iter_mut()) {
        if task.status != TaskStatus::Completed && overlay.contains(&task.title) {
            task.status = TaskStatus::Completed;
        }
    }

    if course.modules.iter().any(|m| !m.tasks.is_empty()) {
        course.recompute_totals();
    } else {
        // Nothing to count locally; the server summary is the only signal.
        // Its counts are clamped against the total, with pending as the
        // remainder, so completed + pending + stuck == total holds no
        // matter how inconsistent the summary fields are.
        let total = int_of(raw, &["total_tasks", "totalTasks"]).unwrap_or(0).max(0) as usize;
        let completed = (int_of(raw, &["completed_tasks", "completedTasks"]).unwrap_or(0).max(0)
            as usize)
            .min(total);
        let stuck = (int_of(raw, &["stuck_tasks", "stuckTasks"]).unwrap_or(0).max(0) as usize)
            .min(total - completed);
        course.total_tasks = total;
        course.completed_tasks = completed;
        course.stuck_tasks = stuck;
        course.pending_tasks = total - completed - stuck;
        course.total_points = int_of(raw, &["total_points", "totalPoints"]).unwrap_or(0);
        course.earned_points = int_of(raw, &["earned_points", "earnedPoints"]).unwrap_or(0);
    }

    course
}

/// Some backend variants emit a flat top-level `tasks` array alongside (or
/// instead of) nested module tasks. Attach each to the module its resolved
/// reference names, falling back to the first module for dangling
/// references. When no task references a module at all, or there is no
/// module to fall back to, they all land in a synthesized holding module.
fn attach_flat_tasks(raw: &Value, modules: &mut Vec<Module>) {
    let Some(flat) = raw.get("tasks").and_then(Value::as_array) else {
        return;
    };
    if flat.is_empty() {
        return;
    }

    let any_reference = flat.iter().any(|t| resolve_module_ref(t).is_some());

    if modules.is_empty() || !any_reference {
        let holding_id = modules.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let tasks = flat
            .iter()
            .enumerate()
            .map(|(i, t)| normalize_task(t, holding_id, synthetic_task_id(holding_id, i)))
            .collect();
        modules.push(Module {
            id: holding_id,
            title: FLAT_TASKS_MODULE_TITLE.to_string(),
            description: String::new(),
            order: modules.len() as i64,
            tasks,
        });
        return;
    }

    let known_ids: Vec<i64> = modules.iter().map(|m| m.id).collect();
    let first_id = known_ids[0];
    for (i, raw_task) in flat.iter().enumerate() {
        let target = match resolve_module_ref(raw_task) {
            Some(r) if known_ids.contains(&r) => r,
            _ => first_id,
        };
        let task = normalize_task(raw_task, target, synthetic_task_id(target, i));
        if let Some(module) = modules.iter_mut().find(|m| m.id == target) {
            module.tasks.push(task);
        }
    }
}

/// Normalize one row of the course-listing response. Counts stay as the
/// server reported them; the detail view recomputes its own.
pub fn normalize_course_summary(raw: &Value) -> CourseSummary {
    CourseSummary {
        id: int_of(raw, &["id", "course_id", "courseId"]).unwrap_or(0),
        title: string_of(raw, &["title", "name"]).unwrap_or_else(|| "Course".to_string()),
        version: int_of(raw, &["version"]).unwrap_or(1),
        modules: int_of(raw, &["modules", "modules_count"]).unwrap_or(0),
        tasks: int_of(raw, &["tasks", "tasks_count"]).unwrap_or(0),
        archived: string_of(raw, &["status"]).as_deref() == Some("Archived"),
    }
}
