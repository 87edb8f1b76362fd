use crate::models::{Course, Module, Task, TaskStatus};

/// Task filter tabs on the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Completed,
    Pending,
    Stuck,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Completed => task.status == TaskStatus::Completed,
            TaskFilter::Pending => task.status == TaskStatus::Pending,
            TaskFilter::Stuck => task.status == TaskStatus::Stuck,
        }
    }
}

/// Read-only view of the tasks matching a filter, in tree order.
pub fn filter_tasks(course: &Course, filter: TaskFilter) -> Vec<&Task> {
    course.all_tasks().filter(|t| filter.matches(t)).collect()
}

/// Completion percentage, rounded. An empty scope is 0, not an error, so
/// modules without tasks render a stable bar.
pub fn percent_complete(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

pub fn module_progress(module: &Module) -> u32 {
    let completed = module
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    percent_complete(completed, module.tasks.len())
}

pub fn course_progress(course: &Course) -> u32 {
    percent_complete(course.completed_tasks, course.total_tasks)
}
