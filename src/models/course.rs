use serde::{Deserialize, Serialize};

use super::task::{Task, TaskStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub order: i64,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub version: i64,
    pub modules: Vec<Module>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub stuck_tasks: usize,
    pub total_points: i64,
    pub earned_points: i64,
}

impl Course {
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.modules.iter().flat_map(|m| m.tasks.iter())
    }

    pub fn task_by_id_mut(&mut self, task_id: i64) -> Option<&mut Task> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.tasks.iter_mut())
            .find(|t| t.id == task_id)
    }

    /// Recompute every aggregate from the task tree. Server-supplied
    /// summary counts are never trusted once the tree holds tasks, so this
    /// runs after every synthesis pass and after every optimistic patch.
    pub fn recompute_totals(&mut self) {
        let mut total = 0;
        let mut completed = 0;
        let mut pending = 0;
        let mut stuck = 0;
        let mut total_points = 0;
        let mut earned_points = 0;

        for task in self.modules.iter().flat_map(|m| m.tasks.iter()) {
            total += 1;
            total_points += task.points;
            match task.status {
                TaskStatus::Completed => {
                    completed += 1;
                    earned_points += task.points;
                }
                TaskStatus::Pending => pending += 1,
                TaskStatus::Stuck => stuck += 1,
            }
        }

        self.total_tasks = total;
        self.completed_tasks = completed;
        self.pending_tasks = pending;
        self.stuck_tasks = stuck;
        self.total_points = total_points;
        self.earned_points = earned_points;
    }
}

/// One row of the course listing screen. Counts here are server-supplied
/// summaries; the full tree is only built when a course is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
    pub version: i64,
    pub modules: i64,
    pub tasks: i64,
    pub archived: bool,
}
