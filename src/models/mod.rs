pub mod course;
pub mod task;

pub use course::{Course, CourseSummary, Module};
pub use task::{Task, TaskStatus};
