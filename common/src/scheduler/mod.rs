// Scheduler module for task registration, timing and error reporting

pub mod engine;
pub mod notify;
pub mod task;

pub use engine::{Scheduler, SchedulerConfig, SchedulerEngine};
pub use notify::{LogErrorNotifier, SchedulerErrorNotifier};
pub use task::{Task, TaskContext, TaskRegistry};
