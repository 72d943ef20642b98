// Task abstraction and task class registry

use crate::config::SchedulerCredentials;
use crate::errors::{ScheduleError, TaskError};
use crate::models::TaskDefinition;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Everything a task can see while it runs
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub execution_id: Uuid,
    pub definition: TaskDefinition,
    pub credentials: SchedulerCredentials,
}

impl TaskContext {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.definition.property(key)
    }

    pub fn require_property(&self, key: &str) -> Result<&str, TaskError> {
        self.property(key)
            .ok_or_else(|| TaskError::MissingProperty(self.definition.name.clone(), key.to_string()))
    }
}

/// Task trait implemented by everything the scheduler can run
#[async_trait]
pub trait Task: Send + Sync {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError>;
}

/// Creates a task instance for a definition
pub type TaskFactory = Arc<dyn Fn(&TaskDefinition) -> Arc<dyn Task> + Send + Sync>;

/// Task implementations keyed by task class name
#[derive(Clone, Default)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tasks
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(LogMessageTask::TASK_CLASS, |_| {
            Arc::new(LogMessageTask) as Arc<dyn Task>
        });
        registry
    }

    pub fn register<F>(&mut self, task_class: impl Into<String>, factory: F)
    where
        F: Fn(&TaskDefinition) -> Arc<dyn Task> + Send + Sync + 'static,
    {
        self.factories.insert(task_class.into(), Arc::new(factory));
    }

    /// Instantiate the task class named by `definition`
    pub fn create(&self, definition: &TaskDefinition) -> Result<Arc<dyn Task>, ScheduleError> {
        if definition.task_class.is_empty() {
            return Err(ScheduleError::MissingTaskClass(definition.name.clone()));
        }

        self.factories
            .get(&definition.task_class)
            .map(|factory| factory(definition))
            .ok_or_else(|| ScheduleError::UnknownTaskClass {
                task_name: definition.name.clone(),
                task_class: definition.task_class.clone(),
            })
    }
}

/// Logs the `message` property of its definition
pub struct LogMessageTask;

impl LogMessageTask {
    pub const TASK_CLASS: &'static str = "log_message";
}

#[async_trait]
impl Task for LogMessageTask {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let message = ctx.require_property("message")?;
        info!(
            execution_id = %ctx.execution_id,
            task_name = %ctx.definition.name,
            run_as = %ctx.credentials.username,
            "{}",
            message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(definition: TaskDefinition) -> TaskContext {
        TaskContext {
            execution_id: Uuid::new_v4(),
            definition,
            credentials: SchedulerCredentials {
                username: "admin".to_string(),
                password: None,
            },
        }
    }

    #[test]
    fn test_create_builtin_task() {
        let registry = TaskRegistry::with_builtin();
        let definition = TaskDefinition::new(1, "hello", None, LogMessageTask::TASK_CLASS);
        assert!(registry.create(&definition).is_ok());
    }

    #[test]
    fn test_create_unknown_task_class() {
        let registry = TaskRegistry::with_builtin();
        let definition = TaskDefinition::new(1, "hello", None, "no_such_task");
        assert!(matches!(
            registry.create(&definition),
            Err(ScheduleError::UnknownTaskClass { .. })
        ));
    }

    #[test]
    fn test_create_without_task_class() {
        let registry = TaskRegistry::with_builtin();
        let definition = TaskDefinition::new(1, "hello", None, "");
        assert!(matches!(
            registry.create(&definition),
            Err(ScheduleError::MissingTaskClass(_))
        ));
    }

    #[tokio::test]
    async fn test_log_message_task_requires_message() {
        let definition = TaskDefinition::new(1, "hello", None, LogMessageTask::TASK_CLASS);
        let result = LogMessageTask.execute(&context(definition)).await;
        assert!(matches!(result, Err(TaskError::MissingProperty(_, _))));
    }

    #[tokio::test]
    async fn test_log_message_task_runs() {
        let mut definition = TaskDefinition::new(1, "hello", None, LogMessageTask::TASK_CLASS);
        definition.set_property("message", "hello world");
        assert!(LogMessageTask.execute(&context(definition)).await.is_ok());
    }
}
