// Error handling framework for the platform core

use thiserror::Error;

/// Task definition and scheduling errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Task definition '{0}' has no task class")]
    MissingTaskClass(String),

    #[error("Unknown task class '{task_class}' for task '{task_name}'")]
    UnknownTaskClass {
        task_name: String,
        task_class: String,
    },

    #[error("Task not scheduled: {0}")]
    TaskNotScheduled(String),
}

/// Failure raised by a task while it runs
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task '{task}' failed: {reason}")]
    ExecutionFailed { task: String, reason: String },

    #[error("Task '{0}' is missing required property '{1}'")]
    MissingProperty(String, String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Short machine-friendly name used in notification subjects and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::ExecutionFailed { .. } => "ExecutionFailed",
            TaskError::MissingProperty(..) => "MissingProperty",
            TaskError::Other(_) => "Other",
        }
    }
}

/// Custom datatype lookup errors
///
/// Callers of `DatatypeRegistry::get_datatype` only ever observe
/// `ResolutionFailed`; the other variants appear as its source.
#[derive(Error, Debug)]
pub enum DatatypeError {
    #[error("Can't find datatype: {0}")]
    NotFound(String),

    #[error("Invalid datatype configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid datatype value: {0}")]
    InvalidValue(String),

    #[error(
        "Error loading {class_name} and configuring it with {}",
        .config.as_deref().unwrap_or("<none>")
    )]
    ResolutionFailed {
        class_name: String,
        config: Option<String>,
        #[source]
        source: Box<DatatypeError>,
    },
}

/// Module loading errors
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error(
        "Module '{module_id}' requires platform version '{required}' but the running version is '{current}'"
    )]
    IncompatiblePlatformVersion {
        module_id: String,
        required: String,
        current: String,
    },

    #[error("Module already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Module not registered: {0}")]
    NotRegistered(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_task_class_display() {
        let err = ScheduleError::UnknownTaskClass {
            task_name: "nightly".to_string(),
            task_class: "NoSuchTask".to_string(),
        };
        assert!(err.to_string().contains("NoSuchTask"));
        assert!(err.to_string().contains("nightly"));
    }

    #[test]
    fn test_task_error_kind() {
        let err = TaskError::ExecutionFailed {
            task: "t".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.kind(), "ExecutionFailed");
        assert_eq!(TaskError::from(anyhow::anyhow!("x")).kind(), "Other");
    }

    #[test]
    fn test_datatype_resolution_failed_keeps_source() {
        let err = DatatypeError::ResolutionFailed {
            class_name: "DateDatatype".to_string(),
            config: None,
            source: Box::new(DatatypeError::NotFound("DateDatatype".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Error loading DateDatatype and configuring it with <none>"
        );
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Can't find datatype: DateDatatype"));
    }

    #[test]
    fn test_module_error_display() {
        let err = ModuleError::IncompatiblePlatformVersion {
            module_id: "reporting".to_string(),
            required: "2.0.*".to_string(),
            current: "1.9.7".to_string(),
        };
        assert!(err.to_string().contains("2.0.*"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidFieldValue {
            field: "scheduler.poll_interval_seconds".to_string(),
            reason: "must be greater than 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid field value for scheduler.poll_interval_seconds: must be greater than 0"
        );
    }
}
