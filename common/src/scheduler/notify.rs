// Scheduler error notification

use crate::config::AdminEmailConfig;
use crate::errors::TaskError;
use crate::models::TaskDefinition;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error::Error;

const SECTION_RULE: &str = "============================================";

/// A composed error message, ready to hand to a mail transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub recipients: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// Build the administrator report for a task failure.
///
/// Returns `None` when admin e-mail is disabled or no recipients are set.
pub fn compose_error_report(
    email: &AdminEmailConfig,
    task_name: &str,
    error: &TaskError,
    system_variables: &BTreeMap<String, String>,
) -> Option<ErrorReport> {
    if !email.enabled {
        return None;
    }
    let recipients = email.recipients.as_deref().filter(|r| !r.trim().is_empty())?;

    let mut body = String::new();
    body.push_str(&format!("\n\nTask\n{}\n{}\n", SECTION_RULE, task_name));
    body.push_str(&format!("\n\nError\n{}\n{}\n", SECTION_RULE, error));

    let mut source = error.source();
    while let Some(cause) = source {
        body.push_str(&format!("Caused by: {}\n", cause));
        source = cause.source();
    }

    body.push_str(&format!("\n\nSystem Variables\n{}\n", SECTION_RULE));
    for (key, value) in system_variables {
        body.push_str(&format!("{} = {}\n", key, value));
    }

    Some(ErrorReport {
        recipients: recipients.to_string(),
        sender: email.sender.clone(),
        subject: format!("{} : {}", email.subject, error.kind()),
        body,
    })
}

/// Variables describing the running process, attached to error reports
pub fn system_variables(platform_version: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("platform.version".to_string(), platform_version.to_string()),
        ("os.name".to_string(), std::env::consts::OS.to_string()),
        ("os.arch".to_string(), std::env::consts::ARCH.to_string()),
        (
            "scheduler.version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
    ])
}

/// Receives task failures from the scheduler engine
#[async_trait]
pub trait SchedulerErrorNotifier: Send + Sync {
    async fn notify(&self, task: &TaskDefinition, error: &TaskError) -> Result<()>;
}

/// Log-based notifier (default implementation)
///
/// Writes the composed report at ERROR level instead of mailing it.
pub struct LogErrorNotifier {
    email: AdminEmailConfig,
    system_variables: BTreeMap<String, String>,
}

impl LogErrorNotifier {
    pub fn new(email: AdminEmailConfig, platform_version: &str) -> Self {
        Self {
            email,
            system_variables: system_variables(platform_version),
        }
    }
}

#[async_trait]
impl SchedulerErrorNotifier for LogErrorNotifier {
    #[tracing::instrument(skip_all, fields(task_name = %task.name))]
    async fn notify(&self, task: &TaskDefinition, error: &TaskError) -> Result<()> {
        match compose_error_report(&self.email, &task.name, error, &self.system_variables) {
            Some(report) => {
                tracing::error!(
                    recipients = %report.recipients,
                    sender = %report.sender,
                    subject = %report.subject,
                    body = %report.body,
                    "Scheduler error report"
                );
            }
            None => {
                tracing::debug!("Admin e-mail disabled, scheduler error report not composed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_email() -> AdminEmailConfig {
        AdminEmailConfig {
            enabled: true,
            recipients: Some("ops@example.org,admin@example.org".to_string()),
            sender: "scheduler@example.org".to_string(),
            subject: "Scheduler error".to_string(),
        }
    }

    fn failure() -> TaskError {
        TaskError::ExecutionFailed {
            task: "nightly".to_string(),
            reason: "disk full".to_string(),
        }
    }

    #[test]
    fn test_report_not_composed_when_disabled() {
        let email = AdminEmailConfig::default();
        assert!(compose_error_report(&email, "nightly", &failure(), &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_report_not_composed_without_recipients() {
        let mut email = enabled_email();
        email.recipients = Some("  ".to_string());
        assert!(compose_error_report(&email, "nightly", &failure(), &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_report_contents() {
        let variables = BTreeMap::from([
            ("b.key".to_string(), "2".to_string()),
            ("a.key".to_string(), "1".to_string()),
        ]);
        let report = compose_error_report(&enabled_email(), "nightly", &failure(), &variables).unwrap();

        assert_eq!(report.subject, "Scheduler error : ExecutionFailed");
        assert_eq!(report.recipients, "ops@example.org,admin@example.org");
        assert!(report.body.contains("disk full"));
        let a = report.body.find("a.key = 1").unwrap();
        let b = report.body.find("b.key = 2").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_report_includes_cause_chain() {
        let error = TaskError::from(anyhow::anyhow!("connection reset").context("export failed"));
        let report = compose_error_report(&enabled_email(), "export", &error, &BTreeMap::new()).unwrap();
        assert!(report.body.contains("export failed"));
        assert!(report.body.contains("Caused by: connection reset"));
    }

    #[test]
    fn test_system_variables() {
        let variables = system_variables("2.1.0");
        assert_eq!(variables.get("platform.version").map(String::as_str), Some("2.1.0"));
        assert!(variables.contains_key("os.name"));
    }

    #[tokio::test]
    async fn test_log_error_notifier() {
        let notifier = LogErrorNotifier::new(enabled_email(), "2.1.0");
        let task = TaskDefinition::new(1, "nightly", None, "log_message");
        assert!(notifier.notify(&task, &failure()).await.is_ok());
    }
}
