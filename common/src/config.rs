// Configuration management with layered configuration (file, env)

use crate::errors::ValidationError;
use crate::models::{ModuleDescriptor, TaskDefinition};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Deprecated runtime property overriding the scheduler username
pub const SCHEDULER_USERNAME_PROPERTY: &str = "scheduler.username";

/// Deprecated runtime property overriding the scheduler password
pub const SCHEDULER_PASSWORD_PROPERTY: &str = "scheduler.password";

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub platform: PlatformConfig,
    pub scheduler: SchedulerSettings,
    pub observability: ObservabilityConfig,
    pub modules: Vec<ModuleDescriptor>,
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Version of the running platform, checked against module requirements
    pub version: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub poll_interval_seconds: u64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub admin_email: AdminEmailConfig,
}

impl SchedulerSettings {
    pub fn credentials(&self) -> SchedulerCredentials {
        SchedulerCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            username: "admin".to_string(),
            password: None,
            admin_email: AdminEmailConfig::default(),
        }
    }
}

/// Where scheduler failures are reported
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminEmailConfig {
    pub enabled: bool,
    /// Comma separated addresses
    pub recipients: Option<String>,
    pub sender: String,
    pub subject: String,
}

impl Default for AdminEmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recipients: None,
            sender: "scheduler@localhost".to_string(),
            subject: "Scheduler error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: None,
        }
    }
}

/// Account the scheduler runs its tasks as
#[derive(Clone, PartialEq, Eq)]
pub struct SchedulerCredentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for SchedulerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Apply legacy runtime properties on top of the loaded settings.
    ///
    /// Returns the names of the properties that were applied.
    pub fn apply_runtime_properties(&mut self, properties: &HashMap<String, String>) -> Vec<&'static str> {
        let mut applied = Vec::new();

        if let Some(username) = properties.get(SCHEDULER_USERNAME_PROPERTY) {
            self.scheduler.username = username.clone();
            tracing::warn!(
                property = SCHEDULER_USERNAME_PROPERTY,
                "Deprecated runtime property, set scheduler.username in configuration instead"
            );
            applied.push(SCHEDULER_USERNAME_PROPERTY);
        }

        if let Some(password) = properties.get(SCHEDULER_PASSWORD_PROPERTY) {
            self.scheduler.password = Some(password.clone());
            tracing::warn!(
                property = SCHEDULER_PASSWORD_PROPERTY,
                "Deprecated runtime property, set scheduler.password in configuration instead"
            );
            applied.push(SCHEDULER_PASSWORD_PROPERTY);
        }

        applied
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.platform.version.trim().is_empty() {
            return Err(ValidationError::MissingField("platform.version".to_string()));
        }

        if self.scheduler.poll_interval_seconds == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "scheduler.poll_interval_seconds".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.scheduler.username.is_empty() {
            return Err(ValidationError::MissingField("scheduler.username".to_string()));
        }

        let email = &self.scheduler.admin_email;
        if email.enabled && email.recipients.as_deref().map_or(true, str::is_empty) {
            return Err(ValidationError::MissingField(
                "scheduler.admin_email.recipients".to_string(),
            ));
        }

        for task in &self.tasks {
            if task.name.is_empty() {
                return Err(ValidationError::MissingField("tasks.name".to_string()));
            }
            if task.task_class.is_empty() {
                return Err(ValidationError::InvalidFieldValue {
                    field: format!("tasks.{}.task_class", task.name),
                    reason: "cannot be empty".to_string(),
                });
            }
        }

        for module in &self.modules {
            if module.module_id.is_empty() {
                return Err(ValidationError::MissingField("modules.module_id".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_zero_poll_interval() {
        let mut settings = Settings::default();
        settings.scheduler.poll_interval_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_email_without_recipients() {
        let mut settings = Settings::default();
        settings.scheduler.admin_email.enabled = true;
        assert!(settings.validate().is_err());
        settings.scheduler.admin_email.recipients = Some("ops@example.org".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_task_without_class() {
        let mut settings = Settings::default();
        settings
            .tasks
            .push(TaskDefinition::new(1, "broken", None, ""));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_runtime_properties_override_credentials() {
        let mut settings = Settings::default();
        let properties = HashMap::from([
            (SCHEDULER_USERNAME_PROPERTY.to_string(), "daemon".to_string()),
            (SCHEDULER_PASSWORD_PROPERTY.to_string(), "secret".to_string()),
        ]);

        let applied = settings.apply_runtime_properties(&properties);

        assert_eq!(applied.len(), 2);
        let credentials = settings.scheduler.credentials();
        assert_eq!(credentials.username, "daemon");
        assert_eq!(credentials.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_runtime_properties_absent_leave_settings_untouched() {
        let mut settings = Settings::default();
        let applied = settings.apply_runtime_properties(&HashMap::new());
        assert!(applied.is_empty());
        assert_eq!(settings.scheduler.username, "admin");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = SchedulerCredentials {
            username: "admin".to_string(),
            password: Some("hunter2".to_string()),
        };
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }
}
