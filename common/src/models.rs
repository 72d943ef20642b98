use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Task Models
// ============================================================================

/// TaskDefinition describes a task the scheduler can run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default)]
    pub id: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name the task implementation is registered under
    pub task_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution_time: Option<DateTime<Utc>>,
    /// Seconds between runs; `0` makes the task one-shot
    #[serde(default)]
    pub repeat_interval: u64,
    #[serde(default)]
    pub start_on_startup: bool,
    /// Display pattern for the start time, kept for the administration UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_pattern: Option<String>,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl TaskDefinition {
    /// Create a definition starting now, not yet started
    pub fn new(
        id: i32,
        name: impl Into<String>,
        description: Option<String>,
        task_class: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            name,
            description,
            task_class: task_class.into(),
            start_time: Some(Utc::now()),
            last_execution_time: None,
            repeat_interval: 0,
            start_on_startup: false,
            start_time_pattern: None,
            started: false,
            properties: HashMap::new(),
        }
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_repeat_interval(mut self, seconds: u64) -> Self {
        self.repeat_interval = seconds;
        self
    }

    pub fn with_start_on_startup(mut self, start_on_startup: bool) -> Self {
        self.start_on_startup = start_on_startup;
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn is_one_shot(&self) -> bool {
        self.repeat_interval == 0
    }
}

impl fmt::Display for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[TaskDefinition id={} name={} class={} startTime={} repeatInterval={}]",
            self.id,
            self.name,
            self.task_class,
            self.start_time
                .map_or_else(|| "none".to_string(), |t| t.to_rfc3339()),
            self.repeat_interval
        )
    }
}

// ============================================================================
// Module Models
// ============================================================================

/// FilterMapping maps a module filter to url patterns and servlet names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMapping {
    pub filter_name: String,
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub servlet_names: Vec<String>,
}

impl FilterMapping {
    pub fn new(filter_name: impl Into<String>) -> Self {
        Self {
            filter_name: filter_name.into(),
            ..Default::default()
        }
    }

    pub fn add_url_pattern(&mut self, url_pattern: impl Into<String>) {
        self.url_patterns.push(url_pattern.into());
    }

    pub fn add_servlet_name(&mut self, servlet_name: impl Into<String>) {
        self.servlet_names.push(servlet_name.into());
    }
}

/// ModuleDescriptor is the already-parsed configuration of an optional module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub module_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Range expression of platform versions this module runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_platform_version: Option<String>,
    #[serde(default)]
    pub filter_mappings: Vec<FilterMapping>,
}

impl ModuleDescriptor {
    pub fn new(module_id: impl Into<String>) -> Self {
        let module_id = module_id.into();
        Self {
            name: module_id.clone(),
            module_id,
            version: String::new(),
            require_platform_version: None,
            filter_mappings: Vec::new(),
        }
    }

    pub fn with_required_platform_version(mut self, range: impl Into<String>) -> Self {
        self.require_platform_version = Some(range.into());
        self
    }

    pub fn with_filter_mapping(mut self, mapping: FilterMapping) -> Self {
        self.filter_mappings.push(mapping);
        self
    }
}
