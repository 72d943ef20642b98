// Pluggable custom datatype lookup
//
// Attribute values carry the class name of their datatype plus an optional
// configuration string. The registry resolves that pair into a configured
// datatype instance.

use crate::errors::DatatypeError;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub const FREE_TEXT_DATATYPE: &str = "FreeTextDatatype";
pub const DATE_DATATYPE: &str = "DateDatatype";
pub const BOOLEAN_DATATYPE: &str = "BooleanDatatype";

/// Datatype used when a descriptor's own datatype cannot be resolved
pub const DEFAULT_CUSTOM_DATATYPE: &str = FREE_TEXT_DATATYPE;

/// A configured datatype
pub trait CustomDatatype: Send + Sync + std::fmt::Debug {
    fn class_name(&self) -> &str;

    /// Check that `value` is a valid serialized value of this datatype
    fn validate(&self, value: &str) -> Result<(), DatatypeError>;
}

/// Anything that stores a datatype reference, such as an attribute type
pub trait CustomValueDescriptor {
    fn datatype_classname(&self) -> &str;

    fn datatype_config(&self) -> Option<&str>;
}

/// Builds a datatype from its configuration string
pub type DatatypeFactory =
    Arc<dyn Fn(Option<&str>) -> Result<Box<dyn CustomDatatype>, DatatypeError> + Send + Sync>;

/// Free text with an optional maximum length (the configuration)
#[derive(Debug, Clone)]
pub struct FreeTextDatatype {
    max_length: Option<usize>,
}

impl FreeTextDatatype {
    pub fn configure(config: Option<&str>) -> Result<Self, DatatypeError> {
        let max_length = match config.map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                DatatypeError::InvalidConfiguration(format!("maximum length '{}' is not a number", raw))
            })?),
            None => None,
        };
        Ok(Self { max_length })
    }
}

impl CustomDatatype for FreeTextDatatype {
    fn class_name(&self) -> &str {
        FREE_TEXT_DATATYPE
    }

    fn validate(&self, value: &str) -> Result<(), DatatypeError> {
        match self.max_length {
            Some(max) if value.chars().count() > max => Err(DatatypeError::InvalidValue(format!(
                "value longer than {} characters",
                max
            ))),
            _ => Ok(()),
        }
    }
}

/// ISO calendar dates (`YYYY-MM-DD`)
#[derive(Debug, Clone, Default)]
pub struct DateDatatype;

impl CustomDatatype for DateDatatype {
    fn class_name(&self) -> &str {
        DATE_DATATYPE
    }

    fn validate(&self, value: &str) -> Result<(), DatatypeError> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|e| DatatypeError::InvalidValue(format!("invalid date '{}': {}", value, e)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BooleanDatatype;

impl CustomDatatype for BooleanDatatype {
    fn class_name(&self) -> &str {
        BOOLEAN_DATATYPE
    }

    fn validate(&self, value: &str) -> Result<(), DatatypeError> {
        match value {
            "true" | "false" => Ok(()),
            other => Err(DatatypeError::InvalidValue(format!(
                "invalid boolean '{}'",
                other
            ))),
        }
    }
}

/// Registry of datatype factories keyed by class name
#[derive(Clone)]
pub struct DatatypeRegistry {
    factories: HashMap<String, DatatypeFactory>,
}

impl DatatypeRegistry {
    /// Registry without any datatypes
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in datatypes
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(FREE_TEXT_DATATYPE, |config| {
            Ok(Box::new(FreeTextDatatype::configure(config)?) as Box<dyn CustomDatatype>)
        });
        registry.register(DATE_DATATYPE, |_| Ok(Box::new(DateDatatype) as Box<dyn CustomDatatype>));
        registry.register(BOOLEAN_DATATYPE, |_| {
            Ok(Box::new(BooleanDatatype) as Box<dyn CustomDatatype>)
        });
        registry
    }

    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F)
    where
        F: Fn(Option<&str>) -> Result<Box<dyn CustomDatatype>, DatatypeError> + Send + Sync + 'static,
    {
        self.factories.insert(class_name.into(), Arc::new(factory));
    }

    pub fn is_registered(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Resolve and configure a datatype.
    ///
    /// Every failure is reported as [`DatatypeError::ResolutionFailed`].
    pub fn get_datatype(
        &self,
        class_name: &str,
        config: Option<&str>,
    ) -> Result<Box<dyn CustomDatatype>, DatatypeError> {
        let resolved = self
            .factories
            .get(class_name)
            .ok_or_else(|| DatatypeError::NotFound(class_name.to_string()))
            .and_then(|factory| factory(config));

        resolved.map_err(|source| DatatypeError::ResolutionFailed {
            class_name: class_name.to_string(),
            config: config.map(str::to_string),
            source: Box::new(source),
        })
    }

    pub fn get_datatype_for(
        &self,
        descriptor: &dyn CustomValueDescriptor,
    ) -> Result<Box<dyn CustomDatatype>, DatatypeError> {
        self.get_datatype(descriptor.datatype_classname(), descriptor.datatype_config())
    }

    /// Resolve the descriptor's datatype, falling back to the unconfigured
    /// default datatype when it cannot be resolved.
    pub fn get_datatype_or_default(
        &self,
        descriptor: &dyn CustomValueDescriptor,
    ) -> Result<Box<dyn CustomDatatype>, DatatypeError> {
        match self.get_datatype_for(descriptor) {
            Ok(datatype) => Ok(datatype),
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = DEFAULT_CUSTOM_DATATYPE,
                    "Falling back to default datatype"
                );
                self.get_datatype(DEFAULT_CUSTOM_DATATYPE, None)
            }
        }
    }
}

impl Default for DatatypeRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for DatatypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("DatatypeRegistry").field("datatypes", &names).finish()
    }
}
