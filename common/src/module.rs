// Optional module compatibility checks and filter registry

use crate::errors::ModuleError;
use crate::filter_mapping::filter_mapping_passes;
use crate::models::{FilterMapping, ModuleDescriptor};
use crate::version::match_required_versions;
use tracing::{debug, info, instrument, warn};

/// Check that the running platform version satisfies the module's requirement.
pub fn check_required_platform_version(
    module: &ModuleDescriptor,
    platform_version: &str,
) -> Result<(), ModuleError> {
    let required = module.require_platform_version.as_deref();
    if match_required_versions(platform_version, required) {
        return Ok(());
    }

    Err(ModuleError::IncompatiblePlatformVersion {
        module_id: module.module_id.clone(),
        required: required.unwrap_or_default().to_string(),
        current: platform_version.to_string(),
    })
}

/// Filter mappings of all started modules, in registration order
#[derive(Debug, Default)]
pub struct ModuleFilterRegistry {
    modules: Vec<ModuleDescriptor>,
}

impl ModuleFilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module after checking its platform requirement
    #[instrument(skip(self, module), fields(module_id = %module.module_id))]
    pub fn register(
        &mut self,
        module: ModuleDescriptor,
        platform_version: &str,
    ) -> Result<(), ModuleError> {
        if self.is_registered(&module.module_id) {
            return Err(ModuleError::AlreadyRegistered(module.module_id));
        }

        if let Err(e) = check_required_platform_version(&module, platform_version) {
            warn!(error = %e, "Module rejected");
            return Err(e);
        }

        info!(
            filter_mappings = module.filter_mappings.len(),
            "Module filter mappings registered"
        );
        self.modules.push(module);
        Ok(())
    }

    pub fn unregister(&mut self, module_id: &str) -> Result<ModuleDescriptor, ModuleError> {
        let position = self
            .modules
            .iter()
            .position(|module| module.module_id == module_id)
            .ok_or_else(|| ModuleError::NotRegistered(module_id.to_string()))?;
        Ok(self.modules.remove(position))
    }

    pub fn is_registered(&self, module_id: &str) -> bool {
        self.modules.iter().any(|module| module.module_id == module_id)
    }

    pub fn mappings(&self) -> impl Iterator<Item = &FilterMapping> {
        self.modules.iter().flat_map(|module| module.filter_mappings.iter())
    }

    /// Names of the filters to apply to a request, in chain order
    pub fn filters_for_path(&self, request_path: Option<&str>) -> Vec<&str> {
        let filters: Vec<&str> = self
            .mappings()
            .filter(|mapping| filter_mapping_passes(mapping, request_path))
            .map(|mapping| mapping.filter_name.as_str())
            .collect();

        debug!(
            request_path = request_path,
            filters = ?filters,
            "Resolved module filters for request"
        );
        filters
    }
}
