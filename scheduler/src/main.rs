// Scheduler binary entry point

use anyhow::Context;
use chrono::Utc;
use common::config::{Settings, SCHEDULER_PASSWORD_PROPERTY, SCHEDULER_USERNAME_PROPERTY};
use common::module::ModuleFilterRegistry;
use common::scheduler::{
    LogErrorNotifier, Scheduler, SchedulerConfig, SchedulerEngine, TaskRegistry,
};
use common::telemetry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Legacy runtime properties, read from `SCHEDULER_USERNAME` / `SCHEDULER_PASSWORD`
fn runtime_properties_from_env() -> HashMap<String, String> {
    [
        ("SCHEDULER_USERNAME", SCHEDULER_USERNAME_PROPERTY),
        ("SCHEDULER_PASSWORD", SCHEDULER_PASSWORD_PROPERTY),
    ]
    .into_iter()
    .filter_map(|(var, property)| std::env::var(var).ok().map(|value| (property.to_string(), value)))
    .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings = Settings::load().context("Failed to load configuration")?;

    telemetry::init_logging(&settings.observability.log_level)?;
    info!(platform_version = %settings.platform.version, "Starting platform scheduler");

    settings.apply_runtime_properties(&runtime_properties_from_env());
    settings.validate().context("Invalid configuration")?;

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    // Modules with an unsatisfied platform requirement are skipped, not fatal
    let mut modules = ModuleFilterRegistry::new();
    for module in settings.modules.iter().cloned() {
        let module_id = module.module_id.clone();
        if let Err(e) = modules.register(module, &settings.platform.version) {
            warn!(module_id = %module_id, error = %e, "Module not started");
        }
    }
    info!(
        filter_mappings = modules.mappings().count(),
        "Module filter mappings loaded"
    );

    let notifier = Arc::new(LogErrorNotifier::new(
        settings.scheduler.admin_email.clone(),
        &settings.platform.version,
    ));
    let scheduler = Arc::new(SchedulerEngine::new(
        SchedulerConfig {
            poll_interval_seconds: settings.scheduler.poll_interval_seconds,
            ..SchedulerConfig::default()
        },
        settings.scheduler.credentials(),
        TaskRegistry::with_builtin(),
        notifier,
    ));

    scheduler.on_startup(&settings.tasks, Utc::now()).await;

    let scheduler_for_shutdown = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        if let Err(e) = scheduler_for_shutdown.stop().await {
            error!(error = %e, "Error during scheduler shutdown");
        }
    });

    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Scheduler error: {}", e))?;

    info!("Scheduler stopped");
    Ok(())
}
