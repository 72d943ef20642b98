// Scheduler engine implementation
//
// A single polling loop fires every scheduled task whose next execution time
// has passed, then reschedules it on its start-time grid.

use crate::config::SchedulerCredentials;
use crate::errors::{ScheduleError, TaskError};
use crate::models::TaskDefinition;
use crate::schedule::{next_execution, ScheduleTrigger};
use crate::scheduler::notify::SchedulerErrorNotifier;
use crate::scheduler::task::{Task, TaskContext, TaskRegistry};
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to poll for tasks due (in seconds)
    pub poll_interval_seconds: u64,
    /// Maximum number of tasks to run per poll
    pub max_tasks_per_poll: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            max_tasks_per_poll: 100,
        }
    }
}

/// Scheduler trait for task scheduling operations
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start the scheduler polling loop
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop the scheduler gracefully
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Run every task due at `now`, returning how many ran
    async fn process_due_tasks(&self, now: DateTime<Utc>) -> usize;
}

struct ScheduledTask {
    definition: TaskDefinition,
    instance: Arc<dyn Task>,
    next_fire: DateTime<Utc>,
}

/// Main scheduler engine implementation
pub struct SchedulerEngine {
    config: SchedulerConfig,
    credentials: SchedulerCredentials,
    registry: TaskRegistry,
    notifier: Arc<dyn SchedulerErrorNotifier>,
    tasks: Mutex<BTreeMap<String, ScheduledTask>>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    pub fn new(
        config: SchedulerConfig,
        credentials: SchedulerCredentials,
        registry: TaskRegistry,
        notifier: Arc<dyn SchedulerErrorNotifier>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel(1);

        Self {
            config,
            credentials,
            registry,
            notifier,
            tasks: Mutex::new(BTreeMap::new()),
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Schedule every definition flagged `start_on_startup`.
    ///
    /// Definitions that cannot be scheduled are logged and skipped.
    #[instrument(skip_all, fields(definitions = definitions.len()))]
    pub async fn on_startup(&self, definitions: &[TaskDefinition], now: DateTime<Utc>) -> usize {
        let mut scheduled = 0;

        for definition in definitions.iter().filter(|d| d.start_on_startup) {
            match self.schedule_task(definition.clone(), now).await {
                Ok(_) => scheduled += 1,
                Err(e) => {
                    error!(task_name = %definition.name, error = %e, "Failed to schedule task on startup");
                }
            }
        }

        info!(scheduled_tasks = scheduled, "Scheduler startup complete");
        scheduled
    }

    /// Schedule a task, replacing any scheduled task with the same name.
    ///
    /// Returns the first time the task will fire.
    #[instrument(skip(self, definition, now), fields(task_name = %definition.name))]
    pub async fn schedule_task(
        &self,
        mut definition: TaskDefinition,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let instance = self.registry.create(&definition)?;

        if definition.start_time.is_none() {
            definition.start_time = Some(now);
        }
        let next_fire = definition.next_execution_time(now);
        definition.started = true;

        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&definition.name) {
            warn!("Task already scheduled, replacing it");
        }
        tasks.insert(
            definition.name.clone(),
            ScheduledTask {
                definition,
                instance,
                next_fire,
            },
        );
        telemetry::update_scheduled_tasks(tasks.len());

        info!(next_execution = %next_fire, "Task scheduled");
        Ok(next_fire)
    }

    /// Remove a task from the schedule
    #[instrument(skip(self))]
    pub async fn shutdown_task(&self, task_name: &str) -> Result<TaskDefinition, ScheduleError> {
        let mut tasks = self.tasks.lock().await;
        let removed = tasks
            .remove(task_name)
            .ok_or_else(|| ScheduleError::TaskNotScheduled(task_name.to_string()))?;
        telemetry::update_scheduled_tasks(tasks.len());

        let mut definition = removed.definition;
        definition.started = false;
        info!("Task shut down");
        Ok(definition)
    }

    /// Snapshot of the scheduled task definitions
    pub async fn scheduled_tasks(&self) -> Vec<TaskDefinition> {
        self.tasks
            .lock()
            .await
            .values()
            .map(|task| task.definition.clone())
            .collect()
    }

    /// When the named task fires next, if it is scheduled
    pub async fn next_fire_time(&self, task_name: &str) -> Option<DateTime<Utc>> {
        self.tasks
            .lock()
            .await
            .get(task_name)
            .map(|task| task.next_fire)
    }

    /// Run one task and report its outcome
    async fn run_task(
        &self,
        definition: &TaskDefinition,
        instance: &Arc<dyn Task>,
    ) -> Result<(), TaskError> {
        let ctx = TaskContext {
            execution_id: Uuid::new_v4(),
            definition: definition.clone(),
            credentials: self.credentials.clone(),
        };
        let span = info_span!(
            "task_run",
            execution_id = %ctx.execution_id,
            task_name = %definition.name
        );

        let started = Instant::now();
        let result = instance.execute(&ctx).instrument(span).await;
        telemetry::record_task_duration(&definition.name, started.elapsed().as_secs_f64());

        match &result {
            Ok(()) => {
                telemetry::record_task_success(&definition.name);
                debug!(task_name = %definition.name, "Task run completed");
            }
            Err(e) => {
                telemetry::record_task_failure(&definition.name, e.kind());
                error!(task_name = %definition.name, error = %e, "Task run failed");

                // Notification problems must not affect scheduling
                if let Err(notify_error) = self.notifier.notify(definition, e).await {
                    warn!(error = %notify_error, "Could not send scheduler error notification");
                }
            }
        }

        result
    }

    /// Record a finished run and work out when the task fires next
    async fn complete_run(&self, task_name: &str, ran_at: DateTime<Utc>) {
        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.get_mut(task_name) else {
            // shut down while running
            return;
        };

        task.definition.last_execution_time = Some(ran_at);

        if task.definition.is_complete() {
            tasks.remove(task_name);
            telemetry::update_scheduled_tasks(tasks.len());
            info!(task_name = task_name, "One-shot task finished, removed from schedule");
            return;
        }

        let start_time = task.definition.start_time.unwrap_or(ran_at);
        task.next_fire = next_execution(start_time, task.definition.repeat_interval, ran_at);
        debug!(
            task_name = task_name,
            next_execution = %task.next_fire,
            "Task rescheduled"
        );
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            "Starting scheduler engine"
        );

        let mut poll_interval = interval(Duration::from_secs(self.config.poll_interval_seconds));
        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    debug!("Polling for tasks due");

                    let count = self.process_due_tasks(Utc::now()).await;
                    if count > 0 {
                        info!(tasks_run = count, "Processed due tasks");
                    } else {
                        debug!("No tasks due for execution");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping scheduler engine");

        // No receiver means the loop is not running
        let _ = self.shutdown_tx.send(());

        Ok(())
    }

    #[instrument(skip(self))]
    async fn process_due_tasks(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<(TaskDefinition, Arc<dyn Task>)> = {
            let tasks = self.tasks.lock().await;
            tasks
                .values()
                .filter(|task| task.next_fire <= now)
                .take(self.config.max_tasks_per_poll)
                .map(|task| (task.definition.clone(), Arc::clone(&task.instance)))
                .collect()
        };

        debug!(due_tasks = due.len(), "Found tasks due");

        for (definition, instance) in &due {
            // Failures are reported inside run_task; the task stays scheduled
            let _ = self.run_task(definition, instance).await;
            self.complete_run(&definition.name, now).await;
        }

        due.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::notify::SchedulerErrorNotifier;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Task for CountingTask {
        async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TaskError::ExecutionFailed {
                    task: ctx.definition.name.clone(),
                    reason: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    /// Mock notifier that tracks notified task names
    #[derive(Default)]
    struct RecordingNotifier {
        notified: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SchedulerErrorNotifier for RecordingNotifier {
        async fn notify(&self, task: &TaskDefinition, _error: &TaskError) -> anyhow::Result<()> {
            self.notified.lock().unwrap().push(task.name.clone());
            Ok(())
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn engine(runs: Arc<AtomicUsize>, notifier: Arc<RecordingNotifier>) -> SchedulerEngine {
        let mut registry = TaskRegistry::new();
        let ok_runs = Arc::clone(&runs);
        registry.register("counting", move |_| {
            Arc::new(CountingTask {
                runs: Arc::clone(&ok_runs),
                fail: false,
            }) as Arc<dyn Task>
        });
        registry.register("failing", move |_| {
            Arc::new(CountingTask {
                runs: Arc::clone(&runs),
                fail: true,
            }) as Arc<dyn Task>
        });

        SchedulerEngine::new(
            SchedulerConfig::default(),
            SchedulerCredentials {
                username: "daemon".to_string(),
                password: None,
            },
            registry,
            notifier,
        )
    }

    fn definition(name: &str, class: &str, start: DateTime<Utc>, interval: u64) -> TaskDefinition {
        TaskDefinition::new(1, name, None, class)
            .with_start_time(start)
            .with_repeat_interval(interval)
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval_seconds, 10);
        assert_eq!(config.max_tasks_per_poll, 100);
    }

    #[tokio::test]
    async fn test_schedule_unknown_class_fails() {
        let engine = engine(Arc::new(AtomicUsize::new(0)), Arc::default());
        let result = engine
            .schedule_task(definition("x", "missing", at(0), 60), at(0))
            .await;
        assert!(matches!(result, Err(ScheduleError::UnknownTaskClass { .. })));
        assert!(engine.scheduled_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeating_task_runs_without_catch_up() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(Arc::clone(&runs), Arc::default());

        let first = engine
            .schedule_task(definition("hourly", "counting", at(10), 60), at(0))
            .await
            .unwrap();
        assert_eq!(first, at(10));

        assert_eq!(engine.process_due_tasks(at(5)).await, 0);
        assert_eq!(engine.process_due_tasks(at(10)).await, 1);
        assert_eq!(engine.next_fire_time("hourly").await, Some(at(70)));

        // Long pause: a single run, then back on the start-time grid
        assert_eq!(engine.process_due_tasks(at(200)).await, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(engine.next_fire_time("hourly").await, Some(at(250)));

        let scheduled = engine.scheduled_tasks().await;
        assert_eq!(scheduled[0].last_execution_time, Some(at(200)));
        assert!(scheduled[0].started);
    }

    #[tokio::test]
    async fn test_one_shot_task_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(Arc::clone(&runs), Arc::default());

        engine
            .schedule_task(definition("once", "counting", at(0), 0), at(-1))
            .await
            .unwrap();

        assert_eq!(engine.process_due_tasks(at(0)).await, 1);
        assert_eq!(engine.process_due_tasks(at(100)).await, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(engine.scheduled_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_past_one_shot_fires_on_next_poll() {
        let runs = Arc::new(AtomicUsize::new(0));
        let engine = engine(Arc::clone(&runs), Arc::default());

        let first = engine
            .schedule_task(definition("late", "counting", at(0), 0), at(500))
            .await
            .unwrap();
        assert_eq!(first, at(0));
        assert_eq!(engine.process_due_tasks(at(500)).await, 1);
    }

    #[tokio::test]
    async fn test_failing_task_notifies_and_stays_scheduled() {
        let runs = Arc::new(AtomicUsize::new(0));
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = engine(Arc::clone(&runs), Arc::clone(&notifier));

        engine
            .schedule_task(definition("flaky", "failing", at(0), 60), at(-10))
            .await
            .unwrap();

        assert_eq!(engine.process_due_tasks(at(0)).await, 1);
        assert_eq!(*notifier.notified.lock().unwrap(), vec!["flaky".to_string()]);
        assert_eq!(engine.next_fire_time("flaky").await, Some(at(60)));
    }

    #[tokio::test]
    async fn test_shutdown_task() {
        let engine = engine(Arc::new(AtomicUsize::new(0)), Arc::default());
        engine
            .schedule_task(definition("hourly", "counting", at(0), 3600), at(0))
            .await
            .unwrap();

        let definition = engine.shutdown_task("hourly").await.unwrap();
        assert!(!definition.started);
        assert!(engine.next_fire_time("hourly").await.is_none());
        assert!(matches!(
            engine.shutdown_task("hourly").await,
            Err(ScheduleError::TaskNotScheduled(_))
        ));
    }

    #[tokio::test]
    async fn test_on_startup_schedules_flagged_tasks() {
        let engine = engine(Arc::new(AtomicUsize::new(0)), Arc::default());
        let definitions = vec![
            definition("a", "counting", at(0), 60).with_start_on_startup(true),
            definition("b", "counting", at(0), 60),
            definition("c", "missing", at(0), 60).with_start_on_startup(true),
        ];

        assert_eq!(engine.on_startup(&definitions, at(0)).await, 1);
        let names: Vec<String> = engine
            .scheduled_tasks()
            .await
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_definition_without_start_time_starts_now() {
        let engine = engine(Arc::new(AtomicUsize::new(0)), Arc::default());
        let mut definition = definition("adhoc", "counting", at(0), 60);
        definition.start_time = None;

        let first = engine.schedule_task(definition, at(100)).await.unwrap();
        assert_eq!(first, at(160));
        assert_eq!(engine.scheduled_tasks().await[0].start_time, Some(at(100)));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let engine = Arc::new(engine(Arc::new(AtomicUsize::new(0)), Arc::default()));
        let runner = Arc::clone(&engine);
        let handle = tokio::spawn(async move { runner.start().await.is_ok() });

        // Let the loop subscribe before signalling
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.stop().await.unwrap();

        let finished = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!(finished);
    }
}
