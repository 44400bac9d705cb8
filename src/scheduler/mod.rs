//! Periodic task scheduler.
//!
//! Each registered task runs on its own period, optionally gated by a
//! predicate, and any error it returns is logged rather than allowed to
//! kill the loop. A [`ScheduledTask`] bundles a name, a period, an
//! optional predicate and a body, and [`TaskScheduler::run`] drives every
//! registered task concurrently until told to stop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type TaskBody = Arc<dyn Fn() -> TaskFuture + Send + Sync>;
pub type TaskPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// One periodic unit of work: a name (for logging), how often to run, an
/// optional gate that is checked before each tick runs the body, and the
/// body itself.
pub struct ScheduledTask {
    name: String,
    period: Duration,
    predicate: Option<TaskPredicate>,
    body: TaskBody,
}

impl ScheduledTask {
    pub fn new<F, Fut>(name: impl Into<String>, period: Duration, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            period,
            predicate: None,
            body: Arc::new(move || Box::pin(body())),
        }
    }

    /// Gates this task's body behind a predicate (the reference
    /// implementation's `@conditional_controller_task`): when the
    /// predicate returns `false` on a tick, that tick is skipped without
    /// running or logging anything beyond a debug trace.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }
}

/// Runs a fixed set of [`ScheduledTask`]s concurrently, one Tokio task per
/// scheduled task, until the provided [`CancellationToken`] fires.
#[derive(Default)]
pub struct TaskScheduler {
    tasks: Vec<ScheduledTask>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn register(&mut self, task: ScheduledTask) -> &mut Self {
        self.tasks.push(task);
        self
    }

    /// Runs every registered task until `shutdown` is cancelled, then
    /// waits for all of them to unwind.
    pub async fn run(self, shutdown: CancellationToken) {
        let handles: Vec<_> = self
            .tasks
            .into_iter()
            .map(|task| {
                let shutdown = shutdown.clone();
                tokio::spawn(run_task_loop(task, shutdown))
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduled task panicked");
            }
        }
    }
}

async fn run_task_loop(task: ScheduledTask, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(task.period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(predicate) = &task.predicate {
                    if !predicate() {
                        debug!(task = %task.name, "predicate false, skipping tick");
                        continue;
                    }
                }

                match (task.body)().await {
                    Ok(()) => {}
                    Err(e) => warn!(task = %task.name, error = %e, "task iteration failed"),
                }
            }
            _ = shutdown.cancelled() => {
                info!(task = %task.name, "task shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
