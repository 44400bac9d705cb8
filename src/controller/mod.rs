//! Wires the collect and action controller tasks into schedulers.
//!
//! Every non-leader-only task here may run concurrently on every
//! replica: each is a patch to a keyed object whose desired state
//! depends only on the current observation, so two replicas racing to
//! apply the same patch converge rather than conflict. Leader-only tasks
//! are gated by the predicate the caller supplies — normally
//! [`crate::leader::LeaderLock::is_leader`].

pub mod action;
pub mod collect;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::adapter::KubernetesAdapter;
use crate::config::Config;
use crate::metrics::SharedMetrics;
use crate::notify::Notifier;
use crate::scheduler::{ScheduledTask, TaskScheduler};

const ADOPT_PERIOD: Duration = Duration::from_secs(1);
const RECONCILE_PERIOD: Duration = Duration::from_secs(10);
const METRICS_PERIOD: Duration = Duration::from_secs(5);
const ACTION_PERIOD: Duration = Duration::from_secs(1);

/// Builds the collect controller's scheduler: adoption runs on every
/// replica, CronJob/Job reconciliation and metrics emission are
/// leader-only.
pub fn build_collect_scheduler(
    adapter: KubernetesAdapter,
    config: Arc<Config>,
    metrics: SharedMetrics,
    is_leader: impl Fn() -> bool + Send + Sync + 'static,
) -> TaskScheduler {
    let is_leader = Arc::new(is_leader);
    let mut scheduler = TaskScheduler::new();

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let metrics = metrics.clone();
        scheduler.register(ScheduledTask::new("adopt_new_namespaces", ADOPT_PERIOD, move || {
            let adapter = adapter.clone();
            let config = config.clone();
            let metrics = metrics.clone();
            async move {
                collect::adopt_new_namespaces(&adapter, &config).await;
                metrics.record_task_run("adopt_new_namespaces", true);
                Ok(())
            }
        }));
    }

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let metrics = metrics.clone();
        let is_leader = is_leader.clone();
        scheduler.register(
            ScheduledTask::new("reconcile_cronjobs", RECONCILE_PERIOD, move || {
                let adapter = adapter.clone();
                let config = config.clone();
                let metrics = metrics.clone();
                async move {
                    collect::reconcile_cronjobs(&adapter, &config).await;
                    metrics.record_task_run("reconcile_cronjobs", true);
                    Ok(())
                }
            })
            .with_predicate(move || is_leader()),
        );
    }

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let metrics = metrics.clone();
        let is_leader = is_leader.clone();
        scheduler.register(
            ScheduledTask::new("reconcile_jobs", RECONCILE_PERIOD, move || {
                let adapter = adapter.clone();
                let config = config.clone();
                let metrics = metrics.clone();
                async move {
                    collect::reconcile_jobs(&adapter, &config).await;
                    metrics.record_task_run("reconcile_jobs", true);
                    Ok(())
                }
            })
            .with_predicate(move || is_leader()),
        );
    }

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let metrics = metrics.clone();
        let is_leader = is_leader.clone();
        scheduler.register(
            ScheduledTask::new("generate_metrics", METRICS_PERIOD, move || {
                let adapter = adapter.clone();
                let config = config.clone();
                let metrics = metrics.clone();
                async move {
                    if config.metrics.enabled {
                        collect::generate_metrics(&adapter, &config, &metrics).await;
                    }
                    metrics.record_task_run("generate_metrics", true);
                    Ok(())
                }
            })
            .with_predicate(move || is_leader()),
        );
    }

    scheduler
}

/// Builds the action controller's scheduler: deletion and notification,
/// all leader-only. The action controller never calls the People API —
/// `owner` is already a resolved address by the time these tasks read it.
pub fn build_action_scheduler(
    adapter: KubernetesAdapter,
    config: Arc<Config>,
    notifier: Arc<dyn Notifier>,
    metrics: SharedMetrics,
    is_leader: impl Fn() -> bool + Send + Sync + 'static,
) -> TaskScheduler {
    let is_leader = Arc::new(is_leader);
    let mut scheduler = TaskScheduler::new();

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let notifier = notifier.clone();
        let metrics = metrics.clone();
        let is_leader = is_leader.clone();
        scheduler.register(
            ScheduledTask::new("delete_stale_namespaces", ACTION_PERIOD, move || {
                let adapter = adapter.clone();
                let config = config.clone();
                let notifier = notifier.clone();
                let metrics = metrics.clone();
                async move {
                    action::delete_stale_namespaces(&adapter, &config, notifier.as_ref(), &metrics).await;
                    metrics.record_task_run("delete_stale_namespaces", true);
                    Ok(())
                }
            })
            .with_predicate(move || is_leader()),
        );
    }

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let notifier = notifier.clone();
        let metrics = metrics.clone();
        let is_leader = is_leader.clone();
        scheduler.register(
            ScheduledTask::new("delete_failed_namespaces", ACTION_PERIOD, move || {
                let adapter = adapter.clone();
                let config = config.clone();
                let notifier = notifier.clone();
                let metrics = metrics.clone();
                async move {
                    action::delete_failed_namespaces(&adapter, &config, notifier.as_ref(), &metrics).await;
                    metrics.record_task_run("delete_failed_namespaces", true);
                    Ok(())
                }
            })
            .with_predicate(move || is_leader()),
        );
    }

    {
        let adapter = adapter.clone();
        let config = config.clone();
        let notifier = notifier.clone();
        let metrics = metrics.clone();
        let is_leader = is_leader.clone();
        scheduler.register(
            ScheduledTask::new("notify_failing_or_unstable", ACTION_PERIOD, move || {
                let adapter = adapter.clone();
                let config = config.clone();
                let notifier = notifier.clone();
                let metrics = metrics.clone();
                async move {
                    action::notify_failing_or_unstable(&adapter, &config, notifier.as_ref(), &metrics).await;
                    metrics.record_task_run("notify_failing_or_unstable", true);
                    Ok(())
                }
            })
            .with_predicate(move || is_leader()),
        );
    }

    scheduler
}

pub fn shutdown_token() -> CancellationToken {
    CancellationToken::new()
}
