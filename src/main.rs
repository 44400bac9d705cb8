use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kube::Client;
use nsreaper::adapter::KubernetesAdapter;
use nsreaper::config::Config;
use nsreaper::controller::{build_action_scheduler, build_collect_scheduler};
use nsreaper::error::Error;
use nsreaper::leader::LeaderLock;
use nsreaper::metrics::create_metrics;
use nsreaper::notify::{Notifier, SlackNotifier};
use nsreaper::scheduler::TaskScheduler;
use nsreaper::server::{run_health_server, shutdown_channel, wait_for_signal, ReadinessState};
use tracing::{error, info, warn};

const HEALTH_PORT: u16 = 8080;

/// Runs both the collect and action controllers in a single process,
/// sharing one leader lock across both controller loops.
#[derive(Parser, Debug)]
#[command(name = "nsreaper")]
struct Cli {
    /// Path to a kubeconfig file. Falls back to in-cluster config when unset.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,
}

async fn build_client(kubeconfig: Option<&PathBuf>) -> Result<Client, Error> {
    match kubeconfig {
        Some(path) => {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("failed to read kubeconfig {}: {e}", path.display()))
            })?;
            let config = kube::config::Kubeconfig::from_yaml(&contents)
                .map_err(|e| Error::Config(format!("failed to parse kubeconfig: {e}")))?;
            let options = kube::config::KubeConfigOptions::default();
            let client_config = kube::Config::from_custom_kubeconfig(config, &options)
                .await
                .map_err(Error::KubeconfigLoad)?;
            Client::try_from(client_config).map_err(Error::KubeconfigLoad)
        }
        None => Client::try_default().await.map_err(Error::KubeconfigLoad),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("starting nsreaper");

    let config = Arc::new(Config::load(None)?);

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let readiness = ReadinessState::new();
    let metrics = create_metrics()?;

    let health_handle = {
        let readiness = readiness.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(HEALTH_PORT, readiness, metrics).await {
                warn!(error = %e, "health server failed");
            }
        })
    };

    let client = match build_client(cli.kubeconfig.as_ref()).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build kubernetes client");
            health_handle.abort();
            return Err(e.into());
        }
    };
    info!(namespace = %config.context.namespace, "connected to kubernetes cluster");

    let adapter = KubernetesAdapter::new(client);
    let notifier: Arc<dyn Notifier> = Arc::new(SlackNotifier::new(&config.notifier)?);

    let holder_id = format!(
        "{}-{}",
        config.context.namespace,
        std::process::id()
    );
    let leader_lock = if config.leader_election.enabled {
        Some(Arc::new(std::sync::Mutex::new(LeaderLock::new(
            &config.leader_election,
            holder_id,
        ))))
    } else {
        None
    };

    let is_leader: Arc<dyn Fn() -> bool + Send + Sync> = match leader_lock.clone() {
        Some(lock) => Arc::new(move || {
            lock.lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_leader()
                .unwrap_or(false)
        }),
        None => Arc::new(|| true),
    };

    let leader_handle = leader_lock.map(|lock| {
        let shutdown = shutdown_signal.clone();
        let renew_period = lock.lock().unwrap_or_else(|e| e.into_inner()).renew_period();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(renew_period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match lock.lock().unwrap_or_else(|e| e.into_inner()).acquire() {
                            Ok(is_leader) => metrics.set_leader(is_leader),
                            Err(e) => warn!(error = %e, "leader lock acquisition failed"),
                        }
                    }
                    _ = shutdown.wait() => {
                        let _ = lock.lock().unwrap_or_else(|e| e.into_inner()).release();
                        metrics.set_leader(false);
                        break;
                    }
                }
            }
        })
    });
    if !config.leader_election.enabled {
        metrics.set_leader(true);
    }

    let collect_scheduler = build_collect_scheduler(
        adapter.clone(),
        config.clone(),
        metrics.clone(),
        {
            let is_leader = is_leader.clone();
            move || is_leader()
        },
    );
    let action_scheduler = build_action_scheduler(
        adapter.clone(),
        config.clone(),
        notifier.clone(),
        metrics.clone(),
        {
            let is_leader = is_leader.clone();
            move || is_leader()
        },
    );

    readiness.set_ready();
    info!("controllers ready, starting scheduler loops");

    let collect_shutdown = shutdown_signal.as_cancellation_token();
    let action_shutdown = shutdown_signal.as_cancellation_token();
    let collect_handle = tokio::spawn(run_scheduler(collect_scheduler, collect_shutdown));
    let action_handle = tokio::spawn(run_scheduler(action_scheduler, action_shutdown));

    let signal = wait_for_signal().await;
    info!(signal, "initiating graceful shutdown");
    readiness.set_not_ready();
    shutdown_controller.shutdown();

    let _ = collect_handle.await;
    let _ = action_handle.await;
    if let Some(handle) = leader_handle {
        handle.abort();
    }
    health_handle.abort();

    info!("nsreaper shut down gracefully");
    Ok(())
}

async fn run_scheduler(scheduler: TaskScheduler, shutdown: tokio_util::sync::CancellationToken) {
    scheduler.run(shutdown).await;
}
