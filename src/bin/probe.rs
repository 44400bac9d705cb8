//! The probe runner binary: invoked once per Job run by a `check-namespace`
//! CronJob or a one-shot `get-owner-info` Job, against exactly one target
//! namespace. Exits non-zero on an unknown action or a namespace that has
//! disappeared since the Job was scheduled, so the owning Job records the
//! failure instead of silently succeeding.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use kube::Client;
use nsreaper::adapter::KubernetesAdapter;
use nsreaper::config::Config;
use nsreaper::error::Error;
use nsreaper::probe::{dispatch, ProbeContext};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "nsreaper-probe")]
struct Cli {
    /// Which probe action to run.
    #[arg(long)]
    action: String,

    /// The target namespace to run it against.
    #[arg(long)]
    namespace: String,

    /// Path to a kubeconfig file. Falls back to in-cluster config when unset.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,
}

async fn build_client(kubeconfig: Option<&PathBuf>) -> Result<Client, Error> {
    match kubeconfig {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read kubeconfig {}: {e}", path.display())))?;
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
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(None) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match build_client(cli.kubeconfig.as_ref()).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to build kubernetes client");
            return ExitCode::FAILURE;
        }
    };

    let adapter = KubernetesAdapter::new(client);
    let ctx = ProbeContext::new(adapter, config);

    match dispatch(&ctx, &cli.action, &cli.namespace).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(action = %cli.action, namespace = %cli.namespace, error = %e, "probe failed");
            ExitCode::FAILURE
        }
    }
}
