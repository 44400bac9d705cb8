//! Error types shared across the adapter, controllers and probe runner.

use thiserror::Error;

/// Errors that can cross an API boundary inside the core.
///
/// Kubernetes API failures are deliberately *not* represented here: the
/// adapter (`crate::adapter`) swallows them at the boundary and returns
/// empty results, per the "transient-cluster" and "not-found" error kinds.
/// This enum only covers failures that a caller must react to directly.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to load kubeconfig: {0}")]
    KubeconfigLoad(#[source] kube::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown probe action: {0}")]
    UnknownAction(String),

    #[error("target namespace is gone: {0}")]
    NamespaceGone(String),

    #[error("external dependency failure: {0}")]
    ExternalDependency(String),

    #[error("leader lock i/o error: {0}")]
    LeaderLock(#[source] std::io::Error),

    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
