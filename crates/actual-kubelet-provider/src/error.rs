//! Error types surfaced to the node agent.

use actual_kubelet_cluster::ClusterError;
use thiserror::Error;

use crate::deps::DependencyKind;

/// Errors that can occur during provider operations.
///
/// Every remote-write variant carries a static phase message for
/// operator diagnostics. The provider never retries internally; retry is
/// the node agent's responsibility.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The target pod does not exist. Surfaced distinctly so the node
    /// agent can advance its own state.
    #[error("pod {namespace}/{name} was not found")]
    PodNotFound {
        /// Namespace the lookup targeted.
        namespace: String,
        /// Name of the missing pod.
        name: String,
    },

    /// A required dependency is absent on the local cluster. The pod is
    /// not written remotely.
    #[error("required dependency {kind} {name:?} is missing")]
    MissingDependency {
        /// Kind of the missing dependency.
        kind: DependencyKind,
        /// Name of the missing dependency.
        name: String,
    },

    /// A local cluster read failed for a reason other than not-found.
    #[error("cannot fetch local pod dependencies")]
    FetchDependency(#[source] ClusterError),

    /// The remote namespace upsert failed.
    #[error("cannot apply remote pod namespace")]
    ApplyNamespace(#[source] ClusterError),

    /// A remote dependency upsert failed.
    #[error("cannot apply remote pod dependency")]
    ApplyDependency(#[source] ClusterError),

    /// The remote pod create failed.
    #[error("cannot create remote pod")]
    CreatePod(#[source] ClusterError),

    /// The remote pod read failed.
    #[error("cannot get remote pod")]
    GetPod(#[source] ClusterError),

    /// The remote pod update failed.
    #[error("cannot update remote pod")]
    UpdatePod(#[source] ClusterError),

    /// The remote pod delete failed.
    #[error("cannot delete pod")]
    DeletePod(#[source] ClusterError),

    /// The remote pod list failed.
    #[error("cannot list pods")]
    ListPods(#[source] ClusterError),

    /// The container log stream could not be established.
    #[error("cannot stream container logs")]
    StreamLogs(#[source] ClusterError),

    /// The exec channel could not be established or ended abnormally.
    #[error("cannot establish exec session")]
    ExecSetup(#[source] ClusterError),
}

impl ProviderError {
    /// Returns true if the error signals a missing pod.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PodNotFound { .. })
    }
}

/// A specialized Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
