//! Error types for the cluster crate.

use thiserror::Error;

/// Errors that can occur talking to a cluster.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The target resource does not exist.
    #[error("{kind} {namespace}/{name} was not found")]
    NotFound {
        /// Resource kind.
        kind: &'static str,
        /// Namespace of the missing resource; empty for cluster-scoped
        /// resources.
        namespace: String,
        /// Name of the missing resource.
        name: String,
    },

    /// A create collided with an existing resource.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Resource kind.
        kind: &'static str,
        /// Namespace of the colliding resource.
        namespace: String,
        /// Name of the colliding resource.
        name: String,
    },

    /// An optimistic update lost against a newer revision.
    #[error("{kind} {namespace}/{name} was changed by another writer")]
    Conflict {
        /// Resource kind.
        kind: &'static str,
        /// Namespace of the contested resource.
        namespace: String,
        /// Name of the contested resource.
        name: String,
    },

    /// Any other Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// The pod watch stream failed.
    #[error("pod watch failed: {0}")]
    Watch(#[from] kube::runtime::watcher::Error),

    /// An established exec session ended abnormally.
    #[error("exec stream failed: {0}")]
    Exec(String),

    /// An object could not be serialized for an apply request.
    #[error("cannot serialize object for apply: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The client could not be configured.
    #[error("cannot configure Kubernetes client: {0}")]
    Config(String),
}

impl ClusterError {
    /// Returns true if the error signals a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A specialized Result type for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Classifies a `kube` error into the distinct not-found, already-exists
/// and conflict signals the provider relies on.
pub(crate) fn classify(
    err: kube::Error,
    kind: &'static str,
    namespace: &str,
    name: &str,
) -> ClusterError {
    match &err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 => {
            if response.reason == "AlreadyExists" {
                ClusterError::AlreadyExists {
                    kind,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
            } else {
                ClusterError::Conflict {
                    kind,
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
            }
        }
        _ => ClusterError::Api(err),
    }
}
