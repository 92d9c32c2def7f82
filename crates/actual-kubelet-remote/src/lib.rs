//! Metadata transforms that move Kubernetes resources between clusters.
//!
//! This crate implements the translation layer of the actual-kubelet
//! provider: a pod scheduled to a synthetic node in a *local* cluster is
//! re-created, together with the resources it depends on, in a *remote*
//! cluster where the containers actually run.
//!
//! Crossing the cluster boundary requires two inverse operations:
//!
//! - **prepare** rewrites a resource so the remote cluster accepts it as
//!   a brand new object: cluster-assigned identity (UID, resource
//!   version, self link, owner references, managed fields) is erased,
//!   the namespace is rewritten through [`namespace_name`], and labels
//!   recording the original identity are attached.
//! - **recover** reverses the mapping on the read path, restoring the
//!   local namespace from the identity labels and stripping them, so the
//!   local cluster sees objects that look like its own.
//!
//! All transforms are pure and infallible. `prepare` is **not**
//! idempotent at the namespace layer: preparing an already-prepared
//! object re-hashes the already-hashed namespace, so callers must
//! prepare each object exactly once.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod meta;
mod ns;
mod pod;
mod secret;

pub use meta::{prepare_object, prepare_object_meta, recover_object_meta};
pub use ns::{namespace, namespace_name};
pub use pod::{prepare_pod, prepare_pod_update, recover_pod, set_env_vars};
pub use secret::{is_token_volume, prepare_service_account_token_secret};

/// Label recording the node name of the synthetic kubelet that created an
/// object in a remote cluster. Each kubelet must have a unique node name
/// within its remote cluster.
pub const LABEL_NODE_NAME: &str = "actual.vk/node-name";

/// Label recording the local namespace of an object created in a remote
/// cluster. This label is the only source of truth for reversing the
/// namespace mapping on the read path.
pub const LABEL_NAMESPACE: &str = "actual.vk/namespace";

/// Annotation recording the service account a pod was bound to on the
/// local cluster, or the subject of a replicated token secret.
pub const ANNOTATION_SERVICE_ACCOUNT_NAME: &str = "actual.vk/replicated-service-account.name";

/// Secret type marking a service account token replicated into the
/// remote cluster so that a remote pod may connect to the local API.
/// The non-built-in type keeps the remote cluster's service account
/// controller from garbage collecting or mutating the secret.
pub const SECRET_TYPE_REPLICATED_SERVICE_ACCOUNT_TOKEN: &str =
    "actual.vk/replicated-service-account-token";

/// The built-in annotation naming the service account a token secret
/// belongs to.
pub const ANNOTATION_BUILTIN_SERVICE_ACCOUNT_NAME: &str = "kubernetes.io/service-account.name";

/// The built-in annotation recording the UID of the service account a
/// token secret belongs to.
pub const ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID: &str = "kubernetes.io/service-account.uid";

/// The built-in service account token secret type.
pub const SECRET_TYPE_BUILTIN_SERVICE_ACCOUNT_TOKEN: &str = "kubernetes.io/service-account-token";
