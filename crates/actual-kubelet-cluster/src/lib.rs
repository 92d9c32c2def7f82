//! Cluster client abstraction for the actual-kubelet provider.
//!
//! The provider talks to two control planes: the *local* cluster it
//! reads pods and their dependencies from, and the *remote* cluster it
//! writes them to. Both sides are reached through the [`Cluster`] trait,
//! an opaque capability surface over typed reads, pod writes, idempotent
//! upserts, a pod watch, and the log/exec streaming subresources.
//!
//! [`KubeCluster`] implements the trait against a real API server via
//! `kube`. `mock::MockCluster` (behind the `test-utils` feature) stores
//! resources in memory and records writes in order, for testing provider
//! logic without a cluster.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod k8s;
pub mod types;

pub use error::{ClusterError, Result};
pub use k8s::{Cluster, KubeCluster};
pub use types::{ExecIo, LogOptions, LogStream, Object, PodEvent, Selector};

#[cfg(any(test, feature = "test-utils"))]
pub use k8s::mock;
