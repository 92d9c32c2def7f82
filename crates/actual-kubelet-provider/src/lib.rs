//! Runs pods scheduled to a synthetic node by re-creating them in a
//! remote cluster.
//!
//! A local control plane schedules a pod to the synthetic node; this
//! crate's [`Provider`] turns each lifecycle operation the node agent
//! drives into operations against the remote cluster:
//!
//! ```text
//! local pod ──▶ dependency finder ──▶ dependency fetcher (local reads)
//!                                             │
//!                                             ▼
//!               namespace + deps + pod ── prepare ──▶ remote writes
//! ```
//!
//! Read paths (get, list, notify) run the inverse transform so the local
//! cluster sees objects that look like its own.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use actual_kubelet_cluster::KubeCluster;
//! use actual_kubelet_provider::{ConfigFile, Provider, RemoteProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::load("/etc/actual-kubelet/config.toml")?;
//! let local = KubeCluster::connect(&config.local.kubeconfig_path, config.local.resync()?).await?;
//! let remote =
//!     KubeCluster::connect(&config.remote.kubeconfig_path, config.remote.resync()?).await?;
//!
//! let provider = RemoteProvider::new("coolnode", Arc::new(local), Arc::new(remote), config);
//! let pods = provider.get_pods().await?;
//! println!("running {} pods", pods.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod deps;
pub mod error;
pub mod node;
pub mod provider;

pub use config::{ClientConfig, ConfigError, ConfigFile, NodeConfig, PodsConfig};
pub use deps::{find_pod_dependencies, Dependency, DependencyFetcher, DependencyKind};
pub use error::{ProviderError, Result};
pub use node::configure_node;
pub use provider::{ContainerLogOpts, PodChangedCallback, Provider, RemoteProvider};
