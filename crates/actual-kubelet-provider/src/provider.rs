//! The provider contract and its remote-cluster implementation.

use std::sync::Arc;

use actual_kubelet_cluster::{Cluster, ExecIo, LogOptions, LogStream, Object, Selector};
use actual_kubelet_remote::{
    namespace, namespace_name, prepare_object_meta, prepare_pod, prepare_pod_update, recover_pod,
    LABEL_NODE_NAME,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod, PodStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::deps::DependencyFetcher;
use crate::error::{ProviderError, Result};
use crate::node;

/// Pod changes observed by the watch subscription are handed to the node
/// agent through this callback. The agent guarantees it is thread-safe;
/// it may block.
pub type PodChangedCallback = Arc<dyn Fn(Pod) + Send + Sync>;

/// How many recovered pods may queue between the watch loop and a
/// blocking callback before the watch loop waits.
const NOTIFY_BUFFER: usize = 64;

/// Log options as the node agent hands them over. Zero-valued numeric
/// options mean unset.
#[derive(Clone, Debug, Default)]
pub struct ContainerLogOpts {
    /// Number of lines from the end of the log to show; zero for all.
    pub tail: i64,
    /// Maximum number of bytes to return; zero for no limit.
    pub limit_bytes: i64,
    /// Only return logs newer than this many seconds; zero for all.
    pub since_seconds: i64,
    /// Only return logs after this time.
    pub since_time: Option<DateTime<Utc>>,
    /// Return logs of the previous container instance.
    pub previous: bool,
    /// Keep the stream open and follow new output.
    pub follow: bool,
    /// Prefix each line with its timestamp.
    pub timestamps: bool,
}

/// The `Provider` trait is the operation set the node agent drives. Each
/// operation is invoked on its own task with its own cancellation scope;
/// none may block the caller indefinitely, and none retries internally.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Run a local pod by creating it, and everything it depends on, in
    /// the remote cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDependency`] if a required
    /// dependency is absent locally; the pod is not written remotely.
    async fn create_pod(&self, pod: &Pod) -> Result<()>;

    /// Reconcile a local pod's labels and annotations onto its remote
    /// counterpart. Spec changes are deliberately not propagated.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote pod cannot be read or updated.
    async fn update_pod(&self, pod: &Pod) -> Result<()>;

    /// Delete a local pod's remote counterpart. Dependency and namespace
    /// objects are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::PodNotFound`] if the remote pod is
    /// already gone.
    async fn delete_pod(&self, pod: &Pod) -> Result<()>;

    /// Get the local representation of a pod running remotely.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::PodNotFound`] if the pod does not exist
    /// remotely, so the node agent can mark it terminated locally.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// Get the status of a pod running remotely.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::PodNotFound`] if the pod does not exist
    /// remotely.
    async fn get_pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus>;

    /// List every pod this kubelet (or any other synthetic kubelet
    /// sharing the remote cluster) is running remotely, recovered to
    /// their local representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote list fails.
    async fn get_pods(&self) -> Result<Vec<Pod>>;

    /// Subscribe to remote pod changes, invoking `changed` with the
    /// recovered pod for every event until the token is cancelled.
    /// Returns immediately; the subscription runs in the background.
    fn notify_pods(&self, cancel: CancellationToken, changed: PodChangedCallback);

    /// Stream logs of a container running remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be established.
    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        opts: ContainerLogOpts,
    ) -> Result<LogStream>;

    /// Execute a command in a container running remotely, wiring the
    /// supplied I/O through. Blocks for the lifetime of the session;
    /// output streams are closed on return regardless of outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the exec channel cannot be established.
    async fn run_in_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        cmd: &[String],
        io: ExecIo,
    ) -> Result<()>;

    /// Stamp the synthetic node object with its advertised metadata.
    fn configure_node(&self, node: &mut Node);
}

/// A [`Provider`] that runs pods by submitting them to a remote API
/// server.
///
/// Holds no mutable state: just the node name, the two cluster handles,
/// and immutable configuration, so concurrent operations need no
/// locking.
pub struct RemoteProvider {
    node_name: String,
    remote: Arc<dyn Cluster>,
    fetcher: DependencyFetcher,
    config: ConfigFile,
}

impl RemoteProvider {
    /// Create a provider bridging the two supplied clusters.
    #[must_use]
    pub fn new(
        node_name: impl Into<String>,
        local: Arc<dyn Cluster>,
        remote: Arc<dyn Cluster>,
        config: ConfigFile,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            remote,
            fetcher: DependencyFetcher::new(local),
            config,
        }
    }

    /// Applies (creates or overwrites) the remote namespace and every
    /// resource the supplied pod depends on.
    ///
    /// Multiple pods may share a dependency within a namespace, so
    /// applying pod A's dependencies may also apply pod B's; the upsert
    /// is commutative because the content is derived purely from the
    /// local source.
    async fn apply_pod_dependencies(&self, local: &Pod) -> Result<()> {
        let deps = self.fetcher.fetch(local).await?;

        let local_namespace = local.metadata.namespace.as_deref().unwrap_or_default();
        let ns = namespace(&self.node_name, local_namespace);
        self.remote
            .apply(&Object::Namespace(ns))
            .await
            .map_err(ProviderError::ApplyNamespace)?;

        let count = deps.len();
        for mut object in deps {
            prepare_object_meta(&self.node_name, object.meta_mut());
            self.remote
                .apply(&object)
                .await
                .map_err(ProviderError::ApplyDependency)?;
        }

        debug!(
            namespace = %local_namespace,
            dependencies = count,
            "applied pod dependencies"
        );
        Ok(())
    }
}

#[async_trait]
impl Provider for RemoteProvider {
    async fn create_pod(&self, pod: &Pod) -> Result<()> {
        self.apply_pod_dependencies(pod).await?;

        let mut rmt = pod.clone();
        prepare_pod(&self.node_name, &mut rmt, &self.config.pods.env);
        self.remote
            .create_pod(&rmt)
            .await
            .map_err(ProviderError::CreatePod)?;

        info!(
            namespace = %pod.metadata.namespace.as_deref().unwrap_or_default(),
            name = %pod.metadata.name.as_deref().unwrap_or_default(),
            "created remote pod"
        );
        Ok(())
    }

    async fn update_pod(&self, pod: &Pod) -> Result<()> {
        self.apply_pod_dependencies(pod).await?;

        let local_namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        let remote_namespace = namespace_name(&self.node_name, local_namespace);

        let mut rmt = self
            .remote
            .get_pod(&remote_namespace, name)
            .await
            .map_err(ProviderError::GetPod)?;

        prepare_pod_update(&self.node_name, pod, &mut rmt);
        self.remote
            .update_pod(&rmt)
            .await
            .map_err(ProviderError::UpdatePod)?;

        info!(
            namespace = %local_namespace,
            name = %name,
            "updated remote pod metadata"
        );
        Ok(())
    }

    async fn delete_pod(&self, pod: &Pod) -> Result<()> {
        // Preparing a copy is purely how the remote namespace and name
        // are derived; nothing is written.
        let mut rmt = pod.clone();
        prepare_pod(&self.node_name, &mut rmt, &[]);
        let namespace = rmt.metadata.namespace.clone().unwrap_or_default();
        let name = rmt.metadata.name.clone().unwrap_or_default();

        match self.remote.delete_pod(&namespace, &name).await {
            Ok(()) => {
                info!(namespace = %namespace, name = %name, "deleted remote pod");
                Ok(())
            }
            Err(err) if err.is_not_found() => Err(ProviderError::PodNotFound { namespace, name }),
            Err(err) => Err(ProviderError::DeletePod(err)),
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let remote_namespace = namespace_name(&self.node_name, namespace);
        match self.remote.get_pod(&remote_namespace, name).await {
            Ok(mut pod) => {
                recover_pod(&mut pod);
                Ok(pod)
            }
            Err(err) if err.is_not_found() => Err(ProviderError::PodNotFound {
                namespace: remote_namespace,
                name: name.to_string(),
            }),
            Err(err) => Err(ProviderError::GetPod(err)),
        }
    }

    async fn get_pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus> {
        let pod = self.get_pod(namespace, name).await?;
        Ok(pod.status.unwrap_or_default())
    }

    async fn get_pods(&self) -> Result<Vec<Pod>> {
        // Scoped by label presence, not value: the remote cluster may
        // host pods for other synthetic kubelets, and the historical
        // contract surfaces those too.
        let selector = Selector::HasLabel(LABEL_NODE_NAME.to_string());
        let mut pods = self
            .remote
            .list_pods(&selector)
            .await
            .map_err(ProviderError::ListPods)?;
        for pod in &mut pods {
            recover_pod(pod);
        }
        Ok(pods)
    }

    fn notify_pods(&self, cancel: CancellationToken, changed: PodChangedCallback) {
        let mut stream = self
            .remote
            .watch_pods(&Selector::HasLabel(LABEL_NODE_NAME.to_string()));

        // The callback may block, so events are fanned through a bounded
        // queue: a stalled callback stalls the queue, never the watch.
        let (tx, mut rx) = mpsc::channel::<Pod>(NOTIFY_BUFFER);

        let watch_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = watch_cancel.cancelled() => break,
                    event = stream.next() => match event {
                        Some(Ok(event)) => {
                            let mut pod = event.into_pod();
                            recover_pod(&mut pod);
                            if tx.send(pod).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            warn!(error = %err, "pod watch error");
                        }
                        None => break,
                    },
                }
            }
        });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    pod = rx.recv() => match pod {
                        Some(pod) => changed(pod),
                        None => break,
                    },
                }
            }
        });
    }

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        opts: ContainerLogOpts,
    ) -> Result<LogStream> {
        let options = LogOptions {
            container: Some(container.to_string()),
            tail_lines: non_zero(opts.tail),
            limit_bytes: non_zero(opts.limit_bytes),
            since_seconds: non_zero(opts.since_seconds),
            since_time: opts.since_time,
            previous: opts.previous,
            follow: opts.follow,
            timestamps: opts.timestamps,
        };

        self.remote
            .pod_logs(&namespace_name(&self.node_name, namespace), pod, &options)
            .await
            .map_err(ProviderError::StreamLogs)
    }

    async fn run_in_container(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        cmd: &[String],
        io: ExecIo,
    ) -> Result<()> {
        self.remote
            .exec(
                &namespace_name(&self.node_name, namespace),
                pod,
                container,
                cmd,
                io,
            )
            .await
            .map_err(ProviderError::ExecSetup)
    }

    fn configure_node(&self, node: &mut Node) {
        node::configure_node(node, &self.config.node);
    }
}

/// Zero means unset in the node agent's numeric log options.
const fn non_zero(value: i64) -> Option<i64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}
