//! The cluster capability surface and its Kubernetes implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret};
use kube::api::{
    Api, AttachParams, DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::watcher::{self, watcher, Config as WatcherConfig};
use kube::{Client, Config};
use tokio::io::AsyncWriteExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, info};

use crate::error::{classify, ClusterError, Result};
use crate::types::{ExecIo, LogOptions, LogStream, Object, PodEvent, Selector};

/// Field manager identifying this provider's server-side applies.
const FIELD_MANAGER: &str = "actual-kubelet";

/// The `Cluster` trait is the capability surface the provider needs from
/// a control plane: typed reads, pod writes, idempotent upserts for pod
/// dependencies, a pod watch, and the two streaming subresources.
///
/// Every operation is cancellable through the surrounding task; streams
/// end when dropped.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Get a pod by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] if the pod does not exist.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod>;

    /// Get a secret by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] if the secret does not exist.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;

    /// Get a config map by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] if the config map does not
    /// exist.
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap>;

    /// List pods across all namespaces matching the selector.
    ///
    /// # Errors
    ///
    /// Returns an error if the list request fails.
    async fn list_pods(&self, selector: &Selector) -> Result<Vec<Pod>>;

    /// Create a pod.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::AlreadyExists`] if a pod with the same
    /// identity exists.
    async fn create_pod(&self, pod: &Pod) -> Result<()>;

    /// Replace a pod, optimistically against the revision it carries.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Conflict`] if the revision is stale.
    async fn update_pod(&self, pod: &Pod) -> Result<()>;

    /// Delete a pod by namespace and name.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::NotFound`] if the pod is already gone.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    /// Create or overwrite an object. Idempotent: concurrent applies of
    /// the same content commute.
    ///
    /// # Errors
    ///
    /// Returns an error if the apply request fails.
    async fn apply(&self, object: &Object) -> Result<()>;

    /// Watch pods across all namespaces matching the selector. The
    /// stream reconnects internally and only yields terminal errors.
    fn watch_pods(&self, selector: &Selector) -> BoxStream<'static, Result<PodEvent>>;

    /// Open a log stream for a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be established.
    async fn pod_logs(&self, namespace: &str, pod: &str, options: &LogOptions)
        -> Result<LogStream>;

    /// Execute a command in a container, wiring the supplied I/O through
    /// for the lifetime of the session. Blocks until the session ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the exec channel cannot be established or the
    /// session ends abnormally.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        cmd: &[String],
        io: ExecIo,
    ) -> Result<()>;
}

/// A [`Cluster`] backed by a real Kubernetes API server.
pub struct KubeCluster {
    client: Client,
    resync: Option<Duration>,
}

impl KubeCluster {
    /// Connect to a cluster.
    ///
    /// A non-empty `kubeconfig_path` selects an explicit kubeconfig
    /// file; otherwise the usual inference rules apply (in-cluster
    /// config, then `KUBECONFIG`, then `~/.kube/config`). The resync
    /// interval bounds how long a watch page stays open before the
    /// watcher re-lists.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Config`] if the kubeconfig cannot be
    /// loaded or the client cannot be built from it.
    pub async fn connect(kubeconfig_path: &str, resync: Option<Duration>) -> Result<Self> {
        let config = if kubeconfig_path.is_empty() {
            Config::infer()
                .await
                .map_err(|e| ClusterError::Config(e.to_string()))?
        } else {
            let kubeconfig = Kubeconfig::read_from(kubeconfig_path)
                .map_err(|e| ClusterError::Config(e.to_string()))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ClusterError::Config(e.to_string()))?
        };

        let client = Client::try_from(config)?;
        info!(
            kubeconfig_path = %kubeconfig_path,
            resync = ?resync,
            "configured cluster client"
        );
        Ok(Self { client, resync })
    }

    /// Wrap a pre-configured client. Useful for tests.
    #[must_use]
    pub fn with_client(client: Client, resync: Option<Duration>) -> Self {
        Self { client, resync }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn all_pods(&self) -> Api<Pod> {
        Api::all(self.client.clone())
    }
}

/// Serializes an object for server-side apply. Typed resources do not
/// carry their `apiVersion`/`kind` in the Rust representation, but the
/// apply endpoint requires both, so they are injected here.
fn apply_payload<K>(object: &K) -> Result<serde_json::Value>
where
    K: kube::Resource<DynamicType = ()> + serde::Serialize,
{
    let mut value = serde_json::to_value(object)?;
    value["apiVersion"] = serde_json::Value::String(K::api_version(&()).into_owned());
    value["kind"] = serde_json::Value::String(K::kind(&()).into_owned());
    Ok(value)
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        self.pods(namespace)
            .get_opt(name)
            .await
            .map_err(ClusterError::Api)?
            .ok_or_else(|| ClusterError::NotFound {
                kind: "Pod",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(ClusterError::Api)?
            .ok_or_else(|| ClusterError::NotFound {
                kind: "Secret",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
            .map_err(ClusterError::Api)?
            .ok_or_else(|| ClusterError::NotFound {
                kind: "ConfigMap",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn list_pods(&self, selector: &Selector) -> Result<Vec<Pod>> {
        let params = ListParams::default().labels(&selector.to_label_selector());
        let list = self
            .all_pods()
            .list(&params)
            .await
            .map_err(ClusterError::Api)?;
        Ok(list.items)
    }

    async fn create_pod(&self, pod: &Pod) -> Result<()> {
        let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        self.pods(namespace)
            .create(&PostParams::default(), pod)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "Pod", namespace, name))
    }

    async fn update_pod(&self, pod: &Pod) -> Result<()> {
        let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        self.pods(namespace)
            .replace(name, &PostParams::default(), pod)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "Pod", namespace, name))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "Pod", namespace, name))
    }

    async fn apply(&self, object: &Object) -> Result<()> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        match object {
            Object::Namespace(ns) => {
                let name = ns.metadata.name.as_deref().unwrap_or_default();
                let payload = apply_payload(ns)?;
                Api::<Namespace>::all(self.client.clone())
                    .patch(name, &params, &Patch::Apply(&payload))
                    .await
                    .map_err(|e| classify(e, "Namespace", "", name))?;
            }
            Object::ConfigMap(cm) => {
                let namespace = cm.metadata.namespace.as_deref().unwrap_or_default();
                let name = cm.metadata.name.as_deref().unwrap_or_default();
                let payload = apply_payload(cm)?;
                Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
                    .patch(name, &params, &Patch::Apply(&payload))
                    .await
                    .map_err(|e| classify(e, "ConfigMap", namespace, name))?;
            }
            Object::Secret(secret) => {
                let namespace = secret.metadata.namespace.as_deref().unwrap_or_default();
                let name = secret.metadata.name.as_deref().unwrap_or_default();
                let payload = apply_payload(secret)?;
                Api::<Secret>::namespaced(self.client.clone(), namespace)
                    .patch(name, &params, &Patch::Apply(&payload))
                    .await
                    .map_err(|e| classify(e, "Secret", namespace, name))?;
            }
        }
        debug!(
            kind = object.kind(),
            namespace = %object.namespace(),
            name = %object.name(),
            "applied object"
        );
        Ok(())
    }

    fn watch_pods(&self, selector: &Selector) -> BoxStream<'static, Result<PodEvent>> {
        let mut config = WatcherConfig::default().labels(&selector.to_label_selector());
        if let Some(resync) = self.resync {
            // The API server caps watch timeouts just shy of five
            // minutes.
            let secs = u32::try_from(resync.as_secs()).unwrap_or(u32::MAX).min(290);
            config = config.timeout(secs);
        }

        watcher(self.all_pods(), config)
            .filter_map(|event| async move {
                match event {
                    Ok(watcher::Event::Apply(pod) | watcher::Event::InitApply(pod)) => {
                        Some(Ok(PodEvent::Applied(pod)))
                    }
                    Ok(watcher::Event::Delete(pod)) => Some(Ok(PodEvent::Deleted(pod))),
                    Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
                    Err(err) => Some(Err(ClusterError::Watch(err))),
                }
            })
            .boxed()
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        options: &LogOptions,
    ) -> Result<LogStream> {
        let params = LogParams {
            container: options.container.clone(),
            follow: options.follow,
            limit_bytes: options.limit_bytes,
            previous: options.previous,
            since_seconds: options.since_seconds,
            since_time: options.since_time,
            tail_lines: options.tail_lines,
            timestamps: options.timestamps,
            ..LogParams::default()
        };

        let reader = self
            .pods(namespace)
            .log_stream(pod, &params)
            .await
            .map_err(|e| classify(e, "Pod", namespace, pod))?;
        Ok(Box::pin(reader.compat()))
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        cmd: &[String],
        io: ExecIo,
    ) -> Result<()> {
        let ExecIo {
            stdin,
            stdout,
            stderr,
            tty,
            resize,
        } = io;

        let params = AttachParams {
            container: Some(container.to_string()),
            stdin: stdin.is_some(),
            stdout: stdout.is_some(),
            // With a TTY the remote end multiplexes stderr onto stdout.
            stderr: stderr.is_some() && !tty,
            tty,
            ..AttachParams::default()
        };

        let mut attached = self
            .pods(namespace)
            .exec(pod, cmd.to_vec(), &params)
            .await
            .map_err(|e| classify(e, "Pod", namespace, pod))?;

        // Output pumps drain to EOF once the session ends; input pumps
        // would otherwise wait on the caller forever, so they are
        // aborted instead.
        let mut input_pumps = Vec::new();
        let mut output_pumps = Vec::new();

        if let (Some(mut reader), Some(mut writer)) = (stdin, attached.stdin()) {
            input_pumps.push(tokio::spawn(async move {
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            }));
        }
        if let (Some(mut reader), Some(mut writer)) = (attached.stdout(), stdout) {
            output_pumps.push(tokio::spawn(async move {
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            }));
        }
        if let (Some(mut reader), Some(mut writer)) = (attached.stderr(), stderr) {
            output_pumps.push(tokio::spawn(async move {
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
                let _ = writer.shutdown().await;
            }));
        }
        if let (Some(mut sizes), Some(mut forward)) = (resize, attached.terminal_size()) {
            input_pumps.push(tokio::spawn(async move {
                while let Some(size) = sizes.recv().await {
                    if forward.send(size).await.is_err() {
                        break;
                    }
                }
            }));
        }

        let outcome = attached.join().await;

        for pump in input_pumps {
            pump.abort();
        }
        for pump in output_pumps {
            let _ = pump.await;
        }

        outcome.map_err(|e| ClusterError::Exec(e.to_string()))
    }
}

/// A mock cluster for testing without a real API server.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::*;
    use crate::types::PodEvent;

    /// A recorded exec invocation.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct ExecCall {
        /// Namespace the exec targeted.
        pub namespace: String,
        /// Pod the exec targeted.
        pub pod: String,
        /// Container the exec targeted.
        pub container: String,
        /// Command that was run.
        pub cmd: Vec<String>,
        /// Whether a TTY was requested.
        pub tty: bool,
    }

    /// A recorded log request.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct LogRequest {
        /// Namespace the request targeted.
        pub namespace: String,
        /// Pod the request targeted.
        pub pod: String,
        /// Options the request carried.
        pub options: LogOptions,
    }

    #[derive(Default)]
    struct State {
        namespaces: HashMap<String, Namespace>,
        config_maps: HashMap<(String, String), ConfigMap>,
        secrets: HashMap<(String, String), Secret>,
        pods: HashMap<(String, String), Pod>,
        journal: Vec<String>,
        applied: Vec<Object>,
        execs: Vec<ExecCall>,
        log_requests: Vec<LogRequest>,
        logs: HashMap<(String, String), Vec<u8>>,
        fail_secret_reads: bool,
    }

    /// A [`Cluster`] that stores resources in memory and records every
    /// write in order.
    #[derive(Default)]
    pub struct MockCluster {
        state: Mutex<State>,
        watchers: Mutex<Vec<mpsc::UnboundedSender<Result<PodEvent>>>>,
    }

    impl MockCluster {
        /// Create an empty mock cluster.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a secret.
        pub fn insert_secret(&self, secret: Secret) {
            let key = object_key(&secret.metadata);
            self.state.lock().secrets.insert(key, secret);
        }

        /// Seed a config map.
        pub fn insert_config_map(&self, config_map: ConfigMap) {
            let key = object_key(&config_map.metadata);
            self.state.lock().config_maps.insert(key, config_map);
        }

        /// Seed a pod.
        pub fn insert_pod(&self, pod: Pod) {
            let key = object_key(&pod.metadata);
            self.state.lock().pods.insert(key, pod);
        }

        /// Seed canned log output for a pod.
        pub fn insert_logs(&self, namespace: &str, pod: &str, bytes: Vec<u8>) {
            self.state
                .lock()
                .logs
                .insert((namespace.to_string(), pod.to_string()), bytes);
        }

        /// Make all subsequent secret reads fail with a non-not-found
        /// error.
        pub fn fail_secret_reads(&self) {
            self.state.lock().fail_secret_reads = true;
        }

        /// The stored pod, if any.
        #[must_use]
        pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
            self.state
                .lock()
                .pods
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
        }

        /// Every write in invocation order, as `verb kind namespace/name`.
        #[must_use]
        pub fn journal(&self) -> Vec<String> {
            self.state.lock().journal.clone()
        }

        /// Every applied object in invocation order.
        #[must_use]
        pub fn applied(&self) -> Vec<Object> {
            self.state.lock().applied.clone()
        }

        /// Every exec invocation in order.
        #[must_use]
        pub fn execs(&self) -> Vec<ExecCall> {
            self.state.lock().execs.clone()
        }

        /// Every log request in order.
        #[must_use]
        pub fn log_requests(&self) -> Vec<LogRequest> {
            self.state.lock().log_requests.clone()
        }

        /// Push a pod event to every open watch subscription.
        pub fn push_event(&self, event: &PodEvent) {
            self.watchers
                .lock()
                .retain(|tx| tx.send(Ok(event.clone())).is_ok());
        }
    }

    fn object_key(meta: &kube::api::ObjectMeta) -> (String, String) {
        (
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    #[async_trait]
    impl Cluster for MockCluster {
        async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
            self.state
                .lock()
                .pods
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| ClusterError::NotFound {
                    kind: "Pod",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
        }

        async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
            let state = self.state.lock();
            if state.fail_secret_reads {
                return Err(ClusterError::Config("injected secret read failure".into()));
            }
            state
                .secrets
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| ClusterError::NotFound {
                    kind: "Secret",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
        }

        async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
            self.state
                .lock()
                .config_maps
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| ClusterError::NotFound {
                    kind: "ConfigMap",
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
        }

        async fn list_pods(&self, selector: &Selector) -> Result<Vec<Pod>> {
            let Selector::HasLabel(key) = selector;
            Ok(self
                .state
                .lock()
                .pods
                .values()
                .filter(|pod| {
                    pod.metadata
                        .labels
                        .as_ref()
                        .is_some_and(|labels| labels.contains_key(key))
                })
                .cloned()
                .collect())
        }

        async fn create_pod(&self, pod: &Pod) -> Result<()> {
            let key = object_key(&pod.metadata);
            let mut state = self.state.lock();
            if state.pods.contains_key(&key) {
                return Err(ClusterError::AlreadyExists {
                    kind: "Pod",
                    namespace: key.0,
                    name: key.1,
                });
            }
            state.journal.push(format!("create Pod {}/{}", key.0, key.1));
            state.pods.insert(key, pod.clone());
            Ok(())
        }

        async fn update_pod(&self, pod: &Pod) -> Result<()> {
            let key = object_key(&pod.metadata);
            let mut state = self.state.lock();
            if !state.pods.contains_key(&key) {
                return Err(ClusterError::NotFound {
                    kind: "Pod",
                    namespace: key.0,
                    name: key.1,
                });
            }
            state.journal.push(format!("update Pod {}/{}", key.0, key.1));
            state.pods.insert(key, pod.clone());
            Ok(())
        }

        async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
            let key = (namespace.to_string(), name.to_string());
            let mut state = self.state.lock();
            if state.pods.remove(&key).is_none() {
                return Err(ClusterError::NotFound {
                    kind: "Pod",
                    namespace: key.0,
                    name: key.1,
                });
            }
            state.journal.push(format!("delete Pod {}/{}", key.0, key.1));
            Ok(())
        }

        async fn apply(&self, object: &Object) -> Result<()> {
            let mut state = self.state.lock();
            state.journal.push(format!(
                "apply {} {}/{}",
                object.kind(),
                object.namespace(),
                object.name()
            ));
            state.applied.push(object.clone());
            match object.clone() {
                Object::Namespace(ns) => {
                    let name = ns.metadata.name.clone().unwrap_or_default();
                    state.namespaces.insert(name, ns);
                }
                Object::ConfigMap(cm) => {
                    let key = object_key(&cm.metadata);
                    state.config_maps.insert(key, cm);
                }
                Object::Secret(secret) => {
                    let key = object_key(&secret.metadata);
                    state.secrets.insert(key, secret);
                }
            }
            Ok(())
        }

        fn watch_pods(&self, _selector: &Selector) -> BoxStream<'static, Result<PodEvent>> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.watchers.lock().push(tx);
            futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed()
        }

        async fn pod_logs(
            &self,
            namespace: &str,
            pod: &str,
            options: &LogOptions,
        ) -> Result<LogStream> {
            let mut state = self.state.lock();
            state.log_requests.push(LogRequest {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
                options: options.clone(),
            });
            let bytes = state
                .logs
                .get(&(namespace.to_string(), pod.to_string()))
                .cloned()
                .unwrap_or_default();
            Ok(Box::pin(std::io::Cursor::new(bytes)))
        }

        async fn exec(
            &self,
            namespace: &str,
            pod: &str,
            container: &str,
            cmd: &[String],
            io: ExecIo,
        ) -> Result<()> {
            self.state.lock().execs.push(ExecCall {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
                container: container.to_string(),
                cmd: cmd.to_vec(),
                tty: io.tty,
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use kube::api::ObjectMeta;
    use tokio::io::AsyncReadExt;

    use super::mock::MockCluster;
    use super::*;

    fn pod(namespace: &str, name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[tokio::test]
    async fn mock_create_get_and_delete_pod() {
        let cluster = MockCluster::new();
        cluster.create_pod(&pod("ns", "a")).await.unwrap();

        assert!(cluster.get_pod("ns", "a").await.is_ok());
        assert!(cluster
            .create_pod(&pod("ns", "a"))
            .await
            .is_err_and(|e| matches!(e, ClusterError::AlreadyExists { .. })));

        cluster.delete_pod("ns", "a").await.unwrap();
        assert!(cluster
            .delete_pod("ns", "a")
            .await
            .is_err_and(|e| e.is_not_found()));
        assert!(cluster.get_pod("ns", "a").await.is_err_and(|e| e.is_not_found()));
    }

    #[tokio::test]
    async fn mock_journal_preserves_write_order() {
        let cluster = MockCluster::new();
        cluster
            .apply(&Object::Namespace(Namespace {
                metadata: ObjectMeta {
                    name: Some("ns".to_string()),
                    ..ObjectMeta::default()
                },
                ..Namespace::default()
            }))
            .await
            .unwrap();
        cluster.create_pod(&pod("ns", "a")).await.unwrap();

        assert_eq!(
            cluster.journal(),
            vec!["apply Namespace /ns".to_string(), "create Pod ns/a".to_string()]
        );
    }

    #[tokio::test]
    async fn mock_list_filters_on_label_presence() {
        let cluster = MockCluster::new();
        let mut labelled = pod("ns", "labelled");
        labelled.metadata.labels = Some(std::collections::BTreeMap::from([(
            "cool".to_string(),
            "anything".to_string(),
        )]));
        cluster.insert_pod(labelled);
        cluster.insert_pod(pod("ns", "bare"));

        let pods = cluster
            .list_pods(&Selector::HasLabel("cool".to_string()))
            .await
            .unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].metadata.name.as_deref(), Some("labelled"));
    }

    #[tokio::test]
    async fn mock_logs_round_trip() {
        let cluster = MockCluster::new();
        cluster.insert_logs("ns", "a", b"cool logs".to_vec());

        let mut stream = cluster
            .pod_logs("ns", "a", &LogOptions::default())
            .await
            .unwrap();
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await.unwrap();
        assert_eq!(buffer, b"cool logs");
    }
}
