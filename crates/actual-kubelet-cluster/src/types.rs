//! Types shared by the cluster client surface.

use std::pin::Pin;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret};
use kube::api::{ObjectMeta, TerminalSize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// A label predicate scoping a list or watch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Matches resources that carry the label key, regardless of value.
    HasLabel(String),
}

impl Selector {
    /// Renders the predicate as a Kubernetes label selector expression.
    #[must_use]
    pub fn to_label_selector(&self) -> String {
        match self {
            Self::HasLabel(key) => key.clone(),
        }
    }
}

/// A resource that travels between clusters alongside a pod.
///
/// A closed set of tagged variants rather than a trait object: the
/// fetcher dispatches on the variant to pick the resource type, and the
/// transformer reaches the metadata uniformly through [`Object::meta_mut`].
#[derive(Clone, Debug)]
pub enum Object {
    /// A namespace.
    Namespace(Namespace),
    /// A configuration map.
    ConfigMap(ConfigMap),
    /// A secret.
    Secret(Secret),
}

impl Object {
    /// The resource kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Namespace(_) => "Namespace",
            Self::ConfigMap(_) => "ConfigMap",
            Self::Secret(_) => "Secret",
        }
    }

    /// The object name; empty if unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// The object namespace; empty for cluster-scoped objects.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    /// Shared access to the object metadata.
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::Namespace(ns) => &ns.metadata,
            Self::ConfigMap(cm) => &cm.metadata,
            Self::Secret(secret) => &secret.metadata,
        }
    }

    /// Mutable access to the object metadata.
    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Namespace(ns) => &mut ns.metadata,
            Self::ConfigMap(cm) => &mut cm.metadata,
            Self::Secret(secret) => &mut secret.metadata,
        }
    }
}

/// A pod change observed through a watch subscription.
///
/// The upstream watcher collapses additions and modifications into a
/// single apply event; subscribers treat all changes identically, so no
/// information is lost.
#[derive(Clone, Debug)]
pub enum PodEvent {
    /// The pod was added or modified.
    Applied(Pod),
    /// The pod was deleted.
    Deleted(Pod),
}

impl PodEvent {
    /// The pod the event carries.
    #[must_use]
    pub fn pod(&self) -> &Pod {
        match self {
            Self::Applied(pod) | Self::Deleted(pod) => pod,
        }
    }

    /// Consumes the event, returning the pod it carries.
    #[must_use]
    pub fn into_pod(self) -> Pod {
        match self {
            Self::Applied(pod) | Self::Deleted(pod) => pod,
        }
    }
}

/// Options for a container log stream. `None` means unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Container to stream logs from.
    pub container: Option<String>,
    /// Number of lines from the end of the log to show.
    pub tail_lines: Option<i64>,
    /// Maximum number of bytes to return.
    pub limit_bytes: Option<i64>,
    /// Only return logs newer than this many seconds.
    pub since_seconds: Option<i64>,
    /// Only return logs after this time.
    pub since_time: Option<DateTime<Utc>>,
    /// Return logs of the previous container instance.
    pub previous: bool,
    /// Keep the stream open and follow new output.
    pub follow: bool,
    /// Prefix each line with its timestamp.
    pub timestamps: bool,
}

/// A streaming log reader.
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Caller-provided I/O for an exec session.
///
/// Output streams are closed when the session ends, whatever the
/// outcome. When a TTY is requested the remote end multiplexes stderr
/// onto stdout, so a supplied stderr stream stays silent.
pub struct ExecIo {
    /// Bytes to feed to the process's stdin.
    pub stdin: Option<Pin<Box<dyn AsyncRead + Send>>>,
    /// Sink for the process's stdout.
    pub stdout: Option<Pin<Box<dyn AsyncWrite + Send>>>,
    /// Sink for the process's stderr.
    pub stderr: Option<Pin<Box<dyn AsyncWrite + Send>>>,
    /// Whether to allocate a TTY.
    pub tty: bool,
    /// Terminal resize events to forward for the lifetime of the
    /// session.
    pub resize: Option<mpsc::Receiver<TerminalSize>>,
}

impl ExecIo {
    /// I/O carrying no streams at all.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            stdin: None,
            stdout: None,
            stderr: None,
            tty: false,
            resize: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_renders_key_presence() {
        let selector = Selector::HasLabel("actual.vk/node-name".to_string());
        assert_eq!(selector.to_label_selector(), "actual.vk/node-name");
    }

    #[test]
    fn object_exposes_metadata_uniformly() {
        let mut object = Object::Secret(Secret {
            metadata: ObjectMeta {
                namespace: Some("coolns".to_string()),
                name: Some("coolsecret".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        });

        assert_eq!(object.kind(), "Secret");
        assert_eq!(object.name(), "coolsecret");
        assert_eq!(object.namespace(), "coolns");

        object.meta_mut().namespace = Some("otherns".to_string());
        assert_eq!(object.namespace(), "otherns");
    }

    #[test]
    fn namespace_object_has_no_namespace() {
        let object = Object::Namespace(Namespace::default());
        assert_eq!(object.namespace(), "");
    }
}
