//! Pod dependency discovery and resolution.
//!
//! Before a pod can start in the remote cluster, everything its spec
//! references must already exist there: image pull credentials, mounted
//! config maps and secrets, environment sources, and any service account
//! token secret the local cluster issued for it. The finder walks the
//! pod spec and enumerates those references; the fetcher resolves them
//! against the local cluster.

use std::fmt;
use std::sync::Arc;

use actual_kubelet_cluster::{Cluster, Object};
use actual_kubelet_remote::{is_token_volume, prepare_service_account_token_secret};
use k8s_openapi::api::core::v1::{Container, Pod, Volume};

use crate::error::{ProviderError, Result};

/// The kind of resource a pod depends on. Service account token secrets
/// are distinguished from ordinary secrets because they need their type
/// and annotations rewritten before they may enter the remote cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    /// A configuration map.
    ConfigMap,
    /// A secret.
    Secret,
    /// A service account token secret.
    ServiceAccountTokenSecret,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMap => f.write_str("ConfigMap"),
            Self::Secret => f.write_str("Secret"),
            Self::ServiceAccountTokenSecret => f.write_str("ServiceAccountTokenSecret"),
        }
    }
}

/// A resource a pod depends on. Optional dependencies may be absent
/// without failing the pod; required dependencies must resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dependency {
    /// The kind of resource.
    pub kind: DependencyKind,
    /// The resource name, in the pod's namespace.
    pub name: String,
    /// Whether the pod can start without the resource.
    pub optional: bool,
}

/// Enumerates the resources the supplied pod depends on: image pull
/// secrets, then volumes in spec order, then containers followed by init
/// containers. A pure function of the pod spec with stable ordering.
/// Duplicates are not deduplicated; the fetcher tolerates them by
/// re-fetching.
#[must_use]
pub fn find_pod_dependencies(pod: &Pod) -> Vec<Dependency> {
    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };

    let mut deps = Vec::new();

    for reference in spec.image_pull_secrets.iter().flatten() {
        deps.push(Dependency {
            kind: DependencyKind::Secret,
            name: reference.name.clone(),
            // Image pull secrets are optional; a pod will start without
            // one as long as it can pull its image.
            optional: true,
        });
    }

    for volume in spec.volumes.iter().flatten() {
        deps.extend(find_volume_dependencies(volume));
    }

    for container in spec
        .containers
        .iter()
        .chain(spec.init_containers.iter().flatten())
    {
        deps.extend(find_container_dependencies(container));
    }

    deps
}

/// Enumerates the resources a volume depends on. Volume sources other
/// than config maps and secrets contribute nothing.
#[must_use]
pub fn find_volume_dependencies(volume: &Volume) -> Vec<Dependency> {
    if let Some(config_map) = volume.config_map.as_ref() {
        return vec![Dependency {
            kind: DependencyKind::ConfigMap,
            name: config_map.name.clone(),
            optional: config_map.optional.unwrap_or(false),
        }];
    }

    if let Some(secret) = volume.secret.as_ref() {
        let kind = if is_token_volume(volume) {
            DependencyKind::ServiceAccountTokenSecret
        } else {
            DependencyKind::Secret
        };
        return vec![Dependency {
            kind,
            name: secret.secret_name.clone().unwrap_or_default(),
            optional: secret.optional.unwrap_or(false),
        }];
    }

    Vec::new()
}

/// Enumerates the resources a container depends on: `envFrom` sources,
/// then individual env entries drawing their value from a config map or
/// secret key.
#[must_use]
pub fn find_container_dependencies(container: &Container) -> Vec<Dependency> {
    let mut deps = Vec::new();

    for source in container.env_from.iter().flatten() {
        if let Some(config_map) = source.config_map_ref.as_ref() {
            deps.push(Dependency {
                kind: DependencyKind::ConfigMap,
                name: config_map.name.clone(),
                optional: config_map.optional.unwrap_or(false),
            });
        } else if let Some(secret) = source.secret_ref.as_ref() {
            deps.push(Dependency {
                kind: DependencyKind::Secret,
                name: secret.name.clone(),
                optional: secret.optional.unwrap_or(false),
            });
        }
    }

    for var in container.env.iter().flatten() {
        let Some(source) = var.value_from.as_ref() else {
            continue;
        };
        if let Some(config_map) = source.config_map_key_ref.as_ref() {
            deps.push(Dependency {
                kind: DependencyKind::ConfigMap,
                name: config_map.name.clone(),
                optional: config_map.optional.unwrap_or(false),
            });
        } else if let Some(secret) = source.secret_key_ref.as_ref() {
            deps.push(Dependency {
                kind: DependencyKind::Secret,
                name: secret.name.clone(),
                optional: secret.optional.unwrap_or(false),
            });
        }
    }

    deps
}

/// Resolves a pod's dependencies against the local cluster.
pub struct DependencyFetcher {
    local: Arc<dyn Cluster>,
}

impl DependencyFetcher {
    /// Create a fetcher reading from the supplied (local) cluster.
    #[must_use]
    pub fn new(local: Arc<dyn Cluster>) -> Self {
        Self { local }
    }

    /// Fetches every dependency of the pod, preserving finder order.
    ///
    /// Optional dependencies that are absent are skipped. Service
    /// account token secrets have their type and annotations rewritten
    /// so the remote cluster's service account controller leaves them
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDependency`] if a required
    /// dependency is absent, or [`ProviderError::FetchDependency`] if a
    /// read fails for any other reason.
    pub async fn fetch(&self, pod: &Pod) -> Result<Vec<Object>> {
        let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
        let deps = find_pod_dependencies(pod);

        let mut fetched = Vec::with_capacity(deps.len());

        for dep in deps {
            let object = match dep.kind {
                DependencyKind::ConfigMap => {
                    match self.local.get_config_map(namespace, &dep.name).await {
                        Ok(config_map) => Object::ConfigMap(config_map),
                        Err(err) => {
                            if let Some(failure) = missing_or_failed(err, &dep) {
                                return Err(failure);
                            }
                            continue;
                        }
                    }
                }
                DependencyKind::Secret | DependencyKind::ServiceAccountTokenSecret => {
                    match self.local.get_secret(namespace, &dep.name).await {
                        Ok(mut secret) => {
                            if dep.kind == DependencyKind::ServiceAccountTokenSecret {
                                prepare_service_account_token_secret(&mut secret);
                            }
                            Object::Secret(secret)
                        }
                        Err(err) => {
                            if let Some(failure) = missing_or_failed(err, &dep) {
                                return Err(failure);
                            }
                            continue;
                        }
                    }
                }
            };

            fetched.push(object);
        }

        Ok(fetched)
    }
}

/// Maps a failed dependency read to the provider error taxonomy.
/// Returns `None` when the dependency is optional and simply absent.
fn missing_or_failed(
    err: actual_kubelet_cluster::ClusterError,
    dep: &Dependency,
) -> Option<ProviderError> {
    if err.is_not_found() {
        if dep.optional {
            return None;
        }
        return Some(ProviderError::MissingDependency {
            kind: dep.kind,
            name: dep.name.clone(),
        });
    }
    Some(ProviderError::FetchDependency(err))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use actual_kubelet_cluster::mock::MockCluster;
    use actual_kubelet_remote::{
        ANNOTATION_BUILTIN_SERVICE_ACCOUNT_NAME, ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID,
        ANNOTATION_SERVICE_ACCOUNT_NAME, SECRET_TYPE_BUILTIN_SERVICE_ACCOUNT_TOKEN,
        SECRET_TYPE_REPLICATED_SERVICE_ACCOUNT_TOKEN,
    };
    use k8s_openapi::api::core::v1::{
        ConfigMapVolumeSource, EnvFromSource, EnvVar, EnvVarSource, LocalObjectReference, PodSpec,
        Secret, SecretEnvSource, SecretKeySelector, SecretVolumeSource,
    };
    use kube::api::ObjectMeta;

    use super::*;

    fn secret_env_var(secret: &str) -> EnvVar {
        EnvVar {
            name: "from-secret".to_string(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.to_string(),
                    key: "key".to_string(),
                    optional: None,
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        }
    }

    fn secret_volume(name: &str, secret: &str) -> Volume {
        Volume {
            name: name.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.to_string()),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        }
    }

    fn local_secret(namespace: &str, name: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        }
    }

    #[test]
    fn pod_dependencies_walk_in_spec_order() {
        let pod = Pod {
            spec: Some(PodSpec {
                image_pull_secrets: Some(vec![LocalObjectReference {
                    name: "ips".to_string(),
                }]),
                volumes: Some(vec![secret_volume("vol", "vs")]),
                containers: vec![Container {
                    env: Some(vec![secret_env_var("cs")]),
                    ..Container::default()
                }],
                init_containers: Some(vec![Container {
                    env: Some(vec![secret_env_var("ics")]),
                    ..Container::default()
                }]),
                ..PodSpec::default()
            }),
            ..Pod::default()
        };

        assert_eq!(
            find_pod_dependencies(&pod),
            vec![
                Dependency {
                    kind: DependencyKind::Secret,
                    name: "ips".to_string(),
                    optional: true,
                },
                Dependency {
                    kind: DependencyKind::Secret,
                    name: "vs".to_string(),
                    optional: false,
                },
                Dependency {
                    kind: DependencyKind::Secret,
                    name: "cs".to_string(),
                    optional: false,
                },
                Dependency {
                    kind: DependencyKind::Secret,
                    name: "ics".to_string(),
                    optional: false,
                },
            ]
        );
    }

    #[test]
    fn volume_dependencies_cover_config_maps_and_secrets() {
        let required = Volume {
            config_map: Some(ConfigMapVolumeSource {
                name: "rcm".to_string(),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        };
        assert_eq!(
            find_volume_dependencies(&required),
            vec![Dependency {
                kind: DependencyKind::ConfigMap,
                name: "rcm".to_string(),
                optional: false,
            }]
        );

        let optional = Volume {
            secret: Some(SecretVolumeSource {
                secret_name: Some("os".to_string()),
                optional: Some(true),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        };
        assert_eq!(
            find_volume_dependencies(&optional),
            vec![Dependency {
                kind: DependencyKind::Secret,
                name: "os".to_string(),
                optional: true,
            }]
        );

        assert_eq!(find_volume_dependencies(&Volume::default()), Vec::new());
    }

    #[test]
    fn token_volumes_yield_token_secret_dependencies() {
        let volume = secret_volume("secret-token-secret", "secret-token-secret");
        assert_eq!(
            find_volume_dependencies(&volume),
            vec![Dependency {
                kind: DependencyKind::ServiceAccountTokenSecret,
                name: "secret-token-secret".to_string(),
                optional: false,
            }]
        );
    }

    #[test]
    fn container_env_is_walked_even_without_env_from() {
        let container = Container {
            env: Some(vec![secret_env_var("rs")]),
            ..Container::default()
        };

        assert_eq!(
            find_container_dependencies(&container),
            vec![Dependency {
                kind: DependencyKind::Secret,
                name: "rs".to_string(),
                optional: false,
            }]
        );
    }

    #[test]
    fn container_env_from_precedes_env() {
        let container = Container {
            env_from: Some(vec![EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: "from".to_string(),
                    optional: Some(true),
                }),
                ..EnvFromSource::default()
            }]),
            env: Some(vec![secret_env_var("var")]),
            ..Container::default()
        };

        assert_eq!(
            find_container_dependencies(&container),
            vec![
                Dependency {
                    kind: DependencyKind::Secret,
                    name: "from".to_string(),
                    optional: true,
                },
                Dependency {
                    kind: DependencyKind::Secret,
                    name: "var".to_string(),
                    optional: false,
                },
            ]
        );
    }

    #[test]
    fn duplicate_dependencies_are_reported_as_is() {
        let pod = Pod {
            spec: Some(PodSpec {
                volumes: Some(vec![
                    secret_volume("a", "shared"),
                    secret_volume("b", "shared"),
                ]),
                containers: vec![Container::default()],
                ..PodSpec::default()
            }),
            ..Pod::default()
        };

        assert_eq!(find_pod_dependencies(&pod).len(), 2);
    }

    fn pod_with_volume_secret(namespace: &str, volume: &str, secret: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                namespace: Some(namespace.to_string()),
                name: Some("coolpod".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                volumes: Some(vec![secret_volume(volume, secret)]),
                containers: vec![Container::default()],
                ..PodSpec::default()
            }),
            ..Pod::default()
        }
    }

    #[tokio::test]
    async fn fetch_resolves_dependencies_in_order() {
        let local = Arc::new(MockCluster::new());
        local.insert_secret(local_secret("coolns", "first"));
        local.insert_secret(local_secret("coolns", "second"));

        let pod = Pod {
            metadata: ObjectMeta {
                namespace: Some("coolns".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                volumes: Some(vec![
                    secret_volume("a", "first"),
                    secret_volume("b", "second"),
                ]),
                containers: vec![Container::default()],
                ..PodSpec::default()
            }),
            ..Pod::default()
        };

        let fetcher = DependencyFetcher::new(local);
        let fetched = fetcher.fetch(&pod).await.unwrap();

        let names: Vec<_> = fetched.iter().map(Object::name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn fetch_skips_missing_optional_dependencies() {
        let local = Arc::new(MockCluster::new());

        let pod = Pod {
            metadata: ObjectMeta {
                namespace: Some("coolns".to_string()),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                image_pull_secrets: Some(vec![LocalObjectReference {
                    name: "ips".to_string(),
                }]),
                containers: vec![Container::default()],
                ..PodSpec::default()
            }),
            ..Pod::default()
        };

        let fetcher = DependencyFetcher::new(local);
        assert!(fetcher.fetch(&pod).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_fails_on_missing_required_dependency() {
        let local = Arc::new(MockCluster::new());
        let pod = pod_with_volume_secret("coolns", "vol", "vs");

        let fetcher = DependencyFetcher::new(local);
        let err = fetcher.fetch(&pod).await.unwrap_err();

        match err {
            ProviderError::MissingDependency { kind, name } => {
                assert_eq!(kind, DependencyKind::Secret);
                assert_eq!(name, "vs");
            }
            other => panic!("expected MissingDependency, got {other}"),
        }
    }

    #[tokio::test]
    async fn fetch_surfaces_other_read_errors() {
        let local = Arc::new(MockCluster::new());
        local.fail_secret_reads();
        let pod = pod_with_volume_secret("coolns", "vol", "vs");

        let fetcher = DependencyFetcher::new(local);
        let err = fetcher.fetch(&pod).await.unwrap_err();
        assert!(matches!(err, ProviderError::FetchDependency(_)));
    }

    #[tokio::test]
    async fn fetch_rewrites_token_secrets() {
        let local = Arc::new(MockCluster::new());
        let mut token = local_secret("coolns", "cool-token-randm");
        token.metadata.annotations = Some(BTreeMap::from([
            (
                ANNOTATION_BUILTIN_SERVICE_ACCOUNT_NAME.to_string(),
                "acct".to_string(),
            ),
            (
                ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID.to_string(),
                "no-you-id".to_string(),
            ),
        ]));
        token.type_ = Some(SECRET_TYPE_BUILTIN_SERVICE_ACCOUNT_TOKEN.to_string());
        local.insert_secret(token);

        let pod = pod_with_volume_secret("coolns", "cool-token-randm", "cool-token-randm");

        let fetcher = DependencyFetcher::new(local);
        let fetched = fetcher.fetch(&pod).await.unwrap();

        let Object::Secret(secret) = &fetched[0] else {
            panic!("expected a secret");
        };
        assert_eq!(
            secret.type_.as_deref(),
            Some(SECRET_TYPE_REPLICATED_SERVICE_ACCOUNT_TOKEN)
        );
        let annotations = secret.metadata.annotations.as_ref().unwrap();
        assert_eq!(
            annotations.get(ANNOTATION_SERVICE_ACCOUNT_NAME),
            Some(&"acct".to_string())
        );
        assert!(!annotations.contains_key(ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID));
    }
}
