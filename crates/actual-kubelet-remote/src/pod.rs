//! Pod-specific preparation and recovery.

use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::core::v1::{Container, EnvVar, Pod};

use crate::meta::{prepare_object_meta, recover_object_meta};
use crate::ANNOTATION_SERVICE_ACCOUNT_NAME;

/// Prepares a pod for submission to a remote cluster.
///
/// On top of [`prepare_object_meta`], service account machinery is
/// disabled (any token the pod needs is replicated from the local
/// cluster and mounted directly, and the remote cluster's service
/// account controller must not override it), the supplied environment
/// variables are injected into every container, and spec fields that
/// could influence scheduling on the remote cluster are removed.
///
/// A non-empty service account name is preserved in the
/// [`ANNOTATION_SERVICE_ACCOUNT_NAME`] annotation before both binding
/// fields are cleared.
pub fn prepare_pod(node_name: &str, pod: &mut Pod, env: &[EnvVar]) {
    prepare_object_meta(node_name, &mut pod.metadata);

    let Some(spec) = pod.spec.as_mut() else {
        return;
    };

    spec.automount_service_account_token = Some(false);
    let bindings = [spec.service_account.take(), spec.service_account_name.take()];
    for name in bindings.into_iter().flatten() {
        if !name.is_empty() {
            pod.metadata
                .annotations
                .get_or_insert_with(BTreeMap::new)
                .insert(ANNOTATION_SERVICE_ACCOUNT_NAME.to_string(), name);
        }
    }

    if let Some(init_containers) = spec.init_containers.as_deref_mut() {
        set_env_vars(init_containers, env);
    }
    set_env_vars(&mut spec.containers, env);

    spec.node_name = None;
    spec.node_selector = None;
    spec.affinity = None;
    spec.topology_spread_constraints = None;
}

/// Injects the supplied environment variables into every container.
///
/// Existing entries whose name matches a supplied name (compared
/// case-insensitively) are removed, then all supplied entries are
/// appended at the end in caller order. A no-op when either side is
/// empty.
pub fn set_env_vars(containers: &mut [Container], vars: &[EnvVar]) {
    if containers.is_empty() || vars.is_empty() {
        return;
    }

    let replaced: HashSet<String> = vars.iter().map(|v| v.name.to_uppercase()).collect();

    for container in containers {
        let mut env = container.env.take().unwrap_or_default();
        env.retain(|e| !replaced.contains(&e.name.to_uppercase()));
        env.extend(vars.iter().cloned());
        container.env = Some(env);
    }
}

/// Prepares the supplied remote pod to be updated in accordance with the
/// supplied local pod.
///
/// Only labels and annotations are reconciled after creation; the remote
/// spec is deliberately left untouched.
pub fn prepare_pod_update(node_name: &str, local: &Pod, remote: &mut Pod) {
    let mut meta = local.metadata.clone();
    prepare_object_meta(node_name, &mut meta);
    remote.metadata.labels = meta.labels;
    remote.metadata.annotations = meta.annotations;
}

/// Recovers a remote pod for representation in the local cluster.
///
/// On top of [`recover_object_meta`], scheduling fields filled in by the
/// remote cluster are removed so they cannot confuse the local
/// scheduler.
pub fn recover_pod(pod: &mut Pod) {
    recover_object_meta(&mut pod.metadata);

    if let Some(spec) = pod.spec.as_mut() {
        spec.node_name = None;
        spec.node_selector = None;
        spec.affinity = None;
        spec.topology_spread_constraints = None;
    }
}
