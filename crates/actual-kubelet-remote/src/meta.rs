//! Object metadata preparation and recovery.

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use kube::Resource;

use crate::ns::namespace_name;
use crate::{LABEL_NAMESPACE, LABEL_NODE_NAME};

/// Prepares any resource exposing object metadata for submission to a
/// remote cluster by running [`prepare_object_meta`] on it.
pub fn prepare_object<K: Resource>(node_name: &str, object: &mut K) {
    prepare_object_meta(node_name, object.meta_mut());
}

/// Prepares object metadata for submission to a remote cluster.
///
/// Labels relating the object back to its identity on the local cluster
/// are merged in (overwriting on conflict), metadata that belongs to the
/// source cluster only (UID, resource version, self link, owner
/// references, managed fields) is cleared, and the namespace is rewritten
/// to the deterministic remote namespace.
///
/// Must be called exactly once per object: preparing already-prepared
/// metadata re-hashes the already-hashed namespace.
pub fn prepare_object_meta(node_name: &str, meta: &mut ObjectMeta) {
    let local_namespace = meta.namespace.clone().unwrap_or_default();

    // Hint relating the remote resource back to the local resource.
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(LABEL_NODE_NAME.to_string(), node_name.to_string());
    labels.insert(LABEL_NAMESPACE.to_string(), local_namespace.clone());

    // Identity assigned by the local cluster must not cross the boundary.
    // Managed fields must also be empty for server-side apply to accept
    // the object.
    meta.uid = None;
    meta.resource_version = None;
    meta.self_link = None;
    meta.owner_references = None;
    meta.managed_fields = None;

    meta.namespace = Some(namespace_name(node_name, &local_namespace));
}

/// Recovers remote object metadata for representation in the local
/// cluster.
///
/// The local namespace is restored from the namespace label, both
/// identity labels are stripped, all other labels are retained, and
/// metadata assigned by the remote cluster is cleared.
pub fn recover_object_meta(meta: &mut ObjectMeta) {
    if let Some(labels) = meta.labels.take() {
        let mut kept = BTreeMap::new();
        for (key, value) in labels {
            if key == LABEL_NODE_NAME {
                continue;
            }
            if key == LABEL_NAMESPACE {
                meta.namespace = Some(value);
                continue;
            }
            kept.insert(key, value);
        }
        meta.labels = Some(kept);
    }

    meta.uid = None;
    meta.resource_version = None;
    meta.self_link = None;
    meta.owner_references = None;
    meta.managed_fields = None;
}
