//! Deterministic mapping from local namespaces to remote namespace names.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;

use crate::{LABEL_NAMESPACE, LABEL_NODE_NAME};

const FNV1_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV1_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1 (multiply then xor, unlike the more common FNV-1a) over the raw
/// bytes of the input. The `fnv` crate implements FNV-1a, which produces
/// different digests, so the round is spelled out here and pinned by the
/// test vector below.
fn fnv1_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV1_OFFSET_BASIS;
    for &b in bytes {
        hash = hash.wrapping_mul(FNV1_PRIME);
        hash ^= u64::from(b);
    }
    hash
}

/// Returns the remote namespace name for a local namespace.
///
/// Remote namespaces are named `<node-name>-<16 lowercase hex digits>`,
/// where the digits are the FNV-1 64-bit hash of the local namespace
/// name. Each remote namespace corresponds to a single local namespace
/// as long as all kubelet node names are unique within the remote
/// cluster; distinct node names can never collide because the node name
/// is a verbatim prefix. Callers are responsible for the node name being
/// a legal RFC-1123 name segment.
#[must_use]
pub fn namespace_name(node_name: &str, local_namespace: &str) -> String {
    format!("{node_name}-{:016x}", fnv1_64(local_namespace.as_bytes()))
}

/// Returns the remote [`Namespace`] corresponding to a local namespace.
///
/// It assumes a many-to-one local-to-remote relationship, allowing many
/// local clusters to run pods (and their dependencies) in one remote
/// cluster. The namespace carries both identity labels so the mapping
/// can be reversed.
#[must_use]
pub fn namespace(node_name: &str, local_namespace: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(namespace_name(node_name, local_namespace)),
            labels: Some(BTreeMap::from([
                (LABEL_NODE_NAME.to_string(), node_name.to_string()),
                (LABEL_NAMESPACE.to_string(), local_namespace.to_string()),
            ])),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_name_is_node_name_plus_fnv1_hash() {
        assert_eq!(
            namespace_name("coolnode", "coolns"),
            "coolnode-ae69504377748847"
        );
    }

    #[test]
    fn namespace_name_depends_on_both_inputs() {
        let base = namespace_name("coolnode", "coolns");
        assert_ne!(namespace_name("othernode", "coolns"), base);
        assert_ne!(namespace_name("coolnode", "otherns"), base);
        assert_eq!(namespace_name("coolnode", "coolns"), base);
    }

    #[test]
    fn namespace_carries_identity_labels() {
        let ns = namespace("coolnode", "coolns");

        assert_eq!(
            ns.metadata.name.as_deref(),
            Some("coolnode-ae69504377748847")
        );
        let labels = ns.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.get(LABEL_NODE_NAME), Some(&"coolnode".to_string()));
        assert_eq!(labels.get(LABEL_NAMESPACE), Some(&"coolns".to_string()));
    }
}
