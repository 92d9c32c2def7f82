//! Service account token volume detection and secret preparation.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Secret, Volume};

use crate::{
    ANNOTATION_BUILTIN_SERVICE_ACCOUNT_NAME, ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID,
    ANNOTATION_SERVICE_ACCOUNT_NAME, SECRET_TYPE_REPLICATED_SERVICE_ACCOUNT_TOKEN,
};

/// Returns true if the supplied volume is (very likely to be) a service
/// account token volume: it is backed by a secret, and both the volume
/// name and the secret name contain the `-token-` substring the service
/// account controller uses when naming token secrets.
#[must_use]
pub fn is_token_volume(volume: &Volume) -> bool {
    let Some(secret) = volume.secret.as_ref() else {
        return false;
    };
    if !volume.name.contains("-token-") {
        return false;
    }
    secret
        .secret_name
        .as_deref()
        .is_some_and(|name| name.contains("-token-"))
}

/// Updates the type and annotations of a replicated service account
/// token secret.
///
/// The built-in UID annotation is dropped, the built-in name annotation
/// is rewritten to [`ANNOTATION_SERVICE_ACCOUNT_NAME`], and the secret
/// type is set to the replicated-token marker, all so the remote
/// cluster's service account controller does not garbage collect or
/// otherwise interfere with the secret.
pub fn prepare_service_account_token_secret(secret: &mut Secret) {
    if let Some(annotations) = secret.metadata.annotations.take() {
        let mut kept = BTreeMap::new();
        for (key, value) in annotations {
            if key == ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID {
                continue;
            }
            if key == ANNOTATION_BUILTIN_SERVICE_ACCOUNT_NAME {
                kept.insert(ANNOTATION_SERVICE_ACCOUNT_NAME.to_string(), value);
                continue;
            }
            kept.insert(key, value);
        }
        secret.metadata.annotations = Some(kept);
    }
    secret.type_ = Some(SECRET_TYPE_REPLICATED_SERVICE_ACCOUNT_TOKEN.to_string());
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::SecretVolumeSource;
    use kube::api::ObjectMeta;

    use super::*;
    use crate::SECRET_TYPE_BUILTIN_SERVICE_ACCOUNT_TOKEN;

    #[test]
    fn volume_without_a_secret_is_not_a_token_volume() {
        assert!(!is_token_volume(&Volume::default()));
    }

    #[test]
    fn volume_name_must_contain_token() {
        let volume = Volume {
            secret: Some(SecretVolumeSource::default()),
            ..Volume::default()
        };
        assert!(!is_token_volume(&volume));
    }

    #[test]
    fn secret_name_must_contain_token() {
        let volume = Volume {
            name: "cool-token-randm".to_string(),
            secret: Some(SecretVolumeSource::default()),
            ..Volume::default()
        };
        assert!(!is_token_volume(&volume));
    }

    #[test]
    fn matching_volume_and_secret_names_make_a_token_volume() {
        let volume = Volume {
            name: "cool-token-randm".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some("cool-token-randm".to_string()),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        };
        assert!(is_token_volume(&volume));
    }

    #[test]
    fn token_secret_annotations_and_type_are_rewritten() {
        let mut secret = Secret {
            metadata: ObjectMeta {
                annotations: Some(BTreeMap::from([
                    (
                        ANNOTATION_BUILTIN_SERVICE_ACCOUNT_NAME.to_string(),
                        "acct".to_string(),
                    ),
                    (
                        ANNOTATION_BUILTIN_SERVICE_ACCOUNT_UID.to_string(),
                        "no-you-id".to_string(),
                    ),
                    ("cool".to_string(), "true".to_string()),
                ])),
                ..ObjectMeta::default()
            },
            type_: Some(SECRET_TYPE_BUILTIN_SERVICE_ACCOUNT_TOKEN.to_string()),
            ..Secret::default()
        };

        prepare_service_account_token_secret(&mut secret);

        assert_eq!(
            secret.metadata.annotations,
            Some(BTreeMap::from([
                (
                    ANNOTATION_SERVICE_ACCOUNT_NAME.to_string(),
                    "acct".to_string()
                ),
                ("cool".to_string(), "true".to_string()),
            ]))
        );
        assert_eq!(
            secret.type_.as_deref(),
            Some(SECRET_TYPE_REPLICATED_SERVICE_ACCOUNT_TOKEN)
        );
    }
}
