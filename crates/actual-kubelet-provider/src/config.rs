//! Provider configuration.
//!
//! The provider reads a single TOML file naming the two clusters it
//! bridges, environment variables to merge into every pod, and the
//! resources the synthetic node advertises. Configuration problems are
//! fatal before serving.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::EnvVar;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path:?}")]
    Read {
        /// Path of the unreadable file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file could not be parsed.
    #[error("cannot parse config file")]
    Parse(#[from] toml::de::Error),

    /// No remote kubeconfig path was supplied. Without one the provider
    /// would use a single API server as both local and remote, which
    /// results in an endless loop of pod creation.
    #[error("remote kubeconfig path is required")]
    MissingRemoteKubeconfig,

    /// A resync interval could not be parsed.
    #[error("cannot parse {value:?} as a duration")]
    InvalidDuration {
        /// The offending value.
        value: String,
        /// Underlying parse error.
        #[source]
        source: humantime::DurationError,
    },

    /// An allocatable resource value could not be parsed as a quantity.
    #[error("cannot parse {value:?} as a {name:?} resource quantity")]
    InvalidQuantity {
        /// The resource name.
        name: String,
        /// The offending value.
        value: String,
    },
}

/// How to reach one cluster.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ClientConfig {
    /// Path to a kubeconfig file. An empty local path falls back to the
    /// usual inference rules; the remote path is required.
    #[serde(default)]
    pub kubeconfig_path: String,

    /// How long a watch page stays open before the client re-lists, as a
    /// humantime string such as `"1m"`.
    #[serde(default)]
    pub resync_interval: Option<String>,
}

impl ClientConfig {
    /// The parsed resync interval, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDuration`] if the value does not
    /// parse.
    pub fn resync(&self) -> Result<Option<Duration>, ConfigError> {
        self.resync_interval
            .as_deref()
            .map(|value| {
                humantime::parse_duration(value).map_err(|source| ConfigError::InvalidDuration {
                    value: value.to_string(),
                    source,
                })
            })
            .transpose()
    }
}

/// Pod-level configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PodsConfig {
    /// Environment variables merged into every container of every pod,
    /// replacing same-named entries.
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

/// What the synthetic node advertises to the local cluster.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// Operating system reported in the node status.
    #[serde(default = "NodeConfig::default_operating_system")]
    pub operating_system: String,

    /// Internal IP address reported in the node status.
    #[serde(default = "NodeConfig::default_internal_ip")]
    pub internal_ip: String,

    /// Port the kubelet daemon endpoint reports.
    #[serde(default = "NodeConfig::default_daemon_port")]
    pub daemon_port: i32,

    /// Advertised node resources.
    #[serde(default)]
    pub resources: NodeResourcesConfig,
}

impl NodeConfig {
    fn default_operating_system() -> String {
        "linux".to_string()
    }

    fn default_internal_ip() -> String {
        "127.0.0.1".to_string()
    }

    const fn default_daemon_port() -> i32 {
        10250
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            operating_system: Self::default_operating_system(),
            internal_ip: Self::default_internal_ip(),
            daemon_port: Self::default_daemon_port(),
            resources: NodeResourcesConfig::default(),
        }
    }
}

/// Resources the synthetic node advertises as allocatable.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeResourcesConfig {
    /// Mapping from resource name to quantity string. The remote cluster
    /// may autoscale, so real capacity cannot be measured; these values
    /// are advertised as-is.
    #[serde(default = "NodeResourcesConfig::default_allocatable")]
    pub allocatable: BTreeMap<String, String>,
}

impl NodeResourcesConfig {
    fn default_allocatable() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("cpu".to_string(), "100".to_string()),
            ("memory".to_string(), "1024G".to_string()),
            ("storage".to_string(), "100000G".to_string()),
            ("pods".to_string(), "1000".to_string()),
        ])
    }
}

impl Default for NodeResourcesConfig {
    fn default() -> Self {
        Self {
            allocatable: Self::default_allocatable(),
        }
    }
}

/// The provider config file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// The cluster the synthetic node registers with.
    #[serde(default)]
    pub local: ClientConfig,

    /// The cluster that actually runs the containers.
    #[serde(default)]
    pub remote: ClientConfig,

    /// Pod-level configuration.
    #[serde(default)]
    pub pods: PodsConfig,

    /// Node-level configuration.
    #[serde(default)]
    pub node: NodeConfig,
}

impl ConfigFile {
    /// Reads, parses, and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed,
    /// or if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the remote kubeconfig path is
    /// missing, a resync interval does not parse, or an allocatable
    /// resource value is not a valid quantity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.kubeconfig_path.is_empty() {
            return Err(ConfigError::MissingRemoteKubeconfig);
        }
        self.local.resync()?;
        self.remote.resync()?;
        for (name, value) in &self.node.resources.allocatable {
            if !is_valid_quantity(value) {
                return Err(ConfigError::InvalidQuantity {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Checks a string against the Kubernetes resource quantity grammar: an
/// optionally signed decimal number followed by a binary-SI, decimal-SI,
/// or decimal-exponent suffix.
fn is_valid_quantity(value: &str) -> bool {
    let rest = value.strip_prefix(['+', '-']).unwrap_or(value);
    let suffix_start = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(suffix_start);

    if !is_valid_quantity_number(number) {
        return false;
    }

    match suffix {
        "" | "n" | "u" | "m" | "k" | "M" | "G" | "T" | "P" | "E" => true,
        "Ki" | "Mi" | "Gi" | "Ti" | "Pi" | "Ei" => true,
        exponent => {
            let Some(digits) = exponent.strip_prefix(['e', 'E']) else {
                return false;
            };
            let digits = digits.strip_prefix(['+', '-']).unwrap_or(digits);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
    }
}

fn is_valid_quantity_number(number: &str) -> bool {
    let mut saw_digit = false;
    let mut saw_dot = false;
    for c in number.chars() {
        match c {
            '0'..='9' => saw_digit = true,
            '.' if !saw_dot => saw_dot = true,
            _ => return false,
        }
    }
    saw_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [local]
        kubeconfig_path = "/kcfg-local"
        resync_interval = "1m"

        [remote]
        kubeconfig_path = "/kcfg"

        [pods]
        env = [{ name = "var", value = "val" }]

        [node.resources.allocatable]
        coolness = "1000m"
    "#;

    #[test]
    fn sample_config_parses_and_validates() {
        let config: ConfigFile = toml::from_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.local.kubeconfig_path, "/kcfg-local");
        assert_eq!(
            config.local.resync().unwrap(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.remote.kubeconfig_path, "/kcfg");
        assert_eq!(config.remote.resync().unwrap(), None);

        assert_eq!(config.pods.env.len(), 1);
        assert_eq!(config.pods.env[0].name, "var");
        assert_eq!(config.pods.env[0].value.as_deref(), Some("val"));

        assert_eq!(
            config.node.resources.allocatable.get("coolness"),
            Some(&"1000m".to_string())
        );
    }

    #[test]
    fn remote_kubeconfig_path_is_required() {
        let config = ConfigFile::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRemoteKubeconfig)
        ));
    }

    #[test]
    fn unparsable_quantities_are_rejected() {
        let mut config = ConfigFile {
            remote: ClientConfig {
                kubeconfig_path: "/kcfg".to_string(),
                resync_interval: None,
            },
            ..ConfigFile::default()
        };
        config
            .node
            .resources
            .allocatable
            .insert("coolness".to_string(), "wat".to_string());

        match config.validate() {
            Err(ConfigError::InvalidQuantity { name, value }) => {
                assert_eq!(name, "coolness");
                assert_eq!(value, "wat");
            }
            other => panic!("expected InvalidQuantity, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_durations_are_rejected() {
        let config = ConfigFile {
            remote: ClientConfig {
                kubeconfig_path: "/kcfg".to_string(),
                resync_interval: Some("wat".to_string()),
            },
            ..ConfigFile::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn default_node_config_advertises_fixed_resources() {
        let config = NodeConfig::default();
        assert_eq!(config.operating_system, "linux");
        assert_eq!(config.daemon_port, 10250);
        assert_eq!(
            config.resources.allocatable.get("cpu"),
            Some(&"100".to_string())
        );
        assert_eq!(
            config.resources.allocatable.get("pods"),
            Some(&"1000".to_string())
        );
    }

    #[test]
    fn quantity_grammar() {
        for valid in ["100", "1000m", "1024G", "100000G", "1.5Gi", "-2", "3e2", "1E", "+4Ki"] {
            assert!(is_valid_quantity(valid), "{valid} should be valid");
        }
        for invalid in ["wat", "", "1.2.3", "m", "1x", "e2", "1e", "1.Gi."] {
            assert!(!is_valid_quantity(invalid), "{invalid} should be invalid");
        }
    }
}
