//! Synthetic node status.
//!
//! The node object the local cluster sees is metadata only: containers
//! run in the remote cluster, so capacity cannot be measured and the
//! conditions are unconditionally healthy.

use chrono::Utc;
use k8s_openapi::api::core::v1::{
    DaemonEndpoint, Node, NodeAddress, NodeCondition, NodeDaemonEndpoints, NodeStatus,
    NodeSystemInfo,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use crate::config::NodeConfig;

/// Stamps the supplied node with the operating system, internal IP,
/// daemon endpoint, configured allocatable resources, and a fixed set of
/// healthy conditions.
pub fn configure_node(node: &mut Node, config: &NodeConfig) {
    let status = node.status.get_or_insert_with(NodeStatus::default);

    status
        .node_info
        .get_or_insert_with(NodeSystemInfo::default)
        .operating_system = config.operating_system.clone();

    status.addresses = Some(vec![NodeAddress {
        type_: "InternalIP".to_string(),
        address: config.internal_ip.clone(),
    }]);

    status.daemon_endpoints = Some(NodeDaemonEndpoints {
        kubelet_endpoint: Some(DaemonEndpoint {
            port: config.daemon_port,
        }),
    });

    status.allocatable = Some(
        config
            .resources
            .allocatable
            .iter()
            .map(|(name, value)| (name.clone(), Quantity(value.clone())))
            .collect(),
    );

    status.conditions = Some(healthy_conditions());
}

fn healthy_conditions() -> Vec<NodeCondition> {
    let now = Time(Utc::now());
    let condition = |type_: &str, status: &str, reason: &str, message: &str| NodeCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_heartbeat_time: Some(now.clone()),
        last_transition_time: Some(now.clone()),
    };

    vec![
        condition("Ready", "True", "KubeletReady", "kubelet is ready."),
        condition(
            "MemoryPressure",
            "False",
            "KubeletHasSufficientMemory",
            "kubelet has sufficient memory available",
        ),
        condition(
            "DiskPressure",
            "False",
            "KubeletHasNoDiskPressure",
            "kubelet has no disk pressure",
        ),
        condition(
            "PIDPressure",
            "False",
            "KubeletHasSufficientPID",
            "kubelet has sufficient PID available",
        ),
        condition(
            "NetworkUnavailable",
            "False",
            "RouteCreated",
            "RouteController created a route",
        ),
    ]
}
