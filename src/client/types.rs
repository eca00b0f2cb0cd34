//! Types for parsed Valkey cluster information.
//!
//! These types represent the parsed output of the admin tool's
//! `cluster nodes` and `cluster info` commands. They are rebuilt from scratch
//! on every query; nothing here caches topology.

use serde::Serialize;

use crate::slots::distribution::{SlotRange, TOTAL_SLOTS, total_slot_count};

use super::parsing;

/// State of the Valkey cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    /// Cluster is healthy and serving requests.
    Ok,
    /// Cluster is in a failed state.
    Fail,
    /// `cluster_state` was missing or carried an unrecognized value.
    #[default]
    Unknown,
}

impl From<&str> for ClusterState {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => ClusterState::Ok,
            "fail" => ClusterState::Fail,
            _ => ClusterState::Unknown,
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterState::Ok => write!(f, "ok"),
            ClusterState::Fail => write!(f, "fail"),
            ClusterState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Parsed output of `cluster info`.
///
/// Fields absent from the output, or holding malformed numbers, are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterInfo {
    /// Current state of the cluster.
    pub state: ClusterState,
    /// Number of hash slots assigned.
    pub slots_assigned: u32,
    /// Number of hash slots that are OK (served by nodes).
    pub slots_ok: u32,
    /// Number of hash slots in PFAIL state.
    pub slots_pfail: u32,
    /// Number of hash slots in FAIL state.
    pub slots_fail: u32,
    /// Total number of known nodes in the cluster.
    pub known_nodes: u32,
    /// Number of master nodes serving at least one slot.
    pub size: u32,
    /// Epoch of the queried node.
    pub my_epoch: u64,
}

impl ClusterInfo {
    /// Parse the output of `cluster info`.
    pub fn parse(info: &str) -> Self {
        parsing::parse_cluster_info(info)
    }

    /// Check if all slots are assigned.
    pub fn all_slots_assigned(&self) -> bool {
        self.slots_assigned == u32::from(TOTAL_SLOTS)
    }

    /// Check if the cluster is healthy.
    pub fn is_healthy(&self) -> bool {
        self.state == ClusterState::Ok && self.slots_fail == 0 && self.slots_pfail == 0
    }
}

/// Role and status tokens of a node, in listing order.
///
/// Unknown tokens are kept so that newer tool versions don't lose information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NodeFlags(Vec<String>);

impl NodeFlags {
    /// Parse the comma-separated flags field.
    pub fn parse(flags_str: &str) -> Self {
        Self(
            flags_str
                .split(',')
                .map(str::trim)
                .filter(|flag| !flag.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Check whether a flag token is present.
    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f == flag)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The node replicates another node.
    pub fn is_replica(&self) -> bool {
        self.contains("slave")
    }

    pub fn is_master(&self) -> bool {
        self.contains("master")
    }

    pub fn is_myself(&self) -> bool {
        self.contains("myself")
    }

    /// Node is in FAIL or PFAIL state.
    pub fn is_failing(&self) -> bool {
        self.contains("fail") || self.contains("fail?") || self.contains("pfail")
    }
}

impl std::fmt::Display for NodeFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// A cluster node as reported by `cluster nodes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterNode {
    /// Node ID (40 hex characters on a real cluster).
    pub id: String,
    /// Node address, without the client port.
    pub host: String,
    /// Client port, or 0 when the address carries none.
    pub port: u16,
    /// Cluster bus port.
    pub cluster_port: u16,
    /// Node flags.
    pub flags: NodeFlags,
    /// Master node ID, set only for replicas.
    pub master_id: Option<String>,
    /// Link state ("connected" or "disconnected").
    pub link_state: String,
    /// Slot ranges owned by this node (masters only).
    pub slots: Vec<SlotRange>,
}

impl ClusterNode {
    /// Parse a single line of `cluster nodes` output.
    pub fn parse_line(line: &str) -> Self {
        parsing::parse_node_line(line)
    }

    pub fn is_master(&self) -> bool {
        self.flags.is_master() && !self.flags.is_replica()
    }

    pub fn is_replica(&self) -> bool {
        self.flags.is_replica()
    }

    pub fn is_myself(&self) -> bool {
        self.flags.is_myself()
    }

    pub fn is_connected(&self) -> bool {
        self.link_state == "connected"
    }

    /// Get total number of slots owned by this node.
    pub fn slot_count(&self) -> u32 {
        total_slot_count(&self.slots)
    }

    /// Lowest slot owned by this node.
    pub fn first_slot(&self) -> Option<u16> {
        self.slots.iter().map(|r| r.start).min()
    }

    /// Highest slot owned by this node.
    pub fn last_slot(&self) -> Option<u16> {
        self.slots.iter().map(|r| r.end).max()
    }

    /// A master currently serving at least one slot.
    pub fn is_slotted_master(&self) -> bool {
        self.is_master() && !self.slots.is_empty()
    }
}

/// Parsed output of `cluster nodes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParsedClusterNodes {
    /// All nodes in the cluster, in listing order.
    pub nodes: Vec<ClusterNode>,
}

impl ParsedClusterNodes {
    /// Parse the output of `cluster nodes`.
    pub fn parse(output: &str) -> Self {
        parsing::parse_cluster_nodes(output)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get all master nodes.
    pub fn masters(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_master()).collect()
    }

    /// Get all replica nodes.
    pub fn replicas(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_replica()).collect()
    }

    /// Masters that own no slots yet (freshly added nodes).
    pub fn slotless_masters(&self) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| n.is_master() && n.slots.is_empty())
            .collect()
    }

    /// Get the local node (marked with "myself" flag).
    pub fn myself(&self) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.is_myself())
    }

    /// Get replicas of a specific master.
    pub fn replicas_of(&self, master_id: &str) -> Vec<&ClusterNode> {
        self.nodes
            .iter()
            .filter(|n| n.master_id.as_deref() == Some(master_id))
            .collect()
    }

    /// Get a node by its ID.
    pub fn get_node(&self, node_id: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Get total number of slots assigned to masters.
    pub fn total_slots_assigned(&self) -> u32 {
        self.masters().iter().map(|m| m.slot_count()).sum()
    }

    /// Check if all slots are assigned.
    pub fn all_slots_assigned(&self) -> bool {
        self.total_slots_assigned() == u32::from(TOTAL_SLOTS)
    }
}
