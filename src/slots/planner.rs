//! Reshard planning - computes what needs to move, no I/O.
//!
//! Each planner looks at one topology snapshot and returns the reshard
//! step(s) to execute. Nothing is re-checked between planning and execution;
//! callers must not run concurrent rebalances against the same cluster.

use std::fmt;

use rand::Rng;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::client::types::{ClusterNode, ParsedClusterNodes};

use super::distribution::{TOTAL_SLOTS, slots_per_node};

/// Source sentinel telling the admin tool to take slots from every master.
pub const ALL_SOURCES: &str = "all";

/// Topology preconditions that stop a plan before any command runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("node {0} not found in cluster topology")]
    NodeNotFound(String),

    #[error("node {0} is a replica, not a master")]
    NotMaster(String),

    #[error("node {0} owns no slots")]
    NoSlots(String),

    #[error("no master owns the slots bordering {node_id} ({first_slot}-{last_slot})")]
    NoBorderNode {
        node_id: String,
        first_slot: u16,
        last_slot: u16,
    },

    #[error("source and target are the same node {0}")]
    SameNode(String),
}

/// Where a reshard takes its slots from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Every master contributes.
    All,
    /// One specific node gives up slots.
    Node(String),
}

impl SourceSpec {
    /// Value typed at the tool's source prompt.
    pub fn as_str(&self) -> &str {
        match self {
            SourceSpec::All => ALL_SOURCES,
            SourceSpec::Node(id) => id,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SourceSpec::All)
    }
}

impl From<&str> for SourceSpec {
    fn from(s: &str) -> Self {
        if s == ALL_SOURCES {
            SourceSpec::All
        } else {
            SourceSpec::Node(s.to_string())
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One reshard step: move `slot_count` slots from `source` into `target_node_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReshardPlan {
    /// Node receiving the slots.
    pub target_node_id: String,
    /// Node(s) giving up slots.
    pub source: SourceSpec,
    /// Number of slots to move.
    pub slot_count: u32,
}

impl ReshardPlan {
    pub fn new(target_node_id: impl Into<String>, source: SourceSpec, slot_count: u32) -> Self {
        Self {
            target_node_id: target_node_id.into(),
            source,
            slot_count,
        }
    }
}

/// Masters whose slot ranges touch a given range on either side.
///
/// A master owning several ranges borders on a side when any one of them does.
#[derive(Debug, Clone, Copy, Default)]
pub struct BorderNodes<'a> {
    /// Master with a range ending at `first_slot - 1`.
    pub under: Option<&'a ClusterNode>,
    /// Master with a range starting at `last_slot + 1`.
    pub over: Option<&'a ClusterNode>,
}

/// Find the slotted masters adjacent to `[first_slot, last_slot]`.
pub fn find_border_nodes<'a>(
    nodes: &'a ParsedClusterNodes,
    exclude_id: &str,
    first_slot: u16,
    last_slot: u16,
) -> BorderNodes<'a> {
    let below = first_slot.checked_sub(1);
    let above = last_slot.checked_add(1).filter(|slot| *slot < TOTAL_SLOTS);

    let mut borders = BorderNodes::default();
    for node in nodes
        .nodes
        .iter()
        .filter(|n| n.is_slotted_master() && n.id != exclude_id)
    {
        if above.is_some() && node.slots.iter().any(|r| Some(r.start) == above) {
            borders.over = Some(node);
        }
        if below.is_some() && node.slots.iter().any(|r| Some(r.end) == below) {
            borders.under = Some(node);
        }
    }
    borders
}

/// Plan one reshard per slotless master, each pulling an equal share from all masters.
///
/// The share is `TOTAL_SLOTS / nodes.len()` over every node in the listing.
/// The division remainder stays with the current owners.
pub fn plan_reshard_all(nodes: &ParsedClusterNodes) -> Vec<ReshardPlan> {
    let share = slots_per_node(nodes.len());
    if share == 0 {
        return Vec::new();
    }

    nodes
        .slotless_masters()
        .into_iter()
        .map(|node| ReshardPlan::new(node.id.clone(), SourceSpec::All, share))
        .collect()
}

/// Plan emptying `exception_id` into a master bordering its slot range.
///
/// When both neighbors exist one is picked at random.
pub fn plan_except_node<R>(
    nodes: &ParsedClusterNodes,
    exception_id: &str,
    rng: &mut R,
) -> Result<ReshardPlan, PlanError>
where
    R: Rng,
{
    let node = nodes
        .get_node(exception_id)
        .ok_or_else(|| PlanError::NodeNotFound(exception_id.to_string()))?;
    if node.is_replica() || !node.is_master() {
        return Err(PlanError::NotMaster(exception_id.to_string()));
    }
    let (Some(first_slot), Some(last_slot)) = (node.first_slot(), node.last_slot()) else {
        return Err(PlanError::NoSlots(exception_id.to_string()));
    };

    let borders = find_border_nodes(nodes, exception_id, first_slot, last_slot);
    let receiver = match (borders.under, borders.over) {
        (None, None) => {
            return Err(PlanError::NoBorderNode {
                node_id: exception_id.to_string(),
                first_slot,
                last_slot,
            });
        }
        (Some(under), None) => under,
        (None, Some(over)) => over,
        (Some(under), Some(over)) => {
            if rng.gen_bool(0.5) {
                under
            } else {
                over
            }
        }
    };

    Ok(ReshardPlan::new(
        receiver.id.clone(),
        SourceSpec::Node(exception_id.to_string()),
        node.slot_count(),
    ))
}

/// Plan moving every slot of `source_id` into `target_id`.
pub fn plan_merge_node(
    nodes: &ParsedClusterNodes,
    target_id: &str,
    source_id: &str,
) -> Result<ReshardPlan, PlanError> {
    if target_id == source_id {
        return Err(PlanError::SameNode(target_id.to_string()));
    }

    let target = nodes
        .get_node(target_id)
        .ok_or_else(|| PlanError::NodeNotFound(target_id.to_string()))?;
    let source = nodes
        .get_node(source_id)
        .ok_or_else(|| PlanError::NodeNotFound(source_id.to_string()))?;

    if target.is_replica() {
        return Err(PlanError::NotMaster(target_id.to_string()));
    }

    let slot_count = source.slot_count();
    if slot_count == 0 {
        return Err(PlanError::NoSlots(source_id.to_string()));
    }

    Ok(ReshardPlan::new(
        target.id.clone(),
        SourceSpec::Node(source.id.clone()),
        slot_count,
    ))
}
