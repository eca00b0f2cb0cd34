//! Pure slot logic for Valkey clusters.
//!
//! Computes "what slots to move" separately from "how to move them", so the
//! planners can be tested without a running cluster.
//!
//! ## Module Structure
//!
//! - [`distribution`]: Slot ranges and equal-share arithmetic
//! - [`planner`]: Reshard planning with [`ReshardPlan`] and [`SourceSpec`]

pub mod distribution;
pub mod planner;

// Re-export commonly used types
pub use distribution::{SlotRange, TOTAL_SLOTS, slots_per_node};
pub use planner::{
    ALL_SOURCES, PlanError, ReshardPlan, SourceSpec, plan_except_node, plan_merge_node,
    plan_reshard_all,
};
