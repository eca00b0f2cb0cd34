//! keycl library crate
//!
//! Automates Valkey/Redis cluster administration by driving the
//! `valkey-cli`/`redis-cli` admin tool: topology queries, node membership
//! changes and slot rebalancing.

pub mod client;
pub mod error;
pub mod slots;

pub use client::{
    CliError, CliName, ClusterInfo, ClusterNode, ClusterState, ClusterTopology,
    ParsedClusterNodes, ScalingOps, ScalingResult, ValkeyCli, ValkeyCliConfig,
};
pub use error::{Error, Result};
pub use slots::{PlanError, ReshardPlan, SlotRange, SourceSpec, TOTAL_SLOTS};
