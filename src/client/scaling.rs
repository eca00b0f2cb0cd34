//! Rebalancing operations for Valkey clusters.
//!
//! Each operation fetches the topology once, plans with
//! [`planner`](crate::slots::planner) and then executes the planned reshards
//! one after another:
//! - ReshardAll: give every slotless master an equal share
//! - ExceptNode: empty a master into a neighbor of its slot range
//! - MergeNode: move all slots of one node into another

use std::future::Future;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::error::{Error, Result};
use crate::slots::planner::{
    ReshardPlan, plan_except_node, plan_merge_node, plan_reshard_all,
};

use super::types::ParsedClusterNodes;
use super::valkey_cli::{CliError, ValkeyCli};

/// The two cluster calls the orchestrator depends on.
///
/// [`ValkeyCli`] implements it by driving the admin tool; tests substitute
/// an in-memory cluster.
pub trait ClusterTopology {
    /// Current `cluster nodes` view as seen from `host:port`.
    fn cluster_nodes(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> impl Future<Output = std::result::Result<ParsedClusterNodes, CliError>> + Send;

    /// Execute one reshard step through the node at `host:port`.
    fn reshard(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        plan: &ReshardPlan,
    ) -> impl Future<Output = std::result::Result<(), CliError>> + Send;
}

impl ClusterTopology for ValkeyCli {
    async fn cluster_nodes(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> std::result::Result<ParsedClusterNodes, CliError> {
        ValkeyCli::cluster_nodes(self, cancel, host, port).await
    }

    async fn reshard(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        plan: &ReshardPlan,
    ) -> std::result::Result<(), CliError> {
        ValkeyCli::reshard(self, cancel, host, port, plan).await
    }
}

/// Result of a rebalancing operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScalingResult {
    /// Reshard steps executed, in order.
    pub completed: Vec<ReshardPlan>,
    /// Number of slots moved.
    pub slots_moved: u64,
}

impl ScalingResult {
    fn record(&mut self, plan: ReshardPlan) {
        self.slots_moved += u64::from(plan.slot_count);
        self.completed.push(plan);
    }

    /// Nothing needed to move.
    pub fn is_noop(&self) -> bool {
        self.completed.is_empty()
    }
}

/// Extension trait for rebalancing operations.
pub trait ScalingOps {
    /// Give every master without slots an equal share taken from all masters.
    ///
    /// Steps run sequentially and stop at the first failure, which is
    /// reported as [`Error::PartialReshard`]. Completed steps are not undone.
    fn reshard_all(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<ScalingResult>> + Send;

    /// Move every slot of `exception_id` into a master bordering its range.
    fn except_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        exception_id: &str,
    ) -> impl Future<Output = Result<ScalingResult>> + Send;

    /// Move every slot of `source_id` into `target_id`.
    fn merge_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        target_id: &str,
        source_id: &str,
    ) -> impl Future<Output = Result<ScalingResult>> + Send;
}

impl<T> ScalingOps for T
where
    T: ClusterTopology + Sync,
{
    #[instrument(skip(self, cancel))]
    async fn reshard_all(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> Result<ScalingResult> {
        let nodes = self.cluster_nodes(cancel, host, port).await?;
        let plans = plan_reshard_all(&nodes);

        let mut result = ScalingResult::default();
        if plans.is_empty() {
            info!(nodes = nodes.len(), "No slotless masters, nothing to reshard");
            return Ok(result);
        }

        let total = plans.len();
        info!(
            nodes = nodes.len(),
            targets = total,
            share = plans[0].slot_count,
            "Starting reshard of slotless masters"
        );

        for (i, plan) in plans.into_iter().enumerate() {
            let step = i + 1;
            info!(step, total, target = %plan.target_node_id, slots = plan.slot_count, "Reshard step");

            if let Err(source) = self.reshard(cancel, host, port, &plan).await {
                error!(
                    step,
                    total,
                    target = %plan.target_node_id,
                    error = %source,
                    "Reshard step failed, earlier steps stay applied"
                );
                return Err(Error::PartialReshard {
                    step,
                    total,
                    failed_node: plan.target_node_id,
                    completed: result
                        .completed
                        .iter()
                        .map(|p| p.target_node_id.clone())
                        .collect(),
                    source,
                });
            }
            result.record(plan);
        }

        info!(
            steps = result.completed.len(),
            slots_moved = result.slots_moved,
            "Reshard of slotless masters complete"
        );
        Ok(result)
    }

    #[instrument(skip(self, cancel))]
    async fn except_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        exception_id: &str,
    ) -> Result<ScalingResult> {
        let nodes = self.cluster_nodes(cancel, host, port).await?;
        let plan = plan_except_node(&nodes, exception_id, &mut rand::thread_rng())
            .map_err(|e| Error::plan("except_node", e))?;

        info!(
            from = %exception_id,
            to = %plan.target_node_id,
            slots = plan.slot_count,
            "Moving all slots to bordering master"
        );
        self.reshard(cancel, host, port, &plan).await?;

        let mut result = ScalingResult::default();
        result.record(plan);
        info!(slots_moved = result.slots_moved, "Except node complete");
        Ok(result)
    }

    #[instrument(skip(self, cancel))]
    async fn merge_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        target_id: &str,
        source_id: &str,
    ) -> Result<ScalingResult> {
        let nodes = self.cluster_nodes(cancel, host, port).await?;
        let plan = plan_merge_node(&nodes, target_id, source_id)
            .map_err(|e| Error::plan("merge_node", e))?;

        info!(
            from = %source_id,
            to = %target_id,
            slots = plan.slot_count,
            "Merging node slots"
        );
        self.reshard(cancel, host, port, &plan).await?;

        let mut result = ScalingResult::default();
        result.record(plan);
        info!(slots_moved = result.slots_moved, "Merge node complete");
        Ok(result)
    }
}
