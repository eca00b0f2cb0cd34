//! Cluster operations driven through the admin tool.
//!
//! Each operation translates typed parameters into one admin tool
//! invocation. `reshard` is the only interactive one: it answers the tool's
//! prompts through a [`Reactor`] session.

use std::process::{ExitStatus, Stdio};

use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::slots::planner::ReshardPlan;

use super::reactor::{Reaction, Reactor};
use super::types::{ClusterInfo, ParsedClusterNodes};
use super::valkey_cli::{CliError, ValkeyCli, address};

const PROMPT_SLOT_COUNT: &str = "How many slots do you want to move";
const PROMPT_RECEIVING_NODE: &str = "What is the receiving node ID";
const PROMPT_SOURCE_NODES: &str = "Please enter all the source node IDs";
const PROMPT_SECOND_SOURCE: &str = "Source node #2";
const PROMPT_PROCEED: &str = "Do you want to proceed with the proposed reshard plan";

/// Ends multi-source entry at the reshard source prompt.
const SOURCES_DONE: &str = "done";
/// Affirmative answer for confirmation prompts.
const CONFIRM: &str = "yes";

/// Reaction table answering the admin tool's reshard dialogue for `plan`.
pub fn reshard_reactions(plan: &ReshardPlan) -> Vec<Reaction> {
    let mut reactions = vec![
        Reaction {
            trigger: PROMPT_SLOT_COUNT.to_string(),
            response: plan.slot_count.to_string(),
        },
        Reaction {
            trigger: PROMPT_RECEIVING_NODE.to_string(),
            response: plan.target_node_id.clone(),
        },
        Reaction {
            trigger: PROMPT_SOURCE_NODES.to_string(),
            response: plan.source.to_string(),
        },
    ];
    if !plan.source.is_all() {
        reactions.push(Reaction {
            trigger: PROMPT_SECOND_SOURCE.to_string(),
            response: SOURCES_DONE.to_string(),
        });
    }
    reactions.push(Reaction {
        trigger: PROMPT_PROCEED.to_string(),
        response: CONFIRM.to_string(),
    });
    reactions
}

/// `-h <host> -p <port>` followed by `rest`.
fn node_args(host: &str, port: u16, rest: &[&str]) -> Vec<String> {
    let mut args = vec![
        "-h".to_string(),
        host.to_string(),
        "-p".to_string(),
        port.to_string(),
    ];
    args.extend(rest.iter().map(|arg| arg.to_string()));
    args
}

impl ValkeyCli {
    /// Create a cluster from `addresses` (`host:port` each), confirming the
    /// tool's proposed layout.
    #[instrument(skip(self, cancel))]
    pub async fn create_cluster(
        &self,
        cancel: &CancellationToken,
        replicas: u32,
        addresses: &[String],
    ) -> Result<(), CliError> {
        if addresses.is_empty() {
            return Err(CliError::InvalidConfig(
                "create_cluster needs at least one node address".to_string(),
            ));
        }

        let mut args = vec!["--cluster".to_string(), "create".to_string()];
        args.extend(addresses.iter().cloned());
        args.push("--cluster-replicas".to_string());
        args.push(replicas.to_string());

        info!(command = %self.command_name(), ?args, "create cluster");

        let answer = format!("{}\n", CONFIRM);
        self.run_with_input(cancel, &args, answer.as_bytes()).await?;

        info!("finish create cluster");
        Ok(())
    }

    /// Get parsed `cluster nodes` output from the node at `host:port`.
    #[instrument(skip(self, cancel))]
    pub async fn cluster_nodes(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> Result<ParsedClusterNodes, CliError> {
        let args = node_args(host, port, &["cluster", "nodes"]);
        info!(command = %self.command_name(), ?args, "get cluster nodes");

        let output = self.output(cancel, &args).await?;
        let nodes = ParsedClusterNodes::parse(&String::from_utf8_lossy(&output.stdout));

        info!(
            nodes = nodes.len(),
            masters = nodes.masters().len(),
            slots_assigned = nodes.total_slots_assigned(),
            "finish get cluster nodes"
        );
        Ok(nodes)
    }

    /// Get parsed `cluster info` output from the node at `host:port`.
    #[instrument(skip(self, cancel))]
    pub async fn cluster_info(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> Result<ClusterInfo, CliError> {
        let args = node_args(host, port, &["cluster", "info"]);
        info!(command = %self.command_name(), ?args, "get cluster info");

        let output = self.output(cancel, &args).await?;
        let info = ClusterInfo::parse(&String::from_utf8_lossy(&output.stdout));

        info!(
            state = %info.state,
            slots_assigned = info.slots_assigned,
            known_nodes = info.known_nodes,
            "finish get cluster info"
        );
        Ok(info)
    }

    /// IDs of masters without slots, plus the total node count.
    #[instrument(skip(self, cancel))]
    pub async fn no_slot_nodes(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> Result<(Vec<String>, usize), CliError> {
        let nodes = self.cluster_nodes(cancel, host, port).await?;
        let ids = nodes
            .slotless_masters()
            .into_iter()
            .map(|node| node.id.clone())
            .collect();
        Ok((ids, nodes.len()))
    }

    /// Join the node at `new_host:new_port` to the cluster that
    /// `existing_host:existing_port` belongs to.
    #[instrument(skip(self, cancel))]
    pub async fn add_node(
        &self,
        cancel: &CancellationToken,
        new_host: &str,
        new_port: u16,
        existing_host: &str,
        existing_port: u16,
    ) -> Result<(), CliError> {
        let args = vec![
            "--cluster".to_string(),
            "add-node".to_string(),
            address(new_host, new_port),
            address(existing_host, existing_port),
        ];
        info!(command = %self.command_name(), ?args, "add node");

        self.run(cancel, &args).await?;

        info!("finish add node");
        Ok(())
    }

    /// Make the node at `host:port` forget `node_id`.
    #[instrument(skip(self, cancel))]
    pub async fn forget_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        node_id: &str,
    ) -> Result<(), CliError> {
        let args = node_args(host, port, &["-c", "cluster", "forget", node_id]);
        info!(command = %self.command_name(), ?args, "forget node");

        self.run(cancel, &args).await?;

        info!("finish forget node");
        Ok(())
    }

    /// Remove `node_id` from the cluster reachable at `host:port`.
    #[instrument(skip(self, cancel))]
    pub async fn delete_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        node_id: &str,
    ) -> Result<(), CliError> {
        let target = address(host, port);
        let args = node_args(host, port, &["--cluster", "del-node", &target, node_id]);
        info!(command = %self.command_name(), ?args, "delete node");

        self.run(cancel, &args).await?;

        info!("finish delete node");
        Ok(())
    }

    /// Turn the node at `host:port` into a replica of `master_node_id`.
    #[instrument(skip(self, cancel))]
    pub async fn replicate_node(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        master_node_id: &str,
    ) -> Result<(), CliError> {
        let args = node_args(host, port, &["-c", "cluster", "replicate", master_node_id]);
        info!(command = %self.command_name(), ?args, "replicate node");

        self.run(cancel, &args).await?;

        info!("finish replicate node");
        Ok(())
    }

    /// Let the admin tool even out slots across all masters.
    #[instrument(skip(self, cancel))]
    pub async fn rebalance(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
    ) -> Result<(), CliError> {
        let target = address(host, port);
        let args = node_args(host, port, &["--cluster", "rebalance", &target]);
        info!(command = %self.command_name(), ?args, "rebalance");

        self.run(cancel, &args).await?;

        info!("finish rebalance");
        Ok(())
    }

    /// Move `plan.slot_count` slots into `plan.target_node_id`.
    ///
    /// Runs `--cluster reshard` and answers its prompts through a [`Reactor`].
    /// When the tool goes quiet for a full idle interval the session is torn
    /// down: the process is killed and both pipes are closed. Such an ending,
    /// or one caused by a closed pipe, counts as success. Cancelling `cancel`
    /// takes the same teardown path and reports [`CliError::Cancelled`].
    #[instrument(skip(self, cancel), fields(target = %plan.target_node_id, source = %plan.source, slots = plan.slot_count))]
    pub async fn reshard(
        &self,
        cancel: &CancellationToken,
        host: &str,
        port: u16,
        plan: &ReshardPlan,
    ) -> Result<(), CliError> {
        let args = vec![
            "--cluster".to_string(),
            "reshard".to_string(),
            address(host, port),
            "--cluster-yes".to_string(),
        ];
        info!(command = %self.command_name(), ?args, "reshard");

        let session = cancel.child_token();

        let mut cmd = self.command(&args);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(&args, e))?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(CliError::Io {
                command: self.command_name(),
                source: std::io::Error::other("admin tool pipes were not captured"),
            });
        };

        // stdout and stderr feed one token stream, as a terminal would show them.
        let combined = StreamReader::new(futures::stream::select(
            ReaderStream::new(stdout),
            ReaderStream::new(stderr),
        ));

        let mut reactor = Reactor::new(combined, stdin);
        for reaction in reshard_reactions(plan) {
            reactor.add_reaction(reaction.trigger, reaction.response);
        }

        let on_idle = session.clone();
        let reactor_task = tokio::spawn(async move { reactor.react(move || on_idle.cancel()).await });

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = session.cancelled() => None,
        };
        let (status, torn_down) = match exited {
            Some(status) => (status, false),
            None => {
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "admin tool already exited");
                }
                (child.wait().await, true)
            }
        };
        let status = status.map_err(|e| CliError::Io {
            command: self.command_name(),
            source: e,
        })?;

        match reactor_task.await {
            Ok(end) => debug!(?end, "reshard session closed"),
            Err(e) => warn!(error = %e, "reshard session task failed"),
        }

        match classify_reshard_exit(&status, torn_down, cancel.is_cancelled()) {
            ReshardExit::Completed => {
                info!(torn_down, "finish reshard");
                Ok(())
            }
            ReshardExit::Cancelled => Err(self.cancelled_error(&args)),
            ReshardExit::Failed => Err(self.exit_error(&args, status)),
        }
    }
}

/// How a finished reshard process is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReshardExit {
    Completed,
    Cancelled,
    Failed,
}

/// A clean exit always completes, even if cancellation arrived afterwards.
/// Cancellation is reported only when it was what killed the process.
fn classify_reshard_exit(status: &ExitStatus, torn_down: bool, cancelled: bool) -> ReshardExit {
    if status.success() {
        ReshardExit::Completed
    } else if torn_down && cancelled {
        ReshardExit::Cancelled
    } else if ended_by_teardown(status, torn_down) {
        ReshardExit::Completed
    } else {
        ReshardExit::Failed
    }
}

/// Whether a failed exit status came from our own teardown or a closed pipe.
#[cfg(unix)]
fn ended_by_teardown(status: &ExitStatus, torn_down: bool) -> bool {
    use std::os::unix::process::ExitStatusExt;

    const SIGPIPE: i32 = 13;
    match status.signal() {
        Some(SIGPIPE) => true,
        Some(_) => torn_down,
        None => false,
    }
}

#[cfg(not(unix))]
fn ended_by_teardown(_status: &ExitStatus, torn_down: bool) -> bool {
    torn_down
}
