//! Admin tool driver for Valkey cluster management.
//!
//! Cluster operations are carried out by running `valkey-cli` (or the
//! compatible `redis-cli`) as a subprocess and parsing its text output.
//!
//! ## Architecture
//!
//! - `valkey_cli`: Tool configuration, errors and process plumbing
//! - `cluster_ops`: One method per admin operation (create, add, reshard, ...)
//! - `reactor`: Prompt/response automaton for the interactive reshard dialogue
//! - `parsing` / `types`: `cluster nodes` and `cluster info` output as typed values
//! - `scaling`: ReshardAll, ExceptNode and MergeNode orchestration
//!
//! ## Example
//!
//! ```rust,ignore
//! use keycl::client::{CliName, ScalingOps, ValkeyCli, ValkeyCliConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cli = ValkeyCli::new(ValkeyCliConfig::new(CliName::Valkey));
//! let cancel = CancellationToken::new();
//! let info = cli.cluster_info(&cancel, "127.0.0.1", 7001).await?;
//! if !info.all_slots_assigned() {
//!     cli.reshard_all(&cancel, "127.0.0.1", 7001).await?;
//! }
//! ```

pub mod cluster_ops;
pub mod parsing;
pub mod reactor;
pub mod scaling;
pub mod types;
pub mod valkey_cli;

pub use cluster_ops::reshard_reactions;
pub use reactor::{IDLE_INTERVAL, PromptCodec, Reaction, Reactor, SessionEnd};
pub use scaling::{ClusterTopology, ScalingOps, ScalingResult};
pub use types::{ClusterInfo, ClusterNode, ClusterState, NodeFlags, ParsedClusterNodes};
pub use valkey_cli::{CliError, CliName, ValkeyCli, ValkeyCliConfig};
