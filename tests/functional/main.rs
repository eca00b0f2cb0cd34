// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for cluster rebalancing and the admin tool driver.
//!
//! These tests run WITHOUT a live Valkey cluster. Orchestrator tests use an
//! in-memory cluster that applies reshards to its slot map; driver tests run
//! small shell scripts standing in for `valkey-cli`.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_except_node_empties_middle_master
//!
//! # Run with verbose output
//! cargo test --test functional -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! - **Scaling tests**: ReshardAll, ExceptNode and MergeNode against a mock cluster
//! - **CLI tests**: Argument layout, output parsing and the interactive reshard
//!   session against a fake admin tool (unix only)

mod scaling_tests;

// Re-export for use in tests
pub use mock_cluster::*;
