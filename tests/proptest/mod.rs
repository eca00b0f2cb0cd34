// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for keycl.
//!
//! Uses proptest to generate random inputs and verify invariants.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use keycl::client::parsing::{parse_cluster_info, parse_cluster_nodes, parse_node_line};
use keycl::client::{ClusterInfo, ParsedClusterNodes};
use keycl::slots::distribution::{share_remainder, slots_per_node};
use keycl::slots::{SourceSpec, TOTAL_SLOTS, plan_except_node};

/// Strategy for node IDs (40 hex chars like the real tool, or short ones).
fn node_id() -> impl Strategy<Value = String> {
    prop_oneof!["[0-9a-f]{40}", "[a-z][a-z0-9]{0,7}"]
}

/// Strategy for link states the tool reports.
fn link_state() -> impl Strategy<Value = String> {
    prop_oneof![Just("connected".to_string()), Just("disconnected".to_string())]
}

/// Strategy for an inclusive slot range.
fn slot_range() -> impl Strategy<Value = (u16, u16)> {
    (0..TOTAL_SLOTS, 0..TOTAL_SLOTS).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

fn master_line(id: &str, port: u16, link: &str, ranges: &[(u16, u16)]) -> String {
    let mut line = format!("{id} 10.0.0.1:{port}@{} master - 0 0 1 {link}", port as u32 + 10000);
    for (start, end) in ranges {
        line.push_str(&format!(" {start}-{end}"));
    }
    line
}

fn replica_line(id: &str, master_id: &str, link: &str) -> String {
    format!("{id} 10.0.0.2:6379@16379 slave {master_id} 0 0 1 {link}")
}

/// Masters owning consecutive slices of the slot space, cut at `cuts`.
fn contiguous_masters(cuts: &[u16]) -> ParsedClusterNodes {
    let mut bounds: Vec<u16> = cuts.iter().copied().filter(|c| *c > 0).collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut lines = Vec::new();
    let mut start = 0u16;
    for (i, cut) in bounds.iter().chain(std::iter::once(&TOTAL_SLOTS)).enumerate() {
        lines.push(master_line(&format!("m{i}"), 7000, "connected", &[(start, cut - 1)]));
        start = *cut;
    }
    ParsedClusterNodes::parse(&lines.join("\n"))
}

proptest! {
    /// A master line never carries a master ID, and its link state is the
    /// token after the flags and counters.
    #[test]
    fn master_line_fields(
        id in node_id(),
        port in 1u16..55000,
        link in link_state(),
        ranges in prop::collection::vec(slot_range(), 0..4),
    ) {
        let node = parse_node_line(&master_line(&id, port, &link, &ranges));

        prop_assert_eq!(&node.id, &id);
        prop_assert_eq!(node.port, port);
        prop_assert_eq!(node.cluster_port as u32, port as u32 + 10000);
        prop_assert!(node.master_id.is_none());
        prop_assert_eq!(&node.link_state, &link);
        prop_assert_eq!(node.slots.len(), ranges.len());
        for (parsed, (start, end)) in node.slots.iter().zip(&ranges) {
            prop_assert_eq!((parsed.start, parsed.end), (*start, *end));
        }
    }

    /// A replica's master ID depends only on its own line, whatever order
    /// the listing comes in.
    #[test]
    fn replica_master_independent_of_order(
        master in node_id(),
        replica in node_id(),
        other in node_id(),
        link in link_state(),
        replica_first in any::<bool>(),
    ) {
        prop_assume!(master != replica && replica != other && master != other);

        let lines = [
            master_line(&master, 7000, "connected", &[(0, 16383)]),
            replica_line(&replica, &master, &link),
            master_line(&other, 7001, "connected", &[]),
        ];
        let listing = if replica_first {
            format!("{}\n{}\n{}", lines[1], lines[0], lines[2])
        } else {
            lines.join("\n")
        };

        let nodes = parse_cluster_nodes(&listing);
        let parsed = nodes.get_node(&replica).unwrap();
        prop_assert_eq!(parsed.master_id.as_deref(), Some(master.as_str()));
        prop_assert_eq!(&parsed.link_state, &link);
        prop_assert!(parsed.slots.is_empty());
        prop_assert!(nodes.get_node(&other).unwrap().master_id.is_none());
    }

    /// Parsing is a pure function of its input.
    #[test]
    fn parsing_is_deterministic(text in "[ -~\n]{0,400}") {
        prop_assert_eq!(parse_cluster_nodes(&text), parse_cluster_nodes(&text));
        prop_assert_eq!(parse_cluster_info(&text), parse_cluster_info(&text));
    }

    /// Known keys are read back, unknown ones leave zeros.
    #[test]
    fn cluster_info_known_keys(assigned in 0u32..=16384, known in 0u32..1000, epoch in any::<u64>()) {
        let text = format!(
            "cluster_state:ok\ncluster_slots_assigned:{assigned}\ncluster_known_nodes:{known}\ncluster_my_epoch:{epoch}\ncluster_stats_messages_sent:99\n"
        );
        let info = parse_cluster_info(&text);

        prop_assert_eq!(info.slots_assigned, assigned);
        prop_assert_eq!(info.known_nodes, known);
        prop_assert_eq!(info.my_epoch, epoch);
        prop_assert_eq!(info.slots_fail, 0);
        prop_assert_eq!(info, ClusterInfo::parse(&text));
    }

    /// Equal shares plus the remainder always account for every slot.
    #[test]
    fn share_and_remainder_cover_slot_space(n in 1usize..=1000) {
        let total = slots_per_node(n) * n as u32 + share_remainder(n);
        prop_assert_eq!(total, u32::from(TOTAL_SLOTS));
        prop_assert!(share_remainder(n) < n as u32);
    }

    /// ExceptNode hands the slots to a master whose range touches the
    /// excepted one, and moves all of them.
    #[test]
    fn except_node_picks_adjacent_master(
        cuts in prop::collection::vec(1u16..TOTAL_SLOTS, 1..8),
        pick in any::<prop::sample::Index>(),
        seed in any::<u64>(),
    ) {
        let nodes = contiguous_masters(&cuts);
        prop_assume!(nodes.len() >= 2);

        let victim = &nodes.nodes[pick.index(nodes.len())];
        let mut rng = StdRng::seed_from_u64(seed);
        let plan = plan_except_node(&nodes, &victim.id, &mut rng).unwrap();

        let receiver = nodes.get_node(&plan.target_node_id).unwrap();
        let touches_below = receiver.last_slot().map(|s| s + 1) == victim.first_slot();
        let touches_above = victim.last_slot().map(|s| s + 1) == receiver.first_slot();
        prop_assert!(touches_below || touches_above);
        prop_assert_eq!(plan.slot_count, victim.slot_count());
        prop_assert_eq!(plan.source, SourceSpec::Node(victim.id.clone()));
    }
}
