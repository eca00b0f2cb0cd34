//! Parsers for the admin tool's `cluster nodes` and `cluster info` text.
//!
//! Both formats belong to the tool, not to us, so parsing is tolerant:
//! missing trailing fields leave a partially populated record, malformed
//! numbers become zero, and unknown keys, flags or fields are ignored.
//! Nothing here returns an error.
//!
//! Every node line is scanned with fresh state. What one line says (for
//! instance that its node is a replica) never changes how another line is
//! read.

use crate::slots::distribution::SlotRange;

use super::types::{ClusterInfo, ClusterNode, ClusterState, NodeFlags, ParsedClusterNodes};

/// Prefix some tool builds put in front of raw text replies.
const TXT_PREFIX: &str = "txt:";

/// Left-to-right cursor over one node line.
struct LineScanner<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> LineScanner<'a> {
    fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        self.line.get(self.pos..).unwrap_or("")
    }

    /// Consume a field ending at `terminator`, returning it without the terminator.
    ///
    /// Returns `None` (consuming nothing) when the terminator never appears.
    fn until(&mut self, terminator: u8) -> Option<&'a str> {
        let rest = self.remaining();
        let idx = rest.bytes().position(|b| b == terminator)?;
        self.pos += idx + 1;
        rest.get(..idx)
    }

    /// Skip to the next ASCII letter and consume the run up to a space or end of line.
    fn alphabetic_run(&mut self) -> Option<&'a str> {
        let rest = self.remaining();
        let start = rest.bytes().position(|b| b.is_ascii_alphabetic())?;
        let tail = rest.get(start..)?;
        let len = tail.bytes().position(|b| b == b' ').unwrap_or(tail.len());
        self.pos += start + len;
        tail.get(..len)
    }
}

/// Parse one line of `cluster nodes` output.
///
/// Field order: id, `host@cluster-port`, flags, master id (replicas only),
/// link state (the next alphabetic token, which skips ping/pong/epoch
/// numbers), then the slot list.
///
/// # Example
/// ```
/// use keycl::client::parsing::parse_node_line;
///
/// let node = parse_node_line("n1 10.0.0.1@16379 master - 0 0 1 connected 0-5461");
/// assert_eq!(node.id, "n1");
/// assert_eq!(node.host, "10.0.0.1");
/// assert_eq!(node.cluster_port, 16379);
/// assert_eq!(node.link_state, "connected");
/// ```
pub fn parse_node_line(line: &str) -> ClusterNode {
    let line = line.trim();
    let line = line.strip_prefix(TXT_PREFIX).unwrap_or(line);

    let mut node = ClusterNode::default();
    let mut scan = LineScanner::new(line);

    let Some(id) = scan.until(b' ') else {
        node.id = line.to_string();
        return node;
    };
    node.id = id.to_string();

    let Some(address) = scan.until(b'@') else {
        return node;
    };
    let (host, port) = split_client_port(address);
    node.host = host.to_string();
    node.port = port;

    let Some(cluster_port) = scan.until(b' ') else {
        return node;
    };
    node.cluster_port = leading_port(cluster_port);

    let Some(flags) = scan.until(b' ') else {
        node.flags = NodeFlags::parse(scan.remaining());
        return node;
    };
    node.flags = NodeFlags::parse(flags);

    if node.flags.is_replica() {
        let Some(master_id) = scan.until(b' ') else {
            return node;
        };
        if master_id != "-" && !master_id.is_empty() {
            node.master_id = Some(master_id.to_string());
        }
    }

    let Some(link_state) = scan.alphabetic_run() else {
        return node;
    };
    node.link_state = link_state.to_string();

    node.slots = scan
        .remaining()
        .split_whitespace()
        .filter_map(parse_slot_item)
        .collect();

    node
}

/// Parse the whole `cluster nodes` output, one node per non-empty line.
pub fn parse_cluster_nodes(output: &str) -> ParsedClusterNodes {
    let nodes = output
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix(TXT_PREFIX).unwrap_or(line)
        })
        .filter(|line| !line.trim().is_empty())
        .map(parse_node_line)
        .collect();

    ParsedClusterNodes { nodes }
}

/// Parse `cluster info` output.
///
/// # Example
/// ```
/// use keycl::client::parsing::parse_cluster_info;
/// use keycl::client::ClusterState;
///
/// let info = parse_cluster_info("cluster_state:ok\ncluster_known_nodes:6\n");
/// assert_eq!(info.state, ClusterState::Ok);
/// assert_eq!(info.known_nodes, 6);
/// assert_eq!(info.size, 0);
/// ```
pub fn parse_cluster_info(text: &str) -> ClusterInfo {
    let mut info = ClusterInfo::default();

    for line in text.lines() {
        let line = line.trim();

        // Skip empty lines and section headers
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.rsplit_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "cluster_state" => info.state = ClusterState::from(value),
            "cluster_slots_assigned" => info.slots_assigned = value.parse().unwrap_or(0),
            "cluster_slots_ok" => info.slots_ok = value.parse().unwrap_or(0),
            "cluster_slots_pfail" => info.slots_pfail = value.parse().unwrap_or(0),
            "cluster_slots_fail" => info.slots_fail = value.parse().unwrap_or(0),
            "cluster_known_nodes" => info.known_nodes = value.parse().unwrap_or(0),
            "cluster_size" => info.size = value.parse().unwrap_or(0),
            "cluster_my_epoch" => info.my_epoch = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    info
}

/// Split `ip:port` into its parts. Addresses without a numeric port are kept whole.
///
/// The server prints IPv6 hosts unbracketed (`::1:6379`), so the last group is
/// the port unless it closes a `::` run (`::1`) or the host is a lone
/// bracketed literal (`[::1]`).
fn split_client_port(address: &str) -> (&str, u16) {
    if address.starts_with('[') && address.ends_with(']') {
        return (address, 0);
    }
    let Some((host, port)) = address.rsplit_once(':') else {
        return (address, 0);
    };
    if host.ends_with(':') {
        return (address, 0);
    }
    match port.parse() {
        Ok(port) => (host.trim_start_matches('[').trim_end_matches(']'), port),
        Err(_) => (address, 0),
    }
}

/// Bus port field, which newer servers suffix with `,hostname`.
fn leading_port(field: &str) -> u16 {
    field
        .split(',')
        .next()
        .and_then(|port| port.trim().parse().ok())
        .unwrap_or(0)
}

/// One slot-list item: `N` or `A-B`.
///
/// Importing/migrating markers (`[slot->-id]`, `[slot-<-id]`) describe
/// in-flight moves, not ownership, and are skipped.
fn parse_slot_item(item: &str) -> Option<SlotRange> {
    if item.starts_with('[') {
        return None;
    }

    match item.split_once('-') {
        Some((start, end)) => {
            let start: u16 = start.parse().ok()?;
            let end: u16 = end.parse().ok()?;
            Some(SlotRange::new(start.min(end), start.max(end)))
        }
        None => item.parse().ok().map(SlotRange::single),
    }
}
