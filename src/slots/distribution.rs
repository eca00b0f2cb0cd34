//! Pure slot arithmetic.
//!
//! Slot ownership is reported by the admin tool as ranges; everything the
//! planners need to know about a node's share is computed from those here.

use serde::Serialize;

/// Number of hash slots in the keyspace; slots are numbered `0..TOTAL_SLOTS`.
pub const TOTAL_SLOTS: u16 = 16384;

/// Inclusive run of hash slots, as listed after a node's link state.
///
/// A lone slot such as `42` is stored as `42-42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SlotRange {
    pub start: u16,
    pub end: u16,
}

impl SlotRange {
    /// Range `start..=end`. Callers order the bounds.
    pub fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end, "slot range {start}-{end} is reversed");
        Self { start, end }
    }

    pub fn single(slot: u16) -> Self {
        Self::new(slot, slot)
    }

    /// Slots covered, bounds included.
    pub fn count(&self) -> u32 {
        u32::from(self.end.saturating_sub(self.start)) + 1
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for SlotRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single() {
            return write!(f, "{}", self.start);
        }
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Total number of slots covered by a list of ranges.
pub fn total_slot_count(ranges: &[SlotRange]) -> u32 {
    ranges.iter().map(SlotRange::count).sum()
}

/// Share of the keyspace handed to each node when `node_count` nodes split it.
///
/// Integer division: the `TOTAL_SLOTS % node_count` remainder is not part of
/// any share (see [`share_remainder`]). Zero nodes yield a zero share.
///
/// # Examples
///
/// ```
/// use keycl::slots::distribution::slots_per_node;
///
/// assert_eq!(slots_per_node(4), 4096);
/// assert_eq!(slots_per_node(3), 5461);
/// ```
pub fn slots_per_node(node_count: usize) -> u32 {
    if node_count == 0 {
        return 0;
    }
    u32::from(TOTAL_SLOTS) / node_count as u32
}

/// Slots left over by [`slots_per_node`]; they stay with their current owners.
pub fn share_remainder(node_count: usize) -> u32 {
    if node_count == 0 {
        return 0;
    }
    u32::from(TOTAL_SLOTS) % node_count as u32
}
