use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Ordering key for choosing the next target to consider.
///
/// The key is `(negated capacity, sequence counter, target index)` and lower
/// tuples sort first, so the target with the most recently-known free
/// capacity wins. The sequence counter grows each time a target is
/// re-inserted; on equal capacity the target tried least recently therefore
/// sorts first, giving approximate round-robin among equals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankEntry {
    neg_capacity: i64,
    seq: i64,
    target: usize,
}

impl RankEntry {
    pub fn new(capacity: u32, seq: i64, target: usize) -> Self {
        Self {
            neg_capacity: -(capacity as i64),
            seq,
            target,
        }
    }

    /// Index of the target this entry ranks.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn capacity(&self) -> u32 {
        (-self.neg_capacity) as u32
    }

    /// Successor entry for re-insertion with a fresh capacity value.
    pub fn reranked(&self, capacity: u32) -> Self {
        Self::new(capacity, self.seq + 1, self.target)
    }
}

/// Min-priority structure over rank entries.
#[derive(Debug, Default)]
pub struct TargetRanking {
    heap: BinaryHeap<Reverse<RankEntry>>,
}

impl TargetRanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: RankEntry) {
        self.heap.push(Reverse(entry));
    }

    /// Pop the lowest-key entry (best capacity, least recently tried).
    pub fn pop(&mut self) -> Option<RankEntry> {
        self.heap.pop().map(|Reverse(entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
