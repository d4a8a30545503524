//! Deadline queue with lazy deletion
//!
//! A BinaryHeap of (deadline, seq) keys plus a HashMap holding the live
//! entries. Cancelling only touches the map; stale heap keys are skipped
//! when they reach the top.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Heap key. `seq` is unique per entry and breaks deadline ties in
/// submission order.
#[derive(Clone, Copy, Debug)]
struct Key {
    deadline: f64,
    seq: u64,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // total_cmp keeps float ordering deterministic
        self.deadline
            .total_cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-queue of pending entries ordered by deadline, then by seq.
pub struct DeadlineQueue<M> {
    heap: BinaryHeap<Reverse<Key>>,
    live: HashMap<u64, (f64, M)>,
}

impl<M> Default for DeadlineQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> DeadlineQueue<M> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
        }
    }

    /// Insert an entry. Returns false if `seq` is already pending.
    pub fn push(&mut self, seq: u64, deadline: f64, meta: M) -> bool {
        if self.live.contains_key(&seq) {
            return false;
        }
        self.live.insert(seq, (deadline, meta));
        self.heap.push(Reverse(Key { deadline, seq }));
        true
    }

    /// Remove a pending entry, returning its payload.
    pub fn remove(&mut self, seq: u64) -> Option<M> {
        self.live.remove(&seq).map(|(_, m)| m)
    }

    pub fn contains(&self, seq: u64) -> bool {
        self.live.contains_key(&seq)
    }

    /// Earliest live deadline.
    pub fn peek_deadline(&mut self) -> Option<f64> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(k)| k.deadline)
    }

    /// Pop the earliest entry as (seq, deadline, payload).
    pub fn pop(&mut self) -> Option<(u64, f64, M)> {
        self.discard_stale();
        let Reverse(k) = self.heap.pop()?;
        let (deadline, meta) = self.live.remove(&k.seq)?;
        Some((k.seq, deadline, meta))
    }

    /// Pop the earliest entry only if its deadline is at or before `limit`.
    pub fn pop_due(&mut self, limit: f64) -> Option<(u64, f64, M)> {
        match self.peek_deadline() {
            Some(dl) if dl <= limit => self.pop(),
            _ => None,
        }
    }

    /// Drop every pending entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.live.len();
        self.live.clear();
        self.heap.clear();
        n
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(k)) = self.heap.peek() {
            if self.live.contains_key(&k.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
