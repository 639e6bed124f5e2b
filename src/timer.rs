//! Timer handles and the connection's pending-expiry queue (spec §9: "use
//! opaque timer handles that the loop compares by identity; a stale expiry
//! whose handle does not match the currently-armed expectation is silently
//! dropped").

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque timer handle. Two handles are equal only if they are the same
/// handle returned from the same `arm` call; the loop never compares
/// deadlines, only identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl TimerId {
    fn next() -> TimerId {
        TimerId(NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

#[derive(Debug)]
struct Entry {
    deadline: Instant,
    id: TimerId,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest deadline sorts
        // first.
        other.deadline.cmp(&self.deadline)
    }
}

/// A min-heap of pending timer expirations. The connection loop asks for
/// `next_deadline` to bound its readable-wait, and calls `expire_due` once
/// that deadline has passed.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue {
            heap: BinaryHeap::new(),
        }
    }

    /// Arm a new timer `duration` from now, returning its handle.
    pub fn arm(&mut self, duration: Duration) -> TimerId {
        let id = TimerId::next();
        self.heap.push(Entry {
            deadline: Instant::now() + duration,
            id,
        });
        id
    }

    /// The soonest pending deadline, if any, used to bound the next
    /// readable-wait in the connection loop.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pop every entry whose deadline has passed, returning their handles.
    /// The loop must check each returned handle against the specific timer
    /// it still expects (preface, settings-ack, idle, ...) and drop it if
    /// the handle no longer matches (spec §9, stale-expiry rule): this
    /// queue does not know which logical timer each handle represents.
    pub fn expire_due(&mut self, now: Instant) -> Vec<TimerId> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.deadline > now {
                break;
            }
            due.push(self.heap.pop().unwrap().id);
        }
        due
    }
}
