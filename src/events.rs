//! Lock-free statistics and structural event journal
//!
//! Both live beside the tree lock rather than under it: counters are plain
//! atomics and the journal is a `crossbeam` segmented queue, so a dispatch
//! layer can drain topology changes without contending with mutations.

use crate::balance::RotationCase;
use crate::peer::PeerId;
use crate::removal::RemovalCase;
use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Structural change to a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    /// Peer attached below `parent` (or as root)
    Inserted { id: PeerId, parent: Option<PeerId> },
    /// Peer removed; `replacement` now holds its position
    Removed {
        id: PeerId,
        case: RemovalCase,
        replacement: Option<PeerId>,
    },
    /// Rotation applied at `pivot`
    Rotated { pivot: PeerId, case: RotationCase },
}

/// Journal of structural events
#[derive(Debug)]
pub struct EventQueue {
    queue: SegQueue<TreeEvent>,
    event_count: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            event_count: AtomicU64::new(0),
        }
    }

    pub fn push(&self, event: TreeEvent) {
        self.queue.push(event);
        self.event_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pop(&self) -> Option<TreeEvent> {
        self.queue.pop()
    }

    /// Take every queued event, oldest first
    pub fn drain(&self) -> Vec<TreeEvent> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Events ever pushed, drained or not
    pub fn total_events(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation counters for one tree
#[derive(Debug)]
pub struct TreeStats {
    inserts: AtomicU64,
    deletes: AtomicU64,
    rotations: AtomicU64,
    capacity_rejections: AtomicU64,
    invalid_arguments: AtomicU64,
}

impl TreeStats {
    pub fn new() -> Self {
        Self {
            inserts: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            capacity_rejections: AtomicU64::new(0),
            invalid_arguments: AtomicU64::new(0),
        }
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotations(&self, count: u64) {
        self.rotations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_capacity_rejection(&self) {
        self.capacity_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_argument(&self) {
        self.invalid_arguments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            invalid_arguments: self.invalid_arguments.load(Ordering::Relaxed),
        }
    }
}

impl Default for TreeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`TreeStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub inserts: u64,
    pub deletes: u64,
    pub rotations: u64,
    pub capacity_rejections: u64,
    pub invalid_arguments: u64,
}

impl StatsSnapshot {
    /// Rotations per successful delete
    pub fn rotations_per_delete(&self) -> f64 {
        if self.deletes == 0 {
            0.0
        } else {
            self.rotations as f64 / self.deletes as f64
        }
    }

    /// Sum of two snapshots, for aggregating across trees
    pub fn merge(self, other: StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            inserts: self.inserts + other.inserts,
            deletes: self.deletes + other.deletes,
            rotations: self.rotations + other.rotations,
            capacity_rejections: self.capacity_rejections + other.capacity_rejections,
            invalid_arguments: self.invalid_arguments + other.invalid_arguments,
        }
    }
}
