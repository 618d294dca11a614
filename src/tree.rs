//! Concurrent fan-out tree
//!
//! Peers are placed in level order (shallowest, leftmost open slot) and the
//! shape is kept AVL-balanced across arbitrary deletes. One mutex guards the
//! whole pointer graph; the peer count is mirrored in an atomic so `len()`
//! never waits on a mutation.
//!
//! ```
//! use fanout_tree::{Peer, Tree};
//!
//! let tree = Tree::new("resize-image");
//! for _ in 0..7 {
//!     tree.insert(Peer::new()).unwrap();
//! }
//! assert_eq!(tree.len(), 7);
//! assert_eq!(tree.dump_tree().levels, vec![vec![0], vec![1, 2], vec![3, 4, 5, 6]]);
//!
//! tree.delete(tree.find(1)).unwrap();
//! assert_eq!(tree.len(), 6);
//! assert!(tree.check_invariants().is_ok());
//! ```

use crate::arena::PeerArena;
use crate::audit::{AuditLogger, AuditOutcome};
use crate::config::TreeConfig;
use crate::dump::{FanoutEdge, TreeDump};
use crate::error::{ConfigError, TreeError};
use crate::events::{EventQueue, StatsSnapshot, TreeEvent, TreeStats};
use crate::invariants::InvariantViolation;
use crate::peer::{Peer, PeerHandle, PeerId};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::Span;

/// Pointer graph and bookkeeping guarded by the tree lock
#[derive(Debug)]
pub(crate) struct TreeInner {
    pub(crate) arena: PeerArena,
    pub(crate) root: Option<PeerHandle>,
    pub(crate) size: usize,
    /// Next id under the monotonic policy
    pub(crate) next_id: PeerId,
    pub(crate) last_modified: DateTime<Utc>,
    pub(crate) max_height: usize,
}

impl TreeInner {
    pub(crate) fn new(max_height: usize) -> Self {
        Self {
            arena: PeerArena::new(),
            root: None,
            size: 0,
            next_id: 0,
            last_modified: Utc::now(),
            max_height,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    fn resolve(&self, handle: Option<PeerHandle>, op: &str) -> Result<PeerHandle, TreeError> {
        match handle {
            None => Err(TreeError::InvalidArgument(format!("{} called with no peer", op))),
            Some(h) if !self.arena.contains(h) => Err(TreeError::InvalidArgument(format!(
                "{} called with peer {} that is not attached",
                op, h
            ))),
            Some(h) => Ok(h),
        }
    }
}

/// A named, height-balanced fan-out tree of peers
#[derive(Debug)]
pub struct Tree {
    func_name: String,
    config: TreeConfig,
    inner: Mutex<TreeInner>,
    len: AtomicUsize,
    stats: TreeStats,
    events: EventQueue,
    span: Span,
}

impl Tree {
    /// Empty tree with the default configuration
    pub fn new(func_name: impl Into<String>) -> Self {
        Self::build(func_name.into(), TreeConfig::default(), None)
    }

    /// Empty tree with a validated configuration
    pub fn with_config(func_name: impl Into<String>, config: TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(func_name.into(), config, None))
    }

    /// Empty tree logging inside the given span instead of its own
    pub fn with_span(
        func_name: impl Into<String>,
        config: TreeConfig,
        span: Span,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(func_name.into(), config, Some(span)))
    }

    pub(crate) fn build(func_name: String, config: TreeConfig, span: Option<Span>) -> Self {
        let span = span.unwrap_or_else(|| tracing::info_span!("tree", func = %func_name));
        span.in_scope(|| AuditLogger::log_tree_created(config.max_height, config.capacity()));
        Self {
            inner: Mutex::new(TreeInner::new(config.max_height)),
            func_name,
            config,
            len: AtomicUsize::new(0),
            stats: TreeStats::new(),
            events: EventQueue::new(),
            span,
        }
    }

    // A panic mid-mutation has already surfaced; keep serving other callers.
    fn lock(&self) -> MutexGuard<'_, TreeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: TreeEvent) {
        if self.config.record_events {
            self.events.push(event);
        }
    }

    /// Attach a detached peer at the shallowest, leftmost open slot.
    ///
    /// Returns the handle of the attached peer. Fails with
    /// [`TreeError::CapacityExceeded`] when no slot exists within
    /// `max_height` levels; the tree is left untouched in that case.
    pub fn insert(&self, peer: Peer) -> Result<PeerHandle, TreeError> {
        let result = {
            let mut inner = self.lock();
            let attached = inner.attach(
                peer,
                self.config.id_assignment,
                self.config.rebalance_on_insert,
            );
            if let Ok(attachment) = &attached {
                inner.touch();
                self.len.store(inner.size, Ordering::Release);
                self.record(TreeEvent::Inserted {
                    id: attachment.id,
                    parent: attachment.parent,
                });
                for rotation in &attachment.rotations {
                    self.record(TreeEvent::Rotated {
                        pivot: rotation.pivot,
                        case: rotation.case,
                    });
                }
            }
            attached
        };

        let _enter = self.span.enter();
        match result {
            Ok(attachment) => {
                self.stats.record_insert();
                self.stats.record_rotations(attachment.rotations.len() as u64);
                AuditLogger::log_insert(attachment.id, attachment.parent);
                for rotation in &attachment.rotations {
                    AuditLogger::log_rebalance(rotation);
                }
                Ok(attachment.handle)
            }
            Err(err) => {
                self.stats.record_capacity_rejection();
                AuditLogger::log_capacity_exceeded(self.config.max_height, self.len());
                Err(err)
            }
        }
    }

    /// Remove a peer and restructure around it.
    ///
    /// Accepts an optional handle so lookups chain directly:
    /// `tree.delete(tree.find(id))`. `None` or a handle to a peer that is no
    /// longer attached yields [`TreeError::InvalidArgument`] without touching
    /// the tree. On success the removed peer is returned detached.
    pub fn delete(&self, target: impl Into<Option<PeerHandle>>) -> Result<Peer, TreeError> {
        let target = target.into();
        let result = {
            let mut inner = self.lock();
            match inner.resolve(target, "delete") {
                Ok(handle) => {
                    let removal = inner.remove(handle);
                    inner.touch();
                    self.len.store(inner.size, Ordering::Release);
                    self.record(TreeEvent::Removed {
                        id: removal.peer.id(),
                        case: removal.case,
                        replacement: removal.replacement,
                    });
                    for rotation in &removal.rotations {
                        self.record(TreeEvent::Rotated {
                            pivot: rotation.pivot,
                            case: rotation.case,
                        });
                    }
                    Ok(removal)
                }
                Err(err) => Err(err),
            }
        };

        let _enter = self.span.enter();
        match result {
            Ok(removal) => {
                self.stats.record_delete();
                self.stats.record_rotations(removal.rotations.len() as u64);
                AuditLogger::log_delete(
                    Some(removal.peer.id()),
                    Some(removal.case),
                    AuditOutcome::Success,
                    None,
                );
                for rotation in &removal.rotations {
                    AuditLogger::log_rebalance(rotation);
                }
                Ok(removal.peer)
            }
            Err(err) => {
                self.stats.record_invalid_argument();
                AuditLogger::log_delete(None, None, AuditOutcome::Denied, Some(&err.to_string()));
                Err(err)
            }
        }
    }

    /// Breadth-first lookup by id; the shallowest match wins
    pub fn find(&self, id: PeerId) -> Option<PeerHandle> {
        let found = self.lock().find_by_id(id);
        if found.is_none() {
            self.span.in_scope(|| tracing::debug!(peer_id = id, "no such peer"));
        }
        found
    }

    /// Snapshot of an attached peer
    pub fn peer(&self, handle: PeerHandle) -> Option<Peer> {
        self.lock().arena.get(handle).cloned()
    }

    /// Mark an attached peer as eligible to parent further peers
    pub fn set_ready(&self, handle: PeerHandle) -> Result<(), TreeError> {
        let mut inner = self.lock();
        let handle = inner.resolve(Some(handle), "set_ready")?;
        inner.arena[handle].set_ready();
        Ok(())
    }

    /// Update the transport endpoint of an attached peer
    pub fn set_endpoint(
        &self,
        handle: PeerHandle,
        addr: impl Into<String>,
        port: u16,
    ) -> Result<(), TreeError> {
        let mut inner = self.lock();
        let handle = inner.resolve(Some(handle), "set_endpoint")?;
        let peer = &mut inner.arena[handle];
        peer.set_addr(addr);
        peer.set_port(port);
        Ok(())
    }

    /// Level-order id dump, also logged at info level
    pub fn dump_tree(&self) -> TreeDump {
        let levels = self.lock().levels();
        let dump = TreeDump::new(self.func_name.clone(), levels);
        self.span.in_scope(|| {
            if dump.is_empty() {
                tracing::info!("tree is empty");
            } else {
                tracing::info!(len = dump.len, levels = ?dump.levels, "tree dump");
            }
        });
        dump
    }

    /// Parent-to-child edges in level order, with transport endpoints
    pub fn fanout_edges(&self) -> Vec<FanoutEdge> {
        let inner = self.lock();
        let mut edges = Vec::with_capacity(inner.size.saturating_sub(1));
        for handle in inner.level_order() {
            let parent = &inner.arena[handle];
            for child in [parent.left, parent.right].into_iter().flatten() {
                edges.push(FanoutEdge::new(parent, &inner.arena[child]));
            }
        }
        edges
    }

    /// Verify balance, cached heights, back-links, depth bound and size
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let inner = self.lock();
        inner.check()?;
        let counter = self.len.load(Ordering::Acquire);
        if counter != inner.size {
            return Err(InvariantViolation::SizeMismatch {
                reachable: inner.size,
                recorded: counter,
            });
        }
        Ok(())
    }

    pub fn root(&self) -> Option<PeerHandle> {
        self.lock().root
    }

    /// Height of the whole tree; -1 when empty
    pub fn height(&self) -> i32 {
        let inner = self.lock();
        inner.arena.height(inner.root)
    }

    /// Cached height of a possibly-absent peer (-1 when absent)
    pub fn height_of(&self, handle: impl Into<Option<PeerHandle>>) -> i32 {
        self.lock().arena.height(handle.into())
    }

    /// Balance factor of a possibly-absent peer (0 when absent)
    pub fn balance_factor(&self, handle: impl Into<Option<PeerHandle>>) -> i32 {
        self.lock().arena.balance_factor(handle.into())
    }

    /// Number of attached peers, read without taking the tree lock
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn func_name(&self) -> &str {
        &self.func_name
    }

    /// Timestamp of the last successful insert or delete
    pub fn latest_ts(&self) -> DateTime<Utc> {
        self.lock().last_modified
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Structural event journal (filled only when `record_events` is set)
    pub fn events(&self) -> &EventQueue {
        &self.events
    }
}
