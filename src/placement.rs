//! Level-order placement and breadth-first searches
//!
//! Placement is structural, not key-ordered: a new peer goes to the first
//! node (scanning level by level, left to right) that lacks a child, left
//! slot before right slot. The searches here are plain BFS over the live
//! shape; after rotations the tree is no longer complete, so slot positions
//! cannot be derived from the peer count.

use crate::balance::Rotation;
use crate::config::IdAssignment;
use crate::error::TreeError;
use crate::peer::{Peer, PeerHandle, PeerId};
use crate::tree::TreeInner;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Which child slot of a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// An empty child slot found by the placement search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenSlot {
    pub(crate) parent: PeerHandle,
    pub(crate) side: Side,
}

/// Outcome of a successful attach
#[derive(Debug)]
pub(crate) struct Attachment {
    pub(crate) handle: PeerHandle,
    pub(crate) id: PeerId,
    pub(crate) parent: Option<PeerId>,
    pub(crate) rotations: Vec<Rotation>,
}

impl TreeInner {
    /// Shallowest, leftmost node missing a child, limited to nodes whose
    /// children still fit within `max_height` levels.
    pub(crate) fn next_open_slot(&self) -> Option<OpenSlot> {
        let root = self.root?;
        let mut queue = VecDeque::from([(root, 1usize)]);

        while let Some((handle, level)) = queue.pop_front() {
            if level >= self.max_height {
                debug!(max_height = self.max_height, "reached maximum tree height");
                return None;
            }
            let peer = &self.arena[handle];
            match peer.left {
                None => return Some(OpenSlot { parent: handle, side: Side::Left }),
                Some(left) => queue.push_back((left, level + 1)),
            }
            match peer.right {
                None => return Some(OpenSlot { parent: handle, side: Side::Right }),
                Some(right) => queue.push_back((right, level + 1)),
            }
        }

        // The deepest level always holds leaves, so the scan cannot run dry.
        unreachable!("level-order scan exhausted a non-empty tree without an open slot")
    }

    /// First leaf met by a breadth-first search starting at `start`
    pub(crate) fn first_leaf(&self, start: PeerHandle) -> Option<PeerHandle> {
        let mut queue = VecDeque::from([start]);
        while let Some(handle) = queue.pop_front() {
            let peer = &self.arena[handle];
            if peer.is_leaf() {
                return Some(handle);
            }
            queue.extend(peer.left);
            queue.extend(peer.right);
        }
        None
    }

    /// Breadth-first lookup; with repeated ids the shallowest match wins
    pub(crate) fn find_by_id(&self, id: PeerId) -> Option<PeerHandle> {
        self.level_order()
            .into_iter()
            .find(|&handle| self.arena[handle].id == id)
    }

    /// Every attached handle in level order
    pub(crate) fn level_order(&self) -> Vec<PeerHandle> {
        let mut order = Vec::with_capacity(self.size);
        let mut queue: VecDeque<PeerHandle> = self.root.into_iter().collect();
        while let Some(handle) = queue.pop_front() {
            let peer = &self.arena[handle];
            queue.extend(peer.left);
            queue.extend(peer.right);
            order.push(handle);
        }
        order
    }

    /// Ids grouped per level, root level first
    pub(crate) fn levels(&self) -> Vec<Vec<PeerId>> {
        let mut levels = Vec::new();
        let mut current: Vec<PeerHandle> = self.root.into_iter().collect();
        while !current.is_empty() {
            let mut next = Vec::with_capacity(current.len() * 2);
            let mut ids = Vec::with_capacity(current.len());
            for handle in current {
                let peer = &self.arena[handle];
                ids.push(peer.id);
                next.extend(peer.left);
                next.extend(peer.right);
            }
            levels.push(ids);
            current = next;
        }
        levels
    }

    fn assign_id(&mut self, policy: IdAssignment) -> PeerId {
        let id = match policy {
            IdAssignment::TreeSize => self.size,
            IdAssignment::Monotonic => self.next_id,
        };
        self.next_id += 1;
        id
    }

    /// Attach a detached peer at the next open slot.
    ///
    /// Nothing is mutated when the height bound leaves no slot.
    pub(crate) fn attach(
        &mut self,
        mut peer: Peer,
        policy: IdAssignment,
        rebalance: bool,
    ) -> Result<Attachment, TreeError> {
        let slot = match self.root {
            None => None,
            Some(_) => Some(self.next_open_slot().ok_or(TreeError::CapacityExceeded {
                max_height: self.max_height,
            })?),
        };

        peer.detach();
        peer.id = self.assign_id(policy);
        peer.parent = slot.map(|s| s.parent);
        let id = peer.id;
        let handle = self.arena.alloc(peer);
        self.size += 1;

        let Some(slot) = slot else {
            debug!(peer_id = id, "insert as root");
            self.root = Some(handle);
            return Ok(Attachment {
                handle,
                id,
                parent: None,
                rotations: Vec::new(),
            });
        };

        let parent = &mut self.arena[slot.parent];
        match slot.side {
            Side::Left => parent.left = Some(handle),
            Side::Right => parent.right = Some(handle),
        }
        let parent_id = parent.id;
        debug!(peer_id = id, parent_id, side = ?slot.side, "insert below parent");

        let rotations = if rebalance {
            self.rebalance_from(slot.parent)
        } else {
            self.refresh_heights(slot.parent);
            Vec::new()
        };

        Ok(Attachment {
            handle,
            id,
            parent: Some(parent_id),
            rotations,
        })
    }
}
