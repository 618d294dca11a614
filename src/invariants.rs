//! Structural invariant checks
//!
//! Walks the whole pointer graph and reports the first violation found.
//! Used by tests, the churn simulator and anyone embedding the tree who
//! wants to assert consistency after a batch of operations.

use crate::peer::{PeerHandle, PeerId};
use crate::tree::TreeInner;
use thiserror::Error;

/// A broken structural invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("peer {id}: cached height {cached}, actual {actual}")]
    HeightMismatch { id: PeerId, cached: i32, actual: i32 },

    #[error("peer {id}: balance factor {balance} outside [-1, 1]")]
    Unbalanced { id: PeerId, balance: i32 },

    #[error("peer {child} does not point back to its parent {parent}")]
    BrokenBackLink { parent: PeerId, child: PeerId },

    #[error("root peer {id} has a parent link")]
    RootHasParent { id: PeerId },

    #[error("peer {id} at level {level} exceeds max height {max_height}")]
    DepthExceeded { id: PeerId, level: usize, max_height: usize },

    #[error("{reachable} peers reachable from root, {recorded} recorded")]
    SizeMismatch { reachable: usize, recorded: usize },
}

impl TreeInner {
    /// Check every invariant of the attached peers
    pub(crate) fn check(&self) -> Result<(), InvariantViolation> {
        let mut reachable = 0;
        if let Some(root) = self.root {
            if self.arena[root].parent.is_some() {
                return Err(InvariantViolation::RootHasParent {
                    id: self.arena[root].id,
                });
            }
            self.check_subtree(root, 1, &mut reachable)?;
        }

        for recorded in [self.size, self.arena.len()] {
            if recorded != reachable {
                return Err(InvariantViolation::SizeMismatch { reachable, recorded });
            }
        }
        Ok(())
    }

    /// Returns the actual height of the subtree rooted at `node`
    fn check_subtree(
        &self,
        node: PeerHandle,
        level: usize,
        reachable: &mut usize,
    ) -> Result<i32, InvariantViolation> {
        let peer = &self.arena[node];
        *reachable += 1;

        if level > self.max_height {
            return Err(InvariantViolation::DepthExceeded {
                id: peer.id,
                level,
                max_height: self.max_height,
            });
        }

        let mut child_heights = [-1, -1];
        for (slot, child) in [peer.left, peer.right].into_iter().enumerate() {
            let Some(child) = child else { continue };
            if self.arena[child].parent != Some(node) {
                return Err(InvariantViolation::BrokenBackLink {
                    parent: peer.id,
                    child: self.arena[child].id,
                });
            }
            child_heights[slot] = self.check_subtree(child, level + 1, reachable)?;
        }

        let actual = 1 + child_heights[0].max(child_heights[1]);
        if peer.height != actual {
            return Err(InvariantViolation::HeightMismatch {
                id: peer.id,
                cached: peer.height,
                actual,
            });
        }

        let balance = child_heights[0] - child_heights[1];
        if balance.abs() > 1 {
            return Err(InvariantViolation::Unbalanced { id: peer.id, balance });
        }

        Ok(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdAssignment;
    use crate::peer::Peer;

    fn grown(n: usize) -> TreeInner {
        let mut inner = TreeInner::new(20);
        for _ in 0..n {
            inner
                .attach(Peer::new(), IdAssignment::TreeSize, true)
                .unwrap();
        }
        inner
    }

    #[test]
    fn test_healthy_tree_passes() {
        assert!(grown(0).check().is_ok());
        assert!(grown(1).check().is_ok());
        assert!(grown(100).check().is_ok());
    }

    #[test]
    fn test_detects_stale_height() {
        let mut inner = grown(3);
        let root = inner.root.unwrap();
        inner.arena[root].height = 5;
        assert_eq!(
            inner.check(),
            Err(InvariantViolation::HeightMismatch { id: 0, cached: 5, actual: 1 })
        );
    }

    #[test]
    fn test_detects_broken_back_link() {
        let mut inner = grown(3);
        let two = inner.find_by_id(2).unwrap();
        inner.arena[two].parent = None;
        assert_eq!(
            inner.check(),
            Err(InvariantViolation::BrokenBackLink { parent: 0, child: 2 })
        );
    }

    #[test]
    fn test_detects_imbalance() {
        let mut inner = grown(4);
        // drop node 2 without rebalancing: root becomes left-heavy by 2
        let root = inner.root.unwrap();
        let two = inner.find_by_id(2).unwrap();
        inner.replace_child(root, two, None);
        inner.arena.release(two);
        inner.size -= 1;
        inner.refresh_heights(root);
        assert_eq!(
            inner.check(),
            Err(InvariantViolation::Unbalanced { id: 0, balance: 2 })
        );
    }

    #[test]
    fn test_detects_size_drift() {
        let mut inner = grown(3);
        inner.size = 4;
        assert_eq!(
            inner.check(),
            Err(InvariantViolation::SizeMismatch { reachable: 3, recorded: 4 })
        );
    }
}
