//! Arbitrary-position delete
//!
//! Four shapes are handled, matched on the target's children:
//!
//! ```text
//!   sole root      leaf           one child        two children
//!      (x)          p              p                  p
//!                  / \            /                  /
//!                (x)  .         (x)                (x)
//!                               /                  /  \
//!                              c                  l    r
//!                                                 ...  ...
//!                                                   s  <- first leaf by BFS from x
//! ```
//!
//! With two children there is no key order to pick an in-order successor
//! from, so the replacement is the shallowest, leftmost leaf of the target's
//! subtree. Removing a leaf from the bottom and relabelling the target's
//! position keeps the change to a single-leaf removal as far as heights are
//! concerned, which the bottom-up fix-up pass repairs.

use crate::balance::Rotation;
use crate::peer::{Peer, PeerHandle, PeerId};
use crate::tree::TreeInner;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Structural shape of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCase {
    /// Only node in the tree
    SoleRoot,
    /// Childless, not the root
    Leaf,
    /// Exactly one child, which takes the node's place
    SingleChild,
    /// Both children; a leaf from the subtree takes the node's place
    TwoChildren,
}

impl fmt::Display for RemovalCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalCase::SoleRoot => write!(f, "sole_root"),
            RemovalCase::Leaf => write!(f, "leaf"),
            RemovalCase::SingleChild => write!(f, "single_child"),
            RemovalCase::TwoChildren => write!(f, "two_children"),
        }
    }
}

/// Outcome of a delete
#[derive(Debug)]
pub(crate) struct Removal {
    pub(crate) peer: Peer,
    pub(crate) case: RemovalCase,
    /// Peer now occupying the deleted node's position, if any
    pub(crate) replacement: Option<PeerId>,
    pub(crate) rotations: Vec<Rotation>,
}

impl TreeInner {
    /// Put `new` where `old` hangs: under `parent`, or at the root
    fn transplant(&mut self, parent: Option<PeerHandle>, old: PeerHandle, new: PeerHandle) {
        self.arena[new].parent = parent;
        match parent {
            None => self.root = Some(new),
            Some(p) => self.replace_child(p, old, Some(new)),
        }
    }

    /// Remove an attached peer, restructure around it and rebalance.
    ///
    /// The caller has already checked that `target` is attached.
    pub(crate) fn remove(&mut self, target: PeerHandle) -> Removal {
        let peer = &self.arena[target];
        let (parent, left, right) = (peer.parent, peer.left, peer.right);

        let (case, replacement, fixup_from) = match (left, right) {
            (None, None) => match parent {
                None => {
                    self.root = None;
                    (RemovalCase::SoleRoot, None, None)
                }
                Some(p) => {
                    self.replace_child(p, target, None);
                    (RemovalCase::Leaf, None, Some(p))
                }
            },
            (Some(child), None) | (None, Some(child)) => {
                self.transplant(parent, target, child);
                // A promoted root child keeps a consistent subtree; nothing above it.
                (RemovalCase::SingleChild, Some(child), parent)
            }
            (Some(left), Some(right)) => {
                let successor = self
                    .first_leaf(target)
                    .expect("a subtree with two children contains a leaf");
                let successor_parent = self.arena[successor]
                    .parent
                    .expect("a leaf below the target has a parent");

                self.replace_child(successor_parent, successor, None);
                let left = (left != successor).then_some(left);
                let right = (right != successor).then_some(right);

                self.transplant(parent, target, successor);
                self.arena[successor].left = left;
                self.arena[successor].right = right;
                for child in [left, right].into_iter().flatten() {
                    self.arena[child].parent = Some(successor);
                }

                let fixup_from = if successor_parent == target {
                    successor
                } else {
                    successor_parent
                };
                (RemovalCase::TwoChildren, Some(successor), Some(fixup_from))
            }
        };

        let mut peer = self
            .arena
            .release(target)
            .expect("target was checked as attached");
        peer.detach();
        self.size -= 1;

        let replacement = replacement.map(|h| self.arena[h].id);
        debug!(peer_id = peer.id, case = %case, replacement = ?replacement, "delete");

        let rotations = match fixup_from {
            Some(start) => self.rebalance_from(start),
            None => Vec::new(),
        };

        Removal {
            peer,
            case,
            replacement,
            rotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdAssignment;

    fn grown(n: usize) -> TreeInner {
        let mut inner = TreeInner::new(20);
        for _ in 0..n {
            inner
                .attach(Peer::new(), IdAssignment::TreeSize, true)
                .unwrap();
        }
        inner
    }

    fn remove_id(inner: &mut TreeInner, id: PeerId) -> Removal {
        let handle = inner.find_by_id(id).unwrap();
        let removal = inner.remove(handle);
        inner.check().unwrap();
        removal
    }

    #[test]
    fn test_sole_root() {
        let mut inner = grown(1);
        let removal = remove_id(&mut inner, 0);
        assert_eq!(removal.case, RemovalCase::SoleRoot);
        assert!(inner.root.is_none());
        assert_eq!(inner.size, 0);
        assert_eq!(inner.arena.len(), 0);
    }

    #[test]
    fn test_leaf() {
        let mut inner = grown(4);
        let removal = remove_id(&mut inner, 3);
        assert_eq!(removal.case, RemovalCase::Leaf);
        assert_eq!(removal.replacement, None);
        assert_eq!(inner.levels(), vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_single_child_below_parent() {
        let mut inner = grown(4);
        let removal = remove_id(&mut inner, 1);
        assert_eq!(removal.case, RemovalCase::SingleChild);
        assert_eq!(removal.replacement, Some(3));
        assert_eq!(inner.levels(), vec![vec![0], vec![3, 2]]);
    }

    #[test]
    fn test_single_child_root() {
        let mut inner = grown(2);
        let removal = remove_id(&mut inner, 0);
        assert_eq!(removal.case, RemovalCase::SingleChild);
        let root = inner.root.unwrap();
        assert_eq!(inner.arena[root].id, 1);
        assert!(inner.arena[root].parent.is_none());
    }

    #[test]
    fn test_two_children_direct_leaf_child() {
        let mut inner = grown(3);
        let removal = remove_id(&mut inner, 0);
        assert_eq!(removal.case, RemovalCase::TwoChildren);
        assert_eq!(removal.replacement, Some(1));
        assert_eq!(inner.levels(), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_two_children_deep_successor() {
        let mut inner = grown(15);
        let removal = remove_id(&mut inner, 1);
        assert_eq!(removal.case, RemovalCase::TwoChildren);
        // first leaf below 1 is 7
        assert_eq!(removal.replacement, Some(7));
        assert_eq!(inner.size, 14);
        assert_eq!(
            inner.levels(),
            vec![vec![0], vec![7, 2], vec![3, 4, 5, 6], vec![8, 9, 10, 11, 12, 13, 14]]
        );
    }

    #[test]
    fn test_leaf_delete_triggers_rotation() {
        // 0 / 1 2 / 3 4 5 -> remove 5 and 2 leaves 0 left-heavy by 2
        let mut inner = grown(6);
        remove_id(&mut inner, 5);
        let removal = remove_id(&mut inner, 2);
        assert_eq!(removal.case, RemovalCase::Leaf);
        assert_eq!(removal.rotations.len(), 1);
        assert_eq!(removal.rotations[0].pivot, 0);
        assert_eq!(inner.levels(), vec![vec![1], vec![3, 0], vec![4]]);
    }

    #[test]
    fn test_removed_peer_is_detached() {
        let mut inner = grown(7);
        let removal = remove_id(&mut inner, 2);
        assert!(removal.peer.parent().is_none());
        assert!(removal.peer.is_leaf());
        assert_eq!(removal.peer.id(), 2);
    }
}
