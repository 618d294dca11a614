//! Height maintenance and AVL rotations
//!
//! Heights are cached per peer and recomputed bottom-up after every
//! structural change. The fix-up walk climbs from the lowest changed node to
//! the root and applies the classic four rotation cases wherever the balance
//! factor leaves [-1, 1].

use crate::peer::{PeerHandle, PeerId};
use crate::tree::TreeInner;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Rotation applied at an unbalanced node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationCase {
    /// Left-heavy, left child not right-heavy: rotate right
    Right,
    /// Right-heavy, right child not left-heavy: rotate left
    Left,
    /// Left-heavy, left child right-heavy: rotate left at the child, then right
    LeftRight,
    /// Right-heavy, right child left-heavy: rotate right at the child, then left
    RightLeft,
}

impl fmt::Display for RotationCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationCase::Right => write!(f, "R"),
            RotationCase::Left => write!(f, "L"),
            RotationCase::LeftRight => write!(f, "LR"),
            RotationCase::RightLeft => write!(f, "RL"),
        }
    }
}

/// A rotation performed during a fix-up walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    /// Id of the unbalanced node the rotation was applied at
    pub pivot: PeerId,
    pub case: RotationCase,
}

impl TreeInner {
    pub(crate) fn update_height(&mut self, node: PeerHandle) {
        let peer = &self.arena[node];
        let height = 1 + self.arena.height(peer.left).max(self.arena.height(peer.right));
        self.arena[node].height = height;
    }

    /// Recompute heights from `start` up to the root without rotating
    pub(crate) fn refresh_heights(&mut self, start: PeerHandle) {
        let mut cursor = Some(start);
        while let Some(node) = cursor {
            self.update_height(node);
            cursor = self.arena[node].parent;
        }
    }

    /// Point whichever child link of `parent` holds `old` at `new`
    pub(crate) fn replace_child(
        &mut self,
        parent: PeerHandle,
        old: PeerHandle,
        new: Option<PeerHandle>,
    ) {
        let peer = &mut self.arena[parent];
        if peer.left == Some(old) {
            peer.left = new;
        } else {
            debug_assert_eq!(peer.right, Some(old), "{} is not a child of {}", old, parent);
            peer.right = new;
        }
    }

    /// Hand `x`'s slot under its parent (or the root pointer) to `y`
    fn promote(&mut self, x: PeerHandle, y: PeerHandle) {
        let parent = self.arena[x].parent;
        self.arena[y].parent = parent;
        match parent {
            None => self.root = Some(y),
            Some(p) => self.replace_child(p, x, Some(y)),
        }
    }

    pub(crate) fn rotate_left(&mut self, x: PeerHandle) {
        let y = self.arena[x]
            .right
            .expect("left rotation needs a right child");
        let inner = self.arena[y].left;

        self.arena[x].right = inner;
        if let Some(b) = inner {
            self.arena[b].parent = Some(x);
        }
        self.promote(x, y);
        self.arena[y].left = Some(x);
        self.arena[x].parent = Some(y);

        self.update_height(x);
        self.update_height(y);
    }

    pub(crate) fn rotate_right(&mut self, x: PeerHandle) {
        let y = self.arena[x]
            .left
            .expect("right rotation needs a left child");
        let inner = self.arena[y].right;

        self.arena[x].left = inner;
        if let Some(b) = inner {
            self.arena[b].parent = Some(x);
        }
        self.promote(x, y);
        self.arena[y].right = Some(x);
        self.arena[x].parent = Some(y);

        self.update_height(x);
        self.update_height(y);
    }

    fn classify(&self, node: PeerHandle) -> Option<RotationCase> {
        let balance = self.arena.balance_factor(Some(node));
        let peer = &self.arena[node];
        if balance > 1 {
            if self.arena.balance_factor(peer.left) >= 0 {
                Some(RotationCase::Right)
            } else {
                Some(RotationCase::LeftRight)
            }
        } else if balance < -1 {
            if self.arena.balance_factor(peer.right) <= 0 {
                Some(RotationCase::Left)
            } else {
                Some(RotationCase::RightLeft)
            }
        } else {
            None
        }
    }

    fn apply(&mut self, node: PeerHandle, case: RotationCase) {
        match case {
            RotationCase::Right => self.rotate_right(node),
            RotationCase::Left => self.rotate_left(node),
            RotationCase::LeftRight => {
                let left = self.arena[node].left.expect("left-heavy node has a left child");
                self.rotate_left(left);
                self.rotate_right(node);
            }
            RotationCase::RightLeft => {
                let right = self.arena[node].right.expect("right-heavy node has a right child");
                self.rotate_right(right);
                self.rotate_left(node);
            }
        }
    }

    /// Bottom-up fix-up pass from `start` to the root.
    ///
    /// After a rotation the walk continues at the rotated node's new parent,
    /// which is the node promoted over it.
    pub(crate) fn rebalance_from(&mut self, start: PeerHandle) -> Vec<Rotation> {
        let mut rotations = Vec::new();
        let mut cursor = Some(start);
        while let Some(node) = cursor {
            self.update_height(node);
            if let Some(case) = self.classify(node) {
                let pivot = self.arena[node].id;
                debug!(pivot, case = %case, "rebalance");
                self.apply(node, case);
                rotations.push(Rotation { pivot, case });
            }
            cursor = self.arena[node].parent;
        }
        rotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::Peer;

    /// Build a left-leaning chain a <- b <- c (c deepest) by hand
    fn chain(inner: &mut TreeInner, sides: &[bool]) -> Vec<PeerHandle> {
        let mut handles = Vec::new();
        for (i, &go_left) in std::iter::once(&true).chain(sides).enumerate() {
            let mut peer = Peer::new();
            peer.id = i;
            peer.parent = handles.last().copied();
            let handle = inner.arena.alloc(peer);
            match handles.last() {
                None => inner.root = Some(handle),
                Some(&parent) if go_left => inner.arena[parent].left = Some(handle),
                Some(&parent) => inner.arena[parent].right = Some(handle),
            }
            handles.push(handle);
            inner.size += 1;
        }
        let leaf = *handles.last().unwrap();
        inner.refresh_heights(leaf);
        handles
    }

    #[test]
    fn test_rotation_case_display() {
        assert_eq!(RotationCase::Right.to_string(), "R");
        assert_eq!(RotationCase::Left.to_string(), "L");
        assert_eq!(RotationCase::LeftRight.to_string(), "LR");
        assert_eq!(RotationCase::RightLeft.to_string(), "RL");
    }

    #[test]
    fn test_right_rotation_on_left_chain() {
        let mut inner = TreeInner::new(20);
        let h = chain(&mut inner, &[true, true]);
        assert_eq!(inner.arena.balance_factor(Some(h[0])), 2);

        let rotations = inner.rebalance_from(h[2]);
        assert_eq!(rotations, vec![Rotation { pivot: 0, case: RotationCase::Right }]);
        assert_eq!(inner.root, Some(h[1]));
        assert_eq!(inner.levels(), vec![vec![1], vec![2, 0]]);
        assert!(inner.arena[h[1]].parent.is_none());
        assert_eq!(inner.arena[h[0]].parent, Some(h[1]));
        assert_eq!(inner.arena[h[1]].height, 1);
        assert_eq!(inner.arena[h[0]].height, 0);
    }

    #[test]
    fn test_left_rotation_on_right_chain() {
        let mut inner = TreeInner::new(20);
        let h = chain(&mut inner, &[false, false]);
        let rotations = inner.rebalance_from(h[2]);
        assert_eq!(rotations, vec![Rotation { pivot: 0, case: RotationCase::Left }]);
        assert_eq!(inner.levels(), vec![vec![1], vec![0, 2]]);
    }

    #[test]
    fn test_left_right_double_rotation() {
        let mut inner = TreeInner::new(20);
        let h = chain(&mut inner, &[true, false]);
        let rotations = inner.rebalance_from(h[2]);
        assert_eq!(rotations, vec![Rotation { pivot: 0, case: RotationCase::LeftRight }]);
        assert_eq!(inner.root, Some(h[2]));
        assert_eq!(inner.levels(), vec![vec![2], vec![1, 0]]);
        assert!(inner.check().is_ok());
    }

    #[test]
    fn test_right_left_double_rotation() {
        let mut inner = TreeInner::new(20);
        let h = chain(&mut inner, &[false, true]);
        let rotations = inner.rebalance_from(h[2]);
        assert_eq!(rotations, vec![Rotation { pivot: 0, case: RotationCase::RightLeft }]);
        assert_eq!(inner.levels(), vec![vec![2], vec![0, 1]]);
        assert!(inner.check().is_ok());
    }

    #[test]
    fn test_rotation_below_root_relinks_parent_slot() {
        let mut inner = TreeInner::new(20);
        // 0 -> right 1 -> right 2 -> right 3, with 0 also given a left leaf
        let h = chain(&mut inner, &[false, false, false]);
        let mut extra = Peer::new();
        extra.id = 9;
        extra.parent = Some(h[0]);
        let extra = inner.arena.alloc(extra);
        inner.arena[h[0]].left = Some(extra);
        inner.size += 1;

        let rotations = inner.rebalance_from(h[3]);
        assert_eq!(rotations[0], Rotation { pivot: 1, case: RotationCase::Left });
        assert_eq!(inner.arena[h[0]].right, Some(h[2]));
        assert_eq!(inner.arena[h[2]].parent, Some(h[0]));
        assert!(inner.check().is_ok());
    }

    #[test]
    fn test_balanced_walk_only_refreshes_heights() {
        let mut inner = TreeInner::new(20);
        let h = chain(&mut inner, &[true]);
        inner.arena[h[0]].height = 7;
        assert!(inner.rebalance_from(h[1]).is_empty());
        assert_eq!(inner.arena[h[0]].height, 1);
    }
}
