//! Read-only views of a tree for diagnostics and for the dispatch layer

use crate::peer::{Peer, PeerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level-order dump of peer ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDump {
    pub func_name: String,
    /// Number of peers in the dump
    pub len: usize,
    /// Ids per level, root level first, left to right
    pub levels: Vec<Vec<PeerId>>,
}

impl TreeDump {
    pub fn new(func_name: String, levels: Vec<Vec<PeerId>>) -> Self {
        let len = levels.iter().map(Vec::len).sum();
        Self {
            func_name,
            len,
            levels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Ids in level order
    pub fn ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.levels.iter().flatten().copied()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for TreeDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree {} ({} peers)", self.func_name, self.len)?;
        for (depth, level) in self.levels.iter().enumerate() {
            write!(f, "\n  L{}: {:?}", depth, level)?;
        }
        Ok(())
    }
}

/// Parent-to-child edge as seen by the dispatch layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutEdge {
    pub parent_id: PeerId,
    pub parent_endpoint: Option<String>,
    /// Whether the parent accepts forwarding work
    pub parent_ready: bool,
    pub child_id: PeerId,
    pub child_endpoint: Option<String>,
}

impl FanoutEdge {
    pub(crate) fn new(parent: &Peer, child: &Peer) -> Self {
        Self {
            parent_id: parent.id(),
            parent_endpoint: parent.endpoint(),
            parent_ready: parent.is_ready(),
            child_id: child.id(),
            child_endpoint: child.endpoint(),
        }
    }
}
