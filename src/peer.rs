//! Peer: one worker node of the fan-out tree
//!
//! A peer carries its transport metadata (address, port, readiness) and the
//! topology links the owning [`Tree`](crate::tree::Tree) maintains. Links are
//! arena handles, never references, so relinking during rotations and
//! splices is plain handle assignment.

use serde::{Deserialize, Serialize};

/// Sequential peer identity assigned at insertion
pub type PeerId = usize;

/// Generational reference to a peer attached to a tree.
///
/// A handle stays valid until its peer is deleted; afterwards every lookup
/// through it misses, even if the slot is reused by a later insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl PeerHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl std::fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// A worker node.
///
/// Created detached with [`Peer::new`]; owned by the tree once inserted.
/// Copies handed out by the tree are snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub(crate) id: PeerId,
    pub(crate) parent: Option<PeerHandle>,
    pub(crate) left: Option<PeerHandle>,
    pub(crate) right: Option<PeerHandle>,
    pub(crate) height: i32,
    addr: String,
    port: u16,
    ready: bool,
}

impl Peer {
    /// Detached peer: no links, height 0, empty address, not ready
    pub fn new() -> Self {
        Self {
            id: 0,
            parent: None,
            left: None,
            right: None,
            height: 0,
            addr: String::new(),
            port: 0,
            ready: false,
        }
    }

    /// Detached peer with transport endpoint
    pub fn with_endpoint(addr: impl Into<String>, port: u16) -> Self {
        let mut peer = Self::new();
        peer.addr = addr.into();
        peer.port = port;
        peer
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn parent(&self) -> Option<PeerHandle> {
        self.parent
    }

    pub fn left_child(&self) -> Option<PeerHandle> {
        self.left
    }

    pub fn right_child(&self) -> Option<PeerHandle> {
        self.right
    }

    /// Cached subtree height (leaf = 0)
    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn set_addr(&mut self, addr: impl Into<String>) {
        self.addr = addr.into();
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `addr:port`, or `None` while no address is set
    pub fn endpoint(&self) -> Option<String> {
        if self.addr.is_empty() {
            None
        } else {
            Some(format!("{}:{}", self.addr, self.port))
        }
    }

    /// Mark this peer as eligible to parent further peers
    pub fn set_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Strip topology so the peer can be handed back to a caller
    pub(crate) fn detach(&mut self) {
        self.parent = None;
        self.left = None;
        self.right = None;
        self.height = 0;
    }
}

impl Default for Peer {
    fn default() -> Self {
        Self::new()
    }
}
