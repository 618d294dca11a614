//! fanout_tree: concurrent, height-balanced peer trees for request fan-out
//!
//! A [`Tree`] places each new [`Peer`] in the shallowest, leftmost open slot
//! and keeps the hierarchy AVL-balanced across arbitrary deletes, so a
//! message pushed down from the root reaches every peer in a logarithmic
//! number of hops. Trees are named after the function they serve and can be
//! kept per function in a [`TreeRegistry`].
//!
//! Peers live in a generational arena owned by their tree; callers hold
//! copyable [`PeerHandle`]s, which stop resolving once the peer is deleted.

mod arena;
pub mod audit;
pub mod balance;
pub mod config;
pub mod dump;
pub mod error;
pub mod events;
pub mod invariants;
pub mod peer;
pub mod placement;
pub mod registry;
pub mod removal;
pub mod tree;

pub use balance::{Rotation, RotationCase};
pub use config::{IdAssignment, TreeConfig, DEFAULT_MAX_HEIGHT, MAX_SUPPORTED_HEIGHT};
pub use dump::{FanoutEdge, TreeDump};
pub use error::{ConfigError, TreeError};
pub use events::{EventQueue, StatsSnapshot, TreeEvent};
pub use invariants::InvariantViolation;
pub use peer::{Peer, PeerHandle, PeerId};
pub use placement::Side;
pub use registry::TreeRegistry;
pub use removal::RemovalCase;
pub use tree::Tree;
