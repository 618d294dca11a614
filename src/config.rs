//! Tree configuration
//!
//! Loaded from JSON (all fields optional) or built in code. Every tree of a
//! [`TreeRegistry`](crate::registry::TreeRegistry) shares one configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of levels a tree may grow to (2^20 - 1 peers)
pub const DEFAULT_MAX_HEIGHT: usize = 20;

/// Largest accepted `max_height`
pub const MAX_SUPPORTED_HEIGHT: usize = 32;

/// How peer ids are assigned on insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdAssignment {
    /// id = number of attached peers at insertion time.
    ///
    /// Ids can repeat once deletes have shrunk the tree.
    #[default]
    TreeSize,
    /// id drawn from a counter that only grows; never reused for the
    /// lifetime of the tree.
    Monotonic,
}

/// Configuration for a fan-out tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum number of levels (root is level 1)
    pub max_height: usize,
    /// Id assignment policy
    pub id_assignment: IdAssignment,
    /// Run the AVL fix-up pass after insert as well as after delete.
    ///
    /// Off by default: level-order placement fills the shallowest open slot,
    /// so every ancestor's other side is at most one level shorter and an
    /// insert alone never breaks balance. Heights are refreshed either way.
    pub rebalance_on_insert: bool,
    /// Push structural events onto the tree's event journal
    pub record_events: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_height: DEFAULT_MAX_HEIGHT,
            id_assignment: IdAssignment::TreeSize,
            rebalance_on_insert: false,
            record_events: false,
        }
    }
}

impl TreeConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TreeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn with_max_height(mut self, max_height: usize) -> Self {
        self.max_height = max_height;
        self
    }

    pub fn with_id_assignment(mut self, id_assignment: IdAssignment) -> Self {
        self.id_assignment = id_assignment;
        self
    }

    pub fn with_rebalance_on_insert(mut self, rebalance_on_insert: bool) -> Self {
        self.rebalance_on_insert = rebalance_on_insert;
        self
    }

    pub fn with_events(mut self, record_events: bool) -> Self {
        self.record_events = record_events;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_height == 0 || self.max_height > MAX_SUPPORTED_HEIGHT {
            return Err(ConfigError::Invalid(format!(
                "max_height must be in 1..={}, got {}",
                MAX_SUPPORTED_HEIGHT, self.max_height
            )));
        }
        Ok(())
    }

    /// Number of peers a full tree of `max_height` levels holds
    pub fn capacity(&self) -> usize {
        1usize
            .checked_shl(self.max_height as u32)
            .map(|n| n - 1)
            .unwrap_or(usize::MAX)
    }
}
