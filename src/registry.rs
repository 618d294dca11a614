//! Per-function tree registry
//!
//! Systems that fan work out per function keep one tree per function name.
//! The registry is a sharded concurrent map, so lookups for different
//! functions never contend and each tree keeps its own lock.

use crate::audit::AuditLogger;
use crate::config::TreeConfig;
use crate::error::ConfigError;
use crate::events::StatsSnapshot;
use crate::tree::Tree;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent map from function name to its tree
#[derive(Debug)]
pub struct TreeRegistry {
    trees: DashMap<String, Arc<Tree>>,
    config: TreeConfig,
}

impl TreeRegistry {
    /// Registry whose trees all share `config`
    pub fn new(config: TreeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            trees: DashMap::new(),
            config,
        })
    }

    /// Tree for `func_name`, created empty on first use
    pub fn get_or_create(&self, func_name: &str) -> Arc<Tree> {
        if let Some(tree) = self.trees.get(func_name) {
            return Arc::clone(tree.value());
        }
        let entry = self.trees.entry(func_name.to_string()).or_insert_with(|| {
            Arc::new(Tree::build(func_name.to_string(), self.config.clone(), None))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, func_name: &str) -> Option<Arc<Tree>> {
        self.trees.get(func_name).map(|tree| Arc::clone(tree.value()))
    }

    /// Drop a tree from the registry; holders of the `Arc` keep using it
    pub fn remove(&self, func_name: &str) -> Option<Arc<Tree>> {
        self.trees.remove(func_name).map(|(_, tree)| tree)
    }

    pub fn contains(&self, func_name: &str) -> bool {
        self.trees.contains_key(func_name)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.trees.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Peers attached across every registered tree
    pub fn total_peers(&self) -> usize {
        self.trees.iter().map(|entry| entry.value().len()).sum()
    }

    /// Counters summed over every registered tree
    pub fn stats(&self) -> StatsSnapshot {
        self.trees
            .iter()
            .fold(StatsSnapshot::default(), |acc, entry| acc.merge(entry.value().stats()))
    }

    /// Drop empty trees untouched since `now - max_idle`.
    ///
    /// Trees that still hold peers are never evicted, and neither are trees
    /// a caller still holds an `Arc` to: inserts through that handle would
    /// land in a tree the registry no longer knows. Returns the evicted
    /// names, sorted.
    pub fn evict_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<String> {
        let cutoff = now - max_idle;
        let mut evicted = Vec::new();
        self.trees.retain(|name, tree| {
            // the shard write lock is held, so no new clone can appear here
            let idle = Arc::strong_count(tree) == 1
                && tree.is_empty()
                && tree.latest_ts() < cutoff;
            if idle {
                AuditLogger::log_eviction(name, (now - tree.latest_ts()).num_seconds());
                evicted.push(name.clone());
            }
            !idle
        });
        evicted.sort();
        evicted
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }
}

impl Default for TreeRegistry {
    fn default() -> Self {
        Self {
            trees: DashMap::new(),
            config: TreeConfig::default(),
        }
    }
}
