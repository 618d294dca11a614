//! Audit logging for tree lifecycle events
//!
//! Every structural change to a tree is emitted as a structured `tracing`
//! event carrying `event_type` and `outcome` fields. Trees emit these inside
//! their own span, so the function name is attached by the subscriber.

use crate::balance::Rotation;
use crate::peer::PeerId;
use crate::removal::RemovalCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Tree event types for audit logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEventType {
    /// Tree created
    TreeLifecycle,
    /// Peer attached
    PeerInsert,
    /// Peer removed
    PeerDelete,
    /// Rotation applied
    Rebalance,
    /// Insert rejected for lack of a slot
    Capacity,
    /// Idle tree dropped from a registry
    Eviction,
}

impl fmt::Display for TreeEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeEventType::TreeLifecycle => write!(f, "TREE_LIFECYCLE"),
            TreeEventType::PeerInsert => write!(f, "PEER_INSERT"),
            TreeEventType::PeerDelete => write!(f, "PEER_DELETE"),
            TreeEventType::Rebalance => write!(f, "REBALANCE"),
            TreeEventType::Capacity => write!(f, "CAPACITY"),
            TreeEventType::Eviction => write!(f, "EVICTION"),
        }
    }
}

/// Audit event outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    /// Event succeeded
    Success,
    /// Event was denied/rejected
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "SUCCESS"),
            AuditOutcome::Denied => write!(f, "DENIED"),
        }
    }
}

/// Audit logger for tree events
pub struct AuditLogger;

impl AuditLogger {
    /// Log tree creation
    pub fn log_tree_created(max_height: usize, capacity: usize) {
        info!(
            event_type = %TreeEventType::TreeLifecycle,
            outcome = %AuditOutcome::Success,
            max_height = max_height,
            capacity = capacity,
            "Tree created"
        );
    }

    /// Log a peer insert
    ///
    /// Rejected inserts never get an id; they are logged through
    /// [`AuditLogger::log_capacity_exceeded`].
    pub fn log_insert(peer_id: PeerId, parent_id: Option<PeerId>) {
        info!(
            event_type = %TreeEventType::PeerInsert,
            outcome = %AuditOutcome::Success,
            peer_id = peer_id,
            parent_id = ?parent_id,
            "Peer inserted"
        );
    }

    /// Log a peer delete
    ///
    /// # Arguments
    /// * `peer_id` - Id of the removed peer, if one was resolved
    /// * `case` - Structural case of the delete
    /// * `outcome` - Whether the delete succeeded
    /// * `reason` - Optional reason for failure
    pub fn log_delete(
        peer_id: Option<PeerId>,
        case: Option<RemovalCase>,
        outcome: AuditOutcome,
        reason: Option<&str>,
    ) {
        match outcome {
            AuditOutcome::Success => {
                info!(
                    event_type = %TreeEventType::PeerDelete,
                    outcome = %outcome,
                    peer_id = ?peer_id,
                    case = ?case,
                    "Peer deleted"
                );
            }
            AuditOutcome::Denied => {
                warn!(
                    event_type = %TreeEventType::PeerDelete,
                    outcome = %outcome,
                    peer_id = ?peer_id,
                    reason = ?reason,
                    "Peer delete rejected"
                );
            }
        }
    }

    /// Log a rotation
    pub fn log_rebalance(rotation: &Rotation) {
        debug!(
            event_type = %TreeEventType::Rebalance,
            outcome = %AuditOutcome::Success,
            pivot = rotation.pivot,
            case = %rotation.case,
            "Rotation applied"
        );
    }

    /// Log an insert rejected because the height bound is exhausted
    pub fn log_capacity_exceeded(max_height: usize, len: usize) {
        warn!(
            event_type = %TreeEventType::Capacity,
            outcome = %AuditOutcome::Denied,
            max_height = max_height,
            len = len,
            "Tree is full"
        );
    }

    /// Log a tree dropped from a registry after sitting idle
    pub fn log_eviction(func_name: &str, idle_secs: i64) {
        info!(
            event_type = %TreeEventType::Eviction,
            outcome = %AuditOutcome::Success,
            func = %func_name,
            idle_secs = idle_secs,
            "Idle tree evicted"
        );
    }
}

/// Initialize audit logging with file rotation
///
/// # Arguments
/// * `log_dir` - Directory to store log files
/// * `max_files` - Maximum number of log files to keep
///
/// # Returns
/// A guard that flushes the non-blocking writer when dropped; keep it alive
/// for as long as events should reach the files.
pub fn init_audit_logging(
    log_dir: &str,
    max_files: usize,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("fanout-tree-audit")
        .filename_suffix("log")
        .max_log_files(max_files)
        .build(log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(non_blocking),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        );

    // Another subscriber may already be installed (tests, embedding process)
    let _ = subscriber.try_init();

    Ok(guard)
}

/// Initialize console logging for binaries
pub fn init_console_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::RotationCase;

    #[test]
    fn test_tree_event_type_display() {
        assert_eq!(format!("{}", TreeEventType::TreeLifecycle), "TREE_LIFECYCLE");
        assert_eq!(format!("{}", TreeEventType::PeerInsert), "PEER_INSERT");
        assert_eq!(format!("{}", TreeEventType::PeerDelete), "PEER_DELETE");
        assert_eq!(format!("{}", TreeEventType::Rebalance), "REBALANCE");
        assert_eq!(format!("{}", TreeEventType::Capacity), "CAPACITY");
        assert_eq!(format!("{}", TreeEventType::Eviction), "EVICTION");
    }

    #[test]
    fn test_audit_outcome_display() {
        assert_eq!(format!("{}", AuditOutcome::Success), "SUCCESS");
        assert_eq!(format!("{}", AuditOutcome::Denied), "DENIED");
    }

    #[test]
    fn test_audit_logger_peer_events() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        AuditLogger::log_insert(0, None);
        AuditLogger::log_insert(7, Some(3));
        AuditLogger::log_delete(Some(3), Some(RemovalCase::TwoChildren), AuditOutcome::Success, None);
        AuditLogger::log_delete(None, None, AuditOutcome::Denied, Some("no peer"));
    }

    #[test]
    fn test_audit_logger_rebalance_and_capacity() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        AuditLogger::log_rebalance(&Rotation {
            pivot: 1,
            case: RotationCase::LeftRight,
        });
        AuditLogger::log_capacity_exceeded(3, 7);
        AuditLogger::log_eviction("thumbnail", 900);
    }
}
