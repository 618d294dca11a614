//! End-to-end scenarios for the fan-out tree
//!
//! Each test drives the public API only and re-checks the structural
//! invariants after every mutation.

use fanout_tree::{
    IdAssignment, Peer, RemovalCase, Tree, TreeConfig, TreeError, TreeEvent,
};

fn filled(name: &str, n: usize) -> Tree {
    let tree = Tree::new(name);
    for _ in 0..n {
        tree.insert(Peer::new()).unwrap();
        tree.check_invariants().unwrap();
    }
    tree
}

#[test]
fn test_fifteen_sequential_inserts_fill_four_levels() {
    let tree = filled("test", 15);

    let dump = tree.dump_tree();
    assert_eq!(dump.func_name, "test");
    assert_eq!(dump.len, 15);
    assert_eq!(
        dump.levels,
        vec![
            vec![0],
            vec![1, 2],
            vec![3, 4, 5, 6],
            (7..15).collect::<Vec<_>>(),
        ]
    );
    assert_eq!(tree.height(), 3);
    // a complete tree needs no rotations
    assert_eq!(tree.stats().rotations, 0);
}

#[test]
fn test_deletes_keep_balance_and_shrink_size() {
    let tree = filled("test", 15);

    let mut expected_len = 15;
    for id in [1, 2, 3] {
        tree.delete(tree.find(id)).unwrap();
        expected_len -= 1;
        assert_eq!(tree.len(), expected_len);
        assert!(tree.check_invariants().is_ok(), "unbalanced after deleting {}", id);
        assert!(tree.find(id).is_none());
    }

    assert_eq!(
        tree.dump_tree().levels,
        vec![
            vec![0],
            vec![7, 11],
            vec![8, 4, 5, 6],
            vec![9, 10, 12, 13, 14],
        ]
    );
}

#[test]
fn test_capacity_exceeded_only_when_height_exhausted() {
    let config = TreeConfig::default().with_max_height(3);
    let tree = Tree::with_config("small", config).unwrap();

    for _ in 0..7 {
        tree.insert(Peer::new()).unwrap();
    }
    assert_eq!(tree.len(), 7);

    let before = tree.latest_ts();
    let err = tree.insert(Peer::new()).unwrap_err();
    assert_eq!(err, TreeError::CapacityExceeded { max_height: 3 });
    assert_eq!(tree.len(), 7);
    assert_eq!(tree.latest_ts(), before);
    assert_eq!(tree.stats().capacity_rejections, 1);
    assert!(tree.check_invariants().is_ok());

    // freeing a slot makes room again
    tree.delete(tree.find(6)).unwrap();
    assert!(tree.insert(Peer::new()).is_ok());
}

#[test]
fn test_single_level_tree_holds_only_root() {
    let config = TreeConfig::default().with_max_height(1);
    let tree = Tree::with_config("root-only", config).unwrap();
    tree.insert(Peer::new()).unwrap();
    assert!(matches!(
        tree.insert(Peer::new()),
        Err(TreeError::CapacityExceeded { max_height: 1 })
    ));
}

#[test]
fn test_delete_none_changes_nothing() {
    let tree = filled("test", 5);
    let before = tree.dump_tree();
    let ts = tree.latest_ts();

    let err = tree.delete(None).unwrap_err();
    assert!(matches!(err, TreeError::InvalidArgument(_)));

    assert_eq!(tree.dump_tree(), before);
    assert_eq!(tree.latest_ts(), ts);
    assert_eq!(tree.len(), 5);
}

#[test]
fn test_empty_tree_queries() {
    let tree = Tree::new("idle");
    assert!(tree.is_empty());
    assert!(tree.root().is_none());
    assert!(tree.find(0).is_none());
    assert_eq!(tree.height(), -1);
    assert!(tree.dump_tree().is_empty());
    assert!(tree.fanout_edges().is_empty());
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_drain_to_empty_and_regrow() {
    let tree = filled("test", 10);
    while let Some(root) = tree.root() {
        tree.delete(root).unwrap();
        tree.check_invariants().unwrap();
    }
    assert!(tree.is_empty());

    for _ in 0..3 {
        tree.insert(Peer::new()).unwrap();
    }
    assert_eq!(tree.dump_tree().levels, vec![vec![0], vec![1, 2]]);
}

#[test]
fn test_find_with_monotonic_ids_after_churn() {
    let config = TreeConfig::default().with_id_assignment(IdAssignment::Monotonic);
    let tree = Tree::with_config("mono", config).unwrap();
    for _ in 0..20 {
        tree.insert(Peer::new()).unwrap();
    }
    for id in [0, 5, 9, 13] {
        tree.delete(tree.find(id)).unwrap();
    }
    for _ in 0..4 {
        tree.insert(Peer::new()).unwrap();
    }

    let mut ids: Vec<_> = tree.dump_tree().ids().collect();
    ids.sort_unstable();
    let expected: Vec<_> = (0..24).filter(|id| ![0, 5, 9, 13].contains(id)).collect();
    assert_eq!(ids, expected);

    for id in expected {
        let handle = tree.find(id).unwrap();
        assert_eq!(tree.peer(handle).unwrap().id(), id);
    }
    tree.check_invariants().unwrap();
}

#[test]
fn test_event_journal_describes_two_children_delete() {
    let config = TreeConfig::default().with_events(true);
    let tree = Tree::with_config("journal", config).unwrap();
    for _ in 0..7 {
        tree.insert(Peer::new()).unwrap();
    }
    tree.events().drain();

    tree.delete(tree.find(0)).unwrap();
    let events = tree.events().drain();
    assert_eq!(
        events[0],
        TreeEvent::Removed {
            id: 0,
            case: RemovalCase::TwoChildren,
            replacement: Some(3),
        }
    );
}

#[test]
fn test_fanout_edges_carry_endpoints() {
    let tree = Tree::new("edges");
    let root = tree.insert(Peer::with_endpoint("10.1.0.1", 7000)).unwrap();
    tree.insert(Peer::with_endpoint("10.1.0.2", 7000)).unwrap();
    tree.set_ready(root).unwrap();

    let edges = tree.fanout_edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].parent_endpoint.as_deref(), Some("10.1.0.1:7000"));
    assert!(edges[0].parent_ready);
    assert_eq!(edges[0].child_endpoint.as_deref(), Some("10.1.0.2:7000"));
}
