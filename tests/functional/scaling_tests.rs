//! Rebalancing scenarios against the mock cluster.

use keycl::client::ScalingOps;
use keycl::slots::{PlanError, ReshardPlan, SourceSpec};
use keycl::{Error, TOTAL_SLOTS};
use tokio_util::sync::CancellationToken;

use crate::MockCluster;

const HOST: &str = "127.0.0.1";
const PORT: u16 = 7000;

fn three_masters() -> MockCluster {
    MockCluster::new()
        .with_master("a", &[(0, 5460)])
        .with_master("b", &[(5461, 10922)])
        .with_master("c", &[(10923, 16383)])
}

#[tokio::test]
async fn test_reshard_all_gives_new_masters_equal_share() {
    let cluster = MockCluster::new()
        .with_master("a", &[(0, 8191)])
        .with_master("b", &[(8192, 16383)])
        .with_empty_master("c")
        .with_empty_master("d");

    let result = cluster
        .reshard_all(&CancellationToken::new(), HOST, PORT)
        .await
        .unwrap();

    assert_eq!(result.completed.len(), 2);
    assert_eq!(result.slots_moved, 8192);
    for plan in &result.completed {
        assert_eq!(plan.source, SourceSpec::All);
        assert_eq!(plan.slot_count, 4096);
    }
    assert_eq!(cluster.slot_count("c"), 4096);
    assert_eq!(cluster.slot_count("d"), 4096);
    assert_eq!(cluster.assigned_slots(), usize::from(TOTAL_SLOTS));
    assert_eq!(cluster.nodes_calls(), 1);
}

#[tokio::test]
async fn test_reshard_all_counts_replicas_in_share() {
    // Divisor is every node in the listing, replicas included
    let cluster = MockCluster::new()
        .with_master("a", &[(0, 16383)])
        .with_replica("ra", "a")
        .with_empty_master("b")
        .with_replica("rb", "b");

    let result = cluster
        .reshard_all(&CancellationToken::new(), HOST, PORT)
        .await
        .unwrap();

    assert_eq!(
        result.completed,
        vec![ReshardPlan::new("b", SourceSpec::All, 4096)]
    );
    assert_eq!(cluster.slot_count("a"), 12288);
}

#[tokio::test]
async fn test_reshard_all_balanced_cluster_is_noop() {
    let cluster = MockCluster::balanced(3);
    let result = cluster
        .reshard_all(&CancellationToken::new(), HOST, PORT)
        .await
        .unwrap();

    assert!(result.is_noop());
    assert!(cluster.reshards().is_empty());
}

#[tokio::test]
async fn test_reshard_all_stops_at_first_failure() {
    let mut cluster = MockCluster::new()
        .with_master("a", &[(0, 16383)])
        .with_empty_master("b")
        .with_empty_master("c")
        .with_empty_master("d");
    cluster.fail_on_reshard = Some(2);

    let err = cluster
        .reshard_all(&CancellationToken::new(), HOST, PORT)
        .await
        .unwrap_err();

    match err {
        Error::PartialReshard {
            step,
            total,
            failed_node,
            completed,
            ..
        } => {
            assert_eq!((step, total), (2, 3));
            assert_eq!(failed_node, "c");
            assert_eq!(completed, vec!["b".to_string()]);
        }
        other => panic!("expected partial reshard error, got {other}"),
    }

    // First step stays applied, later ones never ran
    assert_eq!(cluster.slot_count("b"), 4096);
    assert_eq!(cluster.slot_count("c"), 0);
    assert_eq!(cluster.slot_count("d"), 0);
    assert_eq!(cluster.reshards().len(), 1);
}

#[tokio::test]
async fn test_except_node_empties_middle_master() {
    let cluster = three_masters();

    let result = cluster
        .except_node(&CancellationToken::new(), HOST, PORT, "b")
        .await
        .unwrap();

    let plan = &result.completed[0];
    assert!(plan.target_node_id == "a" || plan.target_node_id == "c");
    assert_eq!(plan.source, SourceSpec::Node("b".to_string()));
    assert_eq!(plan.slot_count, 5462);

    assert_eq!(cluster.slot_count("b"), 0);
    assert_eq!(cluster.slot_count(&plan.target_node_id), 5461 + 5462);
    assert_eq!(cluster.assigned_slots(), usize::from(TOTAL_SLOTS));
}

#[tokio::test]
async fn test_except_node_edge_master_goes_to_only_neighbor() {
    let cluster = three_masters();

    let result = cluster
        .except_node(&CancellationToken::new(), HOST, PORT, "c")
        .await
        .unwrap();

    assert_eq!(
        result.completed,
        vec![ReshardPlan::new("b", SourceSpec::Node("c".to_string()), 5461)]
    );
    assert_eq!(cluster.slot_count("b"), 5462 + 5461);
}

#[tokio::test]
async fn test_except_node_after_reshard_all_uses_split_owner() {
    let cluster = MockCluster::balanced(3).with_empty_master("d");
    let cancel = CancellationToken::new();

    cluster.reshard_all(&cancel, HOST, PORT).await.unwrap();
    assert_eq!(cluster.slot_count("d"), 4096);
    assert_eq!(cluster.slot_count("m1"), 4096);

    // d now owns the slices on both sides of m1
    let result = cluster.except_node(&cancel, HOST, PORT, "m1").await.unwrap();

    assert_eq!(
        result.completed,
        vec![ReshardPlan::new("d", SourceSpec::Node("m1".to_string()), 4096)]
    );
    assert_eq!(cluster.slot_count("m1"), 0);
    assert_eq!(cluster.slot_count("d"), 8192);
    assert_eq!(cluster.assigned_slots(), usize::from(TOTAL_SLOTS));
}

#[tokio::test]
async fn test_except_node_rejections_touch_nothing() {
    let cluster = three_masters().with_replica("ra", "a");
    let cancel = CancellationToken::new();

    let err = cluster
        .except_node(&cancel, HOST, PORT, "missing")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Plan {
            source: PlanError::NodeNotFound(_),
            ..
        }
    ));

    let err = cluster
        .except_node(&cancel, HOST, PORT, "ra")
        .await
        .unwrap_err();
    assert!(err.is_precondition());

    let lonely = MockCluster::new().with_master("solo", &[(0, 16383)]);
    let err = lonely
        .except_node(&cancel, HOST, PORT, "solo")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Plan {
            source: PlanError::NoBorderNode { .. },
            ..
        }
    ));

    assert!(cluster.reshards().is_empty());
    assert!(lonely.reshards().is_empty());
}

#[tokio::test]
async fn test_merge_node_moves_split_ranges() {
    let cluster = MockCluster::new()
        .with_master("t", &[(0, 99), (200, 299), (350, 16383)])
        .with_master("s", &[(100, 199), (300, 349)]);

    let result = cluster
        .merge_node(&CancellationToken::new(), HOST, PORT, "t", "s")
        .await
        .unwrap();

    assert_eq!(result.slots_moved, 150);
    assert_eq!(cluster.slot_count("s"), 0);
    assert_eq!(cluster.slot_count("t"), usize::from(TOTAL_SLOTS));
}

#[tokio::test]
async fn test_merge_node_requires_both_nodes() {
    let cluster = three_masters();
    let cancel = CancellationToken::new();

    for (target, source) in [("a", "zz"), ("zz", "a")] {
        let err = cluster
            .merge_node(&cancel, HOST, PORT, target, source)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Plan {
                source: PlanError::NodeNotFound(ref id),
                ..
            } if id == "zz"
        ));
    }
    assert!(cluster.reshards().is_empty());
}

#[tokio::test]
async fn test_cancelled_token_surfaces_as_cancellation() {
    let cluster = three_masters();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = cluster
        .merge_node(&cancel, HOST, PORT, "a", "b")
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(cluster.slot_count("b"), 5462);
}
