use super::*;
use std::collections::HashSet;

#[test]
fn test_full_lifecycle() {
    let manager = create_test_manager();
    let order = create_and_advance(
        &manager,
        "R1",
        "w1",
        &[OrderStatus::Cooking, OrderStatus::Ready],
    );
    assert_eq!(order.status, OrderStatus::Ready);
    assert!(order.completed_at.is_none());

    let delivered = manager
        .update_status_at("R1", &order.id, OrderStatus::Delivered, at(16, 13, 0))
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.completed_at, Some(at(16, 13, 0)));

    let stored = manager.get_order("R1", &order.id).unwrap();
    assert_eq!(stored, delivered);
}

#[test]
fn test_skip_transition_rejected() {
    let manager = create_test_manager();
    let order = create_and_advance(&manager, "R1", "w1", &[]);

    let err = manager
        .update_status("R1", &order.id, OrderStatus::Ready)
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Ready,
            ..
        }
    ));

    // State unchanged
    let stored = manager.get_order("R1", &order.id).unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[test]
fn test_terminal_states_are_final() {
    let manager = create_test_manager();
    let cancelled = create_and_advance(&manager, "R1", "w1", &[OrderStatus::Cancelled]);
    let delivered = create_and_advance(
        &manager,
        "R1",
        "w1",
        &[
            OrderStatus::Cooking,
            OrderStatus::Ready,
            OrderStatus::Delivered,
        ],
    );

    for status in OrderStatus::ALL {
        assert!(
            manager.update_status("R1", &cancelled.id, status).is_err(),
            "cancelled -> {status} must be rejected"
        );
        assert!(
            manager.update_status("R1", &delivered.id, status).is_err(),
            "delivered -> {status} must be rejected"
        );
    }
}

#[test]
fn test_same_status_rejected() {
    let manager = create_test_manager();
    let order = create_and_advance(&manager, "R1", "w1", &[OrderStatus::Cooking]);

    let err = manager
        .update_status("R1", &order.id, OrderStatus::Cooking)
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidTransition { .. }));
}

#[test]
fn test_rejected_update_does_not_publish() {
    let manager = create_test_manager();
    let order = create_and_advance(&manager, "R1", "w1", &[]);
    let mut rx = manager.bus().subscribe_signals();
    let before = manager.storage().get_current_sequence().unwrap();

    assert!(
        manager
            .update_status("R1", &order.id, OrderStatus::Delivered)
            .is_err()
    );
    assert!(rx.try_recv().is_err());
    assert_eq!(manager.storage().get_current_sequence().unwrap(), before);
}

#[test]
fn test_update_unknown_order() {
    let manager = create_test_manager();
    let err = manager
        .update_status("R1", "nope", OrderStatus::Cooking)
        .unwrap_err();
    assert!(matches!(err, ManagerError::OrderNotFound(ref id) if id == "nope"));
}

#[test]
fn test_query_filters_and_order() {
    let manager = create_test_manager();
    let first = manager
        .create_order_at("R1", &draft_for("T1", "w1"), at(16, 9, 0))
        .unwrap();
    let second = manager
        .create_order_at("R1", &draft_for("T2", "w2"), at(16, 9, 5))
        .unwrap();
    let third = manager
        .create_order_at("R1", &draft_for("T3", "w1"), at(16, 9, 10))
        .unwrap();
    manager
        .create_order_at("R2", &draft_for("T9", "w1"), at(16, 9, 15))
        .unwrap();
    manager
        .update_status("R1", &second.id, OrderStatus::Cooking)
        .unwrap();

    let all = manager.query("R1", &OrderFilter::all()).unwrap();
    let ids: Vec<&str> = all.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

    let pending = manager
        .query("R1", &OrderFilter::with_status(OrderStatus::Pending))
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|o| o.status == OrderStatus::Pending));

    let mine = manager
        .query("R1", &OrderFilter::all().waiter("w1"))
        .unwrap();
    assert_eq!(mine.len(), 2);

    let limited = manager.query("R1", &OrderFilter::all().limit(1)).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, third.id);
}

#[test]
fn test_query_sequenced_tracks_writes() {
    let manager = create_test_manager();
    let empty = manager.query_sequenced("R1", &OrderFilter::all()).unwrap();
    assert_eq!(empty.sequence, 0);
    assert!(empty.orders.is_empty());

    let order = create_and_advance(&manager, "R1", "w1", &[OrderStatus::Cooking]);
    let read = manager.query_sequenced("R1", &OrderFilter::all()).unwrap();
    assert_eq!(read.sequence, 2);
    assert_eq!(read.orders[0].id, order.id);
}

#[test]
fn test_concurrent_creates_get_distinct_numbers() {
    let manager = create_test_manager();
    let now = at(16, 20, 0);
    const WRITERS: usize = 8;
    const PER_WRITER: usize = 5;

    let numbers: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let manager = &manager;
                s.spawn(move || {
                    (0..PER_WRITER)
                        .map(|_| {
                            manager
                                .create_order_at("R1", &draft_for("T1", &format!("w{w}")), now)
                                .unwrap()
                                .order_number
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    let total = WRITERS * PER_WRITER;
    let unique: HashSet<&String> = numbers.iter().collect();
    assert_eq!(unique.len(), total);

    let expected: HashSet<String> = (1..=total).map(|n| format!("16{n}")).collect();
    assert_eq!(numbers.into_iter().collect::<HashSet<_>>(), expected);
    assert_eq!(
        manager
            .storage()
            .get_day_counter("R1", "20261016")
            .unwrap(),
        total as u64
    );
}

#[test]
fn test_concurrent_writes_publish_in_sequence_order() {
    let manager = create_test_manager();
    let mut rx = manager.bus().subscribe_mutations();
    const WRITERS: usize = 6;

    std::thread::scope(|s| {
        for w in 0..WRITERS {
            let manager = &manager;
            s.spawn(move || {
                create_and_advance(
                    manager,
                    "R1",
                    &format!("w{w}"),
                    &[OrderStatus::Cooking, OrderStatus::Ready, OrderStatus::Delivered],
                );
            });
        }
    });

    let mut sequences = Vec::new();
    while let Ok(mutation) = rx.try_recv() {
        sequences.push(mutation.sequence);
    }
    let expected: Vec<u64> = (1..=(WRITERS as u64 * 4)).collect();
    assert_eq!(sequences, expected);
}
