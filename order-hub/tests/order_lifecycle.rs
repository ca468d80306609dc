//! 订单生命周期 - 订单号唯一性, 状态机, 租户隔离
//!
//! 使用 HubState 完整初始化 (内存存储)

use chrono::{TimeZone, Utc};
use order_hub::{Config, HubState};
use shared::order::{OrderDraft, OrderErrorCode, OrderFilter, OrderItem, OrderStatus};
use std::collections::HashSet;

const CONCURRENCY: usize = 24;

fn draft(table: &str, waiter_id: &str) -> OrderDraft {
    OrderDraft {
        table: table.to_string(),
        items: vec![
            OrderItem {
                menu_id: "m1".to_string(),
                name: "Gazpacho".to_string(),
                price: 5.5,
                quantity: 2,
            },
            OrderItem {
                menu_id: "m2".to_string(),
                name: "Pan".to_string(),
                price: 1.2,
                quantity: 3,
            },
        ],
        waiter_id: waiter_id.to_string(),
        waiter_name: format!("Waiter {waiter_id}"),
        total_amount: 14.6,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_yield_distinct_numbers() {
    let state = HubState::in_memory(&Config::default_values()).unwrap();
    // Fixed creation time, so the business day cannot roll over mid-test
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

    let handles: Vec<_> = (0..CONCURRENCY)
        .map(|i| {
            let orders = state.orders.clone();
            tokio::task::spawn_blocking(move || {
                orders
                    .create_order_at("R1", &draft(&format!("T{i}"), "w1"), now)
                    .unwrap()
            })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let created = handle.await.unwrap();
        assert!(numbers.insert(created.order_number.clone()), "duplicate {}", created.order_number);
    }

    let expected: HashSet<String> = (1..=CONCURRENCY).map(|n| format!("16{n}")).collect();
    assert_eq!(numbers, expected);
}

#[tokio::test]
async fn status_follows_legal_paths_only() {
    let state = HubState::in_memory(&Config::default_values()).unwrap();
    let created = state.create_order("R1", draft("T1", "w1")).await.unwrap();

    // pending -> ready skips a step
    let err = state
        .update_order_status("R1", &created.id, OrderStatus::Ready)
        .await
        .unwrap_err();
    assert_eq!(err.code, OrderErrorCode::InvalidTransition);

    let mut observed = vec![state.get_order("R1", &created.id).unwrap().status];
    for status in [OrderStatus::Cooking, OrderStatus::Ready, OrderStatus::Delivered] {
        let order = state
            .update_order_status("R1", &created.id, status)
            .await
            .unwrap();
        observed.push(order.status);
    }
    assert_eq!(
        observed,
        vec![
            OrderStatus::Pending,
            OrderStatus::Cooking,
            OrderStatus::Ready,
            OrderStatus::Delivered
        ]
    );

    let delivered = state.get_order("R1", &created.id).unwrap();
    assert!(delivered.completed_at.is_some());

    for status in OrderStatus::ALL {
        let err = state
            .update_order_status("R1", &created.id, status)
            .await
            .unwrap_err();
        assert_eq!(err.code, OrderErrorCode::InvalidTransition);
    }
}

#[tokio::test]
async fn cancel_from_any_open_state() {
    let state = HubState::in_memory(&Config::default_values()).unwrap();

    for path in [
        vec![],
        vec![OrderStatus::Cooking],
        vec![OrderStatus::Cooking, OrderStatus::Ready],
    ] {
        let created = state.create_order("R1", draft("T1", "w1")).await.unwrap();
        for status in path {
            state
                .update_order_status("R1", &created.id, status)
                .await
                .unwrap();
        }
        let cancelled = state
            .update_order_status("R1", &created.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.completed_at.is_none());

        let err = state
            .update_order_status("R1", &created.id, OrderStatus::Cooking)
            .await
            .unwrap_err();
        assert_eq!(err.code, OrderErrorCode::InvalidTransition);
    }
}

#[tokio::test]
async fn restaurants_are_isolated() {
    let state = HubState::in_memory(&Config::default_values()).unwrap();
    let r1 = state.create_order("R1", draft("T1", "w1")).await.unwrap();
    let r2 = state.create_order("R2", draft("T1", "w1")).await.unwrap();

    // Same day, separate counters
    assert_eq!(r1.order_number, r2.order_number);

    let r2_orders = state.orders.query("R2", &OrderFilter::all()).unwrap();
    assert_eq!(r2_orders.len(), 1);
    assert_eq!(r2_orders[0].id, r2.id);

    let err = state
        .update_order_status("R2", &r1.id, OrderStatus::Cooking)
        .await
        .unwrap_err();
    assert_eq!(err.code, OrderErrorCode::OrderNotFound);
}

#[tokio::test]
async fn mismatched_total_rejected() {
    let state = HubState::in_memory(&Config::default_values()).unwrap();
    let mut bad = draft("T1", "w1");
    bad.total_amount = 100.0;

    let err = state.create_order("R1", bad).await.unwrap_err();
    assert_eq!(err.code, OrderErrorCode::InvalidOrder);
    assert!(state.orders.query("R1", &OrderFilter::all()).unwrap().is_empty());
}

#[tokio::test]
async fn orders_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default_values();
    config.work_dir = dir.path().to_path_buf();

    let created = {
        let state = HubState::initialize(&config).unwrap();
        state.create_order("R1", draft("T1", "w1")).await.unwrap()
    };

    let state = HubState::initialize(&config).unwrap();
    let order = state.get_order("R1", &created.id).unwrap();
    assert_eq!(order.order_number, created.order_number);

    // Counter continues where it left off
    let next = state.create_order("R1", draft("T2", "w1")).await.unwrap();
    assert_ne!(next.order_number, created.order_number);
}
