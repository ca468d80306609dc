use super::*;
use chrono::TimeZone;
use shared::order::{CommandError, OrderErrorCode, OrderItem};

fn create_test_manager() -> OrdersManager {
    let storage = OrderStorage::open_in_memory().unwrap();
    OrdersManager::with_storage(storage, ManagerOptions::default())
}

fn create_manager_with(options: ManagerOptions) -> OrdersManager {
    let storage = OrderStorage::open_in_memory().unwrap();
    OrdersManager::with_storage(storage, options)
}

fn item(menu_id: &str, price: f64, quantity: u32) -> OrderItem {
    OrderItem {
        menu_id: menu_id.to_string(),
        name: format!("Dish {}", menu_id),
        price,
        quantity,
    }
}

// ========================================================================
// Helper: a valid draft for a table and waiter
// ========================================================================

fn draft_for(table: &str, waiter_id: &str) -> OrderDraft {
    OrderDraft {
        table: table.to_string(),
        items: vec![item("m1", 12.5, 2), item("m2", 3.0, 1)],
        waiter_id: waiter_id.to_string(),
        waiter_name: format!("Waiter {}", waiter_id),
        total_amount: 28.0,
    }
}

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
}

/// Create an order and move it along `path`
fn create_and_advance(
    manager: &OrdersManager,
    restaurant_id: &str,
    waiter_id: &str,
    path: &[OrderStatus],
) -> Order {
    let created = manager
        .create_order(restaurant_id, &draft_for("T1", waiter_id))
        .unwrap();
    let mut order = manager.get_order(restaurant_id, &created.id).unwrap();
    for status in path {
        order = manager
            .update_status(restaurant_id, &created.id, *status)
            .unwrap();
    }
    order
}

mod test_flows;
