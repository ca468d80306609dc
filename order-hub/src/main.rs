use std::time::Duration;

use order_hub::{HubState, NotificationSubscription, print_banner, setup_environment};
use shared::order::{NotificationRole, OrderDraft, OrderItem, OrderStatus};

const DEMO_RESTAURANT: &str = "demo-restaurant";
const DEMO_WAITER: &str = "w-ana";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志)
    let config = setup_environment();
    print_banner();

    tracing::info!(feed = ?config.feed_backend, "Order hub demo starting...");

    // 2. 初始化服务状态 (临时内存存储)
    let state = HubState::in_memory(&config)?;
    let restaurant = config
        .allowed_restaurants
        .first()
        .cloned()
        .unwrap_or_else(|| DEMO_RESTAURANT.to_string());

    // 3. 订阅通知
    let mut kitchen = state
        .subscribe_role_notifications(&restaurant, NotificationRole::Kitchen)
        .await?;
    let mut waiter = state
        .subscribe_role_notifications(&restaurant, NotificationRole::waiter(DEMO_WAITER))
        .await?;

    // 4. 下单并走完生命周期
    let first = state
        .create_order(&restaurant, draft("T3", &[("m1", "Gazpacho", 5.5, 2)]))
        .await?;
    let second = state
        .create_order(&restaurant, draft("T5", &[("m2", "Croquetas", 7.0, 1)]))
        .await?;
    tracing::info!(first = %first.order_number, second = %second.order_number, "Orders placed");

    for status in [OrderStatus::Cooking, OrderStatus::Ready, OrderStatus::Delivered] {
        state
            .update_order_status(&restaurant, &first.id, status)
            .await?;
    }
    state
        .update_order_status(&restaurant, &second.id, OrderStatus::Cancelled)
        .await?;

    // Illegal transitions are rejected, not applied
    if let Err(e) = state
        .update_order_status(&restaurant, &first.id, OrderStatus::Cooking)
        .await
    {
        tracing::info!(error = %e, "Rejected as expected");
    }

    // 5. 打印通知
    drain("kitchen", &mut kitchen).await?;
    drain("waiter", &mut waiter).await?;

    kitchen.unsubscribe();
    waiter.unsubscribe();
    tracing::info!("Order hub demo finished");
    Ok(())
}

fn draft(table: &str, items: &[(&str, &str, f64, u32)]) -> OrderDraft {
    let items: Vec<OrderItem> = items
        .iter()
        .map(|(menu_id, name, price, quantity)| OrderItem {
            menu_id: menu_id.to_string(),
            name: name.to_string(),
            price: *price,
            quantity: *quantity,
        })
        .collect();
    let total_amount = items.iter().map(|i| i.price * f64::from(i.quantity)).sum();
    OrderDraft {
        table: table.to_string(),
        items,
        waiter_id: DEMO_WAITER.to_string(),
        waiter_name: "Ana".to_string(),
        total_amount,
    }
}

/// Print notifications until the stream stays quiet for a moment
async fn drain(label: &str, subscription: &mut NotificationSubscription) -> anyhow::Result<()> {
    while let Ok(Some(notification)) =
        tokio::time::timeout(Duration::from_millis(300), subscription.next()).await
    {
        println!("[{label}] {}", serde_json::to_string(&notification)?);
    }
    Ok(())
}
