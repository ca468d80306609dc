use std::sync::Arc;

use shared::order::{
    CommandError, CreatedOrder, NotificationRole, Order, OrderDraft, OrderErrorCode, OrderFilter,
    OrderStatus,
};

use crate::core::{Config, Result};
use crate::feed::{ChangeFeed, FeedError, FeedRequest, FeedSubscription, build_change_feed};
use crate::notifications::{NotificationService, NotificationSubscription};
use crate::orders::{ManagerOptions, OrderStorage, OrdersManager};

/// Hub state - shared handles to every service
///
/// Cheap to clone; every field is reference counted.
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | orders | Arc<OrdersManager> | Order Store |
/// | feed | Arc<dyn ChangeFeed> | adapter picked by `FEED_BACKEND` |
/// | notifications | NotificationService | role subscriptions over `feed` |
///
/// # 使用示例
///
/// ```ignore
/// let state = HubState::initialize(&config)?;
/// let created = state.create_order("R1", draft).await?;
/// let mut kitchen = state
///     .subscribe_role_notifications("R1", NotificationRole::Kitchen)
///     .await?;
/// ```
#[derive(Clone)]
pub struct HubState {
    pub config: Config,
    pub orders: Arc<OrdersManager>,
    pub feed: Arc<dyn ChangeFeed>,
    pub notifications: NotificationService,
}

impl std::fmt::Debug for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubState")
            .field("config", &self.config)
            .field("orders", &self.orders)
            .field("feed", &self.feed.name())
            .finish()
    }
}

impl HubState {
    /// Wire services around an existing manager
    pub fn new(config: Config, orders: Arc<OrdersManager>) -> Self {
        let feed = build_change_feed(&config, orders.clone());
        let notifications = NotificationService::new(feed.clone());
        tracing::info!(
            feed = feed.name(),
            timezone = %config.timezone,
            "Order hub state ready"
        );
        Self {
            config,
            orders,
            feed,
            notifications,
        }
    }

    /// 初始化: 工作目录, 数据库 (work_dir/orders.redb), 服务
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;
        let orders = OrdersManager::new(config.db_path(), ManagerOptions::from(config))?;
        match orders.storage().get_stats() {
            Ok(stats) => tracing::info!(
                path = %config.db_path().display(),
                orders = stats.order_count,
                day_counters = stats.day_counter_count,
                sequence = stats.current_sequence,
                "Order store opened"
            ),
            Err(e) => tracing::warn!(error = %e, "Order store statistics unavailable"),
        }
        Ok(Self::new(config.clone(), Arc::new(orders)))
    }

    /// Same wiring over an in-memory store
    pub fn in_memory(config: &Config) -> Result<Self> {
        let storage = OrderStorage::open_in_memory().map_err(crate::orders::ManagerError::from)?;
        let orders = OrdersManager::with_storage(storage, ManagerOptions::from(config));
        Ok(Self::new(config.clone(), Arc::new(orders)))
    }

    // ========== Writes ==========

    /// Place a new order; the counter transaction may block, so it runs off
    /// the async workers
    pub async fn create_order(
        &self,
        restaurant_id: &str,
        draft: OrderDraft,
    ) -> std::result::Result<CreatedOrder, CommandError> {
        let orders = self.orders.clone();
        let restaurant_id = restaurant_id.to_string();
        tokio::task::spawn_blocking(move || orders.create_order(&restaurant_id, &draft))
            .await
            .map_err(join_error)?
            .map_err(CommandError::from)
    }

    pub async fn update_order_status(
        &self,
        restaurant_id: &str,
        order_id: &str,
        status: OrderStatus,
    ) -> std::result::Result<Order, CommandError> {
        let orders = self.orders.clone();
        let restaurant_id = restaurant_id.to_string();
        let order_id = order_id.to_string();
        tokio::task::spawn_blocking(move || orders.update_status(&restaurant_id, &order_id, status))
            .await
            .map_err(join_error)?
            .map_err(CommandError::from)
    }

    // ========== Reads ==========

    pub fn get_order(
        &self,
        restaurant_id: &str,
        order_id: &str,
    ) -> std::result::Result<Order, CommandError> {
        self.orders
            .get_order(restaurant_id, order_id)
            .map_err(CommandError::from)
    }

    /// Live order list for dashboards
    pub async fn subscribe_orders(
        &self,
        restaurant_id: &str,
        filter: OrderFilter,
    ) -> std::result::Result<FeedSubscription, FeedError> {
        self.feed
            .subscribe(FeedRequest::new(restaurant_id, filter))
            .await
    }

    /// Kitchen / waiter notification stream
    pub async fn subscribe_role_notifications(
        &self,
        restaurant_id: &str,
        role: NotificationRole,
    ) -> std::result::Result<NotificationSubscription, FeedError> {
        self.notifications.subscribe(restaurant_id, role).await
    }
}

fn join_error(e: tokio::task::JoinError) -> CommandError {
    tracing::error!(error = %e, "Order task failed");
    CommandError::new(OrderErrorCode::InternalError, "order task failed")
}
