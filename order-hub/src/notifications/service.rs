//! Notification subscriptions
//!
//! Each subscription runs on its own task that owns one
//! [`NotificationDispatcher`] and the current feed connection. Failures stay
//! inside that task; sibling subscriptions are unaffected.

use super::NotificationDispatcher;
use crate::feed::{ChangeFeed, FeedError, FeedPurpose, FeedRequest, FeedSnapshot, FeedSubscription};
use shared::order::{Notification, NotificationRole};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const NOTIFICATION_BUFFER: usize = 256;

#[derive(Debug)]
enum Control {
    Reconnect,
}

#[derive(Clone)]
pub struct NotificationService {
    feed: Arc<dyn ChangeFeed>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("feed", &self.feed.name())
            .finish()
    }
}

impl NotificationService {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self { feed }
    }

    /// Subscribe `role` to notifications for one restaurant
    ///
    /// Orders already in the role's set at this point never raise `NewOrder`.
    pub async fn subscribe(
        &self,
        restaurant_id: &str,
        role: NotificationRole,
    ) -> Result<NotificationSubscription, FeedError> {
        let request =
            FeedRequest::new(restaurant_id, role.filter()).purpose(FeedPurpose::Notifications);
        let connection = self.feed.subscribe(request.clone()).await?;

        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let (control_tx, control_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();

        tracing::info!(
            restaurant_id = %request.restaurant_id,
            role = role.name(),
            feed = self.feed.name(),
            "Notification subscription opened"
        );

        let task = tokio::spawn(run_dispatcher(
            self.feed.clone(),
            request,
            NotificationDispatcher::new(role.clone()),
            connection,
            tx,
            control_rx,
            cancel.clone(),
        ));

        Ok(NotificationSubscription {
            role,
            rx,
            control: control_tx,
            cancel,
            task: Some(task),
        })
    }
}

/// Live notification stream for one role
///
/// Dropping the handle unsubscribes and discards the `handled` set.
#[derive(Debug)]
pub struct NotificationSubscription {
    role: NotificationRole,
    rx: mpsc::Receiver<Notification>,
    control: mpsc::Sender<Control>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl NotificationSubscription {
    pub fn role(&self) -> &NotificationRole {
        &self.role
    }

    pub async fn next(&mut self) -> Option<Notification> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            notification = self.rx.recv() => notification,
        }
    }

    /// Replace the feed connection, keeping everything already handled
    ///
    /// Returns `false` if the subscription is no longer running.
    pub async fn reconnect(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.control.send(Control::Reconnect).await.is_ok()
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn next_snapshot(connection: &mut Option<FeedSubscription>) -> Option<FeedSnapshot> {
    match connection {
        Some(connection) => connection.next().await,
        None => std::future::pending().await,
    }
}

async fn run_dispatcher(
    feed: Arc<dyn ChangeFeed>,
    request: FeedRequest,
    mut dispatcher: NotificationDispatcher,
    connection: FeedSubscription,
    tx: mpsc::Sender<Notification>,
    mut control: mpsc::Receiver<Control>,
    cancel: CancellationToken,
) {
    let role = dispatcher.role().name();
    let mut connection = Some(connection);

    'run: loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = control.recv() => match command {
                Some(Control::Reconnect) => {
                    if let Some(mut old) = connection.take() {
                        old.unsubscribe();
                    }
                    match feed.subscribe(request.clone()).await {
                        Ok(fresh) => {
                            dispatcher.begin_connection();
                            connection = Some(fresh);
                            tracing::info!(restaurant_id = %request.restaurant_id, role, "Notification feed reconnected");
                        }
                        Err(e) => {
                            tracing::warn!(restaurant_id = %request.restaurant_id, role, error = %e, "Notification feed reconnect failed");
                        }
                    }
                }
                None => break,
            },
            snapshot = next_snapshot(&mut connection) => match snapshot {
                Some(snapshot) => {
                    for notification in dispatcher.handle(&snapshot) {
                        let sent = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => false,
                            sent = tx.send(notification) => sent.is_ok(),
                        };
                        if !sent {
                            break 'run;
                        }
                    }
                }
                None => {
                    tracing::debug!(restaurant_id = %request.restaurant_id, role, "Notification feed ended");
                    connection = None;
                }
            },
        }
    }

    tracing::debug!(
        restaurant_id = %request.restaurant_id,
        role,
        handled = dispatcher.handled_count(),
        "Notification subscription closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::PushFeed;
    use crate::orders::{ManagerOptions, OrderStorage, OrdersManager};
    use shared::order::{OrderDraft, OrderItem, OrderStatus};
    use std::time::Duration;

    fn manager() -> Arc<OrdersManager> {
        let storage = OrderStorage::open_in_memory().unwrap();
        Arc::new(OrdersManager::with_storage(storage, ManagerOptions::default()))
    }

    fn draft(waiter_id: &str) -> OrderDraft {
        OrderDraft {
            table: "T2".to_string(),
            items: vec![OrderItem {
                menu_id: "m1".to_string(),
                name: "Paella".to_string(),
                price: 14.0,
                quantity: 1,
            }],
            waiter_id: waiter_id.to_string(),
            waiter_name: "Luis".to_string(),
            total_amount: 14.0,
        }
    }

    async fn next(sub: &mut NotificationSubscription) -> Notification {
        tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("notification in time")
            .expect("subscription open")
    }

    async fn quiet(sub: &mut NotificationSubscription) -> bool {
        tokio::time::timeout(Duration::from_millis(150), sub.next())
            .await
            .is_err()
    }

    #[tokio::test]
    async fn test_reconnect_keeps_handled_set() {
        let manager = manager();
        let service = NotificationService::new(Arc::new(PushFeed::new(manager.clone())));
        let mut kitchen = service
            .subscribe("R1", NotificationRole::Kitchen)
            .await
            .unwrap();

        let a = manager.create_order("R1", &draft("w1")).unwrap();
        assert_eq!(next(&mut kitchen).await.order_id(), a.id);

        assert!(kitchen.reconnect().await);
        let b = manager.create_order("R1", &draft("w1")).unwrap();
        assert_eq!(next(&mut kitchen).await.order_id(), b.id);
        assert!(quiet(&mut kitchen).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let manager = manager();
        let service = NotificationService::new(Arc::new(PushFeed::new(manager.clone())));
        let mut waiter = service
            .subscribe("R1", NotificationRole::waiter("w1"))
            .await
            .unwrap();

        waiter.unsubscribe();
        assert!(!waiter.is_active());
        assert!(!waiter.reconnect().await);

        let created = manager.create_order("R1", &draft("w1")).unwrap();
        manager
            .update_status("R1", &created.id, OrderStatus::Cooking)
            .unwrap();
        manager
            .update_status("R1", &created.id, OrderStatus::Ready)
            .unwrap();
        assert!(waiter.next().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_tenant_rejected() {
        let service = NotificationService::new(Arc::new(PushFeed::new(manager())));
        let err = service
            .subscribe("", NotificationRole::Kitchen)
            .await
            .unwrap_err();
        assert_eq!(err, FeedError::TenantMissing);
    }
}
