//! Order Hub - 餐厅订单生命周期与实时通知
//!
//! # 架构概述
//!
//! - **订单存储** (`orders`): redb 持久化, 每日订单号, 状态机
//! - **消息总线** (`message`): 进程内广播已提交的写入
//! - **变更订阅** (`feed`): push / poll 两种可互换的实现
//! - **通知** (`notifications`): 厨房/服务员的去重通知
//!
//! # 模块结构
//!
//! ```text
//! order-hub/src/
//! ├── core/           # 配置、状态、错误
//! ├── orders/         # Order Store, 订单号, 金额校验
//! ├── message/        # OrderBus
//! ├── feed/           # ChangeFeed, PushFeed, PollFeed
//! ├── notifications/  # NotificationDispatcher, NotificationService
//! └── utils/          # 日志, 重试
//! ```

pub mod core;
pub mod feed;
pub mod message;
pub mod notifications;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, FeedBackend, HubError, HubState, RejectedValue};
pub use feed::{ChangeFeed, FeedError, FeedRequest, FeedSnapshot, FeedSubscription, PollFeed, PushFeed};
pub use message::OrderBus;
pub use notifications::{NotificationDispatcher, NotificationService, NotificationSubscription};
pub use orders::{ManagerError, OrderStorage, OrdersManager};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env`, read the configuration and start logging
///
/// Invalid configuration values are logged once the logger is up.
pub fn setup_environment() -> Config {
    // Missing .env is fine
    let _ = dotenv::dotenv();
    let (config, rejected) = Config::load_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    rejected.iter().for_each(RejectedValue::log);
    config
}

pub fn print_banner() {
    println!(
        r#"
   ____           __              __  __      __
  / __ \_________/ /__  _____    / / / /_  __/ /_
 / / / / ___/ __  / _ \/ ___/   / /_/ / / / / __ \
/ /_/ / /  / /_/ /  __/ /      / __  / /_/ / /_/ /
\____/_/   \__,_/\___/_/      /_/ /_/\__,_/_.___/
    "#
    );
}
