use crate::utils::RetryConfig;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Change feed backend, chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedBackend {
    /// Server-initiated snapshots on every committed write
    #[default]
    Push,
    /// Periodic re-read plus write signals
    Poll,
}

impl FromStr for FeedBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(FeedBackend::Push),
            "poll" => Ok(FeedBackend::Poll),
            other => Err(format!("unknown feed backend: {other}")),
        }
    }
}

/// 服务配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (orders.redb, logs) |
/// | FEED_BACKEND | push | `push` 或 `poll` |
/// | ORDER_POLL_INTERVAL_MS | 1000 | 订单列表轮询间隔 |
/// | NOTIFY_POLL_INTERVAL_MS | 500 | 通知订阅轮询间隔 |
/// | BUSINESS_TIMEZONE | UTC | 业务时区 (决定订单号的日期) |
/// | COUNTER_MAX_RETRIES | 5 | 订单号事务最大重试次数 |
/// | ALLOWED_RESTAURANTS | (空 = 全部) | 允许访问的餐厅 ID, 逗号分隔 |
/// | CHANNEL_CAPACITY | 1024 | 进程内总线容量 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 滚动日志目录 |
///
/// # 示例
///
/// ```ignore
/// FEED_BACKEND=poll BUSINESS_TIMEZONE=Europe/Madrid cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub feed_backend: FeedBackend,
    pub order_poll_interval_ms: u64,
    pub notify_poll_interval_ms: u64,
    pub timezone: Tz,
    pub counter_max_retries: u32,
    /// Empty means every restaurant is allowed
    pub allowed_restaurants: Vec<String>,
    pub channel_capacity: usize,
    pub log_level: String,
    pub log_dir: Option<String>,
}

/// An environment value that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedValue {
    pub key: &'static str,
    pub value: String,
    pub error: String,
}

impl RejectedValue {
    pub fn log(&self) {
        tracing::warn!(key = self.key, value = %self.value, error = %self.error, "Invalid config value, using default");
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// Unparseable values fall back to their defaults and are logged at warn.
    pub fn from_env() -> Self {
        let (config, rejected) = Self::load_env();
        rejected.iter().for_each(RejectedValue::log);
        config
    }

    /// Like [`from_env`](Self::from_env), returning the rejected values
    /// instead of logging them (for use before the logger exists)
    pub fn load_env() -> (Self, Vec<RejectedValue>) {
        Self::load_with(|key| std::env::var(key).ok())
    }

    fn load_with(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<RejectedValue>) {
        let defaults = Self::default_values();
        let mut env = EnvReader {
            lookup,
            rejected: Vec::new(),
        };
        let config = Self {
            work_dir: env
                .raw("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            feed_backend: env.parse("FEED_BACKEND").unwrap_or(defaults.feed_backend),
            order_poll_interval_ms: env
                .parse("ORDER_POLL_INTERVAL_MS")
                .unwrap_or(defaults.order_poll_interval_ms),
            notify_poll_interval_ms: env
                .parse("NOTIFY_POLL_INTERVAL_MS")
                .unwrap_or(defaults.notify_poll_interval_ms),
            timezone: env.parse("BUSINESS_TIMEZONE").unwrap_or(defaults.timezone),
            counter_max_retries: env
                .parse("COUNTER_MAX_RETRIES")
                .unwrap_or(defaults.counter_max_retries),
            allowed_restaurants: env
                .raw("ALLOWED_RESTAURANTS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            channel_capacity: env.parse("CHANNEL_CAPACITY").unwrap_or(defaults.channel_capacity),
            log_level: env.raw("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: env.raw("LOG_DIR"),
        };
        (config, env.rejected)
    }

    /// Defaults only, ignoring the environment (tests)
    pub fn default_values() -> Self {
        Self {
            work_dir: PathBuf::from("./data"),
            feed_backend: FeedBackend::Push,
            order_poll_interval_ms: 1000,
            notify_poll_interval_ms: 500,
            timezone: chrono_tz::UTC,
            counter_max_retries: 5,
            allowed_restaurants: Vec::new(),
            channel_capacity: 1024,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.work_dir.join("orders.redb")
    }

    pub fn order_poll_interval(&self) -> Duration {
        Duration::from_millis(self.order_poll_interval_ms.max(1))
    }

    pub fn notify_poll_interval(&self) -> Duration {
        Duration::from_millis(self.notify_poll_interval_ms.max(1))
    }

    pub fn counter_retry(&self) -> RetryConfig {
        RetryConfig::default().with_max_attempts(self.counter_max_retries)
    }

    /// `None` when every restaurant is allowed
    pub fn allowed_restaurant_set(&self) -> Option<HashSet<String>> {
        if self.allowed_restaurants.is_empty() {
            None
        } else {
            Some(self.allowed_restaurants.iter().cloned().collect())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

struct EnvReader<F> {
    lookup: F,
    rejected: Vec<RejectedValue>,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T>(&mut self, key: &'static str) -> Option<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = (self.lookup)(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(e) => {
                self.rejected.push(RejectedValue {
                    key,
                    error: e.to_string(),
                    value: raw,
                });
                None
            }
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
