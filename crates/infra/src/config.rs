//! Process configuration.
//!
//! Everything a managed queue platform would otherwise apply implicitly
//! (visibility timeout, max receive count, the redrive schedule) is an explicit
//! setting here. Values come from the process environment; see
//! [`RelayConfig::from_env`].

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use todorelay_queue::{MAX_RECEIVE_BATCH, QueueSettings};

const DEFAULT_QUEUE_NAME: &str = "todo-queue";
const DEFAULT_DLQ_NAME: &str = "todo-queue-dlq";
const DEFAULT_TABLE_NAME: &str = "todo-table-dev";
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where queues and records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// In-process queues and store (dev/test).
    InMemory,
    /// Redis Streams queues + Postgres store.
    Persistent {
        database_url: String,
        redis_url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Primary queue name (`QUEUE_URL`).
    pub queue_name: String,
    /// Dead-letter queue name (`DLQ_URL`).
    pub dead_letter_queue_name: String,
    /// Store table (`TABLE_NAME`).
    pub table_name: String,
    pub backend: Backend,
    pub queue: QueueSettings,
    pub worker_batch_size: usize,
    pub worker_wait: Duration,
    /// `None` disables the scheduled redrive sweep.
    pub redrive_interval: Option<Duration>,
    pub bind_addr: SocketAddr,
}

impl RelayConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `QUEUE_URL` | `todo-queue` |
    /// | `DLQ_URL` | `todo-queue-dlq` |
    /// | `TABLE_NAME` | `todo-table-dev` |
    /// | `USE_PERSISTENT_STORES` | `false` |
    /// | `DATABASE_URL` | required when persistent |
    /// | `REDIS_URL` | `redis://localhost:6379` |
    /// | `QUEUE_VISIBILITY_TIMEOUT_SECS` | `30` |
    /// | `QUEUE_MAX_RECEIVE_COUNT` | `3` |
    /// | `WORKER_BATCH_SIZE` | `10` |
    /// | `WORKER_WAIT_SECS` | `5` |
    /// | `REDRIVE_INTERVAL_SECS` | `60` (`0` disables) |
    /// | `BIND_ADDR` | `0.0.0.0:8080` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let table_name = get("TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        if table_name.contains('"') {
            return Err(ConfigError::Invalid {
                key: "TABLE_NAME",
                value: table_name,
                reason: "must not contain double quotes".to_string(),
            });
        }

        let persistent = parse_or(&get, "USE_PERSISTENT_STORES", false)?;
        let backend = if persistent {
            Backend::Persistent {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                redis_url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            }
        } else {
            Backend::InMemory
        };

        let visibility_secs: u64 = parse_or(&get, "QUEUE_VISIBILITY_TIMEOUT_SECS", 30)?;
        let max_receive_count: u32 = parse_or(&get, "QUEUE_MAX_RECEIVE_COUNT", 3)?;
        if max_receive_count == 0 {
            return Err(ConfigError::Invalid {
                key: "QUEUE_MAX_RECEIVE_COUNT",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let worker_batch_size: usize = parse_or(&get, "WORKER_BATCH_SIZE", MAX_RECEIVE_BATCH)?;
        if !(1..=MAX_RECEIVE_BATCH).contains(&worker_batch_size) {
            return Err(ConfigError::Invalid {
                key: "WORKER_BATCH_SIZE",
                value: worker_batch_size.to_string(),
                reason: format!("must be between 1 and {MAX_RECEIVE_BATCH}"),
            });
        }

        let worker_wait_secs: u64 = parse_or(&get, "WORKER_WAIT_SECS", 5)?;
        let redrive_secs: u64 = parse_or(&get, "REDRIVE_INTERVAL_SECS", 60)?;
        let bind_addr: SocketAddr =
            parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

        Ok(Self {
            queue_name: get("QUEUE_URL").unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
            dead_letter_queue_name: get("DLQ_URL").unwrap_or_else(|| DEFAULT_DLQ_NAME.to_string()),
            table_name,
            backend,
            queue: QueueSettings::default()
                .with_visibility_timeout(Duration::from_secs(visibility_secs))
                .with_max_receive_count(max_receive_count),
            worker_batch_size,
            worker_wait: Duration::from_secs(worker_wait_secs),
            redrive_interval: (redrive_secs > 0).then(|| Duration::from_secs(redrive_secs)),
            bind_addr,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
