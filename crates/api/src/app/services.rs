//! Process-wide collaborator handles.
//!
//! Built once at startup from [`RelayConfig`] and shared by every request and
//! background task. Nothing in here carries business state.

use std::fmt;
use std::sync::Arc;

use todorelay_infra::{Backend, InMemoryTodoStore, RelayConfig, StoreError, TodoStore};
use todorelay_queue::{InMemoryQueue, MessageQueue, QueueError};

use crate::functions::RedriveSettings;

#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AppServices {
    pub primary: Arc<dyn MessageQueue>,
    pub dead_letter: Arc<dyn MessageQueue>,
    pub store: Arc<dyn TodoStore>,
    /// Bounds for on-demand sweeps (`POST /admin/redrive`).
    pub redrive: RedriveSettings,
}

impl fmt::Debug for AppServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppServices")
            .field("primary", &self.primary.name())
            .field("dead_letter", &self.dead_letter.name())
            .field("redrive", &self.redrive)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    pub async fn build(config: &RelayConfig) -> Result<Self, ServicesError> {
        match &config.backend {
            Backend::InMemory => Ok(Self::in_memory(config)),
            #[cfg(feature = "redis")]
            Backend::Persistent {
                database_url,
                redis_url,
            } => Self::persistent(config, database_url, redis_url).await,
            #[cfg(not(feature = "redis"))]
            Backend::Persistent { .. } => {
                tracing::warn!(
                    "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
                );
                Ok(Self::in_memory(config))
            }
        }
    }

    /// In-process queues and store (dev/test). The primary queue dead-letters
    /// into the DLQ after `config.queue.max_receive_count` receives.
    pub fn in_memory(config: &RelayConfig) -> Self {
        let dead_letter = Arc::new(
            InMemoryQueue::new(config.dead_letter_queue_name.clone()).with_settings(config.queue),
        );
        let primary = InMemoryQueue::new(config.queue_name.clone())
            .with_settings(config.queue)
            .with_dead_letter(dead_letter.clone());

        Self {
            primary: Arc::new(primary),
            dead_letter,
            store: Arc::new(InMemoryTodoStore::new()),
            redrive: RedriveSettings::default(),
        }
    }

    #[cfg(feature = "redis")]
    async fn persistent(
        config: &RelayConfig,
        database_url: &str,
        redis_url: &str,
    ) -> Result<Self, ServicesError> {
        use todorelay_infra::PostgresTodoStore;
        use todorelay_infra::queue::RedisStreamsQueue;

        let store = PostgresTodoStore::connect(database_url, &config.table_name).await?;
        store.ensure_schema().await?;

        let primary = RedisStreamsQueue::connect(redis_url, config.queue_name.clone(), config.queue)
            .await?
            .with_dead_letter(config.dead_letter_queue_name.clone());
        let dead_letter =
            RedisStreamsQueue::connect(redis_url, config.dead_letter_queue_name.clone(), config.queue)
                .await?;

        tracing::info!(
            queue = %config.queue_name,
            dead_letter = %config.dead_letter_queue_name,
            table = %config.table_name,
            "persistent services ready"
        );

        Ok(Self {
            primary: Arc::new(primary),
            dead_letter: Arc::new(dead_letter),
            store: Arc::new(store),
            redrive: RedriveSettings::default(),
        })
    }
}
