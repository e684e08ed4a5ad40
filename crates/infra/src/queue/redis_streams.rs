//! Redis Streams-backed queue (durable, at-least-once delivery).
//!
//! One stream per queue, one consumer group per stream:
//! - **Enqueue**: `XADD <stream> * body <body>`
//! - **Receive**: entries pending longer than the visibility timeout are
//!   reclaimed first (`XPENDING` + `XCLAIM`), then new entries are read with
//!   `XREADGROUP ... BLOCK <wait>`
//! - **Delete**: `XACK` + `XDEL` using the entry id as receipt handle
//! - **Dead-lettering**: a reclaimable entry already delivered
//!   `max_receive_count` times is copied to the dead-letter stream and removed
//!
//! The dead-letter stream is itself a `RedisStreamsQueue`, so the redrive sweep
//! reads it through the same contract.
//!
//! Receipt handles are stream entry ids, which stay the same across deliveries.
//! A stale handle therefore still deletes the entry while it is pending.

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamPendingId, StreamRangeReply,
    StreamReadOptions, StreamReadReply,
};
use redis::{AsyncCommands, RedisError};
use tracing::{debug, instrument, warn};

use todorelay_queue::{
    MAX_RECEIVE_BATCH, MessageQueue, QueueError, QueueSettings, ReceiveRequest, ReceivedMessage,
};

/// Pending entries inspected per receive when looking for expired deliveries.
const PENDING_SCAN: usize = 100;

/// Field carrying the message body in every stream entry.
const BODY_FIELD: &str = "body";

#[derive(Clone)]
pub struct RedisStreamsQueue {
    client: redis::Client,
    conn: ConnectionManager,
    stream_key: String,
    group: String,
    consumer: String,
    settings: QueueSettings,
    dead_letter_key: Option<String>,
}

impl std::fmt::Debug for RedisStreamsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsQueue")
            .field("stream_key", &self.stream_key)
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .field("settings", &self.settings)
            .field("dead_letter_key", &self.dead_letter_key)
            .finish()
    }
}

impl RedisStreamsQueue {
    /// Connect to Redis and make sure the stream and its consumer group exist.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `stream_key` - stream backing this queue (e.g., the `QUEUE_URL` value)
    /// * `settings` - visibility timeout and max receive count
    pub async fn connect(
        redis_url: &str,
        stream_key: impl Into<String>,
        settings: QueueSettings,
    ) -> Result<Self, QueueError> {
        let stream_key = stream_key.into();
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error(&stream_key, "open", e))?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| map_redis_error(&stream_key, "connect", e))?;

        let queue = Self {
            client,
            conn,
            group: format!("{stream_key}:consumers"),
            consumer: format!("consumer-{}", uuid::Uuid::now_v7()),
            stream_key,
            settings,
            dead_letter_key: None,
        };
        queue.ensure_consumer_group().await?;
        Ok(queue)
    }

    /// Move entries that exhaust `max_receive_count` to `dead_letter_key`.
    pub fn with_dead_letter(mut self, dead_letter_key: impl Into<String>) -> Self {
        self.dead_letter_key = Some(dead_letter_key.into());
        self
    }

    /// Create the consumer group (and stream) if missing. Idempotent.
    pub async fn ensure_consumer_group(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let created: Result<(), RedisError> = conn
            .xgroup_create_mkstream(&self.stream_key, &self.group, "0")
            .await;
        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(map_redis_error(&self.stream_key, "XGROUP CREATE", e)),
        }
    }

    /// Reclaim deliveries whose visibility timeout expired.
    async fn reclaim_expired(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut conn = self.conn.clone();
        let pending: StreamPendingCountReply = conn
            .xpending_count(&self.stream_key, &self.group, "-", "+", PENDING_SCAN)
            .await
            .map_err(|e| map_redis_error(&self.stream_key, "XPENDING", e))?;

        let min_idle_ms = self.settings.visibility_timeout.as_millis() as usize;
        let mut reclaimed = Vec::new();

        for entry in pending.ids.iter().filter(|p| p.last_delivered_ms >= min_idle_ms) {
            if reclaimed.len() >= max {
                break;
            }

            if let Some(dlq) = &self.dead_letter_key {
                if entry.times_delivered >= self.settings.max_receive_count as usize {
                    self.move_to_dead_letter(&mut conn, dlq, entry).await?;
                    continue;
                }
            }

            // XCLAIM re-checks idle time, so a concurrent claimer wins at most once.
            let claimed: StreamClaimReply = conn
                .xclaim(
                    &self.stream_key,
                    &self.group,
                    &self.consumer,
                    min_idle_ms,
                    &[&entry.id],
                )
                .await
                .map_err(|e| map_redis_error(&self.stream_key, "XCLAIM", e))?;

            for claimed_entry in &claimed.ids {
                match to_received(claimed_entry, entry.times_delivered as u32 + 1) {
                    Ok(msg) => reclaimed.push(msg),
                    Err(e) => warn!(queue = %self.stream_key, error = %e, "skipping unreadable entry"),
                }
            }
        }

        Ok(reclaimed)
    }

    #[instrument(skip(self, conn, entry), fields(queue = %self.stream_key, entry_id = %entry.id), err)]
    async fn move_to_dead_letter(
        &self,
        conn: &mut ConnectionManager,
        dead_letter_key: &str,
        entry: &StreamPendingId,
    ) -> Result<(), QueueError> {
        let range: StreamRangeReply = conn
            .xrange(&self.stream_key, &entry.id, &entry.id)
            .await
            .map_err(|e| map_redis_error(&self.stream_key, "XRANGE", e))?;

        if let Some(original) = range.ids.first() {
            let dead_lettered_at = Utc::now().to_rfc3339();
            let fields = dead_letter_fields(original, entry.times_delivered, &dead_lettered_at)?;
            let _: String = conn
                .xadd(dead_letter_key, "*", &fields)
                .await
                .map_err(|e| map_redis_error(dead_letter_key, "XADD", e))?;
        }

        // Only drop the original once the dead-letter copy is written.
        self.ack_and_delete(conn, &entry.id).await?;

        warn!(
            message_id = %entry.id,
            receive_count = entry.times_delivered,
            dead_letter = %dead_letter_key,
            "message exceeded max receive count; moved to dead-letter queue"
        );
        Ok(())
    }

    async fn read_new(
        &self,
        max: usize,
        wait: std::time::Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        // Blocking reads get their own connection so they never stall the shared one.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error(&self.stream_key, "connect", e))?;

        let mut opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(max);
        if !wait.is_zero() {
            opts = opts.block(wait.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[">"], &opts)
            .await
            .map_err(|e| map_redis_error(&self.stream_key, "XREADGROUP", e))?;

        let mut messages = Vec::new();
        for key in reply.map(|r| r.keys).unwrap_or_default() {
            for entry in &key.ids {
                match to_received(entry, 1) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => warn!(queue = %self.stream_key, error = %e, "skipping unreadable entry"),
                }
            }
        }
        Ok(messages)
    }

    async fn ack_and_delete(
        &self,
        conn: &mut ConnectionManager,
        entry_id: &str,
    ) -> Result<bool, QueueError> {
        let acked: i64 = conn
            .xack(&self.stream_key, &self.group, &[entry_id])
            .await
            .map_err(|e| map_receipt_error(&self.stream_key, "XACK", entry_id, e))?;
        let _: i64 = conn
            .xdel(&self.stream_key, &[entry_id])
            .await
            .map_err(|e| map_receipt_error(&self.stream_key, "XDEL", entry_id, e))?;
        Ok(acked > 0)
    }
}

#[async_trait::async_trait]
impl MessageQueue for RedisStreamsQueue {
    fn name(&self) -> &str {
        &self.stream_key
    }

    #[instrument(skip(self, body), fields(queue = %self.stream_key), err)]
    async fn enqueue(&self, body: String) -> Result<String, QueueError> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(&self.stream_key, "*", &[(BODY_FIELD, body.as_str())])
            .await
            .map_err(|e| map_redis_error(&self.stream_key, "XADD", e))?;
        debug!(queue = %self.stream_key, message_id = %id, "message enqueued");
        Ok(id)
    }

    async fn receive_batch(
        &self,
        request: ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let max = request.max_messages.clamp(1, MAX_RECEIVE_BATCH);

        let reclaimed = self.reclaim_expired(max).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        self.read_new(max, request.wait).await
    }

    #[instrument(skip(self), fields(queue = %self.stream_key), err)]
    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        if self.ack_and_delete(&mut conn, receipt_handle).await? {
            Ok(())
        } else {
            Err(QueueError::InvalidReceiptHandle(receipt_handle.to_string()))
        }
    }
}

fn to_received(entry: &StreamId, receive_count: u32) -> Result<ReceivedMessage, QueueError> {
    let body: String = entry.get(BODY_FIELD).ok_or_else(|| {
        QueueError::Serialization(format!("entry {} has no {BODY_FIELD} field", entry.id))
    })?;
    Ok(ReceivedMessage {
        message_id: entry.id.clone(),
        receipt_handle: entry.id.clone(),
        body,
        receive_count,
    })
}

/// Every field of `original` as stored, plus where it came from and when it
/// was dead-lettered. An entry whose fields cannot be read stays where it is.
fn dead_letter_fields(
    original: &StreamId,
    times_delivered: usize,
    dead_lettered_at: &str,
) -> Result<Vec<(String, Vec<u8>)>, QueueError> {
    let mut fields = Vec::with_capacity(original.map.len() + 3);
    for (name, value) in &original.map {
        let bytes: Vec<u8> = redis::from_redis_value(value).map_err(|e| {
            QueueError::Serialization(format!("entry {} field {name}: {e}", original.id))
        })?;
        fields.push((name.clone(), bytes));
    }
    fields.push(("original_message_id".to_string(), original.id.clone().into_bytes()));
    fields.push(("receive_count".to_string(), times_delivered.to_string().into_bytes()));
    fields.push(("dead_lettered_at".to_string(), dead_lettered_at.as_bytes().to_vec()));
    Ok(fields)
}

fn map_redis_error(queue: &str, op: &str, err: RedisError) -> QueueError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        QueueError::Unavailable(format!("{queue}: {op} failed: {err}"))
    } else {
        QueueError::Backend(format!("{queue}: {op} failed: {err}"))
    }
}

fn map_receipt_error(queue: &str, op: &str, receipt_handle: &str, err: RedisError) -> QueueError {
    if err.to_string().contains("Invalid stream ID") {
        QueueError::InvalidReceiptHandle(receipt_handle.to_string())
    } else {
        map_redis_error(queue, op, err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: id.to_string(),
            map: fields
                .iter()
                .map(|(k, v)| (k.to_string(), redis::Value::Data(v.as_bytes().to_vec())))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn entry_id_is_message_id_and_receipt_handle() {
        let msg = to_received(&entry("1700000000000-0", &[("body", r#"{"task":"x"}"#)]), 2)
            .unwrap();
        assert_eq!(msg.message_id, "1700000000000-0");
        assert_eq!(msg.receipt_handle, "1700000000000-0");
        assert_eq!(msg.body, r#"{"task":"x"}"#);
        assert_eq!(msg.receive_count, 2);
    }

    #[test]
    fn entry_without_body_is_rejected() {
        let err = to_received(&entry("1-0", &[("other", "x")]), 1).unwrap_err();
        assert!(matches!(err, QueueError::Serialization(_)));
    }

    #[test]
    fn dead_letter_copy_keeps_every_field() {
        let original = entry("5-0", &[("body", r#"{"task":"x"}"#), ("trace", "abc")]);
        let fields: HashMap<_, _> =
            dead_letter_fields(&original, 3, "2026-01-01T00:00:00Z").unwrap().into_iter().collect();

        assert_eq!(fields["body"], br#"{"task":"x"}"#.to_vec());
        assert_eq!(fields["trace"], b"abc".to_vec());
        assert_eq!(fields["original_message_id"], b"5-0".to_vec());
        assert_eq!(fields["receive_count"], b"3".to_vec());
    }

    #[test]
    fn dead_letter_copy_never_invents_a_body() {
        let original = entry("6-0", &[("other", "x")]);
        let fields = dead_letter_fields(&original, 3, "2026-01-01T00:00:00Z").unwrap();
        assert!(fields.iter().all(|(name, _)| name != "body"));
        assert!(fields.iter().any(|(name, value)| name == "other" && value == b"x"));
    }

    #[test]
    fn invalid_stream_id_maps_to_receipt_error() {
        let err = RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "Invalid stream ID specified as stream command argument".to_string(),
        ));
        let mapped = map_receipt_error("todo-queue-dlq", "XACK", "garbage", err);
        assert!(matches!(mapped, QueueError::InvalidReceiptHandle(h) if h == "garbage"));
    }
}
