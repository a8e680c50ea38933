//! Unlock notifications: fire-and-forget, never on the unlock path's
//! critical section.
//!
//! Events are queued in memory and flushed to the configured webhook every
//! 30 seconds or when 20 events accumulate, whichever comes first. Flush
//! failures are logged and dropped; the persisted unlock row is the source
//! of truth, so a lost notification is a cosmetic gap, never a failed unlock.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::EngineConfig;

const FLUSH_INTERVAL_SECS: u64 = 30;
const FLUSH_BATCH_SIZE: usize = 20;

// ─── Event type ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockNotification {
    /// Always `"badge_unlocked"`.
    pub kind: String,
    pub user_id: String,
    pub badge_id: String,
    pub title: String,
    pub points: i64,
    /// RFC 3339.
    pub unlocked_at: String,
}

impl UnlockNotification {
    pub fn badge_unlocked(
        user_id: impl Into<String>,
        badge_id: impl Into<String>,
        title: impl Into<String>,
        points: i64,
        unlocked_at: impl Into<String>,
    ) -> Self {
        Self {
            kind: "badge_unlocked".to_string(),
            user_id: user_id.into(),
            badge_id: badge_id.into(),
            title: title.into(),
            points,
            unlocked_at: unlocked_at.into(),
        }
    }
}

// ─── Notifier seam ────────────────────────────────────────────────────────────

/// Dispatch seam for unlock notifications. Implementations must swallow
/// their own failures: nothing behind this trait may fail an unlock.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: UnlockNotification);
}

/// Discards every notification. Used when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, event: UnlockNotification) {
        debug!(badge_id = %event.badge_id, "notification dispatch disabled; dropping");
    }
}

// ─── Webhook dispatcher ───────────────────────────────────────────────────────

/// Queue handle for the webhook flush task.
#[derive(Clone)]
pub struct WebhookNotifier {
    tx: mpsc::Sender<UnlockNotification>,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    /// Queue an event for the next flush. Never blocks; drops with a
    /// warning if the queue is full.
    async fn notify(&self, event: UnlockNotification) {
        if self.tx.try_send(event).is_err() {
            warn!("notification queue full; dropping badge_unlocked event");
        }
    }
}

/// Spawn the background flush task and return its queue handle.
/// Call only with a configured `notify_url`.
pub fn spawn(url: String, config: &EngineConfig) -> WebhookNotifier {
    let (tx, mut rx) = mpsc::channel::<UnlockNotification>(config.notify_queue.max(1));

    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build();
        let client = match client {
            Ok(c) => c,
            Err(e) => {
                warn!("notify: failed to build HTTP client, dispatch disabled: {e:#}");
                return;
            }
        };
        let mut buffer: Vec<UnlockNotification> = Vec::new();
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(FLUSH_INTERVAL_SECS));
        interval.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        buffer.push(event);
                        if buffer.len() >= FLUSH_BATCH_SIZE {
                            flush(&client, &url, &mut buffer).await;
                        }
                    }
                    // All senders gone; drain and stop.
                    None => break,
                },
                _ = interval.tick() => {
                    if !buffer.is_empty() {
                        flush(&client, &url, &mut buffer).await;
                    }
                }
            }
        }

        // Final flush on shutdown.
        if !buffer.is_empty() {
            flush(&client, &url, &mut buffer).await;
        }
    });

    WebhookNotifier { tx }
}

async fn flush(client: &reqwest::Client, url: &str, buffer: &mut Vec<UnlockNotification>) {
    let events = std::mem::take(buffer);
    let count = events.len();
    let payload = serde_json::json!({ "events": events });
    match client.post(url).json(&payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            debug!("notify: flushed {count} events");
        }
        Ok(resp) => {
            warn!("notify: webhook returned {}", resp.status());
        }
        Err(e) => {
            warn!("notify: flush failed: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_serializes_camel_case() {
        let event = UnlockNotification::badge_unlocked(
            "u1",
            "first_task",
            "First Task",
            10,
            "2026-03-14T09:00:00+00:00",
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"badge_unlocked\""));
        assert!(json.contains("\"userId\":\"u1\""));
        assert!(json.contains("\"badgeId\":\"first_task\""));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        // Build the handle directly with a tiny queue and no consumer.
        let (tx, rx) = mpsc::channel(1);
        let notifier = WebhookNotifier { tx };
        let mk = || {
            UnlockNotification::badge_unlocked("u1", "b", "B", 1, "2026-01-01T00:00:00+00:00")
        };
        notifier.notify(mk()).await;
        // Queue is full now; this must return immediately, not block.
        notifier.notify(mk()).await;
        drop(rx);
        notifier.notify(mk()).await;
    }
}
