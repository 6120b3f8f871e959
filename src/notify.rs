//! Terminal payout failure notifications.
//!
//! When configured via `NOTIFY_WEBHOOK_URL`, Splitfact emits a fire-and-forget
//! event for every payout that reaches a terminal failure, consumed by the
//! external notification/retry subsystem for human follow-up. Failures here
//! never affect the distribution pass that raised them.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use reqwest::Client;
use serde::Serialize;

/// Retry delays in milliseconds for notification webhooks.
/// Quick retries (100ms, 200ms) so a slow sink cannot stall distribution.
const NOTIFY_RETRY_DELAYS: &[u64] = &[100, 200];

/// Payload for a terminal payout failure event.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutFailedEvent {
    pub invoice_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    /// Failure reason as recorded on the payout record.
    pub reason: String,
    pub attempt_count: i64,
    /// Unix timestamp
    pub timestamp: i64,
}

/// Sink for terminal payout failure events. Cheap to clone; an unconfigured
/// URL turns every emit into a no-op.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(client: Client, webhook_url: Option<String>) -> Self {
        Self {
            client,
            webhook_url,
        }
    }

    /// Construct a sink that drops every event (tests, unconfigured setups).
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            webhook_url: None,
        }
    }

    /// Spawn a fire-and-forget payout failure event. Panics in the spawned
    /// task are logged rather than silently swallowed.
    pub fn payout_failed(&self, event: PayoutFailedEvent) {
        let Some(url) = self.webhook_url.clone() else {
            return;
        };
        let client = self.client.clone();
        let payout_key = format!("{}/{}", event.invoice_id, event.user_id);
        tokio::spawn(
            AssertUnwindSafe(async move {
                send_event(&client, &url, &event).await;
            })
            .catch_unwind()
            .map(move |result| {
                if let Err(panic) = result {
                    let panic_msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        "Notification task panicked for payout {}: {}",
                        payout_key,
                        panic_msg
                    );
                }
            }),
        );
    }
}

/// Send one event to the configured webhook URL with quick retries.
async fn send_event<T: Serialize>(client: &Client, url: &str, event: &T) {
    for (attempt, delay_ms) in std::iter::once(&0u64)
        .chain(NOTIFY_RETRY_DELAYS.iter())
        .enumerate()
    {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }

        match client
            .post(url)
            .json(event)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                if attempt > 0 {
                    tracing::debug!("Notification webhook succeeded after {} retries", attempt);
                }
                return;
            }
            Ok(resp) => {
                tracing::debug!("Notification webhook returned {}", resp.status());
            }
            Err(e) => {
                tracing::debug!("Notification webhook failed: {}", e);
            }
        }
    }

    tracing::warn!(
        "Notification webhook failed after {} attempts",
        NOTIFY_RETRY_DELAYS.len() + 1
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays_are_quick() {
        // Total worst-case wait must stay well under the webhook budget
        let total_delay: u64 = NOTIFY_RETRY_DELAYS.iter().sum();
        assert!(total_delay < 500, "Retry delays should be quick");
    }

    #[test]
    fn test_payout_failed_event_serialization() {
        let event = PayoutFailedEvent {
            invoice_id: "inv_123".to_string(),
            user_id: "user_456".to_string(),
            amount_cents: 10000,
            currency: "eur".to_string(),
            reason: "no connected payout account".to_string(),
            attempt_count: 1,
            timestamp: 1234567890,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"invoice_id\":\"inv_123\""));
        assert!(json.contains("\"reason\":\"no connected payout account\""));
        assert!(json.contains("\"amount_cents\":10000"));
    }
}
