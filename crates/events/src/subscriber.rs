// In crates/events/src/subscriber.rs

use crate::Result;
use crate::types::TradeEvent;
use app_config::types::EventSettings;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::time::Duration;

/// Subscribes to the trade event channel on Redis.
#[derive(Debug, Clone)]
pub struct EventSubscriber {
    redis_url: String,
    channel: String,
    reconnect_delay: Duration,
}

impl EventSubscriber {
    pub fn new(settings: &EventSettings) -> Self {
        Self {
            redis_url: settings.redis_url.clone(),
            channel: settings.channel.clone(),
            reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs),
        }
    }

    /// Returns an endless stream of decoded events.
    ///
    /// The connection is re-established whenever it drops. Payloads that do not
    /// decode are logged and skipped.
    pub fn subscribe(&self) -> impl Stream<Item = TradeEvent> + use<> {
        let redis_url = self.redis_url.clone();
        let channel = self.channel.clone();
        let delay = self.reconnect_delay;

        stream! {
            loop {
                tracing::info!(channel = %channel, "Connecting to event channel...");
                let mut pubsub = match connect(&redis_url, &channel).await {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!(error = %e, "Event channel connection failed. Retrying in {}s...", delay.as_secs());
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                };
                tracing::info!(channel = %channel, "Subscribed to event channel.");

                let mut messages = std::pin::pin!(pubsub.on_message());
                while let Some(msg) = messages.next().await {
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Event payload is not a string, skipping.");
                            continue;
                        }
                    };
                    match decode(&payload) {
                        Ok(event) => yield event,
                        Err(e) => tracing::warn!(error = %e, "Skipping malformed event."),
                    }
                }

                tracing::warn!("Event channel closed. Reconnecting...");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn connect(redis_url: &str, channel: &str) -> Result<redis::aio::PubSub> {
    let client = redis::Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    Ok(pubsub)
}

/// Decodes one channel payload.
pub fn decode(payload: &str) -> Result<TradeEvent> {
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn malformed_payload_is_an_error_not_a_panic() {
        assert!(matches!(decode("{not json"), Err(Error::MalformedPayload(_))));
        assert!(matches!(decode(r#"{"trades": []}"#), Err(Error::MalformedPayload(_))));
    }
}
