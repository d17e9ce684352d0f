//! Timer-driven fallback transport for deployments without a realtime
//! channel: emits a synthetic update event on a fixed period, which the
//! reconciler turns into a periodic refresh. The feed is merely staler than
//! with true change notifications, never broken.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{ChangeEvent, ChangeOp, ChangeStream};
use crate::error::FeedError;

pub struct IntervalChangeStream {
    period: Duration,
}

impl IntervalChangeStream {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

#[async_trait]
impl ChangeStream for IntervalChangeStream {
    async fn subscribe(&self, tables: &[&str]) -> Result<mpsc::Receiver<ChangeEvent>, FeedError> {
        // tokio::time::interval panics on a zero period; surface it as a
        // subscription failure instead of killing the emitter task.
        if self.period.is_zero() {
            return Err(FeedError::Subscription(
                "poll period must be non-zero".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(8);
        let table = tables.first().unwrap_or(&"posts").to_string();
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The immediate first tick would race the caller's initial
            // refresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let event = ChangeEvent {
                    table: table.clone(),
                    op: ChangeOp::Update,
                    payload: Value::Null,
                };
                if tx.send(event).await.is_err() {
                    // Receiver dropped: subscription torn down.
                    return;
                }
            }
        });

        Ok(rx)
    }
}
