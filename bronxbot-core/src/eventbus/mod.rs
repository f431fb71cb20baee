//! src/eventbus/mod.rs
//!
//! Provides an in-process event bus that supports guaranteed delivery
//! to multiple subscribers via bounded MPSC queues. The host command
//! framework's completion/error callbacks are the only producers; the
//! command log writer and alert consumers subscribe.

pub mod command_logger;

use std::sync::Arc;

use bronxbot_common::models::{CommandUsageRecord, PerformanceAlert};
use tokio::sync::{mpsc, watch, Mutex};

/// Global event type the tracking pipeline publishes and consumes.
#[derive(Debug, Clone)]
pub enum BotEvent {
    /// A command finished successfully.
    CommandCompleted(CommandUsageRecord),

    /// A command raised; the record carries the error text.
    CommandErrored(CommandUsageRecord),

    /// A performance threshold breach that passed its cooldown gate.
    PerformanceAlert(PerformanceAlert),

    /// Periodic heartbeat event.
    Tick,

    /// System-wide event for debugging or administration.
    SystemMessage(String),
}

impl BotEvent {
    /// Get the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            BotEvent::CommandCompleted(_) => "command_completed",
            BotEvent::CommandErrored(_) => "command_errored",
            BotEvent::PerformanceAlert(_) => "performance_alert",
            BotEvent::Tick => "tick",
            BotEvent::SystemMessage(_) => "system_message",
        }
    }

    /// The usage record carried by this event, if any.
    pub fn usage_record(&self) -> Option<&CommandUsageRecord> {
        match self {
            BotEvent::CommandCompleted(rec) | BotEvent::CommandErrored(rec) => Some(rec),
            _ => None,
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<BotEvent>` for guaranteed delivery.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, the channel is closed
///   and sending returns an error.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BotEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 10000;

impl EventBus {
    /// Create a new, empty event bus.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<BotEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: BotEvent) {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }

    /// Convenience method: publish the right event for a usage record.
    pub async fn publish_command(&self, record: CommandUsageRecord) {
        let event = if record.success {
            BotEvent::CommandCompleted(record)
        } else {
            BotEvent::CommandErrored(record)
        };
        self.publish(event).await;
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();

        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        bus.publish(BotEvent::Tick).await;

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");

        assert_eq!(evt1.event_type(), "tick");
        assert_eq!(evt2.event_type(), "tick");
    }

    #[tokio::test]
    async fn test_publish_command_picks_variant() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(5)).await;

        let ok = CommandUsageRecord::completed("ping", 1, Some(10), 20.0);
        let bad = CommandUsageRecord::errored("ping", 1, Some(10), 20.0, "boom");
        bus.publish_command(ok).await;
        bus.publish_command(bad).await;

        assert_eq!(rx.recv().await.unwrap().event_type(), "command_completed");
        let errored = rx.recv().await.unwrap();
        assert_eq!(errored.event_type(), "command_errored");
        assert_eq!(
            errored.usage_record().unwrap().error.as_deref(),
            Some("boom")
        );
    }

    #[tokio::test]
    async fn test_backpressure_blocking() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await; // queue size = 1

        // Publish first message to fill the queue.
        bus.publish(BotEvent::SystemMessage("msg1".into())).await;

        // Spawn a task that reads the two messages after a short delay.
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let first = rx.recv().await.expect("expected first message");
            let second = rx.recv().await.expect("expected second message");
            (first, second)
        });

        // Publish the second message (this call will wait until there's space).
        let second_publish = bus.publish(BotEvent::SystemMessage("msg2".into()));
        let result = timeout(Duration::from_millis(500), second_publish).await;
        assert!(result.is_ok(), "publish should eventually unblock");

        let (evt1, evt2) = handle.await.unwrap();
        match (evt1, evt2) {
            (BotEvent::SystemMessage(a), BotEvent::SystemMessage(b)) => {
                assert_eq!(a, "msg1");
                assert_eq!(b, "msg2");
            }
            _ => panic!("message mismatch"),
        }
    }
}
