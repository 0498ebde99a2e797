//! Progress events for a coordinated run
//!
//! The coordinator emits events on a `tokio::sync::broadcast` channel. With no
//! subscribers the event is dropped; a lagging subscriber misses the oldest
//! events. Emitting never blocks and never fails.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{PlatformKind, PublicationOutcome};

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunStarted {
        run_id: String,
        platforms: Vec<PlatformKind>,
    },

    PlatformStarted {
        run_id: String,
        platform: PlatformKind,
        /// 1-based position in the run order
        position: usize,
    },

    PlatformFinished {
        run_id: String,
        outcome: PublicationOutcome,
        elapsed_ms: u64,
    },

    /// A shutdown request stopped the run between platforms
    RunInterrupted {
        run_id: String,
        skipped: Vec<PlatformKind>,
    },

    RunFinished {
        run_id: String,
        succeeded: usize,
        failed: usize,
        status: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureStage;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.emit(Event::PlatformStarted {
            run_id: "r1".to_string(),
            platform: PlatformKind::Reddit,
            position: 4,
        });

        match receiver.recv().await.unwrap() {
            Event::PlatformStarted {
                run_id,
                platform,
                position,
            } => {
                assert_eq!(run_id, "r1");
                assert_eq!(platform, PlatformKind::Reddit);
                assert_eq!(position, 4);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(Event::RunInterrupted {
            run_id: "r2".to_string(),
            skipped: vec![PlatformKind::Facebook],
        });

        assert!(matches!(
            first.recv().await.unwrap(),
            Event::RunInterrupted { .. }
        ));
        assert!(matches!(
            second.recv().await.unwrap(),
            Event::RunInterrupted { .. }
        ));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(Event::RunStarted {
            run_id: "r3".to_string(),
            platforms: PlatformKind::ALL.to_vec(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let outcome = PublicationOutcome::failed(
            PlatformKind::Twitter,
            Some("7".to_string()),
            FailureStage::Publish,
            "HTTP 503",
        );
        let json = serde_json::to_string(&Event::PlatformFinished {
            run_id: "r4".to_string(),
            outcome,
            elapsed_ms: 12,
        })
        .unwrap();

        assert!(json.contains(r#""type":"platform_finished""#));
        assert!(json.contains(r#""failure_stage":"PUBLISH""#));
        assert!(json.contains(r#""platform":"twitter""#));
    }
}
