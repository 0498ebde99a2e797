//! Mock platform for testing
//!
//! A configurable stand-in for any [`PlatformKind`]. It can succeed, fail
//! with a given error, stall, or emulate a fanout platform where individual
//! destinations fail. Clones share their call records so a test can keep a
//! handle while the coordinator owns the adapter.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::{Platform, PublishRequest};
use crate::types::{DestinationResult, PlatformKind, PublishReceipt};

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    FailAuth(PlatformError),
    FailPublish(PlatformError),
    /// Per-destination outcomes: `None` succeeds, `Some(msg)` fails
    Fanout(Vec<(String, Option<String>)>),
}

#[derive(Debug, Clone)]
pub struct MockPlatform {
    kind: PlatformKind,
    behavior: Behavior,
    delay: Duration,
    auth_calls: Arc<Mutex<usize>>,
    invalidations: Arc<Mutex<usize>>,
    published: Arc<Mutex<Vec<PublishRequest>>>,
}

impl MockPlatform {
    fn new(kind: PlatformKind, behavior: Behavior) -> Self {
        Self {
            kind,
            behavior,
            delay: Duration::ZERO,
            auth_calls: Arc::new(Mutex::new(0)),
            invalidations: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn success(kind: PlatformKind) -> Self {
        Self::new(kind, Behavior::Succeed)
    }

    /// Every publish fails with `error`
    pub fn post_failure(kind: PlatformKind, error: PlatformError) -> Self {
        Self::new(kind, Behavior::FailPublish(error))
    }

    /// `authenticate` (and therefore publish) fails with `error`
    pub fn auth_failure(kind: PlatformKind, error: &str) -> Self {
        Self::new(
            kind,
            Behavior::FailAuth(PlatformError::Authentication(error.to_string())),
        )
    }

    /// Fanout emulation; `outcomes` pairs each destination with an optional failure
    pub fn fanout(kind: PlatformKind, outcomes: &[(&str, Option<&str>)]) -> Self {
        let outcomes = outcomes
            .iter()
            .map(|(dest, err)| (dest.to_string(), err.map(str::to_string)))
            .collect();
        Self::new(kind, Behavior::Fanout(outcomes))
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn auth_call_count(&self) -> usize {
        *self.auth_calls.lock().unwrap()
    }

    pub fn invalidation_count(&self) -> usize {
        *self.invalidations.lock().unwrap()
    }

    pub fn publish_call_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn published(&self) -> Vec<PublishRequest> {
        self.published.lock().unwrap().clone()
    }

    fn post_id(&self) -> String {
        format!("{}:mock-{}", self.kind, uuid::Uuid::new_v4())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    async fn authenticate(&self) -> Result<()> {
        *self.auth_calls.lock().unwrap() += 1;
        match &self.behavior {
            Behavior::FailAuth(e) => Err(e.clone().into()),
            _ => Ok(()),
        }
    }

    async fn invalidate_session(&self) {
        *self.invalidations.lock().unwrap() += 1;
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        self.published.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Succeed => Ok(PublishReceipt::single(self.post_id())),
            Behavior::FailAuth(e) | Behavior::FailPublish(e) => Err(e.clone().into()),
            Behavior::Fanout(outcomes) => {
                let destinations: Vec<DestinationResult> = outcomes
                    .iter()
                    .map(|(dest, err)| match err {
                        None => DestinationResult::success(dest.as_str(), self.post_id()),
                        Some(msg) => DestinationResult::failure(dest.as_str(), msg.as_str()),
                    })
                    .collect();

                match destinations.iter().find_map(|d| d.post_id.clone()) {
                    Some(post_id) => Ok(PublishReceipt {
                        post_id,
                        destinations,
                    }),
                    None => Err(PlatformError::Posting(format!(
                        "{}: all {} destinations failed",
                        self.kind,
                        destinations.len()
                    ))
                    .into()),
                }
            }
        }
    }
}
