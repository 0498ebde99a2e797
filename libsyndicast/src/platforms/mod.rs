//! Platform abstraction and implementations
//!
//! Every adapter exposes the same capability: publish text (plus an optional
//! link) and hand back the external post id. Adapters differ in how they carry
//! the link, whether they need a session exchange first, and whether one
//! publish fans out to several destinations. All of that stays inside the
//! adapter; the pipeline only sees [`Platform`].
//!
//! ```no_run
//! use libsyndicast::platforms::{Platform, PublishRequest};
//! use libsyndicast::platforms::mock::MockPlatform;
//! use libsyndicast::PlatformKind;
//!
//! # async fn example() -> libsyndicast::Result<()> {
//! let platform = MockPlatform::success(PlatformKind::Twitter);
//! platform.authenticate().await?;
//! let receipt = platform.publish(&PublishRequest::text_only("Hello")).await?;
//! println!("Posted: {}", receipt.post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::content::StyleProfile;
use crate::error::Result;
use crate::rate_limiter::IntervalRateLimiter;
use crate::types::{Article, PlatformKind, PublishReceipt};

pub mod facebook;
pub mod fanout;
pub mod http;
pub mod linkedin;
pub mod reddit;
pub mod twitter;

// Available in all builds so integration tests can drive the pipeline offline
pub mod mock;

#[cfg(test)]
mod stub_server;

/// Everything an adapter needs to publish one piece of generated copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub text: String,
    /// Article link for adapters that carry it outside the text
    pub link: Option<String>,
    /// Classification hints used for destination targeting
    pub category: Option<String>,
    pub source: Option<String>,
}

impl PublishRequest {
    pub fn text_only(text: &str) -> Self {
        Self {
            text: text.to_string(),
            link: None,
            category: None,
            source: None,
        }
    }

    pub fn for_article(text: String, article: &Article) -> Self {
        Self {
            text,
            link: article.best_link().map(str::to_string),
            category: article.category.clone(),
            source: article.source.clone(),
        }
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    fn kind(&self) -> PlatformKind;

    /// Lowercase identifier for log lines
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// How copy for this platform is written and bounded
    fn style(&self) -> StyleProfile {
        StyleProfile::for_platform(self.kind())
    }

    /// Establish whatever session the platform needs before publishing
    ///
    /// Bearer-token platforms have nothing to do here. Session-based
    /// platforms cache the result; calling again reuses it.
    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }

    /// Drop any cached session so the next call re-authenticates
    async fn invalidate_session(&self) {}

    /// Publish and return the external post id
    ///
    /// # Errors
    ///
    /// Returns `PlatformError` for any non-success response, transport
    /// failure, or response without a post id.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt>;
}

/// Build adapters for the configured platforms, in run order
pub fn create_platforms(config: &Config, client: reqwest::Client) -> Result<Vec<Arc<dyn Platform>>> {
    let mut platforms: Vec<Arc<dyn Platform>> = Vec::with_capacity(config.run.platforms.len());

    for kind in &config.run.platforms {
        let platform: Arc<dyn Platform> = match kind {
            PlatformKind::Twitter => Arc::new(twitter::TwitterPlatform::from_config(
                client.clone(),
                &config.twitter,
            )?),
            PlatformKind::LinkedIn => Arc::new(linkedin::LinkedInPlatform::from_config(
                client.clone(),
                &config.linkedin,
            )?),
            PlatformKind::Facebook => Arc::new(facebook::FacebookPlatform::from_config(
                client.clone(),
                &config.facebook,
            )?),
            PlatformKind::Reddit => {
                let pacer = Arc::new(IntervalRateLimiter::new(config.reddit.destination_delay));
                Arc::new(reddit::RedditPlatform::from_config(
                    client.clone(),
                    &config.reddit,
                    pacer,
                )?)
            }
        };
        platforms.push(platform);
    }

    Ok(platforms)
}
