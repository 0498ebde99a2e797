//! Publishing one piece of copy to several destinations of the same platform
//!
//! Destinations are tried in order with pacing between them. A failing
//! destination is recorded and the rest still run; the publish as a whole
//! succeeds when at least one destination does.

use std::future::Future;

use crate::error::{PlatformError, Result, SyndicastError};
use crate::rate_limiter::RateLimiter;
use crate::types::{DestinationResult, PublishReceipt};

pub async fn publish_to_destinations<F, Fut>(
    platform: &str,
    destinations: &[String],
    pacer: &dyn RateLimiter,
    mut publish_one: F,
) -> Result<PublishReceipt>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    if destinations.is_empty() {
        return Err(PlatformError::Validation(format!("{}: no destinations", platform)).into());
    }

    let mut results = Vec::with_capacity(destinations.len());

    for (index, destination) in destinations.iter().enumerate() {
        if index > 0 {
            pacer.wait().await;
        }

        match publish_one(destination.clone()).await {
            Ok(post_id) => {
                tracing::info!(platform, destination = %destination, post_id = %post_id, "Destination published");
                results.push(DestinationResult::success(destination.as_str(), post_id));
            }
            Err(e) => {
                tracing::warn!(platform, destination = %destination, error = %e, "Destination failed");
                let reason = match e {
                    SyndicastError::Platform(inner) => inner.to_string(),
                    other => other.to_string(),
                };
                results.push(DestinationResult::failure(destination.as_str(), reason));
            }
        }

        pacer.done().await;
    }

    let first_success = results.iter().find_map(|r| r.post_id.clone());

    match first_success {
        Some(post_id) => Ok(PublishReceipt {
            post_id,
            destinations: results,
        }),
        None => {
            let detail = results
                .iter()
                .map(|r| {
                    format!(
                        "{}: {}",
                        r.destination,
                        r.error.as_deref().unwrap_or("unknown error")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            Err(PlatformError::Posting(format!(
                "{}: all {} destinations failed ({})",
                platform,
                results.len(),
                detail
            ))
            .into())
        }
    }
}
