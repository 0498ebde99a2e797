//! Per-platform publication pipeline
//!
//! One run is select → generate → publish → record for a single platform.
//! Each stage either hands its result to the next or ends the run with a
//! [`PublicationOutcome`] naming the stage that failed. Nothing is retried:
//! a publish that may have reached the platform is never sent twice.
//!
//! The pipeline never returns an error. Every failure, including a failing
//! datastore read, is folded into the outcome for the coordinator to report.
//! A caller that may abandon a run (on timeout) passes a [`PipelineProgress`]
//! to find out how far it got.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::content::{build_request, finalize};
use crate::error::{GenerationError, PlatformError};
use crate::generator::ContentGenerator;
use crate::platforms::{Platform, PublishRequest};
use crate::source::ArticleSource;
use crate::types::{FailureStage, PlatformKind, PublicationOutcome};

#[derive(Debug, Default)]
struct ProgressState {
    article_id: Option<String>,
    publish_started: bool,
}

/// How far a pipeline run got, readable after the run is cancelled
#[derive(Debug, Clone, Default)]
pub struct PipelineProgress {
    state: Arc<Mutex<ProgressState>>,
}

impl PipelineProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn selected(&self, article_id: &str) {
        self.state().article_id = Some(article_id.to_string());
    }

    fn publishing(&self) {
        self.state().publish_started = true;
    }

    /// Article chosen by the select stage, if it completed
    pub fn article_id(&self) -> Option<String> {
        self.state().article_id.clone()
    }

    /// Whether the platform publish call was started
    pub fn publish_started(&self) -> bool {
        self.state().publish_started
    }
}

#[derive(Clone)]
pub struct PublicationPipeline {
    source: Arc<dyn ArticleSource>,
    generator: Arc<dyn ContentGenerator>,
    platform: Arc<dyn Platform>,
}

impl PublicationPipeline {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        generator: Arc<dyn ContentGenerator>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self {
            source,
            generator,
            platform,
        }
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform.kind()
    }

    pub async fn run(&self) -> PublicationOutcome {
        self.run_with_progress(&PipelineProgress::new()).await
    }

    #[tracing::instrument(name = "pipeline", skip_all, fields(platform = %self.platform.kind()))]
    pub async fn run_with_progress(&self, progress: &PipelineProgress) -> PublicationOutcome {
        let kind = self.platform.kind();

        // Select
        let article = match self.source.latest_unposted(kind).await {
            Ok(Some(article)) => article,
            Ok(None) => {
                tracing::info!("No unposted article for {}", kind.display_name());
                return PublicationOutcome::nothing_to_post(kind);
            }
            Err(e) => {
                tracing::error!(error = %e, "Article selection failed");
                return PublicationOutcome::failed(kind, None, FailureStage::Select, e.to_string());
            }
        };
        let article_id = Some(article.id.clone());
        progress.selected(&article.id);
        tracing::info!(article_id = %article.id, "Selected article: {}", article.title);

        // Generate
        let style = self.platform.style();
        let request = match build_request(&article, &style) {
            Some(request) => request,
            None => {
                let e = GenerationError::NoSourceText;
                tracing::error!(error = %e, "Generation skipped");
                return PublicationOutcome::failed(kind, article_id, FailureStage::Generation, e.to_string());
            }
        };

        let raw = match self.generator.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, generator = self.generator.name(), "Generation failed");
                return PublicationOutcome::failed(kind, article_id, FailureStage::Generation, e.to_string());
            }
        };

        let content = match finalize(&raw, article.best_link(), &style) {
            Some(content) => content,
            None => {
                let e = GenerationError::EmptyResponse;
                tracing::error!(error = %e, "Generation failed");
                return PublicationOutcome::failed(kind, article_id, FailureStage::Generation, e.to_string());
            }
        };
        tracing::info!(
            chars = content.char_count(),
            limit = style.max_length,
            link_appended = content.link_appended,
            truncated = content.truncated,
            "Generated content"
        );

        // Publish
        if let Err(e) = self.platform.authenticate().await {
            tracing::error!(error = %e, "Authentication failed");
            return PublicationOutcome::failed(kind, article_id, FailureStage::Publish, e.to_string());
        }

        let publish_request = PublishRequest::for_article(content.text, &article);
        progress.publishing();
        let receipt = match self.platform.publish(&publish_request).await {
            Ok(receipt) if !receipt.post_id.trim().is_empty() => receipt,
            Ok(_) => {
                let e = PlatformError::Posting("platform returned an empty post id".to_string());
                tracing::error!(error = %e, "Publish failed");
                return PublicationOutcome::failed(kind, article_id, FailureStage::Publish, e.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, "Publish failed");
                return PublicationOutcome::failed(kind, article_id, FailureStage::Publish, e.to_string());
            }
        };
        tracing::info!(post_id = %receipt.post_id, "Published to {}", kind.display_name());

        let mut outcome = PublicationOutcome {
            platform: kind,
            article_id,
            external_post_id: Some(receipt.post_id),
            recorded: false,
            failure_stage: None,
            error: None,
            destinations: receipt.destinations,
            publish_in_flight: false,
        };

        // Record
        match self.source.mark_posted(&article.id, kind, Utc::now()).await {
            Ok(()) => {
                outcome.recorded = true;
                tracing::info!(article_id = %article.id, column = kind.marker_column(), "Recorded posted marker");
            }
            Err(e) => {
                tracing::warn!(
                    article_id = %article.id,
                    error = %e,
                    "Published but could not record the posted marker; the article may be posted again"
                );
                outcome.failure_stage = Some(FailureStage::Record);
                outcome.error = Some(e.to_string());
            }
        }

        outcome
    }
}
