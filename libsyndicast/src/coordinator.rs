//! Multi-platform run coordination
//!
//! The coordinator runs one pipeline per platform, strictly one after the
//! other and in configured order, with pacing between runs and a hard
//! timeout around each. A failing platform never stops the ones after it.
//! A shutdown request is honoured between platforms only; the platforms not
//! yet started are reported as skipped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{Result, SyndicastError};
use crate::events::{Event, EventBus};
use crate::generator::openai::OpenAiGenerator;
use crate::pipeline::{PipelineProgress, PublicationPipeline};
use crate::platforms::create_platforms;
use crate::rate_limiter::{IntervalRateLimiter, RateLimiter};
use crate::source::create_source;
use crate::types::{FailureStage, PlatformKind, PublicationOutcome};

/// Overall result of a coordinated run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    FullSuccess,
    PartialSuccess,
    TotalFailure,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::FullSuccess => 0,
            RunStatus::PartialSuccess | RunStatus::TotalFailure => 1,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::FullSuccess => "full success",
            RunStatus::PartialSuccess => "partial success",
            RunStatus::TotalFailure => "total failure",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One outcome per platform that ran, in run order
    pub outcomes: Vec<PublicationOutcome>,
    /// Platforms not started because of a shutdown request
    pub skipped: Vec<PlatformKind>,
}

impl AggregateReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Failed pipelines plus skipped platforms
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count() + self.skipped.len()
    }

    /// Every platform counted by [`failure_count`](Self::failure_count), skipped ones last
    pub fn failed_platforms(&self) -> Vec<(PlatformKind, FailureStage)> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .filter_map(|o| o.failure_stage.map(|stage| (o.platform, stage)))
            .chain(self.skipped.iter().map(|p| (*p, FailureStage::Interrupted)))
            .collect()
    }

    /// Posts that may exist without a marker; a later run may post these again
    pub fn unrecorded(&self) -> Vec<&PublicationOutcome> {
        self.outcomes.iter().filter(|o| o.may_repost()).collect()
    }

    pub fn interrupted(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn status(&self) -> RunStatus {
        let succeeded = self.success_count();
        if self.failure_count() == 0 {
            RunStatus::FullSuccess
        } else if succeeded == 0 {
            RunStatus::TotalFailure
        } else {
            RunStatus::PartialSuccess
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status().exit_code()
    }
}

impl std::fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Run {} summary", self.run_id)?;
        for outcome in &self.outcomes {
            let name = outcome.platform.display_name();
            match (outcome.failure_stage, &outcome.external_post_id) {
                (None, None) => writeln!(f, "  {:<9} nothing to post", name)?,
                (None, Some(id)) => writeln!(f, "  {:<9} posted {}", name, id)?,
                (Some(stage), _) => writeln!(
                    f,
                    "  {:<9} {}: {}",
                    name,
                    stage,
                    outcome.error.as_deref().unwrap_or("unknown error")
                )?,
            }
            for dest in outcome.destinations.iter().filter(|d| !d.succeeded()) {
                writeln!(
                    f,
                    "  {:<9}   destination {} failed: {}",
                    "",
                    dest.destination,
                    dest.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        for platform in &self.skipped {
            writeln!(f, "  {:<9} skipped (interrupted)", platform.display_name())?;
        }
        for outcome in self.unrecorded() {
            let article = outcome.article_id.as_deref().unwrap_or("?");
            match &outcome.external_post_id {
                Some(post_id) => writeln!(
                    f,
                    "WARNING: {} post {} was published but not recorded; article {} may be posted again",
                    outcome.platform.display_name(),
                    post_id,
                    article
                )?,
                None => writeln!(
                    f,
                    "WARNING: {} timed out while publishing; article {} may already be posted and may be posted again",
                    outcome.platform.display_name(),
                    article
                )?,
            }
        }
        write!(
            f,
            "Succeeded: {}  Failed: {}  Status: {}",
            self.success_count(),
            self.failure_count(),
            self.status()
        )
    }
}

pub struct RunCoordinator {
    pipelines: Vec<PublicationPipeline>,
    pacer: Arc<dyn RateLimiter>,
    pipeline_timeout: Duration,
    events: EventBus,
    shutdown: Arc<AtomicBool>,
}

impl RunCoordinator {
    pub fn new(
        pipelines: Vec<PublicationPipeline>,
        pacer: Arc<dyn RateLimiter>,
        pipeline_timeout: Duration,
    ) -> Self {
        Self {
            pipelines,
            pacer,
            pipeline_timeout,
            events: EventBus::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire the production collaborators described by `config`
    ///
    /// Call [`Config::validate`] first; missing values surface here as
    /// configuration errors too.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.run.request_timeout)
            .build()
            .map_err(|e| SyndicastError::InvalidInput(format!("HTTP client setup failed: {}", e)))?;

        let source = create_source(&config.source, client.clone()).await?;
        let generator = Arc::new(OpenAiGenerator::from_config(client.clone(), &config.generator)?);
        let platforms = create_platforms(config, client)?;

        let pipelines = platforms
            .into_iter()
            .map(|platform| PublicationPipeline::new(source.clone(), generator.clone(), platform))
            .collect();

        Ok(Self::new(
            pipelines,
            Arc::new(IntervalRateLimiter::new(config.run.inter_platform_delay)),
            config.run.pipeline_timeout,
        ))
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Share a flag that, once set, stops the run before the next platform
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn platforms(&self) -> Vec<PlatformKind> {
        self.pipelines.iter().map(|p| p.platform()).collect()
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub async fn run_all(&self) -> AggregateReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let platforms = self.platforms();

        tracing::info!(run_id = %run_id, "Starting run for {} platform(s)", platforms.len());
        self.events.emit(Event::RunStarted {
            run_id: run_id.clone(),
            platforms: platforms.clone(),
        });

        let mut outcomes = Vec::with_capacity(self.pipelines.len());
        let mut skipped = Vec::new();

        for (index, pipeline) in self.pipelines.iter().enumerate() {
            if index > 0 && !self.shutdown_requested() {
                self.pacer.wait().await;
            }
            if self.shutdown_requested() {
                skipped = platforms[index..].to_vec();
                tracing::warn!("Shutdown requested, skipping {} platform(s)", skipped.len());
                self.events.emit(Event::RunInterrupted {
                    run_id: run_id.clone(),
                    skipped: skipped.clone(),
                });
                break;
            }

            let kind = pipeline.platform();
            tracing::info!("Running {} ({}/{})", kind.display_name(), index + 1, platforms.len());
            self.events.emit(Event::PlatformStarted {
                run_id: run_id.clone(),
                platform: kind,
                position: index + 1,
            });

            let started = Instant::now();
            let progress = PipelineProgress::new();
            let run = pipeline.run_with_progress(&progress);
            let outcome = match timeout(self.pipeline_timeout, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let e = SyndicastError::Timeout(self.pipeline_timeout);
                    let mut outcome = PublicationOutcome::failed(
                        kind,
                        progress.article_id(),
                        FailureStage::Timeout,
                        e.to_string(),
                    );
                    outcome.publish_in_flight = progress.publish_started();
                    if outcome.publish_in_flight {
                        tracing::warn!(
                            platform = %kind,
                            article_id = outcome.article_id.as_deref().unwrap_or("?"),
                            error = %e,
                            "Pipeline timed out during publish; the post may exist without a marker"
                        );
                    } else {
                        tracing::error!(platform = %kind, error = %e, "Pipeline timed out");
                    }
                    outcome
                }
            };
            self.pacer.done().await;

            if outcome.is_success() {
                tracing::info!(platform = %kind, "{} completed", kind.display_name());
            } else {
                tracing::error!(platform = %kind, "{} failed", kind.display_name());
            }

            self.events.emit(Event::PlatformFinished {
                run_id: run_id.clone(),
                outcome: outcome.clone(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            outcomes.push(outcome);
        }

        let report = AggregateReport {
            run_id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
            skipped,
        };

        tracing::info!(
            succeeded = report.success_count(),
            failed = report.failure_count(),
            status = %report.status(),
            "Run finished"
        );
        self.events.emit(Event::RunFinished {
            run_id,
            succeeded: report.success_count(),
            failed: report.failure_count(),
            status: report.status().to_string(),
        });

        report
    }
}
