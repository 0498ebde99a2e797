//! Syndicast - distribute the latest article to social platforms
//!
//! For each configured platform a [`PublicationPipeline`] selects the newest
//! article not yet posted there, generates platform-specific copy, publishes
//! it and records the posted marker. The [`RunCoordinator`] runs those
//! pipelines one after another and aggregates the outcomes.

pub mod config;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod generator;
pub mod logging;
pub mod pipeline;
pub mod platforms;
pub mod rate_limiter;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{AggregateReport, RunCoordinator, RunStatus};
pub use error::{Result, SyndicastError};
pub use pipeline::{PipelineProgress, PublicationPipeline};
pub use types::{Article, FailureStage, GeneratedContent, PlatformKind, PublicationOutcome};
