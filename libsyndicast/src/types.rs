//! Core types for Syndicast

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// The social platforms an article can be distributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Microblogging
    Twitter,
    /// Professional network
    LinkedIn,
    /// Page feed
    Facebook,
    /// Link-sharing discussion forums
    Reddit,
}

impl PlatformKind {
    /// Default run order
    pub const ALL: [PlatformKind; 4] = [
        PlatformKind::Twitter,
        PlatformKind::LinkedIn,
        PlatformKind::Facebook,
        PlatformKind::Reddit,
    ];

    /// Lowercase identifier used in configuration and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Twitter => "twitter",
            PlatformKind::LinkedIn => "linkedin",
            PlatformKind::Facebook => "facebook",
            PlatformKind::Reddit => "reddit",
        }
    }

    /// Human-readable name for log lines and summaries
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformKind::Twitter => "Twitter",
            PlatformKind::LinkedIn => "LinkedIn",
            PlatformKind::Facebook => "Facebook",
            PlatformKind::Reddit => "Reddit",
        }
    }

    /// Datastore column holding this platform's posted marker
    ///
    /// Twitter keeps the historical `tweeted_at` name used by the article table.
    pub fn marker_column(&self) -> &'static str {
        match self {
            PlatformKind::Twitter => "tweeted_at",
            PlatformKind::LinkedIn => "posted_to_linkedin_at",
            PlatformKind::Facebook => "posted_to_facebook_at",
            PlatformKind::Reddit => "posted_to_reddit_at",
        }
    }

    /// Parse a comma-separated platform list, preserving order and dropping duplicates
    pub fn parse_list(input: &str) -> Result<Vec<PlatformKind>, ConfigError> {
        let mut platforms = Vec::new();
        for name in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind: PlatformKind = name.parse()?;
            if !platforms.contains(&kind) {
                platforms.push(kind);
            }
        }
        Ok(platforms)
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(PlatformKind::Twitter),
            "linkedin" => Ok(PlatformKind::LinkedIn),
            "facebook" => Ok(PlatformKind::Facebook),
            "reddit" => Ok(PlatformKind::Reddit),
            other => Err(ConfigError::InvalidValue {
                field: "platform".to_string(),
                reason: format!(
                    "unknown platform '{}'. Valid options: twitter, linkedin, facebook, reddit",
                    other
                ),
            }),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable snapshot of an article read for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, alias = "body")]
    pub content: Option<String>,
    /// Canonical article URL
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub affiliate_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,
}

impl Article {
    /// Create an article with only the required fields set
    pub fn new(id: impl Into<String>, title: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            summary: None,
            content: None,
            url: None,
            affiliate_url: None,
            category: None,
            source: None,
            published_at,
        }
    }

    /// Affiliate link, falling back to the canonical URL
    pub fn best_link(&self) -> Option<&str> {
        non_empty(&self.affiliate_url).or_else(|| non_empty(&self.url))
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Record ids come back as strings (uuid) or integers depending on the table
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Accepts RFC 3339 timestamps as well as offset-less ones (treated as UTC)
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(format!("invalid timestamp '{}'", raw))
}

/// Platform-ready text produced from an article; never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub text: String,
    /// Whether the affiliate link was appended to `text`
    pub link_appended: bool,
    /// Whether `text` was cut down to the platform limit
    pub truncated: bool,
}

impl GeneratedContent {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Pipeline stage at which a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureStage {
    /// Reading the candidate article failed
    Select,
    Generation,
    Publish,
    /// Published, but the posted marker could not be written
    Record,
    Timeout,
    /// Not started because a shutdown request stopped the run
    Interrupted,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureStage::Select => "SELECT_FAILED",
            FailureStage::Generation => "GENERATION_FAILED",
            FailureStage::Publish => "PUBLISH_FAILED",
            FailureStage::Record => "RECORD_FAILED",
            FailureStage::Timeout => "TIMEOUT",
            FailureStage::Interrupted => "INTERRUPTED",
        };
        write!(f, "{}", s)
    }
}

/// Result of publishing to one destination of a fanout platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationResult {
    pub destination: String,
    pub post_id: Option<String>,
    pub error: Option<String>,
}

impl DestinationResult {
    pub fn success(destination: impl Into<String>, post_id: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            post_id: Some(post_id.into()),
            error: None,
        }
    }

    pub fn failure(destination: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            post_id: None,
            error: Some(error.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.post_id.is_some()
    }
}

/// What a platform adapter hands back after a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    /// External post id (the first successful destination for fanout platforms)
    pub post_id: String,
    /// Per-destination results; empty for single-destination platforms
    pub destinations: Vec<DestinationResult>,
}

impl PublishReceipt {
    pub fn single(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            destinations: Vec::new(),
        }
    }
}

/// Result of one pipeline run, used for reporting only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationOutcome {
    pub platform: PlatformKind,
    pub article_id: Option<String>,
    pub external_post_id: Option<String>,
    pub recorded: bool,
    pub failure_stage: Option<FailureStage>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<DestinationResult>,
    /// The run was cut off after the publish call started, so the post may exist
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub publish_in_flight: bool,
}

impl PublicationOutcome {
    /// No eligible article; a normal outcome, not an error
    pub fn nothing_to_post(platform: PlatformKind) -> Self {
        Self {
            platform,
            article_id: None,
            external_post_id: None,
            recorded: false,
            failure_stage: None,
            error: None,
            destinations: Vec::new(),
            publish_in_flight: false,
        }
    }

    pub fn failed(
        platform: PlatformKind,
        article_id: Option<String>,
        stage: FailureStage,
        error: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            article_id,
            external_post_id: None,
            recorded: false,
            failure_stage: Some(stage),
            error: Some(error.into()),
            destinations: Vec::new(),
            publish_in_flight: false,
        }
    }

    /// True when the pipeline found no eligible article
    pub fn is_nothing_to_post(&self) -> bool {
        self.article_id.is_none() && self.failure_stage.is_none()
    }

    /// True when the platform side completed: posted (recorded or not) or nothing to post
    pub fn is_success(&self) -> bool {
        matches!(self.failure_stage, None | Some(FailureStage::Record))
    }

    /// Published but not recorded; future runs may post the article again
    pub fn is_unrecorded(&self) -> bool {
        self.failure_stage == Some(FailureStage::Record)
    }

    /// A post may exist without its marker: unrecorded, or timed out mid-publish
    pub fn may_repost(&self) -> bool {
        self.is_unrecorded()
            || (self.failure_stage == Some(FailureStage::Timeout) && self.publish_in_flight)
    }
}
