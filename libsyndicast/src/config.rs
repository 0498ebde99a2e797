//! Configuration management for Syndicast
//!
//! Settings come from an optional TOML file, overlaid by environment
//! variables (the names used by the existing deployment). Every credential a
//! run needs is checked by [`Config::validate`] before any pipeline starts; a
//! gap is a fatal [`ConfigError`].

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::platforms::reddit::MAX_SUBREDDITS;
use crate::types::PlatformKind;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub generator: GeneratorConfig,
    pub run: RunConfig,
    pub twitter: TwitterConfig,
    pub linkedin: LinkedInConfig,
    pub facebook: FacebookConfig,
    pub reddit: RedditConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Hosted PostgREST endpoint
    #[default]
    Supabase,
    /// Local SQLite file
    Sqlite,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub url: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub anon_key: Option<SecretString>,
    pub table: String,
    pub path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Supabase,
            url: None,
            anon_key: None,
            table: "articles".to_string(),
            path: "~/.local/share/syndicast/articles.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Platforms in run order
    pub platforms: Vec<PlatformKind>,
    /// Minimum gap between two platform runs
    #[serde(deserialize_with = "deserialize_duration")]
    pub inter_platform_delay: Duration,
    /// Wall-clock ceiling for a single platform pipeline
    #[serde(deserialize_with = "deserialize_duration")]
    pub pipeline_timeout: Duration,
    /// Timeout applied to every outbound HTTP request
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            platforms: PlatformKind::ALL.to_vec(),
            inter_platform_delay: Duration::from_secs(30),
            pipeline_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub bearer_token: Option<SecretString>,
    pub api_base: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            api_base: "https://api.twitter.com/2".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LinkedInConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,
    /// Author URN (`urn:li:person:...`); looked up via `/me` when absent
    pub author_urn: Option<String>,
    pub api_base: String,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            author_urn: None,
            api_base: "https://api.linkedin.com/v2".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FacebookConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,
    pub page_id: Option<String>,
    pub api_base: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            page_id: None,
            api_base: "https://graph.facebook.com/v18.0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_secret: Option<SecretString>,
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    pub user_agent: String,
    pub auth_url: String,
    pub api_base: String,
    /// Minimum gap between submissions to two subreddits
    #[serde(deserialize_with = "deserialize_duration")]
    pub destination_delay: Duration,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            user_agent: "AffiliateContentBot/1.0".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
            destination_delay: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from the default location, then the environment
    ///
    /// A missing default file is not an error; everything can come from the
    /// environment.
    pub fn load() -> Result<Self> {
        let path = resolve_config_path()?;
        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file, then the environment
    pub fn load_with_path(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_path(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a configuration file without looking at the environment
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Overlay values found through `lookup` (normally `std::env::var`)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secret = |names: &[&str]| get(names).map(SecretString::from);

        if let Some(url) = get(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.source.url = Some(url);
        }
        if let Some(key) = secret(&["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]) {
            self.source.anon_key = Some(key);
        }
        if let Some(path) = get(&["SYNDICAST_ARTICLES_DB"]) {
            self.source.kind = SourceKind::Sqlite;
            self.source.path = path;
        }

        if let Some(key) = secret(&["OPENAI_API_KEY"]) {
            self.generator.api_key = Some(key);
        }
        if let Some(url) = get(&["OPENAI_BASE_URL"]) {
            self.generator.base_url = url;
        }
        if let Some(model) = get(&["OPENAI_MODEL"]) {
            self.generator.model = model;
        }

        if let Some(list) = get(&["SYNDICAST_PLATFORMS"]) {
            self.run.platforms = PlatformKind::parse_list(&list)?;
        }

        if let Some(token) = secret(&["TWITTER_BEARER_TOKEN"]) {
            self.twitter.bearer_token = Some(token);
        }

        if let Some(token) = secret(&["LINKEDIN_ACCESS_TOKEN"]) {
            self.linkedin.access_token = Some(token);
        }
        if let Some(urn) = get(&["LINKEDIN_AUTHOR_URN"]) {
            self.linkedin.author_urn = Some(urn);
        }

        if let Some(token) = secret(&["FACEBOOK_ACCESS_TOKEN"]) {
            self.facebook.access_token = Some(token);
        }
        if let Some(page) = get(&["FACEBOOK_PAGE_ID"]) {
            self.facebook.page_id = Some(page);
        }

        if let Some(id) = get(&["REDDIT_CLIENT_ID"]) {
            self.reddit.client_id = Some(id);
        }
        if let Some(s) = secret(&["REDDIT_CLIENT_SECRET"]) {
            self.reddit.client_secret = Some(s);
        }
        if let Some(user) = get(&["REDDIT_USERNAME"]) {
            self.reddit.username = Some(user);
        }
        if let Some(p) = secret(&["REDDIT_PASSWORD"]) {
            self.reddit.password = Some(p);
        }
        if let Some(agent) = get(&["REDDIT_USER_AGENT"]) {
            self.reddit.user_agent = agent;
        }

        Ok(())
    }

    /// Check that every value the configured run needs is present
    ///
    /// All gaps are reported together.
    pub fn validate(&self) -> Result<()> {
        if self.run.platforms.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "run.platforms".to_string(),
                reason: "at least one platform is required".to_string(),
            }
            .into());
        }
        if self.run.pipeline_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "run.pipeline_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        if self.run.platforms.contains(&PlatformKind::Reddit) {
            let pacing = self
                .reddit
                .destination_delay
                .saturating_mul(MAX_SUBREDDITS.saturating_sub(1) as u32);
            if pacing >= self.run.pipeline_timeout {
                return Err(ConfigError::InvalidValue {
                    field: "reddit.destination_delay".to_string(),
                    reason: format!(
                        "{} subreddits paced {} apart cannot finish within run.pipeline_timeout ({})",
                        MAX_SUBREDDITS,
                        humantime::format_duration(self.reddit.destination_delay),
                        humantime::format_duration(self.run.pipeline_timeout)
                    ),
                }
                .into());
            }
        }

        let mut missing: Vec<&str> = Vec::new();

        match self.source.kind {
            SourceKind::Supabase => {
                if self.source.url.is_none() {
                    missing.push("source.url (NEXT_PUBLIC_SUPABASE_URL)");
                }
                if self.source.anon_key.is_none() {
                    missing.push("source.anon_key (NEXT_PUBLIC_SUPABASE_ANON_KEY)");
                }
            }
            SourceKind::Sqlite => {
                if self.source.path.trim().is_empty() {
                    missing.push("source.path (SYNDICAST_ARTICLES_DB)");
                }
            }
        }

        if self.generator.api_key.is_none() {
            missing.push("generator.api_key (OPENAI_API_KEY)");
        }

        for platform in &self.run.platforms {
            match platform {
                PlatformKind::Twitter => {
                    if self.twitter.bearer_token.is_none() {
                        missing.push("twitter.bearer_token (TWITTER_BEARER_TOKEN)");
                    }
                }
                PlatformKind::LinkedIn => {
                    if self.linkedin.access_token.is_none() {
                        missing.push("linkedin.access_token (LINKEDIN_ACCESS_TOKEN)");
                    }
                }
                PlatformKind::Facebook => {
                    if self.facebook.access_token.is_none() {
                        missing.push("facebook.access_token (FACEBOOK_ACCESS_TOKEN)");
                    }
                    if self.facebook.page_id.is_none() {
                        missing.push("facebook.page_id (FACEBOOK_PAGE_ID)");
                    }
                }
                PlatformKind::Reddit => {
                    if self.reddit.client_id.is_none() {
                        missing.push("reddit.client_id (REDDIT_CLIENT_ID)");
                    }
                    if self.reddit.client_secret.is_none() {
                        missing.push("reddit.client_secret (REDDIT_CLIENT_SECRET)");
                    }
                    if self.reddit.username.is_none() {
                        missing.push("reddit.username (REDDIT_USERNAME)");
                    }
                    if self.reddit.password.is_none() {
                        missing.push("reddit.password (REDDIT_PASSWORD)");
                    }
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingField(missing.join(", ")).into())
        }
    }
}

/// Load a `.env` file from the working directory (or a parent), if present
///
/// Variables already set in the process environment win. Runs before
/// logging is set up, so the outcome is returned for the caller to log.
pub fn load_dotenv() -> std::result::Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndicast").join("config.toml"))
}

/// Copy of a configured credential for handing to an adapter
pub(crate) fn required_secret(value: &Option<SecretString>, field: &str) -> Result<SecretString> {
    value
        .as_ref()
        .map(|s| SecretString::from(s.expose_secret().to_string()))
        .ok_or_else(|| ConfigError::MissingField(field.to_string()).into())
}

/// Copy of a configured plain value
pub(crate) fn required_value(value: &Option<String>, field: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| ConfigError::MissingField(field.to_string()).into())
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from))
}

/// Durations are written as humantime strings ("30s", "5m") or plain seconds
fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => humantime::parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
