//! Reddit forum adapter with subreddit fanout
//!
//! Reddit needs a session token obtained through an OAuth password grant.
//! The token is cached for the life of the adapter and dropped when a call
//! comes back with an authentication failure, so the next submission
//! re-authenticates. One publish submits the same title to up to three
//! subreddits chosen from the article's category and source.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{required_secret, required_value, RedditConfig};
use crate::error::{PlatformError, Result, SyndicastError};
use crate::platforms::fanout::publish_to_destinations;
use crate::platforms::http::{id_field, read_json, transport_error};
use crate::platforms::{Platform, PublishRequest};
use crate::rate_limiter::RateLimiter;
use crate::types::{PlatformKind, PublishReceipt};

pub const MAX_SUBREDDITS: usize = 3;

/// Always appended after any topical match
pub const GENERAL_SUBREDDITS: [&str; 2] = ["news", "worldnews"];

/// Keyword (matched against category or source) to subreddits; first match wins
const TOPIC_SUBREDDITS: &[(&[&str], &[&str])] = &[
    (
        &["tech", "technology"],
        &["technology", "tech", "programming", "webdev"],
    ),
    (&["business"], &["business", "entrepreneur", "startups"]),
    (&["finance"], &["personalfinance", "investing", "wallstreetbets"]),
    (&["deals"], &["deals", "frugal", "shopping"]),
];

/// Pick the subreddits for an article
pub fn select_subreddits(category: Option<&str>, source: Option<&str>) -> Vec<String> {
    let category = category.unwrap_or_default().to_lowercase();
    let source = source.unwrap_or_default().to_lowercase();

    let topical = TOPIC_SUBREDDITS
        .iter()
        .find(|(keywords, _)| {
            keywords
                .iter()
                .any(|k| category.contains(k) || source.contains(k))
        })
        .map(|(_, subs)| *subs)
        .unwrap_or_default();

    topical
        .iter()
        .chain(GENERAL_SUBREDDITS.iter())
        .take(MAX_SUBREDDITS)
        .map(|s| s.to_string())
        .collect()
}

pub struct RedditPlatform {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    username: String,
    password: SecretString,
    user_agent: String,
    auth_url: String,
    api_base: String,
    session: Mutex<Option<SecretString>>,
    pacer: Arc<dyn RateLimiter>,
}

impl RedditPlatform {
    pub fn from_config(
        client: Client,
        config: &RedditConfig,
        pacer: Arc<dyn RateLimiter>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            client_id: required_value(&config.client_id, "reddit.client_id")?,
            client_secret: required_secret(&config.client_secret, "reddit.client_secret")?,
            username: required_value(&config.username, "reddit.username")?,
            password: required_secret(&config.password, "reddit.password")?,
            user_agent: config.user_agent.clone(),
            auth_url: config.auth_url.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            session: Mutex::new(None),
            pacer,
        })
    }

    /// Cached session token, exchanging credentials when there is none
    async fn session_token(&self) -> Result<SecretString> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.as_ref() {
            return Ok(SecretString::from(token.expose_secret().to_string()));
        }

        let token = self.exchange_credentials().await?;
        *session = Some(SecretString::from(token.clone()));
        tracing::info!("Authenticated with Reddit as {}", self.username);
        Ok(SecretString::from(token))
    }

    async fn exchange_credentials(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.auth_url)
            .header("User-Agent", &self.user_agent)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let response = read_json(self.name(), response).await?;
        parse_access_token(&response.body)
    }

    async fn submit(&self, subreddit: &str, title: &str, link: Option<&str>) -> Result<String> {
        let token = self.session_token().await?;

        let mut form = vec![
            ("sr", subreddit),
            ("title", title),
            ("api_type", "json"),
            ("resubmit", "true"),
        ];
        match link {
            Some(url) => {
                form.push(("kind", "link"));
                form.push(("url", url));
            }
            None => {
                form.push(("kind", "self"));
                form.push(("text", ""));
            }
        }

        let result = async {
            let response = self
                .client
                .post(format!("{}/api/submit", self.api_base))
                .header("User-Agent", &self.user_agent)
                .bearer_auth(token.expose_secret())
                .form(&form)
                .send()
                .await
                .map_err(|e| transport_error(self.name(), e))?;
            let response = read_json(self.name(), response).await?;
            parse_submission(&response.body)
        }
        .await;

        if let Err(SyndicastError::Platform(e)) = &result {
            if e.is_authentication() {
                tracing::warn!("Reddit session rejected, will re-authenticate");
                self.invalidate_session().await;
            }
        }
        result
    }
}

fn parse_access_token(body: &Value) -> Result<String> {
    match body.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no access_token in response");
            Err(PlatformError::Authentication(format!("reddit token exchange failed: {}", reason)).into())
        }
    }
}

/// Post id (fullname) from an `api_type=json` submit response
fn parse_submission(body: &Value) -> Result<String> {
    if let Some(errors) = body.pointer("/json/errors").and_then(Value::as_array) {
        if let Some(first) = errors.first() {
            let code = first.get(0).and_then(Value::as_str).unwrap_or("UNKNOWN");
            let message = first.get(1).and_then(Value::as_str).unwrap_or("");
            let detail = format!("reddit rejected submission: {} {}", code, message);
            let err = match code {
                "RATELIMIT" => PlatformError::RateLimit(detail),
                "USER_REQUIRED" => PlatformError::Authentication(detail),
                _ => PlatformError::Posting(detail),
            };
            return Err(err.into());
        }
    }

    ["/json/data/name", "/json/data/id", "/data/id"]
        .iter()
        .find_map(|pointer| id_field(body, pointer))
        .ok_or_else(|| PlatformError::Posting("reddit response has no post id".to_string()).into())
}

#[async_trait]
impl Platform for RedditPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Reddit
    }

    async fn authenticate(&self) -> Result<()> {
        self.session_token().await.map(|_| ())
    }

    async fn invalidate_session(&self) {
        *self.session.lock().await = None;
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let subreddits = select_subreddits(request.category.as_deref(), request.source.as_deref());
        tracing::info!("Targeting subreddits: {}", subreddits.join(", "));

        let title = request.text.as_str();
        let link = request.link.as_deref();

        publish_to_destinations(self.name(), &subreddits, self.pacer.as_ref(), |subreddit| {
            async move { self.submit(&subreddit, title, link).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::stub_server::StubServer;
    use crate::rate_limiter::NoDelay;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_select_subreddits_by_category() {
        assert_eq!(
            select_subreddits(Some("Technology"), None),
            vec!["technology", "tech", "programming"]
        );
        assert_eq!(
            select_subreddits(Some("business"), None),
            vec!["business", "entrepreneur", "startups"]
        );
    }

    #[test]
    fn test_select_subreddits_by_source() {
        assert_eq!(
            select_subreddits(None, Some("Personal Finance Weekly")),
            vec!["personalfinance", "investing", "wallstreetbets"]
        );
        assert_eq!(
            select_subreddits(Some("misc"), Some("daily-deals")),
            vec!["deals", "frugal", "shopping"]
        );
    }

    #[test]
    fn test_select_subreddits_falls_back_to_general() {
        assert_eq!(select_subreddits(None, None), vec!["news", "worldnews"]);
        assert_eq!(
            select_subreddits(Some("gardening"), Some("blog")),
            vec!["news", "worldnews"]
        );
    }

    #[test]
    fn test_select_subreddits_first_rule_wins() {
        assert_eq!(
            select_subreddits(Some("tech business"), None),
            vec!["technology", "tech", "programming"]
        );
    }

    #[test]
    fn test_parse_access_token() {
        let token = parse_access_token(&json!({"access_token": "abc", "token_type": "bearer"}));
        assert_eq!(token.unwrap(), "abc");

        let err = parse_access_token(&json!({"error": "invalid_grant"})).unwrap_err();
        assert!(err.to_string().contains("invalid_grant"));
        assert!(matches!(
            err,
            SyndicastError::Platform(PlatformError::Authentication(_))
        ));
    }

    #[test]
    fn test_parse_submission_success() {
        let body = json!({"json": {"errors": [], "data": {"id": "1abcde", "name": "t3_1abcde"}}});
        assert_eq!(parse_submission(&body).unwrap(), "t3_1abcde");

        let legacy = json!({"data": {"id": "xyz"}});
        assert_eq!(parse_submission(&legacy).unwrap(), "xyz");
    }

    #[test]
    fn test_parse_submission_errors() {
        let limited = json!({"json": {"errors": [["RATELIMIT", "try again in 9 minutes", "ratelimit"]]}});
        assert!(matches!(
            parse_submission(&limited).unwrap_err(),
            SyndicastError::Platform(PlatformError::RateLimit(_))
        ));

        let banned = json!({"json": {"errors": [["SUBREDDIT_NOTALLOWED", "not allowed", "sr"]]}});
        let err = parse_submission(&banned).unwrap_err();
        assert!(err.to_string().contains("SUBREDDIT_NOTALLOWED"));

        assert!(parse_submission(&json!({"json": {"errors": []}})).is_err());
    }

    fn configured() -> RedditConfig {
        RedditConfig {
            client_id: Some("cid".to_string()),
            client_secret: Some(SecretString::from("secret".to_string())),
            username: Some("bot".to_string()),
            password: Some(SecretString::from("pw".to_string())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalidate_session_clears_cache() {
        let platform =
            RedditPlatform::from_config(Client::new(), &configured(), Arc::new(NoDelay)).unwrap();
        *platform.session.lock().await = Some(SecretString::from("cached".to_string()));

        let token = platform.session_token().await.unwrap();
        assert_eq!(token.expose_secret(), "cached");

        platform.invalidate_session().await;
        assert!(platform.session.lock().await.is_none());
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = configured();
        config.password = None;
        let err = RedditPlatform::from_config(Client::new(), &config, Arc::new(NoDelay))
            .err()
            .unwrap();
        assert!(err.to_string().contains("reddit.password"));
    }

    #[tokio::test]
    async fn test_rejected_session_is_renewed_for_next_subreddit() {
        let tokens = Arc::new(AtomicUsize::new(0));
        let submits = Arc::new(AtomicUsize::new(0));
        let (token_count, submit_count) = (tokens.clone(), submits.clone());

        let server = StubServer::start(move |path| match path {
            "/api/v1/access_token" => {
                let n = token_count.fetch_add(1, Ordering::SeqCst) + 1;
                (200, json!({"access_token": format!("tok-{}", n)}).to_string())
            }
            "/api/submit" if submit_count.fetch_add(1, Ordering::SeqCst) == 0 => {
                (401, json!({"message": "Unauthorized"}).to_string())
            }
            "/api/submit" => (
                200,
                json!({"json": {"errors": [], "data": {"name": "t3_1"}}}).to_string(),
            ),
            _ => (404, "{}".to_string()),
        })
        .await;

        let config = RedditConfig {
            auth_url: server.url("/api/v1/access_token"),
            api_base: server.url(""),
            ..configured()
        };
        let platform = RedditPlatform::from_config(Client::new(), &config, Arc::new(NoDelay)).unwrap();

        platform.authenticate().await.unwrap();
        let receipt = platform
            .publish(&PublishRequest::text_only("Big news"))
            .await
            .unwrap();

        assert_eq!(tokens.load(Ordering::SeqCst), 2);
        assert_eq!(server.count("/api/submit"), 2);
        assert_eq!(receipt.post_id, "t3_1");
        assert_eq!(receipt.destinations.len(), 2);
        assert_eq!(receipt.destinations[0].destination, "news");
        assert!(receipt.destinations[0]
            .error
            .as_deref()
            .unwrap()
            .contains("HTTP 401"));
        assert_eq!(receipt.destinations[1].post_id.as_deref(), Some("t3_1"));
    }

    #[tokio::test]
    async fn test_failed_token_exchange_is_authentication_error() {
        let server = StubServer::start(|_| (401, json!({"error": "invalid_grant"}).to_string())).await;

        let config = RedditConfig {
            auth_url: server.url("/api/v1/access_token"),
            api_base: server.url(""),
            ..configured()
        };
        let platform = RedditPlatform::from_config(Client::new(), &config, Arc::new(NoDelay)).unwrap();

        let err = platform.authenticate().await.unwrap_err();
        assert!(matches!(
            err,
            SyndicastError::Platform(PlatformError::Authentication(_))
        ));
        assert!(platform.session.lock().await.is_none());
        assert_eq!(server.paths(), vec!["/api/v1/access_token"]);
    }
}
