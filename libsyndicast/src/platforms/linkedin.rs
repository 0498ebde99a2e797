//! LinkedIn professional-network adapter
//!
//! Publishes UGC posts. The article link travels as a structured `ARTICLE`
//! media entry rather than in the commentary. The author URN comes from
//! configuration or is looked up once through `/me` and cached.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::config::{required_secret, LinkedInConfig};
use crate::error::{PlatformError, Result, SyndicastError};
use crate::platforms::http::{id_field, read_json, transport_error};
use crate::platforms::{Platform, PublishRequest};
use crate::types::{PlatformKind, PublishReceipt};

const RESTLI_ID_HEADER: &str = "x-restli-id";

pub struct LinkedInPlatform {
    client: Client,
    access_token: SecretString,
    api_base: String,
    author_urn: OnceCell<String>,
}

impl LinkedInPlatform {
    pub fn new(
        client: Client,
        access_token: SecretString,
        api_base: &str,
        author_urn: Option<String>,
    ) -> Self {
        let cell = match author_urn.filter(|u| !u.trim().is_empty()) {
            Some(urn) => OnceCell::new_with(Some(urn)),
            None => OnceCell::new(),
        };
        Self {
            client,
            access_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            author_urn: cell,
        }
    }

    pub fn from_config(client: Client, config: &LinkedInConfig) -> Result<Self> {
        let token = required_secret(&config.access_token, "linkedin.access_token")?;
        Ok(Self::new(
            client,
            token,
            &config.api_base,
            config.author_urn.clone(),
        ))
    }

    async fn author(&self) -> Result<&String> {
        self.author_urn
            .get_or_try_init(|| async {
                let url = format!("{}/me", self.api_base);
                let response = self
                    .client
                    .get(&url)
                    .bearer_auth(self.access_token.expose_secret())
                    .send()
                    .await
                    .map_err(|e| transport_error(self.name(), e))?;
                let response = read_json(self.name(), response).await?;
                let urn = person_urn(&response.body)?;
                tracing::debug!("Resolved LinkedIn author {}", urn);
                Ok::<String, SyndicastError>(urn)
            })
            .await
    }
}

fn person_urn(body: &Value) -> Result<String> {
    let id = id_field(body, "/id").ok_or_else(|| {
        PlatformError::Authentication("linkedin profile response has no id".to_string())
    })?;
    Ok(format!("urn:li:person:{}", id))
}

fn share_payload(author: &str, text: &str, link: Option<&str>) -> Value {
    let mut share = json!({
        "shareCommentary": { "text": text },
        "shareMediaCategory": "NONE",
    });
    if let Some(link) = link {
        share["shareMediaCategory"] = json!("ARTICLE");
        share["media"] = json!([{ "status": "READY", "originalUrl": link }]);
    }

    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": { "com.linkedin.ugc.ShareContent": share },
        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
    })
}

/// Post id from the body, else from the `x-restli-id` header
fn parse_share_id(headers: &HeaderMap, body: &Value) -> Result<String> {
    if let Some(id) = id_field(body, "/id") {
        return Ok(id);
    }
    headers
        .get(RESTLI_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PlatformError::Posting("linkedin response has no post id".to_string()).into())
}

#[async_trait]
impl Platform for LinkedInPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::LinkedIn
    }

    async fn authenticate(&self) -> Result<()> {
        self.author().await.map(|_| ())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let author = self.author().await?;
        let url = format!("{}/ugcPosts", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&share_payload(author, &request.text, request.link.as_deref()))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let response = read_json(self.name(), response).await?;
        let id = parse_share_id(&response.headers, &response.body)?;
        Ok(PublishReceipt::single(id))
    }
}
