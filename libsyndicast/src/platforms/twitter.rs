//! Twitter (X) microblog adapter
//!
//! Posts through the v2 `POST /tweets` endpoint with a bearer token. The link
//! is already inline in the text, so `PublishRequest::link` is not sent.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::config::{required_secret, TwitterConfig};
use crate::error::{PlatformError, Result};
use crate::platforms::http::{id_field, read_json, transport_error};
use crate::platforms::{Platform, PublishRequest};
use crate::types::{PlatformKind, PublishReceipt};

pub struct TwitterPlatform {
    client: Client,
    bearer_token: SecretString,
    api_base: String,
}

impl TwitterPlatform {
    pub fn new(client: Client, bearer_token: SecretString, api_base: &str) -> Self {
        Self {
            client,
            bearer_token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(client: Client, config: &TwitterConfig) -> Result<Self> {
        let token = required_secret(&config.bearer_token, "twitter.bearer_token")?;
        Ok(Self::new(client, token, &config.api_base))
    }
}

fn tweet_payload(text: &str) -> Value {
    json!({ "text": text })
}

fn parse_tweet_id(body: &Value) -> Result<String> {
    id_field(body, "/data/id").ok_or_else(|| {
        PlatformError::Posting("twitter response is missing data.id".to_string()).into()
    })
}

#[async_trait]
impl Platform for TwitterPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Twitter
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let url = format!("{}/tweets", self.api_base);
        tracing::debug!("Posting tweet ({} chars)", request.text.chars().count());

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer_token.expose_secret())
            .json(&tweet_payload(&request.text))
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let response = read_json(self.name(), response).await?;
        let id = parse_tweet_id(&response.body)?;
        Ok(PublishReceipt::single(id))
    }
}
