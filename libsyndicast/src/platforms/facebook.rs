//! Facebook page feed adapter

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::{required_secret, required_value, FacebookConfig};
use crate::error::{PlatformError, Result};
use crate::platforms::http::{id_field, read_json, transport_error};
use crate::platforms::{Platform, PublishRequest};
use crate::types::{PlatformKind, PublishReceipt};

pub struct FacebookPlatform {
    client: Client,
    access_token: SecretString,
    page_id: String,
    api_base: String,
}

impl FacebookPlatform {
    pub fn new(client: Client, access_token: SecretString, page_id: String, api_base: &str) -> Self {
        Self {
            client,
            access_token,
            page_id,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(client: Client, config: &FacebookConfig) -> Result<Self> {
        let token = required_secret(&config.access_token, "facebook.access_token")?;
        let page_id = required_value(&config.page_id, "facebook.page_id")?;
        Ok(Self::new(client, token, page_id, &config.api_base))
    }

    fn feed_url(&self) -> String {
        format!("{}/{}/feed", self.api_base, self.page_id)
    }
}

/// Form fields for a feed post; the link also drives the preview card
fn feed_params<'a>(message: &'a str, link: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("message", message)];
    if let Some(link) = link {
        params.push(("link", link));
    }
    params
}

fn parse_post_id(body: &Value) -> Result<String> {
    id_field(body, "/id")
        .ok_or_else(|| PlatformError::Posting("facebook response is missing id".to_string()).into())
}

#[async_trait]
impl Platform for FacebookPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Facebook
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let mut params = feed_params(&request.text, request.link.as_deref());
        params.push(("access_token", self.access_token.expose_secret()));

        let response = self
            .client
            .post(self.feed_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let response = read_json(self.name(), response).await?;
        let id = parse_post_id(&response.body)?;
        Ok(PublishReceipt::single(id))
    }
}
