//! Supabase (PostgREST) article source

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, SourceError};
use crate::source::ArticleSource;
use crate::types::{Article, PlatformKind};

pub struct SupabaseArticleSource {
    client: Client,
    base_url: String,
    anon_key: SecretString,
    table: String,
}

impl std::fmt::Debug for SupabaseArticleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseArticleSource")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl SupabaseArticleSource {
    pub fn new(client: Client, base_url: String, anon_key: SecretString, table: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            table,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.anon_key.expose_secret();
        request.header("apikey", key).bearer_auth(key)
    }

    fn select_request(&self, platform: PlatformKind) -> RequestBuilder {
        self.authorized(self.client.get(self.endpoint()))
            .query(&[
                ("select", "*"),
                ("order", "published_at.desc"),
                ("limit", "1"),
                (platform.marker_column(), "is.null"),
            ])
            .header("Accept", "application/json")
    }

    fn mark_request(
        &self,
        article_id: &str,
        platform: PlatformKind,
        at: DateTime<Utc>,
    ) -> RequestBuilder {
        let column = platform.marker_column();
        let id_filter = format!("eq.{}", article_id);
        self.authorized(self.client.patch(self.endpoint()))
            .query(&[("id", id_filter.as_str()), (column, "is.null")])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ column: at.to_rfc3339() }))
    }
}

/// Decode a PostgREST row list, keeping the first row
fn parse_rows(body: &str) -> Result<Option<Article>> {
    let mut rows: Vec<Article> =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(e.to_string()))?;
    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rows.swap_remove(0)))
    }
}

#[async_trait]
impl ArticleSource for SupabaseArticleSource {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn latest_unposted(&self, platform: PlatformKind) -> Result<Option<Article>> {
        let response = self
            .select_request(platform)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        parse_rows(&body)
    }

    async fn mark_posted(
        &self,
        article_id: &str,
        platform: PlatformKind,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let response = self
            .mark_request(article_id, platform, at)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        tracing::debug!(
            article_id,
            column = platform.marker_column(),
            "Posted marker written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> SupabaseArticleSource {
        SupabaseArticleSource::new(
            Client::new(),
            "https://db.example.co/".to_string(),
            SecretString::from("anon-key".to_string()),
            "articles".to_string(),
        )
    }

    #[test]
    fn test_select_request_filters_on_platform_marker() {
        let request = source().select_request(PlatformKind::Reddit).build().unwrap();
        let url = request.url().as_str();

        assert!(url.starts_with("https://db.example.co/rest/v1/articles?"));
        assert!(url.contains("order=published_at.desc"));
        assert!(url.contains("limit=1"));
        assert!(url.contains("posted_to_reddit_at=is.null"));
        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()["authorization"], "Bearer anon-key");
    }

    #[test]
    fn test_select_request_uses_tweeted_at_for_twitter() {
        let request = source().select_request(PlatformKind::Twitter).build().unwrap();
        assert!(request.url().as_str().contains("tweeted_at=is.null"));
    }

    #[test]
    fn test_mark_request_only_touches_unset_marker() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let request = source()
            .mark_request("42", PlatformKind::LinkedIn, at)
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::PATCH);
        let url = request.url().as_str();
        assert!(url.contains("id=eq.42"));
        assert!(url.contains("posted_to_linkedin_at=is.null"));

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["posted_to_linkedin_at"], "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_parse_rows() {
        assert!(parse_rows("[]").unwrap().is_none());

        let article = parse_rows(
            r#"[{"id": 9, "title": "Hello", "published_at": "2024-05-01T10:00:00.123456+00:00"}]"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(article.id, "9");
        assert_eq!(article.title, "Hello");

        assert!(parse_rows(r#"{"message": "oops"}"#).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", source());
        assert!(!debug.contains("anon-key"));
    }
}
