//! Article source abstraction
//!
//! An article source answers two questions for the pipeline: which article is
//! the newest one not yet posted to a platform, and "remember that this
//! article is now posted there". The posted marker is the only idempotency
//! signal, so `mark_posted` must be safe to repeat.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{required_secret, required_value, SourceConfig, SourceKind};
use crate::error::Result;
use crate::types::{Article, PlatformKind};

mod memory;
mod sqlite;
mod supabase;

pub use memory::MemoryArticleSource;
pub use sqlite::SqliteArticleSource;
pub use supabase::SupabaseArticleSource;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Newest article (by `published_at`) whose marker for `platform` is unset
    async fn latest_unposted(&self, platform: PlatformKind) -> Result<Option<Article>>;

    /// Set the posted marker for `platform` on `article_id`
    ///
    /// A marker that is already set keeps its original timestamp.
    async fn mark_posted(
        &self,
        article_id: &str,
        platform: PlatformKind,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Build the configured article source
pub async fn create_source(
    config: &SourceConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn ArticleSource>> {
    match config.kind {
        SourceKind::Supabase => {
            let url = required_value(&config.url, "source.url")?;
            let key = required_secret(&config.anon_key, "source.anon_key")?;
            Ok(Arc::new(SupabaseArticleSource::new(
                client,
                url,
                key,
                config.table.clone(),
            )))
        }
        SourceKind::Sqlite => Ok(Arc::new(SqliteArticleSource::new(&config.path).await?)),
    }
}
