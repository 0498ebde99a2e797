//! SQLite article source for self-hosted deployments

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{Result, SourceError};
use crate::source::ArticleSource;
use crate::types::{Article, PlatformKind};

#[derive(Clone)]
pub struct SqliteArticleSource {
    pool: SqlitePool,
}

impl SqliteArticleSource {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SourceError::IoError)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));
        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(SourceError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(SourceError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace an article; existing markers are reset
    pub async fn insert_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO articles
                (id, title, summary, content, url, affiliate_url, category, source, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.content)
        .bind(&article.url)
        .bind(&article.affiliate_url)
        .bind(&article.category)
        .bind(&article.source)
        .bind(article.published_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(SourceError::SqlxError)?;

        Ok(())
    }

    /// Current marker for (`article_id`, `platform`)
    pub async fn posted_at(
        &self,
        article_id: &str,
        platform: PlatformKind,
    ) -> Result<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT {} FROM articles WHERE id = ?",
            platform.marker_column()
        );
        let row = sqlx::query_as::<_, (Option<i64>,)>(&sql)
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SourceError::SqlxError)?;

        Ok(row.and_then(|r| r.0).and_then(from_unix))
    }

    async fn exists(&self, article_id: &str) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT 1 FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(SourceError::SqlxError)?;
        Ok(row.is_some())
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let published: i64 = row.get("published_at");
    let published_at = from_unix(published)
        .ok_or_else(|| SourceError::Decode(format!("invalid published_at {}", published)))?;

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        url: row.get("url"),
        affiliate_url: row.get("affiliate_url"),
        category: row.get("category"),
        source: row.get("source"),
        published_at,
    })
}

#[async_trait]
impl ArticleSource for SqliteArticleSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn latest_unposted(&self, platform: PlatformKind) -> Result<Option<Article>> {
        let sql = format!(
            r#"
            SELECT id, title, summary, content, url, affiliate_url, category, source, published_at
            FROM articles
            WHERE {} IS NULL
            ORDER BY published_at DESC, id DESC
            LIMIT 1
            "#,
            platform.marker_column()
        );

        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(SourceError::SqlxError)?;

        row.as_ref().map(article_from_row).transpose()
    }

    async fn mark_posted(
        &self,
        article_id: &str,
        platform: PlatformKind,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let column = platform.marker_column();
        let sql = format!(
            "UPDATE articles SET {col} = ? WHERE id = ? AND {col} IS NULL",
            col = column
        );

        let result = sqlx::query(&sql)
            .bind(at.timestamp())
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(SourceError::SqlxError)?;

        if result.rows_affected() == 0 && !self.exists(article_id).await? {
            return Err(SourceError::NotFound(article_id.to_string()).into());
        }

        Ok(())
    }
}
