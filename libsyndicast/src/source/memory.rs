//! In-memory article source
//!
//! Used by tests. Clones share state, so a test can keep a
//! handle while the pipeline owns another. Read and write failures can be
//! injected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{Result, SourceError};
use crate::source::ArticleSource;
use crate::types::{Article, PlatformKind};

#[derive(Debug, Default)]
struct State {
    articles: Vec<Article>,
    markers: HashMap<(String, PlatformKind), DateTime<Utc>>,
    fail_reads: Option<String>,
    fail_writes: Option<String>,
    writes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryArticleSource {
    state: Arc<Mutex<State>>,
}

impl MemoryArticleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<Article>) -> Self {
        let source = Self::new();
        for article in articles {
            source.insert(article);
        }
        source
    }

    pub fn insert(&self, article: Article) {
        let mut state = self.state.lock().unwrap();
        state.articles.retain(|a| a.id != article.id);
        state.articles.push(article);
    }

    /// Pre-set a marker without counting it as a pipeline write
    pub fn set_posted(&self, article_id: &str, platform: PlatformKind, at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .markers
            .insert((article_id.to_string(), platform), at);
    }

    pub fn posted_at(&self, article_id: &str, platform: PlatformKind) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .markers
            .get(&(article_id.to_string(), platform))
            .copied()
    }

    /// Number of successful `mark_posted` calls
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Make every `latest_unposted` call fail with `message`
    pub fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().fail_reads = Some(message.to_string());
    }

    /// Make every `mark_posted` call fail with `message`
    pub fn fail_writes(&self, message: &str) {
        self.state.lock().unwrap().fail_writes = Some(message.to_string());
    }
}

#[async_trait]
impl ArticleSource for MemoryArticleSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn latest_unposted(&self, platform: PlatformKind) -> Result<Option<Article>> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_reads {
            return Err(SourceError::Api {
                status: 503,
                message: message.clone(),
            }
            .into());
        }

        Ok(state
            .articles
            .iter()
            .filter(|a| !state.markers.contains_key(&(a.id.clone(), platform)))
            .max_by_key(|a| a.published_at)
            .cloned())
    }

    async fn mark_posted(
        &self,
        article_id: &str,
        platform: PlatformKind,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_writes {
            return Err(SourceError::Api {
                status: 503,
                message: message.clone(),
            }
            .into());
        }
        if !state.articles.iter().any(|a| a.id == article_id) {
            return Err(SourceError::NotFound(article_id.to_string()).into());
        }

        state
            .markers
            .entry((article_id.to_string(), platform))
            .or_insert(at);
        state.writes += 1;
        Ok(())
    }
}
