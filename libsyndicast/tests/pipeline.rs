//! Publication pipeline behaviour against in-memory collaborators

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use libsyndicast::error::PlatformError;
use libsyndicast::generator::mock::MockGenerator;
use libsyndicast::platforms::fanout::publish_to_destinations;
use libsyndicast::platforms::mock::MockPlatform;
use libsyndicast::platforms::reddit::select_subreddits;
use libsyndicast::platforms::{Platform, PublishRequest};
use libsyndicast::rate_limiter::CountingRateLimiter;
use libsyndicast::source::MemoryArticleSource;
use libsyndicast::types::PublishReceipt;
use libsyndicast::{Article, FailureStage, PipelineProgress, PlatformKind, PublicationPipeline, Result};
use std::sync::{Arc, Mutex};

fn article_x() -> Article {
    let mut article = Article::new("x-1", "X", Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
    article.summary = Some("A short summary of X".to_string());
    article.url = Some("https://example.com/x".to_string());
    article
}

fn pipeline(
    source: &MemoryArticleSource,
    generator: &MockGenerator,
    platform: Arc<dyn Platform>,
) -> PublicationPipeline {
    PublicationPipeline::new(Arc::new(source.clone()), Arc::new(generator.clone()), platform)
}

#[tokio::test]
async fn test_fresh_article_posts_once_to_every_platform() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("Check out X #news #tech");

    for kind in PlatformKind::ALL {
        let platform = MockPlatform::success(kind);
        let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
            .run()
            .await;

        assert!(outcome.is_success(), "{:?}", outcome);
        assert!(outcome.recorded);
        assert_eq!(outcome.failure_stage, None);
        assert_eq!(outcome.article_id.as_deref(), Some("x-1"));
        assert!(outcome.external_post_id.is_some());
        assert_eq!(platform.publish_call_count(), 1);
        assert!(source.posted_at("x-1", kind).is_some());
    }

    assert_eq!(source.write_count(), 4);
    assert_eq!(generator.call_count(), 4);
}

#[tokio::test]
async fn test_second_run_finds_nothing_to_post() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::success(PlatformKind::Twitter);
    let pipeline = pipeline(&source, &generator, Arc::new(platform.clone()));

    assert!(pipeline.run().await.recorded);

    let second = pipeline.run().await;
    assert!(second.is_nothing_to_post());
    assert!(second.is_success());
    assert!(!second.recorded);
    assert_eq!(platform.publish_call_count(), 1);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_already_posted_article_is_not_selected() {
    let newest = article_x();
    let older = Article::new("older", "Older", Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap());
    let source = MemoryArticleSource::with_articles(vec![older, newest]);
    source.set_posted("x-1", PlatformKind::Facebook, Utc::now());

    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::success(PlatformKind::Facebook);
    let outcome = pipeline(&source, &generator, Arc::new(platform)).run().await;

    assert_eq!(outcome.article_id.as_deref(), Some("older"));
}

#[tokio::test]
async fn test_empty_generation_never_reaches_platform() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("   ");
    let platform = MockPlatform::success(PlatformKind::LinkedIn);

    let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Generation));
    assert_eq!(outcome.failure_stage.unwrap().to_string(), "GENERATION_FAILED");
    assert_eq!(platform.publish_call_count(), 0);
    assert_eq!(platform.auth_call_count(), 0);
    assert_eq!(source.write_count(), 0);
}

#[tokio::test]
async fn test_generator_error_is_generation_failure() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::failing("insufficient_quota");
    let platform = MockPlatform::success(PlatformKind::Twitter);

    let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Generation));
    assert!(outcome.error.unwrap().contains("insufficient_quota"));
    assert_eq!(platform.publish_call_count(), 0);
}

#[tokio::test]
async fn test_publish_failure_leaves_marker_unset() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::post_failure(
        PlatformKind::Facebook,
        PlatformError::Network("facebook returned HTTP 502".to_string()),
    );

    let outcome = pipeline(&source, &generator, Arc::new(platform)).run().await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Publish));
    assert!(!outcome.is_success());
    assert!(!outcome.recorded);
    assert!(outcome.external_post_id.is_none());
    assert!(source.posted_at("x-1", PlatformKind::Facebook).is_none());
    assert_eq!(source.write_count(), 0);
}

#[tokio::test]
async fn test_authentication_failure_is_publish_failure() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::auth_failure(PlatformKind::Reddit, "invalid_grant");

    let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Publish));
    assert!(outcome.error.unwrap().contains("invalid_grant"));
    assert_eq!(platform.publish_call_count(), 0);
    assert_eq!(source.write_count(), 0);
}

#[tokio::test]
async fn test_progress_tracks_stage_reached() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let platform = MockPlatform::success(PlatformKind::Twitter);

    let progress = PipelineProgress::new();
    assert!(progress.article_id().is_none());
    pipeline(&source, &MockGenerator::failing("quota"), Arc::new(platform.clone()))
        .run_with_progress(&progress)
        .await;
    assert_eq!(progress.article_id().as_deref(), Some("x-1"));
    assert!(!progress.publish_started());

    let progress = PipelineProgress::new();
    let outcome = pipeline(&source, &MockGenerator::with_text("copy"), Arc::new(platform))
        .run_with_progress(&progress)
        .await;
    assert!(outcome.is_success());
    assert!(progress.publish_started());
    assert!(!outcome.publish_in_flight);
}

#[tokio::test]
async fn test_record_failure_is_reported_not_hidden() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    source.fail_writes("read-only transaction");
    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::success(PlatformKind::LinkedIn);

    let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Record));
    assert!(outcome.is_success());
    assert!(outcome.is_unrecorded());
    assert!(!outcome.recorded);
    assert!(outcome.external_post_id.is_some());
    assert!(outcome.error.unwrap().contains("read-only transaction"));
    assert_eq!(platform.publish_call_count(), 1);
}

#[tokio::test]
async fn test_select_failure() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    source.fail_reads("connection refused");
    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::success(PlatformKind::Twitter);

    let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Select));
    assert!(outcome.article_id.is_none());
    assert!(!outcome.is_nothing_to_post());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_article_without_text_is_generation_failure() {
    let blank = Article::new("blank", "   ", Utc::now());
    let source = MemoryArticleSource::with_articles(vec![blank]);
    let generator = MockGenerator::with_text("copy");
    let platform = MockPlatform::success(PlatformKind::Twitter);

    let outcome = pipeline(&source, &generator, Arc::new(platform)).run().await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Generation));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_long_generation_is_truncated_to_limit() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text(&"word ".repeat(200));
    let platform = MockPlatform::success(PlatformKind::Twitter);

    let outcome = pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    assert!(outcome.recorded);
    let text = &platform.published()[0].text;
    assert_eq!(text.chars().count(), 280);
    assert!(text.ends_with("..."));
    // The link did not fit and was omitted, not cut
    assert!(!text.contains("https://"));
}

#[tokio::test]
async fn test_inline_link_appended_when_it_fits() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("Short copy #x");
    let platform = MockPlatform::success(PlatformKind::Twitter);

    pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    let request = &platform.published()[0];
    assert_eq!(request.text, "Short copy #x\n\nhttps://example.com/x");
}

#[tokio::test]
async fn test_structured_link_stays_out_of_text() {
    let mut article = article_x();
    article.affiliate_url = Some("https://aff.example.com/x".to_string());
    let source = MemoryArticleSource::with_articles(vec![article]);
    let generator = MockGenerator::with_text("Professional copy #leadership");
    let platform = MockPlatform::success(PlatformKind::LinkedIn);

    pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    let request = &platform.published()[0];
    assert_eq!(request.text, "Professional copy #leadership");
    assert_eq!(request.link.as_deref(), Some("https://aff.example.com/x"));
}

#[tokio::test]
async fn test_prompt_uses_platform_style() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("\"A Reddit title\"");
    let platform = MockPlatform::success(PlatformKind::Reddit);

    pipeline(&source, &generator, Arc::new(platform.clone()))
        .run()
        .await;

    let request = &generator.requests()[0];
    assert_eq!(request.max_output_tokens, 100);
    assert!(request.user_prompt.contains("A short summary of X"));
    assert!(request.user_prompt.contains("300"));
    // Surrounding quotes are stripped for titles
    assert_eq!(platform.published()[0].text, "A Reddit title");
}

/// Forum adapter running the real fanout logic against canned destination results
struct ScriptedForum {
    pacer: CountingRateLimiter,
    failing: &'static str,
    submitted: Mutex<Vec<String>>,
}

#[async_trait]
impl Platform for ScriptedForum {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Reddit
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        let subreddits = select_subreddits(request.category.as_deref(), request.source.as_deref());
        publish_to_destinations("reddit", &subreddits, &self.pacer, |sr| async move {
            self.submitted.lock().unwrap().push(sr.clone());
            let result: Result<String> = if sr == self.failing {
                Err(PlatformError::Posting(format!("r/{} is private", sr)).into())
            } else {
                Ok(format!("t3_{}", sr))
            };
            result
        })
        .await
    }
}

#[tokio::test]
async fn test_forum_partial_destination_failure_still_succeeds() {
    let mut article = article_x();
    article.category = Some("Technology".to_string());
    let source = MemoryArticleSource::with_articles(vec![article]);
    let generator = MockGenerator::with_text("An interesting title");
    let forum = Arc::new(ScriptedForum {
        pacer: CountingRateLimiter::new(),
        failing: "tech",
        submitted: Mutex::new(Vec::new()),
    });

    let outcome = pipeline(&source, &generator, forum.clone()).run().await;

    assert!(outcome.is_success());
    assert!(outcome.recorded);
    assert_eq!(outcome.external_post_id.as_deref(), Some("t3_technology"));
    assert_eq!(outcome.destinations.len(), 3);
    assert!(outcome.destinations[0].succeeded());
    assert!(!outcome.destinations[1].succeeded());
    assert!(outcome.destinations[1].error.as_deref().unwrap().contains("private"));
    assert!(outcome.destinations[2].succeeded());
    assert_eq!(
        *forum.submitted.lock().unwrap(),
        vec!["technology", "tech", "programming"]
    );
    assert_eq!(forum.pacer.waits(), 2);
    assert_eq!(source.write_count(), 1);
}

#[tokio::test]
async fn test_forum_all_destinations_failing_is_publish_failure() {
    let source = MemoryArticleSource::with_articles(vec![article_x()]);
    let generator = MockGenerator::with_text("title");
    let platform = MockPlatform::fanout(
        PlatformKind::Reddit,
        &[("news", Some("RATELIMIT")), ("worldnews", Some("RATELIMIT"))],
    );

    let outcome = pipeline(&source, &generator, Arc::new(platform)).run().await;

    assert_eq!(outcome.failure_stage, Some(FailureStage::Publish));
    assert!(source.posted_at("x-1", PlatformKind::Reddit).is_none());
}
