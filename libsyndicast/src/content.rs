//! Platform style profiles and post-processing of generated copy
//!
//! Each platform adapter owns a [`StyleProfile`] describing how its copy should
//! read and how long it may be. This module turns an [`Article`] plus a profile
//! into a generation request, and turns the generator's raw text into
//! [`GeneratedContent`] that is guaranteed to fit the platform limit.

use crate::generator::GenerationRequest;
use crate::types::{non_empty, Article, GeneratedContent, PlatformKind};

/// Characters of body text forwarded to the generator when there is no summary
pub const BODY_EXCERPT_CHARS: usize = 500;

const ELLIPSIS: &str = "...";

/// How an adapter carries the article link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Appended to the text when it fits
    Inline,
    /// Sent as a separate structured field; the text stays link-free
    Structured,
    /// The link is the payload and the text is its caption
    Primary,
}

/// How a platform's copy should be written and bounded
#[derive(Debug, Clone, PartialEq)]
pub struct StyleProfile {
    /// What is being written, e.g. "an engaging tweet"
    pub artifact: &'static str,
    pub max_length: usize,
    pub hashtag_range: Option<(u8, u8)>,
    pub tone: &'static str,
    pub call_to_action: bool,
    pub system_style: &'static str,
    pub format_hint: &'static str,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub link_mode: LinkMode,
    /// Text placed before an inline link, after a blank line
    pub link_prefix: &'static str,
    /// Characters kept free when deciding whether an inline link fits
    pub reserved_margin: usize,
    /// Strip one pair of surrounding double quotes from generated text
    pub strip_quotes: bool,
}

impl StyleProfile {
    pub fn for_platform(kind: PlatformKind) -> Self {
        match kind {
            PlatformKind::Twitter => Self::twitter(),
            PlatformKind::LinkedIn => Self::linkedin(),
            PlatformKind::Facebook => Self::facebook(),
            PlatformKind::Reddit => Self::reddit(),
        }
    }

    pub fn twitter() -> Self {
        Self {
            artifact: "an engaging tweet",
            max_length: 280,
            hashtag_range: Some((2, 3)),
            tone: "Be engaging and encourage clicks",
            call_to_action: false,
            system_style: "You are a social media expert who creates engaging tweets about tech and business articles.",
            format_hint: "Tweet text with hashtags at the end",
            max_output_tokens: 150,
            temperature: 0.7,
            link_mode: LinkMode::Inline,
            link_prefix: "",
            reserved_margin: 0,
            strip_quotes: false,
        }
    }

    pub fn linkedin() -> Self {
        Self {
            artifact: "an engaging LinkedIn post",
            max_length: 1300,
            hashtag_range: Some((3, 5)),
            tone: "Be professional and business-focused",
            call_to_action: true,
            system_style: "You are a professional content creator who writes engaging LinkedIn posts about tech and business articles.",
            format_hint: "Professional post with hashtags at the end",
            max_output_tokens: 300,
            temperature: 0.7,
            link_mode: LinkMode::Structured,
            link_prefix: "",
            reserved_margin: 0,
            strip_quotes: false,
        }
    }

    pub fn facebook() -> Self {
        Self {
            artifact: "an engaging Facebook post",
            max_length: 63206,
            hashtag_range: Some((2, 3)),
            tone: "Be conversational and friendly",
            call_to_action: true,
            system_style: "You are a social media expert who creates engaging Facebook posts about tech and business articles.",
            format_hint: "Friendly post with hashtags at the end",
            max_output_tokens: 400,
            temperature: 0.7,
            link_mode: LinkMode::Inline,
            link_prefix: "Read more: ",
            reserved_margin: 206,
            strip_quotes: false,
        }
    }

    pub fn reddit() -> Self {
        Self {
            artifact: "an engaging Reddit post title",
            max_length: 300,
            hashtag_range: None,
            tone: "Be interesting and clickable without being clickbait, and follow Reddit's rules",
            call_to_action: false,
            system_style: "You are a Reddit expert who creates engaging, rule-compliant post titles.",
            format_hint: "Just the title, no quotes or extra formatting",
            max_output_tokens: 100,
            temperature: 0.7,
            link_mode: LinkMode::Primary,
            link_prefix: "",
            reserved_margin: 0,
            strip_quotes: true,
        }
    }
}

/// Text handed to the generator: title, then summary, else a body excerpt
pub fn source_text(article: &Article) -> String {
    let mut text = article.title.trim().to_string();

    let extra = match (non_empty(&article.summary), non_empty(&article.content)) {
        (Some(summary), _) => Some(summary.to_string()),
        (None, Some(body)) => {
            let mut excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
            if body.chars().count() > BODY_EXCERPT_CHARS {
                excerpt.push_str(ELLIPSIS);
            }
            Some(excerpt)
        }
        (None, None) => None,
    };

    if let Some(extra) = extra {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&extra);
    }

    text
}

/// Build the generator request for an article under a style profile
///
/// Returns `None` when the article has no usable text at all.
pub fn build_request(article: &Article, profile: &StyleProfile) -> Option<GenerationRequest> {
    let text = source_text(article);
    if text.trim().is_empty() {
        return None;
    }

    let mut rules = vec![format!("- Be under {} characters", profile.max_length)];
    if let Some((low, high)) = profile.hashtag_range {
        rules.push(format!("- Include relevant hashtags ({}-{} max)", low, high));
    }
    rules.push(format!("- {}", profile.tone));
    if profile.call_to_action {
        rules.push("- Include a call-to-action".to_string());
    }
    if profile.link_mode == LinkMode::Inline {
        rules.push("- Do not include any links; one is added separately".to_string());
    }

    let user_prompt = format!(
        "Create {} about this article. It should:\n{}\n\nArticle: {}\n\nFormat: {}",
        profile.artifact,
        rules.join("\n"),
        text,
        profile.format_hint
    );

    Some(GenerationRequest {
        system_style: profile.system_style.to_string(),
        user_prompt,
        max_output_tokens: profile.max_output_tokens,
        temperature: profile.temperature,
    })
}

/// Fit raw generator output to the platform
///
/// The inline link is appended only when the whole result stays within
/// `max_length - reserved_margin`; it is never cut. Text still over the limit
/// is truncated to `max_length - 3` characters plus `...`. Returns `None` when
/// nothing usable is left.
pub fn finalize(raw: &str, link: Option<&str>, profile: &StyleProfile) -> Option<GeneratedContent> {
    let mut text = raw.trim();
    if profile.strip_quotes && text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim();
    }
    if text.is_empty() {
        return None;
    }

    let mut text = text.to_string();
    let mut link_appended = false;

    if profile.link_mode == LinkMode::Inline {
        if let Some(link) = link.map(str::trim).filter(|l| !l.is_empty()) {
            let suffix = format!("\n\n{}{}", profile.link_prefix, link);
            let budget = profile.max_length.saturating_sub(profile.reserved_margin);
            if text.chars().count() + suffix.chars().count() <= budget {
                text.push_str(&suffix);
                link_appended = true;
            }
        }
    }

    let truncated = text.chars().count() > profile.max_length;
    if truncated {
        text = truncate_with_ellipsis(&text, profile.max_length);
    }

    Some(GeneratedContent {
        text,
        link_appended,
        truncated,
    })
}

/// Cut `text` to `limit - 3` characters and append `...`
pub fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
