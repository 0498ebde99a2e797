//! Shared HTTP response handling for platform adapters

use reqwest::header::HeaderMap;
use reqwest::{Response, StatusCode};
use serde_json::Value;

use crate::error::{PlatformError, Result};

/// Longest slice of a response body quoted in an error message
const MAX_ERROR_BODY: usize = 300;

/// A 2xx response with its headers and decoded body
///
/// An empty body decodes to `Value::Null`.
#[derive(Debug)]
pub struct JsonResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Map a non-success status to the platform error class
pub fn status_error(platform: &str, status: StatusCode, body: &str) -> PlatformError {
    let message = format!("{} returned HTTP {}: {}", platform, status.as_u16(), excerpt(body));
    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(message),
        400 | 422 => PlatformError::Validation(message),
        429 => PlatformError::RateLimit(message),
        500..=599 => PlatformError::Network(message),
        _ => PlatformError::Posting(message),
    }
}

pub fn transport_error(platform: &str, err: reqwest::Error) -> PlatformError {
    if err.is_timeout() {
        PlatformError::Network(format!("{} request timed out: {}", platform, err))
    } else {
        PlatformError::Network(format!("{} request failed: {}", platform, err))
    }
}

/// Read a response, failing on any non-2xx status or undecodable body
pub async fn read_json(platform: &str, response: Response) -> Result<JsonResponse> {
    let status = response.status();
    let headers = response.headers().clone();
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(platform, e))?;

    if !status.is_success() {
        return Err(status_error(platform, status, &text).into());
    }

    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).map_err(|e| {
            PlatformError::Posting(format!("{} returned invalid JSON: {}", platform, e))
        })?
    };

    Ok(JsonResponse {
        status,
        headers,
        body,
    })
}

/// String-or-number field lookup; ids come back in both shapes
pub fn id_field(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        out.push_str("...");
        out
    }
}
