//! Content-analysis collaborator
//!
//! The HTTP implementation talks to a Messages-style endpoint: one base64
//! image block plus an instruction, answered with a JSON object holding
//! `keywords` and `description`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::retry::Retryable;

const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 512;

const INSTRUCTION: &str = "Describe this photograph for a photo library. Reply with only a JSON \
object of the form {\"keywords\": [\"...\"], \"description\": \"...\"} containing 5 to 15 short \
lowercase keywords and a one-sentence description.";

/// What the analyzer says about an image
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("analysis rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("analysis service unavailable: {0}")]
    Transient(String),
    #[error("analysis request timed out")]
    Timeout,
    #[error("analysis request rejected: {0}")]
    Fatal(String),
    #[error("invalid analysis response: {0}")]
    InvalidResponse(String),
}

impl Retryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited { .. } | AnalysisError::Transient(_) | AnalysisError::Timeout
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AnalysisError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8], media_type: &str) -> Result<Analysis, AnalysisError>;
}

/// Media type from a content-store key's extension
pub fn media_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

pub struct HttpAnalyzer {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl HttpAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl ContentAnalyzer for HttpAnalyzer {
    async fn analyze(&self, image: &[u8], media_type: &str) -> Result<Analysis, AnalysisError> {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": { "type": "base64", "media_type": media_type, "data": data }
                    },
                    { "type": "text", "text": INSTRUCTION }
                ]
            }]
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(AnalysisError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(AnalysisError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Fatal(format!("HTTP {status}: {text}")));
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Timeout
            } else {
                AnalysisError::InvalidResponse(e.to_string())
            }
        })?;
        let text = parsed
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        parse_analysis(&text)
    }
}

fn classify_transport(err: reqwest::Error) -> AnalysisError {
    if err.is_timeout() {
        AnalysisError::Timeout
    } else if err.is_connect() || err.is_request() {
        AnalysisError::Transient(err.to_string())
    } else {
        AnalysisError::Fatal(err.to_string())
    }
}

/// Pull the JSON object out of the model's reply, tolerating prose or code
/// fences around it
pub fn parse_analysis(text: &str) -> Result<Analysis, AnalysisError> {
    let (start, end) = text
        .find('{')
        .zip(text.rfind('}'))
        .filter(|(s, e)| s < e)
        .ok_or_else(|| AnalysisError::InvalidResponse("no JSON object in reply".into()))?;
    serde_json::from_str(&text[start..=end])
        .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_with_fences() {
        let reply = "Here you go:\n```json\n{\"keywords\": [\"beach\", \"sunset\"], \"description\": \"A beach at dusk.\"}\n```";
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.keywords, vec!["beach", "sunset"]);
        assert_eq!(analysis.description, "A beach at dusk.");
    }

    #[test]
    fn test_parse_analysis_rejects_prose() {
        assert!(matches!(
            parse_analysis("I cannot describe this image."),
            Err(AnalysisError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let err = AnalysisError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(!AnalysisError::Fatal("bad request".into()).is_retryable());
        assert!(!AnalysisError::InvalidResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type_for("a/b/IMG_1_l.JPG"), "image/jpeg");
        assert_eq!(media_type_for("a/b/shot.png"), "image/png");
        assert_eq!(media_type_for("noext"), "image/jpeg");
    }
}
