//! services/api/src/adapters/gemini_image.rs
//!
//! This module contains the adapter for the Gemini image model.
//! It implements the `ImageGenerationService` port from the `core` crate,
//! calling the `generateContent` REST endpoint with the IMAGE response
//! modality and extracting the inline image data from the reply.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storybook_core::ports::{GeneratedImage, ImageGenerationService, PortError, PortResult};
use tracing::debug;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image client configuration.
#[derive(Debug, Clone)]
pub struct GeminiImageConfig {
    pub api_key: String,
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiImageConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    data: String,
}

//=========================================================================================
// Failure Classification
//=========================================================================================

/// Maps an upstream HTTP failure to a port error. Quota rejections become
/// `RateLimited` so the retry loop can back off; the status code is the
/// primary signal, with the Gemini status string and the legacy "quota"
/// marker kept as fallbacks for proxies that rewrite responses.
fn classify_http_failure(status: u16, body: &str) -> PortError {
    if status == 429 || body.contains("RESOURCE_EXHAUSTED") || body.contains("quota") {
        PortError::RateLimited(format!("HTTP {}: {}", status, body))
    } else {
        PortError::Unexpected(format!("HTTP {}: {}", status, body))
    }
}

/// Transport-level errors carry no status; fall back to message markers.
fn classify_transport_failure(err: reqwest::Error) -> PortError {
    let message = err.to_string();
    if message.contains("429") || message.contains("quota") {
        PortError::RateLimited(message)
    } else if err.is_timeout() {
        PortError::Unexpected(format!("Image request timed out: {}", message))
    } else {
        PortError::Unexpected(message)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ImageGenerationService` against the Gemini API.
pub struct GeminiImageAdapter {
    client: Client,
    config: GeminiImageConfig,
}

impl GeminiImageAdapter {
    /// Creates a new `GeminiImageAdapter`.
    pub fn new(config: GeminiImageConfig) -> PortResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            GEMINI_BASE_URL, self.config.model
        )
    }
}

#[async_trait]
impl ImageGenerationService for GeminiImageAdapter {
    /// One attempt against the image model: returns the base64 payload of
    /// the first inline image part, or fails when the reply contains none.
    async fn generate(&self, prompt: &str) -> PortResult<GeneratedImage> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        };

        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Requesting page illustration"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid image response: {}", e)))?;

        if let Some(candidate) = parsed.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(inline) = part.inline_data {
                        return Ok(GeneratedImage {
                            data_base64: inline.data,
                            mime_type: inline
                                .mime_type
                                .unwrap_or_else(|| "image/png".to_string()),
                        });
                    }
                }
            }
        }

        Err(PortError::Unexpected(
            "No image was generated in the response".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        assert!(classify_http_failure(429, "slow down").is_rate_limited());
    }

    #[test]
    fn quota_markers_are_rate_limited_regardless_of_status() {
        assert!(classify_http_failure(403, "RESOURCE_EXHAUSTED: daily limit").is_rate_limited());
        assert!(classify_http_failure(400, "quota exceeded for project").is_rate_limited());
    }

    #[test]
    fn other_failures_are_not_rate_limited() {
        assert!(!classify_http_failure(500, "internal error").is_rate_limited());
        assert!(!classify_http_failure(401, "bad key").is_rate_limited());
    }

    #[test]
    fn config_builder_sets_timeout() {
        let config = GeminiImageConfig::new("key", "gemini-2.0-flash-exp").with_timeout(30);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn response_parsing_finds_inline_data() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your illustration."},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                    ]
                }
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let inline = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .unwrap();
        assert_eq!(inline.data, "aGVsbG8=");
        assert_eq!(inline.mime_type.as_deref(), Some("image/png"));
    }
}
