use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::ImagePayload;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport, authentication or quota failure.
    #[error("image request failed: {0}")]
    RequestFailed(String),
    /// The provider answered but returned no inline image.
    #[error("the model returned no image")]
    NoImageProduced,
}

/// The remote image-generation capability.
///
/// One call, one image. Implementations must not retry or cache; failures are
/// reported straight back to the studio.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        credential: &str,
        prompt: &str,
        reference: Option<&ImagePayload>,
    ) -> Result<ImagePayload, GenerationError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.is_ascii() {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &serde_json::Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(
        &self,
        credential: &str,
        prompt: &str,
        reference: Option<&ImagePayload>,
    ) -> Result<ImagePayload, GenerationError> {
        // credential goes in a header, never in the URL
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let mode = if reference.is_some() { "image+text" } else { "text" };
        info!("🔗 Requesting {} generation from: {}", mode, url);

        let request_body = build_request_body(prompt, reference);
        debug!("📤 Request body: {}", loggable(&request_body));

        let response = self.client
            .post(&url)
            .header(API_KEY_HEADER, credential)
            .json(&request_body)
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GenerationError::RequestFailed(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await.map_err(request_failed)?;

        parse_image_response(&response_text)
    }
}

fn request_failed(e: reqwest::Error) -> GenerationError {
    GenerationError::RequestFailed(e.without_url().to_string())
}

pub(crate) fn build_request_body(prompt: &str, reference: Option<&ImagePayload>) -> serde_json::Value {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some(image) = reference {
        parts.push(json!({
            "inlineData": {
                "data": image.to_base64(),
                "mimeType": image.mime_type,
            }
        }));
    }
    json!({
        "contents": [{
            "role": "user",
            "parts": parts
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "candidateCount": 1
        }
    })
}

/// Unwraps the first inline image in a `generateContent` response body.
pub(crate) fn parse_image_response(body: &str) -> Result<ImagePayload, GenerationError> {
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        GenerationError::RequestFailed(format!("parse error: {}: {}", e, preview))
    })?;

    if let Some(feedback) = &parsed.prompt_feedback {
        warn!("⚠️ Prompt feedback from provider: {}", feedback);
    }

    extract_first_image(&parsed).ok_or_else(|| {
        let texts: Vec<&str> = parsed.candidates.iter()
            .flat_map(|c| c.content.parts.iter())
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if !texts.is_empty() {
            info!("💬 Model answered with text only: {}", texts.join(" "));
        }
        GenerationError::NoImageProduced
    })
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(default, rename = "mimeType")]
    mime_type: String,
}

fn extract_first_image(resp: &GeminiResponse) -> Option<ImagePayload> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                if inline_data.data.is_empty() {
                    continue;
                }
                let mut image = match ImagePayload::from_base64(&inline_data.data, &inline_data.mime_type) {
                    Ok(image) => image,
                    Err(e) => {
                        error!("❌ Error extracting image data: {}", e);
                        return None;
                    }
                };
                let sniffed = image::guess_format(&image.bytes).ok();
                if image.mime_type.is_empty() {
                    image.mime_type = sniffed
                        .map(|f| f.to_mime_type().to_string())
                        .unwrap_or_else(|| "image/png".to_string());
                }
                info!(
                    "🖼️ Extracted {:?} image ({} bytes, mime type {})",
                    sniffed, image.len(), image.mime_type
                );
                return Some(image);
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn b64(bytes: &[u8]) -> String {
        ImagePayload::new(bytes.to_vec(), "image/png").to_base64()
    }

    #[test]
    fn text_only_request_has_a_single_part() {
        let body = build_request_body("draw a cat", None);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["text"], "draw a cat");
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn reference_image_is_attached_inline() {
        let reference = ImagePayload::new(vec![1, 2, 3], "image/png");
        let body = build_request_body("panel", Some(&reference));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn first_inline_image_wins() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your panel" },
                    { "inlineData": { "data": b64(&PNG_MAGIC), "mimeType": "image/png" } },
                    { "inlineData": { "data": b64(&[9, 9]), "mimeType": "image/jpeg" } }
                ]}
            }]
        });
        let image = parse_image_response(&body.to_string()).unwrap();
        assert_eq!(image.bytes.as_ref(), &PNG_MAGIC[..]);
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn missing_mime_type_is_sniffed_from_bytes() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "data": b64(&PNG_MAGIC) } }
            ]}}]
        });
        let image = parse_image_response(&body.to_string()).unwrap();
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn text_only_response_is_no_image() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't draw that" }] } }]
        });
        let err = parse_image_response(&body.to_string()).unwrap_err();
        assert!(matches!(err, GenerationError::NoImageProduced));
    }

    #[test]
    fn empty_candidates_is_no_image() {
        let err = parse_image_response(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, GenerationError::NoImageProduced));
        let err = parse_image_response("{}").unwrap_err();
        assert!(matches!(err, GenerationError::NoImageProduced));
    }

    #[test]
    fn corrupt_inline_data_is_no_image() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "data": "***not base64***", "mimeType": "image/png" } }
            ]}}]
        });
        let err = parse_image_response(&body.to_string()).unwrap_err();
        assert!(matches!(err, GenerationError::NoImageProduced));
    }

    #[test]
    fn malformed_body_is_a_request_failure() {
        let err = parse_image_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, GenerationError::RequestFailed(_)));
    }

    #[test]
    fn logged_bodies_do_not_carry_full_payloads() {
        let reference = ImagePayload::new(vec![7u8; 400], "image/png");
        let logged = loggable(&build_request_body("panel", Some(&reference)));
        assert!(logged.contains("[truncated"));
        assert!(!logged.contains(&reference.to_base64()));
    }

    #[tokio::test]
    async fn transport_errors_do_not_reveal_the_credential() {
        let client = GeminiClient::new("http://127.0.0.1:1/v1beta", "m");
        let err = client.generate("SECRET-KEY-123", "draw a cat", None).await.unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, GenerationError::RequestFailed(_)));
        assert!(!message.contains("SECRET-KEY-123"), "leaked: {message}");
        assert!(!message.contains("127.0.0.1"), "url in message: {message}");
    }
}
