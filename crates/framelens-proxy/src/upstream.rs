use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::extract::ResponsesBody;

/// Text-only request used by the connectivity check.
pub const PROBE_INSTRUCTION: &str = "Hello, please introduce yourself in one sentence.";

/// Captioning instruction for a style label; blank labels mean `detailed`.
pub fn instruction(style: &str) -> String {
    let style = match style.trim() {
        "" => "detailed",
        s => s,
    };
    format!(
        "Describe in detail, in a {style} style, the scene, objects, colors, lighting and composition of this image."
    )
}

/// `req_<unix millis>_<16 hex chars>`, fresh per call.
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("req_{millis}_{:016x}", rand::random::<u64>())
}

#[derive(Debug, Serialize)]
pub struct ResponsesRequest<'a> {
    pub model: &'a str,
    pub input: Vec<InputMessage>,
}

#[derive(Debug, Serialize)]
pub struct InputMessage {
    pub role: &'static str,
    pub content: Vec<InputContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputImage { image_url: String },
    InputText { text: String },
}

impl<'a> ResponsesRequest<'a> {
    /// One user turn carrying a JPEG and the style instruction.
    pub fn for_image(model: &'a str, image_base64: &str, style: &str) -> Self {
        Self::user(
            model,
            vec![
                InputContent::InputImage {
                    image_url: format!("data:image/jpeg;base64,{image_base64}"),
                },
                InputContent::InputText {
                    text: instruction(style),
                },
            ],
        )
    }

    pub fn text_only(model: &'a str, text: &str) -> Self {
        Self::user(
            model,
            vec![InputContent::InputText {
                text: text.to_string(),
            }],
        )
    }

    fn user(model: &'a str, content: Vec<InputContent>) -> Self {
        Self {
            model,
            input: vec![InputMessage {
                role: "user",
                content,
            }],
        }
    }
}

/// Client for the upstream `/responses` endpoint.
pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, ProxyError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ProxyError::Transport)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Ask the model to describe one base64 JPEG.
    pub async fn describe(&self, image_base64: &str, style: &str) -> Result<ResponsesBody, ProxyError> {
        let request = ResponsesRequest::for_image(&self.config.model, image_base64, style);
        self.send(&request).await
    }

    /// Text-only round trip proving the credentials and model work.
    pub async fn probe(&self) -> Result<ResponsesBody, ProxyError> {
        let request = ResponsesRequest::text_only(&self.config.model, PROBE_INSTRUCTION);
        self.send(&request).await
    }

    async fn send(&self, request: &ResponsesRequest<'_>) -> Result<ResponsesBody, ProxyError> {
        let request_id = generate_request_id();
        let url = self.config.responses_url();
        info!(%url, model = %self.config.model, %request_id, "forwarding to upstream");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("X-Request-Id", &request_id)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = error_message(&bytes);
            warn!(status = status.as_u16(), %request_id, ?message, "upstream rejected request");
            return Err(ProxyError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: ResponsesBody = serde_json::from_slice(&bytes)?;
        debug!(%request_id, upstream_id = ?body.id, items = body.output.len(), "upstream replied");
        Ok(body)
    }
}

/// `message` or `error.message` from an upstream error body, if any.
fn error_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    value
        .get("message")
        .or_else(|| value.pointer("/error/message"))
        .and_then(|m| m.as_str())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_id_shape() {
        let id = generate_request_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "req");
        assert!(parts[1].parse::<u128>().is_ok());
        assert_eq!(parts[2].len(), 16);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_request_id());
    }

    #[test]
    fn image_request_body() {
        let request = ResponsesRequest::for_image("vision-1", "QUJD", "cinematic");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "vision-1",
                "input": [{
                    "role": "user",
                    "content": [
                        {"type": "input_image", "image_url": "data:image/jpeg;base64,QUJD"},
                        {"type": "input_text", "text": instruction("cinematic")}
                    ]
                }]
            })
        );
    }

    #[test]
    fn instruction_names_style() {
        assert!(instruction("artistic").contains("in a artistic style"));
        assert_eq!(instruction(""), instruction("detailed"));
        assert_eq!(instruction("  "), instruction("detailed"));
    }

    #[test]
    fn text_only_request_body() {
        let value = serde_json::to_value(ResponsesRequest::text_only("m", "hi")).unwrap();
        assert_eq!(value["input"][0]["content"], json!([{"type": "input_text", "text": "hi"}]));
    }

    #[test]
    fn error_message_lookup() {
        assert_eq!(error_message(br#"{"message":"quota exceeded"}"#).as_deref(), Some("quota exceeded"));
        assert_eq!(
            error_message(br#"{"error":{"code":"AuthenticationError","message":"bad key"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(error_message(b"<html>502</html>"), None);
        assert_eq!(error_message(br#"{"error":"x"}"#), None);
    }
}
