use serde::{Deserialize, Deserializer, Serialize};

/// Route the proxy serves frame analysis on.
pub const ANALYZE_FRAME_PATH: &str = "/api/analyze-frame";

/// One frame sent from the client to the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeFrameRequest {
    /// Base64 JPEG, without a data-URL prefix.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_data: String,
    /// Style label folded into the captioning instruction.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt_style: String,
    /// Echoed back for correlation.
    #[serde(default)]
    pub frame_index: Option<u64>,
}

/// `null` reads the same as an absent field.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Proxy reply for a single frame, both on success (HTTP 200) and on
/// upstream failure (HTTP 500).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeFrameResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AnalyzeFrameResponse {
    pub fn succeeded(
        prompt: String,
        model: String,
        frame_index: Option<u64>,
        request_id: String,
    ) -> Self {
        Self {
            success: true,
            prompt: Some(prompt),
            model: Some(model),
            frame_index,
            request_id: Some(request_id),
            ..Default::default()
        }
    }

    pub fn failed(error: String, detail: Option<String>, frame_index: Option<u64>) -> Self {
        Self {
            success: false,
            error: Some(error),
            detail,
            frame_index,
            ..Default::default()
        }
    }
}

/// Body of an HTTP 400 reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
