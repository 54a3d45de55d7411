use std::fmt;
use std::time::Duration;

use clap::ValueEnum;
use framelens_proto::data_url;
use framelens_proto::proto::{AnalyzeFrameRequest, AnalyzeFrameResponse, ANALYZE_FRAME_PATH};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CaptionError;

/// Upper bound on a single captioning round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Style label folded into the captioning instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Detailed,
    Cinematic,
    Artistic,
    Concise,
}

impl Style {
    pub fn label(self) -> &'static str {
        match self {
            Style::Detailed => "detailed",
            Style::Cinematic => "cinematic",
            Style::Artistic => "artistic",
            Style::Concise => "concise",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caption substituted when a frame could not be analyzed.
/// Frames are numbered from 1 here.
pub fn fallback_caption(frame_index: usize) -> String {
    format!("analysis unavailable for frame {}", frame_index + 1)
}

/// Transport seam between the caption client and the proxy.
pub trait FrameAnalyzer {
    fn analyze(&self, request: &AnalyzeFrameRequest) -> Result<AnalyzeFrameResponse, CaptionError>;
}

/// Anything that turns a raster into caption text without failing.
pub trait Captioner {
    fn caption(&self, raster: &[u8], style: Style, frame_index: usize) -> String;
}

/// Posts frames to the proxy's analyze endpoint over blocking HTTP.
pub struct HttpAnalyzer {
    client: Client,
    url: String,
}

impl HttpAnalyzer {
    pub fn new(proxy_url: &str, timeout: Duration) -> Result<Self, CaptionError> {
        let client = Client::builder().timeout(timeout).build()?;
        let url = format!("{}{}", proxy_url.trim_end_matches('/'), ANALYZE_FRAME_PATH);
        info!(%url, ?timeout, "caption transport ready");
        Ok(Self { client, url })
    }
}

impl FrameAnalyzer for HttpAnalyzer {
    fn analyze(&self, request: &AnalyzeFrameRequest) -> Result<AnalyzeFrameResponse, CaptionError> {
        let response = self.client.post(&self.url).json(request).send()?;
        let status = response.status();
        let body: AnalyzeFrameResponse = response.json()?;

        if !status.is_success() || !body.success {
            let reason = body.error.unwrap_or_else(|| status.to_string());
            return Err(CaptionError::Rejected(reason));
        }
        Ok(body)
    }
}

/// One-frame-at-a-time caption requests with a deterministic fallback.
pub struct CaptionClient<A = HttpAnalyzer> {
    analyzer: A,
}

impl CaptionClient<HttpAnalyzer> {
    /// Client for a proxy at `proxy_url`, e.g. `http://localhost:5000`.
    pub fn connect(proxy_url: &str, timeout: Duration) -> Result<Self, CaptionError> {
        Ok(Self::new(HttpAnalyzer::new(proxy_url, timeout)?))
    }
}

impl<A: FrameAnalyzer> CaptionClient<A> {
    pub fn new(analyzer: A) -> Self {
        Self { analyzer }
    }

    /// Caption an image given as base64 or as a `data:image/...` URL.
    pub fn caption_encoded(&self, image: &str, style: Style, frame_index: usize) -> String {
        match self.request(image, style, frame_index) {
            Ok(caption) => caption,
            Err(err) => {
                warn!(frame = frame_index + 1, error = %err, "caption request failed, using fallback");
                fallback_caption(frame_index)
            }
        }
    }

    fn request(&self, image: &str, style: Style, frame_index: usize) -> Result<String, CaptionError> {
        let request = AnalyzeFrameRequest {
            image_data: data_url::strip_prefix(image).to_owned(),
            prompt_style: style.label().to_owned(),
            frame_index: Some(frame_index as u64),
        };

        let response = self.analyzer.analyze(&request)?;
        match response.prompt {
            Some(prompt) if !prompt.trim().is_empty() => {
                info!(
                    frame = frame_index + 1,
                    model = response.model.as_deref().unwrap_or("unknown"),
                    "caption received"
                );
                Ok(prompt)
            }
            _ => Err(CaptionError::Empty),
        }
    }
}

impl<A: FrameAnalyzer> Captioner for CaptionClient<A> {
    fn caption(&self, raster: &[u8], style: Style, frame_index: usize) -> String {
        self.caption_encoded(&data_url::encode_jpeg(raster), style, frame_index)
    }
}
