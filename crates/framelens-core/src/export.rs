//! JSON, CSV and plain-text renderings of a run's results.

use framelens_proto::data_url;
use serde::{Deserialize, Serialize};

use crate::format::format_timestamp;
use crate::pipeline::AnalysisResult;
use crate::video::Frame;

pub const CSV_HEADER: &str = "index,timestamp,timestamp_formatted,caption";

/// Caller-supplied description of the run. Credentials never go here.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportMeta {
    pub name: String,
    pub frame_rate: f64,
    pub model_used: String,
}

/// Metadata block of the JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub name: String,
    pub frames: usize,
    pub frame_rate: f64,
    pub model_used: String,
}

/// The whole JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub video_info: VideoInfo,
    pub frames: Vec<AnalysisResult>,
}

/// One entry of the JSON `frames` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub index: usize,
    pub time: f64,
    pub time_formatted: String,
    /// `data:image/jpeg;base64,...`
    pub image_data: String,
    pub prompt: String,
    pub prompt_length: usize,
}

impl From<AnalysisResult> for FrameRecord {
    fn from(result: AnalysisResult) -> Self {
        Self {
            index: result.frame.index,
            time: result.frame.timestamp_seconds,
            time_formatted: format_timestamp(result.frame.timestamp_seconds),
            image_data: data_url::encode_jpeg(&result.frame.raster),
            prompt: result.caption,
            prompt_length: result.caption_length,
        }
    }
}

impl TryFrom<FrameRecord> for AnalysisResult {
    type Error = base64::DecodeError;

    fn try_from(record: FrameRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            frame: Frame {
                index: record.index,
                timestamp_seconds: record.time,
                raster: data_url::decode(&record.image_data)?,
            },
            caption: record.prompt,
            caption_length: record.prompt_length,
        })
    }
}

/// Pretty-printed JSON document with a metadata block and every result.
pub fn to_json(results: &[AnalysisResult], meta: &ExportMeta) -> serde_json::Result<String> {
    let document = ExportDocument {
        video_info: VideoInfo {
            name: meta.name.clone(),
            frames: results.len(),
            frame_rate: meta.frame_rate,
            model_used: meta.model_used.clone(),
        },
        frames: results.to_vec(),
    };
    serde_json::to_string_pretty(&document)
}

/// Parse a document produced by [`to_json`].
pub fn from_json(text: &str) -> serde_json::Result<ExportDocument> {
    serde_json::from_str(text)
}

/// Header plus one row per result. The formatted timestamp and the caption
/// are quoted with embedded quotes doubled; nothing else is escaped.
pub fn to_csv(results: &[AnalysisResult]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for result in results {
        out.push_str(&format!(
            "{},{},\"{}\",\"{}\"\n",
            result.frame.index,
            result.frame.timestamp_seconds,
            format_timestamp(result.frame.timestamp_seconds),
            result.caption.replace('"', "\"\""),
        ));
    }
    out
}

/// `[MM:SS.cc] caption` blocks separated by a blank line.
pub fn to_prompt_text(results: &[AnalysisResult]) -> String {
    results
        .iter()
        .map(|r| format!("[{}] {}", format_timestamp(r.frame.timestamp_seconds), r.caption))
        .collect::<Vec<_>>()
        .join("\n\n")
}
