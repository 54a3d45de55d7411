use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{debug, error, info};

use super::VideoSource;
use crate::error::SampleError;

/// Video metadata obtained by probing with ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProbeResult {
    width: u32,
    height: u32,
    duration: f64,
}

fn probe(path: &Path) -> Result<ProbeResult> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height:format=duration",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("failed to run ffprobe, is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        bail!("ffprobe failed: {stderr}");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result = parse_probe_output(&stdout)?;
    info!(
        width = result.width,
        height = result.height,
        duration = result.duration,
        "probe completed"
    );
    Ok(result)
}

/// Parse `key=value` lines as printed by `ffprobe -of default=noprint_wrappers=1`.
fn parse_probe_output(stdout: &str) -> Result<ProbeResult> {
    let mut width = None;
    let mut height = None;
    let mut duration = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = Some(value.parse::<u32>().context("failed to parse width")?),
            "height" => height = Some(value.parse::<u32>().context("failed to parse height")?),
            // Streams may report N/A; the container duration is what we want.
            "duration" if value != "N/A" => {
                duration = Some(value.parse::<f64>().context("failed to parse duration")?)
            }
            _ => {}
        }
    }

    let (Some(width), Some(height), Some(duration)) = (width, height, duration) else {
        error!(%stdout, "unexpected ffprobe output, expected width, height and duration");
        bail!("unexpected ffprobe output: {stdout}");
    };
    if width == 0 || height == 0 {
        bail!("invalid video dimensions: {width}x{height}");
    }
    if !duration.is_finite() || duration < 0.0 {
        bail!("invalid video duration: {duration}");
    }

    Ok(ProbeResult {
        width,
        height,
        duration,
    })
}

/// A video file rendered one still at a time through the ffmpeg CLI.
pub struct FfmpegSource {
    path: PathBuf,
    width: u32,
    height: u32,
    duration: f64,
    size: u64,
    frame_bytes: usize,
}

impl FfmpegSource {
    /// Open a video file for seeking. Fails with `SourceUnavailable` when the
    /// file is missing or ffprobe cannot read it.
    pub fn open(path: &Path) -> Result<Self, SampleError> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))
            .map_err(SampleError::unavailable)?
            .len();
        let info = probe(path).map_err(SampleError::unavailable)?;

        let frame_bytes = (info.width as usize) * (info.height as usize) * 3;
        info!(
            ?path,
            width = info.width,
            height = info.height,
            duration = info.duration,
            size,
            "video source opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width: info.width,
            height: info.height,
            duration: info.duration,
            size,
            frame_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl VideoSource for FfmpegSource {
    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn size_bytes(&self) -> Option<u64> {
        Some(self.size)
    }

    fn render_at(&mut self, timestamp_seconds: f64) -> Result<RgbImage> {
        let seek = format!("{timestamp_seconds:.3}");
        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &seek, "-i"])
            .arg(&self.path)
            .args([
                "-frames:v", "1",
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "pipe:1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("failed to run ffmpeg, is ffmpeg installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(%stderr, timestamp_seconds, "ffmpeg failed to render frame");
            bail!("ffmpeg failed at {timestamp_seconds}s: {stderr}");
        }

        let mut buf = output.stdout;
        if buf.len() < self.frame_bytes {
            error!(
                read_bytes = buf.len(),
                expected_bytes = self.frame_bytes,
                timestamp_seconds,
                "ffmpeg returned a short frame"
            );
            bail!(
                "ffmpeg returned {} of {} bytes at {timestamp_seconds}s",
                buf.len(),
                self.frame_bytes,
            );
        }
        buf.truncate(self.frame_bytes);

        debug!(timestamp_seconds, "rendered frame");

        RgbImage::from_raw(self.width, self.height, buf)
            .context("failed to create RgbImage from raw frame data")
    }
}
