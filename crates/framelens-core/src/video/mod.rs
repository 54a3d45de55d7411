pub mod decoder;
pub mod frame;

use anyhow::Result;
use image::RgbImage;

pub use decoder::FfmpegSource;
pub use frame::Frame;

/// A seekable video whose picture can be rendered at any timestamp.
pub trait VideoSource {
    /// Total duration in seconds.
    fn duration_seconds(&self) -> f64;

    /// Size of the underlying file, if known.
    fn size_bytes(&self) -> Option<u64> {
        None
    }

    /// Render the picture shown at `timestamp_seconds`, at native resolution.
    fn render_at(&mut self, timestamp_seconds: f64) -> Result<RgbImage>;
}
