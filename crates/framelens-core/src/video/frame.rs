/// A single sampled still from the source video.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the sampled sequence (0-based, contiguous).
    pub index: usize,
    /// Elapsed seconds from the start of the source, `index / rate`.
    pub timestamp_seconds: f64,
    /// JPEG-encoded picture at the source's native resolution.
    pub raster: Vec<u8>,
}
