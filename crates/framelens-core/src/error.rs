use thiserror::Error;

/// Failures that abort frame sampling.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("sampling rate must be a positive, finite number, got {0}")]
    InvalidRate(f64),
    #[error("sampling rate {rate} is outside {min}..={max} frames per second")]
    RateOutOfRange { rate: f64, min: f64, max: f64 },
    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("{duration}s at {rate} frames per second is too many frames to sample")]
    TooManyFrames { duration: f64, rate: f64 },
}

impl SampleError {
    pub(crate) fn unavailable(err: anyhow::Error) -> Self {
        Self::SourceUnavailable(format!("{err:#}"))
    }
}

/// Failures of a single captioning request. Never surfaced past the
/// caption client; each one turns into a fallback caption.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption request timed out")]
    Timeout,
    #[error("caption transport failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("caption response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("proxy rejected the frame: {0}")]
    Rejected(String),
    #[error("proxy returned an empty caption")]
    Empty,
}

impl From<reqwest::Error> for CaptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err)
        } else {
            Self::Transport(err)
        }
    }
}

/// Failures that abort a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a pipeline run is already in progress")]
    AlreadyRunning,
    #[error("source is {size} bytes, over the {limit} byte limit")]
    SourceTooLarge { size: u64, limit: u64 },
    #[error(transparent)]
    Sample(#[from] SampleError),
}
