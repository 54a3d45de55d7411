//! Fixed-rate frame sampling.
//!
//! For a source of duration `D` sampled at `rate` frames per second, exactly
//! `floor(D × rate)` frames are produced, frame `i` showing the picture at
//! `i / rate` seconds. Each frame costs one seek-and-render on the source, so
//! the sequence is produced lazily and cannot be restarted.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{debug, info};

use crate::error::SampleError;
use crate::progress::{ProgressObserver, Stage};
use crate::video::{Frame, VideoSource};

/// JPEG quality used for sampled rasters.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Upper bound on the buffer reserved up front by [`FrameSampler::sample`].
const PREALLOCATE_LIMIT: usize = 1024;

/// Number of frames a source of `duration` seconds yields at `rate`, or
/// `None` when that count does not fit in a `usize`.
pub fn frame_count(duration: f64, rate: f64) -> Option<usize> {
    let count = (duration * rate).floor();
    if count.is_finite() && count >= 0.0 && count < usize::MAX as f64 {
        Some(count as usize)
    } else {
        None
    }
}

/// Samples a `VideoSource` at a fixed rate and encodes each still as JPEG.
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    jpeg_quality: u8,
}

impl FrameSampler {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Lazy form: one seek-and-render per `next()`.
    pub fn frames<'a, S>(&self, source: &'a mut S, rate: f64) -> Result<SampledFrames<'a, S>, SampleError>
    where
        S: VideoSource + ?Sized,
    {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SampleError::InvalidRate(rate));
        }

        let duration = source.duration_seconds();
        if !duration.is_finite() || duration < 0.0 {
            return Err(SampleError::SourceUnavailable(format!(
                "source reported a duration of {duration}"
            )));
        }

        let total =
            frame_count(duration, rate).ok_or(SampleError::TooManyFrames { duration, rate })?;
        info!(duration, rate, total, "sampling frames");

        Ok(SampledFrames {
            source,
            rate,
            total,
            next: 0,
            failed: false,
            jpeg_quality: self.jpeg_quality,
        })
    }

    /// Materialize every frame, notifying `observer` after each one.
    /// The first render failure aborts sampling.
    pub fn sample<S>(
        &self,
        source: &mut S,
        rate: f64,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<Frame>, SampleError>
    where
        S: VideoSource + ?Sized,
    {
        let frames = self.frames(source, rate)?;
        let total = frames.total();
        let mut out = Vec::with_capacity(total.min(PREALLOCATE_LIMIT));

        for frame in frames {
            out.push(frame?);
            observer.on_progress(Stage::Sampling, out.len(), total);
        }

        info!(frame_count = out.len(), "frame sampling complete");
        Ok(out)
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

/// Iterator over sampled frames. Fused after the first error.
pub struct SampledFrames<'a, S: ?Sized> {
    source: &'a mut S,
    rate: f64,
    total: usize,
    next: usize,
    failed: bool,
    jpeg_quality: u8,
}

impl<S: ?Sized> SampledFrames<'_, S> {
    /// Frame count this sequence will yield if nothing fails.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl<S: VideoSource + ?Sized> Iterator for SampledFrames<'_, S> {
    type Item = Result<Frame, SampleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.total {
            return None;
        }

        let index = self.next;
        let timestamp_seconds = index as f64 / self.rate;

        let raster = self
            .source
            .render_at(timestamp_seconds)
            .and_then(|image| encode_jpeg(&image, self.jpeg_quality))
            .with_context(|| format!("failed to sample frame {index} at {timestamp_seconds}s"));

        match raster {
            Ok(raster) => {
                debug!(index, timestamp_seconds, bytes = raster.len(), "sampled frame");
                self.next += 1;
                Some(Ok(Frame {
                    index,
                    timestamp_seconds,
                    raster,
                }))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(SampleError::unavailable(err)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.total - self.next))
        }
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(image)
        .context("failed to encode frame as JPEG")?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use proptest::prelude::*;

    use super::*;
    use crate::progress::NoProgress;
    use crate::video::testing::StillSource;

    #[test]
    fn samples_floor_of_duration_times_rate() {
        let mut source = StillSource::new(3.4);
        let frames = FrameSampler::default()
            .sample(&mut source, 1.0, &NoProgress)
            .unwrap();

        assert_eq!(frames.len(), 3);
        let stamps: Vec<f64> = frames.iter().map(|f| f.timestamp_seconds).collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0]);
        assert_eq!(source.rendered, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn rasters_are_jpeg() {
        let mut source = StillSource::new(1.0);
        let frames = FrameSampler::default()
            .sample(&mut source, 2.0, &NoProgress)
            .unwrap();
        for frame in &frames {
            assert_eq!(&frame.raster[..2], &[0xff, 0xd8]);
        }
    }

    #[test]
    fn reports_sampling_progress() {
        let seen = RefCell::new(Vec::new());
        let observer = |stage: Stage, done: usize, total: usize| {
            seen.borrow_mut().push((stage, done, total));
        };
        let mut source = StillSource::new(1.5);
        FrameSampler::default()
            .sample(&mut source, 2.0, &observer)
            .unwrap();

        assert_eq!(
            seen.into_inner(),
            vec![
                (Stage::Sampling, 1, 3),
                (Stage::Sampling, 2, 3),
                (Stage::Sampling, 3, 3),
            ]
        );
    }

    #[test]
    fn render_failure_aborts_sampling() {
        let mut source = StillSource::new(5.0);
        source.fail_at = Some(2);
        let err = FrameSampler::default()
            .sample(&mut source, 1.0, &NoProgress)
            .unwrap_err();

        assert!(matches!(err, SampleError::SourceUnavailable(_)));
        assert!(err.to_string().contains("frame 2"));
        assert_eq!(source.rendered.len(), 2);
    }

    #[test]
    fn lazy_sequence_is_fused_after_error() {
        let mut source = StillSource::new(5.0);
        source.fail_at = Some(0);
        let sampler = FrameSampler::default();
        let mut frames = sampler.frames(&mut source, 1.0).unwrap();

        assert!(matches!(frames.next(), Some(Err(_))));
        assert!(frames.next().is_none());
    }

    #[test]
    fn rejects_non_positive_rate() {
        let mut source = StillSource::new(5.0);
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = FrameSampler::default()
                .sample(&mut source, rate, &NoProgress)
                .unwrap_err();
            assert!(matches!(err, SampleError::InvalidRate(_)));
        }
        assert!(source.rendered.is_empty());
    }

    #[test]
    fn unrepresentable_frame_count_is_an_error() {
        let mut source = StillSource::new(1.0);
        let err = FrameSampler::default()
            .sample(&mut source, 1e300, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, SampleError::TooManyFrames { .. }));
        assert!(source.rendered.is_empty());
    }

    #[test]
    fn huge_frame_count_does_not_reserve_up_front() {
        let mut source = StillSource::new(1.0);
        source.fail_at = Some(3);
        let err = FrameSampler::default()
            .sample(&mut source, 1e15, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, SampleError::SourceUnavailable(_)));
        assert_eq!(source.rendered.len(), 3);
    }

    #[test]
    fn frame_count_bounds() {
        assert_eq!(frame_count(3.4, 1.0), Some(3));
        assert_eq!(frame_count(0.0, 10.0), Some(0));
        assert_eq!(frame_count(1.0, f64::MAX), None);
    }

    #[test]
    fn rejects_unreadable_duration() {
        let mut source = StillSource::new(f64::NAN);
        let err = FrameSampler::default()
            .sample(&mut source, 1.0, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, SampleError::SourceUnavailable(_)));
    }

    #[test]
    fn short_source_yields_nothing() {
        let mut source = StillSource::new(0.4);
        let frames = FrameSampler::default()
            .sample(&mut source, 2.0, &NoProgress)
            .unwrap();
        assert!(frames.is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn frame_indices_and_timestamps_follow_rate(
            duration in 0.0f64..12.0,
            rate in 0.1f64..10.0,
        ) {
            let mut source = StillSource::new(duration);
            let frames = FrameSampler::default()
                .sample(&mut source, rate, &NoProgress)
                .unwrap();

            prop_assert_eq!(frames.len(), (duration * rate).floor() as usize);
            for (i, frame) in frames.iter().enumerate() {
                prop_assert_eq!(frame.index, i);
                prop_assert!((frame.timestamp_seconds - i as f64 / rate).abs() < 1e-9);
                prop_assert!(frame.timestamp_seconds < duration + 1e-9);
            }
        }
    }
}
