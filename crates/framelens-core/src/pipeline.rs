use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::caption::{Captioner, Style};
use crate::error::{PipelineError, SampleError};
use crate::export::FrameRecord;
use crate::format::format_file_size;
use crate::progress::{ProgressObserver, Stage};
use crate::sampler::FrameSampler;
use crate::video::{Frame, VideoSource};

/// Sources larger than this are rejected before any work starts.
pub const MAX_SOURCE_BYTES: u64 = 500 * 1024 * 1024;
/// Slowest sampling rate accepted, in frames per second.
pub const MIN_RATE: f64 = 0.1;
/// Fastest sampling rate accepted, in frames per second.
pub const MAX_RATE: f64 = 10.0;
/// Captioning progress is logged once per this many frames.
const LOG_EVERY: usize = 10;

/// Parameters fixed for the duration of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    rate: f64,
    style: Style,
}

impl SamplingConfig {
    pub fn new(rate: f64, style: Style) -> Result<Self, SampleError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SampleError::InvalidRate(rate));
        }
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(SampleError::RateOutOfRange {
                rate,
                min: MIN_RATE,
                max: MAX_RATE,
            });
        }
        Ok(Self { rate, style })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn style(&self) -> Style {
        self.style
    }
}

/// A frame together with the caption obtained for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FrameRecord", try_from = "FrameRecord")]
pub struct AnalysisResult {
    pub frame: Frame,
    /// Never empty; a fallback is substituted when captioning fails.
    pub caption: String,
    /// Caption length in characters.
    pub caption_length: usize,
}

impl AnalysisResult {
    pub fn new(frame: Frame, caption: String) -> Self {
        let caption_length = caption.chars().count();
        Self {
            frame,
            caption,
            caption_length,
        }
    }
}

/// Everything a run reads and writes.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub frames: Vec<Frame>,
    pub results: Vec<AnalysisResult>,
    pub processing: bool,
}

/// Drives sampling then captioning, one frame in flight at a time.
///
/// Only one run may be active; a concurrent `run` is rejected with
/// `AlreadyRunning` and leaves the active run's state alone. There is no
/// retry and no mid-run cancel.
pub struct Pipeline<C> {
    captioner: C,
    sampler: FrameSampler,
    state: Mutex<PipelineState>,
}

impl<C: Captioner> Pipeline<C> {
    pub fn new(captioner: C) -> Self {
        Self::with_sampler(captioner, FrameSampler::default())
    }

    pub fn with_sampler(captioner: C, sampler: FrameSampler) -> Self {
        Self {
            captioner,
            sampler,
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Sample every frame of `source`, then caption them in index order.
    pub fn run<S>(
        &self,
        source: &mut S,
        config: &SamplingConfig,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<AnalysisResult>, PipelineError>
    where
        S: VideoSource + ?Sized,
    {
        if let Some(size) = source.size_bytes() {
            if size > MAX_SOURCE_BYTES {
                warn!(size = %format_file_size(size), "source exceeds the size limit");
                return Err(PipelineError::SourceTooLarge {
                    size,
                    limit: MAX_SOURCE_BYTES,
                });
            }
            info!(size = %format_file_size(size), "source accepted");
        }

        let _run = self.begin()?;
        info!(rate = config.rate(), style = %config.style(), "pipeline starting");

        let frames = self.sampler.sample(source, config.rate(), observer)?;
        let total = frames.len();
        self.lock().frames = frames;

        info!(total, "captioning frames");
        for i in 0..total {
            let Some(frame) = self.lock().frames.get(i).cloned() else {
                break;
            };

            let caption = self
                .captioner
                .caption(&frame.raster, config.style(), frame.index);
            self.lock().results.push(AnalysisResult::new(frame, caption));

            observer.on_progress(Stage::Captioning, i + 1, total);
            if i % LOG_EVERY == 0 || i + 1 == total {
                info!(done = i + 1, total, "captioned frames");
            }
        }

        let results = self.lock().results.clone();
        info!(result_count = results.len(), "pipeline complete");
        Ok(results)
    }

    /// Snapshot of the results gathered so far.
    pub fn results(&self) -> Vec<AnalysisResult> {
        self.lock().results.clone()
    }

    /// Number of frames sampled by the current or last run.
    pub fn frame_count(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_running(&self) -> bool {
        self.lock().processing
    }

    /// Drop stored frames and results. Refused while a run is active.
    pub fn reset(&self) -> Result<(), PipelineError> {
        let mut state = self.lock();
        if state.processing {
            return Err(PipelineError::AlreadyRunning);
        }
        state.frames.clear();
        state.results.clear();
        info!("pipeline reset");
        Ok(())
    }

    fn begin(&self) -> Result<RunGuard<'_>, PipelineError> {
        let mut state = self.lock();
        if state.processing {
            warn!("rejecting run, another run is in progress");
            return Err(PipelineError::AlreadyRunning);
        }
        state.processing = true;
        state.frames.clear();
        state.results.clear();
        Ok(RunGuard { state: &self.state })
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the processing flag when a run ends, however it ends.
struct RunGuard<'a> {
    state: &'a Mutex<PipelineState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .processing = false;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::mpsc;

    use super::*;
    use crate::caption::{fallback_caption, CaptionClient, FrameAnalyzer};
    use crate::error::CaptionError;
    use crate::progress::NoProgress;
    use crate::video::testing::StillSource;
    use framelens_proto::proto::{AnalyzeFrameRequest, AnalyzeFrameResponse};

    struct Unreachable;

    impl FrameAnalyzer for Unreachable {
        fn analyze(&self, _: &AnalyzeFrameRequest) -> Result<AnalyzeFrameResponse, CaptionError> {
            Err(CaptionError::Timeout)
        }
    }

    struct Echo;

    impl Captioner for Echo {
        fn caption(&self, raster: &[u8], style: Style, frame_index: usize) -> String {
            format!("{style} frame {frame_index} ({} bytes)", raster.len())
        }
    }

    /// Blocks inside each caption call until the test releases it.
    struct Gated {
        entered: Mutex<mpsc::Sender<usize>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl Captioner for Gated {
        fn caption(&self, _: &[u8], _: Style, frame_index: usize) -> String {
            self.entered.lock().unwrap().send(frame_index).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            format!("caption {frame_index}")
        }
    }

    fn config(rate: f64) -> SamplingConfig {
        SamplingConfig::new(rate, Style::Detailed).unwrap()
    }

    #[test]
    fn all_failed_captions_fall_back_per_frame() {
        let pipeline = Pipeline::new(CaptionClient::new(Unreachable));
        let mut source = StillSource::new(3.4);
        let results = pipeline.run(&mut source, &config(1.0), &NoProgress).unwrap();

        let stamps: Vec<f64> = results.iter().map(|r| r.frame.timestamp_seconds).collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0]);
        let captions: Vec<&str> = results.iter().map(|r| r.caption.as_str()).collect();
        assert_eq!(
            captions,
            vec![
                "analysis unavailable for frame 1",
                "analysis unavailable for frame 2",
                "analysis unavailable for frame 3",
            ]
        );
        assert!(!pipeline.is_running());
    }

    #[test]
    fn results_follow_frame_order() {
        let pipeline = Pipeline::new(Echo);
        let mut source = StillSource::new(2.0);
        let results = pipeline.run(&mut source, &config(2.0), &NoProgress).unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(pipeline.frame_count(), 4);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.frame.index, i);
            assert!(result.caption.starts_with(&format!("detailed frame {i}")));
            assert_eq!(result.caption_length, result.caption.chars().count());
        }
        assert_eq!(pipeline.results(), results);
    }

    #[test]
    fn reports_both_stages() {
        let seen = RefCell::new(Vec::new());
        let observer = |stage: Stage, done: usize, total: usize| {
            seen.borrow_mut().push((stage, done, total));
        };
        let pipeline = Pipeline::new(Echo);
        let mut source = StillSource::new(2.0);
        pipeline.run(&mut source, &config(1.0), &observer).unwrap();

        assert_eq!(
            seen.into_inner(),
            vec![
                (Stage::Sampling, 1, 2),
                (Stage::Sampling, 2, 2),
                (Stage::Captioning, 1, 2),
                (Stage::Captioning, 2, 2),
            ]
        );
    }

    #[test]
    fn second_run_is_rejected_while_first_is_active() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let pipeline = Pipeline::new(Gated {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });

        std::thread::scope(|s| {
            let first = s.spawn(|| {
                let mut source = StillSource::new(2.0);
                pipeline.run(&mut source, &config(1.0), &NoProgress)
            });

            assert_eq!(entered_rx.recv().unwrap(), 0);
            assert!(pipeline.is_running());

            let mut other = StillSource::new(9.0);
            let err = pipeline
                .run(&mut other, &config(1.0), &NoProgress)
                .unwrap_err();
            assert!(matches!(err, PipelineError::AlreadyRunning));
            assert!(other.rendered.is_empty());
            assert!(matches!(pipeline.reset(), Err(PipelineError::AlreadyRunning)));
            assert_eq!(pipeline.frame_count(), 2);

            release_tx.send(()).unwrap();
            assert_eq!(entered_rx.recv().unwrap(), 1);
            release_tx.send(()).unwrap();

            let results = first.join().unwrap().unwrap();
            let captions: Vec<&str> = results.iter().map(|r| r.caption.as_str()).collect();
            assert_eq!(captions, vec!["caption 0", "caption 1"]);
        });

        assert!(!pipeline.is_running());
        assert_eq!(pipeline.results().len(), 2);
    }

    #[test]
    fn sampling_failure_aborts_and_clears_flag() {
        let pipeline = Pipeline::new(Echo);
        let mut source = StillSource::new(4.0);
        source.fail_at = Some(1);

        let err = pipeline.run(&mut source, &config(1.0), &NoProgress).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Sample(SampleError::SourceUnavailable(_))
        ));
        assert!(!pipeline.is_running());
        assert!(pipeline.results().is_empty());
    }

    #[test]
    fn oversized_source_is_rejected_up_front() {
        let pipeline = Pipeline::new(Echo);
        let mut source = StillSource::new(4.0);
        source.size = Some(MAX_SOURCE_BYTES + 1);

        let err = pipeline.run(&mut source, &config(1.0), &NoProgress).unwrap_err();
        assert!(matches!(err, PipelineError::SourceTooLarge { .. }));
        assert!(source.rendered.is_empty());
    }

    #[test]
    fn new_run_replaces_previous_results_and_reset_clears() {
        let pipeline = Pipeline::new(Echo);
        pipeline
            .run(&mut StillSource::new(3.0), &config(1.0), &NoProgress)
            .unwrap();
        assert_eq!(pipeline.results().len(), 3);

        pipeline
            .run(&mut StillSource::new(1.0), &config(1.0), &NoProgress)
            .unwrap();
        assert_eq!(pipeline.results().len(), 1);

        pipeline.reset().unwrap();
        assert!(pipeline.results().is_empty());
        assert_eq!(pipeline.frame_count(), 0);
    }

    #[test]
    fn sampling_config_enforces_bounds() {
        assert!(SamplingConfig::new(1.0, Style::Concise).is_ok());
        assert!(SamplingConfig::new(MIN_RATE, Style::Concise).is_ok());
        assert!(SamplingConfig::new(MAX_RATE, Style::Concise).is_ok());
        assert!(matches!(
            SamplingConfig::new(0.0, Style::Concise),
            Err(SampleError::InvalidRate(_))
        ));
        assert!(matches!(
            SamplingConfig::new(30.0, Style::Concise),
            Err(SampleError::RateOutOfRange { .. })
        ));
    }

    #[test]
    fn fallback_is_never_empty() {
        let result = AnalysisResult::new(
            Frame {
                index: 0,
                timestamp_seconds: 0.0,
                raster: Vec::new(),
            },
            fallback_caption(0),
        );
        assert!(result.caption_length > 0);
    }
}
