use std::fmt;

use tracing::debug;

/// Which half of a run a progress notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sampling,
    Captioning,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Sampling => write!(f, "sampling"),
            Stage::Captioning => write!(f, "captioning"),
        }
    }
}

/// Receives `done / total` notifications while a run advances.
pub trait ProgressObserver {
    fn on_progress(&self, stage: Stage, done: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(Stage, usize, usize),
{
    fn on_progress(&self, stage: Stage, done: usize, total: usize) {
        self(stage, done, total)
    }
}

/// Emits each notification as a debug event with a percentage.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, stage: Stage, done: usize, total: usize) {
        debug!(%stage, done, total, percent = percent(done, total), "progress");
    }
}

/// Discards notifications.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _stage: Stage, _done: usize, _total: usize) {}
}

/// Whole percent complete, floored.
pub fn percent(done: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        done * 100 / total
    }
}
