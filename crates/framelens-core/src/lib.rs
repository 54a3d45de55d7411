pub mod caption;
pub mod error;
pub mod export;
pub mod format;
pub mod pipeline;
pub mod progress;
pub mod sampler;
pub mod video;
