use std::path::PathBuf;

use clap::{Parser, Subcommand};
use framelens_core::caption::Style;

#[derive(Parser)]
#[command(name = "framelens", about = "Sample video frames and caption them through a vision proxy")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sample a video file and caption every frame.
    Analyze {
        /// Path to the input video file (MP4, etc.).
        #[arg(short, long)]
        input: PathBuf,

        /// Frames sampled per second of video (0.1 to 10).
        #[arg(short, long, default_value_t = 1.0)]
        rate: f64,

        /// Style of the requested descriptions.
        #[arg(short, long, value_enum, default_value_t = Style::Detailed)]
        style: Style,

        /// Base URL of the captioning proxy.
        #[arg(long, default_value = "http://localhost:5000")]
        proxy_url: String,

        /// Per-frame request timeout in seconds.
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,

        /// Model label recorded in the JSON export.
        #[arg(long, default_value = "vision-proxy")]
        model_label: String,

        /// Write the JSON export here.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the CSV export here.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the plain-text captions here instead of printing them.
        #[arg(long)]
        text: Option<PathBuf>,
    },
}
