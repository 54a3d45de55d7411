mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use framelens_core::caption::CaptionClient;
use framelens_core::export::{self, ExportMeta};
use framelens_core::pipeline::{Pipeline, SamplingConfig};
use framelens_core::progress::LogProgress;
use framelens_core::video::FfmpegSource;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Analyze {
            input,
            rate,
            style,
            proxy_url,
            timeout_secs,
            model_label,
            json,
            csv,
            text,
        } => {
            info!(?input, rate, %style, %proxy_url, "starting analysis");

            let config = SamplingConfig::new(rate, style).context("invalid sampling settings")?;
            let mut source = FfmpegSource::open(&input).context("failed to open video")?;
            let client = CaptionClient::connect(&proxy_url, Duration::from_secs(timeout_secs))
                .context("failed to build caption client")?;
            let pipeline = Pipeline::new(client);

            let results = pipeline
                .run(&mut source, &config, &LogProgress)
                .context("pipeline failed")?;

            if results.is_empty() {
                warn!("no frames were analyzed, nothing to export");
                return Ok(());
            }

            let meta = ExportMeta {
                name: input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string()),
                frame_rate: rate,
                model_used: model_label,
            };

            if let Some(path) = json {
                let body = export::to_json(&results, &meta).context("failed to encode JSON export")?;
                write_output(&path, &body)?;
            }
            if let Some(path) = csv {
                write_output(&path, &export::to_csv(&results))?;
            }
            let prompts = export::to_prompt_text(&results);
            match text {
                Some(path) => write_output(&path, &prompts)?,
                None => println!("{prompts}"),
            }

            info!(result_count = results.len(), "analysis complete");
            Ok(())
        }
    }
}

/// Write one export file, creating its parent directory if needed.
fn write_output(output: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("failed to create output directory")?;
    }

    std::fs::write(output, contents)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(?output, bytes = contents.len(), "export written");
    Ok(())
}
