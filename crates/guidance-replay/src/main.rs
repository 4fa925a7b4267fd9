//! Depth Guidance Replay - Main Entry Point
//!
//! Usage: `guidance-replay <config|-> <frames.json>`

use guidance_pipeline::{GuidancePipeline, PipelineConfig};
use guidance_replay::{init_logging, load_recording, replay};
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    info!("=== Depth Guidance Replay v{} ===", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, frames_path] = args.as_slice() else {
        return Err("usage: guidance-replay <config|-> <frames.json>".into());
    };

    // "-" runs on defaults plus environment overrides
    let config_path = (config_path != "-").then(|| Path::new(config_path));
    let config = PipelineConfig::load(config_path)?;
    let frames = load_recording(Path::new(frames_path))?;
    info!("Loaded {} recorded frame(s)", frames.len());

    let pipeline = GuidancePipeline::new(config)?;
    let stdout = std::io::stdout();
    replay(pipeline, &frames, &mut stdout.lock()).await?;

    Ok(())
}
