//! Depth Guidance Replay
//!
//! Feeds recorded frames through the async guidance runner and writes one
//! JSON frame report per line.

use depth_frame::{DepthFrameError, OwnedConfidenceMap, OwnedDepthMap, Origin, RegionOfInterest, SharedDepthFrame};
use guidance_pipeline::{Detection, GuidancePipeline, GuidanceRunner, PipelineError};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Replay error types
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed recording: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid frame: {0}")]
    Frame(#[from] DepthFrameError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Normalized box as recorded; the origin falls back to the configured one
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub origin: Option<Origin>,
}

impl RecordedBox {
    pub fn to_region(&self, default_origin: Origin) -> Result<RegionOfInterest, DepthFrameError> {
        RegionOfInterest::new(
            self.x,
            self.y,
            self.width,
            self.height,
            self.origin.unwrap_or(default_origin),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: RecordedBox,
}

/// One recorded sensor frame
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedFrame {
    pub width: usize,
    pub height: usize,
    pub timestamp_ns: u64,
    /// Row-major depths in meters, `width * height` values
    pub depth: Vec<f32>,
    /// Row-major confidence bytes, when the sensor produced them
    #[serde(default)]
    pub confidence: Option<Vec<u8>>,
    #[serde(default)]
    pub detections: Vec<RecordedDetection>,
    /// Focus box change applied before this frame
    #[serde(default)]
    pub focus_box: Option<RecordedBox>,
}

impl RecordedFrame {
    /// Build the shared frame the pipeline reads
    pub fn to_shared(&self, sequence: u64) -> Result<SharedDepthFrame, DepthFrameError> {
        let depth = OwnedDepthMap::from_depths(self.width, self.height, &self.depth, 0)?;
        let confidence = match &self.confidence {
            Some(bytes) => Some(OwnedConfidenceMap::new(bytes.clone(), self.width, self.height, self.width)?),
            None => None,
        };
        SharedDepthFrame::new(depth, confidence, self.timestamp_ns, sequence)
    }

    pub fn detections(&self, origin: Origin) -> Result<Vec<Detection>, DepthFrameError> {
        self.detections
            .iter()
            .map(|d| {
                Ok(Detection {
                    label: d.label.clone(),
                    confidence: d.confidence,
                    bbox: d.bbox.to_region(origin)?,
                })
            })
            .collect()
    }
}

/// Parse a JSON list of recorded frames
pub fn parse_recording(json: &str) -> Result<Vec<RecordedFrame>, ReplayError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_recording(path: &Path) -> Result<Vec<RecordedFrame>, ReplayError> {
    let json = std::fs::read_to_string(path)?;
    parse_recording(&json)
}

/// Replay `frames` one at a time, writing each report as a JSON line
///
/// Each frame waits for its report before the next is submitted, so no
/// frame is superseded. Returns the number of reports written.
pub async fn replay<W: Write>(
    pipeline: GuidancePipeline,
    frames: &[RecordedFrame],
    out: &mut W,
) -> Result<usize, ReplayError> {
    let origin = pipeline.config().origin;
    let (handle, mut reports, join) = GuidanceRunner::spawn(pipeline);

    let mut written = 0;
    for (index, recorded) in frames.iter().enumerate() {
        if let Some(focus) = &recorded.focus_box {
            handle.set_focus_box(focus.to_region(origin)?).await?;
        }
        let frame = recorded.to_shared(index as u64 + 1)?;
        handle.submit(frame, recorded.detections(origin)?)?;

        let report = reports.recv().await.ok_or(PipelineError::Closed)?;
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
        written += 1;
    }

    handle.stop().await?;
    join.await.map_err(PipelineError::from)??;
    info!("Replayed {} frame(s)", written);
    Ok(written)
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the level
pub fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidance_pipeline::{FrameReport, PipelineConfig, TargetKey};

    fn recording(frames: usize, depth: f32) -> String {
        let values = vec![depth; 32 * 24];
        let frame = serde_json::json!({
            "width": 32,
            "height": 24,
            "timestamp_ns": 1000,
            "depth": values,
            "detections": [
                { "label": "door", "confidence": 0.8,
                  "bbox": { "x": 0.1, "y": 0.1, "width": 0.3, "height": 0.5 } }
            ]
        });
        serde_json::to_string(&vec![frame; frames]).unwrap()
    }

    #[test]
    fn test_parse_recording() {
        let frames = parse_recording(&recording(2, 1.5)).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].confidence.is_none());
        assert!(frames[0].focus_box.is_none());

        let detections = frames[0].detections(Origin::BottomLeft).unwrap();
        assert_eq!(detections[0].bbox.origin, Origin::BottomLeft);
    }

    #[test]
    fn test_mismatched_depth_rejected() {
        let mut frames = parse_recording(&recording(1, 1.5)).unwrap();
        frames[0].depth.pop();
        assert!(frames[0].to_shared(1).is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_recording("{"), Err(ReplayError::Json(_))));
    }

    #[tokio::test]
    async fn test_replay_writes_one_line_per_frame() {
        let frames = parse_recording(&recording(3, 2.5)).unwrap();
        let pipeline = GuidancePipeline::new(PipelineConfig::default()).unwrap();

        let mut out = Vec::new();
        let written = replay(pipeline, &frames, &mut out).await.unwrap();
        assert_eq!(written, 3);

        let text = String::from_utf8(out).unwrap();
        let reports: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2]["sequence"], 3);

        let last: FrameReport = serde_json::from_value(reports[2].clone()).unwrap();
        let door = last
            .targets
            .iter()
            .find(|t| t.key == TargetKey::Track(1))
            .unwrap();
        assert_eq!(door.smoothed, Some(2.5));
    }
}
