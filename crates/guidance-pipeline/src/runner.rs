//! Async guidance runner
//!
//! Frames go into a latest-wins slot: a frame submitted while another is
//! still being processed replaces any frame waiting in the slot, so the
//! runner always works on the newest data and never queues. Sampling and
//! estimation run on the blocking pool; control commands keep being handled
//! meanwhile, and the generation check in `commit` drops results they made
//! stale.

use depth_frame::{RegionOfInterest, SharedDepthFrame};
use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::pipeline::{FrameReport, GuidancePipeline};
use crate::target::Detection;
use crate::PipelineError;

/// Control command for a running session
#[derive(Debug, Clone)]
pub enum Command {
    /// Redefine the focus box
    SetFocusBox(RegionOfInterest),
    /// Mute a spoken alert category until its hazard clears
    Acknowledge(String),
    /// End the session and shut the runner down
    Stop,
}

#[derive(Debug, Clone)]
struct Submission {
    index: u64,
    frame: SharedDepthFrame,
    detections: Vec<Detection>,
}

/// Producer side of a running session
#[derive(Debug)]
pub struct GuidanceHandle {
    frames: watch::Sender<Option<Submission>>,
    commands: mpsc::Sender<Command>,
    submitted: AtomicU64,
}

impl GuidanceHandle {
    /// Offer a frame; replaces any frame not yet picked up
    pub fn submit(&self, frame: SharedDepthFrame, detections: Vec<Detection>) -> Result<(), PipelineError> {
        let index = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        self.frames
            .send(Some(Submission {
                index,
                frame,
                detections,
            }))
            .map_err(|_| PipelineError::Closed)
    }

    pub async fn set_focus_box(&self, region: RegionOfInterest) -> Result<(), PipelineError> {
        region.validate()?;
        self.send(Command::SetFocusBox(region)).await
    }

    /// Acknowledge a spoken alert by its `SpeechRequest::category`
    pub async fn acknowledge(&self, category: impl Into<String>) -> Result<(), PipelineError> {
        self.send(Command::Acknowledge(category.into())).await
    }

    pub async fn stop(&self) -> Result<(), PipelineError> {
        self.send(Command::Stop).await
    }

    async fn send(&self, command: Command) -> Result<(), PipelineError> {
        self.commands.send(command).await.map_err(|_| PipelineError::Closed)
    }
}

/// Consumer side: owns the pipeline and processes frames
pub struct GuidanceRunner {
    pipeline: GuidancePipeline,
    frames: watch::Receiver<Option<Submission>>,
    commands: mpsc::Receiver<Command>,
    reports: mpsc::Sender<FrameReport>,
    last_index: u64,
    stopped: bool,
}

impl GuidanceRunner {
    /// Create a handle, a runner and the report stream
    pub fn channel(pipeline: GuidancePipeline) -> (GuidanceHandle, Self, mpsc::Receiver<FrameReport>) {
        let capacity = pipeline.config().report_capacity;
        let (frame_tx, frame_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::channel(8);
        let (report_tx, report_rx) = mpsc::channel(capacity);

        let handle = GuidanceHandle {
            frames: frame_tx,
            commands: command_tx,
            submitted: AtomicU64::new(0),
        };
        let runner = Self {
            pipeline,
            frames: frame_rx,
            commands: command_rx,
            reports: report_tx,
            last_index: 0,
            stopped: false,
        };
        (handle, runner, report_rx)
    }

    /// Spawn the runner on the current tokio runtime
    pub fn spawn(
        pipeline: GuidancePipeline,
    ) -> (GuidanceHandle, mpsc::Receiver<FrameReport>, JoinHandle<Result<GuidancePipeline, PipelineError>>) {
        let (handle, runner, reports) = Self::channel(pipeline);
        (handle, reports, tokio::spawn(runner.run()))
    }

    /// Run until stopped or every handle is dropped; returns the pipeline
    pub async fn run(mut self) -> Result<GuidancePipeline, PipelineError> {
        info!("Starting guidance runner");

        while !self.stopped {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                changed = self.frames.changed() => {
                    if changed.is_err() {
                        debug!("Frame slot closed");
                        break;
                    }
                    let submission = self.frames.borrow_and_update().clone();
                    if let Some(submission) = submission {
                        self.process(submission).await?;
                    }
                }
            }
        }

        info!("Guidance runner stopped");
        Ok(self.pipeline)
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SetFocusBox(region) => {
                // Validated by the handle
                if let Err(e) = self.pipeline.set_focus_box(region) {
                    debug!("Focus box rejected: {}", e);
                }
            }
            Command::Acknowledge(category) => {
                if !self.pipeline.acknowledge(&category) {
                    debug!("Nothing to acknowledge for {}", category);
                }
            }
            Command::Stop => {
                self.pipeline.stop();
                self.stopped = true;
            }
        }
    }

    async fn process(&mut self, submission: Submission) -> Result<(), PipelineError> {
        let dropped = submission.index.saturating_sub(self.last_index + 1);
        if dropped > 0 {
            debug!("Dropped {} superseded frame(s)", dropped);
            counter!("guidance_frames_dropped_total").increment(dropped);
        }
        self.last_index = submission.index;

        // The plan holds the frame; its lease is taken on the blocking pool
        let plan = self.pipeline.prepare(&submission.frame, submission.detections);
        let mut task = tokio::task::spawn_blocking(move || plan.estimate());

        let estimates = loop {
            tokio::select! {
                biased;
                result = &mut task => break result?,
                Some(command) = self.commands.recv() => self.apply(command),
            }
        };

        let report = self.pipeline.commit(estimates);
        if self.stopped {
            return Ok(());
        }
        if self.reports.send(report).await.is_err() {
            debug!("Report receiver dropped");
            self.stopped = true;
        }
        Ok(())
    }
}
