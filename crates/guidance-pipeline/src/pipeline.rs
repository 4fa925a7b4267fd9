//! Frame processing
//!
//! A frame goes through three steps:
//! 1. `prepare`: identity matching and generation tickets. Cheap, and the
//!    only step that touches session state besides `commit`.
//! 2. `FramePlan::estimate`: sampling of every region under one lease of
//!    the frame, then robust estimation. Owns everything it needs, so it can
//!    run on another thread.
//! 3. `commit`: generation check, trust gate, smoothing, step detection and
//!    proximity classification, in order per key.
//!
//! Only readings that reach `min_alert_confidence` enter smoothing history.
//! Anything less is handled as a frame without a reading.

use depth_frame::{ConfidenceMap, DepthMap, RegionOfInterest, SharedDepthFrame};
use depth_sampler::{DepthSampler, SampleError, SampleSet};
use metrics::counter;
use proximity::{
    AlertThrottle, Cadence, CadencePolicy, ProximityClassifier, ProximityTier, SpeechPriority,
    SpeechRequest,
};
use robust_estimator::{DistanceEstimate, RobustEstimator};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use temporal_smoother::{StepDetector, StepKind, StepReading, Strip, StripReadings, TemporalSmoother};
use tracing::{debug, info, warn};

use crate::generation::{Generations, Ticket};
use crate::target::{Detection, IdentityTracker, TargetKey};
use crate::{PipelineConfig, PipelineError};

const FOCUS_LABEL: &str = "Obstacle";
const STEP_KINDS: [StepKind; 3] = [StepKind::Curb, StepKind::StepUp, StepKind::StepDown];

/// Per-frame output for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetUpdate {
    pub key: TargetKey,
    pub label: Option<String>,
    /// Unsmoothed estimate for this frame
    pub estimate: DistanceEstimate,
    /// Smoothed distance; the last smoothed value when this frame had no
    /// trusted reading
    pub smoothed: Option<f32>,
    /// Whether `smoothed` is the fallback from an earlier frame
    pub fallback: bool,
    pub tier: ProximityTier,
}

/// Tier change handed to the haptic layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEvent {
    pub key: TargetKey,
    pub label: Option<String>,
    pub previous: ProximityTier,
    pub tier: ProximityTier,
    pub distance: Option<f32>,
    pub confidence: f32,
    /// Pulse pattern to use; `None` stops pulsing
    pub cadence: Option<Cadence>,
    pub escalated: bool,
}

/// Everything produced for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub targets: Vec<TargetUpdate>,
    pub events: Vec<ProximityEvent>,
    pub step: Option<StepReading>,
    pub speech: Vec<SpeechRequest>,
    /// Tracks dropped this frame
    pub lost: Vec<TargetKey>,
    /// Results thrown away because their generation was retired
    pub discarded: usize,
}

#[derive(Debug, Clone)]
enum PlanSource {
    /// Sampled during `estimate`, under one lease
    Frame(SharedDepthFrame),
    /// Sampled up front from borrowed maps
    Sampled(Vec<Result<SampleSet, SampleError>>),
}

/// Regions of one frame, ready for sampling and estimation
#[derive(Debug, Clone)]
pub struct FramePlan {
    sequence: u64,
    timestamp_ns: u64,
    sampler: DepthSampler,
    estimator: RobustEstimator,
    use_confidence_map: bool,
    /// Focus box first, then detections in input order
    targets: Vec<(Ticket, Option<String>)>,
    strip_ticket: Ticket,
    /// One region per target followed by the near, mid and far strips
    regions: Vec<RegionOfInterest>,
    source: PlanSource,
    lost: Vec<TargetKey>,
}

#[derive(Debug, Clone)]
struct TargetEstimate {
    ticket: Ticket,
    label: Option<String>,
    estimate: DistanceEstimate,
}

#[derive(Debug, Clone)]
struct StripEstimate {
    ticket: Ticket,
    near: DistanceEstimate,
    mid: DistanceEstimate,
    far: DistanceEstimate,
}

impl StripEstimate {
    fn get(&self, strip: Strip) -> &DistanceEstimate {
        match strip {
            Strip::Near => &self.near,
            Strip::Mid => &self.mid,
            Strip::Far => &self.far,
        }
    }
}

/// Estimation results awaiting commit
#[derive(Debug, Clone)]
pub struct FrameEstimates {
    sequence: u64,
    timestamp_ns: u64,
    targets: Vec<TargetEstimate>,
    strips: StripEstimate,
    lost: Vec<TargetKey>,
}

impl FrameEstimates {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn sample_regions(
    sampler: &DepthSampler,
    depth: &DepthMap<'_>,
    confidence: Option<&ConfidenceMap<'_>>,
    regions: &[RegionOfInterest],
) -> Vec<Result<SampleSet, SampleError>> {
    regions
        .iter()
        .map(|region| sampler.sample(depth, confidence, region))
        .collect()
}

impl FramePlan {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of regions (targets plus strips) sampled
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Sample every region and reduce it to a distance estimate
    ///
    /// A released or poisoned frame yields "no reading" for every region.
    pub fn estimate(self) -> FrameEstimates {
        let ts = self.timestamp_ns;
        let samples = match self.source {
            PlanSource::Sampled(samples) => samples,
            PlanSource::Frame(frame) => {
                let use_confidence = self.use_confidence_map;
                let sampled = frame.with_maps(|depth, confidence| {
                    let confidence = confidence.filter(|_| use_confidence);
                    sample_regions(&self.sampler, &depth, confidence.as_ref(), &self.regions)
                });
                sampled.unwrap_or_else(|e| {
                    warn!("Frame {} unreadable, no reading for all regions: {}", frame.sequence(), e);
                    vec![Err(SampleError::from(e)); self.regions.len()]
                })
            }
        };

        let estimator = &self.estimator;
        let mut estimates = samples.iter().map(|samples| match samples {
            Ok(set) => estimator.estimate(set, ts),
            Err(e) => {
                debug!("No reading: {}", e);
                DistanceEstimate::no_reading(ts)
            }
        });

        let targets = self
            .targets
            .into_iter()
            .zip(estimates.by_ref())
            .map(|((ticket, label), estimate)| TargetEstimate { ticket, label, estimate })
            .collect();

        let mut next = || estimates.next().unwrap_or_else(|| DistanceEstimate::no_reading(ts));
        let strips = StripEstimate {
            ticket: self.strip_ticket,
            near: next(),
            mid: next(),
            far: next(),
        };

        FrameEstimates {
            sequence: self.sequence,
            timestamp_ns: ts,
            targets,
            strips,
            lost: self.lost,
        }
    }
}

/// Stateful guidance session
///
/// Creating the pipeline starts a session; `stop` ends it and clears all
/// per-target state.
#[derive(Debug)]
pub struct GuidancePipeline {
    config: PipelineConfig,
    sampler: DepthSampler,
    estimator: RobustEstimator,
    smoother: TemporalSmoother<TargetKey>,
    steps: StepDetector,
    classifier: ProximityClassifier<TargetKey>,
    cadence: CadencePolicy,
    throttle: AlertThrottle,
    identity: IdentityTracker,
    generations: Generations,
    focus_box: RegionOfInterest,
}

impl GuidancePipeline {
    /// Create a pipeline; any invalid parameter fails here
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        info!(
            "Creating guidance pipeline: sensor={:?}, window={}, thresholds={:?}",
            config.sensor, config.smoothing_window_size, config.proximity_thresholds
        );

        let sampler = DepthSampler::new(config.sampler_config()).map_err(crate::ConfigError::from)?;
        let estimator =
            RobustEstimator::new(config.confidence_model.clone()).map_err(crate::ConfigError::from)?;
        let smoother =
            TemporalSmoother::new(config.smoothing_window_size).map_err(crate::ConfigError::from)?;
        let steps = StepDetector::new(config.step_config()?).map_err(crate::ConfigError::from)?;
        let classifier =
            ProximityClassifier::new(config.classifier_config()?).map_err(crate::ConfigError::from)?;

        Ok(Self {
            sampler,
            estimator,
            smoother,
            steps,
            classifier,
            cadence: config.cadence.clone(),
            throttle: AlertThrottle::new(config.throttle_config()),
            identity: IdentityTracker::new(config.identity.clone()),
            generations: Generations::new(),
            focus_box: config.focus_box,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn focus_box(&self) -> &RegionOfInterest {
        &self.focus_box
    }

    /// Redefine the focus box; its history and step state start over
    pub fn set_focus_box(&mut self, region: RegionOfInterest) -> Result<(), PipelineError> {
        region.validate()?;
        info!("Focus box redefined: {:?}", region);
        self.focus_box = region;
        self.smoother.reset(&TargetKey::FocusBox);
        self.classifier.reset(&TargetKey::FocusBox);
        self.steps.reset();
        self.generations.invalidate(&TargetKey::FocusBox);
        Ok(())
    }

    /// Mute a spoken alert category until its hazard clears
    ///
    /// Returns false when the category never fired this session.
    pub fn acknowledge(&mut self, category: &str) -> bool {
        self.throttle.acknowledge(category)
    }

    /// End the session: every buffer and generation is cleared
    pub fn stop(&mut self) {
        info!(
            "Guidance session stopped: clearing {} histories, {} tracks",
            self.smoother.tracked(),
            self.identity.active()
        );
        self.smoother.reset_all();
        self.classifier.reset_all();
        self.steps.reset();
        self.throttle.clear();
        self.identity.reset();
        self.generations.invalidate_all();
    }

    /// Match detections and plan sampling of a shared frame
    ///
    /// The frame is not read here; `FramePlan::estimate` holds the lease
    /// while it samples.
    pub fn prepare(&mut self, frame: &SharedDepthFrame, detections: Vec<Detection>) -> FramePlan {
        self.plan(
            frame.sequence(),
            frame.timestamp_ns(),
            detections,
            |_| PlanSource::Frame(frame.clone()),
        )
    }

    /// Same as `prepare` for maps borrowed directly from the sensor layer;
    /// these are sampled immediately
    pub fn prepare_maps(
        &mut self,
        depth: &DepthMap<'_>,
        confidence: Option<&ConfidenceMap<'_>>,
        sequence: u64,
        timestamp_ns: u64,
        detections: Vec<Detection>,
    ) -> FramePlan {
        let confidence = confidence.filter(|_| self.config.use_confidence_map);
        let sampler = self.sampler.clone();
        self.plan(sequence, timestamp_ns, detections, |regions| {
            PlanSource::Sampled(sample_regions(&sampler, depth, confidence, regions))
        })
    }

    /// Apply estimates in order; stale generations are discarded
    pub fn commit(&mut self, estimates: FrameEstimates) -> FrameReport {
        self.commit_at(estimates, Instant::now())
    }

    pub fn commit_at(&mut self, estimates: FrameEstimates, now: Instant) -> FrameReport {
        let mut report = FrameReport {
            sequence: estimates.sequence,
            timestamp_ns: estimates.timestamp_ns,
            lost: estimates.lost,
            ..Default::default()
        };

        for target in estimates.targets {
            if !self.generations.is_current(&target.ticket) {
                debug!("Discarding stale result for {}", target.ticket.key);
                report.discarded += 1;
                continue;
            }
            self.apply_target(target, now, &mut report);
        }

        let strips = estimates.strips;
        if self.generations.is_current(&strips.ticket) {
            self.apply_strips(&strips, now, &mut report);
        } else {
            report.discarded += 1;
        }

        counter!("guidance_frames_processed_total").increment(1);
        if report.discarded > 0 {
            counter!("guidance_results_discarded_total").increment(report.discarded as u64);
        }
        report
    }

    /// Synchronous prepare, estimate and commit
    pub fn process_frame(&mut self, frame: &SharedDepthFrame, detections: Vec<Detection>) -> FrameReport {
        let plan = self.prepare(frame, detections);
        self.commit(plan.estimate())
    }

    /// Distance of a reading trusted enough to smooth and alert on
    fn trusted(&self, estimate: &DistanceEstimate) -> Option<f32> {
        estimate
            .reliable_distance(self.config.min_alert_confidence)
            .filter(|_| estimate.is_reading())
    }

    fn plan(
        &mut self,
        sequence: u64,
        timestamp_ns: u64,
        detections: Vec<Detection>,
        source: impl FnOnce(&[RegionOfInterest]) -> PlanSource,
    ) -> FramePlan {
        let update = self.identity.update(detections);
        for key in &update.lost {
            self.smoother.reset(key);
            self.classifier.reset(key);
            self.generations.invalidate(key);
        }

        let mut regions = Vec::with_capacity(update.assigned.len() + 4);
        let mut targets = Vec::with_capacity(update.assigned.len() + 1);

        targets.push((self.generations.ticket(TargetKey::FocusBox), None));
        regions.push(self.focus_box);
        for (key, detection) in update.assigned {
            targets.push((self.generations.ticket(key), Some(detection.label)));
            regions.push(detection.bbox);
        }

        let layout = &self.config.strips;
        for strip in [Strip::Near, Strip::Mid, Strip::Far] {
            // Validated layout always yields a positive strip
            let region = self
                .focus_box
                .strip_from_bottom(layout.offset(strip), layout.thickness)
                .unwrap_or(self.focus_box);
            regions.push(region);
        }

        FramePlan {
            sequence,
            timestamp_ns,
            sampler: self.sampler.clone(),
            estimator: self.estimator.clone(),
            use_confidence_map: self.config.use_confidence_map,
            targets,
            strip_ticket: self.generations.ticket(TargetKey::FocusBox),
            source: source(&regions),
            regions,
            lost: update.lost,
        }
    }

    fn apply_target(&mut self, target: TargetEstimate, now: Instant, report: &mut FrameReport) {
        let key = target.ticket.key;
        let estimate = target.estimate;

        let trusted = self
            .trusted(&estimate)
            .and_then(|d| self.smoother.update(key, d).ok());
        let (smoothed, fallback) = match trusted {
            Some(smoothed) => (Some(smoothed), false),
            None => {
                if estimate.distance.is_none() {
                    counter!("guidance_no_reading_total").increment(1);
                } else {
                    debug!(
                        "Untrusted reading for {} (conf={:.2}), kept out of history",
                        key, estimate.confidence
                    );
                    counter!("guidance_untrusted_readings_total").increment(1);
                }
                let last = self.smoother.last(&key);
                (last, last.is_some())
            }
        };

        // A frame without a trusted reading drops the tier even when a
        // fallback distance exists
        let classified = DistanceEstimate {
            distance: trusted,
            ..estimate
        };
        if let Some(change) = self.classifier.observe(key, &classified) {
            let signal = self.cadence.on_tier_change(change.previous, change.tier);
            let event = ProximityEvent {
                key,
                label: target.label.clone(),
                previous: change.previous,
                tier: change.tier,
                distance: change.distance,
                confidence: change.confidence,
                cadence: signal.cadence,
                escalated: signal.escalated,
            };
            self.announce_proximity(&event, now, report);
            report.events.push(event);
        }

        report.targets.push(TargetUpdate {
            key,
            tier: self.classifier.tier(&key),
            label: target.label,
            estimate,
            smoothed,
            fallback,
        });
    }

    fn apply_strips(&mut self, strips: &StripEstimate, now: Instant, report: &mut FrameReport) {
        let readings = StripReadings {
            near: self.trusted(&strips.near),
            mid: self.trusted(&strips.mid),
            far: self.trusted(&strips.far),
        };
        report.step = self.steps.update(readings);

        let Some(step) = report.step else {
            return;
        };
        if step.kind == StepKind::None {
            for kind in STEP_KINDS {
                self.throttle.rearm(&step_category(kind));
            }
            return;
        }
        // Confidence of the two strips behind the difference, this frame
        let compare = self.steps.config().compare;
        let confidence = match (readings.near, readings.get(compare)) {
            (Some(_), Some(_)) => strips.near.confidence.min(strips.get(compare).confidence),
            _ => 0.0,
        };
        self.announce_step(step, confidence, now, report);
    }

    fn announce_proximity(&mut self, event: &ProximityEvent, now: Instant, report: &mut FrameReport) {
        let label = event.label.as_deref().unwrap_or(FOCUS_LABEL);
        let category = format!("proximity:{}", label);
        if event.tier < ProximityTier::Medium {
            self.throttle.rearm(&category);
            return;
        }
        if !event.escalated {
            return;
        }
        let Some(distance) = event.distance else {
            return;
        };
        if self.throttle.try_fire_at(&category, event.confidence, now) {
            report.speech.push(SpeechRequest {
                text: format!("{}, {:.1} meters", label, distance),
                priority: SpeechPriority::from(event.tier),
                category,
            });
        }
    }

    fn announce_step(&mut self, step: StepReading, confidence: f32, now: Instant, report: &mut FrameReport) {
        let (text, priority) = match step.kind {
            StepKind::None => return,
            StepKind::Curb => ("Curb ahead", SpeechPriority::Warning),
            StepKind::StepUp => ("Step up ahead", SpeechPriority::Warning),
            StepKind::StepDown => ("Step down ahead", SpeechPriority::Urgent),
        };
        let category = step_category(step.kind);
        if self.throttle.try_fire_at(&category, confidence, now) {
            report.speech.push(SpeechRequest {
                text: text.to_string(),
                priority,
                category,
            });
        }
    }
}

fn step_category(kind: StepKind) -> String {
    format!("step:{:?}", kind)
}
