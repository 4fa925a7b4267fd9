//! Scoped access to producer-owned frame buffers
//!
//! The sensor layer keeps ownership of the buffers and may release them at
//! any time. Readers only get a view for the duration of a closure, so no
//! reference outlives the lease.

use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::frame::{ConfidenceMap, DepthMap, OwnedConfidenceMap, OwnedDepthMap};
use crate::DepthFrameError;

#[derive(Debug)]
struct FrameBuffers {
    depth: OwnedDepthMap,
    confidence: Option<OwnedConfidenceMap>,
}

/// Depth frame shared between a sensor producer and the pipeline
#[derive(Debug, Clone)]
pub struct SharedDepthFrame {
    buffers: Arc<RwLock<Option<FrameBuffers>>>,
    /// Capture timestamp (nanoseconds)
    timestamp_ns: u64,
    /// Frame sequence number
    sequence: u64,
}

impl SharedDepthFrame {
    /// Wrap freshly captured buffers
    pub fn new(
        depth: OwnedDepthMap,
        confidence: Option<OwnedConfidenceMap>,
        timestamp_ns: u64,
        sequence: u64,
    ) -> Result<Self, DepthFrameError> {
        if let Some(conf) = &confidence {
            conf.view().check_matches(&depth.view())?;
        }
        Ok(Self {
            buffers: Arc::new(RwLock::new(Some(FrameBuffers { depth, confidence }))),
            timestamp_ns,
            sequence,
        })
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Producer side: give the buffers back to the sensor
    pub fn release(&self) {
        match self.buffers.write() {
            Ok(mut guard) => {
                guard.take();
                debug!("Frame {} released", self.sequence);
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
            }
        }
    }

    /// Run `f` with read-only views; the lock is dropped when `f` returns
    pub fn with_maps<R>(
        &self,
        f: impl FnOnce(DepthMap<'_>, Option<ConfidenceMap<'_>>) -> R,
    ) -> Result<R, DepthFrameError> {
        let guard = self.buffers.read().map_err(|_| {
            warn!("Frame {} lock poisoned", self.sequence);
            DepthFrameError::Poisoned
        })?;
        let buffers = guard.as_ref().ok_or_else(|| {
            warn!("Frame {} read after release", self.sequence);
            DepthFrameError::Released
        })?;
        Ok(f(
            buffers.depth.view(),
            buffers.confidence.as_ref().map(|c| c.view()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfidenceLevel;

    #[test]
    fn test_scoped_read() {
        let depth = OwnedDepthMap::uniform(4, 4, 1.5).unwrap();
        let frame = SharedDepthFrame::new(depth, None, 10, 1).unwrap();

        let value = frame.with_maps(|d, c| {
            assert!(c.is_none());
            d.depth_at(1, 1)
        });
        assert_eq!(value, Ok(Some(1.5)));
    }

    #[test]
    fn test_released_frame_fails_fast() {
        let depth = OwnedDepthMap::uniform(4, 4, 1.5).unwrap();
        let frame = SharedDepthFrame::new(depth, None, 10, 1).unwrap();
        let producer = frame.clone();

        producer.release();
        assert_eq!(frame.with_maps(|_, _| ()), Err(DepthFrameError::Released));
    }

    #[test]
    fn test_mismatched_confidence_rejected() {
        let depth = OwnedDepthMap::uniform(4, 4, 1.5).unwrap();
        let conf = OwnedConfidenceMap::uniform(2, 2, ConfidenceLevel::High).unwrap();
        assert!(SharedDepthFrame::new(depth, Some(conf), 0, 0).is_err());
    }
}
