//! Bounded Ring Buffer
//!
//! Fixed-capacity FIFO history used for per-target temporal smoothing.
//! Pushing into a full buffer overwrites the oldest entry.

mod buffer;

pub use buffer::RingBuffer;

use thiserror::Error;

/// Ring buffer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    #[error("Ring buffer capacity must be at least 1")]
    ZeroCapacity,
}
