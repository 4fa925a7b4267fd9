//! Depth and confidence map views

use serde::{Deserialize, Serialize};

use crate::DepthFrameError;

const DEPTH_PIXEL_BYTES: usize = std::mem::size_of::<f32>();

/// Per-pixel sensor confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Decode a confidence byte (0 = low, 1 = medium, 2+ = high)
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => ConfidenceLevel::Low,
            1 => ConfidenceLevel::Medium,
            _ => ConfidenceLevel::High,
        }
    }
}

fn check_layout(
    len: usize,
    width: usize,
    height: usize,
    bytes_per_row: usize,
    pixel_bytes: usize,
) -> Result<(), DepthFrameError> {
    if width == 0 || height == 0 {
        return Err(DepthFrameError::Dimensions { width, height });
    }
    let row_bytes = width * pixel_bytes;
    if bytes_per_row < row_bytes {
        return Err(DepthFrameError::Stride {
            stride: bytes_per_row,
            min: row_bytes,
        });
    }
    // The last row does not need its alignment padding
    let required = bytes_per_row * (height - 1) + row_bytes;
    if len < required {
        return Err(DepthFrameError::BufferTooSmall {
            actual: len,
            required,
        });
    }
    Ok(())
}

/// Read-only view of a row-major float32 depth map (meters)
#[derive(Debug, Clone, Copy)]
pub struct DepthMap<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    bytes_per_row: usize,
}

impl<'a> DepthMap<'a> {
    /// Wrap a raw buffer; `bytes_per_row` may exceed `width * 4`
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        bytes_per_row: usize,
    ) -> Result<Self, DepthFrameError> {
        check_layout(data.len(), width, height, bytes_per_row, DEPTH_PIXEL_BYTES)?;
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    /// Get depth at (x, y)
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y * self.bytes_per_row + x * DEPTH_PIXEL_BYTES;
        let bytes = self.data.get(offset..offset + DEPTH_PIXEL_BYTES)?;
        let raw: [u8; DEPTH_PIXEL_BYTES] = bytes.try_into().ok()?;
        Some(f32::from_ne_bytes(raw))
    }
}

/// Read-only view of a 1 byte/pixel confidence map
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceMap<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    bytes_per_row: usize,
}

impl<'a> ConfidenceMap<'a> {
    /// Wrap a raw confidence buffer
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        bytes_per_row: usize,
    ) -> Result<Self, DepthFrameError> {
        check_layout(data.len(), width, height, bytes_per_row, 1)?;
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get confidence at (x, y)
    pub fn level_at(&self, x: usize, y: usize) -> Option<ConfidenceLevel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y * self.bytes_per_row + x)
            .map(|&b| ConfidenceLevel::from_byte(b))
    }

    /// Ensure the map lines up with a depth map
    pub fn check_matches(&self, depth: &DepthMap<'_>) -> Result<(), DepthFrameError> {
        if self.width != depth.width || self.height != depth.height {
            return Err(DepthFrameError::ConfidenceMismatch {
                expected: (depth.width, depth.height),
                actual: (self.width, self.height),
            });
        }
        Ok(())
    }
}

/// Owned depth buffer, as handed over by a sensor producer
#[derive(Debug, Clone)]
pub struct OwnedDepthMap {
    data: Vec<u8>,
    width: usize,
    height: usize,
    bytes_per_row: usize,
}

impl OwnedDepthMap {
    /// Take ownership of a raw strided buffer
    pub fn new(
        data: Vec<u8>,
        width: usize,
        height: usize,
        bytes_per_row: usize,
    ) -> Result<Self, DepthFrameError> {
        check_layout(data.len(), width, height, bytes_per_row, DEPTH_PIXEL_BYTES)?;
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
        })
    }

    /// Pack row-major depth values with `row_padding` extra bytes per row
    pub fn from_depths(
        width: usize,
        height: usize,
        depths: &[f32],
        row_padding: usize,
    ) -> Result<Self, DepthFrameError> {
        if depths.len() != width * height {
            return Err(DepthFrameError::BufferTooSmall {
                actual: depths.len() * DEPTH_PIXEL_BYTES,
                required: width * height * DEPTH_PIXEL_BYTES,
            });
        }
        let bytes_per_row = width * DEPTH_PIXEL_BYTES + row_padding;
        let mut data = Vec::with_capacity(bytes_per_row * height);
        for row in depths.chunks(width.max(1)) {
            for value in row {
                data.extend_from_slice(&value.to_ne_bytes());
            }
            data.resize(data.len() + row_padding, 0);
        }
        Self::new(data, width, height, bytes_per_row)
    }

    /// Fill a map with a single depth value
    pub fn uniform(width: usize, height: usize, depth: f32) -> Result<Self, DepthFrameError> {
        Self::from_depths(width, height, &vec![depth; width * height], 0)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Borrow as a read-only view
    pub fn view(&self) -> DepthMap<'_> {
        DepthMap {
            data: &self.data,
            width: self.width,
            height: self.height,
            bytes_per_row: self.bytes_per_row,
        }
    }
}

/// Owned confidence buffer
#[derive(Debug, Clone)]
pub struct OwnedConfidenceMap {
    data: Vec<u8>,
    width: usize,
    height: usize,
    bytes_per_row: usize,
}

impl OwnedConfidenceMap {
    /// Take ownership of a raw strided confidence buffer
    pub fn new(
        data: Vec<u8>,
        width: usize,
        height: usize,
        bytes_per_row: usize,
    ) -> Result<Self, DepthFrameError> {
        check_layout(data.len(), width, height, bytes_per_row, 1)?;
        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
        })
    }

    /// Fill a map with a single confidence level
    pub fn uniform(width: usize, height: usize, level: ConfidenceLevel) -> Result<Self, DepthFrameError> {
        Self::new(vec![level as u8; width * height], width, height, width)
    }

    /// Borrow as a read-only view
    pub fn view(&self) -> ConfidenceMap<'_> {
        ConfidenceMap {
            data: &self.data,
            width: self.width,
            height: self.height,
            bytes_per_row: self.bytes_per_row,
        }
    }
}
