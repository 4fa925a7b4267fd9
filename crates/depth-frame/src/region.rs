//! Normalized regions of interest

use serde::{Deserialize, Serialize};

use crate::DepthFrameError;

/// Where normalized `y = 0` sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Origin {
    /// Display/map convention, y grows downward
    #[default]
    TopLeft,
    /// Vision-framework convention, y grows upward
    BottomLeft,
}

/// Inclusive pixel bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelRect {
    pub fn width(&self) -> usize {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0 + 1
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

/// Axis-aligned rectangle in normalized [0, 1] coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub origin: Origin,
}

impl RegionOfInterest {
    /// Create a region; width and height must be positive and finite
    pub fn new(x: f32, y: f32, width: f32, height: f32, origin: Origin) -> Result<Self, DepthFrameError> {
        let region = Self {
            x,
            y,
            width,
            height,
            origin,
        };
        region.validate()?;
        Ok(region)
    }

    /// Region centered in the frame, sized as a fraction of it
    pub fn centered(width: f32, height: f32) -> Result<Self, DepthFrameError> {
        Self::new((1.0 - width) / 2.0, (1.0 - height) / 2.0, width, height, Origin::TopLeft)
    }

    /// Check the invariants (deserialized regions skip `new`)
    pub fn validate(&self) -> Result<(), DepthFrameError> {
        if ![self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite()) {
            return Err(DepthFrameError::Region("non-finite coordinate".to_string()));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(DepthFrameError::Region(format!(
                "size {}x{} must be positive",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Same rectangle expressed with a top-left origin
    pub fn to_top_left(&self) -> Self {
        match self.origin {
            Origin::TopLeft => *self,
            Origin::BottomLeft => Self {
                y: 1.0 - self.y - self.height,
                origin: Origin::TopLeft,
                ..*self
            },
        }
    }

    /// Same rectangle expressed with the given origin
    pub fn with_origin(&self, origin: Origin) -> Self {
        let top_left = self.to_top_left();
        match origin {
            Origin::TopLeft => top_left,
            Origin::BottomLeft => Self {
                y: 1.0 - top_left.y - top_left.height,
                origin: Origin::BottomLeft,
                ..top_left
            },
        }
    }

    /// Intersect with the unit square; `None` if nothing is left
    pub fn clamped(&self) -> Option<Self> {
        let x0 = self.x.clamp(0.0, 1.0);
        let y0 = self.y.clamp(0.0, 1.0);
        let x1 = (self.x + self.width).clamp(0.0, 1.0);
        let y1 = (self.y + self.height).clamp(0.0, 1.0);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            origin: self.origin,
        })
    }

    /// Normalized centre point (in this region's own origin)
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Convert to inclusive pixel bounds of a `width` x `height` map
    pub fn to_pixel_rect(&self, width: usize, height: usize) -> Option<PixelRect> {
        if width == 0 || height == 0 {
            return None;
        }
        let r = self.to_top_left().clamped()?;
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;

        let x0 = (r.x * width as f32).floor().clamp(0.0, max_x) as usize;
        let y0 = (r.y * height as f32).floor().clamp(0.0, max_y) as usize;
        let x1 = ((r.x + r.width) * width as f32).ceil() - 1.0;
        let y1 = ((r.y + r.height) * height as f32).ceil() - 1.0;
        let x1 = (x1.clamp(0.0, max_x) as usize).max(x0);
        let y1 = (y1.clamp(0.0, max_y) as usize).max(y0);

        Some(PixelRect { x0, y0, x1, y1 })
    }

    /// Horizontal band of this region, measured from its image-bottom edge
    ///
    /// `from_bottom` and `thickness` are fractions of the region height. For a
    /// floor-facing camera the bottom of the image is nearest to the user.
    pub fn strip_from_bottom(&self, from_bottom: f32, thickness: f32) -> Result<Self, DepthFrameError> {
        let from_bottom = from_bottom.clamp(0.0, 1.0);
        let thickness = thickness.min(1.0 - from_bottom);
        let r = self.to_top_left();
        let strip_height = r.height * thickness;
        let strip = Self::new(
            r.x,
            r.y + r.height * (1.0 - from_bottom) - strip_height,
            r.width,
            strip_height,
            Origin::TopLeft,
        )?;
        Ok(strip.with_origin(self.origin))
    }
}
