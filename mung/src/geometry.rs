use crate::errors::{MungError, Result};
use serde::{Deserialize, Serialize};

/// Geometric parameters of one spot-extraction pass. A pure value
/// type; two extractions with equal geometry sample identical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotGeometry {
    /// side of the square pixel window
    pub spot_size: usize,
    /// counter-clockwise rotation of the window, degrees
    pub rotation_deg: f64,
    /// shift applied to every spot center, pixel units
    pub displacement: (f64, f64),
}

impl SpotGeometry {
    pub fn new(spot_size: usize) -> Self {
        Self {
            spot_size,
            rotation_deg: 0.,
            displacement: (0., 0.),
        }
    }

    pub fn with_rotation(mut self, deg: f64) -> Self {
        self.rotation_deg = deg;
        self
    }

    pub fn with_displacement(mut self, dx: f64, dy: f64) -> Self {
        self.displacement = (dx, dy);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.spot_size == 0 {
            return Err(MungError::Config("spot_size must be > 0".into()));
        }
        if !self.rotation_deg.is_finite()
            || !self.displacement.0.is_finite()
            || !self.displacement.1.is_finite()
        {
            return Err(MungError::Config("non-finite spot geometry".into()));
        }
        Ok(())
    }
}

/// What happens when a spot window leaves the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundsPolicy {
    /// drop the spot and keep going
    Drop,
    /// clamp sample coordinates to the image edge
    Clamp,
    /// mirror sample coordinates back into the image
    Reflect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotShape {
    Square,
    /// pixels outside the inscribed disc are masked to zero; the
    /// feature length stays fixed
    Disc,
}

/// How window pixels are pooled into the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotPooling {
    /// per-channel flattened intensities, row-major within a channel
    Flatten,
    /// per-channel mean and standard deviation
    ChannelMoments,
}

/// Extraction options beyond the per-pass geometry; one policy applies
/// to a whole run so spot counts stay deterministic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractOptions {
    pub bounds: BoundsPolicy,
    pub shape: SpotShape,
    pub pooling: SpotPooling,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            bounds: BoundsPolicy::Drop,
            shape: SpotShape::Square,
            pooling: SpotPooling::Flatten,
        }
    }
}
