use crate::common::Mat;
use crate::errors::{MungError, Result};
use crate::geometry::BoundsPolicy;

/// A multi-channel raster held as one `height x width` matrix per
/// channel. Construction from decoded file formats happens upstream;
/// the core only sees numeric planes.
#[derive(Debug, Clone)]
pub struct ImageRaster {
    planes: Vec<Mat>,
    height: usize,
    width: usize,
}

impl ImageRaster {
    pub fn new(planes: Vec<Mat>) -> Result<Self> {
        if planes.is_empty() {
            return Err(MungError::Config("image needs at least one channel".into()));
        }
        let height = planes[0].nrows();
        let width = planes[0].ncols();
        if height == 0 || width == 0 {
            return Err(MungError::Config("empty image plane".into()));
        }
        if planes.iter().any(|p| p.nrows() != height || p.ncols() != width) {
            return Err(MungError::Config(
                "image channels must share one shape".into(),
            ));
        }
        Ok(Self {
            planes,
            height,
            width,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Does the closed axis-aligned box `[x - rx, x + rx] x [y - ry, y + ry]`
    /// stay inside the bilinear-samplable area?
    pub fn contains_box(&self, x: f64, y: f64, rx: f64, ry: f64) -> bool {
        x - rx >= 0.
            && y - ry >= 0.
            && x + rx <= (self.width - 1) as f64
            && y + ry <= (self.height - 1) as f64
    }

    /// Bilinear sample of one channel at a fractional position;
    /// out-of-range coordinates are remapped per the bounds policy
    pub fn sample(&self, channel: usize, x: f64, y: f64, bounds: BoundsPolicy) -> f64 {
        let plane = &self.planes[channel];

        let x = remap(x, self.width, bounds);
        let y = remap(y, self.height, bounds);

        let x0 = x.floor();
        let y0 = y.floor();
        let wx = x - x0;
        let wy = y - y0;

        let xi = x0 as usize;
        let yi = y0 as usize;
        let xi1 = (xi + 1).min(self.width - 1);
        let yi1 = (yi + 1).min(self.height - 1);

        let top = plane[(yi, xi)] * (1. - wx) + plane[(yi, xi1)] * wx;
        let bot = plane[(yi1, xi)] * (1. - wx) + plane[(yi1, xi1)] * wx;
        top * (1. - wy) + bot * wy
    }
}

/// Map a coordinate into `[0, n-1]`: clamp at the edge or mirror back
/// inside. The `Drop` policy never reaches this far for out-of-bounds
/// spots, so plain clamping keeps the arithmetic safe.
fn remap(v: f64, n: usize, bounds: BoundsPolicy) -> f64 {
    let hi = (n - 1) as f64;
    match bounds {
        BoundsPolicy::Drop | BoundsPolicy::Clamp => v.clamp(0., hi),
        BoundsPolicy::Reflect => {
            if hi == 0. {
                return 0.;
            }
            let period = 2. * hi;
            let mut w = (v % period + period) % period;
            if w > hi {
                w = period - w;
            }
            w
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_image() -> ImageRaster {
        // 3x4 plane with value = 10*row + col
        let plane = Mat::from_fn(3, 4, |r, c| (10 * r + c) as f64);
        ImageRaster::new(vec![plane]).unwrap()
    }

    #[test]
    fn integer_positions_hit_pixels() {
        let img = toy_image();
        assert_eq!(img.sample(0, 2.0, 1.0, BoundsPolicy::Clamp), 12.0);
        assert_eq!(img.sample(0, 0.0, 0.0, BoundsPolicy::Clamp), 0.0);
    }

    #[test]
    fn fractional_positions_interpolate() {
        use approx::assert_abs_diff_eq;
        let img = toy_image();
        // halfway between (r=0,c=1)=1 and (r=1,c=1)=11
        let v = img.sample(0, 1.0, 0.5, BoundsPolicy::Clamp);
        assert_abs_diff_eq!(v, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn clamp_and_reflect_remap() {
        let img = toy_image();
        assert_eq!(img.sample(0, -1.0, 0.0, BoundsPolicy::Clamp), 0.0);
        // reflect: x = -1 mirrors to x = 1
        assert_eq!(img.sample(0, -1.0, 0.0, BoundsPolicy::Reflect), 1.0);
    }

    #[test]
    fn mismatched_channels_rejected() {
        let a = Mat::zeros(3, 4);
        let b = Mat::zeros(4, 3);
        assert!(ImageRaster::new(vec![a, b]).is_err());
        assert!(ImageRaster::new(vec![]).is_err());
    }

    #[test]
    fn contains_box_checks_edges() {
        let img = toy_image();
        assert!(img.contains_box(1.5, 1.0, 1.0, 1.0));
        assert!(!img.contains_box(0.5, 1.0, 1.0, 1.0));
        assert!(!img.contains_box(1.5, 1.0, 2.0, 1.0));
    }
}
