use crate::common::*;
use crate::errors::{MungError, Result};
use crate::geometry::{BoundsPolicy, ExtractOptions, SpotGeometry, SpotPooling, SpotShape};
use crate::image::ImageRaster;

/// Spot centers in pixel units, aligned with their row labels
#[derive(Debug, Clone)]
pub struct SpotCoordinates {
    pub names: Vec<Box<str>>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl SpotCoordinates {
    pub fn new(names: Vec<Box<str>>, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if names.len() != x.len() || names.len() != y.len() {
            return Err(MungError::Config(format!(
                "coordinate table: {} names, {} x, {} y",
                names.len(),
                x.len(),
                y.len()
            )));
        }
        Ok(Self { names, x, y })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct ExtractOut {
    /// one row per surviving spot, in coordinate-table order
    pub features: MatWithNames<Mat>,
    /// labels of spots whose window left the image (Drop policy only)
    pub dropped: Vec<Box<str>>,
}

/// Turn image patches into per-spot feature vectors.
///
/// For each spot the window of side `spot_size` is centered at
/// `(x + dx, y + dy)`, rotated about its center, sampled bilinearly
/// and pooled. A pure function of its arguments: identical inputs give
/// bit-identical output.
pub fn extract(
    image: &ImageRaster,
    coords: &SpotCoordinates,
    geometry: &SpotGeometry,
    options: &ExtractOptions,
) -> Result<ExtractOut> {
    geometry.validate()?;

    if coords.is_empty() {
        return Err(MungError::EmptyExtraction("empty coordinate table".into()));
    }

    let ss = geometry.spot_size;
    let half = (ss as f64 - 1.) / 2.;
    let theta = geometry.rotation_deg.to_radians();
    let (sin_t, cos_t) = theta.sin_cos();

    // axis-aligned half-extent of the rotated window
    let reach = half * (cos_t.abs() + sin_t.abs());

    let (dx, dy) = geometry.displacement;

    let mut kept_rows: Vec<Box<str>> = vec![];
    let mut dropped: Vec<Box<str>> = vec![];
    let mut feature_rows: Vec<Vec<f64>> = vec![];

    for i in 0..coords.len() {
        let cx = coords.x[i] + dx;
        let cy = coords.y[i] + dy;

        if options.bounds == BoundsPolicy::Drop && !image.contains_box(cx, cy, reach, reach) {
            warn!(
                "spot '{}' at ({:.1}, {:.1}) leaves the {}x{} image; dropped",
                coords.names[i],
                cx,
                cy,
                image.height(),
                image.width()
            );
            dropped.push(coords.names[i].clone());
            continue;
        }

        feature_rows.push(spot_features(
            image, cx, cy, half, ss, sin_t, cos_t, options,
        ));
        kept_rows.push(coords.names[i].clone());
    }

    if kept_rows.is_empty() {
        return Err(MungError::EmptyExtraction(format!(
            "all {} spots fell outside the image",
            coords.len()
        )));
    }

    if !dropped.is_empty() {
        warn!("{} of {} spots dropped at image bounds", dropped.len(), coords.len());
    }

    let ncols = feature_rows[0].len();
    let mat = Mat::from_row_iterator(
        kept_rows.len(),
        ncols,
        feature_rows.into_iter().flatten(),
    );

    Ok(ExtractOut {
        features: MatWithNames {
            rows: kept_rows,
            cols: feature_names(image.channels(), ss, options.pooling),
            mat,
        },
        dropped,
    })
}

#[allow(clippy::too_many_arguments)]
fn spot_features(
    image: &ImageRaster,
    cx: f64,
    cy: f64,
    half: f64,
    ss: usize,
    sin_t: f64,
    cos_t: f64,
    options: &ExtractOptions,
) -> Vec<f64> {
    let disc_r2 = half * half + 1e-9;

    let mut out = vec![];

    for ch in 0..image.channels() {
        let mut values = Vec::with_capacity(ss * ss);
        let mut in_shape = Vec::with_capacity(ss * ss);

        for r in 0..ss {
            for c in 0..ss {
                let u = c as f64 - half;
                let v = r as f64 - half;

                let masked =
                    options.shape == SpotShape::Disc && u * u + v * v > disc_r2;

                if masked {
                    values.push(0.);
                    in_shape.push(false);
                    continue;
                }

                let sx = cx + u * cos_t - v * sin_t;
                let sy = cy + u * sin_t + v * cos_t;
                values.push(image.sample(ch, sx, sy, options.bounds));
                in_shape.push(true);
            }
        }

        match options.pooling {
            SpotPooling::Flatten => out.extend(values),
            SpotPooling::ChannelMoments => {
                let kept: Vec<f64> = values
                    .iter()
                    .zip(in_shape.iter())
                    .filter(|(_, &keep)| keep)
                    .map(|(&v, _)| v)
                    .collect();
                let nn = kept.len().max(1) as f64;
                let mean = kept.iter().sum::<f64>() / nn;
                let var = kept.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / nn;
                out.push(mean);
                out.push(var.sqrt());
            }
        }
    }
    out
}

fn feature_names(channels: usize, ss: usize, pooling: SpotPooling) -> Vec<Box<str>> {
    let mut cols: Vec<Box<str>> = vec![];
    for ch in 0..channels {
        match pooling {
            SpotPooling::Flatten => {
                for r in 0..ss {
                    for c in 0..ss {
                        cols.push(format!("ch{}_y{}_x{}", ch, r, c).into_boxed_str());
                    }
                }
            }
            SpotPooling::ChannelMoments => {
                cols.push(format!("ch{}_mean", ch).into_boxed_str());
                cols.push(format!("ch{}_sd", ch).into_boxed_str());
            }
        }
    }
    cols
}
