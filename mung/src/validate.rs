use crate::align::{align_rows, ModalityData};
use crate::common::*;
use crate::errors::{MungError, Result};
use crate::extract::{extract, SpotCoordinates};
use crate::factorization::FittedModel;
use crate::geometry::{ExtractOptions, SpotGeometry};
use crate::image::ImageRaster;
use crate::transform::transform;

use dense_util::hypothesis_tests::{welch_t_test, WelchTest};
use dense_util::smoothing_spline::{SmoothingSpline, SplineOptions};
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::collections::HashSet;

/// Everything one validation pass needs: a fitted model, the raw image
/// and spot coordinates of the held-out samples, and their observed
/// target-modality matrix. All borrowed read-only, so protocols can
/// run concurrently.
pub struct HarnessContext<'a> {
    pub model: &'a FittedModel,
    pub image: &'a ImageRaster,
    pub coords: &'a SpotCoordinates,
    /// ground truth in the target modality; columns must match the
    /// fitted target vocabulary in order
    pub observed: &'a MatWithNames<Mat>,
    pub base_geometry: SpotGeometry,
    pub options: ExtractOptions,
    pub from: Box<str>,
    pub to: Box<str>,
}

#[derive(Debug, Clone)]
pub struct RotationComparison {
    pub angle_deg: f64,
    pub test: WelchTest,
}

#[derive(Debug, Clone)]
pub struct RotationReport {
    pub baseline_deg: f64,
    pub comparisons: Vec<RotationComparison>,
}

#[derive(Debug, Clone)]
pub struct DisplacementComparison {
    pub magnitude: f64,
    pub test: WelchTest,
}

#[derive(Debug, Clone)]
pub struct DisplacementReport {
    pub comparisons: Vec<DisplacementComparison>,
    /// whether the p-values weakly decrease as displacement grows
    pub monotone_degradation: bool,
}

#[derive(Debug, Clone)]
pub struct OffAxisComparison {
    pub displacement_a: (f64, f64),
    pub displacement_b: (f64, f64),
    pub test: WelchTest,
}

#[derive(Debug, Clone)]
pub struct SmoothnessReport {
    /// adjusted R-squared per target feature; `None` where the spline
    /// fit failed and the feature was skipped
    pub per_feature: Vec<(Box<str>, Option<f64>)>,
    pub mean_adj_r2: f64,
    pub n_failed: usize,
}

impl<'a> HarnessContext<'a> {
    /// Per-spot mean absolute residual (prediction vs truth) for one
    /// geometry. Spot-level summaries keep the two-sample comparisons
    /// honest: residuals within a spot share one extraction error and
    /// are not independent draws.
    pub fn residuals_at(&self, geometry: &SpotGeometry) -> Result<Vec<f64>> {
        let (predicted, observed) = self.predictions_at(geometry)?;

        let nn = predicted.nrows();
        let pp = predicted.ncols();
        let mut out = Vec::with_capacity(nn);
        for i in 0..nn {
            let mut acc = 0.;
            for j in 0..pp {
                acc += (predicted[(i, j)] - observed[(i, j)]).abs();
            }
            out.push(acc / pp as f64);
        }
        Ok(out)
    }

    /// Extract at the given geometry, predict the target modality and
    /// row-align predictions with the observed truth
    pub fn predictions_at(&self, geometry: &SpotGeometry) -> Result<(Mat, Mat)> {
        let to_idx = self.model.index_of(&self.to)?;
        let expected = &self.model.modalities[to_idx].col_names;
        if self.observed.cols != *expected {
            return Err(MungError::ShapeMismatch {
                modality: self.to.to_string(),
                expected: expected.len(),
                actual: self.observed.cols.len(),
            });
        }

        let spots = extract(self.image, self.coords, geometry, &self.options)?;

        let aligned = align_rows(vec![
            ModalityData {
                name: self.from.clone(),
                data: spots.features,
            },
            ModalityData {
                name: self.to.clone(),
                data: self.observed.clone(),
            },
        ])?;

        let predicted = transform(
            self.model,
            &self.from,
            &self.to,
            &aligned.modalities[0].data.mat,
        )?;

        Ok((predicted, aligned.modalities[1].data.mat.clone()))
    }

    /// Rotation invariance: residual distributions at each angle are
    /// compared against the first (baseline) angle
    pub fn rotation_invariance(&self, angles_deg: &[f64]) -> Result<RotationReport> {
        if angles_deg.len() < 2 {
            return Err(MungError::Config("need >= 2 rotation angles".into()));
        }

        let baseline_deg = angles_deg[0];
        let baseline =
            self.residuals_at(&self.base_geometry.with_rotation(baseline_deg))?;

        let mut comparisons = vec![];
        for &angle in &angles_deg[1..] {
            let resid = self.residuals_at(&self.base_geometry.with_rotation(angle))?;
            let test = welch_t_test(&baseline, &resid)
                .map_err(|e| MungError::Numeric(e.to_string()))?;
            info!(
                "rotation {:>6.1} vs {:>6.1}: t = {:+.3}, p = {:.4}",
                angle, baseline_deg, test.t_stat, test.p_value
            );
            comparisons.push(RotationComparison {
                angle_deg: angle,
                test,
            });
        }

        Ok(RotationReport {
            baseline_deg,
            comparisons,
        })
    }

    /// Displacement sensitivity: each magnitude (applied to both axes)
    /// is compared against the first; degradation is reported, not
    /// enforced
    pub fn displacement_sensitivity(&self, magnitudes: &[f64]) -> Result<DisplacementReport> {
        if magnitudes.len() < 2 {
            return Err(MungError::Config("need >= 2 displacement magnitudes".into()));
        }

        let baseline = self.residuals_at(
            &self
                .base_geometry
                .with_displacement(magnitudes[0], magnitudes[0]),
        )?;

        let mut comparisons = vec![];
        for &mag in &magnitudes[1..] {
            let resid =
                self.residuals_at(&self.base_geometry.with_displacement(mag, mag))?;
            let test = welch_t_test(&baseline, &resid)
                .map_err(|e| MungError::Numeric(e.to_string()))?;
            info!(
                "displacement {:>5.1}px vs {:>5.1}px: t = {:+.3}, p = {:.4e}",
                mag, magnitudes[0], test.t_stat, test.p_value
            );
            comparisons.push(DisplacementComparison {
                magnitude: mag,
                test,
            });
        }

        let monotone_degradation = comparisons
            .windows(2)
            .all(|w| w[1].test.p_value <= w[0].test.p_value);

        Ok(DisplacementReport {
            comparisons,
            monotone_degradation,
        })
    }

    /// Off-axis similarity: equal-magnitude diagonal displacements
    /// compared pairwise; none should differ significantly
    pub fn off_axis_similarity(&self, magnitude: f64) -> Result<Vec<OffAxisComparison>> {
        let directions = [
            (magnitude, magnitude),
            (magnitude, -magnitude),
            (-magnitude, magnitude),
            (-magnitude, -magnitude),
        ];

        let residuals: Vec<Vec<f64>> = directions
            .iter()
            .map(|&(dx, dy)| self.residuals_at(&self.base_geometry.with_displacement(dx, dy)))
            .collect::<Result<_>>()?;

        let mut out = vec![];
        for i in 0..directions.len() {
            for j in (i + 1)..directions.len() {
                let test = welch_t_test(&residuals[i], &residuals[j])
                    .map_err(|e| MungError::Numeric(e.to_string()))?;
                info!(
                    "off-axis {:?} vs {:?}: p = {:.4}",
                    directions[i], directions[j], test.p_value
                );
                out.push(OffAxisComparison {
                    displacement_a: directions[i],
                    displacement_b: directions[j],
                    test,
                });
            }
        }
        Ok(out)
    }

    /// Signal smoothness: sweep displacement along the x axis and fit
    /// a smoothing spline to each target feature's mean prediction. A
    /// failed per-feature fit is recorded as missing, never fatal.
    pub fn signal_smoothness(
        &self,
        displacements: &[f64],
        spline: SplineOptions,
    ) -> Result<SmoothnessReport> {
        let to_idx = self.model.index_of(&self.to)?;
        let feature_names = self.model.modalities[to_idx].col_names.clone();

        // one extraction per displacement, restricted to the spots
        // surviving every step so each series tracks the same set
        let extractions: Vec<_> = displacements
            .iter()
            .map(|&dd| {
                let gg = self.base_geometry.with_displacement(dd, 0.);
                extract(self.image, self.coords, &gg, &self.options)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut survivors: HashSet<Box<str>> =
            extractions[0].features.rows.iter().cloned().collect();
        for ext in extractions.iter().skip(1) {
            let names: HashSet<Box<str>> = ext.features.rows.iter().cloned().collect();
            survivors.retain(|x| names.contains(x));
        }
        if survivors.is_empty() {
            return Err(MungError::EmptyExtraction(
                "no spot survived the whole displacement sweep".into(),
            ));
        }

        // mean prediction per feature at each displacement
        let mut series = Mat::zeros(displacements.len(), feature_names.len());
        for (d, ext) in extractions.iter().enumerate() {
            let keep: Vec<usize> = ext
                .features
                .rows
                .iter()
                .enumerate()
                .filter(|(_, name)| survivors.contains(*name))
                .map(|(i, _)| i)
                .collect();

            let xx = ext.features.mat.select_rows(keep.iter());
            let predicted = transform(self.model, &self.from, &self.to, &xx)?;

            let nn = predicted.nrows() as f64;
            for j in 0..feature_names.len() {
                series[(d, j)] = predicted.column(j).sum() / nn;
            }
        }

        let per_feature: Vec<(Box<str>, Option<f64>)> = (0..feature_names.len())
            .into_par_iter()
            .progress_count(feature_names.len() as u64)
            .map(|j| {
                let yy: Vec<f64> = (0..displacements.len()).map(|d| series[(d, j)]).collect();
                let fit = SmoothingSpline::fit(displacements, &yy, spline);
                match fit {
                    Ok(ss) => (feature_names[j].clone(), Some(ss.adj_r2)),
                    Err(e) => {
                        warn!("spline fit skipped for '{}': {}", feature_names[j], e);
                        (feature_names[j].clone(), None)
                    }
                }
            })
            .collect();

        let fitted: Vec<f64> = per_feature.iter().filter_map(|(_, r2)| *r2).collect();
        let n_failed = per_feature.len() - fitted.len();
        let mean_adj_r2 = if fitted.is_empty() {
            f64::NAN
        } else {
            fitted.iter().sum::<f64>() / fitted.len() as f64
        };

        Ok(SmoothnessReport {
            per_feature,
            mean_adj_r2,
            n_failed,
        })
    }
}
