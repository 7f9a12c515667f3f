use crate::dmatrix_util::{Mat, Vec64};

/// Penalized cubic B-spline smoother (P-spline): equally spaced basis
/// segments with a second-order difference penalty on the coefficients.
#[derive(Debug, Clone)]
pub struct SmoothingSpline {
    xmin: f64,
    step: f64,
    nseg: usize,
    degree: usize,
    coefficients: Vec64,
    pub fitted: Vec<f64>,
    pub edf: f64,
    pub r2: f64,
    pub adj_r2: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SplineOptions {
    /// number of basis segments between min(x) and max(x)
    pub nseg: usize,
    /// penalty weight on squared second differences
    pub lambda: f64,
}

impl Default for SplineOptions {
    fn default() -> Self {
        Self {
            nseg: 5,
            lambda: 0.1,
        }
    }
}

impl SmoothingSpline {
    /// Fit `y ~ s(x)`. Needs at least `degree + 2` observations, finite
    /// values, non-constant `x`, and non-constant `y`.
    pub fn fit(x: &[f64], y: &[f64], opt: SplineOptions) -> anyhow::Result<Self> {
        let degree = 3;
        let nn = x.len();

        if nn != y.len() {
            anyhow::bail!("spline fit: {} x values vs {} y values", nn, y.len());
        }
        if nn < degree + 2 {
            anyhow::bail!("spline fit: need >= {} points, got {}", degree + 2, nn);
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            anyhow::bail!("spline fit: non-finite input");
        }

        let xmin = x.iter().cloned().fold(f64::INFINITY, f64::min);
        let xmax = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if xmax <= xmin {
            anyhow::bail!("spline fit: constant x");
        }

        let nseg = opt.nseg.max(1);
        let step = (xmax - xmin) / nseg as f64;
        let nbasis = nseg + degree;

        let basis = bspline_basis(x, xmin, step, nseg, degree);
        let penalty = second_difference_penalty(nbasis);

        let gram = basis.transpose() * &basis + penalty.scale(opt.lambda);
        let chol = gram
            .clone()
            .cholesky()
            .ok_or_else(|| anyhow::anyhow!("spline fit: singular penalized system"))?;

        let yy = Vec64::from_column_slice(y);
        let rhs = basis.transpose() * &yy;
        let coefficients = chol.solve(&rhs);

        // effective degrees of freedom = tr(H)
        let bb = basis.transpose() * &basis;
        let edf = chol.solve(&bb).trace();

        let fitted_v = &basis * &coefficients;
        let rss: f64 = (0..nn).map(|i| (y[i] - fitted_v[i]).powi(2)).sum();
        let mean_y = y.iter().sum::<f64>() / nn as f64;
        let tss: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();

        if tss <= 0. {
            anyhow::bail!("spline fit: constant y");
        }

        let r2 = 1. - rss / tss;
        let resid_df = nn as f64 - edf - 1.;
        let adj_r2 = if resid_df > 0. {
            1. - (1. - r2) * (nn as f64 - 1.) / resid_df
        } else {
            r2
        };

        Ok(Self {
            xmin,
            step,
            nseg,
            degree,
            coefficients,
            fitted: fitted_v.iter().cloned().collect(),
            edf,
            r2,
            adj_r2,
        })
    }

    /// Evaluate the fitted smooth at new locations (clamped to the
    /// fitting range)
    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        let basis = bspline_basis(x, self.xmin, self.step, self.nseg, self.degree);
        (basis * &self.coefficients).iter().cloned().collect()
    }
}

/// Cubic B-spline design matrix on an extended uniform knot grid,
/// evaluated by the Cox-de Boor recursion
fn bspline_basis(x: &[f64], xmin: f64, step: f64, nseg: usize, degree: usize) -> Mat {
    let nbasis = nseg + degree;
    let nknots = nbasis + degree + 1;

    // knots run from xmin - degree*step with uniform spacing
    let knot = |i: usize| xmin + (i as f64 - degree as f64) * step;

    let xmax = xmin + step * nseg as f64;
    let eps = step * 1e-9;

    let mut basis = Mat::zeros(x.len(), nbasis);

    for (r, &xv) in x.iter().enumerate() {
        // keep the right boundary inside the last interval
        let xv = xv.clamp(xmin, xmax - eps);

        let mut b = vec![0.0_f64; nknots - 1];
        for i in 0..(nknots - 1) {
            b[i] = if knot(i) <= xv && xv < knot(i + 1) {
                1.0
            } else {
                0.0
            };
        }

        for d in 1..=degree {
            for i in 0..(nknots - d - 1) {
                let left_den = knot(i + d) - knot(i);
                let right_den = knot(i + d + 1) - knot(i + 1);
                let left = if left_den > 0. {
                    (xv - knot(i)) / left_den * b[i]
                } else {
                    0.
                };
                let right = if right_den > 0. {
                    (knot(i + d + 1) - xv) / right_den * b[i + 1]
                } else {
                    0.
                };
                b[i] = left + right;
            }
        }

        for j in 0..nbasis {
            basis[(r, j)] = b[j];
        }
    }
    basis
}

/// `D^T D` for the second-order difference operator on `nbasis`
/// coefficients
fn second_difference_penalty(nbasis: usize) -> Mat {
    let nrows = nbasis.saturating_sub(2);
    let mut dd = Mat::zeros(nrows, nbasis);
    for i in 0..nrows {
        dd[(i, i)] = 1.;
        dd[(i, i + 1)] = -2.;
        dd[(i, i + 2)] = 1.;
    }
    dd.transpose() * dd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_signal_fits_well() {
        let x: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v * 0.5).sin()).collect();
        let fit = SmoothingSpline::fit(&x, &y, SplineOptions::default()).unwrap();
        assert!(fit.adj_r2 > 0.9, "adj r2 = {}", fit.adj_r2);
    }

    #[test]
    fn heavier_penalty_lowers_edf() {
        let x: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| (v * 0.8).sin() + 0.1 * v).collect();
        let loose = SmoothingSpline::fit(&x, &y, SplineOptions { nseg: 8, lambda: 1e-6 }).unwrap();
        let tight = SmoothingSpline::fit(&x, &y, SplineOptions { nseg: 8, lambda: 1e3 }).unwrap();
        assert!(tight.edf < loose.edf);
    }

    #[test]
    fn degenerate_inputs_rejected() {
        let x = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(SmoothingSpline::fit(&x, &y, SplineOptions::default()).is_err());

        let x2 = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y2 = [2.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        assert!(SmoothingSpline::fit(&x2, &y2, SplineOptions::default()).is_err());

        assert!(SmoothingSpline::fit(&[1., 2., 3.], &[1., 2., 3.], SplineOptions::default()).is_err());
    }

    #[test]
    fn predict_matches_fitted() {
        let x: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 0.3 + 1.0).collect();
        let fit = SmoothingSpline::fit(&x, &y, SplineOptions::default()).unwrap();
        let pred = fit.predict(&x);
        for i in 0..x.len() {
            assert!((pred[i] - fit.fitted[i]).abs() < 1e-9);
        }
    }
}
