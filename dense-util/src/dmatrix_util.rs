use crate::traits::{MatOps, SampleOps};
pub use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub type Mat = DMatrix<f64>;
pub type Vec64 = DVector<f64>;

impl SampleOps for Mat {
    type Mat = Mat;
    type Scalar = f64;

    fn runif(dd: usize, nn: usize, seed: u64) -> Mat {
        let mut rng = StdRng::seed_from_u64(seed);
        let rvec = (0..(dd * nn)).map(|_| rng.random::<f64>()).collect();
        Mat::from_vec(dd, nn, rvec)
    }

    fn rnorm(dd: usize, nn: usize, seed: u64) -> Mat {
        let mut rng = StdRng::seed_from_u64(seed);
        let rvec = (0..(dd * nn))
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        Mat::from_vec(dd, nn, rvec)
    }
}

impl MatOps for Mat {
    type Mat = Mat;
    type Scalar = f64;

    fn centre_columns_inplace(&mut self) {
        let nn = self.nrows().max(1) as f64;
        for mut x_j in self.column_iter_mut() {
            let mu = x_j.sum() / nn;
            x_j.add_scalar_mut(-mu);
        }
    }

    fn centre_columns(&self) -> Mat {
        let mut ret = self.clone();
        ret.centre_columns_inplace();
        ret
    }

    fn scale_columns_inplace(&mut self) {
        let nn = self.nrows().max(1) as f64;
        for mut x_j in self.column_iter_mut() {
            let mu = x_j.sum() / nn;
            x_j.add_scalar_mut(-mu);
            let sig = (x_j.norm_squared() / nn).sqrt();
            if sig > 0. {
                x_j /= sig;
            }
        }
    }

    fn scale_columns(&self) -> Mat {
        let mut ret = self.clone();
        ret.scale_columns_inplace();
        ret
    }

    fn normalize_columns_inplace(&mut self) {
        for mut x_j in self.column_iter_mut() {
            let denom = x_j.norm().max(1.0);
            x_j /= denom;
        }
    }

    fn normalize_columns(&self) -> Mat {
        let mut ret = self.clone();
        ret.normalize_columns_inplace();
        ret
    }

    fn log1p_inplace(&mut self) {
        self.iter_mut().for_each(|x| *x = x.ln_1p());
    }

    fn log1p(&self) -> Mat {
        let mut ret = self.clone();
        ret.log1p_inplace();
        ret
    }

    fn column_variances(&self) -> Vec<f64> {
        let nn = self.nrows().max(1) as f64;
        self.column_iter()
            .map(|x_j| {
                let mu = x_j.sum() / nn;
                x_j.iter().map(|x| (x - mu) * (x - mu)).sum::<f64>() / nn
            })
            .collect()
    }
}

/// Stack matrices with matching column counts on top of each other
pub fn concatenate_vertical(mats: &[Mat]) -> anyhow::Result<Mat> {
    if mats.is_empty() {
        anyhow::bail!("nothing to concatenate");
    }
    let ncols = mats[0].ncols();
    if mats.iter().any(|m| m.ncols() != ncols) {
        anyhow::bail!("vertical concatenation needs matching column counts");
    }
    let nrows = mats.iter().map(|m| m.nrows()).sum();

    let mut ret = Mat::zeros(nrows, ncols);
    let mut offset = 0;
    for m in mats {
        ret.view_mut((offset, 0), (m.nrows(), ncols)).copy_from(m);
        offset += m.nrows();
    }
    Ok(ret)
}

/// Stack matrices with matching row counts side by side
pub fn concatenate_horizontal(mats: &[Mat]) -> anyhow::Result<Mat> {
    if mats.is_empty() {
        anyhow::bail!("nothing to concatenate");
    }
    let nrows = mats[0].nrows();
    if mats.iter().any(|m| m.nrows() != nrows) {
        anyhow::bail!("horizontal concatenation needs matching row counts");
    }
    let ncols = mats.iter().map(|m| m.ncols()).sum();

    let mut ret = Mat::zeros(nrows, ncols);
    let mut offset = 0;
    for m in mats {
        ret.view_mut((0, offset), (nrows, m.ncols())).copy_from(m);
        offset += m.ncols();
    }
    Ok(ret)
}

/// Solve `(G + lambda I) X = B` for symmetric positive semi-definite
/// `G` via Cholesky; `lambda > 0` keeps the system well conditioned
pub fn ridge_solve(gram: &Mat, rhs: &Mat, lambda: f64) -> anyhow::Result<Mat> {
    let kk = gram.nrows();
    if gram.ncols() != kk || rhs.nrows() != kk {
        anyhow::bail!(
            "ridge solve: incompatible shapes {}x{} vs {}x{}",
            gram.nrows(),
            gram.ncols(),
            rhs.nrows(),
            rhs.ncols()
        );
    }
    let mut lhs = gram.clone();
    for i in 0..kk {
        lhs[(i, i)] += lambda;
    }
    let chol = lhs
        .cholesky()
        .ok_or_else(|| anyhow::anyhow!("ridge solve: Cholesky failed on {}x{} system", kk, kk))?;
    Ok(chol.solve(rhs))
}
