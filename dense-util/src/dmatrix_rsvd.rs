use crate::dmatrix_util::{Mat, Vec64};
use crate::traits::SampleOps;
use log::debug;

pub trait RSVD {
    /// Truncated singular value decomposition `X ~ U * diag(d) * V^T`
    fn rsvd(&self, rank: usize, seed: u64) -> anyhow::Result<(Mat, Vec64, Mat)>;
}

impl RSVD for Mat {
    fn rsvd(&self, rank: usize, seed: u64) -> anyhow::Result<(Mat, Vec64, Mat)> {
        let default_iter = 5;
        let mut rsvd = RandomizedSvd::new(rank, default_iter, seed);
        rsvd.compute(self)?;
        Ok((
            rsvd.matrix_u().clone(),
            rsvd.singular_values().clone(),
            rsvd.matrix_v().clone(),
        ))
    }
}

/// Randomized SVD, Alg 4.4 of Halko et al. (2009), with subspace
/// iteration re-orthonormalized by QR at each power step. The random
/// test matrix is drawn from a seeded generator so that repeated calls
/// are bit-identical.
pub struct RandomizedSvd {
    max_rank: usize,
    iter: usize,
    seed: u64,
    u_vectors: Mat,
    singular_values: Vec64,
    v_vectors: Mat,
}

impl RandomizedSvd {
    pub fn new(max_rank: usize, iter: usize, seed: u64) -> Self {
        Self {
            max_rank,
            iter,
            seed,
            u_vectors: Mat::zeros(0, 0),
            singular_values: Vec64::zeros(0),
            v_vectors: Mat::zeros(0, 0),
        }
    }

    pub fn matrix_u(&self) -> &Mat {
        &self.u_vectors
    }

    pub fn matrix_v(&self) -> &Mat {
        &self.v_vectors
    }

    pub fn singular_values(&self) -> &Vec64 {
        &self.singular_values
    }

    pub fn compute(&mut self, xx: &Mat) -> anyhow::Result<()> {
        let nr = xx.nrows();
        let nc = xx.ncols();

        if nr == 0 || nc == 0 {
            anyhow::bail!("rsvd on an empty {} x {} matrix", nr, nc);
        }

        let mut rank = nr.min(nc);
        let mut oversample = 0;

        if self.max_rank > 0 && rank > self.max_rank {
            rank = self.max_rank;
            oversample = 5;
        }

        let qq = self.rand_subspace_iteration(xx, (rank + oversample).min(nc));
        let rank = rank.min(qq.ncols());
        let qq = qq.columns(0, rank).into_owned();

        debug!("final svd on [{} x {}]", rank, nc);

        let bb = qq.transpose() * xx;
        let svd = bb.svd(true, true);

        match (svd.u, svd.v_t) {
            (Some(svd_u), Some(svd_vt)) => {
                self.u_vectors = &qq * svd_u.columns(0, rank).into_owned();
                self.v_vectors = svd_vt.transpose().columns(0, rank).into_owned();
                self.singular_values = svd.singular_values.rows(0, rank).into_owned();
                Ok(())
            }
            _ => anyhow::bail!("svd failed on the projected {} x {} matrix", rank, nc),
        }
    }

    /// Orthonormal basis whose range approximates the range of `xx`
    fn rand_subspace_iteration(&self, xx: &Mat, sketch: usize) -> Mat {
        let omega = Mat::rnorm(xx.ncols(), sketch, self.seed);
        let mut qq = thin_q(&(xx * omega), sketch);

        for it in 0..self.iter {
            debug!("subspace iteration {:>4}", it + 1);
            let ww = thin_q(&(xx.transpose() * &qq), sketch);
            qq = thin_q(&(xx * ww), sketch);
        }
        qq
    }
}

fn thin_q(xx: &Mat, sketch: usize) -> Mat {
    let qr = xx.clone().qr();
    let qmat = qr.q();
    let kk = sketch.min(qmat.ncols());
    qmat.columns(0, kk).into_owned()
}
