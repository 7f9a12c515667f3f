use crate::align::AlignedSet;
use crate::common::*;
use crate::errors::{MungError, Result};
use crate::topology::{JoinTopology, ParamClass};

use dense_util::dmatrix_rsvd::RSVD;
use dense_util::dmatrix_util::{concatenate_horizontal, ridge_solve};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitMethod {
    /// seeded Gaussian entries scaled by `1/sqrt(k)`
    Random,
    /// truncated randomized SVD of the (concatenated) data
    PartialSvd,
}

/// Immutable fitting configuration, constructed once and threaded by
/// reference through the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    /// shared latent dimensionality
    pub k_dim: usize,
    /// sample-side working dimensionality of the SVD initialization
    pub i_dim: usize,
    /// feature-side working dimensionality of the SVD initialization
    pub j_dim: usize,
    pub max_iter: usize,
    /// relative objective decrease below which iteration stops
    pub tol: f64,
    pub ridge: f64,
    pub seed: u64,
    /// default initialization, also used for all shared parameters
    pub init: InitMethod,
    /// per-modality overrides, applied to modality-private parameters
    pub init_overrides: BTreeMap<Box<str>, InitMethod>,
    /// per-modality reconstruction weights (default 1.0)
    pub weights: BTreeMap<Box<str>, f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            k_dim: 10,
            i_dim: 20,
            j_dim: 20,
            max_iter: 100,
            tol: 1e-6,
            ridge: 1e-4,
            seed: 42,
            init: InitMethod::PartialSvd,
            init_overrides: BTreeMap::new(),
            weights: BTreeMap::new(),
        }
    }
}

/// Per-modality parameters of a fitted model; `None` entries refer to
/// the shared matrices on `FittedModel`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityParams {
    pub name: Box<str>,
    pub col_names: Vec<Box<str>>,
    pub sample_code: Option<Mat>,
    pub feature_code: Option<Mat>,
    pub cross_term: Option<Mat>,
    pub weight: f64,
    /// root mean squared residual on the training data
    pub residual_scale: f64,
}

/// Snapshot of a joint fit. Self-sufficient: everything the
/// cross-modal transform needs travels with it. Never mutated after
/// `fit` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub k_dim: usize,
    pub ridge: f64,
    pub row_names: Vec<Box<str>>,
    pub topology: JoinTopology,
    pub shared_sample_code: Option<Mat>,
    pub shared_feature_code: Option<Mat>,
    pub shared_cross_term: Option<Mat>,
    pub modalities: Vec<ModalityParams>,
    pub n_iter: usize,
    /// false when `max_iter` was exhausted before the tolerance was
    /// met; the model is still usable
    pub converged: bool,
    pub objective_trace: Vec<f64>,
}

impl FittedModel {
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.modalities
            .iter()
            .position(|m| m.name.as_ref() == name)
            .ok_or_else(|| {
                MungError::UnknownModality(
                    name.to_string(),
                    self.modalities
                        .iter()
                        .map(|m| m.name.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            })
    }

    pub fn sample_code(&self, idx: usize) -> &Mat {
        self.modalities[idx]
            .sample_code
            .as_ref()
            .or(self.shared_sample_code.as_ref())
            .expect("sample code missing from model")
    }

    pub fn feature_code(&self, idx: usize) -> &Mat {
        self.modalities[idx]
            .feature_code
            .as_ref()
            .or(self.shared_feature_code.as_ref())
            .expect("feature code missing from model")
    }

    pub fn cross_term(&self, idx: usize) -> &Mat {
        self.modalities[idx]
            .cross_term
            .as_ref()
            .or(self.shared_cross_term.as_ref())
            .expect("cross term missing from model")
    }

    pub fn num_features(&self, idx: usize) -> usize {
        self.feature_code(idx).nrows()
    }

    /// Training-data reconstruction `A_m C_m B_m^T`
    pub fn reconstruction(&self, idx: usize) -> Mat {
        self.sample_code(idx) * self.cross_term(idx) * self.feature_code(idx).transpose()
    }

    pub fn to_json(&self, file: &str) -> anyhow::Result<()> {
        let mut buf = dense_util::common_io::open_buf_writer(file)?;
        serde_json::to_writer(&mut buf, self)?;
        buf.flush()?;
        Ok(())
    }

    pub fn from_json(file: &str) -> anyhow::Result<Self> {
        let buf = dense_util::common_io::open_buf_reader(file)?;
        Ok(serde_json::from_reader(buf)?)
    }
}

/// Alternating ridge least-squares for the linked low-rank model
/// `X_m ~ A_m C_m B_m^T`, with parameters tied across modalities as
/// the join topology declares.
pub struct JointFactorizationEngine;

impl JointFactorizationEngine {
    pub fn fit(
        aligned: &AlignedSet,
        topology: &JoinTopology,
        config: &FitConfig,
    ) -> Result<FittedModel> {
        topology.validate()?;
        validate_inputs(aligned, topology, config)?;

        let kk = config.k_dim;
        let nn = aligned.row_names.len();
        let n_mod = aligned.modalities.len();

        let share_a = topology.is_shared(ParamClass::SampleCode);
        let share_b = topology.is_shared(ParamClass::FeatureCode);
        let share_c = topology.is_shared(ParamClass::CrossTerm);

        let weights: Vec<f64> = aligned
            .modalities
            .iter()
            .map(|m| *config.weights.get(&m.name).unwrap_or(&1.0))
            .collect();

        let mut params = init_params(aligned, config, share_a, share_b, share_c)?;

        let lambda = config.ridge;
        let mut objective_trace: Vec<f64> = vec![];
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 0..config.max_iter {
            update_sample_codes(&mut params, aligned, &weights, lambda, share_a)?;
            update_feature_codes(&mut params, aligned, &weights, lambda, share_b)?;
            update_cross_terms(&mut params, aligned, &weights, lambda, share_c)?;

            let obj = objective(&params, aligned, &weights, lambda);
            n_iter = iter + 1;

            if let Some(&prev) = objective_trace.last() {
                let rel = (prev - obj) / prev.abs().max(f64::MIN_POSITIVE);
                objective_trace.push(obj);
                if rel.abs() < config.tol {
                    converged = true;
                    break;
                }
            } else {
                objective_trace.push(obj);
            }
        }

        if !converged {
            warn!(
                "factorization stopped at {} iterations without meeting tol {:e}",
                n_iter, config.tol
            );
        }

        let modalities = (0..n_mod)
            .map(|m| {
                let recon = params.sample_code(m) * params.cross_term(m)
                    * params.feature_code(m).transpose();
                let resid = (&aligned.modalities[m].data.mat - recon).norm_squared();
                let dof = (nn * aligned.modalities[m].data.cols.len()) as f64;

                ModalityParams {
                    name: aligned.modalities[m].name.clone(),
                    col_names: aligned.modalities[m].data.cols.clone(),
                    sample_code: if share_a { None } else { Some(params.a_priv[m].clone()) },
                    feature_code: if share_b { None } else { Some(params.b_priv[m].clone()) },
                    cross_term: if share_c { None } else { Some(params.c_priv[m].clone()) },
                    weight: weights[m],
                    residual_scale: (resid / dof).sqrt(),
                }
            })
            .collect();

        Ok(FittedModel {
            k_dim: kk,
            ridge: lambda,
            row_names: aligned.row_names.clone(),
            topology: topology.clone(),
            shared_sample_code: if share_a { Some(params.a_shared) } else { None },
            shared_feature_code: if share_b { Some(params.b_shared) } else { None },
            shared_cross_term: if share_c { Some(params.c_shared) } else { None },
            modalities,
            n_iter,
            converged,
            objective_trace,
        })
    }
}

/// Working parameter set during alternating minimization. The shared
/// and private slots mirror the topology; only the active ones are
/// read.
struct Params {
    share_a: bool,
    share_b: bool,
    share_c: bool,
    a_shared: Mat,
    b_shared: Mat,
    c_shared: Mat,
    a_priv: Vec<Mat>,
    b_priv: Vec<Mat>,
    c_priv: Vec<Mat>,
}

impl Params {
    fn sample_code(&self, m: usize) -> &Mat {
        if self.share_a {
            &self.a_shared
        } else {
            &self.a_priv[m]
        }
    }

    fn feature_code(&self, m: usize) -> &Mat {
        if self.share_b {
            &self.b_shared
        } else {
            &self.b_priv[m]
        }
    }

    fn cross_term(&self, m: usize) -> &Mat {
        if self.share_c {
            &self.c_shared
        } else {
            &self.c_priv[m]
        }
    }
}

fn validate_inputs(
    aligned: &AlignedSet,
    topology: &JoinTopology,
    config: &FitConfig,
) -> Result<()> {
    let kk = config.k_dim;
    let nn = aligned.row_names.len();

    if kk == 0 {
        return Err(MungError::Dimensionality("k_dim must be > 0".into()));
    }
    if config.i_dim < kk || config.j_dim < kk {
        return Err(MungError::Dimensionality(format!(
            "working dimensions (i_dim {}, j_dim {}) must be >= k_dim {}",
            config.i_dim, config.j_dim, kk
        )));
    }
    if config.max_iter == 0 {
        return Err(MungError::Config("max_iter must be > 0".into()));
    }
    if !(config.ridge > 0.) {
        return Err(MungError::Config("ridge must be > 0".into()));
    }
    if nn < kk {
        return Err(MungError::Dimensionality(format!(
            "{} aligned samples < k_dim {}",
            nn, kk
        )));
    }

    if aligned.modalities.is_empty() {
        return Err(MungError::Alignment("no modalities to fit".into()));
    }

    for mm in &aligned.modalities {
        if topology.index_of(&mm.name).is_none() {
            return Err(MungError::Topology(format!(
                "modality '{}' missing from the topology",
                mm.name
            )));
        }
        if mm.data.mat.nrows() != nn {
            return Err(MungError::Alignment(format!(
                "modality '{}' has {} rows, expected {}",
                mm.name,
                mm.data.mat.nrows(),
                nn
            )));
        }
        let pp = mm.data.mat.ncols();
        if pp < kk {
            return Err(MungError::Dimensionality(format!(
                "modality '{}' has {} features < k_dim {}",
                mm.name, pp, kk
            )));
        }

        let variances = mm.data.mat.column_variances();
        if let Some(j) = variances.iter().position(|&v| v <= f64::EPSILON) {
            return Err(MungError::Dimensionality(format!(
                "zero-variance column '{}' in modality '{}'",
                mm.data.cols[j], mm.name
            )));
        }
    }

    if topology.is_shared(ParamClass::FeatureCode) {
        let p0 = aligned.modalities[0].data.mat.ncols();
        if aligned.modalities.iter().any(|m| m.data.mat.ncols() != p0) {
            return Err(MungError::Topology(
                "shared feature codes need one common feature vocabulary".into(),
            ));
        }
    }
    Ok(())
}

fn init_params(
    aligned: &AlignedSet,
    config: &FitConfig,
    share_a: bool,
    share_b: bool,
    share_c: bool,
) -> Result<Params> {
    let kk = config.k_dim;
    let nn = aligned.row_names.len();
    let n_mod = aligned.modalities.len();
    let sketch = config.i_dim.min(config.j_dim);
    let scale = 1. / (kk as f64).sqrt();

    let method_of = |name: &str| -> InitMethod {
        *config.init_overrides.get(name).unwrap_or(&config.init)
    };

    let mut a_shared = Mat::zeros(0, 0);
    let mut b_shared = Mat::zeros(0, 0);
    let mut a_priv: Vec<Mat> = vec![];
    let mut b_priv: Vec<Mat> = vec![];

    if share_a {
        // one decomposition of the concatenated view seeds the tied
        // sample codes (and the per-modality feature codes below)
        match config.init {
            InitMethod::Random => {
                a_shared = Mat::rnorm(nn, kk, config.seed).scale(scale);
            }
            InitMethod::PartialSvd => {
                let mats: Vec<Mat> = aligned
                    .modalities
                    .iter()
                    .map(|m| m.data.mat.clone())
                    .collect();
                let joined = concatenate_horizontal(&mats)
                    .map_err(|e| MungError::Numeric(e.to_string()))?;
                let (uu, dd, _) = joined
                    .rsvd(sketch, config.seed)
                    .map_err(|e| MungError::Numeric(e.to_string()))?;
                a_shared = scaled_factor(&uu, &dd, kk);
            }
        }
    }

    for (m, mm) in aligned.modalities.iter().enumerate() {
        let pp = mm.data.mat.ncols();
        let seed_m = config.seed.wrapping_add(m as u64 + 1);

        let (a_m, b_m) = match method_of(&mm.name) {
            InitMethod::Random => (
                Mat::rnorm(nn, kk, seed_m).scale(scale),
                Mat::rnorm(pp, kk, seed_m.wrapping_add(0x9e37)).scale(scale),
            ),
            InitMethod::PartialSvd => {
                let (uu, dd, vv) = mm
                    .data
                    .mat
                    .rsvd(sketch.min(pp), seed_m)
                    .map_err(|e| MungError::Numeric(e.to_string()))?;
                (scaled_factor(&uu, &dd, kk), scaled_factor(&vv, &dd, kk))
            }
        };

        a_priv.push(a_m);
        b_priv.push(b_m);
    }

    if share_b {
        // validated: one common vocabulary
        b_shared = b_priv[0].clone();
    }

    Ok(Params {
        share_a,
        share_b,
        share_c,
        a_shared,
        b_shared,
        c_shared: Mat::identity(kk, kk),
        a_priv,
        b_priv,
        c_priv: vec![Mat::identity(kk, kk); n_mod],
    })
}

/// `U[:, :k] * diag(sqrt(d[:k]))`, splitting the singular scale evenly
/// between the two factors
fn scaled_factor(uu: &Mat, dd: &DVec, kk: usize) -> Mat {
    let kk = kk.min(uu.ncols());
    let mut out = uu.columns(0, kk).into_owned();
    for j in 0..kk {
        let s = dd[j].max(0.).sqrt();
        out.column_mut(j).scale_mut(s);
    }
    out
}

fn update_sample_codes(
    params: &mut Params,
    aligned: &AlignedSet,
    weights: &[f64],
    lambda: f64,
    share_a: bool,
) -> Result<()> {
    let kk = params.cross_term(0).nrows();

    if share_a {
        let nn = aligned.row_names.len();
        let mut gram = Mat::zeros(kk, kk);
        let mut rhs_t = Mat::zeros(kk, nn);

        for (m, mm) in aligned.modalities.iter().enumerate() {
            let gg = params.cross_term(m) * params.feature_code(m).transpose();
            gram += (&gg * gg.transpose()).scale(weights[m]);
            rhs_t += (&gg * mm.data.mat.transpose()).scale(weights[m]);
        }

        params.a_shared = ridge_solve(&gram, &rhs_t, lambda)
            .map_err(|e| MungError::Numeric(e.to_string()))?
            .transpose();
    } else {
        for (m, mm) in aligned.modalities.iter().enumerate() {
            let gg = params.cross_term(m) * params.feature_code(m).transpose();
            let gram = (&gg * gg.transpose()).scale(weights[m]);
            let rhs_t = (&gg * mm.data.mat.transpose()).scale(weights[m]);
            params.a_priv[m] = ridge_solve(&gram, &rhs_t, lambda)
                .map_err(|e| MungError::Numeric(e.to_string()))?
                .transpose();
        }
    }
    Ok(())
}

fn update_feature_codes(
    params: &mut Params,
    aligned: &AlignedSet,
    weights: &[f64],
    lambda: f64,
    share_b: bool,
) -> Result<()> {
    let kk = params.cross_term(0).nrows();

    if share_b {
        let pp = aligned.modalities[0].data.mat.ncols();
        let mut gram = Mat::zeros(kk, kk);
        let mut rhs = Mat::zeros(kk, pp);

        for (m, mm) in aligned.modalities.iter().enumerate() {
            let hh = params.sample_code(m) * params.cross_term(m);
            gram += (hh.transpose() * &hh).scale(weights[m]);
            rhs += (hh.transpose() * &mm.data.mat).scale(weights[m]);
        }

        params.b_shared = ridge_solve(&gram, &rhs, lambda)
            .map_err(|e| MungError::Numeric(e.to_string()))?
            .transpose();
    } else {
        for (m, mm) in aligned.modalities.iter().enumerate() {
            let hh = params.sample_code(m) * params.cross_term(m);
            let gram = (hh.transpose() * &hh).scale(weights[m]);
            let rhs = (hh.transpose() * &mm.data.mat).scale(weights[m]);
            params.b_priv[m] = ridge_solve(&gram, &rhs, lambda)
                .map_err(|e| MungError::Numeric(e.to_string()))?
                .transpose();
        }
    }
    Ok(())
}

/// Exact regularized cross-term update through the Kronecker normal
/// equations: `sum_m w_m (B^T B (x) A^T A) vec(C) = sum_m w_m vec(A^T X B)`
fn update_cross_terms(
    params: &mut Params,
    aligned: &AlignedSet,
    weights: &[f64],
    lambda: f64,
    share_c: bool,
) -> Result<()> {
    let kk = params.cross_term(0).nrows();

    let solve_group = |members: &[usize], params: &Params| -> Result<Mat> {
        let mut lhs = Mat::zeros(kk * kk, kk * kk);
        let mut rhs = Mat::zeros(kk * kk, 1);

        for &m in members {
            let aa = params.sample_code(m);
            let bb = params.feature_code(m);
            let xx = &aligned.modalities[m].data.mat;

            let ata = aa.transpose() * aa;
            let btb = bb.transpose() * bb;
            lhs += btb.kronecker(&ata).scale(weights[m]);

            let axb = aa.transpose() * xx * bb;
            rhs += Mat::from_column_slice(kk * kk, 1, axb.as_slice()).scale(weights[m]);
        }

        let sol = ridge_solve(&lhs, &rhs, lambda)
            .map_err(|e| MungError::Numeric(e.to_string()))?;
        Ok(Mat::from_column_slice(kk, kk, sol.as_slice()))
    };

    if share_c {
        let members: Vec<usize> = (0..aligned.modalities.len()).collect();
        params.c_shared = solve_group(&members, params)?;
    } else {
        for m in 0..aligned.modalities.len() {
            params.c_priv[m] = solve_group(&[m], params)?;
        }
    }
    Ok(())
}

fn objective(params: &Params, aligned: &AlignedSet, weights: &[f64], lambda: f64) -> f64 {
    let mut obj = 0.;

    for (m, mm) in aligned.modalities.iter().enumerate() {
        let recon =
            params.sample_code(m) * params.cross_term(m) * params.feature_code(m).transpose();
        obj += weights[m] * (&mm.data.mat - recon).norm_squared();
    }

    let mut penalty = 0.;
    if params.share_a {
        penalty += params.a_shared.norm_squared();
    } else {
        penalty += params.a_priv.iter().map(|a| a.norm_squared()).sum::<f64>();
    }
    if params.share_b {
        penalty += params.b_shared.norm_squared();
    } else {
        penalty += params.b_priv.iter().map(|b| b.norm_squared()).sum::<f64>();
    }
    if params.share_c {
        penalty += params.c_shared.norm_squared();
    } else {
        penalty += params.c_priv.iter().map(|c| c.norm_squared()).sum::<f64>();
    }

    obj + lambda * penalty
}
