use crate::common::*;
use crate::errors::{MungError, Result};
use crate::factorization::FittedModel;

use dense_util::dmatrix_util::ridge_solve;

/// Translate observations from one modality's feature space into
/// another's through the shared latent space.
///
/// New observations were not present during fitting, so their sample
/// codes are inferred by ridge least squares against the source
/// modality's basis `C_from B_from^T`, then applied to the target's
/// `C_to B_to^T`. The model is read-only; concurrent calls are safe.
pub fn transform(model: &FittedModel, from: &str, to: &str, x: &Mat) -> Result<Mat> {
    let from_idx = model.index_of(from)?;
    let to_idx = model.index_of(to)?;

    let p_from = model.num_features(from_idx);
    if x.ncols() != p_from {
        return Err(MungError::ShapeMismatch {
            modality: from.to_string(),
            expected: p_from,
            actual: x.ncols(),
        });
    }

    let codes = infer_sample_codes(model, from_idx, x)?;
    Ok(&codes * model.cross_term(to_idx) * model.feature_code(to_idx).transpose())
}

/// Latent codes implied by new observations in one modality
pub fn infer_sample_codes(model: &FittedModel, idx: usize, x: &Mat) -> Result<Mat> {
    // basis_kp = C B^T
    let basis = model.cross_term(idx) * model.feature_code(idx).transpose();
    let gram = &basis * basis.transpose();
    let rhs = &basis * x.transpose();

    Ok(ridge_solve(&gram, &rhs, model.ridge)
        .map_err(|e| MungError::Numeric(e.to_string()))?
        .transpose())
}
