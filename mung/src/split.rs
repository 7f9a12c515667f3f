use crate::errors::{MungError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Disjoint train/evaluation partition of row indices. A fixed seed
/// gives the same split on every run; both sides come back sorted so
/// downstream row order stays stable.
pub fn split_rows(nn: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0. ..1.).contains(&test_fraction) || test_fraction <= 0. {
        return Err(MungError::Config(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    if nn < 2 {
        return Err(MungError::Config(format!(
            "cannot split {} samples into train and test",
            nn
        )));
    }

    let mut indices: Vec<usize> = (0..nn).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((nn as f64 * test_fraction).round() as usize).clamp(1, nn - 1);

    let mut test: Vec<usize> = indices[..n_test].to_vec();
    let mut train: Vec<usize> = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();

    Ok((train, test))
}
