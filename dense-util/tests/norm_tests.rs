use approx::assert_abs_diff_eq;
use dense_util::dmatrix_util::Mat;
use dense_util::traits::{MatOps, SampleOps};

#[test]
fn normalized_columns_have_unit_norm() {
    let mut xx = Mat::runif(100, 10, 1).scale(10.);
    xx.normalize_columns_inplace();

    for j in 0..xx.ncols() {
        assert_abs_diff_eq!(xx.column(j).norm(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn scaled_columns_are_standardized() {
    let mut xx = Mat::rnorm(200, 5, 2);
    xx.scale_columns_inplace();

    let nn = xx.nrows() as f64;
    for j in 0..xx.ncols() {
        let mu = xx.column(j).sum() / nn;
        let sig2 = xx.column(j).norm_squared() / nn - mu * mu;
        assert_abs_diff_eq!(mu, 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(sig2, 1.0, epsilon = 1e-8);
    }
}

#[test]
fn column_variances_match_definition() {
    let xx = Mat::from_row_slice(4, 2, &[1., 10., 1., 20., 1., 30., 1., 40.]);
    let vars = xx.column_variances();
    assert_abs_diff_eq!(vars[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(vars[1], 125.0, epsilon = 1e-9);
}

#[test]
fn seeded_samplers_are_reproducible() {
    let a = Mat::rnorm(13, 7, 5);
    let b = Mat::rnorm(13, 7, 5);
    let c = Mat::rnorm(13, 7, 6);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
