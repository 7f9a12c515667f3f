use dense_util::dmatrix_rsvd::RSVD;
use dense_util::dmatrix_util::Mat;
use dense_util::traits::SampleOps;

#[test]
fn rsvd_recovers_low_rank() -> anyhow::Result<()> {
    let uu = Mat::rnorm(40, 3, 11);
    let vv = Mat::rnorm(25, 3, 13);
    let xx = &uu * vv.transpose();

    let (u_hat, d_hat, v_hat) = xx.rsvd(3, 42)?;

    assert_eq!(u_hat.shape(), (40, 3));
    assert_eq!(d_hat.len(), 3);
    assert_eq!(v_hat.shape(), (25, 3));

    let recon = &u_hat * Mat::from_diagonal(&d_hat) * v_hat.transpose();
    let rel_err = (&recon - &xx).norm() / xx.norm();
    assert!(rel_err < 1e-8, "relative error {}", rel_err);

    Ok(())
}

#[test]
fn rsvd_basis_is_orthonormal() -> anyhow::Result<()> {
    let xx = Mat::rnorm(30, 20, 7);
    let (u_hat, _, v_hat) = xx.rsvd(5, 42)?;

    let utu = u_hat.transpose() * &u_hat;
    let vtv = v_hat.transpose() * &v_hat;
    let eye = Mat::identity(5, 5);

    assert!((utu - &eye).norm() < 1e-8);
    assert!((vtv - &eye).norm() < 1e-8);
    Ok(())
}

#[test]
fn rsvd_is_deterministic_per_seed() -> anyhow::Result<()> {
    let xx = Mat::rnorm(30, 20, 3);
    let a = xx.rsvd(4, 99)?;
    let b = xx.rsvd(4, 99)?;
    assert_eq!(a.0, b.0);
    assert_eq!(a.1, b.1);
    assert_eq!(a.2, b.2);
    Ok(())
}
