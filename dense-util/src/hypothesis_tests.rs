use statrs::distribution::{ContinuousCDF, StudentsT};

/// Welch's two-sample t-test summary
#[derive(Debug, Clone, Copy)]
pub struct WelchTest {
    pub t_stat: f64,
    pub df: f64,
    pub p_value: f64,
    pub mean_x: f64,
    pub mean_y: f64,
    pub n_x: usize,
    pub n_y: usize,
}

/// Two-sided Welch's t-test for unequal variances
///
/// Degrees of freedom follow Welch-Satterthwaite. Both samples need at
/// least two observations and at least one of them non-zero variance.
pub fn welch_t_test(xs: &[f64], ys: &[f64]) -> anyhow::Result<WelchTest> {
    let n_x = xs.len();
    let n_y = ys.len();

    if n_x < 2 || n_y < 2 {
        anyhow::bail!("welch test needs >= 2 observations per group ({}, {})", n_x, n_y);
    }

    let (mean_x, var_x) = mean_var(xs);
    let (mean_y, var_y) = mean_var(ys);

    let se_x = var_x / n_x as f64;
    let se_y = var_y / n_y as f64;
    let se2 = se_x + se_y;

    if se2 <= 0. {
        anyhow::bail!("welch test on two zero-variance samples");
    }

    let t_stat = (mean_x - mean_y) / se2.sqrt();

    let denom = se_x * se_x / (n_x as f64 - 1.) + se_y * se_y / (n_y as f64 - 1.);
    let df = se2 * se2 / denom;

    let dist = StudentsT::new(0., 1., df)
        .map_err(|e| anyhow::anyhow!("student-t with df {}: {}", df, e))?;
    let p_value = (2. * dist.sf(t_stat.abs())).clamp(0., 1.);

    Ok(WelchTest {
        t_stat,
        df,
        p_value,
        mean_x,
        mean_y,
        n_x,
        n_y,
    })
}

/// Cosine similarity between two equal-length vectors; zero if either
/// has zero norm
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> anyhow::Result<f64> {
    if a.len() != b.len() {
        anyhow::bail!("cosine on vectors of length {} and {}", a.len(), b.len());
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0. || nb == 0. {
        return Ok(0.);
    }
    Ok(dot / (na * nb))
}

/// sample mean and unbiased variance
fn mean_var(xs: &[f64]) -> (f64, f64) {
    let nn = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / nn;
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (nn - 1.);
    (mean, var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_not_significant() {
        let xs: Vec<f64> = (0..50).map(|i| (i as f64 * 0.7).sin()).collect();
        let ys = xs.clone();
        let out = welch_t_test(&xs, &ys).unwrap();
        assert!(out.p_value > 0.95);
        assert!(out.t_stat.abs() < 1e-12);
    }

    #[test]
    fn shifted_samples_significant() {
        let xs: Vec<f64> = (0..50).map(|i| (i as f64 * 0.7).sin()).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x + 10.).collect();
        let out = welch_t_test(&xs, &ys).unwrap();
        assert!(out.p_value < 1e-6);
    }

    #[test]
    fn degenerate_inputs_rejected() {
        assert!(welch_t_test(&[1.0], &[1.0, 2.0]).is_err());
        assert!(welch_t_test(&[1.0, 1.0], &[2.0, 2.0]).is_err());
    }

    #[test]
    fn cosine_of_parallel_vectors() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        let c = cosine_similarity(&a, &b).unwrap();
        assert!((c - 1.0).abs() < 1e-12);
    }
}
