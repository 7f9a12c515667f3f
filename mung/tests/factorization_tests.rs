use dense_util::traits::{MatWithNames, SampleOps};
use mung::align::{AlignedSet, ModalityData};
use mung::common::Mat;
use mung::errors::MungError;
use mung::factorization::{FitConfig, FittedModel, InitMethod, JointFactorizationEngine};
use mung::topology::{JoinTopology, ParamClass, Sharing};

fn labels(prefix: &str, nn: usize) -> Vec<Box<str>> {
    (0..nn)
        .map(|i| format!("{}{:03}", prefix, i).into_boxed_str())
        .collect()
}

/// Two modalities generated from one shared set of sample codes
fn shared_code_set(nn: usize, p1: usize, p2: usize, kk: usize, seed: u64) -> AlignedSet {
    let aa = Mat::rnorm(nn, kk, seed);
    let b1 = Mat::rnorm(p1, kk, seed + 1);
    let b2 = Mat::rnorm(p2, kk, seed + 2);

    let x1 = &aa * b1.transpose();
    let x2 = &aa * b2.transpose();

    AlignedSet {
        row_names: labels("s", nn),
        modalities: vec![
            ModalityData {
                name: "gex".into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("g", p1),
                    mat: x1,
                },
            },
            ModalityData {
                name: "spot".into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("p", p2),
                    mat: x2,
                },
            },
        ],
    }
}

fn quick_config(kk: usize) -> FitConfig {
    FitConfig {
        k_dim: kk,
        i_dim: 2 * kk,
        j_dim: 2 * kk,
        max_iter: 50,
        tol: 1e-10,
        ridge: 1e-6,
        seed: 42,
        ..Default::default()
    }
}

#[test]
fn fit_is_deterministic() {
    let set = shared_code_set(40, 15, 12, 4, 9);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    let config = quick_config(4);

    let m1 = JointFactorizationEngine::fit(&set, &topo, &config).unwrap();
    let m2 = JointFactorizationEngine::fit(&set, &topo, &config).unwrap();

    assert_eq!(m1.n_iter, m2.n_iter);
    assert_eq!(m1.objective_trace, m2.objective_trace);
    assert_eq!(m1.shared_sample_code, m2.shared_sample_code);
    assert_eq!(
        m1.modalities[0].feature_code,
        m2.modalities[0].feature_code
    );
}

#[test]
fn random_init_is_deterministic_too() {
    let set = shared_code_set(30, 10, 10, 3, 5);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    let config = FitConfig {
        init: InitMethod::Random,
        ..quick_config(3)
    };

    let m1 = JointFactorizationEngine::fit(&set, &topo, &config).unwrap();
    let m2 = JointFactorizationEngine::fit(&set, &topo, &config).unwrap();
    assert_eq!(m1.shared_sample_code, m2.shared_sample_code);
    assert_eq!(m1.n_iter, m2.n_iter);
}

#[test]
fn fitted_shapes_follow_the_data() {
    let (nn, p1, p2, kk) = (35, 14, 9, 5);
    let set = shared_code_set(nn, p1, p2, kk, 3);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);

    let model = JointFactorizationEngine::fit(&set, &topo, &quick_config(kk)).unwrap();

    let aa = model.shared_sample_code.as_ref().unwrap();
    assert_eq!(aa.shape(), (nn, kk));
    assert_eq!(model.feature_code(0).shape(), (p1, kk));
    assert_eq!(model.feature_code(1).shape(), (p2, kk));
    assert_eq!(model.cross_term(0).shape(), (kk, kk));
    assert_eq!(model.row_names.len(), nn);
}

#[test]
fn low_rank_data_is_reconstructed() {
    let set = shared_code_set(50, 20, 16, 4, 17);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);

    let model = JointFactorizationEngine::fit(&set, &topo, &quick_config(4)).unwrap();

    for m in 0..2 {
        let xx = &set.modalities[m].data.mat;
        let recon = model.reconstruction(m);
        let rel = (xx - recon).norm() / xx.norm();
        assert!(rel < 1e-3, "modality {} relative error {}", m, rel);
        assert!(model.modalities[m].residual_scale < 0.1);
    }
}

#[test]
fn private_codes_fit_unrelated_modalities() {
    // two modalities with nothing shared but the row labels
    let nn = 40;
    let a1 = Mat::rnorm(nn, 3, 21);
    let a2 = Mat::rnorm(nn, 3, 22);
    let b1 = Mat::rnorm(12, 3, 23);
    let b2 = Mat::rnorm(10, 3, 24);

    let set = AlignedSet {
        row_names: labels("s", nn),
        modalities: vec![
            ModalityData {
                name: "gex".into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("g", 12),
                    mat: &a1 * b1.transpose(),
                },
            },
            ModalityData {
                name: "spot".into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("p", 10),
                    mat: &a2 * b2.transpose(),
                },
            },
        ],
    };

    let mut topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    for mm in topo.modalities.iter_mut() {
        mm.sample_code = Sharing::Private;
        mm.cross_term = Sharing::Private;
    }
    assert!(topo.validate().is_ok());
    assert!(!topo.is_shared(ParamClass::SampleCode));

    let model = JointFactorizationEngine::fit(&set, &topo, &quick_config(3)).unwrap();

    assert!(model.shared_sample_code.is_none());
    for m in 0..2 {
        assert!(model.modalities[m].sample_code.is_some());
        let xx = &set.modalities[m].data.mat;
        let rel = (xx - model.reconstruction(m)).norm() / xx.norm();
        assert!(rel < 1e-3, "modality {} relative error {}", m, rel);
    }
}

#[test]
fn three_modalities_share_one_code() {
    let nn = 30;
    let kk = 3;
    let aa = Mat::rnorm(nn, kk, 31);

    let names = ["gex", "spot", "protein"];
    let sizes = [11, 9, 7];

    let modalities = names
        .iter()
        .zip(sizes.iter())
        .enumerate()
        .map(|(m, (&name, &pp))| {
            let bb = Mat::rnorm(pp, kk, 100 + m as u64);
            ModalityData {
                name: name.into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("f", pp),
                    mat: &aa * bb.transpose(),
                },
            }
        })
        .collect();

    let set = AlignedSet {
        row_names: labels("s", nn),
        modalities,
    };

    let topo_names: Vec<Box<str>> = names.iter().map(|&s| s.into()).collect();
    let topo = JoinTopology::fully_shared(&topo_names);
    let model = JointFactorizationEngine::fit(&set, &topo, &quick_config(kk)).unwrap();

    assert_eq!(model.modalities.len(), 3);
    for m in 0..3 {
        let xx = &set.modalities[m].data.mat;
        let rel = (xx - model.reconstruction(m)).norm() / xx.norm();
        assert!(rel < 1e-3, "modality {} relative error {}", m, rel);
    }
}

#[test]
fn too_large_k_fails_fast() {
    let set = shared_code_set(10, 15, 12, 2, 1);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);

    let config = FitConfig {
        i_dim: 50,
        j_dim: 50,
        k_dim: 11, // > 10 samples
        ..quick_config(2)
    };

    assert!(matches!(
        JointFactorizationEngine::fit(&set, &topo, &config),
        Err(MungError::Dimensionality(_))
    ));
}

#[test]
fn zero_variance_column_fails_fast() {
    let mut set = shared_code_set(20, 8, 8, 2, 2);
    let constant = 3.5;
    for i in 0..20 {
        set.modalities[0].data.mat[(i, 4)] = constant;
    }
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);

    let err = JointFactorizationEngine::fit(&set, &topo, &quick_config(2)).unwrap_err();
    match err {
        MungError::Dimensionality(msg) => {
            assert!(msg.contains("g004"), "unexpected message: {}", msg);
            assert!(msg.contains("gex"));
        }
        other => panic!("expected dimensionality error, got {:?}", other),
    }
}

#[test]
fn working_dims_below_k_fail_fast() {
    let set = shared_code_set(20, 8, 8, 4, 2);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    let config = FitConfig {
        k_dim: 4,
        i_dim: 3,
        j_dim: 8,
        ..quick_config(4)
    };
    assert!(matches!(
        JointFactorizationEngine::fit(&set, &topo, &config),
        Err(MungError::Dimensionality(_))
    ));
}

#[test]
fn exhausted_iterations_flag_non_convergence() {
    let set = shared_code_set(25, 10, 10, 3, 8);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    let config = FitConfig {
        max_iter: 1,
        tol: 1e-16,
        init: InitMethod::Random,
        ..quick_config(3)
    };

    let model = JointFactorizationEngine::fit(&set, &topo, &config).unwrap();
    assert!(!model.converged);
    assert_eq!(model.n_iter, 1);
    // still a usable model
    assert!(model.reconstruction(0).iter().all(|v| v.is_finite()));
}

#[test]
fn snapshot_round_trip_preserves_parameters() -> anyhow::Result<()> {
    let set = shared_code_set(20, 8, 6, 2, 4);
    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    let model = JointFactorizationEngine::fit(&set, &topo, &quick_config(2)).unwrap();

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("model.json");
    let file = file.to_str().unwrap();

    model.to_json(file)?;
    let loaded = FittedModel::from_json(file)?;

    assert_eq!(model.k_dim, loaded.k_dim);
    assert_eq!(model.row_names, loaded.row_names);
    assert_eq!(model.shared_sample_code, loaded.shared_sample_code);
    assert_eq!(
        model.modalities[1].feature_code,
        loaded.modalities[1].feature_code
    );
    assert_eq!(model.converged, loaded.converged);
    Ok(())
}
