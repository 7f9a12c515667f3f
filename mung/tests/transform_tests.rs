use dense_util::traits::{MatWithNames, SampleOps};
use mung::align::{AlignedSet, ModalityData};
use mung::common::Mat;
use mung::errors::MungError;
use mung::factorization::{FitConfig, FittedModel, JointFactorizationEngine};
use mung::topology::JoinTopology;
use mung::transform::transform;

fn labels(prefix: &str, nn: usize) -> Vec<Box<str>> {
    (0..nn)
        .map(|i| format!("{}{:03}", prefix, i).into_boxed_str())
        .collect()
}

struct Scenario {
    set: AlignedSet,
    model: FittedModel,
    b_gex: Mat,
    b_spot: Mat,
}

fn fitted_scenario() -> Scenario {
    let (nn, p_gex, p_spot, kk) = (60, 18, 10, 4);
    let codes = Mat::rnorm(nn, kk, 2);
    let b_gex = Mat::rnorm(p_gex, kk, 3);
    let b_spot = Mat::rnorm(p_spot, kk, 4);

    let set = AlignedSet {
        row_names: labels("s", nn),
        modalities: vec![
            ModalityData {
                name: "gex".into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("g", p_gex),
                    mat: &codes * b_gex.transpose(),
                },
            },
            ModalityData {
                name: "spot".into(),
                data: MatWithNames {
                    rows: labels("s", nn),
                    cols: labels("p", p_spot),
                    mat: &codes * b_spot.transpose(),
                },
            },
        ],
    };

    let topo = JoinTopology::fully_shared(&["gex".into(), "spot".into()]);
    let config = FitConfig {
        k_dim: kk,
        i_dim: 2 * kk,
        j_dim: 2 * kk,
        max_iter: 80,
        tol: 1e-12,
        ridge: 1e-6,
        seed: 7,
        ..Default::default()
    };

    let model = JointFactorizationEngine::fit(&set, &topo, &config).unwrap();
    Scenario {
        set,
        model,
        b_gex,
        b_spot,
    }
}

#[test]
fn self_transform_reconstructs_training_rows() {
    let sc = fitted_scenario();
    let xx = &sc.set.modalities[1].data.mat;

    let yy = transform(&sc.model, "spot", "spot", xx).unwrap();
    let rel = (xx - &yy).norm() / xx.norm();
    assert!(rel < 1e-2, "self-transform relative error {}", rel);
}

#[test]
fn cross_transform_predicts_held_out_rows() {
    let sc = fitted_scenario();

    // fresh samples from the same generative codes
    let new_codes = Mat::rnorm(25, 4, 99);
    let new_spot = &new_codes * sc.b_spot.transpose();
    let expected_gex = &new_codes * sc.b_gex.transpose();

    let predicted = transform(&sc.model, "spot", "gex", &new_spot).unwrap();
    assert_eq!(predicted.shape(), (25, 18));

    let rel = (&predicted - &expected_gex).norm() / expected_gex.norm();
    assert!(rel < 0.05, "cross-modal relative error {}", rel);
}

#[test]
fn unknown_modality_is_rejected() {
    let sc = fitted_scenario();
    let xx = Mat::rnorm(5, 10, 1);

    let err = transform(&sc.model, "protein", "gex", &xx).unwrap_err();
    match err {
        MungError::UnknownModality(name, known) => {
            assert_eq!(name, "protein");
            assert!(known.contains("gex") && known.contains("spot"));
        }
        other => panic!("expected unknown modality, got {:?}", other),
    }

    assert!(transform(&sc.model, "spot", "tissue", &xx).is_err());
}

#[test]
fn feature_count_mismatch_is_rejected() {
    let sc = fitted_scenario();
    let xx = Mat::rnorm(5, 7, 1); // spot expects 10 features

    let err = transform(&sc.model, "spot", "gex", &xx).unwrap_err();
    match err {
        MungError::ShapeMismatch {
            modality,
            expected,
            actual,
        } => {
            assert_eq!(modality, "spot");
            assert_eq!(expected, 10);
            assert_eq!(actual, 7);
        }
        other => panic!("expected shape mismatch, got {:?}", other),
    }
}

#[test]
fn transform_leaves_the_model_untouched() {
    let sc = fitted_scenario();
    let before = sc.model.clone();

    let xx = &sc.set.modalities[1].data.mat;
    let _ = transform(&sc.model, "spot", "gex", xx).unwrap();

    assert_eq!(before.shared_sample_code, sc.model.shared_sample_code);
    assert_eq!(
        before.modalities[0].feature_code,
        sc.model.modalities[0].feature_code
    );
}

#[test]
fn snapshot_is_self_sufficient_for_transform() -> anyhow::Result<()> {
    let sc = fitted_scenario();
    let xx = &sc.set.modalities[1].data.mat;
    let in_memory = transform(&sc.model, "spot", "gex", xx).unwrap();

    let dir = tempfile::tempdir()?;
    let file = dir.path().join("model.json.gz");
    let file = file.to_str().unwrap();

    sc.model.to_json(file)?;
    let loaded = FittedModel::from_json(file)?;
    let reloaded = transform(&loaded, "spot", "gex", xx).unwrap();

    assert_eq!(in_memory, reloaded);
    Ok(())
}
