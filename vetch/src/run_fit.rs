use crate::input::*;
use crate::vetch_common::*;

use dense_util::common_io::write_lines;
use mung::align::{align_rows, AlignedSet, ModalityData};
use mung::factorization::{FitConfig, InitMethod, JointFactorizationEngine};
use mung::split::split_rows;
use mung::topology::{JoinTopology, Sharing};

use std::collections::BTreeMap;

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Gene-expression tables, one per slide (comma-separated); slides
    /// are restricted to their common gene panel
    #[arg(long = "gex", short = 'g', required = true, value_delimiter(','))]
    gex_files: Vec<Box<str>>,

    /// Spot-feature table produced by `vetch extract`
    #[arg(long = "spot", short = 'p', required = true)]
    spot_file: Box<str>,

    /// Header line index in the input tables
    #[arg(long, default_value_t = 0)]
    table_header: usize,

    /// Shared latent dimensionality
    #[arg(long, short = 'k', default_value_t = 10)]
    k_dim: usize,

    /// Sample-side working dimensionality of the SVD initialization
    /// (default `2 * k_dim`)
    #[arg(long)]
    i_dim: Option<usize>,

    /// Feature-side working dimensionality of the SVD initialization
    /// (default `2 * k_dim`)
    #[arg(long)]
    j_dim: Option<usize>,

    /// optimization iterations
    #[arg(long, default_value_t = 100)]
    max_iter: usize,

    /// relative objective decrease that stops iteration
    #[arg(long, default_value_t = 1e-6)]
    tol: f64,

    /// ridge penalty on every parameter block
    #[arg(long, default_value_t = 1e-4)]
    ridge: f64,

    /// random seed for initialization and the train/test split
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// default initialization method
    #[arg(long, value_enum, default_value_t = InitArg::PartialSvd)]
    init: InitArg,

    /// per-modality initialization overrides, e.g. `--init-override
    /// spot=random` (applies to modality-private parameters)
    #[arg(long = "init-override", value_delimiter(','))]
    init_overrides: Vec<Box<str>>,

    /// per-modality reconstruction weights, e.g. `--weight gex=2.0`
    #[arg(long = "weight", value_delimiter(','))]
    weights: Vec<Box<str>>,

    /// keep one sample code shared across modalities
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    share_sample_codes: bool,

    /// keep one cross-term shared across modalities
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    share_cross_terms: bool,

    /// tie feature codes too (needs one common feature vocabulary)
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    share_feature_codes: bool,

    /// hold out this fraction of aligned spots for evaluation; the
    /// split is written next to the model
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Output header; writes `{out}.model.json.gz` and, with a test
    /// split, `{out}.train.txt` / `{out}.test.txt`
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_fit(args: &FitArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    let gex = read_expression(&args.gex_files, Some(args.table_header))?;
    let spot = Mat::read_data(
        &args.spot_file,
        TABLE_DELIM,
        Some(args.table_header),
        Some(0),
        None,
    )?;

    info!(
        "Aligning {} gex rows with {} spot rows",
        gex.rows.len(),
        spot.rows.len()
    );

    let mut aligned = align_rows(vec![
        ModalityData {
            name: "gex".into(),
            data: gex,
        },
        ModalityData {
            name: "spot".into(),
            data: spot,
        },
    ])?;

    info!("{} aligned spots", aligned.row_names.len());

    if let Some(frac) = args.test_fraction {
        let (train, test) = split_rows(aligned.row_names.len(), frac, args.seed)?;
        info!("{} training / {} held-out spots", train.len(), test.len());

        let train_names: Vec<Box<str>> =
            train.iter().map(|&i| aligned.row_names[i].clone()).collect();
        let test_names: Vec<Box<str>> =
            test.iter().map(|&i| aligned.row_names[i].clone()).collect();

        write_lines(&train_names, &format!("{}.train.txt", args.out))?;
        write_lines(&test_names, &format!("{}.test.txt", args.out))?;

        aligned = subset_rows(&aligned, &train);
    }

    let topology = JoinTopology {
        modalities: ["gex", "spot"]
            .iter()
            .map(|&name| mung::topology::ModalityTopology {
                name: name.into(),
                sample_code: sharing(args.share_sample_codes),
                feature_code: sharing(args.share_feature_codes),
                cross_term: sharing(args.share_cross_terms),
            })
            .collect(),
    };

    let config = FitConfig {
        k_dim: args.k_dim,
        i_dim: args.i_dim.unwrap_or(2 * args.k_dim),
        j_dim: args.j_dim.unwrap_or(2 * args.k_dim),
        max_iter: args.max_iter,
        tol: args.tol,
        ridge: args.ridge,
        seed: args.seed,
        init: args.init.into(),
        init_overrides: parse_init_overrides(&args.init_overrides)?,
        weights: parse_weights(&args.weights)?,
    };

    let model = JointFactorizationEngine::fit(&aligned, &topology, &config)?;

    if model.converged {
        info!("Converged after {} iterations", model.n_iter);
    } else {
        warn!(
            "Stopped after {} iterations without convergence; the model is usable but flagged",
            model.n_iter
        );
    }
    for mm in &model.modalities {
        info!("Residual scale [{}]: {:.4}", mm.name, mm.residual_scale);
    }

    let model_file = format!("{}.model.json.gz", args.out);
    model.to_json(&model_file)?;
    info!("Wrote {}", model_file);

    Ok(())
}

fn sharing(shared: bool) -> Sharing {
    if shared {
        Sharing::All
    } else {
        Sharing::Private
    }
}

fn subset_rows(aligned: &AlignedSet, keep: &[usize]) -> AlignedSet {
    AlignedSet {
        row_names: keep.iter().map(|&i| aligned.row_names[i].clone()).collect(),
        modalities: aligned
            .modalities
            .iter()
            .map(|mm| ModalityData {
                name: mm.name.clone(),
                data: MatWithNames {
                    rows: keep.iter().map(|&i| mm.data.rows[i].clone()).collect(),
                    cols: mm.data.cols.clone(),
                    mat: mm.data.mat.select_rows(keep.iter()),
                },
            })
            .collect(),
    }
}

fn parse_init_overrides(pairs: &[Box<str>]) -> anyhow::Result<BTreeMap<Box<str>, InitMethod>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (name, value) = parse_key_val(pair)?;
        let method = match value.as_ref() {
            "random" => InitMethod::Random,
            "partial-svd" => InitMethod::PartialSvd,
            other => anyhow::bail!("unknown init method '{}'", other),
        };
        out.insert(name, method);
    }
    Ok(out)
}

fn parse_weights(pairs: &[Box<str>]) -> anyhow::Result<BTreeMap<Box<str>, f64>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (name, value) = parse_key_val(pair)?;
        let ww: f64 = value
            .parse()
            .map_err(|_| anyhow::anyhow!("bad weight '{}'", value))?;
        if !(ww > 0.) {
            anyhow::bail!("weight for '{}' must be positive", name);
        }
        out.insert(name, ww);
    }
    Ok(out)
}
