use crate::input::*;
use crate::run_transform::reorder_columns;
use crate::vetch_common::*;

use dense_util::common_io::write_lines;
use dense_util::smoothing_spline::SplineOptions;
use mung::factorization::FittedModel;
use mung::geometry::{ExtractOptions, SpotGeometry};
use mung::validate::HarnessContext;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Image channel files (comma-separated)
    #[arg(required = true, value_delimiter(','))]
    image_files: Vec<Box<str>>,

    /// Fitted model snapshot (`vetch fit` output)
    #[arg(long, short, required = true)]
    model: Box<str>,

    /// Coordinate table of the evaluation spots
    #[arg(long = "coord", short = 'c', required = true)]
    coord_file: Box<str>,

    /// Header line index in the coordinate table; omit for headerless
    #[arg(long)]
    coord_header: Option<usize>,

    /// Column index of the spot label
    #[arg(long, default_value_t = 0)]
    label_column: usize,

    /// Column index of the x pixel coordinate
    #[arg(long, default_value_t = 1)]
    x_column: usize,

    /// Column index of the y pixel coordinate
    #[arg(long, default_value_t = 2)]
    y_column: usize,

    /// Observed target-modality table for the same spots
    #[arg(long = "truth", short = 'g', required = true)]
    truth_file: Box<str>,

    /// Restrict evaluation to the spot labels in this file (one per
    /// line, e.g. the `.test.txt` list written by `vetch fit`)
    #[arg(long = "keep")]
    keep_file: Option<Box<str>>,

    /// Header line index in the truth table
    #[arg(long, default_value_t = 0)]
    table_header: usize,

    /// Source modality
    #[arg(long, default_value = "spot")]
    from: Box<str>,

    /// Target modality
    #[arg(long, default_value = "gex")]
    to: Box<str>,

    /// Side of the square spot window, pixels
    #[arg(long, short = 's', default_value_t = 16)]
    spot_size: usize,

    /// What to do with windows that leave the image
    #[arg(long, value_enum, default_value_t = BoundsArg::Drop)]
    bounds: BoundsArg,

    /// Window shape
    #[arg(long, value_enum, default_value_t = ShapeArg::Square)]
    shape: ShapeArg,

    /// How pixels are pooled into features
    #[arg(long, value_enum, default_value_t = PoolingArg::Flatten)]
    pooling: PoolingArg,

    /// Rotation angles (degrees) for the invariance protocol; the
    /// first is the baseline
    #[arg(long, value_delimiter(','), default_value = "0,90,180,270")]
    rotations: Vec<f64>,

    /// Displacement magnitudes (pixels) for the sensitivity protocol;
    /// the first is the baseline
    #[arg(long, value_delimiter(','), default_value = "0,2,4,8")]
    displacements: Vec<f64>,

    /// Magnitude of the diagonal off-axis displacements
    #[arg(long, default_value_t = 3.)]
    off_axis: f64,

    /// Sweep displacements 1..=N pixels for the smoothness protocol
    #[arg(long, default_value_t = 10)]
    sweep_max: usize,

    /// Spline basis segments for the smoothness protocol
    #[arg(long, default_value_t = 5)]
    spline_nseg: usize,

    /// Spline penalty for the smoothness protocol
    #[arg(long, default_value_t = 0.1)]
    spline_lambda: f64,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Output header; one report file per protocol
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_validate(args: &ValidateArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();

    info!("Loading model from {}", args.model);
    let model = FittedModel::from_json(&args.model)?;

    let image = read_image(&args.image_files)?;
    let mut coords = read_coordinates(&CoordReadArgs {
        file: args.coord_file.clone(),
        header: args.coord_header,
        label_column: args.label_column,
        x_column: args.x_column,
        y_column: args.y_column,
    })?;

    let truth = read_expression(&[args.truth_file.clone()], Some(args.table_header))?;

    if let Some(keep_file) = &args.keep_file {
        let keep: std::collections::HashSet<Box<str>> =
            dense_util::common_io::read_lines(keep_file)?.into_iter().collect();
        let picked: Vec<usize> = coords
            .names
            .iter()
            .enumerate()
            .filter(|(_, name)| keep.contains(*name))
            .map(|(i, _)| i)
            .collect();
        if picked.is_empty() {
            anyhow::bail!("no coordinate rows match the labels in {}", keep_file);
        }
        info!("Keeping {} of {} spots", picked.len(), coords.names.len());
        coords = mung::extract::SpotCoordinates::new(
            picked.iter().map(|&i| coords.names[i].clone()).collect(),
            picked.iter().map(|&i| coords.x[i]).collect(),
            picked.iter().map(|&i| coords.y[i]).collect(),
        )?;
    }

    let to_idx = model.index_of(&args.to)?;
    let expected = model.modalities[to_idx].col_names.clone();
    let observed = MatWithNames {
        rows: truth.rows.clone(),
        cols: expected.clone(),
        mat: reorder_columns(&truth, &expected)?,
    };

    let ctx = HarnessContext {
        model: &model,
        image: &image,
        coords: &coords,
        observed: &observed,
        base_geometry: SpotGeometry::new(args.spot_size),
        options: ExtractOptions {
            bounds: args.bounds.into(),
            shape: args.shape.into(),
            pooling: args.pooling.into(),
        },
        from: args.from.clone(),
        to: args.to.clone(),
    };

    info!("Rotation invariance at {:?} degrees", args.rotations);
    let rotation = ctx.rotation_invariance(&args.rotations)?;
    let mut lines = vec![Box::from("#angle_deg\tt_stat\tdf\tp_value")];
    for cmp in &rotation.comparisons {
        lines.push(
            format!(
                "{}\t{:.6}\t{:.3}\t{:.6e}",
                cmp.angle_deg, cmp.test.t_stat, cmp.test.df, cmp.test.p_value
            )
            .into_boxed_str(),
        );
    }
    write_lines(&lines, &format!("{}.rotation.tsv", args.out))?;

    info!("Displacement sensitivity at {:?} pixels", args.displacements);
    let displacement = ctx.displacement_sensitivity(&args.displacements)?;
    let mut lines = vec![Box::from("#magnitude_px\tt_stat\tdf\tp_value")];
    for cmp in &displacement.comparisons {
        lines.push(
            format!(
                "{}\t{:.6}\t{:.3}\t{:.6e}",
                cmp.magnitude, cmp.test.t_stat, cmp.test.df, cmp.test.p_value
            )
            .into_boxed_str(),
        );
    }
    write_lines(&lines, &format!("{}.displacement.tsv", args.out))?;
    if !displacement.monotone_degradation {
        warn!("displacement degradation is not monotone; see the report");
    }

    info!("Off-axis similarity at +/-{} pixels", args.off_axis);
    let off_axis = ctx.off_axis_similarity(args.off_axis)?;
    let mut lines = vec![Box::from("#dx_a\tdy_a\tdx_b\tdy_b\tt_stat\tp_value")];
    for cmp in &off_axis {
        lines.push(
            format!(
                "{}\t{}\t{}\t{}\t{:.6}\t{:.6e}",
                cmp.displacement_a.0,
                cmp.displacement_a.1,
                cmp.displacement_b.0,
                cmp.displacement_b.1,
                cmp.test.t_stat,
                cmp.test.p_value
            )
            .into_boxed_str(),
        );
    }
    write_lines(&lines, &format!("{}.offaxis.tsv", args.out))?;

    info!("Smoothness sweep over 1..={} pixels", args.sweep_max);
    let sweep: Vec<f64> = (1..=args.sweep_max).map(|d| d as f64).collect();
    let smoothness = ctx.signal_smoothness(
        &sweep,
        SplineOptions {
            nseg: args.spline_nseg,
            lambda: args.spline_lambda,
        },
    )?;
    let mut lines = vec![Box::from("#feature\tadj_r2")];
    for (name, r2) in &smoothness.per_feature {
        let r2 = r2.map_or("NA".to_string(), |v| format!("{:.6}", v));
        lines.push(format!("{}\t{}", name, r2).into_boxed_str());
    }
    write_lines(&lines, &format!("{}.smoothness.tsv", args.out))?;

    info!(
        "Smoothness: mean adjusted R2 = {:.4} ({} feature(s) skipped)",
        smoothness.mean_adj_r2, smoothness.n_failed
    );

    info!("Done");
    Ok(())
}
