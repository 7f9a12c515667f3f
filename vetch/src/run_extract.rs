use crate::input::*;
use crate::vetch_common::*;

use mung::extract::extract;
use mung::geometry::{ExtractOptions, SpotGeometry};

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Image channel files, one numeric grid per channel
    /// (comma-separated)
    #[arg(required = true, value_delimiter(','))]
    image_files: Vec<Box<str>>,

    /// Coordinate table with spot label, x and y columns
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

    /// Side of the square spot window, pixels
    #[arg(long, short = 's', default_value_t = 16)]
    spot_size: usize,

    /// Rotation of the window, degrees
    #[arg(long, short = 'r', default_value_t = 0.)]
    rotation: f64,

    /// Displacement along x, pixels
    #[arg(long, default_value_t = 0.)]
    dx: f64,

    /// Displacement along y, pixels
    #[arg(long, default_value_t = 0.)]
    dy: f64,

    /// What to do with windows that leave the image
    #[arg(long, value_enum, default_value_t = BoundsArg::Drop)]
    bounds: BoundsArg,

    /// Window shape
    #[arg(long, value_enum, default_value_t = ShapeArg::Square)]
    shape: ShapeArg,

    /// How pixels are pooled into features
    #[arg(long, value_enum, default_value_t = PoolingArg::Flatten)]
    pooling: PoolingArg,

    /// Output file for the spot-by-feature matrix (`.tsv` or `.tsv.gz`)
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_extract(args: &ExtractArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    let image = read_image(&args.image_files)?;
    let coords = read_coordinates(&CoordReadArgs {
        file: args.coord_file.clone(),
        header: args.coord_header,
        label_column: args.label_column,
        x_column: args.x_column,
        y_column: args.y_column,
    })?;

    let geometry = SpotGeometry::new(args.spot_size)
        .with_rotation(args.rotation)
        .with_displacement(args.dx, args.dy);

    let options = ExtractOptions {
        bounds: args.bounds.into(),
        shape: args.shape.into(),
        pooling: args.pooling.into(),
    };

    let out = extract(&image, &coords, &geometry, &options)?;

    if !out.dropped.is_empty() {
        warn!(
            "{} spot(s) dropped at image bounds: {}",
            out.dropped.len(),
            out.dropped
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    out.features.mat.write_data(
        &args.out,
        "\t",
        Some(&out.features.rows),
        Some(&out.features.cols),
    )?;

    info!(
        "Wrote {} x {} features to {}",
        out.features.mat.nrows(),
        out.features.mat.ncols(),
        args.out
    );
    Ok(())
}
