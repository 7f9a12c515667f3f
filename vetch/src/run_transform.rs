use crate::vetch_common::*;

use mung::factorization::FittedModel;
use mung::transform::transform;

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Fitted model snapshot (`vetch fit` output)
    #[arg(long, short, required = true)]
    model: Box<str>,

    /// Source modality name
    #[arg(long, required = true)]
    from: Box<str>,

    /// Target modality name
    #[arg(long, required = true)]
    to: Box<str>,

    /// Observations in the source modality's feature space (rows =
    /// spots, first column = label, header = feature names)
    #[arg(long, short, required = true)]
    data: Box<str>,

    /// Header line index in the data table
    #[arg(long, default_value_t = 0)]
    table_header: usize,

    /// Output file for the predicted target-modality matrix
    #[arg(long, short, required = true)]
    out: Box<str>,

    /// verbosity
    #[arg(long, short)]
    verbose: bool,
}

pub fn run_transform(args: &TransformArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    info!("Loading model from {}", args.model);
    let model = FittedModel::from_json(&args.model)?;

    let data = Mat::read_data(
        &args.data,
        TABLE_DELIM,
        Some(args.table_header),
        Some(0),
        None,
    )?;

    let from_idx = model.index_of(&args.from)?;
    let xx = reorder_columns(&data, &model.modalities[from_idx].col_names)?;

    info!(
        "Transforming {} observations: {} -> {}",
        xx.nrows(),
        args.from,
        args.to
    );

    let predicted = transform(&model, &args.from, &args.to, &xx)?;

    let to_idx = model.index_of(&args.to)?;
    predicted.write_data(
        &args.out,
        "\t",
        Some(&data.rows),
        Some(&model.modalities[to_idx].col_names),
    )?;

    info!("Wrote {}", args.out);
    Ok(())
}

/// Put the input columns into the order the model was fitted with; a
/// missing feature is an error, extras are ignored
pub fn reorder_columns(
    data: &MatWithNames<Mat>,
    expected: &[Box<str>],
) -> anyhow::Result<Mat> {
    if data.cols == expected {
        return Ok(data.mat.clone());
    }

    let index: std::collections::HashMap<&Box<str>, usize> = data
        .cols
        .iter()
        .enumerate()
        .map(|(j, name)| (name, j))
        .collect();

    let picked = expected
        .iter()
        .map(|name| {
            index.get(name).copied().ok_or_else(|| {
                anyhow::anyhow!("feature '{}' missing from the input table", name)
            })
        })
        .collect::<anyhow::Result<Vec<usize>>>()?;

    Ok(data.mat.select_columns(picked.iter()))
}
