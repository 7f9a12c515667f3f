use crate::vetch_common::*;

use dense_util::common_io::{basename, read_lines_of_words};
use mung::align::intersect_columns;
use mung::extract::SpotCoordinates;
use mung::image::ImageRaster;

use dense_util::dmatrix_util::concatenate_vertical;

/// Where to find the spot identifier and pixel coordinates in the
/// coordinate table
#[derive(Debug, Clone)]
pub struct CoordReadArgs {
    pub file: Box<str>,
    /// header line index among non-comment lines; `None` = headerless
    pub header: Option<usize>,
    pub label_column: usize,
    pub x_column: usize,
    pub y_column: usize,
}

/// Read a delimited coordinate table into spot centers
pub fn read_coordinates(args: &CoordReadArgs) -> anyhow::Result<SpotCoordinates> {
    info!("Reading coordinate file: {}", args.file);

    let out = read_lines_of_words(&args.file, TABLE_DELIM, args.header)?;

    let mut names = Vec::with_capacity(out.lines.len());
    let mut xs = Vec::with_capacity(out.lines.len());
    let mut ys = Vec::with_capacity(out.lines.len());

    let needed = args.label_column.max(args.x_column).max(args.y_column);

    for (i, words) in out.lines.iter().enumerate() {
        if words.len() <= needed {
            anyhow::bail!(
                "coordinate line {} has {} columns, need index {}",
                i,
                words.len(),
                needed
            );
        }
        names.push(words[args.label_column].clone());
        xs.push(parse_f64(&words[args.x_column], &args.file, i)?);
        ys.push(parse_f64(&words[args.y_column], &args.file, i)?);
    }

    info!("Read {} spot coordinates", names.len());
    Ok(SpotCoordinates::new(names, xs, ys)?)
}

/// Read one or more expression tables (rows = spots, first column =
/// spot label, header = feature names). Multiple slides are restricted
/// to their common feature vocabulary and stacked; spot labels get a
/// slide prefix when more than one file is given.
pub fn read_expression(
    files: &[Box<str>],
    header: Option<usize>,
) -> anyhow::Result<MatWithNames<Mat>> {
    if files.is_empty() {
        anyhow::bail!("no expression files");
    }

    let attach_name = files.len() > 1;
    let mut instances = vec![];

    for file in files {
        info!("Reading expression file: {}", file);
        let mut data = Mat::read_data(file, TABLE_DELIM, header, Some(0), None)?;

        if attach_name {
            let tag = basename(file)?;
            data.rows = data
                .rows
                .iter()
                .map(|r| format!("{}_{}", tag, r).into_boxed_str())
                .collect();
        }
        instances.push(data);
    }

    let instances = intersect_columns(instances)?;

    let cols = instances[0].cols.clone();
    let rows: Vec<Box<str>> = instances
        .iter()
        .flat_map(|inst| inst.rows.iter().cloned())
        .collect();
    let mats: Vec<Mat> = instances.into_iter().map(|inst| inst.mat).collect();
    let mat = concatenate_vertical(&mats)?;

    info!("Read {} spots x {} features", rows.len(), cols.len());
    Ok(MatWithNames { rows, cols, mat })
}

/// Assemble an image from one numeric grid per channel
pub fn read_image(channel_files: &[Box<str>]) -> anyhow::Result<ImageRaster> {
    let mut planes = vec![];
    for file in channel_files {
        info!("Reading image channel: {}", file);
        planes.push(Mat::read_file_delim(file, TABLE_DELIM, None)?);
    }
    let image = ImageRaster::new(planes)?;
    info!(
        "Image: {} x {} pixels, {} channel(s)",
        image.height(),
        image.width(),
        image.channels()
    );
    Ok(image)
}

fn parse_f64(word: &str, file: &str, line: usize) -> anyhow::Result<f64> {
    word.parse::<f64>()
        .map_err(|_| anyhow::anyhow!("bad number '{}' (line {}) in {}", word, line, file))
}
