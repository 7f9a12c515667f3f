use crate::common::*;
use crate::errors::{MungError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One modality's labelled observation matrix before alignment
#[derive(Debug, Clone)]
pub struct ModalityData {
    pub name: Box<str>,
    pub data: MatWithNames<Mat>,
}

/// Modalities after alignment: one shared, sorted row-label ordering,
/// rows reindexed in every matrix
#[derive(Debug, Clone)]
pub struct AlignedSet {
    pub row_names: Vec<Box<str>>,
    pub modalities: Vec<ModalityData>,
}

/// Row-align modalities measured on the same physical spots.
///
/// The shared ordering is the sorted intersection of the row-label
/// sets, so repeated runs on the same inputs are reproducible. Labels
/// missing from any modality are silently excluded; an empty
/// intersection is an error.
pub fn align_rows(modalities: Vec<ModalityData>) -> Result<AlignedSet> {
    if modalities.is_empty() {
        return Err(MungError::Alignment("no modalities to align".into()));
    }

    let mut common: HashSet<Box<str>> = modalities[0].data.rows.iter().cloned().collect();
    for mm in modalities.iter().skip(1) {
        let names: HashSet<Box<str>> = mm.data.rows.iter().cloned().collect();
        common.retain(|x| names.contains(x));
    }

    if common.is_empty() {
        let summary = modalities
            .iter()
            .map(|m| format!("{} ({} rows)", m.name, m.data.rows.len()))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(MungError::Alignment(format!(
            "no common row labels across {}",
            summary
        )));
    }

    let mut row_names: Vec<Box<str>> = common.into_iter().collect();
    row_names.sort();

    let modalities = modalities
        .into_iter()
        .map(|mm| {
            let index: HashMap<&Box<str>, usize> = mm
                .data
                .rows
                .iter()
                .enumerate()
                .map(|(i, name)| (name, i))
                .collect();
            let picked: Vec<usize> = row_names.iter().map(|name| index[name]).collect();

            ModalityData {
                name: mm.name,
                data: MatWithNames {
                    rows: row_names.clone(),
                    cols: mm.data.cols.clone(),
                    mat: mm.data.mat.select_rows(picked.iter()),
                },
            }
        })
        .collect();

    Ok(AlignedSet {
        row_names,
        modalities,
    })
}

/// Column-align several instances of one modality (e.g. slides
/// profiling different gene panels) onto their sorted common feature
/// vocabulary.
pub fn intersect_columns(instances: Vec<MatWithNames<Mat>>) -> Result<Vec<MatWithNames<Mat>>> {
    if instances.is_empty() {
        return Err(MungError::Alignment("no instances to intersect".into()));
    }

    let mut common: HashSet<Box<str>> = instances[0].cols.iter().cloned().collect();
    for inst in instances.iter().skip(1) {
        let names: HashSet<Box<str>> = inst.cols.iter().cloned().collect();
        common.retain(|x| names.contains(x));
    }

    if common.is_empty() {
        return Err(MungError::Alignment(format!(
            "no common columns across {} instances",
            instances.len()
        )));
    }

    let mut col_names: Vec<Box<str>> = common.into_iter().collect();
    col_names.sort();

    Ok(instances
        .into_iter()
        .map(|inst| {
            let index: BTreeMap<&Box<str>, usize> = inst
                .cols
                .iter()
                .enumerate()
                .map(|(j, name)| (name, j))
                .collect();
            let picked: Vec<usize> = col_names.iter().map(|name| index[name]).collect();

            MatWithNames {
                rows: inst.rows.clone(),
                cols: col_names.clone(),
                mat: inst.mat.select_columns(picked.iter()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(rows: &[&str], cols: &[&str], data: &[f64]) -> MatWithNames<Mat> {
        MatWithNames {
            rows: rows.iter().map(|s| Box::from(*s)).collect(),
            cols: cols.iter().map(|s| Box::from(*s)).collect(),
            mat: Mat::from_row_slice(rows.len(), cols.len(), data),
        }
    }

    #[test]
    fn intersection_in_sorted_order() {
        let gex = ModalityData {
            name: "gex".into(),
            data: named(&["a", "b", "c"], &["g1"], &[1., 2., 3.]),
        };
        let spot = ModalityData {
            name: "spot".into(),
            data: named(&["d", "c", "b"], &["p1"], &[9., 8., 7.]),
        };

        let out = align_rows(vec![gex, spot]).unwrap();
        assert_eq!(out.row_names, vec![Box::from("b"), Box::from("c")]);

        // gex rows b, c
        assert_eq!(out.modalities[0].data.mat, Mat::from_row_slice(2, 1, &[2., 3.]));
        // spot rows b, c (reordered from [d, c, b])
        assert_eq!(out.modalities[1].data.mat, Mat::from_row_slice(2, 1, &[7., 8.]));
    }

    #[test]
    fn disjoint_rows_fail() {
        let aa = ModalityData {
            name: "gex".into(),
            data: named(&["a", "b"], &["g1"], &[1., 2.]),
        };
        let bb = ModalityData {
            name: "spot".into(),
            data: named(&["c", "d"], &["p1"], &[3., 4.]),
        };
        assert!(matches!(
            align_rows(vec![aa, bb]),
            Err(MungError::Alignment(_))
        ));
    }

    #[test]
    fn column_intersection_across_instances() {
        let s1 = named(&["r1"], &["g1", "g2", "g3"], &[1., 2., 3.]);
        let s2 = named(&["r2"], &["g3", "g0", "g2"], &[30., 0., 20.]);

        let out = intersect_columns(vec![s1, s2]).unwrap();
        assert_eq!(out[0].cols, vec![Box::from("g2"), Box::from("g3")]);
        assert_eq!(out[0].mat, Mat::from_row_slice(1, 2, &[2., 3.]));
        assert_eq!(out[1].mat, Mat::from_row_slice(1, 2, &[20., 30.]));
    }

    #[test]
    fn disjoint_columns_fail() {
        let s1 = named(&["r1"], &["g1"], &[1.]);
        let s2 = named(&["r2"], &["g2"], &[2.]);
        assert!(intersect_columns(vec![s1, s2]).is_err());
    }
}
