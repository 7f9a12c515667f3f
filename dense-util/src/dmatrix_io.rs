use crate::common_io::{read_lines_of_words, write_lines, Delimiter};
use crate::traits::{IoOps, MatWithNames};
use nalgebra::DMatrix;

use std::fmt::{Debug, Display};
use std::str::FromStr;

impl<T> IoOps for DMatrix<T>
where
    T: nalgebra::Scalar + Send + FromStr + Display + Copy,
    <T as FromStr>::Err: Debug,
{
    type Scalar = T;
    type Mat = Self;

    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        hdr_line: Option<usize>,
    ) -> anyhow::Result<Self::Mat> {
        let words = read_lines_of_words(file, delim, hdr_line)?.lines;

        if words.is_empty() {
            anyhow::bail!("no data in {}", file);
        }

        let ncols = words[0].len();
        let nrows = words.len();

        let data = parse_words::<T>(file, &words, None)?;
        Ok(DMatrix::<T>::from_row_iterator(nrows, ncols, data))
    }

    fn read_data(
        file: &str,
        delim: impl Into<Delimiter>,
        hdr_line: Option<usize>,
        row_name_index: Option<usize>,
        column_indices: Option<&[usize]>,
    ) -> anyhow::Result<MatWithNames<Self::Mat>> {
        let out = read_lines_of_words(file, delim, hdr_line)?;

        if out.lines.is_empty() {
            anyhow::bail!("no data in {}", file);
        }

        let width = out.lines[0].len();
        if out.lines.iter().any(|ws| ws.len() != width) {
            anyhow::bail!("ragged rows in {}", file);
        }

        let keep: Vec<usize> = match column_indices {
            Some(idx) => idx.to_vec(),
            None => (0..width).filter(|j| Some(*j) != row_name_index).collect(),
        };

        if let Some(&bad) = keep.iter().find(|&&j| j >= width) {
            anyhow::bail!("column index {} out of range in {}", bad, file);
        }

        let rows: Vec<Box<str>> = match row_name_index {
            Some(r) => {
                if r >= width {
                    anyhow::bail!("row name column {} out of range in {}", r, file);
                }
                out.lines.iter().map(|ws| ws[r].clone()).collect()
            }
            None => (0..out.lines.len())
                .map(|i| i.to_string().into_boxed_str())
                .collect(),
        };

        let cols: Vec<Box<str>> = keep
            .iter()
            .map(|&j| {
                out.header
                    .get(j)
                    .cloned()
                    .unwrap_or_else(|| format!("c{}", j).into_boxed_str())
            })
            .collect();

        let nrows = out.lines.len();
        let ncols = keep.len();
        let data = parse_words::<T>(file, &out.lines, Some(&keep))?;

        Ok(MatWithNames {
            rows,
            cols,
            mat: DMatrix::<T>::from_row_iterator(nrows, ncols, data),
        })
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()> {
        self.write_data(file, delim, None, None)
    }

    fn write_data(
        &self,
        file: &str,
        delim: &str,
        rows: Option<&[Box<str>]>,
        cols: Option<&[Box<str>]>,
    ) -> anyhow::Result<()> {
        if let Some(rr) = rows {
            if rr.len() != self.nrows() {
                anyhow::bail!("{} row names for {} rows", rr.len(), self.nrows());
            }
        }
        if let Some(cc) = cols {
            if cc.len() != self.ncols() {
                anyhow::bail!("{} column names for {} columns", cc.len(), self.ncols());
            }
        }

        let mut lines: Vec<Box<str>> = Vec::with_capacity(self.nrows() + 1);

        if let Some(cc) = cols {
            let mut hdr: Vec<String> = vec![];
            if rows.is_some() {
                hdr.push("row".to_string());
            }
            hdr.extend(cc.iter().map(|c| c.to_string()));
            lines.push(hdr.join(delim).into_boxed_str());
        }

        for (i, row) in self.row_iter().enumerate() {
            let mut words: Vec<String> = vec![];
            if let Some(rr) = rows {
                words.push(rr[i].to_string());
            }
            words.extend(row.iter().map(|x| format!("{}", *x)));
            lines.push(words.join(delim).into_boxed_str());
        }

        write_lines(&lines, file)
    }
}

fn parse_words<T>(
    file: &str,
    lines: &[Vec<Box<str>>],
    keep: Option<&[usize]>,
) -> anyhow::Result<Vec<T>>
where
    T: FromStr,
    <T as FromStr>::Err: Debug,
{
    let mut data = Vec::with_capacity(lines.len() * keep.map_or(lines[0].len(), |k| k.len()));
    for (i, ws) in lines.iter().enumerate() {
        match keep {
            Some(idx) => {
                for &j in idx {
                    data.push(parse_one::<T>(file, i, &ws[j])?);
                }
            }
            None => {
                for w in ws {
                    data.push(parse_one::<T>(file, i, w)?);
                }
            }
        }
    }
    Ok(data)
}

fn parse_one<T>(file: &str, line: usize, word: &str) -> anyhow::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: Debug,
{
    word.parse::<T>().map_err(|e| {
        anyhow::anyhow!("failed to parse '{}' (line {}) in {}: {:?}", word, line, file, e)
    })
}
