use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rayon::prelude::*;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Delimiter for tokenizing lines; either a literal string or any of a
/// set of characters
pub enum Delimiter {
    Str(String),
    Chars(Vec<char>),
}

impl From<&str> for Delimiter {
    fn from(s: &str) -> Self {
        Delimiter::Str(s.to_string())
    }
}

impl From<Vec<char>> for Delimiter {
    fn from(chars: Vec<char>) -> Self {
        Delimiter::Chars(chars)
    }
}

impl From<&[char]> for Delimiter {
    fn from(chars: &[char]) -> Self {
        Delimiter::Chars(chars.to_vec())
    }
}

impl<const N: usize> From<&[char; N]> for Delimiter {
    fn from(chars: &[char; N]) -> Self {
        Delimiter::Chars(chars.to_vec())
    }
}

impl Delimiter {
    pub fn tokenize(&self, line: &str) -> Vec<Box<str>> {
        match self {
            Delimiter::Str(s) => line
                .split(s.as_str())
                .map(|w| w.trim_matches('"').into())
                .collect(),
            Delimiter::Chars(cs) => line
                .split(cs.as_slice())
                .filter(|w| !w.is_empty())
                .map(|w| w.trim_matches('"').into())
                .collect(),
        }
    }
}

/// Open a buffered reader; a `.gz` extension gets transparent
/// decompression
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let path = Path::new(input_file);
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", input_file, e))?;

    if path.extension() == Some(OsStr::new("gz")) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Open a buffered writer; a `.gz` extension gets transparent
/// compression
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    let path = Path::new(output_file);
    let file = File::create(path)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {}", output_file, e))?;

    if path.extension() == Some(OsStr::new("gz")) {
        Ok(Box::new(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Read every line of the input file into memory
pub fn read_lines(input_file: &str) -> anyhow::Result<Vec<Box<str>>> {
    let buf = open_buf_reader(input_file)?;
    let mut lines = vec![];
    for x in buf.lines() {
        lines.push(x?.into_boxed_str());
    }
    Ok(lines)
}

/// Write every line into the output file
pub fn write_lines<T>(lines: &[T], output_file: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_buf_writer(output_file)?;
    for line in lines {
        writeln!(buf, "{}", line)?;
    }
    buf.flush()?;
    Ok(())
}

pub struct ReadWordsOut<T: Send> {
    pub lines: Vec<Vec<T>>,
    pub header: Vec<Box<str>>,
}

/// Read lines and parse each into a vector of words or typed values.
///
/// * `hdr_line` - index of a header line among non-comment lines;
///   `None` means no header
///
/// Comment lines (`#` or `%`) are skipped. Parsing is fanned out with
/// rayon and the results are recombined by line index.
pub fn read_lines_of_words_generic<T>(
    input_file: &str,
    delim: impl Into<Delimiter>,
    hdr_line: Option<usize>,
    parse_fn: impl Fn(&Delimiter, &str) -> anyhow::Result<Vec<T>> + Sync,
) -> anyhow::Result<ReadWordsOut<T>>
where
    T: Send,
{
    let delim = delim.into();
    let buf = open_buf_reader(input_file)?;

    let lines_raw: Vec<Box<str>> = buf
        .lines()
        .map_while(Result::ok)
        .map(|x| x.into_boxed_str())
        .filter(|x| !(x.starts_with('#') || x.starts_with('%')))
        .collect();

    let mut header = vec![];

    let body: &[Box<str>] = match hdr_line {
        Some(h) => {
            if lines_raw.len() < h + 1 {
                anyhow::bail!("not enough lines in {}", input_file);
            }
            header.extend(delim.tokenize(&lines_raw[h]));
            &lines_raw[(h + 1)..]
        }
        None => &lines_raw[..],
    };

    let mut lines: Vec<(usize, Vec<T>)> = body
        .par_iter()
        .enumerate()
        .map(|(i, s)| Ok((i, parse_fn(&delim, s)?)))
        .collect::<anyhow::Result<_>>()?;

    lines.sort_by_key(|(i, _)| *i);

    Ok(ReadWordsOut {
        lines: lines.into_iter().map(|(_, ws)| ws).collect(),
        header,
    })
}

/// Tokenize lines without type conversion
pub fn read_lines_of_words(
    input_file: &str,
    delim: impl Into<Delimiter>,
    hdr_line: Option<usize>,
) -> anyhow::Result<ReadWordsOut<Box<str>>> {
    read_lines_of_words_generic(input_file, delim, hdr_line, |d, s| Ok(d.tokenize(s)))
}

/// File name without directory and (final) extension
pub fn basename(file: &str) -> anyhow::Result<Box<str>> {
    let path = Path::new(file);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("no file stem in {}", file))?;
    Ok(stem.into())
}

/// The final extension of a file name, if any
pub fn file_ext(file: &str) -> Option<Box<str>> {
    Path::new(file)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.into())
}
