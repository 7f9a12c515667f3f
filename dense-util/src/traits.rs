use crate::common_io::Delimiter;

/// Column-wise transformations on dense matrices
pub trait MatOps {
    type Mat;
    type Scalar;

    fn centre_columns_inplace(&mut self);
    fn centre_columns(&self) -> Self::Mat;

    /// z-score each column; a zero-variance column is left centred
    fn scale_columns_inplace(&mut self);
    fn scale_columns(&self) -> Self::Mat;

    /// `Y[,j] = X[,j] / max(1, norm(X[,j]))`
    fn normalize_columns_inplace(&mut self);
    fn normalize_columns(&self) -> Self::Mat;

    fn log1p_inplace(&mut self);
    fn log1p(&self) -> Self::Mat;

    fn column_variances(&self) -> Vec<Self::Scalar>;
}

/// Seeded random matrix sampling; every sampler takes an explicit seed
/// so repeated calls are reproducible
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// `d x n` matrix with elements from `U(0,1)`
    fn runif(dd: usize, nn: usize, seed: u64) -> Self::Mat;

    /// `d x n` matrix with elements from `N(0,1)`
    fn rnorm(dd: usize, nn: usize, seed: u64) -> Self::Mat;
}

/// A matrix together with its row and column labels
#[derive(Debug, Clone)]
pub struct MatWithNames<M> {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub mat: M,
}

/// Read and write matrices from and to delimited files
pub trait IoOps {
    type Scalar;
    type Mat;

    /// Read a matrix of numbers without any labels
    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        hdr_line: Option<usize>,
    ) -> anyhow::Result<Self::Mat>;

    /// Read a labelled matrix. The `row_name_index` column supplies row
    /// labels; `column_indices` restricts which data columns are kept
    /// (in the given order). With a header line the kept columns get
    /// their header names, otherwise `c{index}` placeholders.
    fn read_data(
        file: &str,
        delim: impl Into<Delimiter>,
        hdr_line: Option<usize>,
        row_name_index: Option<usize>,
        column_indices: Option<&[usize]>,
    ) -> anyhow::Result<MatWithNames<Self::Mat>>;

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn write_data(
        &self,
        file: &str,
        delim: &str,
        rows: Option<&[Box<str>]>,
        cols: Option<&[Box<str>]>,
    ) -> anyhow::Result<()>;

    fn from_tsv(tsv_file: &str, hdr_line: Option<usize>) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(tsv_file, "\t", hdr_line)
    }

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }
}
