pub type Mat = nalgebra::DMatrix<f64>;
pub type DVec = nalgebra::DVector<f64>;

pub use dense_util::traits::{MatOps, MatWithNames, SampleOps};

pub use log::{info, warn};
