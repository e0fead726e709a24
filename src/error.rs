//! Error type shared by every operator, cost and helper of the crate.
//!
//! All failures are local precondition violations reported synchronously to the caller.
//! Nothing is retried and no partial result is ever written back.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ConvolutionError>;

#[derive(Error, Debug)]
pub enum ConvolutionError {
    /// A shape was empty or contained a zero-length dimension.
    #[error("invalid shape {0:?}: dimensions must be non-empty and strictly positive")]
    InvalidShape(Vec<usize>),

    #[error("rank mismatch: expected {expected}, found {found}")]
    RankMismatch { expected: usize, found: usize },

    #[error("size mismatch for {what}: expected {expected}, found {found}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{what} out of range on axis {axis}: {value} exceeds {limit}")]
    OutOfRange {
        what: &'static str,
        axis: usize,
        value: usize,
        limit: usize,
    },

    #[error("invalid weight {value} at index {index}: weights must be finite and non-negative")]
    InvalidWeight { index: usize, value: f64 },

    #[error("invalid data value {value} at index {index}: data must be finite where the weight is positive")]
    InvalidData { index: usize, value: f64 },

    #[error("invalid PSF: {0}")]
    InvalidPsf(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no PSF (MTF) has been set")]
    MissingPsf,

    #[error("no data has been set")]
    MissingData,

    /// Only direct and adjoint application are offered.
    #[error("unsupported operator mode: {0}")]
    UnsupportedMode(&'static str),

    #[error("unsupported rank {0}: only 1, 2 and 3 dimensional transforms are available")]
    UnsupportedRank(usize),

    #[error("array layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed reading npy file: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error("failed writing npy file: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("failed reading npz archive: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),
}
