//! FFT-based convolution operators for image deconvolution.
//!
//! The central type is [`Convolution`], a linear operator that convolves an object with a
//! point spread function (PSF). The PSF is turned once into its modulation transfer function
//! (MTF), and every application then costs one forward and one backward FFT. The adjoint
//! multiplies by the conjugate MTF. The data may cover a sub-window of the object, in which case
//! the operator crops its output to that window and zero-pads its adjoint input.
//!
//! [`WeightedConvolutionCost`] builds the weighted least-squares data term
//! `alpha * sum_j w_j (scale * (H x)_j - d_j)^2` and its gradient on top of the convolution.
//!
//! All buffers are flat slices in column-major order: the first axis varies fastest. The
//! [`layout`] module converts from and to `ndarray` arrays.

pub mod config;
pub mod convolution;
pub mod cost;
pub mod error;
pub mod fft;
pub mod io;
pub mod layout;
pub mod mtf;
pub mod operator;
pub mod psf;
pub mod shape;
pub mod weights;

#[cfg(test)]
mod test_utils;

pub use config::ConvolutionConfig;
pub use convolution::Convolution;
pub use cost::{DifferentiableCost, WeightedConvolutionCost};
pub use error::{ConvolutionError, Result};
pub use fft::{FrequencyTransform, Real, RustFftTransform};
pub use operator::{Job, LinearOperator};
pub use shape::{Shape, Window};
