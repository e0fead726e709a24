//! Linear operator interface through which the convolution is exposed.

use crate::error::{ConvolutionError, Result};
use crate::fft::Real;
use crate::shape::Shape;

/// How a linear operator is applied.
///
/// There is no inverse variant, see [`LinearOperator::apply_inverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    /// `dst = A * src`
    Direct,
    /// `dst = A^T * src`
    Adjoint,
}

/// A linear map from an input space to an output space.
pub trait LinearOperator<T: Real> {
    /// Shape of the space the direct operator reads from.
    fn input_shape(&self) -> &Shape;

    /// Shape of the space the direct operator writes to.
    fn output_shape(&self) -> &Shape;

    /// Applies the operator (or its adjoint) to `src` and writes the result to `dst`.
    ///
    /// For [`Job::Direct`] `src` lives in the input space and `dst` in the output space, the
    /// other way round for [`Job::Adjoint`].
    fn apply(&mut self, dst: &mut [T], src: &[T], job: Job) -> Result<()>;

    /// Inverse application.
    ///
    /// Not offered by default: inverting a convolution divides by an MTF that may be close
    /// to zero, which is numerically unsound. Use an iterative solver on the cost instead.
    fn apply_inverse(&mut self, _dst: &mut [T], _src: &[T]) -> Result<()> {
        Err(ConvolutionError::UnsupportedMode("inverse"))
    }
}
