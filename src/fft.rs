//! Frequency transform used by the convolution operators.
//!
//! The workspace is a slice of `Complex<T>`, which has the memory layout of an interleaved
//! real/imaginary buffer of `2 * N` scalars. Transforms are unnormalized in both directions:
//! the caller applies the `1 / N` factor after a backward pass.
//!
//! [`Real`], the scalar trait used throughout the crate, extends the `rustfft` sample bound
//! `FftNum` and is re-exported at the crate root.

use crate::error::{ConvolutionError, Result};
use crate::shape::Shape;
use num_complex::Complex;
use num_traits::Float;
use rustfft::{Fft, FftNum, FftPlanner};
use std::fmt::Display;
use std::sync::Arc;

/// Floating-point sample type handled by the operators (`f32` or `f64`).
pub trait Real: FftNum + Float + Display {
    /// Widens the sample to double precision.
    fn as_f64(self) -> f64;

    /// Narrows a double precision value to the sample type.
    fn from_f64_lossy(value: f64) -> Self;
}

impl Real for f32 {
    fn as_f64(self) -> f64 {
        self as f64
    }

    fn from_f64_lossy(value: f64) -> Self {
        value as f32
    }
}

impl Real for f64 {
    fn as_f64(self) -> f64 {
        self
    }

    fn from_f64_lossy(value: f64) -> Self {
        value
    }
}

/// An in-place multi-dimensional complex FFT over a fixed shape.
pub trait FrequencyTransform<T: Real> {
    /// Shape the transform was planned for.
    fn shape(&self) -> &Shape;

    /// Forward transform, in place.
    fn forward(&mut self, buffer: &mut [Complex<T>]) -> Result<()>;

    /// Unnormalized backward transform, in place.
    fn backward(&mut self, buffer: &mut [Complex<T>]) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

struct AxisPlan<T> {
    forward: Arc<dyn Fft<T>>,
    backward: Arc<dyn Fft<T>>,
}

/// `FrequencyTransform` backed by `rustfft`.
///
/// One forward and one backward plan are cached per axis, together with a scratch buffer
/// large enough for every plan and a line buffer used to gather strided axes.
pub struct RustFftTransform<T: Real> {
    shape: Shape,
    axes: Vec<AxisPlan<T>>,
    scratch: Vec<Complex<T>>,
    line: Vec<Complex<T>>,
}

impl<T: Real> RustFftTransform<T> {
    /// Plans the transforms for `shape`.
    ///
    /// # Errors
    /// - `UnsupportedRank` if the rank is not 1, 2 or 3.
    pub fn new(shape: &Shape) -> Result<Self> {
        if !(1..=3).contains(&shape.rank()) {
            return Err(ConvolutionError::UnsupportedRank(shape.rank()));
        }
        let mut planner = FftPlanner::<T>::new();
        let axes: Vec<AxisPlan<T>> = shape
            .dims()
            .iter()
            .map(|&d| AxisPlan {
                forward: planner.plan_fft_forward(d),
                backward: planner.plan_fft_inverse(d),
            })
            .collect();
        let scratch_len = axes
            .iter()
            .map(|p| {
                p.forward
                    .get_inplace_scratch_len()
                    .max(p.backward.get_inplace_scratch_len())
            })
            .max()
            .unwrap_or(0);
        let line_len = shape.dims().iter().copied().max().unwrap_or(0);
        let zero = Complex::new(T::zero(), T::zero());

        log::debug!("planned {}-D transform for shape {}", shape.rank(), shape);

        Ok(RustFftTransform {
            shape: shape.clone(),
            axes,
            scratch: vec![zero; scratch_len],
            line: vec![zero; line_len],
        })
    }

    fn run(&mut self, buffer: &mut [Complex<T>], direction: Direction) -> Result<()> {
        let n = self.shape.number();
        if buffer.len() != n {
            return Err(ConvolutionError::SizeMismatch {
                what: "transform buffer",
                expected: n,
                found: buffer.len(),
            });
        }

        let RustFftTransform {
            shape,
            axes,
            scratch,
            line,
        } = self;

        for (axis, plan) in axes.iter().enumerate() {
            let d = shape.dimension(axis);
            if d == 1 {
                continue;
            }
            let fft = match direction {
                Direction::Forward => &plan.forward,
                Direction::Backward => &plan.backward,
            };
            let stride = shape.stride(axis);
            if stride == 1 {
                // contiguous lines, processed back to back
                fft.process_with_scratch(buffer, scratch);
                continue;
            }
            let line = &mut line[..d];
            let block = stride * d;
            for base in (0..n).step_by(block) {
                for start in base..base + stride {
                    for (j, v) in line.iter_mut().enumerate() {
                        *v = buffer[start + j * stride];
                    }
                    fft.process_with_scratch(line, scratch);
                    for (j, v) in line.iter().enumerate() {
                        buffer[start + j * stride] = *v;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<T: Real> FrequencyTransform<T> for RustFftTransform<T> {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn forward(&mut self, buffer: &mut [Complex<T>]) -> Result<()> {
        self.run(buffer, Direction::Forward)
    }

    fn backward(&mut self, buffer: &mut [Complex<T>]) -> Result<()> {
        self.run(buffer, Direction::Backward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::random_vec;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_impulse_transforms_to_ones() {
        let shape = Shape::from_dims(&[4, 3, 2]).unwrap();
        let mut fft = RustFftTransform::<f64>::new(&shape).unwrap();
        let mut buffer = vec![Complex::new(0.0, 0.0); shape.number()];
        buffer[0] = Complex::new(1.0, 0.0);
        fft.forward(&mut buffer).unwrap();
        for z in &buffer {
            assert_abs_diff_eq!(z.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(z.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_forward_backward_round_trip_is_n_times_identity() {
        let shape = Shape::from_dims(&[5, 4, 3]).unwrap();
        let n = shape.number() as f64;
        let mut fft = RustFftTransform::<f64>::new(&shape).unwrap();
        let values = random_vec::<f64>(shape.number(), 3);
        let mut buffer: Vec<Complex<f64>> =
            values.iter().map(|&v| Complex::new(v, 0.0)).collect();
        fft.forward(&mut buffer).unwrap();
        fft.backward(&mut buffer).unwrap();
        for (z, v) in buffer.iter().zip(&values) {
            assert_abs_diff_eq!(z.re / n, *v, epsilon = 1e-12);
            assert_abs_diff_eq!(z.im / n, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_matches_direct_dft_along_second_axis() {
        // A signal varying only along axis 1 must transform like a 1-D DFT of that axis.
        let shape = Shape::from_dims(&[2, 4]).unwrap();
        let mut fft = RustFftTransform::<f64>::new(&shape).unwrap();
        let mut buffer = vec![Complex::new(0.0, 0.0); 8];
        // x[i0, 1] = 1 for both i0
        buffer[2] = Complex::new(1.0, 0.0);
        buffer[3] = Complex::new(1.0, 0.0);
        fft.forward(&mut buffer).unwrap();
        for k1 in 0..4 {
            let phase = -2.0 * std::f64::consts::PI * k1 as f64 / 4.0;
            // axis 0 sums two equal values at k0 = 0 and cancels at k0 = 1
            assert_abs_diff_eq!(buffer[2 * k1].re, 2.0 * phase.cos(), epsilon = 1e-12);
            assert_abs_diff_eq!(buffer[2 * k1].im, 2.0 * phase.sin(), epsilon = 1e-12);
            assert_abs_diff_eq!(buffer[2 * k1 + 1].norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let shape = Shape::from_dims(&[8]).unwrap();
        let mut fft = RustFftTransform::<f32>::new(&shape).unwrap();
        let mut buffer = vec![Complex::new(0.0f32, 0.0); 7];
        assert!(matches!(
            fft.backward(&mut buffer),
            Err(ConvolutionError::SizeMismatch {
                expected: 8,
                found: 7,
                ..
            })
        ));
    }

    #[test]
    fn test_rank_four_is_unsupported() {
        let shape = Shape::from_dims(&[2, 2, 2, 2]).unwrap();
        assert!(matches!(
            RustFftTransform::<f64>::new(&shape),
            Err(ConvolutionError::UnsupportedRank(4))
        ));
    }
}
