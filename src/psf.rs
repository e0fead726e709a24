//! Synthetic point spread functions.

use crate::error::{ConvolutionError, Result};
use crate::fft::Real;
use crate::mtf::{check_center, default_center, normalize_psf};
use crate::shape::Shape;

/// Gaussian beam profile.
///
/// Computes `sqrt(2 / pi) * exp(-2 (x - x0)^2 / w^2) / w`, the intensity profile of a Gaussian
/// beam of waist `w` centered at `x0`.
///
/// # Arguments
/// - `x` (*f64*): The position.
/// - `x0` (*f64*): The center of the beam.
/// - `w` (*f64*): The beam waist.
pub fn gaussian_profile(x: f64, x0: f64, w: f64) -> f64 {
    (2.0 / std::f64::consts::PI).sqrt() * (-2.0 * (x - x0).powi(2) / (w * w)).exp() / w
}

/// Creates a separable Gaussian PSF on `shape`.
///
/// The PSF peaks at [`default_center`] and is normalized to a unit sum, so that it can be
/// passed to [`Convolution::set_psf_centered`](crate::Convolution::set_psf_centered) as is.
///
/// # Arguments
/// - `shape` (*&Shape*): The shape of the PSF, usually the object shape.
/// - `widths` (*&[f64]*): The beam waist along every axis, in samples.
///
/// # Errors
/// - `RankMismatch` if `widths` does not hold one entry per axis.
/// - `InvalidParameter` if a width is not strictly positive and finite.
pub fn gaussian_psf<T: Real>(shape: &Shape, widths: &[f64]) -> Result<Vec<T>> {
    if widths.len() != shape.rank() {
        return Err(ConvolutionError::RankMismatch {
            expected: shape.rank(),
            found: widths.len(),
        });
    }
    if let Some(w) = widths.iter().find(|w| !w.is_finite() || **w <= 0.0) {
        return Err(ConvolutionError::InvalidParameter(format!(
            "beam width must be positive and finite, got {w}"
        )));
    }
    let center = default_center(shape);
    let profiles: Vec<Vec<f64>> = shape
        .dims()
        .iter()
        .zip(&center)
        .zip(widths)
        .map(|((&d, &c), &w)| {
            (0..d)
                .map(|i| gaussian_profile(i as f64, c as f64, w))
                .collect()
        })
        .collect();
    let mut psf = vec![T::zero(); shape.number()];
    shape.for_each_index(|flat, index| {
        let value: f64 = index
            .iter()
            .zip(&profiles)
            .map(|(&i, profile)| profile[i])
            .product();
        psf[flat] = T::from_f64_lossy(value);
    });
    normalize_psf(&psf)
}

/// Creates a PSF that is zero everywhere except for a unit sample at `position`.
///
/// With `position` equal to the PSF center the convolution is the identity, any other
/// position makes it a cyclic shift.
///
/// # Errors
/// - `RankMismatch` / `OutOfRange` if `position` is not a valid index of `shape`.
pub fn impulse_psf<T: Real>(shape: &Shape, position: &[usize]) -> Result<Vec<T>> {
    check_center(shape, position)?;
    let mut psf = vec![T::zero(); shape.number()];
    psf[shape.offset_of(position)] = T::one();
    Ok(psf)
}
