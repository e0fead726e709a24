//! Conversion of a point spread function into its modulation transfer function.
//!
//! The PSF is given in direct space and is not centered: the caller names the sample that
//! holds the zero lag. Before transforming, the PSF is rolled cyclically so that this sample
//! lands at index 0 on every axis. Without the roll the MTF would carry a linear phase and
//! the convolution would shift its input.

use crate::error::{ConvolutionError, Result};
use crate::fft::{FrequencyTransform, Real};
use crate::shape::Shape;
use num_complex::Complex;

/// The zero-lag position of an fft-shifted kernel: `dim / 2` on every axis.
pub fn default_center(shape: &Shape) -> Vec<usize> {
    shape.dims().iter().map(|d| d / 2).collect()
}

/// Checks that `center` holds one in-range index per axis of `shape`.
///
/// # Errors
/// - `RankMismatch` if `center` does not have one entry per axis.
/// - `OutOfRange` if `center[axis] >= shape.dimension(axis)`.
pub fn check_center(shape: &Shape, center: &[usize]) -> Result<()> {
    if center.len() != shape.rank() {
        return Err(ConvolutionError::RankMismatch {
            expected: shape.rank(),
            found: center.len(),
        });
    }
    for (axis, (&c, &d)) in center.iter().zip(shape.dims()).enumerate() {
        if c >= d {
            return Err(ConvolutionError::OutOfRange {
                what: "PSF center",
                axis,
                value: c,
                limit: d,
            });
        }
    }
    Ok(())
}

/// Cyclic roll: `dst[(i + shift) mod dim] = src[i]` on every axis.
///
/// `src` and `dst` must both hold `shape.number()` samples.
pub fn roll<U: Copy>(src: &[U], shape: &Shape, shift: &[usize], dst: &mut [U]) {
    debug_assert_eq!(src.len(), shape.number());
    debug_assert_eq!(dst.len(), shape.number());
    let shift: Vec<usize> = shift
        .iter()
        .zip(shape.dims())
        .map(|(s, d)| s % d)
        .collect();
    shape.for_each_index(|flat, index| {
        let target: usize = index
            .iter()
            .zip(&shift)
            .zip(shape.dims().iter().zip(shape.strides()))
            .map(|((&i, &s), (&d, &stride))| ((i + s) % d) * stride)
            .sum();
        dst[target] = src[flat];
    });
}

/// The shift that moves `center` to the origin.
fn centering_shift(shape: &Shape, center: &[usize]) -> Vec<usize> {
    center
        .iter()
        .zip(shape.dims())
        .map(|(&c, &d)| (d - c) % d)
        .collect()
}

/// Divides the PSF by its sum so that the MTF has unit gain at zero frequency.
///
/// # Errors
/// - `InvalidPsf` if the sum is zero or not finite.
pub fn normalize_psf<T: Real>(psf: &[T]) -> Result<Vec<T>> {
    let sum: f64 = psf.iter().map(|v| v.as_f64()).sum();
    if !sum.is_finite() || sum == 0.0 {
        return Err(ConvolutionError::InvalidPsf(format!(
            "cannot normalize a PSF whose sum is {sum}"
        )));
    }
    Ok(psf
        .iter()
        .map(|v| T::from_f64_lossy(v.as_f64() / sum))
        .collect())
}

/// Builds the MTF of `psf` into `mtf`, reusing its allocation.
///
/// The shape is taken from `transform`. `psf` holds the kernel in raster order and `center`
/// the index of its zero-lag sample.
///
/// # Errors
/// - `SizeMismatch` if `psf` does not match the transform shape.
/// - `RankMismatch` / `OutOfRange` for an invalid `center`.
pub fn build_mtf<T: Real>(
    transform: &mut dyn FrequencyTransform<T>,
    psf: &[T],
    center: &[usize],
    mtf: &mut Vec<Complex<T>>,
) -> Result<()> {
    let shape = transform.shape().clone();
    if psf.len() != shape.number() {
        return Err(ConvolutionError::SizeMismatch {
            what: "PSF",
            expected: shape.number(),
            found: psf.len(),
        });
    }
    check_center(&shape, center)?;

    let padded: Vec<Complex<T>> = psf.iter().map(|&v| Complex::new(v, T::zero())).collect();
    mtf.clear();
    mtf.resize(shape.number(), Complex::new(T::zero(), T::zero()));
    roll(&padded, &shape, &centering_shift(&shape, center), mtf);
    transform.forward(mtf)?;

    log::trace!("rebuilt MTF for shape {} centered at {:?}", shape, center);
    Ok(())
}

/// Computes the MTF of `psf` in a new buffer, see [`build_mtf`].
pub fn compute_mtf<T: Real>(
    transform: &mut dyn FrequencyTransform<T>,
    psf: &[T],
    center: &[usize],
) -> Result<Vec<Complex<T>>> {
    let mut mtf = Vec::with_capacity(psf.len());
    build_mtf(transform, psf, center, &mut mtf)?;
    Ok(mtf)
}

/// Recovers the uncentered PSF from an MTF, the inverse of [`build_mtf`].
///
/// # Errors
/// - `SizeMismatch` if `mtf` does not match the transform shape.
/// - `RankMismatch` / `OutOfRange` for an invalid `center`.
pub fn psf_from_mtf<T: Real>(
    transform: &mut dyn FrequencyTransform<T>,
    mtf: &[Complex<T>],
    center: &[usize],
) -> Result<Vec<T>> {
    let shape = transform.shape().clone();
    check_center(&shape, center)?;
    let mut buffer = mtf.to_vec();
    transform.backward(&mut buffer)?;

    let scale = 1.0 / shape.number() as f64;
    let centered: Vec<T> = buffer
        .iter()
        .map(|z| T::from_f64_lossy(z.re.as_f64() * scale))
        .collect();
    let mut psf = vec![T::zero(); shape.number()];
    roll(&centered, &shape, center, &mut psf);
    Ok(psf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::RustFftTransform;
    use crate::test_utils::{assert_all_close, random_vec};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_roll_moves_center_to_origin() {
        let shape = Shape::from_dims(&[4, 3]).unwrap();
        let src: Vec<usize> = (0..12).collect();
        let mut dst = vec![0; 12];
        let center = [1, 2];
        roll(&src, &shape, &centering_shift(&shape, &center), &mut dst);
        assert_eq!(dst[0], shape.offset_of(&center));
        // the sample right after the center on axis 0 follows it
        assert_eq!(dst[1], shape.offset_of(&[2, 2]));
        // and the one before it wraps to the end
        assert_eq!(dst[3], shape.offset_of(&[0, 2]));

        let mut back = vec![0; 12];
        roll(&dst, &shape, &center, &mut back);
        assert_eq!(back, src);
    }

    #[test]
    fn test_centered_impulse_gives_flat_mtf() {
        let shape = Shape::from_dims(&[6, 5]).unwrap();
        let center = [4, 1];
        let mut psf = vec![0.0f64; shape.number()];
        psf[shape.offset_of(&center)] = 1.0;

        let mut fft = RustFftTransform::new(&shape).unwrap();
        let mut mtf = vec![];
        build_mtf(&mut fft, &psf, &center, &mut mtf).unwrap();
        assert_eq!(mtf.len(), shape.number());
        for h in &mtf {
            assert_abs_diff_eq!(h.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(h.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_off_center_impulse_carries_linear_phase() {
        let shape = Shape::from_dims(&[8]).unwrap();
        let mut psf = vec![0.0f64; 8];
        psf[3] = 1.0;
        let mut fft = RustFftTransform::new(&shape).unwrap();
        let mut mtf = vec![];
        build_mtf(&mut fft, &psf, &[2], &mut mtf).unwrap();
        // impulse one sample after the center: h[k] = exp(-2 pi i k / 8)
        for (k, h) in mtf.iter().enumerate() {
            let phase = -2.0 * std::f64::consts::PI * k as f64 / 8.0;
            assert_abs_diff_eq!(h.re, phase.cos(), epsilon = 1e-12);
            assert_abs_diff_eq!(h.im, phase.sin(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reused_buffer_matches_fresh_mtf() {
        let shape = Shape::from_dims(&[5, 4]).unwrap();
        let psf = random_vec::<f64>(shape.number(), 5);
        let mut fft = RustFftTransform::new(&shape).unwrap();
        let fresh = compute_mtf(&mut fft, &psf, &[2, 1]).unwrap();

        let mut reused = vec![Complex::new(7.0, -3.0); 3];
        build_mtf(&mut fft, &psf, &[2, 1], &mut reused).unwrap();
        assert_eq!(reused, fresh);
    }

    #[test]
    fn test_psf_from_mtf_recovers_psf() {
        let shape = Shape::from_dims(&[4, 3, 5]).unwrap();
        let psf = random_vec::<f64>(shape.number(), 11);
        let center = default_center(&shape);
        let mut fft = RustFftTransform::new(&shape).unwrap();
        let mut mtf = vec![];
        build_mtf(&mut fft, &psf, &center, &mut mtf).unwrap();
        let recovered = psf_from_mtf(&mut fft, &mtf, &center).unwrap();
        assert_all_close(&recovered, &psf, 1e-12);
    }

    #[test]
    fn test_invalid_center_and_size() {
        let shape = Shape::from_dims(&[4, 4]).unwrap();
        let mut fft = RustFftTransform::<f64>::new(&shape).unwrap();
        let mut mtf = vec![];
        let psf = vec![0.0; 16];
        assert!(matches!(
            build_mtf(&mut fft, &psf, &[1, 4], &mut mtf),
            Err(ConvolutionError::OutOfRange { axis: 1, .. })
        ));
        assert!(matches!(
            build_mtf(&mut fft, &psf, &[1], &mut mtf),
            Err(ConvolutionError::RankMismatch { .. })
        ));
        assert!(matches!(
            build_mtf(&mut fft, &psf[..15], &[1, 1], &mut mtf),
            Err(ConvolutionError::SizeMismatch { what: "PSF", .. })
        ));
    }

    #[test]
    fn test_normalize_psf() {
        let psf = normalize_psf(&[1.0f32, 3.0, 0.0, 4.0]).unwrap();
        assert_all_close(&psf, &[0.125, 0.375, 0.0, 0.5], 1e-7);
        assert!(matches!(
            normalize_psf(&[1.0f64, -1.0]),
            Err(ConvolutionError::InvalidPsf(_))
        ));
    }

    #[test]
    fn test_default_center() {
        let shape = Shape::from_dims(&[4, 5, 1]).unwrap();
        assert_eq!(default_center(&shape), vec![2, 2, 0]);
    }
}
