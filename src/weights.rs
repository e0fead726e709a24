//! Statistical weights of the data-fit term.
//!
//! A weight is the inverse variance of the noise of a sample. A zero weight marks a missing or
//! unreliable sample, which is then ignored by the cost.

use crate::error::{ConvolutionError, Result};
use crate::fft::Real;

/// Checks that every weight is finite and non-negative.
///
/// # Errors
/// - `InvalidWeight` naming the first offending sample.
pub fn check_weights<T: Real>(weights: &[T]) -> Result<()> {
    match weights
        .iter()
        .position(|w| !w.is_finite() || *w < T::zero())
    {
        Some(index) => Err(ConvolutionError::InvalidWeight {
            index,
            value: weights[index].as_f64(),
        }),
        None => Ok(()),
    }
}

/// Checks that the data are finite wherever they are used, i.e. where the weight is positive.
///
/// # Errors
/// - `InvalidData` naming the first offending sample.
pub fn check_data<T: Real>(data: &[T], weights: Option<&[T]>) -> Result<()> {
    let bad = match weights {
        Some(w) => data
            .iter()
            .zip(w)
            .position(|(d, w)| *w > T::zero() && !d.is_finite()),
        None => data.iter().position(|d| !d.is_finite()),
    };
    match bad {
        Some(index) => Err(ConvolutionError::InvalidData {
            index,
            value: data[index].as_f64(),
        }),
        None => Ok(()),
    }
}

/// Computes weights from a Poisson + Gaussian noise model.
///
/// The variance of a sample is `gain * max(data, 0) + readout_noise^2`, where `gain` converts
/// data units to photo-electrons and `readout_noise` is the standard deviation of the detector
/// noise in data units. Non-finite data get a zero weight.
///
/// # Errors
/// - `InvalidParameter` if `gain` or `readout_noise` is negative or not finite, or if both are
///   zero.
pub fn weights_from_variance<T: Real>(data: &[T], gain: f64, readout_noise: f64) -> Result<Vec<T>> {
    if !gain.is_finite() || gain < 0.0 {
        return Err(ConvolutionError::InvalidParameter(format!(
            "gain must be finite and non-negative, got {gain}"
        )));
    }
    if !readout_noise.is_finite() || readout_noise < 0.0 {
        return Err(ConvolutionError::InvalidParameter(format!(
            "readout noise must be finite and non-negative, got {readout_noise}"
        )));
    }
    let noise_variance = readout_noise * readout_noise;
    if gain == 0.0 && noise_variance == 0.0 {
        return Err(ConvolutionError::InvalidParameter(
            "gain and readout noise cannot both be zero".to_string(),
        ));
    }
    Ok(data
        .iter()
        .map(|d| {
            let d = d.as_f64();
            if !d.is_finite() {
                return T::zero();
            }
            let variance = gain * d.max(0.0) + noise_variance;
            if variance > 0.0 {
                T::from_f64_lossy(1.0 / variance)
            } else {
                // zero signal without readout noise
                T::zero()
            }
        })
        .collect())
}

/// Sets the weight of every flagged sample to zero.
///
/// # Errors
/// - `SizeMismatch` if `bad` and `weights` have different lengths.
pub fn mask_bad_samples<T: Real>(weights: &mut [T], bad: &[bool]) -> Result<()> {
    if bad.len() != weights.len() {
        return Err(ConvolutionError::SizeMismatch {
            what: "bad sample mask",
            expected: weights.len(),
            found: bad.len(),
        });
    }
    for (w, _) in weights.iter_mut().zip(bad).filter(|(_, b)| **b) {
        *w = T::zero();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_all_close;

    #[test]
    fn test_check_weights() {
        assert!(check_weights(&[0.0f64, 1.0, 2.5]).is_ok());
        assert!(matches!(
            check_weights(&[1.0f64, -0.1, 2.0]),
            Err(ConvolutionError::InvalidWeight { index: 1, .. })
        ));
        assert!(matches!(
            check_weights(&[1.0f32, f32::NAN]),
            Err(ConvolutionError::InvalidWeight { index: 1, .. })
        ));
        assert!(matches!(
            check_weights(&[f64::INFINITY]),
            Err(ConvolutionError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn test_check_data_ignores_zero_weights() {
        let data = [1.0f64, f64::NAN, 3.0];
        assert!(check_data(&data, Some(&[1.0, 0.0, 1.0][..])).is_ok());
        assert!(matches!(
            check_data(&data, Some(&[1.0, 0.5, 1.0][..])),
            Err(ConvolutionError::InvalidData { index: 1, .. })
        ));
        assert!(check_data(&data, None).is_err());
    }

    #[test]
    fn test_weights_from_variance() {
        let data = [4.0f64, -2.0, f64::NAN, 0.0];
        let weights = weights_from_variance(&data, 0.5, 1.0).unwrap();
        assert_all_close(&weights, &[1.0 / 3.0, 1.0, 0.0, 1.0], 1e-12);

        let poisson_only = weights_from_variance(&[2.0f32, 0.0], 1.0, 0.0).unwrap();
        assert_all_close(&poisson_only, &[0.5, 0.0], 1e-7);

        assert!(weights_from_variance(&data, 0.0, 0.0).is_err());
        assert!(weights_from_variance(&data, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_mask_bad_samples() {
        let mut weights = vec![1.0f64, 2.0, 3.0];
        mask_bad_samples(&mut weights, &[false, true, false]).unwrap();
        assert_eq!(weights, vec![1.0, 0.0, 3.0]);
        assert!(mask_bad_samples(&mut weights, &[true]).is_err());
    }
}
