//! Weighted least-squares data-fit term built on the convolution operator.
//!
//! For an object `x`, data `d` and weights `w` the cost is
//!
//! ```text
//! f(x) = alpha * sum_j w_j * ((H x)_j - d_j)^2
//! ```
//!
//! and its gradient is `2 * alpha * H^T W (H x - d)`. Both the direct pass (residuals) and the
//! adjoint pass (gradient) run in the workspace of the owned [`Convolution`].

use crate::convolution::Convolution;
use crate::error::{ConvolutionError, Result};
use crate::fft::Real;
use crate::shape::Shape;
use crate::weights;

/// A differentiable cost function of an object-space vector.
pub trait DifferentiableCost<T: Real> {
    /// Shape of the variables.
    fn input_shape(&self) -> &Shape;

    /// Returns `alpha * f(x)`.
    fn evaluate(&mut self, alpha: f64, x: &[T]) -> Result<f64>;

    /// Returns `alpha * f(x)` and stores (`clear`) or adds (`!clear`) its gradient to
    /// `gradient`.
    fn evaluate_with_gradient(
        &mut self,
        alpha: f64,
        x: &[T],
        gradient: &mut [T],
        clear: bool,
    ) -> Result<f64>;
}

/// Weighted convolution cost.
///
/// # Fields
/// - `convolution`: The operator, which owns the PSF, the MTF and the workspace.
/// - `data`: Observed data, one value per data-space sample.
/// - `weights`: One weight per data-space sample. `None` means every weight is one.
/// - `residuals`: Scratch buffer of data-space size, reused by gradient evaluations.
pub struct WeightedConvolutionCost<T: Real> {
    convolution: Convolution<T>,
    data: Option<Vec<T>>,
    weights: Option<Vec<T>>,
    residuals: Vec<T>,
}

impl<T: Real> WeightedConvolutionCost<T> {
    pub fn new(convolution: Convolution<T>) -> Self {
        WeightedConvolutionCost {
            convolution,
            data: None,
            weights: None,
            residuals: Vec::new(),
        }
    }

    pub fn convolution(&self) -> &Convolution<T> {
        &self.convolution
    }

    /// Mutable access to the operator, e.g. to change the PSF.
    pub fn convolution_mut(&mut self) -> &mut Convolution<T> {
        &mut self.convolution
    }

    pub fn set_psf(&mut self, psf: &[T], center: &[usize]) -> Result<()> {
        self.convolution.set_psf(psf, center)
    }

    pub fn data(&self) -> Option<&[T]> {
        self.data.as_deref()
    }

    pub fn weights(&self) -> Option<&[T]> {
        self.weights.as_deref()
    }

    /// Sets the observed data together with their weights.
    ///
    /// `None` for the weights means that every sample has weight one. The weights are checked
    /// here and not at evaluation time.
    ///
    /// # Errors
    /// - `SizeMismatch` if `data` or `weights` do not match the data space.
    /// - `InvalidWeight` if a weight is negative, NaN or infinite.
    /// - `InvalidData` if a datum with a positive weight is not finite.
    ///
    /// On error the previous data and weights are kept.
    pub fn set_weights_and_data(&mut self, weights: Option<&[T]>, data: &[T]) -> Result<()> {
        let m = self.convolution.data_shape().number();
        if data.len() != m {
            return Err(ConvolutionError::SizeMismatch {
                what: "data",
                expected: m,
                found: data.len(),
            });
        }
        if let Some(w) = weights {
            if w.len() != m {
                return Err(ConvolutionError::SizeMismatch {
                    what: "weights",
                    expected: m,
                    found: w.len(),
                });
            }
            weights::check_weights(w)?;
        }
        weights::check_data(data, weights)?;

        self.data = Some(data.to_vec());
        self.weights = weights.map(|w| w.to_vec());
        Ok(())
    }

    /// Sets the observed data with uniform weights.
    pub fn set_data(&mut self, data: &[T]) -> Result<()> {
        self.set_weights_and_data(None, data)
    }

    fn check_evaluation(&self, alpha: f64, x: &[T]) -> Result<()> {
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(ConvolutionError::InvalidParameter(format!(
                "cost multiplier must be finite and non-negative, got {alpha}"
            )));
        }
        if self.data.is_none() {
            return Err(ConvolutionError::MissingData);
        }
        if self.convolution.mtf().is_none() {
            return Err(ConvolutionError::MissingPsf);
        }
        let n = self.convolution.object_shape().number();
        if x.len() != n {
            return Err(ConvolutionError::SizeMismatch {
                what: "object-space vector",
                expected: n,
                found: x.len(),
            });
        }
        Ok(())
    }

    /// Convolves `x` and leaves the unscaled result in the workspace.
    fn forward_pass(&mut self, x: &[T]) -> Result<()> {
        self.convolution.push(x)?;
        self.convolution.forward_transform()?;
        self.convolution.multiply_by_mtf(false)?;
        self.convolution.backward_transform()
    }

    /// Weighted sum of squared residuals over the data window.
    ///
    /// When `factor` is given, `factor * r_j` is stored in `residuals` for every used sample
    /// and zero for every skipped one.
    fn accumulate(&mut self, factor: Option<f64>) -> Result<f64> {
        let data = self.data.as_deref().ok_or(ConvolutionError::MissingData)?;
        let scale = self.convolution.scale();
        let (window, workspace) = self.convolution.window_and_workspace();
        let indices = window.indices();

        if factor.is_some() {
            self.residuals.clear();
            self.residuals.resize(indices.len(), T::zero());
        }

        let mut sum = 0.0f64;
        match self.weights.as_deref() {
            Some(weights) => {
                for (j, (&k, &w)) in indices.iter().zip(weights).enumerate() {
                    // non-positive weights mark missing samples
                    if w <= T::zero() {
                        continue;
                    }
                    let r = scale * workspace[k].re.as_f64() - data[j].as_f64();
                    sum += w.as_f64() * r * r;
                    if let Some(q) = factor {
                        self.residuals[j] = T::from_f64_lossy(q * r);
                    }
                }
            }
            None => {
                for (j, &k) in indices.iter().enumerate() {
                    let r = scale * workspace[k].re.as_f64() - data[j].as_f64();
                    sum += r * r;
                    if let Some(q) = factor {
                        self.residuals[j] = T::from_f64_lossy(q * r);
                    }
                }
            }
        }
        Ok(sum)
    }
}

impl<T: Real> DifferentiableCost<T> for WeightedConvolutionCost<T> {
    fn input_shape(&self) -> &Shape {
        self.convolution.object_shape()
    }

    fn evaluate(&mut self, alpha: f64, x: &[T]) -> Result<f64> {
        self.check_evaluation(alpha, x)?;
        if alpha == 0.0 {
            return Ok(0.0);
        }
        self.forward_pass(x)?;
        let sum = self.accumulate(None)?;
        Ok(alpha * sum)
    }

    fn evaluate_with_gradient(
        &mut self,
        alpha: f64,
        x: &[T],
        gradient: &mut [T],
        clear: bool,
    ) -> Result<f64> {
        self.check_evaluation(alpha, x)?;
        if gradient.len() != x.len() {
            return Err(ConvolutionError::SizeMismatch {
                what: "gradient",
                expected: x.len(),
                found: gradient.len(),
            });
        }
        if alpha == 0.0 {
            if clear {
                gradient.fill(T::zero());
            }
            return Ok(0.0);
        }

        self.forward_pass(x)?;
        let q = 2.0 * self.convolution.scale() * alpha;
        let sum = self.accumulate(Some(q))?;

        // q * w_j * r_j in the window, zero everywhere else
        self.convolution
            .push_adjoint(&self.residuals, self.weights.as_deref())?;
        self.convolution.forward_transform()?;
        self.convolution.multiply_by_mtf(true)?;
        self.convolution.backward_transform()?;
        self.convolution
            .pull_object_scaled(gradient, T::one(), clear)?;

        Ok(alpha * sum)
    }
}
