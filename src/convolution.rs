//! FFT-based convolution operator with an optional data window.
//!
//! The operator maps an object-space vector `x` to a data-space vector
//!
//! ```text
//! y = R * (1/N) * B * diag(h) * F * x
//! ```
//!
//! where `F` and `B` are the unnormalized forward and backward transforms over the whole object
//! space, `h` is the MTF and `R` selects the samples of the data window. The adjoint is
//!
//! ```text
//! x = (1/N) * B * diag(conj(h)) * F * R^T * y
//! ```
//!
//! The transform always runs over the full object space so that the circular boundary
//! conditions are well defined. The window is only a selection applied in direct space.
//!
//! The individual stages (`push`, `forward_transform`, `multiply_by_mtf`, `backward_transform`,
//! `pull`, ...) are public so that costs built on top of the operator can reuse the workspace
//! between the direct and the adjoint pass.

use crate::config::ConvolutionConfig;
use crate::error::{ConvolutionError, Result};
use crate::fft::{FrequencyTransform, Real, RustFftTransform};
use crate::layout;
use crate::mtf;
use crate::operator::{Job, LinearOperator};
use crate::shape::{Shape, Window};
use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use num_complex::Complex;

/// Convolution by a shift-invariant PSF over a 1, 2 or 3 dimensional object space.
///
/// # Fields
/// - `object`: Shape of the object space, over which the transforms run.
/// - `window`: The data window. Covers the whole object space unless built with a smaller one.
/// - `config`: PSF handling policy used by [`Convolution::set_psf_configured`].
/// - `mtf`: The cached MTF, `None` until a PSF or an MTF is set.
/// - `workspace`: Complex scratch buffer, allocated on first use.
/// - `transform`: The frequency transform, planned on first use.
pub struct Convolution<T: Real> {
    object: Shape,
    window: Window,
    config: ConvolutionConfig,
    mtf: Option<Vec<Complex<T>>>,
    workspace: Vec<Complex<T>>,
    transform: Option<Box<dyn FrequencyTransform<T>>>,
}

/// Returns the transform stored in `slot`, planning it for `shape` on first use.
fn ensure_transform<'a, T: Real>(
    slot: &'a mut Option<Box<dyn FrequencyTransform<T>>>,
    shape: &Shape,
) -> Result<&'a mut dyn FrequencyTransform<T>> {
    let transform = match slot.take() {
        Some(transform) => transform,
        None => Box::new(RustFftTransform::new(shape)?),
    };
    Ok(slot.insert(transform).as_mut())
}

fn zero<T: Real>() -> Complex<T> {
    Complex::new(T::zero(), T::zero())
}

impl<T: Real> Convolution<T> {
    /// Creates an operator whose data space is the whole object space.
    pub fn new(object: Shape) -> Self {
        let window = Window::full(&object);
        Convolution {
            object,
            window,
            config: ConvolutionConfig::default(),
            mtf: None,
            workspace: Vec::new(),
            transform: None,
        }
    }

    /// Creates an operator whose data space is the window `[offset, offset + data)` of the
    /// object space.
    ///
    /// # Errors
    /// - `RankMismatch` / `OutOfRange` if the window does not fit in the object space.
    pub fn with_window(object: Shape, data: Shape, offset: &[usize]) -> Result<Self> {
        let window = Window::new(&object, data, offset)?;
        let mut convolution = Convolution::new(object);
        convolution.window = window;
        Ok(convolution)
    }

    /// Creates an operator from a configuration.
    ///
    /// A missing `data_shape` means the whole object space, a missing `data_offset` means the
    /// origin.
    pub fn from_config(object: Shape, config: &ConvolutionConfig) -> Result<Self> {
        let data = match &config.data_shape {
            Some(dims) => Shape::from_dims(dims)?,
            None => object.clone(),
        };
        let offset = config
            .data_offset
            .clone()
            .unwrap_or_else(|| vec![0; object.rank()]);
        if let Some(center) = &config.psf_center {
            mtf::check_center(&object, center)?;
        }
        let mut convolution = Convolution::with_window(object, data, &offset)?;
        convolution.config = config.clone();
        Ok(convolution)
    }

    /// Replaces the default `rustfft` transform.
    ///
    /// # Errors
    /// - `SizeMismatch` / `RankMismatch` if the transform was planned for another shape.
    pub fn with_transform(mut self, transform: Box<dyn FrequencyTransform<T>>) -> Result<Self> {
        let shape = transform.shape();
        if shape.rank() != self.object.rank() {
            return Err(ConvolutionError::RankMismatch {
                expected: self.object.rank(),
                found: shape.rank(),
            });
        }
        if shape != &self.object {
            return Err(ConvolutionError::SizeMismatch {
                what: "transform shape",
                expected: self.object.number(),
                found: shape.number(),
            });
        }
        self.transform = Some(transform);
        Ok(self)
    }

    pub fn object_shape(&self) -> &Shape {
        &self.object
    }

    pub fn data_shape(&self) -> &Shape {
        self.window.shape()
    }

    pub fn offset(&self) -> &[usize] {
        self.window.offset()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn config(&self) -> &ConvolutionConfig {
        &self.config
    }

    /// True when the data space is the whole object space.
    pub fn is_fast_path(&self) -> bool {
        self.window.is_full()
    }

    /// The cached MTF, if any.
    pub fn mtf(&self) -> Option<&[Complex<T>]> {
        self.mtf.as_deref()
    }

    /// The workspace, empty until the first push.
    pub fn workspace(&self) -> &[Complex<T>] {
        &self.workspace
    }

    pub(crate) fn window_and_workspace(&self) -> (&Window, &[Complex<T>]) {
        (&self.window, &self.workspace)
    }

    /// `1 / N`, the normalization of the backward transform.
    pub fn scale(&self) -> f64 {
        1.0 / self.object.number() as f64
    }

    fn ensure_workspace(&mut self) {
        let n = self.object.number();
        if self.workspace.len() != n {
            log::debug!(
                "allocating convolution workspace of {} complex samples for shape {}",
                n,
                self.object
            );
            self.workspace.resize(n, zero());
        }
    }

    /// Sets the PSF whose zero-lag sample is at `center` and recomputes the MTF.
    pub fn set_psf(&mut self, psf: &[T], center: &[usize]) -> Result<()> {
        self.set_psf_with(psf, center, false)
    }

    /// Sets the PSF, centered at `dim / 2` on every axis.
    pub fn set_psf_centered(&mut self, psf: &[T]) -> Result<()> {
        let center = mtf::default_center(&self.object);
        self.set_psf_with(psf, &center, false)
    }

    /// Sets the PSF following the configured center and normalization policy.
    pub fn set_psf_configured(&mut self, psf: &[T]) -> Result<()> {
        let center = self
            .config
            .psf_center
            .clone()
            .unwrap_or_else(|| mtf::default_center(&self.object));
        if !self.config.normalize_psf && self.config.warn_on_unnormalized_psf {
            let sum: f64 = psf.iter().map(|v| v.as_f64()).sum();
            if (sum - 1.0).abs() > 1e-3 {
                log::warn!("PSF sums to {sum} and is used without normalization");
            }
        }
        self.set_psf_with(psf, &center, self.config.normalize_psf)
    }

    /// Sets the PSF and recomputes the MTF eagerly, optionally normalizing the PSF to unit sum.
    ///
    /// # Errors
    /// - `SizeMismatch` if `psf` does not hold one value per object-space sample.
    /// - `RankMismatch` / `OutOfRange` for an invalid `center`.
    /// - `InvalidPsf` if normalization is requested for a PSF summing to zero.
    ///
    /// On error the previous MTF is kept.
    pub fn set_psf_with(&mut self, psf: &[T], center: &[usize], normalize: bool) -> Result<()> {
        if psf.len() != self.object.number() {
            return Err(ConvolutionError::SizeMismatch {
                what: "PSF",
                expected: self.object.number(),
                found: psf.len(),
            });
        }
        mtf::check_center(&self.object, center)?;
        let normalized;
        let psf = if normalize {
            normalized = mtf::normalize_psf(psf)?;
            &normalized[..]
        } else {
            psf
        };

        let transform = ensure_transform(&mut self.transform, &self.object)?;
        let mut buffer = self.mtf.take().unwrap_or_default();
        mtf::build_mtf(transform, psf, center, &mut buffer)?;
        self.mtf = Some(buffer);
        Ok(())
    }

    /// Sets the PSF from an array with the object-space shape.
    pub fn set_psf_array<S, D>(&mut self, psf: &ArrayBase<S, D>, center: &[usize]) -> Result<()>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        layout::check_shape(psf, &self.object, "PSF")?;
        self.set_psf(&layout::flatten(psf), center)
    }

    /// Assigns an MTF computed elsewhere, bypassing the PSF transform.
    ///
    /// # Errors
    /// - `SizeMismatch` if `mtf` does not hold one value per object-space sample.
    pub fn set_mtf(&mut self, mtf: Vec<Complex<T>>) -> Result<()> {
        if mtf.len() != self.object.number() {
            return Err(ConvolutionError::SizeMismatch {
                what: "MTF",
                expected: self.object.number(),
                found: mtf.len(),
            });
        }
        self.mtf = Some(mtf);
        Ok(())
    }

    /// Recovers the PSF from the cached MTF, with its zero lag moved back to `center`.
    pub fn psf(&mut self, center: &[usize]) -> Result<Vec<T>> {
        let mtf = self.mtf.as_deref().ok_or(ConvolutionError::MissingPsf)?;
        let transform = ensure_transform(&mut self.transform, &self.object)?;
        mtf::psf_from_mtf(transform, mtf, center)
    }

    /// Copies `x` into the real parts of the workspace and clears the imaginary parts.
    ///
    /// # Errors
    /// - `SizeMismatch` if `x` does not hold one value per object-space sample.
    pub fn push(&mut self, x: &[T]) -> Result<()> {
        let n = self.object.number();
        if x.len() != n {
            return Err(ConvolutionError::SizeMismatch {
                what: "object-space vector",
                expected: n,
                found: x.len(),
            });
        }
        self.ensure_workspace();
        for (z, &v) in self.workspace.iter_mut().zip(x) {
            *z = Complex::new(v, T::zero());
        }
        Ok(())
    }

    /// Clears the workspace and scatters `y` (times `weights`, if any) into the data window.
    ///
    /// This is the adjoint of the window selection. Samples outside the window are zero.
    ///
    /// # Errors
    /// - `SizeMismatch` if `y` or `weights` do not hold one value per data-space sample.
    pub fn push_adjoint(&mut self, y: &[T], weights: Option<&[T]>) -> Result<()> {
        let m = self.window.shape().number();
        if y.len() != m {
            return Err(ConvolutionError::SizeMismatch {
                what: "data-space vector",
                expected: m,
                found: y.len(),
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
        }
        self.ensure_workspace();
        self.workspace.fill(zero());
        let indices = self.window.indices();
        match weights {
            Some(w) => {
                for ((&k, &v), &wj) in indices.iter().zip(y).zip(w) {
                    self.workspace[k].re = wj * v;
                }
            }
            None => {
                for (&k, &v) in indices.iter().zip(y) {
                    self.workspace[k].re = v;
                }
            }
        }
        Ok(())
    }

    /// Forward transform of the workspace, in place.
    pub fn forward_transform(&mut self) -> Result<()> {
        let transform = ensure_transform(&mut self.transform, &self.object)?;
        transform.forward(&mut self.workspace)
    }

    /// Unnormalized backward transform of the workspace, in place.
    pub fn backward_transform(&mut self) -> Result<()> {
        let transform = ensure_transform(&mut self.transform, &self.object)?;
        transform.backward(&mut self.workspace)
    }

    /// Multiplies the transformed workspace by the MTF, or by its conjugate for the adjoint.
    ///
    /// # Errors
    /// - `MissingPsf` if neither a PSF nor an MTF has been set.
    /// - `SizeMismatch` if the workspace has not been filled.
    pub fn multiply_by_mtf(&mut self, conjugate: bool) -> Result<()> {
        let mtf = self.mtf.as_deref().ok_or(ConvolutionError::MissingPsf)?;
        if self.workspace.len() != mtf.len() {
            return Err(ConvolutionError::SizeMismatch {
                what: "workspace",
                expected: mtf.len(),
                found: self.workspace.len(),
            });
        }
        if conjugate {
            for (z, h) in self.workspace.iter_mut().zip(mtf) {
                *z = h.conj() * *z;
            }
        } else {
            for (z, h) in self.workspace.iter_mut().zip(mtf) {
                *z = *h * *z;
            }
        }
        Ok(())
    }

    fn check_pulled(&self, expected: usize, found: usize) -> Result<()> {
        if found != expected {
            return Err(ConvolutionError::SizeMismatch {
                what: "data-space vector",
                expected,
                found,
            });
        }
        if self.workspace.len() != self.object.number() {
            return Err(ConvolutionError::SizeMismatch {
                what: "workspace",
                expected: self.object.number(),
                found: self.workspace.len(),
            });
        }
        Ok(())
    }

    /// Writes the scaled real parts of the data window of the workspace to `y`.
    ///
    /// When the window covers the whole object space every sample is copied in raster order,
    /// otherwise [`Convolution::pull_windowed`] is used.
    pub fn pull(&self, y: &mut [T]) -> Result<()> {
        if !self.window.is_full() {
            return self.pull_windowed(y);
        }
        self.check_pulled(self.object.number(), y.len())?;
        let scale = T::from_f64_lossy(self.scale());
        for (dst, z) in y.iter_mut().zip(&self.workspace) {
            *dst = scale * z.re;
        }
        Ok(())
    }

    /// Writes the scaled real parts of the data window to `y`, going through the window index
    /// table even when the window is the whole object space.
    pub fn pull_windowed(&self, y: &mut [T]) -> Result<()> {
        self.check_pulled(self.window.shape().number(), y.len())?;
        let scale = T::from_f64_lossy(self.scale());
        for (dst, &k) in y.iter_mut().zip(self.window.indices()) {
            *dst = scale * self.workspace[k].re;
        }
        Ok(())
    }

    /// Writes (`clear`) or adds (`!clear`) the scaled real parts of every object-space sample
    /// to `x`.
    pub fn pull_object(&self, x: &mut [T], clear: bool) -> Result<()> {
        let scale = T::from_f64_lossy(self.scale());
        self.pull_object_scaled(x, scale, clear)
    }

    pub(crate) fn pull_object_scaled(&self, x: &mut [T], factor: T, clear: bool) -> Result<()> {
        let n = self.object.number();
        if x.len() != n {
            return Err(ConvolutionError::SizeMismatch {
                what: "object-space vector",
                expected: n,
                found: x.len(),
            });
        }
        if self.workspace.len() != n {
            return Err(ConvolutionError::SizeMismatch {
                what: "workspace",
                expected: n,
                found: self.workspace.len(),
            });
        }
        if clear {
            for (dst, z) in x.iter_mut().zip(&self.workspace) {
                *dst = factor * z.re;
            }
        } else {
            for (dst, z) in x.iter_mut().zip(&self.workspace) {
                *dst = *dst + factor * z.re;
            }
        }
        Ok(())
    }

    /// Applies the operator to an array and returns the result as an array.
    ///
    /// `src` must have the object-space shape for [`Job::Direct`] and the data-space shape for
    /// [`Job::Adjoint`].
    pub fn apply_array<S, D>(&mut self, src: &ArrayBase<S, D>, job: Job) -> Result<ArrayD<T>>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        let (input, output) = match job {
            Job::Direct => (self.object.clone(), self.window.shape().clone()),
            Job::Adjoint => (self.window.shape().clone(), self.object.clone()),
        };
        layout::check_shape(src, &input, "operator input")?;
        let mut dst = vec![T::zero(); output.number()];
        self.apply(&mut dst, &layout::flatten(src), job)?;
        layout::unflatten(&output, dst)
    }
}

impl<T: Real> LinearOperator<T> for Convolution<T> {
    fn input_shape(&self) -> &Shape {
        &self.object
    }

    fn output_shape(&self) -> &Shape {
        self.window.shape()
    }

    fn apply(&mut self, dst: &mut [T], src: &[T], job: Job) -> Result<()> {
        if self.mtf.is_none() {
            return Err(ConvolutionError::MissingPsf);
        }
        match job {
            Job::Direct => {
                let m = self.window.shape().number();
                if dst.len() != m {
                    return Err(ConvolutionError::SizeMismatch {
                        what: "data-space vector",
                        expected: m,
                        found: dst.len(),
                    });
                }
                self.push(src)?;
                self.forward_transform()?;
                self.multiply_by_mtf(false)?;
                self.backward_transform()?;
                self.pull(dst)
            }
            Job::Adjoint => {
                let n = self.object.number();
                if dst.len() != n {
                    return Err(ConvolutionError::SizeMismatch {
                        what: "object-space vector",
                        expected: n,
                        found: dst.len(),
                    });
                }
                self.push_adjoint(src, None)?;
                self.forward_transform()?;
                self.multiply_by_mtf(true)?;
                self.backward_transform()?;
                self.pull_object(dst, true)
            }
        }
    }
}
