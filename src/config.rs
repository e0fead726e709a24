//! Settings of a convolution operator that can be stored alongside a reconstruction.

use serde::{Deserialize, Serialize};

/// Configuration of a convolution operator and of its PSF handling.
///
/// # Fields
/// - `data_shape`: Shape of the data space. `None` means the data space is the object space.
/// - `data_offset`: Position of the data window inside the object space. `None` means zero.
/// - `psf_center`: Index of the zero-lag sample of the PSF. `None` means `dim / 2` per axis.
/// - `normalize_psf`: Divide the PSF by its sum before computing the MTF.
/// - `warn_on_unnormalized_psf`: Log a warning when a PSF that does not sum to one is used
///   without normalization.
///
/// Fields missing from a stored configuration take their default value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConvolutionConfig {
    pub data_shape: Option<Vec<usize>>,
    pub data_offset: Option<Vec<usize>>,
    pub psf_center: Option<Vec<usize>>,
    pub normalize_psf: bool,
    pub warn_on_unnormalized_psf: bool,
}

impl Default for ConvolutionConfig {
    fn default() -> Self {
        ConvolutionConfig {
            data_shape: None,
            data_offset: None,
            psf_center: None,
            normalize_psf: false,
            warn_on_unnormalized_psf: true,
        }
    }
}
