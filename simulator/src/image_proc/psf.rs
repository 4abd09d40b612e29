//! Point spread function abstraction and sampled kernels.
//!
//! A [`PointSpreadFunction`] maps an emitter's sub-pixel position to the
//! fraction of its photons landing in each detector pixel. Everything is in
//! detector-pixel units: a model is built for a particular objective and
//! grid, so the object-space scale is baked in at construction.

use std::fmt;

use microsim_shared::algo::splitmix64;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::airy::AiryPsf;
use super::gaussian::GaussianPsf;
use crate::diagnostics::Diagnostic;
use crate::hardware::{DetectorGrid, OpticalConfig, PsfModel};
use crate::quantities::Wavelength;

/// Largest truncation radius chosen automatically, in pixels.
pub const MAX_TRUNCATION_RADIUS: usize = 128;

/// How a PSF is reduced to one value per pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PsfSampling {
    /// Integral of the intensity over the pixel area.
    #[default]
    Integrated,
    /// Intensity at the pixel centre times the pixel area.
    PixelCenter,
}

pub trait PointSpreadFunction: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Full width at half maximum in detector pixels.
    fn fwhm_px(&self, wavelength: Wavelength, z_um: f64) -> f64;

    /// Fraction of the total flux within `radius_px` of the emitter.
    fn encircled_energy(&self, radius_px: f64, wavelength: Wavelength, z_um: f64) -> f64;

    /// Fraction of the flux landing in the pixel whose centre sits at
    /// `(dx, dy)` pixels from the emitter.
    fn pixel_response(&self, dx: f64, dy: f64, wavelength: Wavelength, z_um: f64) -> f64;

    /// Hash of every parameter that influences the sampled values.
    fn fingerprint(&self) -> u64;

    /// Sample the model on a `(2r+1)²` patch.
    ///
    /// `offset` is the emitter position relative to the centre pixel of the
    /// patch, each component in `[-½, ½]`.
    fn kernel(&self, offset: (f64, f64), wavelength: Wavelength, z_um: f64, radius: usize) -> PsfKernel {
        let r = radius as f64;
        let side = 2 * radius + 1;
        let data = Array2::from_shape_fn((side, side), |(row, col)| {
            let dx = col as f64 - r - offset.0;
            let dy = row as f64 - r - offset.1;
            self.pixel_response(dx, dy, wavelength, z_um)
        });
        PsfKernel::new(radius, offset, data)
    }

    /// Upper bound on the flux outside a kernel of the given radius.
    ///
    /// The square support always contains the disk of radius `radius`
    /// around the emitter, so `1 - EE(radius)` bounds the loss.
    fn truncation_loss(&self, radius: usize, wavelength: Wavelength, z_um: f64) -> f64 {
        (1.0 - self.encircled_energy(radius as f64, wavelength, z_um)).max(0.0)
    }

    /// Smallest radius whose predicted loss is within `tolerance`, capped
    /// at [`MAX_TRUNCATION_RADIUS`].
    fn truncation_radius(&self, wavelength: Wavelength, z_um: f64, tolerance: f64) -> usize {
        (1..=MAX_TRUNCATION_RADIUS)
            .find(|&radius| self.truncation_loss(radius, wavelength, z_um) <= tolerance)
            .unwrap_or(MAX_TRUNCATION_RADIUS)
    }
}

/// Build the model selected in `optics` for pixels of `grid`.
pub fn build_psf(
    optics: &OpticalConfig,
    grid: &DetectorGrid,
    sampling: PsfSampling,
) -> Box<dyn PointSpreadFunction> {
    let object_pixel_um = grid.object_pixel_um(optics);
    match optics.psf_model {
        PsfModel::Gaussian => Box::new(GaussianPsf::new(
            optics.numerical_aperture,
            optics.refractive_index,
            object_pixel_um,
            sampling,
        )),
        PsfModel::Airy { simpson_points } => Box::new(AiryPsf::new(
            optics.numerical_aperture,
            object_pixel_um,
            simpson_points,
            sampling,
        )),
    }
}

/// Combine parameter bit patterns into a model fingerprint.
pub(crate) fn fingerprint_of(tag: &str, parts: &[u64]) -> u64 {
    let seed = tag
        .bytes()
        .fold(0u64, |acc, b| splitmix64(acc ^ u64::from(b)));
    parts.iter().fold(seed, |acc, &part| splitmix64(acc ^ part))
}

/// A PSF sampled on a square patch of pixels.
///
/// `data[[row, col]]` is the fraction of flux in the pixel at
/// `(col - radius, row - radius)` relative to the emitter's nearest pixel.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PsfKernel {
    radius: usize,
    offset: (f64, f64),
    data: Array2<f64>,
    energy: f64,
}

impl PsfKernel {
    pub fn new(radius: usize, offset: (f64, f64), data: Array2<f64>) -> Self {
        let energy = data.sum();
        Self {
            radius,
            offset,
            data,
            energy,
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Sum of all samples.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Compare the kernel sum with what the model predicts for its support.
    ///
    /// The sum must not exceed 1 and must not fall below `1 - loss_bound`,
    /// each by more than `tolerance`.
    pub fn energy_diagnostic(
        &self,
        loss_bound: f64,
        tolerance: f64,
        wavelength: Wavelength,
    ) -> Option<Diagnostic> {
        let expected_min = 1.0 - loss_bound;
        let drifted = self.energy > 1.0 + tolerance || self.energy < expected_min - tolerance;
        drifted.then_some(Diagnostic::EnergyDrift {
            wavelength_nm: wavelength.as_nanometers(),
            radius_px: self.radius,
            kernel_sum: self.energy,
            expected_min,
            tolerance,
        })
    }
}
