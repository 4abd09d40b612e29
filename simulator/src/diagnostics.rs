//! Non-fatal numerical conditions detected while simulating.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

/// A numerical condition worth surfacing to the caller.
///
/// Diagnostics are logged at `warn` level when recorded and returned with
/// the simulation output. In strict mode the first one aborts the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// Sum of a sampled kernel differs from the energy it should carry.
    EnergyDrift {
        wavelength_nm: f64,
        radius_px: usize,
        kernel_sum: f64,
        expected_min: f64,
        tolerance: f64,
    },
    /// Truncation radius is predicted to drop more than `tolerance` of the flux.
    TruncationLoss {
        wavelength_nm: f64,
        radius_px: usize,
        predicted_loss: f64,
        tolerance: f64,
    },
    /// Object-space pixel is larger than the Nyquist sampling limit.
    Undersampled {
        object_pixel_nm: f64,
        nyquist_nm: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EnergyDrift {
                wavelength_nm,
                radius_px,
                kernel_sum,
                expected_min,
                tolerance,
            } => write!(
                f,
                "PSF kernel at {wavelength_nm:.1} nm (radius {radius_px} px) sums to {kernel_sum:.6}, \
                 expected within [{expected_min:.6}, 1] ± {tolerance:e}"
            ),
            Diagnostic::TruncationLoss {
                wavelength_nm,
                radius_px,
                predicted_loss,
                tolerance,
            } => write!(
                f,
                "truncation radius {radius_px} px loses {predicted_loss:.3e} of the flux at \
                 {wavelength_nm:.1} nm (tolerance {tolerance:e})"
            ),
            Diagnostic::Undersampled {
                object_pixel_nm,
                nyquist_nm,
            } => write!(
                f,
                "object-space pixel {object_pixel_nm:.1} nm exceeds the Nyquist limit {nyquist_nm:.1} nm; \
                 the image may alias"
            ),
        }
    }
}

/// Ordered, de-duplicated collection of diagnostics for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic, logging it the first time it is seen.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if !self.entries.contains(&diagnostic) {
            warn!("{diagnostic}");
            self.entries.push(diagnostic);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn first(&self) -> Option<&Diagnostic> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
