//! Detector pixel grid and its relation to the optics.

use microsim_shared::units::{Length, LengthExt};
use serde::{Deserialize, Serialize};

use super::objective::{positive, OpticalConfig};
use crate::diagnostics::Diagnostic;
use crate::error::ConfigError;

/// Rectangular grid of square detector pixels.
///
/// Pixel `(col, row)` is centred at the continuous coordinate `(col, row)`
/// and covers `[col - ½, col + ½] × [row - ½, row + ½]`. Images on this grid
/// are `Array2` with shape `(height, width)`, indexed `[[row, col]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorGrid {
    pub width: usize,
    pub height: usize,
    /// Physical pixel pitch on the sensor in micrometres.
    pub pixel_pitch_um: f64,
}

impl DetectorGrid {
    pub fn new(width: usize, height: usize, pixel_pitch: Length) -> Result<Self, ConfigError> {
        let grid = Self {
            width,
            height,
            pixel_pitch_um: pixel_pitch.as_micrometers(),
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 {
            return Err(ConfigError::invalid("width", 0.0, "must be a positive integer"));
        }
        if self.height == 0 {
            return Err(ConfigError::invalid("height", 0.0, "must be a positive integer"));
        }
        positive("pixel_pitch_um", self.pixel_pitch_um)
    }

    /// Array shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn pixel_pitch(&self) -> Length {
        Length::from_micrometers(self.pixel_pitch_um)
    }

    /// Size of one pixel projected back into the sample, in micrometres.
    pub fn object_pixel_um(&self, optics: &OpticalConfig) -> f64 {
        self.pixel_pitch_um / optics.magnification
    }

    /// Report aliasing risk when the object-space pixel exceeds λ_min / (4·NA).
    pub fn sampling_diagnostic(&self, optics: &OpticalConfig) -> Option<Diagnostic> {
        let object_pixel_nm = self.object_pixel_um(optics) * 1000.0;
        let nyquist_nm = optics.nyquist_limit_nm();
        (object_pixel_nm > nyquist_nm).then_some(Diagnostic::Undersampled {
            object_pixel_nm,
            nyquist_nm,
        })
    }

    /// Whether `(x, y)` lies strictly inside the grid's footprint grown by
    /// `margin` pixels.
    ///
    /// The boundary is open: a position exactly on it rounds half away from
    /// zero onto a pixel one step further out.
    pub fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        let x_ok = x > -0.5 - margin && x < self.width as f64 - 0.5 + margin;
        let y_ok = y > -0.5 - margin && y < self.height as f64 - 0.5 + margin;
        x_ok && y_ok
    }

    /// Whether a `(2r+1)²` kernel centred on pixel `center` (col, row) touches
    /// at least one pixel of the grid.
    pub fn overlaps_footprint(&self, center: (i64, i64), radius: usize) -> bool {
        let r = radius as i64;
        let (col, row) = center;
        col + r >= 0
            && col - r < self.width as i64
            && row + r >= 0
            && row - r < self.height as i64
    }

    /// Continuous coordinate of the grid centre.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.width as f64 - 1.0) / 2.0,
            (self.height as f64 - 1.0) / 2.0,
        )
    }
}

impl Default for DetectorGrid {
    /// 32 × 32 pixels of 6.5 µm, a typical sCMOS pitch.
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            pixel_pitch_um: 6.5,
        }
    }
}
