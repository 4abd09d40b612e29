//! Validated physical quantities used throughout the engine.
//!
//! Each type checks its invariant once at construction so that downstream
//! code can use the raw value without re-validating.

use std::fmt;
use std::ops::{Add, Mul};

use microsim_shared::units::{Length, LengthExt};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shortest wavelength the engine accepts.
pub const MIN_WAVELENGTH_NM: f64 = 100.0;
/// Longest wavelength the engine accepts.
pub const MAX_WAVELENGTH_NM: f64 = 20_000.0;

/// Vacuum wavelength of emitted or detected light.
///
/// Always finite and within [`MIN_WAVELENGTH_NM`, `MAX_WAVELENGTH_NM`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Wavelength(Length);

impl Wavelength {
    pub fn new(length: Length) -> Result<Self, ConfigError> {
        let nm = length.as_nanometers();
        if !nm.is_finite() || !(MIN_WAVELENGTH_NM..=MAX_WAVELENGTH_NM).contains(&nm) {
            return Err(ConfigError::invalid(
                "wavelength_nm",
                nm,
                "must lie within [100 nm, 20 µm]",
            ));
        }
        Ok(Self(length))
    }

    pub fn from_nanometers(nm: f64) -> Result<Self, ConfigError> {
        Self::new(Length::from_nanometers(nm))
    }

    /// For compile-time known constants inside the supported range.
    pub(crate) fn nanometers_unchecked(nm: f64) -> Self {
        debug_assert!((MIN_WAVELENGTH_NM..=MAX_WAVELENGTH_NM).contains(&nm));
        Self(Length::from_nanometers(nm))
    }

    pub fn length(&self) -> Length {
        self.0
    }

    pub fn as_nanometers(&self) -> f64 {
        self.0.as_nanometers()
    }

    pub fn as_micrometers(&self) -> f64 {
        self.0.as_micrometers()
    }
}

impl TryFrom<f64> for Wavelength {
    type Error = ConfigError;

    fn try_from(nm: f64) -> Result<Self, Self::Error> {
        Self::from_nanometers(nm)
    }
}

impl From<Wavelength> for f64 {
    fn from(wavelength: Wavelength) -> f64 {
        wavelength.as_nanometers()
    }
}

impl fmt::Display for Wavelength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} nm", self.as_nanometers())
    }
}

/// Expected number of photons, finite and non-negative.
///
/// Stays floating point all the way to the sensor model; nothing rounds it.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct PhotonCount(f64);

impl PhotonCount {
    pub const ZERO: PhotonCount = PhotonCount(0.0);

    pub fn new(photons: f64) -> Result<Self, ConfigError> {
        if !photons.is_finite() || photons < 0.0 {
            return Err(ConfigError::invalid(
                "photons",
                photons,
                "must be finite and non-negative",
            ));
        }
        Ok(Self(photons))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for PhotonCount {
    type Error = ConfigError;

    fn try_from(photons: f64) -> Result<Self, Self::Error> {
        Self::new(photons)
    }
}

impl From<PhotonCount> for f64 {
    fn from(photons: PhotonCount) -> f64 {
        photons.0
    }
}

impl Add for PhotonCount {
    type Output = PhotonCount;

    fn add(self, rhs: PhotonCount) -> PhotonCount {
        PhotonCount(self.0 + rhs.0)
    }
}

/// Scaling by a non-negative factor, e.g. a PSF weight or an on-fraction.
impl Mul<f64> for PhotonCount {
    type Output = PhotonCount;

    fn mul(self, factor: f64) -> PhotonCount {
        PhotonCount(self.0 * factor.max(0.0))
    }
}

/// Continuous position on the detector.
///
/// `x` is the column and `y` the row, both in detector pixels with pixel
/// centres at integer coordinates. `z` is the axial offset from focus in
/// micrometres of object space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PixelPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, ConfigError> {
        for (name, value) in [("x", x), ("y", y), ("z", z)] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(name, value, "position must be finite"));
            }
        }
        Ok(Self { x, y, z })
    }

    pub fn in_focus(x: f64, y: f64) -> Result<Self, ConfigError> {
        Self::new(x, y, 0.0)
    }
}

/// Excitation irradiance, power per unit area, finite and non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Irradiance(f64);

impl Irradiance {
    pub const ZERO: Irradiance = Irradiance(0.0);

    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::invalid(
                "irradiance",
                value,
                "must be finite and non-negative",
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Irradiance {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Irradiance> for f64 {
    fn from(irradiance: Irradiance) -> f64 {
        irradiance.0
    }
}
