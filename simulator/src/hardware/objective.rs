//! Objective lens configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quantities::Wavelength;

/// Diffraction model used to spread each emitter over the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PsfModel {
    /// Gaussian approximation of the widefield PSF.
    #[default]
    Gaussian,
    /// Exact Airy pattern, integrated over each pixel with a composite
    /// Simpson rule of `simpson_points` samples per axis (odd).
    Airy { simpson_points: usize },
}

impl PsfModel {
    pub const DEFAULT_SIMPSON_POINTS: usize = 5;

    pub fn default_airy() -> Self {
        PsfModel::Airy {
            simpson_points: Self::DEFAULT_SIMPSON_POINTS,
        }
    }
}

/// Imaging properties of the objective and immersion medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalConfig {
    pub numerical_aperture: f64,
    pub magnification: f64,
    /// Refractive index of the immersion medium.
    pub refractive_index: f64,
    /// Shortest wavelength the configuration is meant to image.
    pub passband_min: Wavelength,
    /// Longest wavelength the configuration is meant to image.
    pub passband_max: Wavelength,
    pub psf_model: PsfModel,
}

impl OpticalConfig {
    pub fn new(
        numerical_aperture: f64,
        magnification: f64,
        refractive_index: f64,
        passband: (Wavelength, Wavelength),
        psf_model: PsfModel,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            numerical_aperture,
            magnification,
            refractive_index,
            passband_min: passband.0,
            passband_max: passband.1,
            psf_model,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant. Also run by the simulator before use since the
    /// fields are public.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("numerical_aperture", self.numerical_aperture)?;
        positive("magnification", self.magnification)?;
        positive("refractive_index", self.refractive_index)?;
        if self.numerical_aperture > self.refractive_index {
            return Err(ConfigError::invalid(
                "numerical_aperture",
                self.numerical_aperture,
                "cannot exceed the immersion refractive index",
            ));
        }
        if self.passband_min > self.passband_max {
            return Err(ConfigError::invalid(
                "passband_min",
                self.passband_min.as_nanometers(),
                "must not exceed passband_max",
            ));
        }
        if let PsfModel::Airy { simpson_points } = self.psf_model {
            if simpson_points == 0 || simpson_points % 2 == 0 {
                return Err(ConfigError::invalid(
                    "simpson_points",
                    simpson_points as f64,
                    "must be a positive odd number",
                ));
            }
        }
        Ok(())
    }

    pub fn with_psf_model(mut self, psf_model: PsfModel) -> Result<Self, ConfigError> {
        self.psf_model = psf_model;
        self.validate()?;
        Ok(self)
    }

    pub fn with_numerical_aperture(mut self, numerical_aperture: f64) -> Result<Self, ConfigError> {
        self.numerical_aperture = numerical_aperture;
        self.validate()?;
        Ok(self)
    }

    pub fn with_magnification(mut self, magnification: f64) -> Result<Self, ConfigError> {
        self.magnification = magnification;
        self.validate()?;
        Ok(self)
    }

    pub fn with_passband(mut self, min: Wavelength, max: Wavelength) -> Result<Self, ConfigError> {
        self.passband_min = min;
        self.passband_max = max;
        self.validate()?;
        Ok(self)
    }

    pub fn contains_wavelength(&self, wavelength: Wavelength) -> bool {
        wavelength >= self.passband_min && wavelength <= self.passband_max
    }

    /// Nyquist sampling limit in object space, λ_min / (4·NA), in nanometres.
    pub fn nyquist_limit_nm(&self) -> f64 {
        self.passband_min.as_nanometers() / (4.0 * self.numerical_aperture)
    }
}

pub(crate) fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::invalid(name, value, "must be finite and positive"));
    }
    Ok(())
}

impl Default for OpticalConfig {
    /// 100x / 1.4 NA oil immersion objective imaging the visible band.
    fn default() -> Self {
        Self {
            numerical_aperture: 1.4,
            magnification: 100.0,
            refractive_index: 1.515,
            passband_min: Wavelength::nanometers_unchecked(400.0),
            passband_max: Wavelength::nanometers_unchecked(750.0),
            psf_model: PsfModel::Gaussian,
        }
    }
}

/// Common objectives.
pub mod models {
    use super::*;
    use once_cell::sync::Lazy;

    /// 100x / 1.4 NA oil immersion.
    pub static OIL_100X_140: Lazy<OpticalConfig> = Lazy::new(OpticalConfig::default);

    /// 60x / 1.2 NA water immersion.
    pub static WATER_60X_120: Lazy<OpticalConfig> = Lazy::new(|| OpticalConfig {
        numerical_aperture: 1.2,
        magnification: 60.0,
        refractive_index: 1.333,
        ..OpticalConfig::default()
    });

    /// 20x / 0.75 NA air objective.
    pub static AIR_20X_075: Lazy<OpticalConfig> = Lazy::new(|| OpticalConfig {
        numerical_aperture: 0.75,
        magnification: 20.0,
        refractive_index: 1.0,
        ..OpticalConfig::default()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nm(value: f64) -> Wavelength {
        Wavelength::from_nanometers(value).unwrap()
    }

    #[test]
    fn test_default_is_valid() {
        assert!(OpticalConfig::default().validate().is_ok());
        assert!(models::WATER_60X_120.validate().is_ok());
        assert!(models::AIR_20X_075.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive() {
        let passband = (nm(400.0), nm(700.0));
        assert!(OpticalConfig::new(0.0, 100.0, 1.5, passband, PsfModel::Gaussian).is_err());
        assert!(OpticalConfig::new(1.2, -1.0, 1.5, passband, PsfModel::Gaussian).is_err());
        assert!(OpticalConfig::new(1.2, 60.0, f64::NAN, passband, PsfModel::Gaussian).is_err());
    }

    #[test]
    fn test_na_cannot_exceed_index() {
        let err = OpticalConfig::default().with_numerical_aperture(1.6).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "numerical_aperture",
                ..
            }
        ));
    }

    #[test]
    fn test_passband_order_and_membership() {
        assert!(OpticalConfig::default()
            .with_passband(nm(700.0), nm(400.0))
            .is_err());
        let optics = OpticalConfig::default();
        assert!(optics.contains_wavelength(nm(520.0)));
        assert!(!optics.contains_wavelength(nm(900.0)));
    }

    #[test]
    fn test_simpson_points_must_be_odd() {
        let optics = OpticalConfig::default();
        assert!(optics
            .clone()
            .with_psf_model(PsfModel::Airy { simpson_points: 4 })
            .is_err());
        assert!(optics
            .with_psf_model(PsfModel::Airy { simpson_points: 5 })
            .is_ok());
    }

    #[test]
    fn test_nyquist_limit() {
        let optics = OpticalConfig::default();
        assert!((optics.nyquist_limit_nm() - 400.0 / 5.6).abs() < 1e-9);
    }

    #[test]
    fn test_default_airy_uses_five_point_simpson() {
        assert_eq!(PsfModel::default_airy(), PsfModel::Airy { simpson_points: 5 });
        let optics = OpticalConfig::default()
            .with_psf_model(PsfModel::default_airy())
            .unwrap();
        assert!(optics.validate().is_ok());
    }
}
