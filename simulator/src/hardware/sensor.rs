//! Sensor configuration for simulating detector characteristics

use std::time::Duration;

use microsim_shared::units::{Temperature, TemperatureExt};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::dark_current::DarkCurrentEstimator;
use super::objective::positive;
use crate::error::ConfigError;

/// ADC resolutions supported by the quantizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    Eight,
    Ten,
    Twelve,
    Sixteen,
    ThirtyTwo,
}

impl BitDepth {
    pub fn bits(&self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Ten => 10,
            BitDepth::Twelve => 12,
            BitDepth::Sixteen => 16,
            BitDepth::ThirtyTwo => 32,
        }
    }

    /// Largest representable value, 2^bits − 1.
    pub fn max_adu(&self) -> u32 {
        match self {
            BitDepth::ThirtyTwo => u32::MAX,
            other => (1u32 << other.bits()) - 1,
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = ConfigError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            10 => Ok(BitDepth::Ten),
            12 => Ok(BitDepth::Twelve),
            16 => Ok(BitDepth::Sixteen),
            32 => Ok(BitDepth::ThirtyTwo),
            other => Err(ConfigError::invalid(
                "bit_depth",
                other as f64,
                "must be one of 8, 10, 12, 16 or 32",
            )),
        }
    }
}

/// Per-stage switches for the sensor model, applied in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseStages {
    /// Poisson sampling of the expected electron count.
    pub shot_noise: bool,
    /// Additive Gaussian read noise.
    pub read_noise: bool,
    /// Gain, baseline, rounding and clipping to the bit depth.
    pub quantization: bool,
}

impl NoiseStages {
    pub const ALL: NoiseStages = NoiseStages {
        shot_noise: true,
        read_noise: true,
        quantization: true,
    };

    /// Deterministic pipeline: no stochastic stage, still quantized.
    pub const NOISELESS: NoiseStages = NoiseStages {
        shot_noise: false,
        read_noise: false,
        quantization: true,
    };

    /// Analog electrons without any noise.
    pub const NONE: NoiseStages = NoiseStages {
        shot_noise: false,
        read_noise: false,
        quantization: false,
    };
}

impl Default for NoiseStages {
    fn default() -> Self {
        Self::ALL
    }
}

/// Configuration for a camera sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Name/model of the sensor
    pub name: String,
    /// Fraction of incident photons converted to photoelectrons, in [0, 1]
    pub quantum_efficiency: f64,
    /// ADU per electron
    pub gain_adu_per_e: f64,
    /// Offset added to every pixel after gain, in ADU
    pub baseline_adu: f64,
    /// Read noise standard deviation in electrons
    pub read_noise_e: f64,
    pub bit_depth: BitDepth,
    pub dark_current: DarkCurrentEstimator,
    /// Operating temperature in degrees Celsius
    pub temperature_c: f64,
    /// Pixel saturation in electrons, if modelled
    pub full_well_e: Option<f64>,
    pub exposure: Duration,
    pub stages: NoiseStages,
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let qe = self.quantum_efficiency;
        if !qe.is_finite() || !(0.0..=1.0).contains(&qe) {
            return Err(ConfigError::invalid(
                "quantum_efficiency",
                qe,
                "must lie within [0, 1]",
            ));
        }
        positive("gain_adu_per_e", self.gain_adu_per_e)?;
        non_negative("baseline_adu", self.baseline_adu)?;
        non_negative("read_noise_e", self.read_noise_e)?;
        non_negative("dark_current", self.dark_current.reference_dark_current())?;
        if !self.temperature_c.is_finite() {
            return Err(ConfigError::invalid(
                "temperature_c",
                self.temperature_c,
                "must be finite",
            ));
        }
        if let Some(full_well) = self.full_well_e {
            positive("full_well_e", full_well)?;
        }
        Ok(())
    }

    pub fn temperature(&self) -> Temperature {
        Temperature::from_celsius(self.temperature_c)
    }

    /// Mean dark electrons per pixel over one exposure.
    pub fn dark_electrons(&self) -> f64 {
        self.dark_current.electrons(self.temperature(), self.exposure)
    }

    pub fn max_adu(&self) -> u32 {
        self.bit_depth.max_adu()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stages(mut self, stages: NoiseStages) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_read_noise(mut self, read_noise_e: f64) -> Result<Self, ConfigError> {
        self.read_noise_e = read_noise_e;
        self.validate()?;
        Ok(self)
    }

    pub fn with_bit_depth(mut self, bit_depth: BitDepth) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn with_gain(mut self, gain_adu_per_e: f64, baseline_adu: f64) -> Result<Self, ConfigError> {
        self.gain_adu_per_e = gain_adu_per_e;
        self.baseline_adu = baseline_adu;
        self.validate()?;
        Ok(self)
    }

    pub fn with_quantum_efficiency(mut self, quantum_efficiency: f64) -> Result<Self, ConfigError> {
        self.quantum_efficiency = quantum_efficiency;
        self.validate()?;
        Ok(self)
    }

    pub fn with_full_well(mut self, full_well_e: Option<f64>) -> Result<Self, ConfigError> {
        self.full_well_e = full_well_e;
        self.validate()?;
        Ok(self)
    }

    pub fn with_dark_current(
        mut self,
        dark_current: DarkCurrentEstimator,
        temperature: Temperature,
    ) -> Result<Self, ConfigError> {
        self.dark_current = dark_current;
        self.temperature_c = temperature.as_celsius();
        self.validate()?;
        Ok(self)
    }

    pub fn with_exposure(mut self, exposure: Duration) -> Self {
        self.exposure = exposure;
        self
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(name, value, "must be finite and non-negative"));
    }
    Ok(())
}

impl Default for SensorConfig {
    /// Generic 12-bit CMOS camera.
    fn default() -> Self {
        Self {
            name: "Simple CMOS".to_string(),
            quantum_efficiency: 0.69,
            gain_adu_per_e: 5.88,
            baseline_adu: 100.0,
            read_noise_e: 2.29,
            bit_depth: BitDepth::Twelve,
            dark_current: DarkCurrentEstimator::none(),
            temperature_c: 20.0,
            full_well_e: None,
            exposure: Duration::from_millis(100),
            stages: NoiseStages::ALL,
        }
    }
}

/// Standard sensor models
pub mod models {
    use super::*;

    /// Generic 12-bit CMOS camera without dark current.
    pub static SIMPLE_CMOS: Lazy<SensorConfig> = Lazy::new(SensorConfig::default);

    /// Scientific CMOS in the style of a Hamamatsu ORCA-Flash4.0.
    pub static SCMOS_16BIT: Lazy<SensorConfig> = Lazy::new(|| SensorConfig {
        name: "sCMOS 16-bit".to_string(),
        quantum_efficiency: 0.82,
        gain_adu_per_e: 2.17,
        baseline_adu: 100.0,
        read_noise_e: 1.6,
        bit_depth: BitDepth::Sixteen,
        dark_current: DarkCurrentEstimator::new(0.06, Temperature::from_celsius(-10.0)),
        temperature_c: -10.0,
        full_well_e: Some(30_000.0),
        exposure: Duration::from_millis(50),
        stages: NoiseStages::ALL,
    });

    /// Deep-cooled EMCCD-like camera with negligible read noise after gain.
    pub static COOLED_EMCCD: Lazy<SensorConfig> = Lazy::new(|| SensorConfig {
        name: "Cooled EMCCD".to_string(),
        quantum_efficiency: 0.95,
        gain_adu_per_e: 10.0,
        baseline_adu: 200.0,
        read_noise_e: 0.1,
        bit_depth: BitDepth::Sixteen,
        dark_current: DarkCurrentEstimator::new(0.0002, Temperature::from_celsius(-80.0)),
        temperature_c: -80.0,
        full_well_e: Some(80_000.0),
        exposure: Duration::from_millis(30),
        stages: NoiseStages::ALL,
    });
}
