//! Error taxonomy for the simulation engine.
//!
//! Configuration problems and domain violations are hard errors raised
//! before any frame is produced. Numerical problems are normally reported as
//! [`Diagnostic`]s next to the output and only become errors in strict mode.

use microsim_shared::image_proc::NoiseError;
use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Invalid, out-of-range or incompatible configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("parameter `{name}` = {value} is invalid: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("scene contains no emitters and empty scenes are not allowed")]
    EmptyScene,
    #[error("image shape {actual:?} does not match detector grid {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("mismatched coordinate lengths: x={x}, y={y}, z={z}, brightness={brightness}")]
    MismatchedLengths {
        x: usize,
        y: usize,
        z: usize,
        brightness: usize,
    },
    #[error("state machine is inconsistent: {0}")]
    StateMachine(String),
    #[error("strict mode rejected configuration: {0}")]
    Strict(Diagnostic),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        ConfigError::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// Physical inputs that cannot be simulated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("emitter {index} at ({x}, {y}) lies outside the grid expanded by {margin} px")]
    EmitterOutOfBounds {
        index: usize,
        x: f64,
        y: f64,
        margin: f64,
    },
    #[error("emitter {index} wavelength {wavelength_nm} nm is outside the passband [{min_nm}, {max_nm}] nm")]
    WavelengthOutsidePassband {
        index: usize,
        wavelength_nm: f64,
        min_nm: f64,
        max_nm: f64,
    },
    #[error("photon flux at (row {row}, col {col}) is {value}; flux must be finite and non-negative")]
    NegativeFlux { row: usize, col: usize, value: f64 },
}

/// Top-level error returned by the engine entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("numerical check failed in strict mode: {0}")]
    Numerical(Diagnostic),
}

impl From<NoiseError> for SimulationError {
    fn from(err: NoiseError) -> Self {
        match err {
            NoiseError::InvalidFlux { row, col, value } => {
                SimulationError::Domain(DomainError::NegativeFlux { row, col, value })
            }
            NoiseError::InvalidStdDev(value) => SimulationError::Configuration(
                ConfigError::invalid("read_noise_e", value, "must be finite and non-negative"),
            ),
        }
    }
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
