//! Sensor model: converts a noiseless photon image into a detector frame.
//!
//! Stages run in a fixed order and can each be switched off through
//! [`NoiseStages`](super::sensor::NoiseStages):
//!
//! 1. Shot noise: expected electrons `QE · photons + dark` drawn from a Poisson
//!    distribution per pixel. When disabled the expectation passes through.
//! 2. Read noise: additive zero-mean Gaussian with `read_noise_e` sigma.
//! 3. Quantization: full-well clip, `electrons · gain + baseline`, rounding,
//!    clip to the bit depth. When disabled the frame holds analog electrons.
//!
//! Each stochastic stage draws from its own sub-stream of the frame's
//! [`RandomState`], so toggling one stage never changes another's samples.

use log::debug;
use microsim_shared::image_proc::{
    add_gaussian_read_noise, apply_poisson_photon_noise, check_photon_image,
};
use ndarray::Array2;

use super::grid::DetectorGrid;
use super::sensor::SensorConfig;
use crate::error::{ConfigError, Result};
use crate::frame::{FrameData, SimulatedFrame};
use crate::image_proc::render::quantize_image;
use crate::random::{RandomState, READ_NOISE_STREAM, SHOT_NOISE_STREAM};

/// Mean electrons per pixel before any stochastic stage.
pub fn expected_electrons(photons: &Array2<f64>, sensor: &SensorConfig) -> Array2<f64> {
    let qe = sensor.quantum_efficiency;
    let dark = sensor.dark_electrons();
    photons.mapv(|p| qe * p + dark)
}

/// Run the sensor model on one noiseless image.
///
/// The input is never modified.
///
/// # Errors
/// * [`ConfigError::ShapeMismatch`] when the image does not match `grid`
/// * [`crate::error::DomainError::NegativeFlux`] for a negative or non-finite
///   pixel, reported before any sampling happens
pub fn expose(
    photons: &Array2<f64>,
    sensor: &SensorConfig,
    grid: &DetectorGrid,
    state: &RandomState,
    index: usize,
) -> Result<SimulatedFrame> {
    if photons.dim() != grid.shape() {
        return Err(ConfigError::ShapeMismatch {
            expected: grid.shape(),
            actual: photons.dim(),
        }
        .into());
    }
    check_photon_image(photons)?;

    let stages = sensor.stages;
    let mut electrons = expected_electrons(photons, sensor);

    if stages.shot_noise {
        electrons = apply_poisson_photon_noise(&electrons, state.stream(SHOT_NOISE_STREAM))?;
    }
    if stages.read_noise && sensor.read_noise_e > 0.0 {
        electrons = add_gaussian_read_noise(
            &electrons,
            sensor.read_noise_e,
            state.stream(READ_NOISE_STREAM),
        )?;
    }

    let data = if stages.quantization {
        FrameData::Quantized(quantize_image(&electrons, sensor))
    } else {
        FrameData::Analog(electrons)
    };

    debug!(
        "frame {index}: sensor '{}' seed {:#018x} stages {:?}",
        sensor.name,
        state.seed(),
        stages
    );

    Ok(SimulatedFrame {
        data,
        index,
        exposure: sensor.exposure,
        seed: state.seed(),
    })
}
