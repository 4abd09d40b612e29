//! Ready-made samples.

use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

use microsim_shared::algo::derive_seed;

use crate::error::ConfigError;
use crate::quantities::{PixelPosition, Wavelength};

use super::fluorophore::Fluorophore;
use super::state_machine::StateMachine;
use super::Emitters;

pub const ON: usize = 0;
pub const OFF: usize = 1;
pub const BLEACHED: usize = 2;

/// Photophysics of a fluorophore that blinks and bleaches.
///
/// OFF returns to ON at the constant rate `k_on`. Leaving ON, to OFF with
/// `k_off` or to BLEACHED with `k_bleach`, happens per unit irradiance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreeStateParams {
    pub k_on: f64,
    pub k_off: f64,
    pub k_bleach: f64,
    pub cross_section: f64,
    pub fluorescence_lifetime: f64,
    pub quantum_yield: f64,
    pub wavelength: Wavelength,
}

impl Default for ThreeStateParams {
    fn default() -> Self {
        Self {
            k_on: 0.01,
            k_off: 0.1,
            k_bleach: 0.001,
            cross_section: 1e-6,
            fluorescence_lifetime: 1e-6,
            quantum_yield: 0.8,
            wavelength: Wavelength::nanometers_unchecked(520.0),
        }
    }
}

impl ThreeStateParams {
    fn rates(&self) -> Result<(Array2<f64>, Array4<f64>), ConfigError> {
        for (name, value) in [
            ("k_on", self.k_on),
            ("k_off", self.k_off),
            ("k_bleach", self.k_bleach),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    name,
                    value,
                    "must be finite and non-negative",
                ));
            }
        }
        let mut constants = Array2::zeros((3, 3));
        constants[[OFF, ON]] = self.k_on;
        let mut coefficients = Array4::zeros((1, 1, 3, 3));
        coefficients[[0, 0, ON, OFF]] = self.k_off;
        coefficients[[0, 0, ON, BLEACHED]] = self.k_bleach;
        Ok((constants, coefficients))
    }
}

/// One ON/OFF/BLEACHED fluorophore per position, all starting ON.
///
/// Fluorophore `i` seeds its state machine from stream `i` of `seed`.
pub fn three_state_fluorophores(
    positions: &[PixelPosition],
    params: &ThreeStateParams,
    seed: u64,
) -> Result<Emitters, ConfigError> {
    let (constants, coefficients) = params.rates()?;
    let fluorophores = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let machine = StateMachine::new(
                ON,
                &[0.0],
                constants.clone(),
                coefficients.clone(),
                derive_seed(seed, i as u64),
            )?;
            Fluorophore::new(
                position,
                params.wavelength,
                params.cross_section,
                params.fluorescence_lifetime,
                params.quantum_yield,
                ON,
                machine,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Emitters::new(fluorophores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::Sample;
    use crate::sources::UniformMono2D;

    fn positions(n: usize) -> Vec<PixelPosition> {
        (0..n)
            .map(|i| PixelPosition::in_focus(i as f64, 1.0).unwrap())
            .collect()
    }

    #[test]
    fn test_all_start_on() {
        let sample = three_state_fluorophores(&positions(4), &ThreeStateParams::default(), 9).unwrap();
        assert_eq!(sample.len(), 4);
        assert!(sample.fluorophores().iter().all(|f| f.state() == ON));
    }

    #[test]
    fn test_dark_sample_stays_on() {
        let mut sample =
            three_state_fluorophores(&positions(3), &ThreeStateParams::default(), 1).unwrap();
        let dark = UniformMono2D::new(1.0, 0.0, (0.0, 10.0), (0.0, 10.0)).unwrap();
        for step in 0..10 {
            let emitters = sample.response(step as f64, 1.0, &dark).unwrap();
            assert!(emitters.iter().all(|e| e.brightness.value() == 0.0));
        }
        assert!(sample.fluorophores().iter().all(|f| f.state() == ON));
    }

    #[test]
    fn test_bright_light_bleaches_everything() {
        let params = ThreeStateParams {
            k_on: 0.0,
            ..ThreeStateParams::default()
        };
        let mut sample = three_state_fluorophores(&positions(20), &params, 2).unwrap();
        let lamp = UniformMono2D::new(1e4, 1e4, (-1.0, 100.0), (0.0, 2.0)).unwrap();
        for step in 0..50 {
            sample.response(step as f64, 1.0, &lamp).unwrap();
        }
        assert!(sample
            .fluorophores()
            .iter()
            .all(|f| f.state() == OFF || f.state() == BLEACHED));
    }

    #[test]
    fn test_same_seed_same_photons() {
        let lamp = UniformMono2D::new(100.0, 100.0, (-1.0, 10.0), (0.0, 2.0)).unwrap();
        let run = |seed| {
            let mut sample =
                three_state_fluorophores(&positions(5), &ThreeStateParams::default(), seed).unwrap();
            (0..20)
                .flat_map(|step| sample.response(step as f64, 1.0, &lamp).unwrap())
                .map(|e| e.brightness.value())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn test_rejects_negative_rates() {
        let params = ThreeStateParams {
            k_off: -1.0,
            ..ThreeStateParams::default()
        };
        assert!(three_state_fluorophores(&positions(1), &params, 0).is_err());
    }
}
