//! Samples: what sits under the objective and how it answers illumination.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quantities::{PixelPosition, Wavelength};
use crate::scene::Emitter;
use crate::sources::Source;

pub mod factories;
pub mod fluorophore;
pub mod state_machine;

pub use factories::{three_state_fluorophores, ThreeStateParams};
pub use fluorophore::Fluorophore;
pub use state_machine::{Event, StateMachine};

/// A sample emits photons in response to a light source.
pub trait Sample: fmt::Debug + Send {
    /// Emitters active during `[time, time + dt)`, brightness in photons
    /// emitted over that interval.
    fn response(
        &mut self,
        time: f64,
        dt: f64,
        source: &dyn Source,
    ) -> Result<Vec<Emitter>, ConfigError>;
}

/// A sample that never emits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NullSample;

impl Sample for NullSample {
    fn response(
        &mut self,
        _time: f64,
        _dt: f64,
        _source: &dyn Source,
    ) -> Result<Vec<Emitter>, ConfigError> {
        Ok(Vec::new())
    }
}

/// Fixed emitters with a constant photon rate, blind to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantEmitters {
    positions: Vec<PixelPosition>,
    rate: f64,
    wavelength: Wavelength,
}

impl ConstantEmitters {
    /// `rate` is photons per unit time.
    pub fn new(
        positions: Vec<PixelPosition>,
        rate: f64,
        wavelength: Wavelength,
    ) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::invalid(
                "rate",
                rate,
                "must be finite and non-negative",
            ));
        }
        Ok(Self {
            positions,
            rate,
            wavelength,
        })
    }

    pub fn positions(&self) -> &[PixelPosition] {
        &self.positions
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Sample for ConstantEmitters {
    fn response(
        &mut self,
        _time: f64,
        dt: f64,
        _source: &dyn Source,
    ) -> Result<Vec<Emitter>, ConfigError> {
        self.positions
            .iter()
            .map(|p| Emitter::new(p.x, p.y, p.z, self.wavelength, self.rate * dt))
            .collect()
    }
}

/// A collection of independently evolving fluorophores.
#[derive(Debug, Clone, Default)]
pub struct Emitters {
    fluorophores: Vec<Fluorophore>,
}

impl Emitters {
    pub fn new(fluorophores: Vec<Fluorophore>) -> Self {
        Self { fluorophores }
    }

    pub fn fluorophores(&self) -> &[Fluorophore] {
        &self.fluorophores
    }

    pub fn len(&self) -> usize {
        self.fluorophores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fluorophores.is_empty()
    }
}

impl Sample for Emitters {
    fn response(
        &mut self,
        time: f64,
        dt: f64,
        source: &dyn Source,
    ) -> Result<Vec<Emitter>, ConfigError> {
        // each fluorophore draws from its own generator, so order of
        // evaluation does not change the outcome
        self.fluorophores
            .par_iter_mut()
            .map(|f| f.response(time, dt, source))
            .collect()
    }
}
