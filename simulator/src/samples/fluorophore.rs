//! Single fluorophore with state-machine photophysics.

use crate::error::ConfigError;
use crate::hardware::objective::positive;
use crate::quantities::{Irradiance, PixelPosition, Wavelength};
use crate::scene::Emitter;
use crate::sources::Source;

use super::state_machine::{Event, StateMachine};

#[derive(Debug, Clone)]
pub struct Fluorophore {
    position: PixelPosition,
    wavelength: Wavelength,
    /// Absorption cross section, area per irradiance unit.
    cross_section: f64,
    fluorescence_lifetime: f64,
    quantum_yield: f64,
    /// The state in which the fluorophore emits.
    fluorescence_state: usize,
    state_machine: StateMachine,
}

impl Fluorophore {
    pub fn new(
        position: PixelPosition,
        wavelength: Wavelength,
        cross_section: f64,
        fluorescence_lifetime: f64,
        quantum_yield: f64,
        fluorescence_state: usize,
        state_machine: StateMachine,
    ) -> Result<Self, ConfigError> {
        positive("cross_section", cross_section)?;
        positive("fluorescence_lifetime", fluorescence_lifetime)?;
        if !(0.0..=1.0).contains(&quantum_yield) {
            return Err(ConfigError::invalid(
                "quantum_yield",
                quantum_yield,
                "must lie in [0, 1]",
            ));
        }
        if fluorescence_state >= state_machine.num_states() {
            return Err(ConfigError::StateMachine(format!(
                "fluorescence state {fluorescence_state} does not exist"
            )));
        }
        Ok(Self {
            position,
            wavelength,
            cross_section,
            fluorescence_lifetime,
            quantum_yield,
            fluorescence_state,
            state_machine,
        })
    }

    pub fn position(&self) -> PixelPosition {
        self.position
    }

    pub fn wavelength(&self) -> Wavelength {
        self.wavelength
    }

    pub fn state(&self) -> usize {
        self.state_machine.current_state()
    }

    pub fn is_bleached(&self) -> bool {
        self.state_machine.is_stopped()
    }

    /// Irradiance at which emission reaches half its maximum rate.
    pub fn saturation_irradiance(&self) -> f64 {
        1.0 / (self.cross_section * self.quantum_yield * self.fluorescence_lifetime)
    }

    /// Photons emitted per unit time while fluorescing under `irradiance`.
    pub fn photon_rate(&self, irradiance: Irradiance) -> f64 {
        let i = irradiance.value();
        if self.quantum_yield == 0.0 {
            return 0.0;
        }
        self.quantum_yield * self.cross_section * i / (1.0 + i / self.saturation_irradiance())
    }

    /// Fraction of `[time, time + dt)` spent in the fluorescent state.
    pub fn on_fraction(&self, start_state: usize, events: &[Event], time: f64, dt: f64) -> f64 {
        let mut on = 0.0;
        let mut t = time;
        let mut state = start_state;
        for event in events {
            if state == self.fluorescence_state {
                on += event.time - t;
            }
            t = event.time;
            state = event.to_state;
        }
        if state == self.fluorescence_state {
            on += time + dt - t;
        }
        (on / dt).clamp(0.0, 1.0)
    }

    pub fn response(
        &mut self,
        time: f64,
        dt: f64,
        source: &dyn Source,
    ) -> Result<Emitter, ConfigError> {
        let irradiance = source.irradiance(self.position.x, self.position.y);
        let start_state = self.state_machine.current_state();
        let events = self
            .state_machine
            .collect(&[irradiance.value()], time, dt);
        let on = self.on_fraction(start_state, &events, time, dt);
        let photons = on * self.photon_rate(irradiance) * dt;
        Emitter::new(
            self.position.x,
            self.position.y,
            self.position.z,
            self.wavelength,
            photons,
        )
    }
}
