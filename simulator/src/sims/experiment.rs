//! Time-stepped acquisition of an evolving sample.
//!
//! Each step asks the sample which emitters were active during
//! `[time, time + dt)`, renders them and exposes one frame. Processors can
//! adjust the source before a step and observe its result afterwards.

use log::{debug, info};
use ndarray::Array2;

use crate::diagnostics::Diagnostic;
use crate::error::{ConfigError, Result};
use crate::frame::SimulatedFrame;
use crate::random::RandomState;
use crate::samples::Sample;
use crate::scene::{Emitter, Scene};
use crate::sources::Source;

use super::simulator::Simulator;

/// Everything produced by one step.
#[derive(Debug, Clone)]
pub struct StepResponse {
    /// Start of the step.
    pub time: f64,
    pub emitters: Vec<Emitter>,
    pub noiseless: Array2<f64>,
    pub frame: SimulatedFrame,
    pub diagnostics: Vec<Diagnostic>,
}

/// Hook run around every step.
pub trait Processor<S: Source>: Send {
    /// Called before the sample responds; may reconfigure the source.
    fn pre_step(&mut self, _time: f64, _source: &mut S) {}

    fn post_step(&mut self, _response: &StepResponse) {}
}

pub struct Experiment<M, S>
where
    M: Sample + Clone,
    S: Source + Clone,
{
    sample: M,
    source: S,
    simulator: Simulator,
    time: f64,
    dt: f64,
    state: RandomState,
    step_index: usize,
    processors: Vec<Box<dyn Processor<S>>>,
    initial: (M, S, f64, RandomState),
}

impl<M, S> Experiment<M, S>
where
    M: Sample + Clone,
    S: Source + Clone,
{
    /// Steps where the sample is dark are expected, so the simulator is set
    /// to accept empty scenes.
    pub fn new(
        sample: M,
        source: S,
        simulator: Simulator,
        start_time: f64,
        dt: f64,
        state: RandomState,
    ) -> Result<Self> {
        if !start_time.is_finite() {
            return Err(ConfigError::invalid("start_time", start_time, "must be finite").into());
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConfigError::invalid("dt", dt, "must be finite and positive").into());
        }
        Ok(Self {
            initial: (sample.clone(), source.clone(), start_time, state),
            sample,
            source,
            simulator: simulator.with_allow_empty_scene(true),
            time: start_time,
            dt,
            state,
            step_index: 0,
            processors: Vec::new(),
        })
    }

    pub fn with_processor(mut self, processor: Box<dyn Processor<S>>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn state(&self) -> RandomState {
        self.state
    }

    pub fn sample(&self) -> &M {
        &self.sample
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Acquire one frame and move time and random state forward.
    ///
    /// On error the time and random state are unchanged, though the sample
    /// may already have evolved.
    pub fn step(&mut self) -> Result<StepResponse> {
        for processor in self.processors.iter_mut() {
            processor.pre_step(self.time, &mut self.source);
        }

        let emitters = self.sample.response(self.time, self.dt, &self.source)?;
        let scene = Scene::new(emitters.iter().copied());
        let (noiseless, diagnostics) = self.simulator.render_noiseless(&scene)?;
        let frame = self
            .simulator
            .expose_frame(&noiseless, &self.state, self.step_index)?;

        let response = StepResponse {
            time: self.time,
            emitters,
            noiseless,
            frame,
            diagnostics: diagnostics.into_vec(),
        };
        debug!(
            "step {} at t={:.4}: {} emitter(s), {:.1} photons",
            self.step_index,
            self.time,
            response.emitters.len(),
            response.noiseless.sum()
        );

        self.time += self.dt;
        self.state.advance();
        self.step_index += 1;

        for processor in self.processors.iter_mut() {
            processor.post_step(&response);
        }
        Ok(response)
    }

    /// Run `num_steps` steps and keep only the frames.
    pub fn run(&mut self, num_steps: usize) -> Result<Vec<SimulatedFrame>> {
        info!("running {num_steps} step(s) from t={:.4}", self.time);
        (0..num_steps)
            .map(|_| self.step().map(|response| response.frame))
            .collect()
    }

    /// Restore the starting sample, source, time and random state.
    ///
    /// Processors keep whatever state they have accumulated.
    pub fn reset(&mut self) {
        let (sample, source, time, state) = self.initial.clone();
        self.sample = sample;
        self.source = source;
        self.time = time;
        self.state = state;
        self.step_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{DetectorGrid, NoiseStages, OpticalConfig, SensorConfig};
    use crate::quantities::{PixelPosition, Wavelength};
    use crate::samples::{three_state_fluorophores, ConstantEmitters, NullSample, ThreeStateParams};
    use crate::sims::simulator::SimulationOptions;
    use crate::sources::UniformMono2D;
    use approx::assert_relative_eq;
    use microsim_shared::units::{Length, LengthExt};
    use std::sync::{Arc, Mutex};

    fn simulator() -> Simulator {
        Simulator::new(
            OpticalConfig::default(),
            DetectorGrid::new(16, 16, Length::from_micrometers(6.5)).unwrap(),
            SensorConfig::default(),
            SimulationOptions::default(),
        )
        .unwrap()
    }

    fn lamp() -> UniformMono2D {
        UniformMono2D::new(1e6, 1e6, (0.0, 15.0), (0.0, 15.0)).unwrap()
    }

    fn constant_sample() -> ConstantEmitters {
        ConstantEmitters::new(
            vec![PixelPosition::in_focus(8.0, 8.0).unwrap()],
            1000.0,
            Wavelength::from_nanometers(600.0).unwrap(),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct PowerRamp {
        seen: Arc<Mutex<Vec<(f64, f64)>>>,
    }

    impl Processor<UniformMono2D> for PowerRamp {
        fn pre_step(&mut self, time: f64, source: &mut UniformMono2D) {
            let power = (source.power() / 2.0).max(0.0);
            source.set_power(power).unwrap();
            self.seen.lock().unwrap().push((time, power));
        }
    }

    #[test]
    fn test_rejects_bad_dt() {
        assert!(Experiment::new(NullSample, lamp(), simulator(), 0.0, 0.0, RandomState::from_seed(0)).is_err());
        assert!(Experiment::new(NullSample, lamp(), simulator(), f64::NAN, 1.0, RandomState::from_seed(0)).is_err());
    }

    #[test]
    fn test_null_sample_runs() {
        let mut experiment =
            Experiment::new(NullSample, lamp(), simulator(), 0.0, 0.1, RandomState::from_seed(0))
                .unwrap();
        let frames = experiment.run(3).unwrap();
        assert_eq!(frames.len(), 3);
        assert_relative_eq!(experiment.time(), 0.3, epsilon = 1e-12);
        assert_eq!(experiment.state(), RandomState::from_seed(0).advanced_by(3));
    }

    #[test]
    fn test_step_renders_sample_photons() {
        let mut experiment = Experiment::new(
            constant_sample(),
            lamp(),
            simulator(),
            0.0,
            0.5,
            RandomState::from_seed(1),
        )
        .unwrap();
        let response = experiment.step().unwrap();
        assert_eq!(response.emitters.len(), 1);
        assert_relative_eq!(response.emitters[0].brightness.value(), 500.0);
        assert!(response.noiseless.sum() > 0.95 * 500.0);
        assert!(response.noiseless.sum() <= 500.0 + 1e-6);
        assert_eq!(response.frame.dim(), (16, 16));
    }

    #[test]
    fn test_reset_replays_identically() {
        let sample = three_state_fluorophores(
            &[
                PixelPosition::in_focus(4.0, 4.0).unwrap(),
                PixelPosition::in_focus(10.0, 9.0).unwrap(),
            ],
            &ThreeStateParams::default(),
            17,
        )
        .unwrap();
        let mut experiment =
            Experiment::new(sample, lamp(), simulator(), 0.0, 1.0, RandomState::from_seed(5))
                .unwrap();
        let first = experiment.run(4).unwrap();
        experiment.reset();
        assert_eq!(experiment.time(), 0.0);
        let second = experiment.run(4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_processors_see_each_step() {
        let ramp = PowerRamp::default();
        let seen = Arc::clone(&ramp.seen);
        let mut experiment =
            Experiment::new(NullSample, lamp(), simulator(), 1.0, 0.25, RandomState::from_seed(0))
                .unwrap()
                .with_processor(Box::new(ramp));
        experiment.run(2).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_relative_eq!(seen[0].0, 1.0);
        assert_relative_eq!(seen[1].0, 1.25);
        assert_relative_eq!(seen[1].1, 2.5e5);
        assert_relative_eq!(experiment.source().power(), 2.5e5);

        drop(seen);
        experiment.reset();
        assert_relative_eq!(experiment.source().power(), 1e6);
    }

    #[test]
    fn test_noiseless_sensor_matches_render() {
        let sensor = SensorConfig::default().with_stages(NoiseStages::NONE);
        let sim = Simulator::new(
            OpticalConfig::default(),
            DetectorGrid::new(16, 16, Length::from_micrometers(6.5)).unwrap(),
            sensor,
            SimulationOptions::default(),
        )
        .unwrap();
        let mut experiment =
            Experiment::new(constant_sample(), lamp(), sim, 0.0, 1.0, RandomState::from_seed(2))
                .unwrap();
        let response = experiment.step().unwrap();
        let analog = response.frame.data.as_analog().unwrap();
        let expected = response.noiseless.mapv(|p| p * 0.69);
        for (a, b) in analog.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }
}
