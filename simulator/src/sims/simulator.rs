//! End-to-end forward simulation: scene → PSF footprints → sensor → frames.
//!
//! A call proceeds in three phases:
//!
//! 1. **Validation** of the scene against the grid and passband. Nothing is
//!    rendered if any emitter is rejected.
//! 2. **Accumulation** of every emitter's kernel onto a zero-initialized
//!    photon image. Kernels come from a [`KernelCache`] owned by the call, so
//!    two identical calls do identical work.
//! 3. **Exposure**: the sensor model runs once per frame. Frame `k` uses the
//!    caller's [`RandomState`] advanced `k` times, and on success the
//!    caller's state is left advanced `num_frames` times. Splitting a
//!    multi-frame request into single-frame calls therefore reproduces it
//!    exactly.
//!
//! The scene is immutable for a call, so the noiseless image is computed
//! once and shared by all frames.

use std::collections::HashMap;

use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ConfigError, DomainError, Result, SimulationError};
use crate::frame::SimulatedFrame;
use crate::hardware::{expose, DetectorGrid, OpticalConfig, SensorConfig};
use crate::image_proc::kernel_cache::KernelCache;
use crate::image_proc::psf::{
    build_psf, PointSpreadFunction, PsfSampling, MAX_TRUNCATION_RADIUS,
};
use crate::image_proc::render::{add_emitters_to_image, nearest_pixel};
use crate::quantities::Wavelength;
use crate::random::RandomState;
use crate::scene::Scene;

/// Knobs that control one simulation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOptions {
    /// Accept scenes with no emitters.
    pub allow_empty_scene: bool,
    /// How far outside the grid an emitter may sit, in pixels. Defaults to
    /// the emitter's truncation radius.
    pub bounds_margin_px: Option<f64>,
    /// Fixed kernel radius in pixels. Defaults to the smallest radius
    /// predicted to keep the truncation loss within `energy_tolerance`.
    pub truncation_radius_px: Option<usize>,
    /// Allowed deviation of a kernel's energy from its prediction.
    pub energy_tolerance: f64,
    /// Quantize sub-pixel offsets into this many bins per axis for kernel
    /// reuse. `None` caches exact offsets.
    pub subpixel_buckets: Option<u32>,
    pub psf_sampling: PsfSampling,
    /// Turn every numerical diagnostic into an error.
    pub strict: bool,
    /// Return the noiseless photon image with the frames.
    pub keep_noiseless: bool,
    /// Expose frames on the rayon pool.
    pub parallel_frames: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            allow_empty_scene: false,
            bounds_margin_px: None,
            truncation_radius_px: None,
            energy_tolerance: 1e-3,
            subpixel_buckets: None,
            psf_sampling: PsfSampling::Integrated,
            strict: false,
            keep_noiseless: false,
            parallel_frames: false,
        }
    }
}

impl SimulationOptions {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let tol = self.energy_tolerance;
        if !tol.is_finite() || tol <= 0.0 || tol >= 1.0 {
            return Err(ConfigError::invalid(
                "energy_tolerance",
                tol,
                "must lie within (0, 1)",
            ));
        }
        if let Some(margin) = self.bounds_margin_px {
            if !margin.is_finite() || margin < 0.0 {
                return Err(ConfigError::invalid(
                    "bounds_margin_px",
                    margin,
                    "must be finite and non-negative",
                ));
            }
        }
        if let Some(radius) = self.truncation_radius_px {
            if radius > MAX_TRUNCATION_RADIUS {
                return Err(ConfigError::invalid(
                    "truncation_radius_px",
                    radius as f64,
                    "exceeds the maximum kernel radius",
                ));
            }
        }
        if self.subpixel_buckets == Some(0) {
            return Err(ConfigError::invalid(
                "subpixel_buckets",
                0.0,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Result of a simulation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub frames: Vec<SimulatedFrame>,
    pub diagnostics: Vec<Diagnostic>,
    /// Present when [`SimulationOptions::keep_noiseless`] is set.
    pub noiseless: Option<Array2<f64>>,
}

/// Validated pipeline of optics, grid and sensor.
#[derive(Debug)]
pub struct Simulator {
    optics: OpticalConfig,
    grid: DetectorGrid,
    sensor: SensorConfig,
    options: SimulationOptions,
    psf: Box<dyn PointSpreadFunction>,
    setup_diagnostics: Diagnostics,
}

impl Simulator {
    /// Validate every configuration and build the PSF model.
    ///
    /// Undersampling is checked here, once: it is recorded as a diagnostic,
    /// or rejected with [`ConfigError::Strict`] in strict mode.
    pub fn new(
        optics: OpticalConfig,
        grid: DetectorGrid,
        sensor: SensorConfig,
        options: SimulationOptions,
    ) -> Result<Self> {
        optics.validate()?;
        grid.validate()?;
        sensor.validate()?;
        options.validate()?;

        let mut setup_diagnostics = Diagnostics::new();
        if let Some(diagnostic) = grid.sampling_diagnostic(&optics) {
            if options.strict {
                return Err(ConfigError::Strict(diagnostic).into());
            }
            setup_diagnostics.push(diagnostic);
        }

        let psf = build_psf(&optics, &grid, options.psf_sampling);
        debug!(
            "simulator: {} PSF, NA {}, {}x{} grid at {} µm ({:.1} nm object pixel), sensor '{}'",
            psf.name(),
            optics.numerical_aperture,
            grid.width,
            grid.height,
            grid.pixel_pitch_um,
            grid.object_pixel_um(&optics) * 1000.0,
            sensor.name
        );

        Ok(Self {
            optics,
            grid,
            sensor,
            options,
            psf,
            setup_diagnostics,
        })
    }

    pub fn optics(&self) -> &OpticalConfig {
        &self.optics
    }

    pub fn grid(&self) -> &DetectorGrid {
        &self.grid
    }

    pub fn sensor(&self) -> &SensorConfig {
        &self.sensor
    }

    pub fn options(&self) -> &SimulationOptions {
        &self.options
    }

    pub fn psf(&self) -> &dyn PointSpreadFunction {
        self.psf.as_ref()
    }

    pub fn with_allow_empty_scene(mut self, allow: bool) -> Self {
        self.options.allow_empty_scene = allow;
        self
    }

    /// Kernel radius used for an emitter at this wavelength and depth.
    pub fn truncation_radius(&self, wavelength: Wavelength, z_um: f64) -> usize {
        self.options.truncation_radius_px.unwrap_or_else(|| {
            self.psf
                .truncation_radius(wavelength, z_um, self.options.energy_tolerance)
        })
    }

    /// Radius lookup memoized per (wavelength, z) for one call.
    fn radius_table(&self, scene: &Scene) -> HashMap<(u64, u64), usize> {
        let mut table = HashMap::new();
        for emitter in scene {
            let key = radius_key(emitter.wavelength, emitter.position.z);
            table
                .entry(key)
                .or_insert_with(|| self.truncation_radius(emitter.wavelength, emitter.position.z));
        }
        table
    }

    fn validate_scene(
        &self,
        scene: &Scene,
        radii: &HashMap<(u64, u64), usize>,
    ) -> Result<()> {
        if scene.is_empty() && !self.options.allow_empty_scene {
            return Err(ConfigError::EmptyScene.into());
        }
        for (index, emitter) in scene.iter().enumerate() {
            if !self.optics.contains_wavelength(emitter.wavelength) {
                return Err(DomainError::WavelengthOutsidePassband {
                    index,
                    wavelength_nm: emitter.wavelength.as_nanometers(),
                    min_nm: self.optics.passband_min.as_nanometers(),
                    max_nm: self.optics.passband_max.as_nanometers(),
                }
                .into());
            }
            let position = emitter.position;
            let radius = lookup_radius(radii, emitter.wavelength, position.z, || {
                self.truncation_radius(emitter.wavelength, position.z)
            });
            let margin = self.options.bounds_margin_px.unwrap_or(radius as f64);
            let (center, _) = nearest_pixel(position.x, position.y);
            if !self.grid.contains(position.x, position.y, margin)
                || !self.grid.overlaps_footprint(center, radius)
            {
                return Err(DomainError::EmitterOutOfBounds {
                    index,
                    x: position.x,
                    y: position.y,
                    margin,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validate `scene` and accumulate its noiseless photon image.
    ///
    /// Returned diagnostics include those found when the simulator was built.
    pub fn render_noiseless(&self, scene: &Scene) -> Result<(Array2<f64>, Diagnostics)> {
        let radii = self.radius_table(scene);
        self.validate_scene(scene, &radii)?;

        let tolerance = self.options.energy_tolerance;
        let mut diagnostics = self.setup_diagnostics.clone();
        for emitter in scene {
            let (wavelength, z) = (emitter.wavelength, emitter.position.z);
            let radius = lookup_radius(&radii, wavelength, z, || self.truncation_radius(wavelength, z));
            let predicted_loss = self.psf.truncation_loss(radius, wavelength, z);
            if predicted_loss > tolerance {
                diagnostics.push(Diagnostic::TruncationLoss {
                    wavelength_nm: wavelength.as_nanometers(),
                    radius_px: radius,
                    predicted_loss,
                    tolerance,
                });
            }
        }

        let mut image = Array2::zeros(self.grid.shape());
        let mut cache = KernelCache::new(self.options.subpixel_buckets);
        add_emitters_to_image(
            &mut image,
            scene.emitters(),
            self.psf.as_ref(),
            &mut cache,
            |wavelength, z| {
                lookup_radius(&radii, wavelength, z, || self.truncation_radius(wavelength, z))
            },
        );
        cache.log_summary();

        for (key, cached) in cache.entries() {
            let loss_bound = self
                .psf
                .truncation_loss(key.radius, cached.wavelength, cached.z_um);
            if let Some(diagnostic) =
                cached
                    .kernel
                    .energy_diagnostic(loss_bound, tolerance, cached.wavelength)
            {
                diagnostics.push(diagnostic);
            }
        }

        if self.options.strict {
            if let Some(diagnostic) = diagnostics.first() {
                return Err(SimulationError::Numerical(diagnostic.clone()));
            }
        }
        Ok((image, diagnostics))
    }

    /// Run the sensor model on an already rendered photon image.
    pub fn expose_frame(
        &self,
        noiseless: &Array2<f64>,
        state: &RandomState,
        index: usize,
    ) -> Result<SimulatedFrame> {
        expose(noiseless, &self.sensor, &self.grid, state, index)
    }

    /// Simulate `num_frames` frames of `scene`.
    ///
    /// `state` is advanced once per frame, and only when the call succeeds.
    pub fn simulate(
        &self,
        scene: &Scene,
        state: &mut RandomState,
        num_frames: usize,
    ) -> Result<SimulationOutput> {
        let (noiseless, diagnostics) = self.render_noiseless(scene)?;

        let states: Vec<RandomState> = std::iter::successors(Some(*state), |s| Some(s.advanced()))
            .take(num_frames)
            .collect();
        let frames = if self.options.parallel_frames {
            states
                .par_iter()
                .enumerate()
                .map(|(index, frame_state)| self.expose_frame(&noiseless, frame_state, index))
                .collect::<Result<Vec<_>>>()?
        } else {
            states
                .iter()
                .enumerate()
                .map(|(index, frame_state)| self.expose_frame(&noiseless, frame_state, index))
                .collect::<Result<Vec<_>>>()?
        };
        *state = state.advanced_by(num_frames);

        debug!(
            "simulated {} frame(s) of {} emitter(s), {:.1} photons, {} diagnostic(s)",
            frames.len(),
            scene.len(),
            noiseless.sum(),
            diagnostics.len()
        );

        Ok(SimulationOutput {
            frames,
            diagnostics: diagnostics.into_vec(),
            noiseless: self.options.keep_noiseless.then_some(noiseless),
        })
    }
}

fn lookup_radius(
    radii: &HashMap<(u64, u64), usize>,
    wavelength: Wavelength,
    z_um: f64,
    compute: impl FnOnce() -> usize,
) -> usize {
    radii
        .get(&radius_key(wavelength, z_um))
        .copied()
        .unwrap_or_else(compute)
}

fn radius_key(wavelength: Wavelength, z_um: f64) -> (u64, u64) {
    (
        (wavelength.as_nanometers() + 0.0).to_bits(),
        (z_um + 0.0).to_bits(),
    )
}

/// One-shot entry point: build a [`Simulator`] and run it.
///
/// Side-effect free apart from advancing `state`; no cache survives the
/// call, so repeated identical invocations behave and time the same.
pub fn simulate(
    scene: &Scene,
    optics: &OpticalConfig,
    grid: &DetectorGrid,
    sensor: &SensorConfig,
    options: &SimulationOptions,
    state: &mut RandomState,
    num_frames: usize,
) -> Result<SimulationOutput> {
    Simulator::new(optics.clone(), grid.clone(), sensor.clone(), options.clone())?
        .simulate(scene, state, num_frames)
}
