//! Forward simulation of fluorescence microscope imaging
//!
//! Point emitters are blurred by a point spread function, accumulated on a
//! detector grid and turned into noisy digitized frames by a sensor model.
//! Every stochastic step draws from a caller-owned [`RandomState`], so a
//! given input and seed always produce the same frames.
//!
//! ```no_run
//! use microsim::{simulate, RandomState, Scene, SimulationOptions};
//! use microsim::hardware::{DetectorGrid, OpticalConfig, SensorConfig};
//! use microsim::quantities::Wavelength;
//!
//! let wl = Wavelength::from_nanometers(600.0)?;
//! let scene = Scene::from_coordinates(&[16.0], &[16.0], &[0.0], &[1000.0], wl)?;
//! let mut state = RandomState::from_seed(42);
//! let output = simulate(
//!     &scene,
//!     &OpticalConfig::default(),
//!     &DetectorGrid::default(),
//!     &SensorConfig::default(),
//!     &SimulationOptions::default(),
//!     &mut state,
//!     10,
//! )?;
//! assert_eq!(output.frames.len(), 10);
//! # Ok::<(), microsim::SimulationError>(())
//! ```

pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod hardware;
pub mod image_proc;
pub mod quantities;
pub mod random;
pub mod samples;
pub mod scene;
pub mod sims;
pub mod sources;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{ConfigError, DomainError, Result, SimulationError};
pub use frame::{FrameData, SimulatedFrame};
pub use random::RandomState;
pub use scene::{Emitter, Scene};
pub use sims::{simulate, Experiment, SimulationOptions, SimulationOutput, Simulator};

pub use microsim_shared::units;
