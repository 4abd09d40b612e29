//! Hardware module for objective, detector grid and sensor configurations

pub mod dark_current;
pub mod grid;
pub mod objective;
pub mod sensor;
pub mod sensor_noise;

pub use dark_current::DarkCurrentEstimator;
pub use grid::DetectorGrid;
pub use objective::{OpticalConfig, PsfModel};
pub use sensor::{BitDepth, NoiseStages, SensorConfig};
pub use sensor_noise::expose;
