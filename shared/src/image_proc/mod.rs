//! Image processing primitives shared by the sensor model

pub mod noise;

pub use noise::{
    add_gaussian_read_noise, apply_poisson_photon_noise, check_photon_image, simple_normal_array,
    NoiseError,
};
