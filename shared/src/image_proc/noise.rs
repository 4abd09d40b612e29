//! Noise generation utilities for detector simulation.
//!
//! Provides the stochastic primitives used by the sensor model:
//! - Poisson photon (shot) noise applied to a mean electron image
//! - Additive Gaussian read noise
//! - Deterministic normal arrays for tests
//!
//! # Reproducibility
//!
//! Every function takes an explicit seed; nothing here consults thread-local
//! or process-wide randomness. Large images are processed in parallel row
//! chunks via [`process_array_in_parallel_chunks`], and each chunk derives its
//! own generator from the seed, so results are bit-identical for any number
//! of worker threads.

use crate::algo::process_array_in_parallel_chunks;
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Poisson, StandardNormal};
use thiserror::Error;

/// Errors raised by the noise primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoiseError {
    #[error("expected photon flux at (row {row}, col {col}) is {value}; flux must be finite and non-negative")]
    InvalidFlux { row: usize, col: usize, value: f64 },
    #[error("read noise standard deviation {0} must be finite and non-negative")]
    InvalidStdDev(f64),
}

/// Generate a 2D array of normally distributed values for testing purposes.
///
/// # Arguments
/// * `size` - Tuple of (height, width) for the output array dimensions
/// * `mean` - Mean value of the normal distribution
/// * `std_dev` - Standard deviation of the normal distribution
/// * `seed` - Random seed for deterministic output
///
/// # Example
/// ```
/// use microsim_shared::image_proc::noise::simple_normal_array;
///
/// let noise = simple_normal_array((10, 10), 100.0, 10.0, 42).unwrap();
/// assert_eq!(noise.dim(), (10, 10));
/// ```
pub fn simple_normal_array(
    size: (usize, usize),
    mean: f64,
    std_dev: f64,
    seed: u64,
) -> Result<Array2<f64>, NoiseError> {
    let normal_dist = Normal::new(mean, std_dev).map_err(|_| NoiseError::InvalidStdDev(std_dev))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(Array2::from_shape_fn(size, |_| normal_dist.sample(&mut rng)))
}

/// Check that every pixel of a mean photon/electron image is a valid Poisson mean.
///
/// Scans in row-major order and reports the first offending pixel, so the
/// error is deterministic.
pub fn check_photon_image(mean_image: &Array2<f64>) -> Result<(), NoiseError> {
    match mean_image
        .indexed_iter()
        .find(|(_, &value)| !value.is_finite() || value < 0.0)
    {
        Some(((row, col), &value)) => Err(NoiseError::InvalidFlux { row, col, value }),
        None => Ok(()),
    }
}

/// Draw one Poisson sample for a finite, non-negative mean.
///
/// Means beyond the exact sampler's range use the normal approximation
/// `N(mean, mean)`, which is always sampled, never passed through.
#[inline]
fn sample_poisson(mean: f64, rng: &mut ChaCha8Rng) -> f64 {
    if mean <= 0.0 {
        return 0.0;
    }
    match Poisson::new(mean) {
        Ok(poisson) => poisson.sample(rng),
        Err(_) => {
            let z: f64 = StandardNormal.sample(rng);
            (mean + mean.sqrt() * z).max(0.0)
        }
    }
}

/// Apply Poisson arrival statistics to a mean electron image in parallel
///
/// Each pixel's value is treated as the mean of a Poisson distribution. The
/// input is never modified; a new array is returned.
///
/// # Arguments
/// * `mean_electron_image` - 2D array containing mean electron counts per pixel
/// * `rng_seed` - Seed for this noise stage
///
/// # Errors
/// [`NoiseError::InvalidFlux`] if any pixel is negative or non-finite. The
/// check runs before any sampling.
pub fn apply_poisson_photon_noise(
    mean_electron_image: &Array2<f64>,
    rng_seed: u64,
) -> Result<Array2<f64>, NoiseError> {
    check_photon_image(mean_electron_image)?;

    Ok(process_array_in_parallel_chunks(
        mean_electron_image.clone(),
        rng_seed,
        None,
        |chunk, rng| {
            chunk
                .iter_mut()
                .for_each(|pixel| *pixel = sample_poisson(*pixel, rng));
        },
    ))
}

/// Add zero-mean Gaussian read noise with standard deviation `std_dev`.
///
/// Values are not clamped; negative excursions are left for the quantizer
/// to clip.
pub fn add_gaussian_read_noise(
    electron_image: &Array2<f64>,
    std_dev: f64,
    rng_seed: u64,
) -> Result<Array2<f64>, NoiseError> {
    if !std_dev.is_finite() || std_dev < 0.0 {
        return Err(NoiseError::InvalidStdDev(std_dev));
    }
    let read_noise_dist = Normal::new(0.0, std_dev).map_err(|_| NoiseError::InvalidStdDev(std_dev))?;

    Ok(process_array_in_parallel_chunks(
        electron_image.clone(),
        rng_seed,
        None,
        |chunk, rng| {
            chunk
                .iter_mut()
                .for_each(|pixel| *pixel += read_noise_dist.sample(rng));
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_poisson_mean_and_variance() {
        let mean = Array2::from_elem((200, 200), 25.0);
        let sampled = apply_poisson_photon_noise(&mean, 3).unwrap();

        let m = sampled.mean().unwrap();
        let v = sampled.var(0.0);
        assert_relative_eq!(m, 25.0, epsilon = 0.2);
        assert_relative_eq!(v, 25.0, epsilon = 1.0);
        assert!(sampled.iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn test_poisson_huge_mean_is_still_sampled() {
        // above the exact sampler's limit of about 1.8e19
        let mean = Array2::from_elem((4, 4), 1e20);
        let sampled = apply_poisson_photon_noise(&mean, 8).unwrap();
        assert!(sampled.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(sampled.iter().any(|&v| v != 1e20));
        for v in sampled.iter() {
            assert_relative_eq!(*v, 1e20, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_poisson_zero_mean_is_zero() {
        let mean = Array2::zeros((16, 16));
        let sampled = apply_poisson_photon_noise(&mean, 1).unwrap();
        assert!(sampled.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_poisson_does_not_mutate_input() {
        let mean = Array2::from_elem((8, 8), 4.0);
        let copy = mean.clone();
        let _ = apply_poisson_photon_noise(&mean, 11).unwrap();
        assert_eq!(mean, copy);
    }

    #[test]
    fn test_poisson_rejects_negative_flux() {
        let mut mean = Array2::from_elem((4, 4), 1.0);
        mean[[2, 3]] = -0.5;
        let err = apply_poisson_photon_noise(&mean, 0).unwrap_err();
        assert_eq!(
            err,
            NoiseError::InvalidFlux {
                row: 2,
                col: 3,
                value: -0.5
            }
        );
    }

    #[test]
    fn test_poisson_rejects_nan() {
        let mut mean = Array2::from_elem((4, 4), 1.0);
        mean[[0, 1]] = f64::NAN;
        assert!(matches!(
            apply_poisson_photon_noise(&mean, 0),
            Err(NoiseError::InvalidFlux { row: 0, col: 1, .. })
        ));
    }

    #[test]
    fn test_poisson_reproducible() {
        let mean = Array2::from_elem((70, 30), 12.5);
        let a = apply_poisson_photon_noise(&mean, 99).unwrap();
        let b = apply_poisson_photon_noise(&mean, 99).unwrap();
        let c = apply_poisson_photon_noise(&mean, 100).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_read_noise_statistics() {
        let base = Array2::from_elem((256, 256), 50.0);
        let noisy = add_gaussian_read_noise(&base, 3.0, 5).unwrap();
        assert_relative_eq!(noisy.mean().unwrap(), 50.0, epsilon = 0.1);
        assert_relative_eq!(noisy.std(0.0), 3.0, epsilon = 0.1);
    }

    #[test]
    fn test_zero_read_noise_is_identity() {
        let base = Array2::from_shape_fn((10, 10), |(r, c)| (r * c) as f64);
        let noisy = add_gaussian_read_noise(&base, 0.0, 5).unwrap();
        assert_eq!(base, noisy);
    }

    #[test]
    fn test_negative_read_noise_rejected() {
        let base = Array2::zeros((2, 2));
        assert_eq!(
            add_gaussian_read_noise(&base, -1.0, 0),
            Err(NoiseError::InvalidStdDev(-1.0))
        );
    }

    #[test]
    fn test_simple_normal_array_deterministic() {
        let a = simple_normal_array((10, 10), 0.0, 1.0, 42).unwrap();
        let b = simple_normal_array((10, 10), 0.0, 1.0, 42).unwrap();
        assert_eq!(a, b);
    }
}
