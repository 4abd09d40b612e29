//! Airy disk point spread function for diffraction-limited optics.
//!
//! The in-focus intensity of a circular pupil is
//!
//! ```text
//! I(v) = [2·J₁(v)/v]²,   v = 2π·NA·r/λ
//! ```
//!
//! Normalized to unit integral over the plane, the density in detector
//! pixels is `k²/(4π)·I(k·r)` with `k = 2π·NA·p/λ` and `p` the object-space
//! pixel size. The encircled energy has the closed form
//! `1 − J₀(k·r)² − J₁(k·r)²`. This model ignores defocus.

use std::f64::consts::PI;

use ndarray::{Array2, Zip};
use scilib::math::bessel;

use super::psf::{fingerprint_of, PointSpreadFunction, PsfKernel, PsfSampling};
use crate::quantities::Wavelength;

/// Half width at half maximum of `[2·J₁(v)/v]²` in units of v.
pub const HWHM_V: f64 = 1.616_339_948_310_703;

/// First zero of J₁, the radius of the first dark ring in units of v.
pub const FIRST_ZERO_V: f64 = 3.831_705_970_207_512;

/// Above this argument the power series loses too many digits and the
/// Hankel expansion is used instead.
const ASYMPTOTIC_ARGUMENT: f64 = 25.0;

/// Bessel function of the first kind for orders 0 and 1, `x >= 0`.
fn bessel_j(order: u8, x: f64) -> f64 {
    if x < ASYMPTOTIC_ARGUMENT {
        return match order {
            0 => bessel::j_n(0, x),
            _ => bessel::j_n(1, x),
        };
    }
    let mu = 4.0 * f64::from(order * order);
    let e = 8.0 * x;
    let a1 = mu - 1.0;
    let a2 = a1 * (mu - 9.0);
    let a3 = a2 * (mu - 25.0);
    let a4 = a3 * (mu - 49.0);
    let a5 = a4 * (mu - 81.0);
    let p = 1.0 - a2 / (2.0 * e.powi(2)) + a4 / (24.0 * e.powi(4));
    let q = a1 / e - a3 / (6.0 * e.powi(3)) + a5 / (120.0 * e.powi(5));
    let chi = x - (f64::from(order) / 2.0 + 0.25) * PI;
    (2.0 / (PI * x)).sqrt() * (p * chi.cos() - q * chi.sin())
}

/// Normalized Airy profile, 1 at the centre.
pub fn airy_intensity(v: f64) -> f64 {
    let v = v.abs();
    if v < 1e-10 {
        return 1.0;
    }
    let term = 2.0 * bessel_j(1, v) / v;
    term * term
}

/// Composite Simpson weights for `points` samples over a unit interval.
///
/// `points` is odd; a single point degenerates to the midpoint rule.
pub fn simpson_weights(points: usize) -> Vec<f64> {
    if points <= 1 {
        return vec![1.0];
    }
    let h = 1.0 / (points - 1) as f64;
    (0..points)
        .map(|i| {
            let factor = if i == 0 || i == points - 1 {
                1.0
            } else if i % 2 == 1 {
                4.0
            } else {
                2.0
            };
            factor * h / 3.0
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiryPsf {
    numerical_aperture: f64,
    object_pixel_um: f64,
    simpson_points: usize,
    sampling: PsfSampling,
    /// Sample positions across a pixel, relative to its centre.
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl AiryPsf {
    pub fn new(
        numerical_aperture: f64,
        object_pixel_um: f64,
        simpson_points: usize,
        sampling: PsfSampling,
    ) -> Self {
        let points = match sampling {
            PsfSampling::Integrated => simpson_points.max(1),
            PsfSampling::PixelCenter => 1,
        };
        let nodes = if points == 1 {
            vec![0.0]
        } else {
            (0..points)
                .map(|i| i as f64 / (points - 1) as f64 - 0.5)
                .collect()
        };
        Self {
            numerical_aperture,
            object_pixel_um,
            simpson_points,
            sampling,
            nodes,
            weights: simpson_weights(points),
        }
    }

    /// Radial scale factor: v = k·r with r in detector pixels.
    pub fn k_per_px(&self, wavelength: Wavelength) -> f64 {
        2.0 * PI * self.numerical_aperture * self.object_pixel_um / wavelength.as_micrometers()
    }

    /// Radius of the first dark ring in detector pixels.
    pub fn first_zero_px(&self, wavelength: Wavelength) -> f64 {
        FIRST_ZERO_V / self.k_per_px(wavelength)
    }

    /// Unit-integral intensity per square pixel at radius `r_px`.
    pub fn density(&self, r_px: f64, k: f64) -> f64 {
        k * k / (4.0 * PI) * airy_intensity(k * r_px)
    }

    fn integrate_pixel(&self, dx: f64, dy: f64, k: f64) -> f64 {
        let mut total = 0.0;
        for (&ny, &wy) in self.nodes.iter().zip(&self.weights) {
            let y = dy + ny;
            for (&nx, &wx) in self.nodes.iter().zip(&self.weights) {
                let x = dx + nx;
                total += wx * wy * self.density((x * x + y * y).sqrt(), k);
            }
        }
        total
    }
}

impl PointSpreadFunction for AiryPsf {
    fn name(&self) -> &'static str {
        "airy"
    }

    fn fwhm_px(&self, wavelength: Wavelength, _z_um: f64) -> f64 {
        2.0 * HWHM_V / self.k_per_px(wavelength)
    }

    fn encircled_energy(&self, radius_px: f64, wavelength: Wavelength, _z_um: f64) -> f64 {
        let v = self.k_per_px(wavelength) * radius_px;
        if v <= 0.0 {
            return 0.0;
        }
        let j0 = bessel_j(0, v);
        let j1 = bessel_j(1, v);
        (1.0 - j0 * j0 - j1 * j1).clamp(0.0, 1.0)
    }

    fn pixel_response(&self, dx: f64, dy: f64, wavelength: Wavelength, _z_um: f64) -> f64 {
        self.integrate_pixel(dx, dy, self.k_per_px(wavelength))
    }

    fn fingerprint(&self) -> u64 {
        fingerprint_of(
            self.name(),
            &[
                self.numerical_aperture.to_bits(),
                self.object_pixel_um.to_bits(),
                self.simpson_points as u64,
                self.sampling as u64,
            ],
        )
    }

    /// Large Airy kernels are dominated by Bessel evaluations, so pixels
    /// are filled in parallel.
    fn kernel(&self, offset: (f64, f64), wavelength: Wavelength, _z_um: f64, radius: usize) -> PsfKernel {
        let k = self.k_per_px(wavelength);
        let r = radius as f64;
        let side = 2 * radius + 1;
        let mut data = Array2::<f64>::zeros((side, side));
        Zip::indexed(&mut data).par_for_each(|(row, col), value| {
            let dx = col as f64 - r - offset.0;
            let dy = row as f64 - r - offset.1;
            *value = self.integrate_pixel(dx, dy, k);
        });
        PsfKernel::new(radius, offset, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn nm(value: f64) -> Wavelength {
        Wavelength::from_nanometers(value).unwrap()
    }

    fn psf() -> AiryPsf {
        AiryPsf::new(1.4, 0.065, 5, PsfSampling::Integrated)
    }

    #[test]
    fn test_intensity_profile() {
        assert_eq!(airy_intensity(0.0), 1.0);
        assert_relative_eq!(airy_intensity(HWHM_V), 0.5, epsilon = 1e-6);
        assert!(airy_intensity(FIRST_ZERO_V) < 1e-10);
    }

    #[test]
    fn test_bessel_branches_agree_at_switch() {
        for order in [0u8, 1] {
            let below = match order {
                0 => bessel::j_n(0, ASYMPTOTIC_ARGUMENT),
                _ => bessel::j_n(1, ASYMPTOTIC_ARGUMENT),
            };
            let above = bessel_j(order, ASYMPTOTIC_ARGUMENT);
            assert!((below - above).abs() < 1e-6, "order {order}: {below} vs {above}");
        }
        // J0(30) = -0.0863679835...
        assert_relative_eq!(bessel_j(0, 30.0), -0.086_367_983_581_040_2, epsilon = 1e-7);
    }

    #[test]
    fn test_simpson_weights_sum_to_one() {
        for points in [1, 3, 5, 9] {
            let sum: f64 = simpson_weights(points).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
        let w = simpson_weights(3);
        assert_relative_eq!(w[1], 4.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fwhm_in_lambda_over_na() {
        let psf = psf();
        let wl = nm(520.0);
        let fwhm_um = psf.fwhm_px(wl, 0.0) * 0.065;
        assert_relative_eq!(fwhm_um, 0.5145 * 0.52 / 1.4, epsilon = 1e-4);
    }

    #[test]
    fn test_encircled_energy_at_first_ring() {
        let psf = psf();
        let wl = nm(520.0);
        let ee = psf.encircled_energy(psf.first_zero_px(wl), wl, 0.0);
        assert_relative_eq!(ee, 0.838, epsilon = 1e-3);
        assert_eq!(psf.encircled_energy(0.0, wl, 0.0), 0.0);
    }

    #[test]
    fn test_kernel_energy_converges_to_one() {
        let psf = psf();
        let wl = nm(520.0);
        let mut previous_gap = f64::INFINITY;
        for radius in [4, 16, 48] {
            let kernel = psf.kernel((0.1, -0.2), wl, 0.0, radius);
            let gap = (1.0 - kernel.energy()).abs();
            assert!(gap < previous_gap, "radius {radius}: gap {gap} did not shrink");
            assert!(gap <= psf.truncation_loss(radius, wl, 0.0) + 1e-3);
            previous_gap = gap;
        }
        assert!(previous_gap < 2e-2);
    }

    #[test]
    fn test_kernel_is_symmetric_for_centred_emitter() {
        let psf = psf();
        let kernel = psf.kernel((0.0, 0.0), nm(600.0), 0.0, 6);
        let data = kernel.data();
        for row in 0..13 {
            for col in 0..13 {
                assert_relative_eq!(data[[row, col]], data[[12 - row, col]], max_relative = 1e-9);
                assert_relative_eq!(data[[row, col]], data[[col, row]], max_relative = 1e-9);
            }
        }
        let peak = data.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(data[[6, 6]], peak);
    }
}
