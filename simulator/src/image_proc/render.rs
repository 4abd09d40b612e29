//! Accumulating PSF kernels into images and digitizing electron images.

use ndarray::{s, Array2};

use super::kernel_cache::KernelCache;
use super::psf::{PointSpreadFunction, PsfKernel};
use crate::hardware::SensorConfig;
use crate::quantities::Wavelength;
use crate::scene::Emitter;

/// Nearest pixel to a continuous position and the emitter's offset from
/// that pixel's centre, each component in `[-½, ½]`.
pub fn nearest_pixel(x: f64, y: f64) -> ((i64, i64), (f64, f64)) {
    let cx = x.round();
    let cy = y.round();
    ((cx as i64, cy as i64), (x - cx, y - cy))
}

/// Add `photons · kernel` centred on pixel `center` (col, row).
///
/// Only the part of the kernel overlapping the image is added; the rest
/// falls off the detector.
pub fn stamp_kernel(image: &mut Array2<f64>, kernel: &PsfKernel, center: (i64, i64), photons: f64) {
    let (rows, cols) = image.dim();
    let r = kernel.radius() as i64;

    let col_lo = (center.0 - r).max(0);
    let col_hi = (center.0 + r + 1).min(cols as i64);
    let row_lo = (center.1 - r).max(0);
    let row_hi = (center.1 + r + 1).min(rows as i64);
    if col_lo >= col_hi || row_lo >= row_hi {
        return;
    }

    let k_col = (col_lo - (center.0 - r)) as usize;
    let k_row = (row_lo - (center.1 - r)) as usize;
    let width = (col_hi - col_lo) as usize;
    let height = (row_hi - row_lo) as usize;

    let patch = kernel
        .data()
        .slice(s![k_row..k_row + height, k_col..k_col + width]);
    let mut target = image.slice_mut(s![
        row_lo as usize..row_hi as usize,
        col_lo as usize..col_hi as usize
    ]);
    target.scaled_add(photons, &patch);
}

/// Superpose the PSF footprint of every emitter onto `image`.
///
/// `radius_for` chooses the truncation radius for a wavelength and axial
/// position. Kernels come from `cache`, so emitters sharing all kernel
/// inputs are evaluated once.
pub fn add_emitters_to_image<F>(
    image: &mut Array2<f64>,
    emitters: &[Emitter],
    psf: &dyn PointSpreadFunction,
    cache: &mut KernelCache,
    mut radius_for: F,
) where
    F: FnMut(Wavelength, f64) -> usize,
{
    for emitter in emitters {
        let photons = emitter.brightness.value();
        if photons == 0.0 {
            continue;
        }
        let position = emitter.position;
        let (center, offset) = nearest_pixel(position.x, position.y);
        let radius = radius_for(emitter.wavelength, position.z);
        let kernel = cache.get_or_compute(psf, offset, emitter.wavelength, position.z, radius);
        stamp_kernel(image, &kernel, center, photons);
    }
}

/// Convert an electron image to ADU.
///
/// Electrons are first clipped to the full well when one is configured, then
/// scaled by the gain and offset by the baseline. The result is rounded and
/// clipped to `[0, 2^bits − 1]`; values never wrap.
pub fn quantize_image(electron_img: &Array2<f64>, sensor: &SensorConfig) -> Array2<u32> {
    let max_adu = f64::from(sensor.max_adu());
    let full_well = sensor.full_well_e.unwrap_or(f64::INFINITY);
    let gain = sensor.gain_adu_per_e;
    let baseline = sensor.baseline_adu;

    electron_img.mapv(|electrons| {
        let adu = electrons.min(full_well) * gain + baseline;
        adu.round().clamp(0.0, max_adu) as u32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::BitDepth;
    use crate::image_proc::gaussian::GaussianPsf;
    use crate::image_proc::psf::PsfSampling;
    use crate::quantities::{PhotonCount, PixelPosition};
    use approx::assert_relative_eq;

    fn nm(value: f64) -> Wavelength {
        Wavelength::from_nanometers(value).unwrap()
    }

    fn emitter(x: f64, y: f64, photons: f64) -> Emitter {
        Emitter {
            position: PixelPosition::in_focus(x, y).unwrap(),
            wavelength: nm(520.0),
            brightness: PhotonCount::new(photons).unwrap(),
        }
    }

    #[test]
    fn test_nearest_pixel() {
        assert_eq!(nearest_pixel(3.2, 4.7), ((3, 5), (3.2 - 3.0, 4.7 - 5.0)));
        let ((cx, cy), _) = nearest_pixel(-0.4, -1.6);
        assert_eq!((cx, cy), (0, -2));
    }

    #[test]
    fn test_stamp_partial_footprint() {
        let kernel = PsfKernel::new(1, (0.0, 0.0), Array2::from_elem((3, 3), 1.0));
        let mut image = Array2::zeros((4, 4));
        stamp_kernel(&mut image, &kernel, (0, 0), 2.0);
        assert_eq!(image.sum(), 8.0);
        assert_eq!(image[[0, 0]], 2.0);
        assert_eq!(image[[1, 1]], 2.0);
        assert_eq!(image[[2, 2]], 0.0);

        // Entirely off the grid.
        stamp_kernel(&mut image, &kernel, (10, 10), 2.0);
        assert_eq!(image.sum(), 8.0);

        // Centre just outside the grid still reaches the edge column.
        stamp_kernel(&mut image, &kernel, (4, 1), 1.0);
        assert_eq!(image.column(3).sum(), 3.0);
    }

    #[test]
    fn test_emitters_superpose() {
        let psf = GaussianPsf::new(1.4, 1.515, 0.065, PsfSampling::Integrated);
        let emitters = vec![emitter(5.2, 6.1, 100.0), emitter(12.7, 3.3, 40.0)];

        let mut both = Array2::zeros((16, 16));
        add_emitters_to_image(&mut both, &emitters, &psf, &mut KernelCache::new(None), |_, _| 6);

        let mut separate = Array2::zeros((16, 16));
        for e in &emitters {
            let mut single = Array2::zeros((16, 16));
            add_emitters_to_image(
                &mut single,
                std::slice::from_ref(e),
                &psf,
                &mut KernelCache::new(None),
                |_, _| 6,
            );
            separate += &single;
        }
        for (a, b) in both.iter().zip(separate.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_flux_is_conserved_inside_grid() {
        let psf = GaussianPsf::new(1.4, 1.515, 0.065, PsfSampling::Integrated);
        let mut image = Array2::zeros((32, 32));
        add_emitters_to_image(
            &mut image,
            &[emitter(15.3, 16.8, 1000.0)],
            &psf,
            &mut KernelCache::new(None),
            |_, _| 10,
        );
        assert_relative_eq!(image.sum(), 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_quantize_clips_without_wrapping() {
        let sensor = SensorConfig {
            gain_adu_per_e: 1.0,
            baseline_adu: 0.0,
            bit_depth: BitDepth::Eight,
            ..SensorConfig::default()
        };
        let electrons = Array2::from_shape_vec((1, 5), vec![-20.0, 0.4, 100.6, 255.0, 1e9]).unwrap();
        let adu = quantize_image(&electrons, &sensor);
        assert_eq!(adu.as_slice().unwrap(), &[0, 0, 101, 255, 255]);
    }

    #[test]
    fn test_quantize_full_well_then_gain() {
        let sensor = SensorConfig {
            gain_adu_per_e: 2.0,
            baseline_adu: 100.0,
            full_well_e: Some(1000.0),
            bit_depth: BitDepth::Sixteen,
            ..SensorConfig::default()
        };
        let electrons = Array2::from_shape_vec((1, 2), vec![120.0, 5000.0]).unwrap();
        let adu = quantize_image(&electrons, &sensor);
        assert_eq!(adu.as_slice().unwrap(), &[340, 2100]);
    }
}
