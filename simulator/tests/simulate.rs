//! End-to-end properties of the simulate entry point

use std::f64::consts::SQRT_2;

use approx::assert_relative_eq;
use ndarray::Array2;
use scilib::math::basic::erf;

use microsim::hardware::{BitDepth, DetectorGrid, NoiseStages, OpticalConfig, PsfModel, SensorConfig};
use microsim::image_proc::{build_psf, PointSpreadFunction, PsfSampling};
use microsim::quantities::Wavelength;
use microsim::units::{Length, LengthExt};
use microsim::{
    simulate, Emitter, RandomState, Scene, SimulationError, SimulationOptions, SimulationOutput,
};

fn nm(value: f64) -> Wavelength {
    Wavelength::from_nanometers(value).unwrap()
}

fn grid(size: usize) -> DetectorGrid {
    DetectorGrid::new(size, size, Length::from_micrometers(6.5)).unwrap()
}

fn keep_noiseless() -> SimulationOptions {
    SimulationOptions {
        keep_noiseless: true,
        allow_empty_scene: true,
        ..SimulationOptions::default()
    }
}

fn run(
    scene: &Scene,
    optics: &OpticalConfig,
    size: usize,
    sensor: &SensorConfig,
    seed: u64,
    frames: usize,
) -> Result<SimulationOutput, SimulationError> {
    let mut state = RandomState::from_seed(seed);
    simulate(
        scene,
        optics,
        &grid(size),
        sensor,
        &keep_noiseless(),
        &mut state,
        frames,
    )
}

fn noiseless(scene: &Scene, size: usize) -> Array2<f64> {
    run(scene, &OpticalConfig::default(), size, &SensorConfig::default(), 0, 1)
        .unwrap()
        .noiseless
        .unwrap()
}

fn two_emitters() -> (Emitter, Emitter) {
    (
        Emitter::new(10.3, 12.6, 0.0, nm(600.0), 1500.0).unwrap(),
        Emitter::new(20.0, 15.2, 0.3, nm(520.0), 800.0).unwrap(),
    )
}

#[test]
fn test_identical_inputs_give_identical_frames() {
    let (a, b) = two_emitters();
    let scene = Scene::new([a, b]);
    let optics = OpticalConfig::default();
    let sensor = SensorConfig::default();
    let first = run(&scene, &optics, 32, &sensor, 99, 3).unwrap();
    let second = run(&scene, &optics, 32, &sensor, 99, 3).unwrap();
    assert_eq!(first.frames, second.frames);

    let other_seed = run(&scene, &optics, 32, &sensor, 100, 3).unwrap();
    assert_ne!(first.frames[0].data, other_seed.frames[0].data);
}

#[test]
fn test_multi_frame_equals_chained_single_frames() {
    let (a, _) = two_emitters();
    let scene = Scene::new([a]);
    let optics = OpticalConfig::default();
    let sensor = SensorConfig::default();
    let options = SimulationOptions::default();

    let mut batch_state = RandomState::from_seed(11);
    let batch = simulate(&scene, &optics, &grid(32), &sensor, &options, &mut batch_state, 4).unwrap();

    let mut single_state = RandomState::from_seed(11);
    for expected in &batch.frames {
        let single =
            simulate(&scene, &optics, &grid(32), &sensor, &options, &mut single_state, 1).unwrap();
        assert_eq!(single.frames[0].data, expected.data);
        assert_eq!(single.frames[0].seed, expected.seed);
    }
    assert_eq!(batch_state, single_state);
}

#[test]
fn test_parallel_frames_match_serial() {
    let (a, b) = two_emitters();
    let scene = Scene::new([a, b]);
    let serial = SimulationOptions::default();
    let parallel = SimulationOptions {
        parallel_frames: true,
        ..SimulationOptions::default()
    };
    let mut s1 = RandomState::from_seed(3);
    let mut s2 = RandomState::from_seed(3);
    let optics = OpticalConfig::default();
    let sensor = SensorConfig::default();
    let x = simulate(&scene, &optics, &grid(32), &sensor, &serial, &mut s1, 6).unwrap();
    let y = simulate(&scene, &optics, &grid(32), &sensor, &parallel, &mut s2, 6).unwrap();
    assert_eq!(x.frames, y.frames);
    assert_eq!(s1, s2);
}

#[test]
fn test_superposition_is_linear() {
    let (a, b) = two_emitters();
    let both = noiseless(&Scene::new([a, b]), 32);
    let only_a = noiseless(&Scene::new([a]), 32);
    let only_b = noiseless(&Scene::new([b]), 32);
    for (sum, (x, y)) in both.iter().zip(only_a.iter().zip(only_b.iter())) {
        assert_relative_eq!(*sum, x + y, epsilon = 1e-12);
    }
}

#[test]
fn test_doubling_brightness_doubles_image_exactly() {
    let (a, b) = two_emitters();
    let scene = Scene::new([a, b]);
    let single = noiseless(&scene, 32);
    let double = noiseless(&scene.scaled(2.0), 32);
    assert_eq!(double, single.mapv(|v| v * 2.0));
}

#[test]
fn test_empty_scene_without_noise_is_black() {
    // the default sensor carries a 100 ADU bias; only a zero baseline
    // leaves a dark, noiseless frame at exactly zero
    let sensor = SensorConfig::default()
        .with_stages(NoiseStages::NOISELESS)
        .with_gain(5.88, 0.0)
        .unwrap();
    let output = run(&Scene::empty(), &OpticalConfig::default(), 16, &sensor, 5, 2).unwrap();
    assert!(output.noiseless.unwrap().iter().all(|&v| v == 0.0));
    for frame in &output.frames {
        let data = frame.data.as_quantized().unwrap();
        assert!(data.iter().all(|&v| v == 0));
    }
}

#[test]
fn test_empty_scene_rejected_by_default() {
    let mut state = RandomState::from_seed(0);
    let result = simulate(
        &Scene::empty(),
        &OpticalConfig::default(),
        &grid(16),
        &SensorConfig::default(),
        &SimulationOptions::default(),
        &mut state,
        1,
    );
    assert!(matches!(result, Err(SimulationError::Configuration(_))));
    assert_eq!(state, RandomState::from_seed(0));
}

#[test]
fn test_quantization_clips_to_bit_depth() {
    let bright = Scene::new([Emitter::new(8.0, 8.0, 0.0, nm(600.0), 1e7).unwrap()]);
    let sensor = SensorConfig::default()
        .with_bit_depth(BitDepth::Eight)
        .with_stages(NoiseStages::NOISELESS);
    let output = run(&bright, &OpticalConfig::default(), 16, &sensor, 1, 1).unwrap();
    let data = output.frames[0].data.as_quantized().unwrap();
    assert_eq!(data[[8, 8]], 255);
    assert!(data.iter().all(|&v| v <= 255));
    // far from the emitter only the baseline remains
    assert_eq!(data[[0, 0]], 100);
}

#[test]
fn test_centred_gaussian_matches_pixel_integrated_formula() {
    let photons = 10_000.0;
    let wavelength = nm(600.0);
    let scene = Scene::new([Emitter::new(5.0, 5.0, 0.0, wavelength, photons).unwrap()]);
    let sensor = SensorConfig::default().with_stages(NoiseStages::NONE);
    let optics = OpticalConfig::default();
    let output = run(&scene, &optics, 11, &sensor, 0, 1).unwrap();
    let image = output.noiseless.unwrap();

    let object_pixel_um = 6.5 / optics.magnification;
    let sigma = 0.21 * wavelength.as_micrometers() / optics.numerical_aperture / object_pixel_um;
    let axis = |d: f64| 0.5 * (erf((d + 0.5) / (SQRT_2 * sigma)) - erf((d - 0.5) / (SQRT_2 * sigma)));

    for ((row, col), &value) in image.indexed_iter() {
        let expected = photons * axis(col as f64 - 5.0) * axis(row as f64 - 5.0);
        assert_relative_eq!(value, expected, max_relative = 1e-6);
        assert_relative_eq!(value, image[[col, row]], max_relative = 1e-12);
        assert_relative_eq!(value, image[[10 - row, col]], max_relative = 1e-12);
    }
    let peak = image.iter().copied().fold(f64::MIN, f64::max);
    assert_eq!(image[[5, 5]], peak);

    // photon noise off leaves QE scaling only
    let analog = output.frames[0].data.as_analog().unwrap();
    assert_relative_eq!(analog[[5, 5]], image[[5, 5]] * 0.69, max_relative = 1e-12);
}

#[test]
fn test_gaussian_kernel_sums_to_one() {
    let psf = build_psf(&OpticalConfig::default(), &grid(64), PsfSampling::Integrated);
    let kernel = psf.kernel((0.2, -0.3), nm(600.0), 0.0, 20);
    assert_relative_eq!(kernel.energy(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_airy_kernel_energy_converges() {
    let optics = OpticalConfig::default()
        .with_psf_model(PsfModel::default_airy())
        .unwrap();
    let psf = build_psf(&optics, &grid(64), PsfSampling::Integrated);
    let small = psf.kernel((0.0, 0.0), nm(600.0), 0.0, 4).energy();
    let large = psf.kernel((0.0, 0.0), nm(600.0), 0.0, 64).energy();
    assert!(small < large);
    assert!(large <= 1.0 + 1e-6);
    assert!(1.0 - large < 2e-2, "energy {large}");
}

#[test]
fn test_emitter_outside_grid_is_a_domain_error() {
    let scene = Scene::new([Emitter::new(200.0, 5.0, 0.0, nm(600.0), 10.0).unwrap()]);
    let result = run(&scene, &OpticalConfig::default(), 16, &SensorConfig::default(), 0, 1);
    assert!(matches!(result, Err(SimulationError::Domain(_))));
}

#[test]
fn test_wavelength_outside_passband_is_rejected() {
    let scene = Scene::new([Emitter::new(5.0, 5.0, 0.0, nm(900.0), 10.0).unwrap()]);
    let result = run(&scene, &OpticalConfig::default(), 16, &SensorConfig::default(), 0, 1);
    assert!(matches!(result, Err(SimulationError::Domain(_))));
}
