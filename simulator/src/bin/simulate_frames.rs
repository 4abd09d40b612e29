//! Render a random field of point emitters and report frame statistics
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin simulate_frames -- --emitters 20 --frames 5
//! cargo run --release --bin simulate_frames -- --psf airy --sensor scmos --output frame.png
//! RUST_LOG=debug cargo run --release --bin simulate_frames -- --seed 7
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use image::{ImageBuffer, Luma};
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use microsim::hardware::objective::models::{AIR_20X_075, OIL_100X_140, WATER_60X_120};
use microsim::hardware::sensor::models::{COOLED_EMCCD, SCMOS_16BIT, SIMPLE_CMOS};
use microsim::hardware::{DetectorGrid, OpticalConfig, PsfModel, SensorConfig};
use microsim::quantities::Wavelength;
use microsim::units::{Length, LengthExt};
use microsim::{simulate, Emitter, RandomState, Scene, SimulationOptions};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PsfChoice {
    Gaussian,
    Airy,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ObjectiveChoice {
    Oil100x,
    Water60x,
    Air20x,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SensorChoice {
    Cmos,
    Scmos,
    Emccd,
}

#[derive(Parser, Debug)]
#[command(
    name = "simulate_frames",
    about = "Simulates noisy microscope frames of a random emitter field",
    long_about = None
)]
struct Args {
    /// Detector width in pixels
    #[arg(long, default_value_t = 64)]
    width: usize,

    /// Detector height in pixels
    #[arg(long, default_value_t = 64)]
    height: usize,

    /// Physical pixel pitch in micrometers
    #[arg(long, default_value_t = 6.5)]
    pixel_pitch_um: f64,

    /// Number of emitters placed uniformly at random
    #[arg(long, default_value_t = 10)]
    emitters: usize,

    /// Mean photons per emitter per frame
    #[arg(long, default_value_t = 2000.0)]
    photons: f64,

    /// Emission wavelength in nanometers
    #[arg(long, default_value_t = 600.0)]
    wavelength_nm: f64,

    /// Number of frames to simulate
    #[arg(long, default_value_t = 1)]
    frames: usize,

    /// Seed for both the scene layout and the sensor noise
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = PsfChoice::Gaussian)]
    psf: PsfChoice,

    #[arg(long, value_enum, default_value_t = ObjectiveChoice::Oil100x)]
    objective: ObjectiveChoice,

    #[arg(long, value_enum, default_value_t = SensorChoice::Cmos)]
    sensor: SensorChoice,

    /// Turn numerical diagnostics into errors
    #[arg(long)]
    strict: bool,

    /// Write the first frame as a 16-bit grayscale PNG
    #[arg(long)]
    output: Option<PathBuf>,
}

fn random_scene(args: &Args, wavelength: Wavelength) -> Result<Scene> {
    ensure!(
        args.width >= 4 && args.height >= 4,
        "random scenes need a grid of at least 4x4 pixels"
    );
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let margin = 3.0_f64.min(args.width.min(args.height) as f64 / 4.0);
    let emitters = (0..args.emitters)
        .map(|_| {
            let x = rng.random_range(margin..args.width as f64 - 1.0 - margin);
            let y = rng.random_range(margin..args.height as f64 - 1.0 - margin);
            let photons = args.photons * rng.random_range(0.5..1.5);
            Emitter::new(x, y, 0.0, wavelength, photons)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Scene::new(emitters))
}

fn optics(args: &Args) -> Result<OpticalConfig> {
    let base = match args.objective {
        ObjectiveChoice::Oil100x => OIL_100X_140.clone(),
        ObjectiveChoice::Water60x => WATER_60X_120.clone(),
        ObjectiveChoice::Air20x => AIR_20X_075.clone(),
    };
    let model = match args.psf {
        PsfChoice::Gaussian => PsfModel::Gaussian,
        PsfChoice::Airy => PsfModel::default_airy(),
    };
    Ok(base.with_psf_model(model)?)
}

fn sensor(args: &Args) -> SensorConfig {
    match args.sensor {
        SensorChoice::Cmos => SIMPLE_CMOS.clone(),
        SensorChoice::Scmos => SCMOS_16BIT.clone(),
        SensorChoice::Emccd => COOLED_EMCCD.clone(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let wavelength = Wavelength::from_nanometers(args.wavelength_nm)?;
    let grid = DetectorGrid::new(
        args.width,
        args.height,
        Length::from_micrometers(args.pixel_pitch_um),
    )?;
    let optics = optics(&args)?;
    let sensor = sensor(&args);
    let options = SimulationOptions {
        strict: args.strict,
        keep_noiseless: true,
        allow_empty_scene: true,
        ..SimulationOptions::default()
    };
    let scene = random_scene(&args, wavelength)?;

    info!(
        "{} emitter(s) on a {}x{} grid, {:?} PSF, sensor '{}'",
        scene.len(),
        args.width,
        args.height,
        args.psf,
        sensor.name
    );

    let mut state = RandomState::from_seed(args.seed);
    let start = Instant::now();
    let output = simulate(
        &scene, &optics, &grid, &sensor, &options, &mut state, args.frames,
    )?;
    let elapsed = start.elapsed();

    println!(
        "Simulated {} frame(s) in {:.2} ms",
        output.frames.len(),
        elapsed.as_secs_f64() * 1e3
    );
    println!(
        "Object pixel: {:.1} nm, Nyquist limit: {:.1} nm",
        grid.object_pixel_um(&optics) * 1e3,
        optics.nyquist_limit_nm()
    );
    if let Some(noiseless) = &output.noiseless {
        println!(
            "Scene photons: {:.1}, collected on grid: {:.1}",
            scene.total_photons(),
            noiseless.sum()
        );
    }
    for diagnostic in &output.diagnostics {
        println!("Diagnostic: {diagnostic}");
    }

    println!("frame\tmin\tmax\tmean");
    for frame in &output.frames {
        let values = frame.data.to_f64();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.mean().unwrap_or(0.0);
        println!("{}\t{:.1}\t{:.1}\t{:.2}", frame.index, min, max, mean);
    }

    if let (Some(path), Some(frame)) = (&args.output, output.frames.first()) {
        let values = frame.data.to_f64();
        let (height, width) = values.dim();
        let pixels: Vec<u16> = values
            .iter()
            .map(|&v| v.round().clamp(0.0, f64::from(u16::MAX)) as u16)
            .collect();
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(width as u32, height as u32, pixels)
                .context("frame buffer does not match its dimensions")?;
        img.save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote frame 0 to {}", path.display());
    }

    Ok(())
}
