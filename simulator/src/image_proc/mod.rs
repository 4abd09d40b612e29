//! Image formation: PSF models, kernel caching, accumulation and quantization

pub mod airy;
pub mod gaussian;
pub mod kernel_cache;
pub mod psf;
pub mod render;

pub use airy::AiryPsf;
pub use gaussian::GaussianPsf;
pub use kernel_cache::{KernelCache, KernelKey};
pub use psf::{build_psf, PointSpreadFunction, PsfKernel, PsfSampling, MAX_TRUNCATION_RADIUS};
pub use render::{add_emitters_to_image, quantize_image};
