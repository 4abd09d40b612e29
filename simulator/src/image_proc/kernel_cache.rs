//! Explicit key → kernel map for PSF reuse within one simulation call.
//!
//! The key holds every input that changes a kernel's values: the model
//! fingerprint, wavelength, axial position, sub-pixel offset and radius.
//! Two lookups with equal keys therefore always describe identical kernels.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::psf::{PointSpreadFunction, PsfKernel};
use crate::quantities::Wavelength;

/// Sub-pixel part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubpixelKey {
    /// Exact offset bit patterns.
    Exact { x: u64, y: u64 },
    /// Offset quantized to one of `buckets` bins per axis.
    Bucket { buckets: u32, x: u32, y: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub psf: u64,
    pub wavelength_bits: u64,
    pub z_bits: u64,
    pub subpixel: SubpixelKey,
    pub radius: usize,
}

/// A cached kernel together with the inputs it was built from.
#[derive(Debug, Clone)]
pub struct CachedKernel {
    pub kernel: Arc<PsfKernel>,
    pub wavelength: Wavelength,
    pub z_um: f64,
}

/// Bit pattern with negative zero folded onto positive zero.
fn canonical_bits(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

#[derive(Debug, Default)]
pub struct KernelCache {
    subpixel_buckets: Option<u32>,
    kernels: HashMap<KernelKey, CachedKernel>,
    hits: usize,
}

impl KernelCache {
    /// `subpixel_buckets` of `None` caches every distinct offset exactly.
    pub fn new(subpixel_buckets: Option<u32>) -> Self {
        Self {
            subpixel_buckets: subpixel_buckets.filter(|&b| b > 0),
            kernels: HashMap::new(),
            hits: 0,
        }
    }

    /// Key component and the offset actually used to evaluate the kernel.
    pub fn subpixel(&self, offset: (f64, f64)) -> (SubpixelKey, (f64, f64)) {
        match self.subpixel_buckets {
            None => (
                SubpixelKey::Exact {
                    x: canonical_bits(offset.0),
                    y: canonical_bits(offset.1),
                },
                offset,
            ),
            Some(buckets) => {
                let n = f64::from(buckets);
                let bin = |v: f64| ((v + 0.5) * n).floor().clamp(0.0, n - 1.0) as u32;
                let centre = |b: u32| (f64::from(b) + 0.5) / n - 0.5;
                let (bx, by) = (bin(offset.0), bin(offset.1));
                (
                    SubpixelKey::Bucket {
                        buckets,
                        x: bx,
                        y: by,
                    },
                    (centre(bx), centre(by)),
                )
            }
        }
    }

    /// Return the kernel for these inputs, computing it on first use.
    pub fn get_or_compute(
        &mut self,
        psf: &dyn PointSpreadFunction,
        offset: (f64, f64),
        wavelength: Wavelength,
        z_um: f64,
        radius: usize,
    ) -> Arc<PsfKernel> {
        let (subpixel, effective_offset) = self.subpixel(offset);
        let key = KernelKey {
            psf: psf.fingerprint(),
            wavelength_bits: canonical_bits(wavelength.as_nanometers()),
            z_bits: canonical_bits(z_um),
            subpixel,
            radius,
        };
        if let Some(cached) = self.kernels.get(&key) {
            self.hits += 1;
            return Arc::clone(&cached.kernel);
        }
        let kernel = Arc::new(psf.kernel(effective_offset, wavelength, z_um, radius));
        self.kernels.insert(
            key,
            CachedKernel {
                kernel: Arc::clone(&kernel),
                wavelength,
                z_um,
            },
        );
        kernel
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn entries(&self) -> impl Iterator<Item = (&KernelKey, &CachedKernel)> {
        self.kernels.iter()
    }

    pub fn log_summary(&self) {
        debug!(
            "kernel cache: {} kernels built, {} reused",
            self.kernels.len(),
            self.hits
        );
    }
}
