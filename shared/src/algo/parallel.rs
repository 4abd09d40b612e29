//! Parallel processing utilities for image and array operations
//!
//! This module provides functions for processing arrays in parallel
//! with deterministic seeding for reproducible results.

use ndarray::{Array2, ArrayViewMut2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::seed::derive_seed;

/// Number of rows handed to each worker when no chunk size is given.
pub const DEFAULT_CHUNK_ROWS: usize = 64;

/// Process an Array2 in parallel chunks with deterministic seeding
///
/// The array is split into row-wise chunks for cache locality. Each chunk
/// gets its own generator seeded from the base seed and the chunk index, so
/// the output depends only on `seed` and `chunk_size`, never on the number
/// of worker threads or the order in which chunks are scheduled.
///
/// # Arguments
/// * `array` - The 2D array to process
/// * `seed` - Base seed for random number generation
/// * `chunk_size` - Optional chunk size (number of rows per chunk). Defaults to
///   [`DEFAULT_CHUNK_ROWS`] if None.
/// * `processor` - Closure that processes each chunk with its own RNG
///
/// # Returns
/// The processed array
pub fn process_array_in_parallel_chunks<F>(
    mut array: Array2<f64>,
    seed: u64,
    chunk_size: Option<usize>,
    processor: F,
) -> Array2<f64>
where
    F: Fn(&mut ArrayViewMut2<f64>, &mut ChaCha8Rng) + Send + Sync,
{
    let chunk_size = chunk_size.unwrap_or(DEFAULT_CHUNK_ROWS).max(1);

    array
        .axis_chunks_iter_mut(Axis(0), chunk_size)
        .into_par_iter()
        .enumerate()
        .for_each(|(chunk_idx, mut chunk)| {
            let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(seed, chunk_idx as u64));
            processor(&mut chunk, &mut rng);
        });

    array
}
