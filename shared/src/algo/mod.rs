//! Algorithms shared across the simulation crates
//!
//! This module provides deterministic seed derivation and parallel chunked
//! processing of image arrays.

pub mod parallel;
pub mod seed;

pub use parallel::{process_array_in_parallel_chunks, DEFAULT_CHUNK_ROWS};
pub use seed::{derive_seed, splitmix64};
