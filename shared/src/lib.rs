//! Shared components and utilities for the microsim workspace
//!
//! Holds the pieces that are not specific to a single optical model:
//! physical unit helpers, deterministic seed derivation, chunked parallel
//! array processing, and the photon/read noise primitives used by the
//! sensor model.

pub mod algo;
pub mod image_proc;
pub mod units;
