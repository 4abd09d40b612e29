//! Detector output produced by the sensor model.

use std::time::Duration;

use ndarray::Array2;

/// Pixel values of one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    /// Digitized ADU values in `[0, 2^bits − 1]`.
    Quantized(Array2<u32>),
    /// Electrons before quantization, when that stage is disabled.
    Analog(Array2<f64>),
}

impl FrameData {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            FrameData::Quantized(data) => data.dim(),
            FrameData::Analog(data) => data.dim(),
        }
    }

    pub fn as_quantized(&self) -> Option<&Array2<u32>> {
        match self {
            FrameData::Quantized(data) => Some(data),
            FrameData::Analog(_) => None,
        }
    }

    pub fn as_analog(&self) -> Option<&Array2<f64>> {
        match self {
            FrameData::Analog(data) => Some(data),
            FrameData::Quantized(_) => None,
        }
    }

    /// Values as floating point regardless of representation.
    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            FrameData::Quantized(data) => data.mapv(f64::from),
            FrameData::Analog(data) => data.clone(),
        }
    }
}

/// One simulated detector readout with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedFrame {
    pub data: FrameData,
    /// Position of the frame in the requested sequence.
    pub index: usize,
    pub exposure: Duration,
    /// Seed of the random state that produced this frame.
    pub seed: u64,
}

impl SimulatedFrame {
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}
