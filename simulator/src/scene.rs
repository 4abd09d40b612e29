//! Ground-truth description of what is in front of the objective.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quantities::{PhotonCount, PixelPosition, Wavelength};

/// A point emitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    pub position: PixelPosition,
    pub wavelength: Wavelength,
    /// Expected photons collected during one frame.
    pub brightness: PhotonCount,
}

impl Emitter {
    pub fn new(
        x: f64,
        y: f64,
        z: f64,
        wavelength: Wavelength,
        photons: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            position: PixelPosition::new(x, y, z)?,
            wavelength,
            brightness: PhotonCount::new(photons)?,
        })
    }

    /// Same emitter with brightness multiplied by `factor` (clamped at zero).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            brightness: self.brightness * factor,
            ..*self
        }
    }
}

/// Ordered, immutable collection of emitters for one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    emitters: Vec<Emitter>,
}

impl Scene {
    pub fn new(emitters: impl IntoIterator<Item = Emitter>) -> Self {
        Self {
            emitters: emitters.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a scene from parallel coordinate slices sharing one wavelength.
    pub fn from_coordinates(
        x: &[f64],
        y: &[f64],
        z: &[f64],
        brightness: &[f64],
        wavelength: Wavelength,
    ) -> Result<Self, ConfigError> {
        let n = x.len();
        if y.len() != n || z.len() != n || brightness.len() != n {
            return Err(ConfigError::MismatchedLengths {
                x: n,
                y: y.len(),
                z: z.len(),
                brightness: brightness.len(),
            });
        }
        (0..n)
            .map(|i| Emitter::new(x[i], y[i], z[i], wavelength, brightness[i]))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Emitter> {
        self.emitters.iter()
    }

    /// Every emitter's brightness multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.emitters.iter().map(|e| e.scaled(factor)))
    }

    /// Sum of expected photons over all emitters.
    pub fn total_photons(&self) -> f64 {
        self.emitters.iter().map(|e| e.brightness.value()).sum()
    }
}

impl FromIterator<Emitter> for Scene {
    fn from_iter<I: IntoIterator<Item = Emitter>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Scene {
    type Item = &'a Emitter;
    type IntoIter = std::slice::Iter<'a, Emitter>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
