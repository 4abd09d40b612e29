//! Excitation light sources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::quantities::Irradiance;

/// Anything that illuminates the sample.
pub trait Source: fmt::Debug + Send + Sync {
    /// Irradiance at detector-pixel coordinates `(x, y)`.
    fn irradiance(&self, x: f64, y: f64) -> Irradiance;
}

/// Uniform monochromatic illumination over a rectangle.
///
/// Irradiance is `power / area` inside the closed rectangle and zero
/// outside. Power is adjustable between run steps but never above
/// `power_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformMono2D {
    power_max: f64,
    power: f64,
    x_lim: (f64, f64),
    y_lim: (f64, f64),
}

impl UniformMono2D {
    pub fn new(
        power_max: f64,
        power: f64,
        x_lim: (f64, f64),
        y_lim: (f64, f64),
    ) -> Result<Self, ConfigError> {
        if !power_max.is_finite() || power_max < 0.0 {
            return Err(ConfigError::invalid(
                "power_max",
                power_max,
                "must be finite and non-negative",
            ));
        }
        for (name, lim) in [("x_lim", x_lim), ("y_lim", y_lim)] {
            if !(lim.0.is_finite() && lim.1.is_finite()) || lim.0 >= lim.1 {
                return Err(ConfigError::invalid(
                    name,
                    lim.0,
                    "lower limit must be finite and below the upper limit",
                ));
            }
        }
        let mut source = Self {
            power_max,
            power: 0.0,
            x_lim,
            y_lim,
        };
        source.set_power(power)?;
        Ok(source)
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn power_max(&self) -> f64 {
        self.power_max
    }

    pub fn set_power(&mut self, power: f64) -> Result<(), ConfigError> {
        if !power.is_finite() || power < 0.0 {
            return Err(ConfigError::invalid(
                "power",
                power,
                "must be finite and non-negative",
            ));
        }
        if power > self.power_max {
            return Err(ConfigError::invalid(
                "power",
                power,
                "cannot exceed the maximum power",
            ));
        }
        self.power = power;
        Ok(())
    }

    pub fn area(&self) -> f64 {
        (self.x_lim.1 - self.x_lim.0) * (self.y_lim.1 - self.y_lim.0)
    }
}

impl Source for UniformMono2D {
    fn irradiance(&self, x: f64, y: f64) -> Irradiance {
        let inside = (self.x_lim.0..=self.x_lim.1).contains(&x)
            && (self.y_lim.0..=self.y_lim.1).contains(&y);
        if inside {
            Irradiance::new(self.power / self.area()).unwrap_or(Irradiance::ZERO)
        } else {
            Irradiance::ZERO
        }
    }
}
