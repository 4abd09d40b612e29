//! Type-safe physical units for the optical and sensor models
//!
//! Thin aliases and extension traits over `uom` so that wavelengths, pixel
//! pitches and detector temperatures cannot be confused with bare floats.

use uom::si::f64::ThermodynamicTemperature;
use uom::si::length::{meter, micrometer, millimeter, nanometer};
use uom::si::thermodynamic_temperature::{degree_celsius, kelvin};

/// Type alias for temperature with convenient methods
pub type Temperature = ThermodynamicTemperature;

/// Type alias for length measurements with convenient methods
pub type Length = uom::si::f64::Length;

/// Extension trait for temperature conversions
pub trait TemperatureExt {
    /// Create temperature from degrees Celsius
    fn from_celsius(celsius: f64) -> Self;

    /// Get temperature in degrees Celsius
    fn as_celsius(&self) -> f64;

    /// Create temperature from Kelvin
    fn from_kelvin(kelvin: f64) -> Self;

    /// Get temperature in Kelvin
    fn as_kelvin(&self) -> f64;
}

/// Extension trait for length conversions used for wavelengths and pixel pitches
pub trait LengthExt {
    fn from_nanometers(nm: f64) -> Self;
    fn as_nanometers(&self) -> f64;
    fn from_micrometers(um: f64) -> Self;
    fn as_micrometers(&self) -> f64;
    fn from_millimeters(mm: f64) -> Self;
    fn as_millimeters(&self) -> f64;
    fn from_meters(m: f64) -> Self;
    fn as_meters(&self) -> f64;
}

impl TemperatureExt for Temperature {
    fn from_celsius(celsius: f64) -> Self {
        Temperature::new::<degree_celsius>(celsius)
    }

    fn as_celsius(&self) -> f64 {
        self.get::<degree_celsius>()
    }

    fn from_kelvin(value: f64) -> Self {
        Temperature::new::<kelvin>(value)
    }

    fn as_kelvin(&self) -> f64 {
        self.get::<kelvin>()
    }
}

impl LengthExt for Length {
    fn from_nanometers(nm: f64) -> Self {
        Length::new::<nanometer>(nm)
    }

    fn as_nanometers(&self) -> f64 {
        self.get::<nanometer>()
    }

    fn from_micrometers(um: f64) -> Self {
        Length::new::<micrometer>(um)
    }

    fn as_micrometers(&self) -> f64 {
        self.get::<micrometer>()
    }

    fn from_millimeters(mm: f64) -> Self {
        Length::new::<millimeter>(mm)
    }

    fn as_millimeters(&self) -> f64 {
        self.get::<millimeter>()
    }

    fn from_meters(m: f64) -> Self {
        Length::new::<meter>(m)
    }

    fn as_meters(&self) -> f64 {
        self.get::<meter>()
    }
}
