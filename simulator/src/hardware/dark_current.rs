//! Temperature-dependent dark current.

use std::time::Duration;

use microsim_shared::units::{Temperature, TemperatureExt};
use serde::{Deserialize, Serialize};

/// Dark current model anchored at a reference temperature.
///
/// Uses the rule of thumb that dark current doubles for every 8 °C of
/// warming and halves for every 8 °C of cooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkCurrentEstimator {
    /// Dark current in electrons/pixel/second at the reference temperature
    reference_dark_current: f64,
    /// Reference temperature in degrees Celsius
    reference_temp_c: f64,
}

impl DarkCurrentEstimator {
    /// Temperature rise that doubles the dark current.
    pub const DOUBLING_INTERVAL_C: f64 = 8.0;

    /// # Example
    /// ```
    /// use microsim::hardware::dark_current::DarkCurrentEstimator;
    /// use microsim_shared::units::{Temperature, TemperatureExt};
    ///
    /// let estimator = DarkCurrentEstimator::new(0.1, Temperature::from_celsius(20.0));
    /// let warmer = estimator.estimate_at_temperature(Temperature::from_celsius(28.0));
    /// assert!((warmer - 0.2).abs() < 1e-12);
    /// ```
    pub fn new(reference_dark_current: f64, reference_temp: Temperature) -> Self {
        Self {
            reference_dark_current,
            reference_temp_c: reference_temp.as_celsius(),
        }
    }

    /// A sensor without dark current.
    pub fn none() -> Self {
        Self {
            reference_dark_current: 0.0,
            reference_temp_c: 20.0,
        }
    }

    pub fn reference_dark_current(&self) -> f64 {
        self.reference_dark_current
    }

    /// Dark current in electrons/pixel/second at `temperature`.
    pub fn estimate_at_temperature(&self, temperature: Temperature) -> f64 {
        let doubling_periods =
            (temperature.as_celsius() - self.reference_temp_c) / Self::DOUBLING_INTERVAL_C;
        self.reference_dark_current * 2.0_f64.powf(doubling_periods)
    }

    /// Mean dark electrons accumulated per pixel during `exposure`.
    pub fn electrons(&self, temperature: Temperature, exposure: Duration) -> f64 {
        self.estimate_at_temperature(temperature) * exposure.as_secs_f64()
    }
}

impl Default for DarkCurrentEstimator {
    fn default() -> Self {
        Self::none()
    }
}
