//! Continuous-time Markov state machine with exponential waiting times.
//!
//! Transition rates form an N×N matrix (row = from, column = to). Rates may
//! depend on L control parameters through a power series truncated at
//! order M:
//!
//! ```text
//! rate[i][j] = constants[i][j] + Σₗ Σₘ coefficients[l][m][i][j] · pₗ^(m+1)
//! ```
//!
//! A state whose constants and coefficients are all zero can never be left
//! and stops the machine.

use ndarray::{Array1, Array2, Array4, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};

use crate::error::ConfigError;

/// A transition between two states at an absolute time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub from_state: usize,
    pub to_state: usize,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: usize,
    rate_constants: Array2<f64>,
    rate_coefficients: Array4<f64>,
    control: Vec<f64>,
    absorbing: Vec<bool>,
    next_event: Event,
    stopped: bool,
    rng: ChaCha8Rng,
}

impl StateMachine {
    /// # Arguments
    /// * `current_state` - Initial state, below N
    /// * `control` - Initial control parameter values, length L
    /// * `rate_constants` - N×N rates independent of the controls
    /// * `rate_coefficients` - L×M×N×N power series coefficients
    /// * `seed` - Seed of the machine's own generator
    pub fn new(
        current_state: usize,
        control: &[f64],
        rate_constants: Array2<f64>,
        rate_coefficients: Array4<f64>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let (rows, cols) = rate_constants.dim();
        if rows != cols || rows == 0 {
            return Err(ConfigError::StateMachine(format!(
                "rate constants must be a non-empty square matrix, got {rows}x{cols}"
            )));
        }
        let (l, _m, n1, n2) = rate_coefficients.dim();
        if l > 0 && (n1 != rows || n2 != rows) {
            return Err(ConfigError::StateMachine(format!(
                "rate coefficients must end in {rows}x{rows}, got {n1}x{n2}"
            )));
        }
        if control.len() != l {
            return Err(ConfigError::StateMachine(format!(
                "{} control parameters given for {l} coefficient sets",
                control.len()
            )));
        }
        if current_state >= rows {
            return Err(ConfigError::StateMachine(format!(
                "initial state {current_state} does not exist in a {rows}-state machine"
            )));
        }
        if rate_constants
            .iter()
            .chain(rate_coefficients.iter())
            .any(|v| !v.is_finite())
        {
            return Err(ConfigError::StateMachine(
                "rates must be finite".to_string(),
            ));
        }

        let absorbing = (0..rows)
            .map(|state| {
                let constant_free = rate_constants.row(state).iter().all(|&r| r == 0.0);
                let coefficient_free = l == 0
                    || rate_coefficients
                        .index_axis(Axis(2), state)
                        .iter()
                        .all(|&r| r == 0.0);
                constant_free && coefficient_free
            })
            .collect();

        let mut machine = Self {
            current_state,
            rate_constants,
            rate_coefficients,
            control: control.to_vec(),
            absorbing,
            next_event: Event {
                time: f64::INFINITY,
                from_state: current_state,
                to_state: current_state,
            },
            stopped: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        machine.next_event = machine.draw_next_event(0.0);
        Ok(machine)
    }

    pub fn current_state(&self) -> usize {
        self.current_state
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn num_states(&self) -> usize {
        self.rate_constants.nrows()
    }

    /// States that can never be left.
    pub fn stopped_states(&self) -> Vec<usize> {
        self.absorbing
            .iter()
            .enumerate()
            .filter_map(|(state, &absorbing)| absorbing.then_some(state))
            .collect()
    }

    /// Rate matrix for the given control values.
    pub fn rates(&self, control: &[f64]) -> Array2<f64> {
        let mut rates = self.rate_constants.clone();
        for (orders, &p) in self.rate_coefficients.outer_iter().zip(control) {
            let mut power = 1.0;
            for coefficients in orders.outer_iter() {
                power *= p;
                rates.scaled_add(power, &coefficients);
            }
        }
        rates
    }

    fn draw_next_event(&mut self, t_offset: f64) -> Event {
        let state = self.current_state;
        if self.absorbing[state] {
            self.stopped = true;
            return Event {
                time: f64::INFINITY,
                from_state: state,
                to_state: state,
            };
        }

        let rates: Array1<f64> = self.rates(&self.control).row(state).to_owned();
        let mut best = Event {
            time: f64::INFINITY,
            from_state: state,
            to_state: state,
        };
        for (to_state, &rate) in rates.iter().enumerate() {
            if rate <= 0.0 {
                continue;
            }
            let Ok(exp) = Exp::new(rate) else {
                continue;
            };
            let wait: f64 = exp.sample(&mut self.rng);
            if t_offset + wait < best.time {
                best = Event {
                    time: t_offset + wait,
                    from_state: state,
                    to_state,
                };
            }
        }
        best
    }

    /// Advance through `[time, time + dt)` under `control` and return every
    /// transition in order.
    ///
    /// A change of control values redraws the pending transition from
    /// `time`, which is exact because waiting times are memoryless.
    pub fn collect(&mut self, control: &[f64], time: f64, dt: f64) -> Vec<Event> {
        if self.stopped {
            return Vec::new();
        }
        if control != self.control.as_slice() {
            self.control = control.to_vec();
            self.next_event = self.draw_next_event(time);
        }

        let mut events = Vec::new();
        while self.next_event.time < time + dt {
            let event = self.next_event;
            events.push(event);
            self.current_state = event.to_state;
            self.next_event = self.draw_next_event(event.time);
            if self.stopped {
                break;
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_state(k_forward: f64, seed: u64) -> StateMachine {
        StateMachine::new(
            0,
            &[],
            array![[0.0, k_forward], [0.0, 0.0]],
            Array4::zeros((0, 0, 2, 2)),
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_inconsistent_shapes() {
        assert!(StateMachine::new(0, &[], Array2::zeros((2, 3)), Array4::zeros((0, 0, 2, 2)), 0).is_err());
        assert!(StateMachine::new(0, &[1.0], Array2::zeros((2, 2)), Array4::zeros((0, 0, 2, 2)), 0).is_err());
        assert!(StateMachine::new(5, &[], Array2::zeros((2, 2)), Array4::zeros((0, 0, 2, 2)), 0).is_err());
    }

    #[test]
    fn test_rates_power_series() {
        let mut coefficients = Array4::zeros((1, 2, 2, 2));
        coefficients[[0, 0, 0, 1]] = 2.0;
        coefficients[[0, 1, 0, 1]] = 0.5;
        let machine =
            StateMachine::new(0, &[3.0], array![[0.0, 1.0], [0.0, 0.0]], coefficients, 0).unwrap();
        // 1 + 2·3 + 0.5·9
        assert_eq!(machine.rates(&[3.0])[[0, 1]], 11.5);
        assert_eq!(machine.rates(&[0.0])[[0, 1]], 1.0);
    }

    #[test]
    fn test_absorbing_state_stops_machine() {
        let mut machine = two_state(1000.0, 1);
        assert_eq!(machine.stopped_states(), vec![1]);
        let events = machine.collect(&[], 0.0, 10.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from_state, 0);
        assert_eq!(events[0].to_state, 1);
        assert!(events[0].time < 10.0);
        assert!(machine.is_stopped());
        assert!(machine.collect(&[], 10.0, 10.0).is_empty());
    }

    #[test]
    fn test_mean_waiting_time() {
        let rate = 2.0;
        let total: f64 = (0..4000)
            .map(|seed| {
                let mut machine = two_state(rate, seed);
                machine.collect(&[], 0.0, 1e9)[0].time
            })
            .sum();
        let mean = total / 4000.0;
        assert!((mean - 1.0 / rate).abs() < 0.03, "mean {mean}");
    }

    #[test]
    fn test_zero_control_freezes_light_driven_transition() {
        let mut coefficients = Array4::zeros((1, 1, 2, 2));
        coefficients[[0, 0, 0, 1]] = 5.0;
        let mut machine =
            StateMachine::new(0, &[0.0], Array2::zeros((2, 2)), coefficients, 3).unwrap();
        assert!(machine.collect(&[0.0], 0.0, 100.0).is_empty());
        assert!(!machine.is_stopped());
        let events = machine.collect(&[10.0], 100.0, 100.0);
        assert_eq!(events.len(), 1);
        assert!(events[0].time >= 100.0);
    }

    #[test]
    fn test_same_seed_same_events() {
        let constants = array![[0.0, 1.0], [1.0, 0.0]];
        let run = |seed| {
            let mut machine =
                StateMachine::new(0, &[], constants.clone(), Array4::zeros((0, 0, 2, 2)), seed)
                    .unwrap();
            machine.collect(&[], 0.0, 20.0)
        };
        assert_eq!(run(5), run(5));
        assert_ne!(run(5), run(6));
    }
}
