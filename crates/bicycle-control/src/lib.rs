#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "Feedback controllers for the lateral control loop."]
#![doc = ""]
#![doc = "A [`Controller`] maps the measured lateral position of the vehicle to a"]
#![doc = "steering angle. [`PidController`] is the discrete PID used by the simulator."]

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maps a measurement to a control output, once per sampling interval.
pub trait Controller {
    /// Computes the control output for the latest measurement.
    ///
    /// # Arguments
    ///
    /// * `measurement`: The measured process variable (lateral position, m).
    ///
    /// # Returns
    ///
    /// The steering angle command in radians.
    fn control(&mut self, measurement: f64) -> f64;

    /// Clears any internal memory. Stateless controllers need not override this.
    fn reset(&mut self) {}
}

impl<C: Controller + ?Sized> Controller for &mut C {
    fn control(&mut self, measurement: f64) -> f64 {
        (**self).control(measurement)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// PID gains.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        PidGains {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
        }
    }
}

/// Discrete PID controller with a fixed sampling interval.
///
/// With `e = setpoint - measurement`:
///
/// ```text
/// u = kp·e + ki·Σ(e·dt) + kd·(e - e_prev)/dt
/// ```
///
/// The derivative term is zero on the first sample after construction or
/// [`Controller::reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    gains: PidGains,
    setpoint: f64,
    sampling_interval: f64,
    integral: f64,
    previous_error: Option<f64>,
}

impl PidController {
    /// Construct a PID controller with default gains and a zero setpoint.
    ///
    /// # Arguments
    ///
    /// * `sampling_interval`: Time between consecutive `control` calls (s).
    pub fn new(sampling_interval: f64) -> Self {
        PidController {
            gains: PidGains::default(),
            setpoint: 0.0,
            sampling_interval,
            integral: 0.0,
            previous_error: None,
        }
    }

    /// Sets all gains at once.
    pub fn with_gains(mut self, gains: PidGains) -> Self {
        self.gains = gains;
        self
    }

    /// Sets the proportional gain.
    pub fn with_kp(mut self, kp: f64) -> Self {
        self.gains.kp = kp;
        self
    }

    /// Sets the integral gain.
    pub fn with_ki(mut self, ki: f64) -> Self {
        self.gains.ki = ki;
        self
    }

    /// Sets the derivative gain.
    pub fn with_kd(mut self, kd: f64) -> Self {
        self.gains.kd = kd;
        self
    }

    /// Sets the target value of the measurement.
    pub fn with_setpoint(mut self, setpoint: f64) -> Self {
        self.setpoint = setpoint;
        self
    }

    /// Returns the gains.
    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Returns the setpoint.
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Returns the sampling interval (s).
    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    /// Returns the accumulated integral of the error.
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

impl Controller for PidController {
    fn control(&mut self, measurement: f64) -> f64 {
        let dt = self.sampling_interval;
        let error = self.setpoint - measurement;

        self.integral += error * dt;
        let derivative = match self.previous_error {
            Some(previous) => (error - previous) / dt,
            None => 0.0,
        };
        self.previous_error = Some(error);

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
    }
}

impl fmt::Display for PidController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PID (kp: {:.3}, ki: {:.3}, kd: {:.3}, setpoint: {:.3}, dt: {} s)",
            self.gains.kp, self.gains.ki, self.gains.kd, self.setpoint, self.sampling_interval
        )
    }
}
