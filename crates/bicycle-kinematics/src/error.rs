//! Error types for the kinematics library.
//!
//! The vehicle model itself never fails on finite input. These errors back the
//! optional, caller-side validation helpers.

use core::fmt;

/// Errors that can occur when validating vehicle parameters or time deltas.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for an invalid wheelbase.
    /// This variant is returned when the wheelbase is zero or not finite.
    InvalidLength(&'static str),
    /// Error for an invalid forward speed.
    /// This variant is returned when the speed is not finite.
    InvalidSpeed(&'static str),
    /// Error for an invalid steering disturbance.
    /// This variant is returned when the disturbance is not finite.
    InvalidSteeringDisturbance(&'static str),
    /// Error for negative time delta.
    /// This variant is returned when a negative duration is used to advance the vehicle.
    NegativeTimeDelta(&'static str),
    /// Error for a NaN or infinite time delta.
    NonFiniteTimeDelta(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidLength(msg) => write!(f, "Invalid wheelbase: {}", msg),
            KinematicsError::InvalidSpeed(msg) => write!(f, "Invalid speed: {}", msg),
            KinematicsError::InvalidSteeringDisturbance(msg) => {
                write!(f, "Invalid steering disturbance: {}", msg)
            }
            KinematicsError::NegativeTimeDelta(msg) => write!(f, "Negative time delta: {}", msg),
            KinematicsError::NonFiniteTimeDelta(msg) => write!(f, "Non-finite time delta: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
