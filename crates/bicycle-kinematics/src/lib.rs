#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for bicycle (single-track) vehicle kinematics."]
#![doc = ""]
#![doc = "This crate provides the vehicle pose, the nonlinear bicycle dynamics and the"]
#![doc = "ODE integrators used to advance the pose under a steering command."]

use core::fmt;
use libm::{cos, sin, tan};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod integrate;
pub use error::KinematicsError;
pub use integrate::{DEFAULT_SAMPLE_COUNT, Dopri5, Integrator, Rk4};

/// Default wheelbase (m).
pub const DEFAULT_LENGTH: f64 = 2.3;
/// Default forward speed (m/s).
pub const DEFAULT_SPEED: f64 = 5.0;

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis in the world frame).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position (m).
    pub x: f64,
    /// World‑frame y position (m).
    pub y: f64,
    /// Heading (rad). Not wrapped: full turns accumulate.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: World-frame x position in meters.
    /// * `y`: World-frame y position in meters.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }

    const fn to_state(self) -> [f64; 3] {
        [self.x, self.y, self.theta]
    }

    const fn from_state(state: [f64; 3]) -> Self {
        Pose::new(state[0], state[1], state[2])
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.3}, y: {:.3}, θ: {:.3} rad)", self.x, self.y, self.theta)
    }
}

/// Fixed physical parameters of a bicycle-model vehicle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleParams {
    /// Wheelbase (m).
    length: f64,
    /// Forward speed (m/s).
    speed: f64,
    /// Additive bias applied to every commanded steering angle (rad).
    steering_disturbance: f64,
}

impl VehicleParams {
    /// Construct vehicle parameters with no steering disturbance.
    ///
    /// No validation is performed. A zero `length` yields non-finite poses once
    /// the vehicle is advanced; see [`VehicleParams::validate`].
    ///
    /// # Arguments
    ///
    /// * `length`: Wheelbase in meters.
    /// * `speed`: Constant forward speed in meters per second.
    pub const fn new(length: f64, speed: f64) -> Self {
        VehicleParams {
            length,
            speed,
            steering_disturbance: 0.0,
        }
    }

    /// Returns a copy with the given steering disturbance (rad).
    pub const fn with_steering_disturbance(mut self, steering_disturbance: f64) -> Self {
        self.steering_disturbance = steering_disturbance;
        self
    }

    /// Returns the wheelbase.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Returns the forward speed.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Returns the steering disturbance.
    pub fn steering_disturbance(&self) -> f64 {
        self.steering_disturbance
    }

    /// Checks the preconditions the dynamics rely on.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidLength)` if the wheelbase is zero or not finite.
    /// Returns `Err(KinematicsError::InvalidSpeed)` if the speed is not finite.
    /// Returns `Err(KinematicsError::InvalidSteeringDisturbance)` if the disturbance is not finite.
    pub fn validate(&self) -> Result<(), KinematicsError> {
        if !self.length.is_finite() {
            return Err(KinematicsError::InvalidLength("must be finite"));
        }
        if self.length == 0.0 {
            return Err(KinematicsError::InvalidLength("must be non-zero"));
        }
        if !self.speed.is_finite() {
            return Err(KinematicsError::InvalidSpeed("must be finite"));
        }
        if !self.steering_disturbance.is_finite() {
            return Err(KinematicsError::InvalidSteeringDisturbance("must be finite"));
        }
        Ok(())
    }

    /// Bicycle kinematics right-hand side for state `[x, y, θ]`.
    ///
    /// ```text
    /// dx/dt = v cos θ
    /// dy/dt = v sin θ
    /// dθ/dt = v tan(δ + δ_bias) / L
    /// ```
    ///
    /// # Arguments
    ///
    /// * `state`: `[x, y, θ]`.
    /// * `steering_angle`: Commanded steering angle δ in radians.
    pub fn derivative(&self, state: &[f64; 3], steering_angle: f64) -> [f64; 3] {
        let theta = state[2];
        [
            self.speed * cos(theta),
            self.speed * sin(theta),
            self.speed * tan(steering_angle + self.steering_disturbance) / self.length,
        ]
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        VehicleParams::new(DEFAULT_LENGTH, DEFAULT_SPEED)
    }
}

impl fmt::Display for VehicleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VehicleParams (L: {:.2} m, v: {:.2} m/s, δ_bias: {:.4} rad)",
            self.length, self.speed, self.steering_disturbance
        )
    }
}

/// Bicycle kinematic vehicle model.
///
/// Owns its pose and advances it by integrating the bicycle dynamics under a
/// steering command. The pose only changes through [`Vehicle::advance`] (or
/// [`Vehicle::checked_advance`]); no history is kept.
///
/// Not synchronized: callers sharing a vehicle across threads must provide
/// their own mutual exclusion.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle<I = Dopri5> {
    params: VehicleParams,
    pose: Pose,
    integrator: I,
    sample_count: usize,
}

impl Vehicle<Dopri5> {
    /// Construct a vehicle using the default adaptive integrator.
    ///
    /// # Arguments
    ///
    /// * `params`: Fixed vehicle parameters. Not validated.
    /// * `pose`: Initial pose.
    pub fn new(params: VehicleParams, pose: Pose) -> Self {
        Vehicle {
            params,
            pose,
            integrator: Dopri5::default(),
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }

    /// Construct a vehicle after validating `params`.
    ///
    /// # Errors
    ///
    /// Propagates the error from [`VehicleParams::validate`].
    pub fn try_new(params: VehicleParams, pose: Pose) -> Result<Self, KinematicsError> {
        params.validate()?;
        Ok(Vehicle::new(params, pose))
    }
}

impl Default for Vehicle<Dopri5> {
    fn default() -> Self {
        Vehicle::new(VehicleParams::default(), Pose::default())
    }
}

impl<I> Vehicle<I> {
    /// Replace the integrator used by [`Vehicle::advance`].
    pub fn with_integrator<J: Integrator>(self, integrator: J) -> Vehicle<J> {
        Vehicle {
            params: self.params,
            pose: self.pose,
            integrator,
            sample_count: self.sample_count,
        }
    }

    /// Set the number of evenly spaced sample points per `advance` call (at least 2).
    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = sample_count.max(2);
        self
    }

    /// Returns the x position (m).
    pub fn x_position(&self) -> f64 {
        self.pose.x
    }

    /// Returns the y position (m).
    pub fn y_position(&self) -> f64 {
        self.pose.y
    }

    /// Returns the heading (rad).
    pub fn heading(&self) -> f64 {
        self.pose.theta
    }

    /// Returns the current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Returns the vehicle parameters.
    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    /// Returns the wheelbase (m).
    pub fn length(&self) -> f64 {
        self.params.length
    }

    /// Returns the forward speed (m/s).
    pub fn speed(&self) -> f64 {
        self.params.speed
    }

    /// Returns the steering disturbance (rad).
    pub fn steering_disturbance(&self) -> f64 {
        self.params.steering_disturbance
    }

    /// Returns the number of sample points per `advance` call.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Returns the integrator.
    pub fn integrator(&self) -> &I {
        &self.integrator
    }
}

impl<I: Integrator> Vehicle<I> {
    /// Advances the pose by integrating the bicycle dynamics over `[0, duration]`
    /// with a constant commanded steering angle.
    ///
    /// The pose is replaced by the integrated state at `t = duration`. A zero
    /// duration leaves the pose unchanged. Non-finite results from degenerate
    /// input (zero wheelbase, steering near ±π/2) are stored as-is; this never
    /// panics.
    ///
    /// # Arguments
    ///
    /// * `steering_angle`: Commanded steering angle in radians. Not clamped.
    /// * `duration`: Time span in seconds; expected to be non-negative. Negative
    ///   or NaN durations leave the pose unchanged.
    pub fn advance(&mut self, steering_angle: f64, duration: f64) {
        let params = self.params;
        let state = self.integrator.integrate(
            |_t, z: &[f64; 3]| params.derivative(z, steering_angle),
            (0.0, duration),
            self.pose.to_state(),
            self.sample_count,
        );
        self.pose = Pose::from_state(state);
    }

    /// Like [`Vehicle::advance`], but rejects an invalid duration first.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NonFiniteTimeDelta)` if `duration` is NaN or infinite.
    /// Returns `Err(KinematicsError::NegativeTimeDelta)` if `duration` is negative.
    pub fn checked_advance(&mut self, steering_angle: f64, duration: f64) -> Result<(), KinematicsError> {
        if !duration.is_finite() {
            return Err(KinematicsError::NonFiniteTimeDelta("must be finite"));
        }
        if duration < 0.0 {
            return Err(KinematicsError::NegativeTimeDelta("must be non-negative"));
        }
        self.advance(steering_angle, duration);
        Ok(())
    }
}

impl<I> fmt::Display for Vehicle<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vehicle {} at {}", self.params, self.pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
    const EPSILON: f64 = 1e-6;

    fn scenario_vehicle() -> Vehicle {
        Vehicle::new(VehicleParams::default(), Pose::new(0.0, 0.5, 0.0))
    }

    #[test]
    fn test_default_construction() {
        let vehicle = Vehicle::default();
        assert_eq!(vehicle.length(), 2.3);
        assert_eq!(vehicle.speed(), 5.0);
        assert_eq!(vehicle.steering_disturbance(), 0.0);
        assert_eq!(vehicle.x_position(), 0.0);
        assert_eq!(vehicle.y_position(), 0.0);
        assert_eq!(vehicle.heading(), 0.0);
        assert_eq!(vehicle.sample_count(), DEFAULT_SAMPLE_COUNT);
    }

    #[test]
    fn test_derivative() {
        let params = VehicleParams::new(2.0, 4.0).with_steering_disturbance(0.1);
        let d = params.derivative(&[1.0, 2.0, FRAC_PI_2], 0.2);
        assert!(d[0].abs() < EPSILON); // cos(π/2)
        assert!((d[1] - 4.0).abs() < EPSILON);
        assert!((d[2] - 4.0 * 0.3f64.tan() / 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_straight_line_keeps_heading() {
        let mut vehicle = Vehicle::new(VehicleParams::default(), Pose::new(1.0, -2.0, FRAC_PI_4));
        vehicle.advance(0.0, 1.3);

        // Expected: x = 1 + 5*cos(π/4)*1.3, y = -2 + 5*sin(π/4)*1.3
        let distance = 5.0 * 1.3;
        let expected_x = 1.0 + distance * FRAC_PI_4.cos();
        let expected_y = -2.0 + distance * FRAC_PI_4.sin();
        assert_eq!(vehicle.heading(), FRAC_PI_4);
        assert!(((vehicle.x_position() - expected_x) / expected_x).abs() < EPSILON);
        assert!(((vehicle.y_position() - expected_y) / expected_y).abs() < EPSILON);
    }

    #[test]
    fn test_zero_duration_is_identity() {
        let mut vehicle = scenario_vehicle();
        let before = vehicle.pose();
        vehicle.advance(0.3, 0.0);
        assert_eq!(vehicle.pose(), before);
    }

    #[test]
    fn test_concrete_scenario() {
        let mut vehicle = scenario_vehicle();
        vehicle.advance(0.1, 0.01);

        // Constant steering gives a circular arc: θ = ωT, x = (v/ω) sin θ, y = y0 + (v/ω)(1 - cos θ)
        let omega = 5.0 * 0.1f64.tan() / 2.3;
        let theta = omega * 0.01;
        let radius = 5.0 / omega;
        assert!((vehicle.heading() - theta).abs() < 1e-12);
        assert!((vehicle.x_position() - radius * theta.sin()).abs() < 1e-9);
        assert!((vehicle.y_position() - (0.5 + radius * (1.0 - theta.cos()))).abs() < 1e-9);

        assert!((vehicle.heading() - 0.002181).abs() < 1e-4);
        assert!((vehicle.x_position() - 0.05).abs() < 1e-4);
        assert!((vehicle.y_position() - 0.500055).abs() < 1e-4);
    }

    #[test]
    fn test_constant_curvature_traces_circle() {
        let steering = 0.2;
        let dt = 0.01;
        let steps = 200;
        let mut vehicle = Vehicle::default();
        for _ in 0..steps {
            vehicle.advance(steering, dt);
        }

        let total_time = dt * steps as f64;
        let expected_heading = 5.0 * steering.tan() / 2.3 * total_time;
        assert!((vehicle.heading() - expected_heading).abs() < EPSILON);

        // Left turn from the origin facing +x: circle centered at (0, R)
        let radius = 2.3 / steering.tan();
        let dx = vehicle.x_position();
        let dy = vehicle.y_position() - radius;
        assert!(((dx * dx + dy * dy).sqrt() - radius).abs() < EPSILON);
    }

    #[test]
    fn test_disturbance_is_equivalent_to_offset_command() {
        let disturbance = 0.05;
        let mut biased = Vehicle::new(
            VehicleParams::default().with_steering_disturbance(disturbance),
            Pose::new(0.0, 0.5, 0.0),
        );
        let mut offset = scenario_vehicle();

        for angle in [0.1, -0.2, 0.0, 0.3] {
            biased.advance(angle, 0.05);
            offset.advance(angle + disturbance, 0.05);
        }
        assert!((biased.x_position() - offset.x_position()).abs() < 1e-12);
        assert!((biased.y_position() - offset.y_position()).abs() < 1e-12);
        assert!((biased.heading() - offset.heading()).abs() < 1e-12);
    }

    #[test]
    fn test_steering_sign_convention() {
        let mut left = Vehicle::default();
        left.advance(0.1, 0.5);
        assert!(left.heading() > 0.0);
        assert!(left.y_position() > 0.0);

        let mut right = Vehicle::default();
        right.advance(-0.1, 0.5);
        assert!(right.heading() < 0.0);
        assert!(right.y_position() < 0.0);
    }

    #[test]
    fn test_heading_is_not_wrapped() {
        let mut vehicle = Vehicle::default();
        // ω = 5 tan(0.5) / 2.3 ≈ 1.19 rad/s, so 10 s is well past 2π
        vehicle.advance(0.5, 10.0);
        let expected = 5.0 * 0.5f64.tan() / 2.3 * 10.0;
        assert!(vehicle.heading() > 2.0 * PI);
        assert!((vehicle.heading() - expected).abs() < EPSILON);
    }

    #[test]
    fn test_long_duration_stays_on_circle() {
        let steering = 0.5;
        let duration = 20_000.0;
        let mut vehicle = Vehicle::default();
        vehicle.advance(steering, duration);

        let radius = 2.3 / steering.tan();
        let theta = 5.0 * steering.tan() / 2.3 * duration;
        assert!(((vehicle.heading() - theta) / theta).abs() < 1e-9);

        let dx = vehicle.x_position();
        let dy = vehicle.y_position() - radius;
        assert!(((dx * dx + dy * dy).sqrt() - radius).abs() < 1e-3);
        assert!((vehicle.x_position() - radius * theta.sin()).abs() < 1e-2);
        assert!((vehicle.y_position() - radius * (1.0 - theta.cos())).abs() < 1e-2);
    }

    #[test]
    fn test_state_is_replaced_between_calls() {
        let mut split = scenario_vehicle();
        split.advance(0.1, 0.5);
        split.advance(0.1, 0.5);

        let mut whole = scenario_vehicle();
        whole.advance(0.1, 1.0);

        assert!((split.x_position() - whole.x_position()).abs() < 1e-8);
        assert!((split.y_position() - whole.y_position()).abs() < 1e-8);
        assert!((split.heading() - whole.heading()).abs() < 1e-8);
    }

    #[test]
    fn test_zero_length_propagates_non_finite() {
        let mut vehicle = Vehicle::new(VehicleParams::new(0.0, 5.0), Pose::default());
        vehicle.advance(0.1, 0.01);
        assert!(!vehicle.heading().is_finite());
        assert!(!vehicle.pose().is_finite());
    }

    #[test]
    fn test_steering_at_right_angle_does_not_hang() {
        let mut vehicle = Vehicle::default().with_integrator(Dopri5::default().with_max_steps(1_000));
        vehicle.advance(FRAC_PI_2, 0.01);
        let expected = 5.0 * FRAC_PI_2.tan() / 2.3 * 0.01;
        assert!(((vehicle.heading() - expected) / expected).abs() < EPSILON);
        assert!(vehicle.x_position().is_finite());
        assert!(vehicle.y_position().is_finite());
    }

    #[test]
    fn test_negative_duration_leaves_pose_unchanged() {
        let mut vehicle = scenario_vehicle();
        vehicle.advance(0.1, -1.0);
        assert_eq!(vehicle.pose(), Pose::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn test_checked_advance() {
        let mut vehicle = scenario_vehicle();
        assert!(matches!(
            vehicle.checked_advance(0.1, -0.1),
            Err(KinematicsError::NegativeTimeDelta("must be non-negative"))
        ));
        assert!(matches!(
            vehicle.checked_advance(0.1, f64::NAN),
            Err(KinematicsError::NonFiniteTimeDelta("must be finite"))
        ));
        assert_eq!(vehicle.pose(), Pose::new(0.0, 0.5, 0.0));

        vehicle.checked_advance(0.0, 1.0).unwrap();
        assert!((vehicle.x_position() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_validate() {
        assert!(VehicleParams::default().validate().is_ok());
        assert!(matches!(
            VehicleParams::new(0.0, 5.0).validate(),
            Err(KinematicsError::InvalidLength("must be non-zero"))
        ));
        assert!(matches!(
            VehicleParams::new(f64::INFINITY, 5.0).validate(),
            Err(KinematicsError::InvalidLength("must be finite"))
        ));
        assert!(matches!(
            VehicleParams::new(2.3, f64::NAN).validate(),
            Err(KinematicsError::InvalidSpeed("must be finite"))
        ));
        assert!(matches!(
            VehicleParams::default().with_steering_disturbance(f64::NAN).validate(),
            Err(KinematicsError::InvalidSteeringDisturbance("must be finite"))
        ));
        // Negative wheelbase and speed are unusual but mathematically well defined.
        assert!(VehicleParams::new(-2.3, -5.0).validate().is_ok());
    }

    #[test]
    fn test_try_new() {
        assert!(Vehicle::try_new(VehicleParams::default(), Pose::default()).is_ok());
        assert!(matches!(
            Vehicle::try_new(VehicleParams::new(0.0, 5.0), Pose::default()),
            Err(KinematicsError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_rk4_agrees_with_dopri5() {
        let mut adaptive = scenario_vehicle();
        let mut fixed = scenario_vehicle().with_integrator(Rk4::default());
        for _ in 0..50 {
            adaptive.advance(0.25, 0.02);
            fixed.advance(0.25, 0.02);
        }
        assert!((adaptive.x_position() - fixed.x_position()).abs() < 1e-9);
        assert!((adaptive.y_position() - fixed.y_position()).abs() < 1e-9);
        assert!((adaptive.heading() - fixed.heading()).abs() < 1e-9);
    }

    #[test]
    fn test_sample_count_does_not_change_final_state() {
        let mut coarse = scenario_vehicle().with_sample_count(0);
        let mut fine = scenario_vehicle().with_sample_count(1_000);
        assert_eq!(coarse.sample_count(), 2);
        coarse.advance(0.2, 0.3);
        fine.advance(0.2, 0.3);
        assert!((coarse.x_position() - fine.x_position()).abs() < 1e-7);
        assert!((coarse.y_position() - fine.y_position()).abs() < 1e-7);
        assert!((coarse.heading() - fine.heading()).abs() < 1e-7);
    }

    #[test]
    fn test_display() {
        let vehicle = scenario_vehicle();
        assert_eq!(
            format!("{}", vehicle.pose()),
            "(x: 0.000, y: 0.500, θ: 0.000 rad)"
        );
        assert_eq!(
            format!("{}", vehicle.params()),
            "VehicleParams (L: 2.30 m, v: 5.00 m/s, δ_bias: 0.0000 rad)"
        );
    }
}
