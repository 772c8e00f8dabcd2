use bicycle_control::Controller;
use bicycle_kinematics::{Integrator, Pose, Vehicle};
use tracing::{debug, info, warn};

/// One point of a closed-loop run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Simulation time (s).
    pub t: f64,
    /// Vehicle pose at `t`.
    pub pose: Pose,
    /// Steering command that was applied over the interval ending at `t`.
    /// Zero for the initial sample.
    pub steering: f64,
}

/// Time series produced by [`run`]. The model keeps no history, so this is
/// the only record of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub fn with_capacity(capacity: usize) -> Self {
        Trajectory {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn final_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// `(t, y)` pairs, the series plotted by the graphics module.
    pub fn lateral_series(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples.iter().map(|s| (s.t, s.pose.y))
    }

    /// Largest `|y - target|` seen; NaN samples are skipped.
    pub fn max_lateral_error(&self, target: f64) -> f64 {
        self.samples
            .iter()
            .map(|s| (s.pose.y - target).abs())
            .filter(|e| !e.is_nan())
            .fold(0.0, f64::max)
    }

    /// First time after which `y` stays within `tolerance` of `target` for the
    /// rest of the run. `None` if the final sample is still outside the band.
    pub fn settling_time(&self, target: f64, tolerance: f64) -> Option<f64> {
        let inside = |s: &Sample| (s.pose.y - target).abs() <= tolerance;
        match self.samples.iter().rposition(|s| !inside(s)) {
            None => self.samples.first().map(|s| s.t),
            Some(last_outside) => self.samples.get(last_outside + 1).map(|s| s.t),
        }
    }
}

/// Runs the closed loop: every `dt` the controller reads the lateral position
/// and the vehicle is advanced under the returned steering angle.
///
/// Returns `steps + 1` samples including the initial pose. A non-finite pose
/// is reported once and the loop keeps going; the model does not guard
/// against it.
pub fn run<I, C>(vehicle: &mut Vehicle<I>, controller: &mut C, dt: f64, steps: usize) -> Trajectory
where
    I: Integrator,
    C: Controller,
{
    info!(dt, steps, initial = %vehicle.pose(), "Starting closed-loop simulation");

    let mut trajectory = Trajectory::with_capacity(steps + 1);
    trajectory.push(Sample {
        t: 0.0,
        pose: vehicle.pose(),
        steering: 0.0,
    });

    let mut reported_non_finite = false;
    for step in 1..=steps {
        let steering = controller.control(vehicle.y_position());
        vehicle.advance(steering, dt);

        let pose = vehicle.pose();
        let t = dt * step as f64;
        debug!(step, t, x = pose.x, y = pose.y, theta = pose.theta, steering, "Advanced vehicle");

        if !pose.is_finite() && !reported_non_finite {
            warn!(step, t, %pose, steering, "Vehicle pose became non-finite");
            reported_non_finite = true;
        }
        trajectory.push(Sample { t, pose, steering });
    }

    if let Some(last) = trajectory.final_sample() {
        info!(t = last.t, pose = %last.pose, "Simulation finished");
    }
    trajectory
}
