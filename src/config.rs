use std::path::Path;

use anyhow::{Context, ensure};
use bicycle_control::{PidController, PidGains};
use bicycle_kinematics::{DEFAULT_SAMPLE_COUNT, Pose, VehicleParams};
use config::{Config, ConfigError, Environment, File, FileFormat, Source};
use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment overrides look like `BICYCLE_SIM__VEHICLE__SPEED=7.5`.
const ENV_PREFIX: &str = "BICYCLE_SIM";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub vehicle: VehicleConfig,
    pub integrator: IntegratorConfig,
    pub controller: ControllerConfig,
    pub simulation: LoopConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub length: f64,
    pub speed: f64,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub steering_disturbance: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let params = VehicleParams::default();
        VehicleConfig {
            length: params.length(),
            speed: params.speed(),
            x: 0.0,
            y: 0.5,
            heading: 0.0,
            steering_disturbance: 0.0,
        }
    }
}

impl VehicleConfig {
    pub fn params(&self) -> VehicleParams {
        VehicleParams::new(self.length, self.speed).with_steering_disturbance(self.steering_disturbance)
    }

    pub fn initial_pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.heading)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegratorKind {
    #[default]
    Dopri5,
    Rk4,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    pub kind: IntegratorKind,
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
    pub steps_per_sample: usize,
    pub sample_count: usize,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig {
            kind: IntegratorKind::Dopri5,
            rtol: 1e-9,
            atol: 1e-12,
            max_steps: 10_000,
            steps_per_sample: 4,
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub setpoint: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            kp: 1.0,
            ki: 0.0,
            kd: 0.2,
            setpoint: 0.0,
        }
    }
}

impl ControllerConfig {
    pub fn build(&self, sampling_interval: f64) -> PidController {
        PidController::new(sampling_interval)
            .with_gains(PidGains {
                kp: self.kp,
                ki: self.ki,
                kd: self.kd,
            })
            .with_setpoint(self.setpoint)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Sampling interval between controller updates (s).
    pub dt: f64,
    pub steps: usize,
    /// Band around the setpoint used for the reported settling time (m).
    pub settling_tolerance: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            dt: 0.01,
            steps: 2000,
            settling_tolerance: 0.01,
        }
    }
}

impl SimConfig {
    /// Rejects configurations the simulation loop cannot run meaningfully.
    /// The vehicle model itself accepts anything; this is the caller-side check.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.vehicle
            .params()
            .validate()
            .context("invalid [vehicle] section")?;
        ensure!(
            self.simulation.dt.is_finite() && self.simulation.dt > 0.0,
            "simulation.dt must be positive, got {}",
            self.simulation.dt
        );
        ensure!(self.simulation.steps > 0, "simulation.steps must be at least 1");
        ensure!(
            self.integrator.rtol >= 0.0 && self.integrator.atol >= 0.0,
            "integrator tolerances must be non-negative"
        );
        ensure!(
            self.integrator.rtol > 0.0 || self.integrator.atol > 0.0,
            "at least one integrator tolerance must be positive"
        );
        Ok(())
    }
}

/// Loads the simulation configuration from a TOML file, then applies
/// environment overrides. Missing keys fall back to defaults.
///
/// A missing file is an error only when `required` is set.
pub fn load_config(path: &Path, required: bool) -> Result<SimConfig, ConfigError> {
    info!(path = %path.display(), required, "Attempting to load configuration");

    let settings = build(File::from(path).format(FileFormat::Toml).required(required));

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

fn build<S>(file: S) -> Result<SimConfig, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
