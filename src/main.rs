mod config; // brings `config.rs` in as `crate::config`
mod graphics; // y(t) plot window
mod simulation; // closed-loop orchestration

use std::path::PathBuf;

use anyhow::Context;
use bicycle_kinematics::{Dopri5, Rk4, Vehicle};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

use crate::config::{DEFAULT_CONFIG_PATH, IntegratorKind, SimConfig, load_config};
use crate::simulation::Trajectory;

/// Closed-loop lateral control of a bicycle-model vehicle.
#[derive(Parser, Debug)]
#[command(name = "bicycle-sim")]
#[command(about = "Simulate a PID-steered bicycle-model vehicle", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to config/default.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of controller steps
    #[arg(short, long)]
    steps: Option<usize>,

    /// Override the sampling interval in seconds
    #[arg(long)]
    dt: Option<f64>,

    /// Open a window plotting y over time after the run
    #[arg(short, long)]
    plot: bool,

    /// Log every simulation step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Bicycle Sim started.");

    let (path, required) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let mut config = load_config(&path, required)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    if let Some(steps) = args.steps {
        config.simulation.steps = steps;
    }
    if let Some(dt) = args.dt {
        config.simulation.dt = dt;
    }
    config.validate()?;

    let trajectory = simulate(&config);
    report(&config, &trajectory);

    if args.plot {
        let series = trajectory.lateral_series().collect();
        macroquad::Window::from_config(
            graphics::window_conf(),
            graphics::run_plot_loop(series, config.controller.setpoint),
        );
    }

    Ok(())
}

/// Builds the vehicle and controller described by `config` and runs the loop.
fn simulate(config: &SimConfig) -> Trajectory {
    let vehicle = Vehicle::new(config.vehicle.params(), config.vehicle.initial_pose())
        .with_sample_count(config.integrator.sample_count);
    let mut controller = config.controller.build(config.simulation.dt);
    info!(params = %vehicle.params(), controller = %controller, integrator = ?config.integrator.kind, "Vehicle and controller configured");

    let (dt, steps) = (config.simulation.dt, config.simulation.steps);
    match config.integrator.kind {
        IntegratorKind::Dopri5 => {
            let integrator = Dopri5::new(config.integrator.rtol, config.integrator.atol)
                .with_max_steps(config.integrator.max_steps);
            simulation::run(&mut vehicle.with_integrator(integrator), &mut controller, dt, steps)
        }
        IntegratorKind::Rk4 => {
            let integrator = Rk4::new(config.integrator.steps_per_sample);
            simulation::run(&mut vehicle.with_integrator(integrator), &mut controller, dt, steps)
        }
    }
}

fn report(config: &SimConfig, trajectory: &Trajectory) {
    let setpoint = config.controller.setpoint;
    let Some(last) = trajectory.final_sample() else {
        return;
    };
    if !last.pose.is_finite() {
        warn!(pose = %last.pose, "Run ended with a non-finite pose; check vehicle parameters and steering range");
        return;
    }

    let settling = trajectory.settling_time(setpoint, config.simulation.settling_tolerance);
    info!(
        samples = trajectory.len(),
        t = last.t,
        x = last.pose.x,
        y = last.pose.y,
        heading = last.pose.theta,
        max_lateral_error = trajectory.max_lateral_error(setpoint),
        settling_time = ?settling,
        "Closed-loop summary"
    );
    if settling.is_none() {
        warn!(
            tolerance = config.simulation.settling_tolerance,
            "Lateral position did not settle within tolerance"
        );
    }
}
