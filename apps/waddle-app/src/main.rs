//! Waddle walk engine CLI.
//!
//! Provides three modes of operation:
//! - `plan`: print the footsteps and supports for a step command
//! - `walk`: run the engine headless (or paced in real time) and report
//! - `check-config`: load and validate a TOML configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use waddle_core::prelude::*;
use waddle_ik::HumanoidRobot;
use waddle_model::{LEFT_FOOT_FRAME, RIGHT_FOOT_FRAME, TRUNK_FRAME, duck_biped, parse_file};
use waddle_sensor::{DelaySimulator, ImuDelay, ImuSample};
use waddle_walk::footsteps::planar_pose;
use waddle_walk::support::schedule;
use waddle_walk::{EngineState, FeetContact, Footstep, WalkCommand, WalkEngine, make_supports};

/// Height under which a planned foot counts as touching the floor [m].
const CONTACT_HEIGHT: f64 = 5e-4;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Footstep-driven biped walk engine.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log filter (e.g. `debug`, `waddle_walk=trace`); defaults to `RUST_LOG`, then `info`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StartSide {
    Left,
    Right,
}

impl From<StartSide> for Side {
    fn from(side: StartSide) -> Self {
        match side {
            StartSide::Left => Self::Left,
            StartSide::Right => Self::Right,
        }
    }
}

/// Step command shared by `plan` and `walk`.
#[derive(clap::Args)]
struct StepArgs {
    /// Forward displacement per step [m].
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    dx: f64,

    /// Lateral displacement per step [m].
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    dy: f64,

    /// Heading change per step [rad].
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    dtheta: f64,

    /// Number of steps before the closing step.
    #[arg(long, default_value_t = 5)]
    steps: usize,
}

impl StepArgs {
    const fn command(&self) -> WalkCommand {
        WalkCommand::new(self.dx, self.dy, self.dtheta, self.steps)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the footsteps and supports planned for a step command.
    Plan {
        #[command(flatten)]
        step: StepArgs,

        /// Side considered to have stepped last; the other foot steps first.
        #[arg(long, value_enum, default_value = "left")]
        start_side: StartSide,

        /// Engine configuration (TOML). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run the walk engine and report CoM drift, faults and IK failures.
    Walk {
        #[command(flatten)]
        step: StepArgs,

        /// Engine configuration (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Robot description; the built-in duck biped when omitted.
        #[arg(long)]
        urdf: Option<PathBuf>,

        /// Walking time after warm-up [s].
        #[arg(short, long, default_value_t = 5.0)]
        duration: f64,

        /// Pace ticks against the wall clock.
        #[arg(long)]
        realtime: bool,

        /// Latency of the simulated contact and IMU sensors [ms].
        #[arg(long, default_value_t = 0)]
        sensor_delay_ms: u64,
    },

    /// Load and validate a configuration file.
    CheckConfig {
        /// Path to the TOML file.
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run_plan(step: &StepArgs, start_side: Side, config: Option<&Path>) -> Result<()> {
    let params = load_config(config)?.walk;
    let command = step.command().clamped(&params);
    let mut planner = waddle_walk::RepetitiveFootstepsPlanner::new(params.clone());
    planner.configure(command.dx, command.dy, command.dtheta, command.steps);

    let half = 0.5 * params.feet_spacing;
    let left = Footstep::new(Side::Left, planar_pose(0.0, half, 0.0), &params);
    let right = Footstep::new(Side::Right, planar_pose(0.0, -half, 0.0), &params);
    let footsteps = planner.plan(start_side, &left.frame, &right.frame);

    println!(
        "command: dx={:.3} dy={:.3} dtheta={:.3} steps={}",
        command.dx, command.dy, command.dtheta, command.steps
    );
    println!("\nfootsteps:");
    for (i, footstep) in footsteps.iter().enumerate() {
        let xy = footstep.xy();
        println!(
            "  {i:>2} {:<5} x={:+.3} y={:+.3} yaw={:+.3}",
            footstep.side,
            xy.x,
            xy.y,
            footstep.yaw()
        );
    }

    let mut supports = make_supports(left, right, &footsteps, true, params.has_double_support(), true);
    schedule(&mut supports, 0, 0.0, &params);
    println!("\nsupports:");
    for (i, support) in supports.iter().enumerate() {
        let tag = match (support.start, support.end) {
            (true, _) => " start",
            (_, true) => " end",
            _ => "",
        };
        println!(
            "  {i:>2} {:<5} t=[{:.2}, {:.2}]{tag}",
            support.side(),
            support.t_start,
            support.t_end()
        );
    }
    Ok(())
}

/// Feet touching the floor according to the planned trajectory.
fn planned_contact(engine: &WalkEngine) -> (bool, bool) {
    engine.trajectory().map_or((true, true), |trajectory| {
        let t = engine.t();
        (
            trajectory.right_foot(t).translation.z <= CONTACT_HEIGHT,
            trajectory.left_foot(t).translation.z <= CONTACT_HEIGHT,
        )
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]
fn run_walk(
    step: &StepArgs,
    config: Option<&Path>,
    urdf: Option<&Path>,
    duration: f64,
    realtime: bool,
    sensor_delay_ms: u64,
    stop: &AtomicBool,
) -> Result<()> {
    let config = load_config(config)?;
    let model = match urdf {
        Some(path) => parse_file(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => duck_biped()?,
    };
    let robot = HumanoidRobot::new(model)?;
    let dt = config.control.dt;
    let max_warmup = u64::from(config.control.max_warmup_ticks);
    let walking_ticks = (duration.max(0.0) / dt).ceil() as u64;

    let mut engine = WalkEngine::new(config, robot)?;
    engine.set_command(step.command());
    let sensor_delay = Duration::from_millis(sensor_delay_ms);
    let mut contacts = DelaySimulator::<(bool, bool)>::new(sensor_delay);
    let mut imu = ImuDelay::new(sensor_delay);
    let mut trunk = engine.robot().frame_pose(TRUNK_FRAME)?.rotation;
    let mut max_tilt = 0.0_f64;
    let mut pacer = realtime.then(|| Pacer::new(SystemClock::new()));

    let mut start_com = engine.robot().com_world();
    let mut faults = 0_u32;
    let mut replans = 0_u32;
    let mut ik_failures = 0_u32;
    let mut warmup_ticks = 0_u64;
    let mut walked = 0_u64;

    while walked < walking_ticks && !stop.load(Ordering::SeqCst) {
        let now = Duration::from_secs_f64((warmup_ticks + walked) as f64 * dt);
        contacts.push(planned_contact(&engine), now)?;
        let contact = FeetContact::from(contacts.get(now));

        let previous = engine.state();
        let report = engine.tick(Some(contact))?;
        ik_failures += report.ik_failures;
        if report.replanned {
            replans += 1;
        }
        if report.state.is_faulted() && !previous.is_faulted() {
            faults += 1;
        }

        let orientation = engine.robot().frame_pose(TRUNK_FRAME)?.rotation;
        let rate = (trunk.inverse() * orientation).scaled_axis() / dt;
        trunk = orientation;
        imu.push(ImuSample::new(orientation, [rate.x, rate.y, rate.z]), now)?;
        if let Some(reading) = imu.get(now).without_yaw().rotation() {
            max_tilt = max_tilt.max(reading.angle());
        }

        if previous == EngineState::Warmup {
            warmup_ticks += 1;
            if report.state == EngineState::Warmup {
                if warmup_ticks > max_warmup {
                    anyhow::bail!("engine did not leave warm-up");
                }
            } else {
                start_com = engine.robot().com_world();
                if let Some(pacer) = pacer.as_mut() {
                    pacer.rebase(report.t);
                }
            }
            continue;
        }

        walked += 1;
        if let Some(pacer) = pacer.as_mut() {
            pacer.wait_until(report.t)?;
        }
    }

    let com = engine.robot().com_world();
    let drift = com - start_com;
    info!(t = engine.t(), state = %engine.state(), "walk finished");
    println!("warm-up ticks:  {warmup_ticks}");
    println!("walking ticks:  {walked}");
    println!("final t:        {:.3} s", engine.t());
    println!("final state:    {}", engine.state());
    println!("support phase:  {}", engine.support_phase());
    println!("CoM drift:      dx={:+.4} dy={:+.4} m", drift.x, drift.y);
    println!("replans:        {replans}");
    println!("faults:         {faults}");
    println!("IK failures:    {ik_failures}");
    println!("max trunk tilt: {max_tilt:.4} rad (IMU, {sensor_delay_ms} ms late)");
    for (name, frame) in [("left foot", LEFT_FOOT_FRAME), ("right foot", RIGHT_FOOT_FRAME)] {
        let pose = engine.robot().frame_pose(frame)?;
        println!(
            "{name:<15} x={:+.4} y={:+.4}",
            pose.translation.x, pose.translation.y
        );
    }
    Ok(())
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = load_config(Some(path))?;
    let walk = &config.walk;
    println!("{}: ok", path.display());
    println!("  control rate:      {:.1} Hz (refine {})", config.control.control_hz(), config.control.refine);
    println!("  planning dt:       {:.4} s", walk.dt());
    println!("  single support:    {:.3} s", walk.single_support_duration);
    println!("  double support:    {:.3} s", walk.double_support_duration());
    println!("  start/end support: {:.3} s", walk.startend_double_support_duration());
    println!("  gait period:       {:.3} s", walk.gait_period());
    println!("  replan period:     {:.3} s", config.replan_period());
    println!("  joint overrides:   {}", config.control.joint_limits.per_joint.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Plan {
            step,
            start_side,
            config,
        } => run_plan(&step, start_side.into(), config.as_deref()),
        Commands::Walk {
            step,
            config,
            urdf,
            duration,
            realtime,
            sensor_delay_ms,
        } => {
            let stop = Arc::new(AtomicBool::new(false));
            let handler_stop = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                handler_stop.store(true, Ordering::SeqCst);
            })
            .context("failed to set Ctrl+C handler")?;
            run_walk(
                &step,
                config.as_deref(),
                urdf.as_deref(),
                duration,
                realtime,
                sensor_delay_ms,
                &stop,
            )
        }
        Commands::CheckConfig { path } => run_check_config(&path),
    }
}
