use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_double_support_ratio() -> f64 {
    0.2
}
const fn default_startend_double_support_ratio() -> f64 {
    1.5
}
const fn default_planned_timesteps() -> usize {
    48
}
const fn default_replan_timesteps() -> usize {
    10
}
const fn default_com_height() -> f64 {
    0.15
}
const fn default_foot_height() -> f64 {
    0.006
}
const fn default_foot_rise_ratio() -> f64 {
    0.2
}
const fn default_single_support_duration() -> f64 {
    0.2
}
const fn default_single_support_timesteps() -> usize {
    10
}
const fn default_foot_length() -> f64 {
    0.06
}
const fn default_foot_width() -> f64 {
    0.006
}
const fn default_feet_spacing() -> f64 {
    0.12
}
const fn default_zmp_reference_weight() -> f64 {
    1.0
}
const fn default_jerk_weight() -> f64 {
    1e-8
}
const fn default_max_dtheta() -> f64 {
    1.0
}
const fn default_max_dy() -> f64 {
    0.1
}
const fn default_max_dx_forward() -> f64 {
    0.08
}
const fn default_max_dx_backward() -> f64 {
    0.03
}
const fn default_control_dt() -> f64 {
    0.01
}
const fn default_refine() -> usize {
    10
}
const fn default_initial_delay() -> f64 {
    1.0
}
const fn default_velocity_limit() -> f64 {
    12.0
}
const fn default_warmup_tolerance() -> f64 {
    1e-3
}
const fn default_max_warmup_ticks() -> u32 {
    500
}
const fn default_one() -> f64 {
    1.0
}
const fn default_feet_weight() -> f64 {
    10.0
}
const fn default_regularization() -> f64 {
    1e-6
}

/// Gravity acceleration used by the pendulum model, in m/s^2.
pub const GRAVITY: f64 = 9.81;

// ---------------------------------------------------------------------------
// WalkParameters
// ---------------------------------------------------------------------------

/// Gait and footstep knobs consumed by the planner and trajectory generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkParameters {
    /// Double support duration as a fraction of single support.
    #[serde(default = "default_double_support_ratio")]
    pub double_support_ratio: f64,

    /// Duration of the first and last double supports, as a fraction of single support.
    #[serde(default = "default_startend_double_support_ratio")]
    pub startend_double_support_ratio: f64,

    /// CoM planning horizon, in planning timesteps.
    #[serde(default = "default_planned_timesteps")]
    pub planned_timesteps: usize,

    /// Minimum number of control ticks between two replans.
    #[serde(default = "default_replan_timesteps")]
    pub replan_timesteps: usize,

    /// Constant CoM height above the floor [m].
    #[serde(default = "default_com_height")]
    pub walk_com_height: f64,

    /// Swing foot apex height [m].
    #[serde(default = "default_foot_height")]
    pub walk_foot_height: f64,

    /// Trunk pitch while walking [rad].
    #[serde(default)]
    pub walk_trunk_pitch: f64,

    /// Fraction of the swing spent on the height plateau.
    #[serde(default = "default_foot_rise_ratio")]
    pub walk_foot_rise_ratio: f64,

    /// Duration of one single support [s].
    #[serde(default = "default_single_support_duration")]
    pub single_support_duration: f64,

    /// Planning timesteps per single support.
    #[serde(default = "default_single_support_timesteps")]
    pub single_support_timesteps: usize,

    /// Footprint length along the sole x axis [m].
    #[serde(default = "default_foot_length")]
    pub foot_length: f64,

    /// Footprint width along the sole y axis [m].
    #[serde(default = "default_foot_width")]
    pub foot_width: f64,

    /// Lateral distance between the feet centres [m].
    #[serde(default = "default_feet_spacing")]
    pub feet_spacing: f64,

    /// Inward margin applied to support polygons for the ZMP constraint [m].
    #[serde(default)]
    pub zmp_margin: f64,

    /// Weight of the ZMP reference tracking term in the CoM QP.
    #[serde(default = "default_zmp_reference_weight")]
    pub zmp_reference_weight: f64,

    /// Weight of the jerk regularisation in the CoM QP.
    #[serde(default = "default_jerk_weight")]
    pub jerk_weight: f64,

    /// Maximum turn per step [rad].
    #[serde(default = "default_max_dtheta")]
    pub walk_max_dtheta: f64,

    /// Maximum lateral displacement per step [m].
    #[serde(default = "default_max_dy")]
    pub walk_max_dy: f64,

    /// Maximum forward displacement per step [m].
    #[serde(default = "default_max_dx_forward")]
    pub walk_max_dx_forward: f64,

    /// Maximum backward displacement per step [m].
    #[serde(default = "default_max_dx_backward")]
    pub walk_max_dx_backward: f64,
}

impl Default for WalkParameters {
    fn default() -> Self {
        Self {
            double_support_ratio: default_double_support_ratio(),
            startend_double_support_ratio: default_startend_double_support_ratio(),
            planned_timesteps: default_planned_timesteps(),
            replan_timesteps: default_replan_timesteps(),
            walk_com_height: default_com_height(),
            walk_foot_height: default_foot_height(),
            walk_trunk_pitch: 0.0,
            walk_foot_rise_ratio: default_foot_rise_ratio(),
            single_support_duration: default_single_support_duration(),
            single_support_timesteps: default_single_support_timesteps(),
            foot_length: default_foot_length(),
            foot_width: default_foot_width(),
            feet_spacing: default_feet_spacing(),
            zmp_margin: 0.0,
            zmp_reference_weight: default_zmp_reference_weight(),
            jerk_weight: default_jerk_weight(),
            walk_max_dtheta: default_max_dtheta(),
            walk_max_dy: default_max_dy(),
            walk_max_dx_forward: default_max_dx_forward(),
            walk_max_dx_backward: default_max_dx_backward(),
        }
    }
}

impl WalkParameters {
    /// Validate parameters. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("single_support_duration", self.single_support_duration)?;
        positive("walk_com_height", self.walk_com_height)?;
        positive("foot_length", self.foot_length)?;
        positive("foot_width", self.foot_width)?;
        positive("feet_spacing", self.feet_spacing)?;
        non_negative("double_support_ratio", self.double_support_ratio)?;
        non_negative("startend_double_support_ratio", self.startend_double_support_ratio)?;
        non_negative("walk_foot_height", self.walk_foot_height)?;
        non_negative("zmp_margin", self.zmp_margin)?;
        non_negative("zmp_reference_weight", self.zmp_reference_weight)?;
        positive("jerk_weight", self.jerk_weight)?;
        non_negative("walk_max_dtheta", self.walk_max_dtheta)?;
        non_negative("walk_max_dy", self.walk_max_dy)?;
        non_negative("walk_max_dx_forward", self.walk_max_dx_forward)?;
        non_negative("walk_max_dx_backward", self.walk_max_dx_backward)?;
        if self.single_support_timesteps == 0 {
            return Err(ConfigError::invalid("single_support_timesteps", "must be >= 1"));
        }
        if self.planned_timesteps == 0 {
            return Err(ConfigError::invalid("planned_timesteps", "must be >= 1"));
        }
        if !(0.0..1.0).contains(&self.walk_foot_rise_ratio) {
            return Err(ConfigError::invalid(
                "walk_foot_rise_ratio",
                format!("{} is outside [0, 1)", self.walk_foot_rise_ratio),
            ));
        }
        if self.startend_double_support_timesteps() == 0 {
            return Err(ConfigError::invalid(
                "startend_double_support_ratio",
                "start and end double supports must last at least one timestep",
            ));
        }
        if 2.0 * self.zmp_margin >= self.foot_width {
            return Err(ConfigError::invalid(
                "zmp_margin",
                "margin leaves an empty single support polygon",
            ));
        }
        Ok(())
    }

    /// Planning timestep [s].
    #[allow(clippy::cast_precision_loss)]
    pub fn dt(&self) -> f64 {
        self.single_support_duration / self.single_support_timesteps as f64
    }

    /// Planning timesteps per intermediate double support.
    pub fn double_support_timesteps(&self) -> usize {
        self.ratio_timesteps(self.double_support_ratio)
    }

    /// Planning timesteps of the first and last double supports.
    pub fn startend_double_support_timesteps(&self) -> usize {
        self.ratio_timesteps(self.startend_double_support_ratio)
    }

    /// Duration of an intermediate double support [s].
    #[allow(clippy::cast_precision_loss)]
    pub fn double_support_duration(&self) -> f64 {
        self.double_support_timesteps() as f64 * self.dt()
    }

    /// Duration of the first and last double supports [s].
    #[allow(clippy::cast_precision_loss)]
    pub fn startend_double_support_duration(&self) -> f64 {
        self.startend_double_support_timesteps() as f64 * self.dt()
    }

    /// Whether intermediate double supports are inserted between steps.
    pub fn has_double_support(&self) -> bool {
        self.double_support_timesteps() > 0
    }

    /// Time covered by one CoM plan [s].
    #[allow(clippy::cast_precision_loss)]
    pub fn planning_horizon(&self) -> f64 {
        self.planned_timesteps as f64 * self.dt()
    }

    /// Duration of a full gait cycle (two steps) [s].
    pub fn gait_period(&self) -> f64 {
        2.0 * (self.single_support_duration + self.double_support_duration())
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn ratio_timesteps(&self, ratio: f64) -> usize {
        (ratio * self.single_support_timesteps as f64).round().max(0.0) as usize
    }
}

// ---------------------------------------------------------------------------
// JointLimitsConfig
// ---------------------------------------------------------------------------

/// Per-joint `[lower, upper]` position limit overrides [rad].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimitsConfig {
    #[serde(default)]
    pub per_joint: HashMap<String, [f64; 2]>,
}

impl Default for JointLimitsConfig {
    fn default() -> Self {
        let per_joint = [("left_knee", [-2.0, -0.01]), ("right_knee", [-2.0, -0.01])]
            .into_iter()
            .map(|(name, limits)| (name.to_string(), limits))
            .collect();
        Self { per_joint }
    }
}

// ---------------------------------------------------------------------------
// TaskWeights
// ---------------------------------------------------------------------------

/// Soft task weights of the walking IK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWeights {
    #[serde(default = "default_feet_weight")]
    pub feet: f64,
    #[serde(default = "default_one")]
    pub com: f64,
    #[serde(default = "default_one")]
    pub trunk_orientation: f64,
    #[serde(default = "default_one")]
    pub joints: f64,
    /// Tikhonov term keeping the IK step bounded.
    #[serde(default = "default_regularization")]
    pub regularization: f64,
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            feet: default_feet_weight(),
            com: default_one(),
            trunk_orientation: default_one(),
            joints: default_one(),
            regularization: default_regularization(),
        }
    }
}

// ---------------------------------------------------------------------------
// ControlConfig
// ---------------------------------------------------------------------------

/// Outer control loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Control period DT [s].
    #[serde(default = "default_control_dt")]
    pub dt: f64,

    /// IK sub-steps per control tick.
    #[serde(default = "default_refine")]
    pub refine: usize,

    /// Standing time before the first step once warm-up is done [s].
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,

    /// Joint velocity limit applied by the IK [rad/s].
    #[serde(default = "default_velocity_limit")]
    pub velocity_limit: f64,

    /// Pose error under which the warm-up is considered complete [m, rad].
    #[serde(default = "default_warmup_tolerance")]
    pub warmup_tolerance: f64,

    /// Warm-up gives up converging after this many ticks.
    #[serde(default = "default_max_warmup_ticks")]
    pub max_warmup_ticks: u32,

    #[serde(default)]
    pub joint_limits: JointLimitsConfig,

    #[serde(default)]
    pub weights: TaskWeights,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dt: default_control_dt(),
            refine: default_refine(),
            initial_delay: default_initial_delay(),
            velocity_limit: default_velocity_limit(),
            warmup_tolerance: default_warmup_tolerance(),
            max_warmup_ticks: default_max_warmup_ticks(),
            joint_limits: JointLimitsConfig::default(),
            weights: TaskWeights::default(),
        }
    }
}

impl ControlConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidTimestep(self.dt));
        }
        if self.refine == 0 {
            return Err(ConfigError::invalid("refine", "must be >= 1"));
        }
        non_negative("initial_delay", self.initial_delay)?;
        positive("velocity_limit", self.velocity_limit)?;
        positive("warmup_tolerance", self.warmup_tolerance)?;
        for (name, [lower, upper]) in &self.joint_limits.per_joint {
            if !(lower.is_finite() && upper.is_finite()) || lower > upper {
                return Err(ConfigError::invalid(
                    format!("joint_limits.{name}"),
                    format!("[{lower}, {upper}] is not a valid interval"),
                ));
            }
        }
        Ok(())
    }

    /// IK sub-step duration [s].
    #[allow(clippy::cast_precision_loss)]
    pub fn ik_dt(&self) -> f64 {
        self.dt / self.refine as f64
    }

    /// Control rate in Hz.
    pub fn control_hz(&self) -> f64 {
        1.0 / self.dt
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Complete, immutable configuration handed to the walk engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub walk: WalkParameters,
    #[serde(default)]
    pub control: ControlConfig,
}

impl EngineConfig {
    /// Validate both sections.
    ///
    /// The engine must get a chance to replan before the CoM plan runs out:
    /// a replan lands at most one tick after `replan_period`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.walk.validate()?;
        self.control.validate()?;
        let horizon = self.walk.planning_horizon();
        if self.replan_period() + self.control.dt >= horizon {
            return Err(ConfigError::invalid(
                "replan_timesteps",
                format!(
                    "replanning every {:.3} s outlasts the {horizon:.3} s CoM horizon",
                    self.replan_period()
                ),
            ));
        }
        Ok(())
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Replans happen at most every `replan_timesteps` control ticks [s].
    #[allow(clippy::cast_precision_loss)]
    pub fn replan_period(&self) -> f64 {
        self.walk.replan_timesteps as f64 * self.control.dt
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be > 0")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be >= 0")))
    }
}
