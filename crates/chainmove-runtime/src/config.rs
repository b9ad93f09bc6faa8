//! Chain manager configuration.
//!
//! Read from a TOML document such as:
//!
//! ```toml
//! duration = 5.0
//! velocity_factor = 0.5
//! settling_timeout = 10.0
//!
//! [[chains]]
//! name = "arm"
//! topic = "arm_controller/follow_joint_trajectory"
//! planning_group = "arm"
//! joints = ["shoulder_pan_joint", "elbow_flex_joint"]
//!
//! [[chains]]
//! name = "head"
//! topic = "head_controller/follow_joint_trajectory"
//! joints = ["head_pan_joint", "head_tilt_joint"]
//! ```
//!
//! Scalar parameters can be overridden with `CHAINMOVE_*` environment
//! variables, see [`apply_env_overrides`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use chainmove_types::MotionError;
use serde::{Deserialize, Serialize};

/// One configured kinematic chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unique chain name.
    pub name: String,
    /// Command channel endpoint.
    #[serde(default)]
    pub topic: String,
    /// Planner group; empty for directly actuated chains.
    #[serde(default)]
    pub planning_group: String,
    /// Joints belonging to the chain, in command order.
    #[serde(default)]
    pub joints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainManagerConfig {
    #[serde(default)]
    pub chains: Vec<ChainConfig>,

    /// Time stamp (seconds) given to direct point-to-point moves.  Also the
    /// floor for the dispatch duration.
    #[serde(default = "default_duration")]
    pub duration: f64,

    /// Velocity scaling factor passed to the planner.
    #[serde(default = "default_velocity_factor")]
    pub velocity_factor: f64,

    /// Settling timeout in seconds; `<= 0` disables it.
    #[serde(default)]
    pub settling_timeout: f64,

    /// Seconds to wait for each command channel and the planner to connect.
    #[serde(default = "default_connect_wait")]
    pub connect_wait: f64,

    /// Seconds to wait for a single plan result.
    #[serde(default = "default_plan_timeout")]
    pub plan_timeout: f64,

    /// Seconds between settle checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
}

fn default_duration() -> f64 {
    5.0
}
fn default_velocity_factor() -> f64 {
    1.0
}
fn default_connect_wait() -> f64 {
    5.0
}
fn default_plan_timeout() -> f64 {
    60.0
}
fn default_poll_interval() -> f64 {
    0.01
}

impl Default for ChainManagerConfig {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            duration: default_duration(),
            velocity_factor: default_velocity_factor(),
            settling_timeout: 0.0,
            connect_wait: default_connect_wait(),
            plan_timeout: default_plan_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl ChainManagerConfig {
    /// Parse a TOML document and validate it.
    ///
    /// `CHAINMOVE_*` environment overrides are **not** applied; use
    /// [`from_toml_str_with_env`](Self::from_toml_str_with_env) or
    /// [`load_from`](Self::load_from) for that.
    pub fn from_toml_str(raw: &str) -> Result<Self, MotionError> {
        let cfg = parse(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document, apply environment overrides, then validate.
    pub fn from_toml_str_with_env(raw: &str) -> Result<Self, MotionError> {
        let mut cfg = parse(raw)?;
        apply_env_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read `path`, then behave as
    /// [`from_toml_str_with_env`](Self::from_toml_str_with_env).
    pub fn load_from(path: &Path) -> Result<Self, MotionError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            MotionError::Config(format!("failed to read config at {}: {e}", path.display()))
        })?;
        Self::from_toml_str_with_env(&raw)
    }

    /// Reject configurations that cannot drive a dispatch: duplicate chain
    /// names and timing values that are not representable as a
    /// [`Duration`].
    pub fn validate(&self) -> Result<(), MotionError> {
        for (i, chain) in self.chains.iter().enumerate() {
            if chain.name.is_empty() {
                return Err(MotionError::Config(format!("chain #{i} has no name")));
            }
            if self.chains[..i].iter().any(|c| c.name == chain.name) {
                return Err(MotionError::Config(format!(
                    "chain {} is defined more than once",
                    chain.name
                )));
            }
        }
        let timings = [
            ("duration", self.duration),
            ("connect_wait", self.connect_wait),
            ("plan_timeout", self.plan_timeout),
            ("poll_interval", self.poll_interval),
        ];
        for (name, value) in timings {
            check_duration(name, value)?;
        }
        if !self.settling_timeout.is_finite() {
            return Err(MotionError::Config("settling_timeout must be finite".to_string()));
        }
        if self.settling_timeout > 0.0 {
            check_duration("settling_timeout", self.settling_timeout)?;
        }
        if !self.velocity_factor.is_finite() || self.velocity_factor <= 0.0 {
            return Err(MotionError::Config(format!(
                "velocity_factor must be positive, got {}",
                self.velocity_factor
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration)
    }

    pub fn connect_wait(&self) -> Duration {
        Duration::from_secs_f64(self.connect_wait)
    }

    pub fn plan_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.plan_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }

    /// `None` when the timeout is disabled.
    pub fn settling_timeout(&self) -> Option<Duration> {
        (self.settling_timeout > 0.0).then(|| Duration::from_secs_f64(self.settling_timeout))
    }
}

fn parse(raw: &str) -> Result<ChainManagerConfig, MotionError> {
    toml::from_str(raw).map_err(|e| MotionError::Config(format!("failed to parse config: {e}")))
}

/// `value` seconds must convert to a [`Duration`]: finite, non-negative and
/// in range.  The accessors rely on this.
fn check_duration(name: &str, value: f64) -> Result<(), MotionError> {
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|e| {
            MotionError::Config(format!(
                "{name} must be a non-negative number of seconds, got {value}: {e}"
            ))
        })
}

/// Apply `CHAINMOVE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CHAINMOVE_DURATION` | `duration` |
/// | `CHAINMOVE_VELOCITY_FACTOR` | `velocity_factor` |
/// | `CHAINMOVE_SETTLING_TIMEOUT` | `settling_timeout` |
/// | `CHAINMOVE_CONNECT_WAIT` | `connect_wait` |
///
/// Values that do not parse as numbers are ignored.
pub fn apply_env_overrides(cfg: &mut ChainManagerConfig) {
    let overrides: [(&str, &mut f64); 4] = [
        ("CHAINMOVE_DURATION", &mut cfg.duration),
        ("CHAINMOVE_VELOCITY_FACTOR", &mut cfg.velocity_factor),
        ("CHAINMOVE_SETTLING_TIMEOUT", &mut cfg.settling_timeout),
        ("CHAINMOVE_CONNECT_WAIT", &mut cfg.connect_wait),
    ];
    for (var, field) in overrides {
        if let Ok(v) = std::env::var(var)
            && let Ok(parsed) = v.trim().parse::<f64>()
        {
            *field = parsed;
        }
    }
}
