use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Latest observed position and velocity of a single joint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointReading {
    pub position: f64,
    pub velocity: f64,
}

/// Name-indexed joint state.  Ordering carries no meaning; a `BTreeMap` is
/// used so two states with the same contents always compare equal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointState {
    joints: BTreeMap<String, JointReading>,
}

impl JointState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a joint.
    pub fn set(&mut self, name: impl Into<String>, position: f64, velocity: f64) {
        self.joints
            .insert(name.into(), JointReading { position, velocity });
    }

    pub fn get(&self, name: &str) -> Option<&JointReading> {
        self.joints.get(name)
    }

    pub fn position(&self, name: &str) -> Option<f64> {
        self.joints.get(name).map(|r| r.position)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JointReading)> {
        self.joints.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for JointState {
    /// Build a target configuration from `(name, position)` pairs with zero
    /// velocity.
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut state = JointState::new();
        for (name, position) in iter {
            state.set(name, position, 0.0);
        }
        state
    }
}

/// One message from the joint-state stream.  The three sequences are
/// parallel; a batch whose lengths disagree is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointStateBatch {
    pub stamp: DateTime<Utc>,
    pub names: Vec<String>,
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
}

impl JointStateBatch {
    pub fn new(names: Vec<String>, positions: Vec<f64>, velocities: Vec<f64>) -> Self {
        Self {
            stamp: Utc::now(),
            names,
            positions,
            velocities,
        }
    }
}

/// A single waypoint for one chain.  Every vector holds one entry per joint
/// of the owning trajectory, in `joint_names` order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
    pub time_from_start: Duration,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
}

impl JointTrajectory {
    /// Time stamp of the final waypoint, or `None` for an empty trajectory.
    pub fn duration(&self) -> Option<Duration> {
        self.points.last().map(|p| p.time_from_start)
    }
}

/// Command sent on a chain's command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryGoal {
    pub id: Uuid,
    pub trajectory: JointTrajectory,
    pub goal_time_tolerance: Duration,
}

/// Terminal result reported by a command channel for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GoalResult {
    Succeeded,
    Failed { code: i32, message: String },
}

/// Per-joint goal band for the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConstraint {
    pub joint_name: String,
    pub position: f64,
    pub tolerance_above: f64,
    pub tolerance_below: f64,
    pub weight: f64,
}

/// Request to the shared motion-planning service.  Always plan-only: the
/// returned trajectory is executed by the chain's own command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub group_name: String,
    pub goal_constraints: Vec<JointConstraint>,
    pub num_planning_attempts: u32,
    pub allowed_planning_time: Duration,
    pub max_velocity_scaling_factor: f64,
    pub plan_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanErrorCode {
    Success,
    Failure,
    PlanningFailed,
    InvalidMotionPlan,
    InvalidGroupName,
    GoalConstraintsViolated,
    TimedOut,
}

impl std::fmt::Display for PlanErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlanErrorCode::Success => "success",
            PlanErrorCode::Failure => "failure",
            PlanErrorCode::PlanningFailed => "planning_failed",
            PlanErrorCode::InvalidMotionPlan => "invalid_motion_plan",
            PlanErrorCode::InvalidGroupName => "invalid_group_name",
            PlanErrorCode::GoalConstraintsViolated => "goal_constraints_violated",
            PlanErrorCode::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub error_code: PlanErrorCode,
    pub trajectory: JointTrajectory,
}

impl PlanResult {
    pub fn failed(code: PlanErrorCode) -> Self {
        Self {
            error_code: code,
            trajectory: JointTrajectory::default(),
        }
    }
}

/// How a single chain fared during the send and wait phases of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainStatus {
    Succeeded,
    /// The command channel reported a failed result.
    Failed(String),
    /// No result arrived within the wait budget.  The goal may still be
    /// executing.
    TimedOut,
    /// The goal could not be handed to the command channel.
    SendFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOutcome {
    pub chain: String,
    pub status: ChainStatus,
}

/// Aggregate result of one multi-chain dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Longest trajectory across all chains, never below the configured
    /// direct-move duration.
    pub max_duration: Duration,
    /// Per-chain result wait budget (`max_duration × 1.5`).
    pub result_timeout: Duration,
    /// One entry per chain, in registration order.
    pub chains: Vec<ChainOutcome>,
}

impl DispatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.chains
            .iter()
            .all(|c| c.status == ChainStatus::Succeeded)
    }

    pub fn status(&self, chain: &str) -> Option<&ChainStatus> {
        self.chains
            .iter()
            .find(|c| c.chain == chain)
            .map(|c| &c.status)
    }
}

/// Global error type for state ingest, chain dispatch and settling.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionError {
    #[error("Malformed joint state: {0}")]
    MalformedInput(String),

    #[error("Connection failure on {endpoint}: {details}")]
    ConnectionFailure { endpoint: String, details: String },

    #[error("Planning failed for chain {chain}: {code}")]
    PlanningFailed { chain: String, code: PlanErrorCode },

    #[error("Missing joint data for {joint}")]
    MissingJointData { joint: String },

    #[error("Robot did not settle within {elapsed_secs:.3}s")]
    SettleTimeout { elapsed_secs: f64 },

    #[error("Command failed on {chain}: {details}")]
    CommandFailed { chain: String, details: String },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
