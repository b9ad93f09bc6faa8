//! In-process simulated collaborators for headless testing.
//!
//! [`SimCommandChannel`] stands in for a chain's trajectory controller and
//! [`SimPlanner`] for the motion-planning service.  Both record everything
//! they are asked to do so tests can assert on it, and both can be scripted
//! to fail in the ways real collaborators do.
//!
//! [`SimWorld`] is the simulated robot body.  Controllers attached to a world
//! report a non-zero velocity for their joints while a goal executes, then
//! leave them at the final waypoint with zero velocity.
//! [`SimWorld::spawn_publisher`] streams the world onto a [`StateBus`] at a
//! fixed rate, like a robot's joint-state topic.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chainmove_middleware::{CommandChannel, PlanningService, StateBus};
use chainmove_types::{
    GoalResult, JointState, JointStateBatch, JointTrajectory, MotionError, PlanErrorCode,
    PlanRequest, PlanResult, TrajectoryGoal, TrajectoryPoint,
};
use tokio::task::JoinHandle;
use tracing::debug;

/// Velocity reported for every joint of a chain while its goal executes.
pub const SIM_MOVING_VELOCITY: f64 = 0.5;

/// Default duration of trajectories produced by [`SimPlanner`].
pub const SIM_PLAN_DURATION: Duration = Duration::from_secs(3);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated robot body
// ────────────────────────────────────────────────────────────────────────────

/// Shared simulated joint state.  Clones refer to the same body.
#[derive(Clone, Default)]
pub struct SimWorld {
    joints: Arc<Mutex<JointState>>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body with the given joints at rest.
    pub fn with_joints<S: Into<String>>(joints: impl IntoIterator<Item = (S, f64)>) -> Self {
        let world = Self::new();
        for (name, position) in joints {
            world.set(name, position, 0.0);
        }
        world
    }

    pub fn set(&self, name: impl Into<String>, position: f64, velocity: f64) {
        lock(&self.joints).set(name, position, velocity);
    }

    pub fn state(&self) -> JointState {
        lock(&self.joints).clone()
    }

    /// The whole body as one stream batch.
    pub fn batch(&self) -> JointStateBatch {
        let joints = lock(&self.joints);
        let mut names = Vec::with_capacity(joints.len());
        let mut positions = Vec::with_capacity(joints.len());
        let mut velocities = Vec::with_capacity(joints.len());
        for (name, reading) in joints.iter() {
            names.push(name.to_string());
            positions.push(reading.position);
            velocities.push(reading.velocity);
        }
        JointStateBatch::new(names, positions, velocities)
    }

    /// Publish [`SimWorld::batch`] on `bus` every `period` until the returned
    /// task is aborted.  Publishing with no subscribers is not an error.
    pub fn spawn_publisher(&self, bus: StateBus, period: Duration) -> JoinHandle<()> {
        let world = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let _ = bus.publish(world.batch());
            }
        })
    }

    fn start_motion(&self, names: &[String], targets: &[f64]) {
        let mut joints = lock(&self.joints);
        for (name, &target) in names.iter().zip(targets) {
            let position = joints.position(name).unwrap_or(target);
            joints.set(name.clone(), position, SIM_MOVING_VELOCITY);
        }
    }

    fn finish_motion(&self, names: &[String], targets: &[f64]) {
        let mut joints = lock(&self.joints);
        for (name, &target) in names.iter().zip(targets) {
            joints.set(name.clone(), target, 0.0);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated command channel
// ────────────────────────────────────────────────────────────────────────────

/// Scripted behaviour of a [`SimCommandChannel`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelBehaviour {
    /// Connects, executes every goal and reports success.
    #[default]
    Succeed,
    /// Connects, executes every goal and reports the given failure.
    Fail { code: i32, message: String },
    /// Connects and accepts goals but never reports a result.
    Stall,
    /// Refuses connections and goals.
    Unreachable,
    /// Never answers a connection attempt.  Goals are accepted and stall.
    Silent,
}

/// Simulated trajectory controller for one chain.
pub struct SimCommandChannel {
    topic: String,
    behaviour: ChannelBehaviour,
    time_scale: f64,
    world: Option<SimWorld>,
    goals: Mutex<Vec<TrajectoryGoal>>,
    in_flight: Mutex<Option<JoinHandle<GoalResult>>>,
}

impl SimCommandChannel {
    /// Create a controller that succeeds and executes goals in real time.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            behaviour: ChannelBehaviour::default(),
            time_scale: 1.0,
            world: None,
            goals: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_behaviour(mut self, behaviour: ChannelBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Scale execution time; `0.0` completes goals immediately.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    /// Move the joints of `world` while executing goals.
    pub fn with_world(mut self, world: SimWorld) -> Self {
        self.world = Some(world);
        self
    }

    /// Every goal accepted so far, oldest first.
    pub fn goals(&self) -> Vec<TrajectoryGoal> {
        lock(&self.goals).clone()
    }

    fn execute(&self, goal: &TrajectoryGoal) -> JoinHandle<GoalResult> {
        let names = goal.trajectory.joint_names.clone();
        let final_positions = goal
            .trajectory
            .points
            .last()
            .map(|p| p.positions.clone())
            .unwrap_or_default();
        let duration = goal
            .trajectory
            .duration()
            .unwrap_or_default()
            .mul_f64(self.time_scale);
        let world = self.world.clone();
        let behaviour = self.behaviour.clone();
        let topic = self.topic.clone();
        if let Some(world) = &world {
            world.start_motion(&names, &final_positions);
        }

        tokio::spawn(async move {
            if matches!(behaviour, ChannelBehaviour::Stall | ChannelBehaviour::Silent) {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(duration).await;
            if let Some(world) = &world {
                world.finish_motion(&names, &final_positions);
            }
            debug!(topic = %topic, "simulated goal finished");
            match behaviour {
                ChannelBehaviour::Fail { code, message } => GoalResult::Failed { code, message },
                _ => GoalResult::Succeeded,
            }
        })
    }
}

#[async_trait]
impl CommandChannel for SimCommandChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn connect(&self) -> Result<(), MotionError> {
        match self.behaviour {
            ChannelBehaviour::Unreachable => Err(MotionError::ConnectionFailure {
                endpoint: self.topic.clone(),
                details: "simulated controller is unreachable".to_string(),
            }),
            ChannelBehaviour::Silent => std::future::pending().await,
            _ => Ok(()),
        }
    }

    async fn send_goal(&self, goal: TrajectoryGoal) -> Result<(), MotionError> {
        if self.behaviour == ChannelBehaviour::Unreachable {
            return Err(MotionError::CommandFailed {
                chain: self.topic.clone(),
                details: "not connected".to_string(),
            });
        }
        let handle = self.execute(&goal);
        lock(&self.goals).push(goal);
        // A newer goal supersedes the previous one, as on a real controller.
        if let Some(previous) = lock(&self.in_flight).replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn wait_for_result(&self) -> Result<GoalResult, MotionError> {
        let handle = lock(&self.in_flight).take();
        match handle {
            Some(handle) => handle.await.map_err(|e| MotionError::CommandFailed {
                chain: self.topic.clone(),
                details: format!("simulated execution aborted: {e}"),
            }),
            None => Err(MotionError::CommandFailed {
                chain: self.topic.clone(),
                details: "no goal in flight".to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated planner
// ────────────────────────────────────────────────────────────────────────────

/// Scripted behaviour of a [`SimPlanner`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PlannerBehaviour {
    /// Return a two-waypoint trajectory ending at the requested positions.
    #[default]
    Succeed,
    /// Return the given non-success code.
    Fail(PlanErrorCode),
    /// Report success with no waypoints.
    EmptyTrajectory,
    /// Refuse connections and requests.
    Unreachable,
    /// Never answer a plan request.
    Stall,
}

/// Simulated motion-planning service.
pub struct SimPlanner {
    behaviour: PlannerBehaviour,
    plan_duration: Duration,
    requests: Mutex<Vec<PlanRequest>>,
}

impl SimPlanner {
    pub fn new() -> Self {
        Self {
            behaviour: PlannerBehaviour::default(),
            plan_duration: SIM_PLAN_DURATION,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_behaviour(mut self, behaviour: PlannerBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Time stamp of the final waypoint of every planned trajectory.
    pub fn with_plan_duration(mut self, duration: Duration) -> Self {
        self.plan_duration = duration;
        self
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<PlanRequest> {
        lock(&self.requests).clone()
    }

    fn trajectory_for(&self, request: &PlanRequest) -> JointTrajectory {
        let joint_names: Vec<String> = request
            .goal_constraints
            .iter()
            .map(|c| c.joint_name.clone())
            .collect();
        let positions: Vec<f64> = request.goal_constraints.iter().map(|c| c.position).collect();
        let zeros = vec![0.0; positions.len()];
        let waypoint = |time_from_start| TrajectoryPoint {
            positions: positions.clone(),
            velocities: zeros.clone(),
            accelerations: zeros.clone(),
            time_from_start,
        };
        JointTrajectory {
            joint_names,
            points: vec![waypoint(self.plan_duration / 2), waypoint(self.plan_duration)],
        }
    }
}

impl Default for SimPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanningService for SimPlanner {
    async fn connect(&self) -> Result<(), MotionError> {
        if self.behaviour == PlannerBehaviour::Unreachable {
            return Err(MotionError::ConnectionFailure {
                endpoint: "move_action".to_string(),
                details: "simulated planner is unreachable".to_string(),
            });
        }
        Ok(())
    }

    async fn plan(&self, request: PlanRequest) -> Result<PlanResult, MotionError> {
        lock(&self.requests).push(request.clone());
        match self.behaviour {
            PlannerBehaviour::Succeed => Ok(PlanResult {
                error_code: PlanErrorCode::Success,
                trajectory: self.trajectory_for(&request),
            }),
            PlannerBehaviour::Fail(code) => Ok(PlanResult::failed(code)),
            PlannerBehaviour::EmptyTrajectory => Ok(PlanResult::failed(PlanErrorCode::Success)),
            PlannerBehaviour::Unreachable => Err(MotionError::ConnectionFailure {
                endpoint: "move_action".to_string(),
                details: "simulated planner is unreachable".to_string(),
            }),
            PlannerBehaviour::Stall => std::future::pending().await,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
