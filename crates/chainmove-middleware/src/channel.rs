//! Collaborator seams for chain dispatch.
//!
//! The chain manager never speaks a wire protocol directly.  Each chain owns
//! a [`CommandChannel`] (goal/result protocol to the chain's trajectory
//! controller) and planning chains share one [`PlanningService`].  A
//! [`ChainBackend`] resolves both from configuration so the runtime can be
//! wired to real transports or to the in-process simulators.
//!
//! None of the trait methods take a timeout.  Callers bound every wait with
//! [`tokio::time::timeout`], and dropping a timed-out future only stops the
//! wait – it never cancels a goal that has already been sent.

use std::sync::Arc;

use async_trait::async_trait;
use chainmove_types::{GoalResult, MotionError, PlanRequest, PlanResult, TrajectoryGoal};

/// Goal/result channel to one chain's trajectory controller.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Endpoint identifier, e.g. `"arm_controller/follow_joint_trajectory"`.
    fn topic(&self) -> &str;

    /// Wait until the remote controller is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::ConnectionFailure`] if the endpoint refuses the
    /// connection.
    async fn connect(&self) -> Result<(), MotionError>;

    /// Hand a goal to the controller without waiting for it to execute.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::CommandFailed`] if the goal could not be
    /// issued.
    async fn send_goal(&self, goal: TrajectoryGoal) -> Result<(), MotionError>;

    /// Wait for the terminal result of the most recently sent goal.
    async fn wait_for_result(&self) -> Result<GoalResult, MotionError>;
}

/// Shared motion-planning service.
#[async_trait]
pub trait PlanningService: Send + Sync {
    async fn connect(&self) -> Result<(), MotionError>;

    /// Request a plan.  A planner-side failure is reported through
    /// [`PlanResult::error_code`]; `Err` is reserved for transport faults.
    async fn plan(&self, request: PlanRequest) -> Result<PlanResult, MotionError>;
}

/// Factory that resolves collaborators for configured chains.
pub trait ChainBackend: Send + Sync {
    /// Create the command channel for `chain`, addressed by `topic`.
    fn command_channel(&self, chain: &str, topic: &str) -> Arc<dyn CommandChannel>;

    /// Create the shared planning service.  Only called when at least one
    /// chain requires planning.
    fn planning_service(&self) -> Arc<dyn PlanningService>;
}
