//! [`ChainManager`] – synchronized multi-chain dispatch and settle detection.
//!
//! One call to [`ChainManager::move_to_state`] drives every registered chain
//! toward the same target joint configuration:
//!
//! 1. **Prepare** – for each chain, build its target point from the target
//!    state.  Planning chains ask the shared planner for a trajectory;
//!    direct chains get a single point stamped at the configured duration.
//!    Any failure here aborts the whole call before a single goal is sent.
//! 2. **Send** – every goal is handed to its command channel before any
//!    result is awaited, so the chains move in parallel.
//! 3. **Wait** – results are awaited chain by chain, each bounded by
//!    `max_duration × 1.5`.  Late or failed results are reported per chain
//!    and never abort the call.  Timed-out goals are not cancelled.
//!
//! [`ChainManager::wait_to_settle`] then polls the shared
//! [`JointStateStore`] until no joint of a managed chain is moving.  The
//! joint-state stream feeds the store from its own task, so the poll loop
//! only sleeps between checks.

use std::sync::Arc;
use std::time::Duration;

use chainmove_middleware::{ChainBackend, JointStateStore, PlanningService, StateSnapshot};
use chainmove_types::{
    ChainOutcome, ChainStatus, DispatchOutcome, GoalResult, JointState, JointTrajectory,
    MotionError, PlanErrorCode, TrajectoryGoal, TrajectoryPoint,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ChainManagerConfig;
use crate::controller::{ChainController, ChainSpec, connect_within};
use crate::trajectory::{build_plan_request, build_point, direct_trajectory};

/// Joints moving at or above this speed (rad/s) keep the robot unsettled.
pub const SETTLE_VELOCITY_THRESHOLD: f64 = 0.001;

/// Allowed lateness of a goal at its final waypoint.
pub const GOAL_TIME_TOLERANCE: Duration = Duration::from_secs(1);

/// Result waits are bounded by the longest trajectory times this factor.
pub const RESULT_TIMEOUT_FACTOR: f64 = 1.5;

pub struct ChainManager {
    config: ChainManagerConfig,
    controllers: Vec<ChainController>,
    planner: Option<Arc<dyn PlanningService>>,
    planner_connected: bool,
    store: Arc<JointStateStore>,
    clock: Arc<dyn Clock>,
}

impl ChainManager {
    /// Register every configured chain on channels resolved by `backend`.
    ///
    /// Channels and the planner that fail to connect within
    /// `connect_wait` are logged and kept in a degraded state; only an
    /// invalid configuration is an error.  The planner is requested from
    /// `backend` once, and only if some chain plans.
    pub async fn new(
        config: ChainManagerConfig,
        backend: &dyn ChainBackend,
        store: Arc<JointStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MotionError> {
        config.validate()?;
        if config.chains.is_empty() {
            warn!("no chains defined");
        }

        let wait = config.connect_wait();
        let mut controllers = Vec::with_capacity(config.chains.len());
        let mut planner: Option<Arc<dyn PlanningService>> = None;
        let mut planner_connected = false;

        for chain in &config.chains {
            let spec = ChainSpec::from(chain);
            let client = backend.command_channel(&spec.name, &spec.topic);
            let controller = ChainController::connect(spec, client, wait).await;

            if controller.requires_planning() && planner.is_none() {
                let service = backend.planning_service();
                planner_connected = connect_within("move_action", wait, service.connect()).await;
                planner = Some(service);
            }
            controllers.push(controller);
        }

        Ok(Self {
            config,
            controllers,
            planner,
            planner_connected,
            store,
            clock,
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Names of all registered chains, in registration order.
    pub fn chain_names(&self) -> Vec<String> {
        self.controllers.iter().map(|c| c.name().to_string()).collect()
    }

    /// Joints of `chain`, or an empty list for an unknown chain.
    pub fn chain_joint_names(&self, chain: &str) -> Vec<String> {
        self.controller(chain)
            .map(|c| c.joint_names().to_vec())
            .unwrap_or_default()
    }

    /// Planning group of `chain`, or an empty string for an unknown or
    /// directly actuated chain.
    pub fn planning_group(&self, chain: &str) -> String {
        self.controller(chain)
            .map(|c| c.spec().planning_group.clone())
            .unwrap_or_default()
    }

    /// Whether `chain`'s channel connected at startup; `None` if unknown.
    pub fn is_connected(&self, chain: &str) -> Option<bool> {
        self.controller(chain).map(ChainController::is_connected)
    }

    /// Whether a planner was created and connected.
    pub fn planner_connected(&self) -> bool {
        self.planner.is_some() && self.planner_connected
    }

    /// Current contents of the joint-state store.
    pub fn state(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    pub fn config(&self) -> &ChainManagerConfig {
        &self.config
    }

    fn controller(&self, chain: &str) -> Option<&ChainController> {
        self.controllers.iter().find(|c| c.name() == chain)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Move every chain to its joints' positions in `target`.
    ///
    /// # Errors
    ///
    /// * [`MotionError::MissingJointData`] – `target` lacks a joint of some
    ///   chain.
    /// * [`MotionError::PlanningFailed`] – the planner failed, timed out or
    ///   returned an empty trajectory for some chain.
    ///
    /// Both are raised before any goal is sent.  Everything that goes wrong
    /// after that is reported per chain in the returned [`DispatchOutcome`].
    #[instrument(skip_all, fields(chains = self.controllers.len()))]
    pub async fn move_to_state(&self, target: &JointState) -> Result<DispatchOutcome, MotionError> {
        let mut max_duration = self.config.duration();
        let mut goals = Vec::with_capacity(self.controllers.len());

        for controller in &self.controllers {
            let point = build_point(target, controller.joint_names())
                .inspect_err(|e| error!(chain = %controller.name(), error = %e, "bad move to state"))?;

            let trajectory = if controller.requires_planning() {
                let planned = self.plan(controller, &point).await?;
                if let Some(d) = planned.duration() {
                    max_duration = max_duration.max(d);
                }
                planned
            } else {
                direct_trajectory(controller.joint_names(), point, self.config.duration())
            };

            goals.push(TrajectoryGoal {
                id: Uuid::new_v4(),
                trajectory,
                goal_time_tolerance: GOAL_TIME_TOLERANCE,
            });
        }

        let mut statuses: Vec<Option<ChainStatus>> = Vec::with_capacity(goals.len());
        for (controller, goal) in self.controllers.iter().zip(goals) {
            debug!(chain = %controller.name(), goal = %goal.id, "sending goal");
            match controller.client().send_goal(goal).await {
                Ok(()) => statuses.push(None),
                Err(e) => {
                    warn!(chain = %controller.name(), error = %e, "failed to send goal");
                    statuses.push(Some(ChainStatus::SendFailed(e.to_string())));
                }
            }
        }

        let result_timeout = result_timeout(max_duration);
        let mut chains = Vec::with_capacity(statuses.len());
        for (controller, status) in self.controllers.iter().zip(statuses) {
            let status = match status {
                Some(failed) => failed,
                None => self.await_result(controller, result_timeout).await,
            };
            chains.push(ChainOutcome {
                chain: controller.name().to_string(),
                status,
            });
        }

        info!(
            chains = chains.len(),
            max_duration_secs = max_duration.as_secs_f64(),
            "move to state finished"
        );
        Ok(DispatchOutcome {
            max_duration,
            result_timeout,
            chains,
        })
    }

    async fn plan(&self, controller: &ChainController, point: &TrajectoryPoint) -> Result<JointTrajectory, MotionError> {
        let chain = controller.name();
        let failed = |code| MotionError::PlanningFailed {
            chain: chain.to_string(),
            code,
        };
        let Some(planner) = &self.planner else {
            return Err(failed(PlanErrorCode::Failure));
        };

        let request = build_plan_request(
            &controller.spec().planning_group,
            controller.joint_names(),
            point,
            self.config.velocity_factor,
        );
        let result = match tokio::time::timeout(self.config.plan_timeout(), planner.plan(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(chain = %chain, error = %e, "planning request failed");
                return Err(failed(PlanErrorCode::Failure));
            }
            Err(_) => {
                warn!(chain = %chain, "planning request timed out");
                return Err(failed(PlanErrorCode::TimedOut));
            }
        };

        if result.error_code != PlanErrorCode::Success {
            warn!(chain = %chain, code = %result.error_code, "unable to plan");
            return Err(failed(result.error_code));
        }
        if result.trajectory.points.is_empty() {
            warn!(chain = %chain, "planner returned an empty trajectory");
            return Err(failed(PlanErrorCode::InvalidMotionPlan));
        }
        Ok(result.trajectory)
    }

    async fn await_result(&self, controller: &ChainController, timeout: Duration) -> ChainStatus {
        match tokio::time::timeout(timeout, controller.client().wait_for_result()).await {
            Ok(Ok(GoalResult::Succeeded)) => ChainStatus::Succeeded,
            Ok(Ok(GoalResult::Failed { code, message })) => {
                warn!(chain = %controller.name(), code, message = %message, "goal failed");
                ChainStatus::Failed(format!("{code}: {message}"))
            }
            Ok(Err(e)) => {
                warn!(chain = %controller.name(), error = %e, "no result for goal");
                ChainStatus::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    chain = %controller.name(),
                    timeout_secs = timeout.as_secs_f64(),
                    "timed out waiting for goal result"
                );
                ChainStatus::TimedOut
            }
        }
    }

    // -----------------------------------------------------------------------
    // Settling
    // -----------------------------------------------------------------------

    /// Block until every joint of every managed chain is (nearly) still.
    ///
    /// Data already in the store is treated as stale: the store is
    /// invalidated first, so only batches arriving after this call count.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::SettleTimeout`] once the configured settling
    /// timeout has elapsed.  With the timeout disabled this waits
    /// indefinitely.
    #[instrument(skip_all)]
    pub async fn wait_to_settle(&self) -> Result<(), MotionError> {
        if self.controllers.is_empty() {
            return Ok(());
        }

        self.store.invalidate();
        let start = self.clock.now();
        let timeout = self.config.settling_timeout();
        let poll = self.config.poll_interval();

        loop {
            if self.is_settled(&self.store.snapshot()) {
                return Ok(());
            }

            let elapsed = self.clock.now().saturating_duration_since(start);
            if let Some(limit) = timeout
                && elapsed > limit
            {
                warn!(elapsed_secs = elapsed.as_secs_f64(), "robot did not settle");
                return Err(MotionError::SettleTimeout {
                    elapsed_secs: elapsed.as_secs_f64(),
                });
            }

            tokio::time::sleep(poll).await;
        }
    }

    /// `true` when `snapshot` is valid and no joint of a managed chain moves
    /// at [`SETTLE_VELOCITY_THRESHOLD`] or faster.  Joints outside every
    /// chain are ignored.
    pub fn is_settled(&self, snapshot: &StateSnapshot) -> bool {
        if !snapshot.valid {
            return false;
        }
        !snapshot
            .state
            .iter()
            .filter(|(_, reading)| reading.velocity.abs() >= SETTLE_VELOCITY_THRESHOLD)
            .any(|(joint, _)| self.controllers.iter().any(|c| c.owns_joint(joint)))
    }
}

/// `max_duration × RESULT_TIMEOUT_FACTOR`, saturating at [`Duration::MAX`].
/// `max_duration` comes from the planner and is unbounded.
fn result_timeout(max_duration: Duration) -> Duration {
    Duration::try_from_secs_f64(max_duration.as_secs_f64() * RESULT_TIMEOUT_FACTOR)
        .unwrap_or(Duration::MAX)
}
