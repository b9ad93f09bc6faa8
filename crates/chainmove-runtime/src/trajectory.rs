//! Trajectory construction.
//!
//! Pure functions that turn a target [`JointState`] into the per-chain
//! messages the dispatcher sends: a single [`TrajectoryPoint`], a direct
//! one-point [`JointTrajectory`], or a [`PlanRequest`] for the planner.

use std::time::Duration;

use chainmove_types::{
    JointConstraint, JointState, JointTrajectory, MotionError, PlanRequest, TrajectoryPoint,
};

/// Allowed deviation (rad) above and below each planned joint target.
pub const JOINT_GOAL_TOLERANCE: f64 = 0.01;

/// Planner time budget per attempt.
pub const ALLOWED_PLANNING_TIME: Duration = Duration::from_secs(5);

/// Build one waypoint holding the `joints` positions found in `state`, in
/// `joints` order, with zero velocity and acceleration.
///
/// # Errors
///
/// Returns [`MotionError::MissingJointData`] for the first joint that has no
/// entry in `state`.  No partial point is ever returned.
pub fn build_point(state: &JointState, joints: &[String]) -> Result<TrajectoryPoint, MotionError> {
    let positions = joints
        .iter()
        .map(|joint| {
            state
                .position(joint)
                .ok_or_else(|| MotionError::MissingJointData {
                    joint: joint.clone(),
                })
        })
        .collect::<Result<Vec<f64>, MotionError>>()?;
    let zeros = vec![0.0; positions.len()];
    Ok(TrajectoryPoint {
        positions,
        velocities: zeros.clone(),
        accelerations: zeros,
        time_from_start: Duration::ZERO,
    })
}

/// Wrap `point` as a single-waypoint trajectory reached after `duration`.
pub fn direct_trajectory(joints: &[String], mut point: TrajectoryPoint, duration: Duration) -> JointTrajectory {
    point.time_from_start = duration;
    JointTrajectory {
        joint_names: joints.to_vec(),
        points: vec![point],
    }
}

/// Build a plan-only request that moves `group` to `point` within
/// ±[`JOINT_GOAL_TOLERANCE`] per joint.
pub fn build_plan_request(
    group: &str,
    joints: &[String],
    point: &TrajectoryPoint,
    velocity_factor: f64,
) -> PlanRequest {
    let goal_constraints = joints
        .iter()
        .zip(&point.positions)
        .map(|(joint, &position)| JointConstraint {
            joint_name: joint.clone(),
            position,
            tolerance_above: JOINT_GOAL_TOLERANCE,
            tolerance_below: JOINT_GOAL_TOLERANCE,
            weight: 1.0,
        })
        .collect();
    PlanRequest {
        group_name: group.to_string(),
        goal_constraints,
        num_planning_attempts: 1,
        allowed_planning_time: ALLOWED_PLANNING_TIME,
        max_velocity_scaling_factor: velocity_factor,
        plan_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(joints: &[&str]) -> Vec<String> {
        joints.iter().map(|j| j.to_string()).collect()
    }

    fn state() -> JointState {
        let mut s = JointState::new();
        s.set("shoulder_pan_joint", 0.1, 0.4);
        s.set("elbow_flex_joint", -0.6, 0.0);
        s.set("head_pan_joint", 0.0, 0.0);
        s
    }

    #[test]
    fn point_follows_joint_list_order() {
        let joints = names(&["elbow_flex_joint", "shoulder_pan_joint"]);
        let p = build_point(&state(), &joints).unwrap();
        assert_eq!(p.positions, vec![-0.6, 0.1]);
    }

    #[test]
    fn point_has_zero_velocity_and_acceleration() {
        let joints = names(&["shoulder_pan_joint", "elbow_flex_joint", "head_pan_joint"]);
        let p = build_point(&state(), &joints).unwrap();
        assert_eq!(p.positions.len(), joints.len());
        assert_eq!(p.velocities, vec![0.0; 3]);
        assert_eq!(p.accelerations, vec![0.0; 3]);
    }

    #[test]
    fn missing_joint_is_an_error() {
        let joints = names(&["shoulder_pan_joint", "wrist_roll_joint"]);
        let result = build_point(&state(), &joints);
        assert_eq!(
            result,
            Err(MotionError::MissingJointData {
                joint: "wrist_roll_joint".to_string()
            })
        );
    }

    #[test]
    fn empty_joint_list_gives_empty_point() {
        let p = build_point(&state(), &[]).unwrap();
        assert!(p.positions.is_empty());
        assert!(p.velocities.is_empty());
    }

    #[test]
    fn direct_trajectory_is_stamped_at_duration() {
        let joints = names(&["head_pan_joint"]);
        let p = build_point(&state(), &joints).unwrap();
        let traj = direct_trajectory(&joints, p, Duration::from_secs(5));
        assert_eq!(traj.joint_names, joints);
        assert_eq!(traj.points.len(), 1);
        assert_eq!(traj.duration(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn plan_request_carries_tolerance_band_and_scaling() {
        let joints = names(&["shoulder_pan_joint", "elbow_flex_joint"]);
        let p = build_point(&state(), &joints).unwrap();
        let req = build_plan_request("arm", &joints, &p, 0.25);

        assert_eq!(req.group_name, "arm");
        assert!(req.plan_only);
        assert_eq!(req.max_velocity_scaling_factor, 0.25);
        assert_eq!(req.goal_constraints.len(), 2);
        let c = &req.goal_constraints[1];
        assert_eq!(c.joint_name, "elbow_flex_joint");
        assert_eq!(c.position, -0.6);
        assert_eq!(c.tolerance_above, JOINT_GOAL_TOLERANCE);
        assert_eq!(c.tolerance_below, JOINT_GOAL_TOLERANCE);
    }
}
