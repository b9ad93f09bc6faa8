//! Demo scenario read alongside the manager configuration.
//!
//! The same TOML file that holds the `[[chains]]` may carry:
//!
//! ```toml
//! [start]            # initial joint positions of the simulated robot
//! head_pan_joint = 0.0
//!
//! [target]           # positions the robot is sent to
//! head_pan_joint = 0.4
//!
//! [sim]
//! time_scale = 0.2       # execution time multiplier
//! publish_period = 0.02  # seconds between joint-state batches
//! ```
//!
//! Chain joints missing from `[start]` start at `0.0`; chain joints missing
//! from `[target]` are held at their start position.

use std::collections::BTreeMap;
use std::time::Duration;

use chainmove_hal::SimWorld;
use chainmove_types::{JointState, MotionError};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub start: BTreeMap<String, f64>,
    #[serde(default)]
    pub target: BTreeMap<String, f64>,
    #[serde(default)]
    pub sim: SimSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimSettings {
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    #[serde(default = "default_publish_period")]
    pub publish_period: f64,
}

fn default_time_scale() -> f64 {
    1.0
}
fn default_publish_period() -> f64 {
    0.02
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            publish_period: default_publish_period(),
        }
    }
}

impl SimSettings {
    pub fn publish_period(&self) -> Duration {
        Duration::from_secs_f64(self.publish_period)
    }
}

impl Scenario {
    pub fn from_toml_str(raw: &str) -> Result<Self, MotionError> {
        let scenario: Scenario = toml::from_str(raw)
            .map_err(|e| MotionError::Config(format!("failed to parse scenario: {e}")))?;
        if !scenario.sim.time_scale.is_finite() || scenario.sim.time_scale < 0.0 {
            return Err(MotionError::Config(format!(
                "sim.time_scale must be a non-negative number, got {}",
                scenario.sim.time_scale
            )));
        }
        if scenario.sim.publish_period <= 0.0
            || Duration::try_from_secs_f64(scenario.sim.publish_period).is_err()
        {
            return Err(MotionError::Config(format!(
                "sim.publish_period must be positive, got {}",
                scenario.sim.publish_period
            )));
        }
        Ok(scenario)
    }

    /// Simulated body holding every `[start]` joint plus every chain joint.
    pub fn world(&self, chain_joints: &[String]) -> SimWorld {
        let world = SimWorld::with_joints(self.start.iter().map(|(n, &p)| (n.clone(), p)));
        for joint in chain_joints {
            if !self.start.contains_key(joint) {
                world.set(joint.clone(), 0.0, 0.0);
            }
        }
        world
    }

    pub fn target_state(&self, chain_joints: &[String]) -> JointState {
        chain_joints
            .iter()
            .map(|joint| {
                let position = self
                    .target
                    .get(joint)
                    .or_else(|| self.start.get(joint))
                    .copied()
                    .unwrap_or(0.0);
                (joint.clone(), position)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joints(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn empty_scenario_uses_defaults() {
        let scenario = Scenario::from_toml_str("").unwrap();
        assert!(scenario.start.is_empty());
        assert_eq!(scenario.sim, SimSettings::default());
        assert_eq!(scenario.sim.publish_period(), Duration::from_millis(20));
    }

    #[test]
    fn chain_tables_are_ignored() {
        let raw = r#"
            duration = 2.0

            [[chains]]
            name = "head"
            joints = ["head_pan_joint"]

            [target]
            head_pan_joint = 0.4

            [sim]
            time_scale = 0.0
        "#;
        let scenario = Scenario::from_toml_str(raw).unwrap();
        assert_eq!(scenario.target.get("head_pan_joint"), Some(&0.4));
        assert_eq!(scenario.sim.time_scale, 0.0);
    }

    #[test]
    fn invalid_sim_settings_are_rejected() {
        assert!(Scenario::from_toml_str("[sim]\ntime_scale = -1.0").is_err());
        assert!(matches!(
            Scenario::from_toml_str("[sim]\npublish_period = 0.0"),
            Err(MotionError::Config(_))
        ));
        assert!(matches!(
            Scenario::from_toml_str("[sim]\npublish_period = 1e30"),
            Err(MotionError::Config(_))
        ));
    }

    #[test]
    fn world_covers_start_and_chain_joints() {
        let scenario = Scenario::from_toml_str("[start]\nhead_pan_joint = 0.2\ncaster_joint = 1.0").unwrap();
        let state = scenario.world(&joints(&["head_pan_joint", "head_tilt_joint"])).state();
        assert_eq!(state.len(), 3);
        assert_eq!(state.position("head_pan_joint"), Some(0.2));
        assert_eq!(state.position("head_tilt_joint"), Some(0.0));
        assert_eq!(state.get("caster_joint").map(|r| r.velocity), Some(0.0));
    }

    #[test]
    fn unset_targets_hold_start_position() {
        let raw = r#"
            [start]
            head_pan_joint = 0.2
            [target]
            head_tilt_joint = -0.3
        "#;
        let scenario = Scenario::from_toml_str(raw).unwrap();
        let target = scenario.target_state(&joints(&["head_pan_joint", "head_tilt_joint", "torso_lift_joint"]));
        assert_eq!(target.position("head_pan_joint"), Some(0.2));
        assert_eq!(target.position("head_tilt_joint"), Some(-0.3));
        assert_eq!(target.position("torso_lift_joint"), Some(0.0));
    }
}
