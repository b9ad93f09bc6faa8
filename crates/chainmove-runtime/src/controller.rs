//! Per-chain description and command channel handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chainmove_middleware::CommandChannel;
use chainmove_types::MotionError;
use tracing::{info, warn};

use crate::config::ChainConfig;

/// Static description of one kinematic chain.  Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSpec {
    pub name: String,
    pub topic: String,
    /// Empty for directly actuated chains.
    pub planning_group: String,
    pub joint_names: Vec<String>,
}

impl ChainSpec {
    pub fn requires_planning(&self) -> bool {
        !self.planning_group.is_empty()
    }
}

impl From<&ChainConfig> for ChainSpec {
    fn from(cfg: &ChainConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            topic: cfg.topic.clone(),
            planning_group: cfg.planning_group.clone(),
            joint_names: cfg.joints.clone(),
        }
    }
}

/// A registered chain: its spec plus the live command channel.
///
/// A chain whose channel failed to connect stays registered; goals sent to
/// it simply fail later.
pub struct ChainController {
    spec: ChainSpec,
    client: Arc<dyn CommandChannel>,
    connected: bool,
}

impl ChainController {
    /// Register `spec` on `client`, waiting at most `wait` for the channel to
    /// connect.
    pub async fn connect(spec: ChainSpec, client: Arc<dyn CommandChannel>, wait: Duration) -> Self {
        info!(chain = %spec.name, topic = %client.topic(), "creating chain");
        let connected = connect_within(client.topic(), wait, client.connect()).await;
        Self {
            spec,
            client,
            connected,
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn joint_names(&self) -> &[String] {
        &self.spec.joint_names
    }

    pub fn requires_planning(&self) -> bool {
        self.spec.requires_planning()
    }

    /// Whether the channel connected during registration.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn client(&self) -> &Arc<dyn CommandChannel> {
        &self.client
    }

    pub fn owns_joint(&self, joint: &str) -> bool {
        self.spec.joint_names.iter().any(|j| j == joint)
    }
}

/// Await `connecting` for at most `wait`.  Failure and timeout are logged
/// and reported as `false`; neither is fatal.
pub(crate) async fn connect_within<F>(endpoint: &str, wait: Duration, connecting: F) -> bool
where
    F: Future<Output = Result<(), MotionError>>,
{
    match tokio::time::timeout(wait, connecting).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(endpoint = %endpoint, error = %e, "failed to connect");
            false
        }
        Err(_) => {
            warn!(endpoint = %endpoint, wait_secs = wait.as_secs_f64(), "timed out connecting");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainmove_hal::sim::{ChannelBehaviour, SimCommandChannel};

    fn spec(group: &str) -> ChainSpec {
        ChainSpec {
            name: "arm".to_string(),
            topic: "arm_controller/follow_joint_trajectory".to_string(),
            planning_group: group.to_string(),
            joint_names: vec!["shoulder_pan_joint".to_string(), "elbow_flex_joint".to_string()],
        }
    }

    #[test]
    fn planning_group_decides_planning() {
        assert!(spec("arm").requires_planning());
        assert!(!spec("").requires_planning());
    }

    #[test]
    fn spec_from_config() {
        let cfg = ChainConfig {
            name: "head".to_string(),
            topic: "head_controller".to_string(),
            planning_group: String::new(),
            joints: vec!["head_pan_joint".to_string()],
        };
        let spec = ChainSpec::from(&cfg);
        assert_eq!(spec.name, "head");
        assert_eq!(spec.joint_names, vec!["head_pan_joint".to_string()]);
        assert!(!spec.requires_planning());
    }

    #[tokio::test]
    async fn connected_controller() {
        let client = Arc::new(SimCommandChannel::new("arm_controller"));
        let controller = ChainController::connect(spec(""), client, Duration::from_secs(1)).await;
        assert!(controller.is_connected());
        assert!(controller.owns_joint("elbow_flex_joint"));
        assert!(!controller.owns_joint("head_pan_joint"));
    }

    #[tokio::test]
    async fn controller_keeps_channel_for_its_topic() {
        let spec = spec("arm");
        let client = Arc::new(SimCommandChannel::new(spec.topic.clone()));
        let controller = ChainController::connect(spec, client, Duration::from_secs(1)).await;
        assert_eq!(controller.client().topic(), "arm_controller/follow_joint_trajectory");
        assert_eq!(controller.client().topic(), controller.spec().topic);
    }

    #[tokio::test]
    async fn unreachable_channel_is_registered_but_degraded() {
        let client = Arc::new(
            SimCommandChannel::new("arm_controller").with_behaviour(ChannelBehaviour::Unreachable),
        );
        let controller = ChainController::connect(spec(""), client, Duration::from_secs(1)).await;
        assert!(!controller.is_connected());
        assert_eq!(controller.name(), "arm");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_channel_connect_is_bounded() {
        let client = Arc::new(
            SimCommandChannel::new("arm_controller").with_behaviour(ChannelBehaviour::Silent),
        );
        let start = tokio::time::Instant::now();
        let controller = ChainController::connect(spec(""), client, Duration::from_secs(2)).await;
        assert!(!controller.is_connected());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100));
    }
}
