//! [`SimBackend`] – a [`ChainBackend`] that hands out simulated
//! collaborators.
//!
//! Every chain gets a [`SimCommandChannel`]; chains can be scripted
//! individually by name.  All planning chains share one [`SimPlanner`].  The
//! backend keeps a handle to everything it creates so tests can inspect the
//! goals and plan requests after a dispatch.
//!
//! # Example
//!
//! ```rust
//! use chainmove_hal::sim::{ChannelBehaviour, SimPlanner};
//! use chainmove_hal::sim_backend::SimBackend;
//!
//! let backend = SimBackend::new()
//!     .with_time_scale(0.0)
//!     .with_chain_behaviour("gripper", ChannelBehaviour::Unreachable)
//!     .with_planner(SimPlanner::new());
//! assert!(backend.channel("arm").is_none()); // created lazily
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chainmove_middleware::{ChainBackend, CommandChannel, PlanningService};

use crate::sim::{ChannelBehaviour, SimCommandChannel, SimPlanner, SimWorld};

/// Builder-style simulated backend.
pub struct SimBackend {
    world: Option<SimWorld>,
    time_scale: f64,
    behaviours: HashMap<String, ChannelBehaviour>,
    planner: Arc<SimPlanner>,
    channels: Mutex<HashMap<String, Arc<SimCommandChannel>>>,
    planner_requests: AtomicUsize,
}

impl SimBackend {
    /// Backend whose channels succeed in real time and whose planner
    /// succeeds.
    pub fn new() -> Self {
        Self {
            world: None,
            time_scale: 1.0,
            behaviours: HashMap::new(),
            planner: Arc::new(SimPlanner::new()),
            channels: Mutex::new(HashMap::new()),
            planner_requests: AtomicUsize::new(0),
        }
    }

    /// Let every channel move the joints of `world`.
    pub fn with_world(mut self, world: SimWorld) -> Self {
        self.world = Some(world);
        self
    }

    /// Execution-time scale applied to every channel.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// Script the channel that will be created for `chain`.
    pub fn with_chain_behaviour(mut self, chain: impl Into<String>, behaviour: ChannelBehaviour) -> Self {
        self.behaviours.insert(chain.into(), behaviour);
        self
    }

    pub fn with_planner(mut self, planner: SimPlanner) -> Self {
        self.planner = Arc::new(planner);
        self
    }

    /// The channel created for `chain`, if the backend has been asked for it.
    pub fn channel(&self, chain: &str) -> Option<Arc<SimCommandChannel>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(chain)
            .cloned()
    }

    pub fn planner(&self) -> Arc<SimPlanner> {
        Arc::clone(&self.planner)
    }

    /// How many times [`ChainBackend::planning_service`] has been called.
    pub fn planning_service_requests(&self) -> usize {
        self.planner_requests.load(Ordering::SeqCst)
    }
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainBackend for SimBackend {
    fn command_channel(&self, chain: &str, topic: &str) -> Arc<dyn CommandChannel> {
        let mut channel = SimCommandChannel::new(topic)
            .with_behaviour(self.behaviours.get(chain).cloned().unwrap_or_default())
            .with_time_scale(self.time_scale);
        if let Some(world) = &self.world {
            channel = channel.with_world(world.clone());
        }
        let channel = Arc::new(channel);
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(chain.to_string(), Arc::clone(&channel));
        channel
    }

    fn planning_service(&self) -> Arc<dyn PlanningService> {
        self.planner_requests.fetch_add(1, Ordering::SeqCst);
        self.planner.clone()
    }
}
