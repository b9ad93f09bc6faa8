//! `chainmove-hal` – simulated hardware collaborators
//!
//! Stand-ins for chain trajectory controllers and the motion planner so the
//! whole dispatch and settle stack can run in CI without a robot.
//!
//! # Modules
//!
//! - [`sim`] – [`SimCommandChannel`][sim::SimCommandChannel] and
//!   [`SimPlanner`][sim::SimPlanner], scriptable to succeed, fail, stall or
//!   refuse connections, plus [`SimWorld`][sim::SimWorld], the simulated
//!   body whose joint states they move.
//! - [`sim_backend`] – [`SimBackend`][sim_backend::SimBackend], a
//!   [`ChainBackend`][chainmove_middleware::ChainBackend] that creates and
//!   tracks simulated collaborators per chain.

pub mod sim;
pub mod sim_backend;

pub use sim::{ChannelBehaviour, PlannerBehaviour, SimCommandChannel, SimPlanner, SimWorld};
pub use sim_backend::SimBackend;
