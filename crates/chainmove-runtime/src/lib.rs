//! `chainmove-runtime` – multi-chain dispatch and settle detection
//!
//! Drives a robot made of several kinematic chains to one target joint
//! configuration and waits for it to come to rest.
//!
//! # Modules
//!
//! - [`chain_manager`] – [`ChainManager`][chain_manager::ChainManager]:
//!   registers chains, dispatches a target state to all of them in parallel
//!   (planning through the shared planner where a chain has a planning
//!   group) and polls the joint-state store until every managed joint is
//!   still.
//! - [`controller`] – [`ChainSpec`][controller::ChainSpec] and
//!   [`ChainController`][controller::ChainController]: one chain's static
//!   description bound to its command channel.
//! - [`trajectory`] – pure construction of trajectory points, direct
//!   trajectories and plan requests.
//! - [`config`] – [`ChainManagerConfig`][config::ChainManagerConfig]: TOML
//!   configuration with `CHAINMOVE_*` environment overrides.
//! - [`clock`] – [`Clock`][clock::Clock] time source used by the settle
//!   monitor.
//!
//! # Collaborators
//!
//! Command channels and the planner are reached through
//! [`ChainBackend`][chainmove_middleware::ChainBackend].  Joint states reach
//! the manager only through the shared
//! [`JointStateStore`][chainmove_middleware::JointStateStore], which a
//! stream listener task keeps current.

pub mod chain_manager;
pub mod clock;
pub mod config;
pub mod controller;
pub mod trajectory;

pub use chain_manager::{ChainManager, GOAL_TIME_TOLERANCE, SETTLE_VELOCITY_THRESHOLD};
pub use clock::{Clock, TokioClock};
pub use config::{ChainConfig, ChainManagerConfig, apply_env_overrides};
pub use controller::{ChainController, ChainSpec};
