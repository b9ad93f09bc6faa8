//! `chainmove-middleware` – state stream and collaborator plumbing
//!
//! Moves joint-state data from the outside world into a shared cache and
//! defines the seams through which chain goals and plan requests leave the
//! process.
//!
//! # Modules
//!
//! - [`state_store`] – [`JointStateStore`][state_store::JointStateStore]:
//!   mutex-guarded cache of the latest position/velocity per joint.
//! - [`bus`] – [`StateBus`][bus::StateBus]: broadcast channel carrying
//!   joint-state batches.
//! - [`joint_states`] – stream listener task and rosbridge JSON decoding.
//! - [`channel`] – [`CommandChannel`][channel::CommandChannel],
//!   [`PlanningService`][channel::PlanningService] and
//!   [`ChainBackend`][channel::ChainBackend] traits.

pub mod bus;
pub mod channel;
pub mod joint_states;
pub mod state_store;

pub use bus::{StateBus, StateReceiver};
pub use channel::{ChainBackend, CommandChannel, PlanningService};
pub use joint_states::{attach_store, decode_rosbridge_joint_state, spawn_state_listener};
pub use state_store::{JointStateStore, StateSnapshot};
