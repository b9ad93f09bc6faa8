//! Joint-state stream ingest.
//!
//! [`spawn_state_listener`] runs the stream consumer on its own tokio task,
//! merging every batch from a [`StateBus`] into a shared
//! [`JointStateStore`].  Because the consumer is independent of the code
//! that reads the store, the settle monitor never has to pump the stream
//! itself.
//!
//! [`decode_rosbridge_joint_state`] turns a rosbridge `/joint_states` publish
//! frame into a [`JointStateBatch`] for hosts that receive the stream as
//! JSON.

use std::sync::Arc;

use chainmove_types::{JointStateBatch, MotionError};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bus::{StateBus, StateReceiver};
use crate::state_store::JointStateStore;

/// Topic the joint-state stream is published on.
pub const JOINT_STATES_TOPIC: &str = "/joint_states";

/// Spawn a task that merges every batch received on `receiver` into `store`.
///
/// Malformed batches are dropped (the store logs them) and the task keeps
/// running.  The task ends when the bus closes.
pub fn spawn_state_listener(store: Arc<JointStateStore>, mut receiver: StateReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = receiver.recv().await {
            // Rejected batches are already logged by the store.
            let _ = store.update(&batch);
        }
        debug!("joint state stream closed; listener exiting");
    })
}

/// Convenience wrapper: subscribe to `bus` and spawn the listener.
///
/// The subscription is taken before this function returns, so batches
/// published afterwards are never missed.
pub fn attach_store(bus: &StateBus, store: Arc<JointStateStore>) -> JoinHandle<()> {
    spawn_state_listener(store, bus.subscribe())
}

#[derive(Deserialize)]
struct RosbridgeFrame {
    #[serde(default)]
    topic: Option<String>,
    msg: JointStateMsg,
}

#[derive(Deserialize)]
struct JointStateMsg {
    #[serde(default)]
    name: Vec<String>,
    #[serde(default)]
    position: Vec<f64>,
    #[serde(default)]
    velocity: Vec<f64>,
}

/// Decode a rosbridge publish frame such as
///
/// ```json
/// {"op":"publish","topic":"/joint_states",
///  "msg":{"name":["elbow"],"position":[0.3],"velocity":[0.0]}}
/// ```
///
/// Absent arrays decode as empty; length mismatches are left for
/// [`JointStateStore::update`] to reject.
///
/// # Errors
///
/// Returns [`MotionError::MalformedInput`] when the frame is not valid JSON,
/// has no `msg` object, or names a topic other than [`JOINT_STATES_TOPIC`].
pub fn decode_rosbridge_joint_state(raw: &str) -> Result<JointStateBatch, MotionError> {
    let frame: RosbridgeFrame = serde_json::from_str(raw)
        .map_err(|e| MotionError::MalformedInput(format!("invalid joint state frame: {e}")))?;
    if let Some(topic) = frame.topic.as_deref()
        && topic != JOINT_STATES_TOPIC
    {
        return Err(MotionError::MalformedInput(format!(
            "unexpected topic {topic} on joint state stream"
        )));
    }
    Ok(JointStateBatch::new(
        frame.msg.name,
        frame.msg.position,
        frame.msg.velocity,
    ))
}
