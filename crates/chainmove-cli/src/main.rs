//! `chainmove` – run one synchronized move against a simulated robot
//!
//! The binary:
//!
//! 1. Loads the chain configuration (first argument, else `$CHAINMOVE_CONFIG`,
//!    else `config/chains.toml`) and the demo scenario from the same file.
//! 2. Builds a simulated robot that streams joint states into the shared
//!    store.
//! 3. Sends every chain to the scenario target, prints the per-chain
//!    outcome as JSON and waits for the robot to settle.
//!
//! Logging is configured by `RUST_LOG` and `CHAINMOVE_LOG_FORMAT=json`; see
//! [`telemetry`] for span export.
//!
//! Exits non-zero if the dispatch fails, any chain does not succeed, or the
//! robot does not settle in time.

mod scenario;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chainmove_hal::SimBackend;
use chainmove_middleware::{JointStateStore, StateBus, attach_store};
use chainmove_runtime::{ChainManager, ChainManagerConfig, TokioClock};
use chainmove_types::MotionError;
use tracing::{error, info};

use crate::scenario::Scenario;

const DEFAULT_CONFIG_PATH: &str = "config/chains.toml";

fn main() -> ExitCode {
    // Tracing first: the OTLP exporter must be built outside the runtime.
    let _telemetry = telemetry::init_tracing("chainmove");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config_path())) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "chainmove failed");
            ExitCode::FAILURE
        }
    }
}

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CHAINMOVE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

/// Read `path` once and parse both the manager configuration (with
/// `CHAINMOVE_*` overrides) and the demo scenario from it.
fn load(path: &Path) -> Result<(ChainManagerConfig, Scenario), MotionError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        MotionError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let config = ChainManagerConfig::from_toml_str_with_env(&raw)?;
    let scenario = Scenario::from_toml_str(&raw)?;
    Ok((config, scenario))
}

/// One move and settle cycle.  `Ok(false)` means the cycle ran but some
/// chain failed or the robot did not settle.
async fn run(path: PathBuf) -> Result<bool, MotionError> {
    let (config, scenario) = load(&path)?;
    info!(path = %path.display(), chains = config.chains.len(), "config loaded");

    let chain_joints: Vec<String> = config
        .chains
        .iter()
        .flat_map(|c| c.joints.iter().cloned())
        .collect();

    // ── Simulated robot and joint-state stream ────────────────────────────
    let world = scenario.world(&chain_joints);
    let bus = StateBus::default();
    let store = Arc::new(JointStateStore::new());
    let listener = attach_store(&bus, Arc::clone(&store));
    let publisher = world.spawn_publisher(bus.clone(), scenario.sim.publish_period());

    let backend = SimBackend::new()
        .with_world(world)
        .with_time_scale(scenario.sim.time_scale);

    let manager = ChainManager::new(config, &backend, store, Arc::new(TokioClock)).await?;

    // ── Move and settle ───────────────────────────────────────────────────
    let target = scenario.target_state(&chain_joints);
    let outcome = manager.move_to_state(&target).await?;
    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "failed to encode dispatch outcome"),
    }

    let settled = match manager.wait_to_settle().await {
        Ok(()) => {
            info!("robot settled");
            true
        }
        Err(e) => {
            error!(error = %e, "robot did not settle");
            false
        }
    };

    publisher.abort();
    listener.abort();
    Ok(outcome.all_succeeded() && settled)
}
