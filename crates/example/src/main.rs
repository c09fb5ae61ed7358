//! Example provisioning node CLI.
//!
//! Without arguments, runs the built-in VM/disk/network walkthrough against
//! an in-memory store. With a path, replays a JSON array of request
//! envelopes from that file instead and logs each outcome.
//!
//! # Usage
//!
//! ```bash
//! node [requests.json]
//! ```
//!
//! Logging is configured through `PROVISION_LOG` and `PROVISION_LOG_FORMAT`,
//! which may also be set in a `.env` file.

use example::{node, run, walkthrough};
use provision_core::TracingConfig;
use provision_engine::{Engine, Request};
use provision_store::{MemStore, Store, StoreError, UserId};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const USER: UserId = UserId::new(0);
const SPACE: &str = "default";

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let config = match TracingConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.init();

    let engine = node(Arc::new(MemStore::new()));
    tracing::info!(types = ?engine.resource_types(), "node started");

    let cancel = CancellationToken::new();
    let outcome = match std::env::args().nth(1) {
        Some(path) => replay(&engine, &cancel, Path::new(&path)).await,
        None => scenario(&engine, &cancel).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "node failed");
            ExitCode::FAILURE
        }
    }
}

async fn scenario(
    engine: &Engine,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    engine.store().space_create(USER, SPACE)?;
    let steps = walkthrough(USER, SPACE)?;
    let count = run(engine, cancel, steps).await?;

    let remaining = engine.store().resource_list(USER, SPACE)?;
    tracing::info!(steps = count, ?remaining, "walkthrough complete");
    Ok(())
}

async fn replay(
    engine: &Engine,
    cancel: &CancellationToken,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read(path)?;
    let requests: Vec<Request> = serde_json::from_slice(&raw)?;
    tracing::info!(path = %path.display(), requests = requests.len(), "replaying requests");

    for request in requests {
        // spaces are created on demand so request files stay self-contained
        match engine.store().space_create(request.user, &request.space) {
            Ok(()) | Err(StoreError::SpaceExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let summary = format!(
            "{} {} {}",
            request.kind, request.resource.action, request.resource.resource_id
        );
        match engine.handle(cancel.clone(), request).await {
            Ok(response) => {
                let payload: serde_json::Value = response.payload.decode()?;
                tracing::info!(%payload, "{summary}: ok");
            }
            Err(e) => tracing::warn!(error = %e, kind = ?e.kind(), "{summary}: failed"),
        }
    }
    Ok(())
}
