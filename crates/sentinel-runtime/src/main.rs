//! Mempool-Sentinel entry point.
//!
//! Reads one JSON transaction per stdin line (the chain-node streamer is an
//! external collaborator; this is its delivery surface), runs each through
//! the decision loop, and logs the admission verdict. Runs until stdin
//! closes or SIGINT.

use anyhow::{Context, Result};
use sentinel_runtime::{Sentinel, SentinelConfig};
use shared_types::{FeatureMap, TxData};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let mut sentinel = Sentinel::builder()
        .with_config(SentinelConfig::standard())
        .build();
    sentinel.start();
    info!("sentinel ready; reading transactions from stdin (one JSON object per line)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = line.context("stdin read failed")?;
                let Some(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TxData>(&line) {
                    Ok(tx) => {
                        let admission = sentinel.admit(&tx, FeatureMap::new()).await;
                        info!(
                            tx = %tx.hash,
                            action = %admission.decision.action,
                            source = %admission.decision.source,
                            verdict = ?admission.verdict,
                            incident = %&admission.decision.incident.hash[..12],
                            "transaction processed"
                        );
                    }
                    Err(e) => warn!(error = %e, "unparseable transaction line"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "signal handler failed");
                }
                info!("interrupt received");
                break;
            }
        }
    }

    let status = sentinel.status();
    info!(
        decisions = status.decisions_made,
        rules_fired = status.rules_fired,
        simulations = status.simulations_run,
        incidents = status.incidents_logged,
        mode = %status.mitigation.mode,
        "final summary"
    );
    sentinel.shutdown().await;
    Ok(())
}
