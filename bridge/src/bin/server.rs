use std::net::SocketAddr;
use std::sync::Arc;

use tally_bridge::auth::{AuthConfig, JwtVerifier};
use tally_bridge::{start_server, BridgeState};
use tally_core::telemetry::{init_tracing, DEFAULT_FILTER};
use tally_core::{Tally, TallyConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing(DEFAULT_FILTER)?;

    let config = TallyConfig::load()?;
    let tally = Tally::new(&config)?;
    let verifier = JwtVerifier::new(&AuthConfig::from_env()?)?;

    let addr: SocketAddr = std::env::var("TALLY_BRIDGE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".into())
        .parse()?;

    let state = BridgeState::new(tally.orchestrator, Arc::new(verifier));

    tokio::select! {
        res = start_server(addr, state) => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(target: "bridge", "Shutdown signal received");
        }
    }

    Ok(())
}
