//! naimlink CLI
//!
//! Connects to the device named in the config (default `naim.yaml`, or the
//! first argument), applies the optional `startup` actions once, then keeps
//! the session alive until Ctrl-C and prints the final state as JSON.

use tracing_subscriber::{fmt, EnvFilter};

use naimlink_client::config::{self, ClientConfig};
use naimlink_client::NaimClient;
use naimlink_core::Result;

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "naim.yaml".to_string());
    if let Err(e) = run(&path).await {
        tracing::error!(code = e.kind().as_str(), error = %e, "naimlink failed");
        std::process::exit(1);
    }
}

async fn run(path: &str) -> Result<()> {
    let cfg: ClientConfig = config::load_from_file(path)?;
    let startup = cfg.startup.clone();

    let client = NaimClient::new(cfg)?;
    tracing::info!(config = path, "naimlink starting");
    client.start().await?;

    tokio::select! {
        r = client.wait_until_running() => r?,
        _ = tokio::signal::ctrl_c() => {
            client.stop().await?;
            return Ok(());
        }
    }

    // The session reconnects on its own; a drop here only loses these commands.
    if let Err(e) = client.refresh().await {
        tracing::warn!(code = e.kind().as_str(), error = %e, "initial refresh failed");
    }
    if let Some(actions) = &startup {
        if let Err(e) = client.apply_startup(actions).await {
            tracing::warn!(code = e.kind().as_str(), error = %e, "startup actions failed");
        }
    }

    tokio::signal::ctrl_c().await?;
    client.stop().await?;

    let snapshot = client.device_state().snapshot();
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "state serialization failed"),
    }
    Ok(())
}
