//! reflex-agent: kernel-enforced process containment with userspace
//! anomaly scoring, monotonic escalation, and an operator override socket.

mod clock;
mod config;
mod handler;
mod lifecycle;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::lifecycle::AgentRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::load().context("loading configuration")?;
    let runtime = AgentRuntime::new(config).context("initializing agent")?;
    runtime.run().await
}
