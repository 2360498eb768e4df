//! Gateway command handler (agent + all enabled channels).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chipclaw::bus::MessageBus;
use chipclaw::channels::ChannelManager;

use super::common::{create_agent, init_logging, load_config};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the gateway and block until Ctrl-C.
pub(crate) async fn cmd_gateway(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    init_logging(&config);
    println!("Starting ChipClaw gateway...");

    let bus = Arc::new(MessageBus::with_capacity(
        config.agent.bus_capacity,
        config.agent.bus_capacity,
    ));
    let config = Arc::new(config);
    let agent = Arc::new(create_agent(config.clone(), bus.clone()).await?);

    let manager = ChannelManager::new(bus.clone());
    if manager.register_from_config(&config.channels).await == 0 {
        warn!("No channels enabled; enable uart, mqtt or console in the config");
    }
    let started = manager
        .start_all()
        .await
        .context("Failed to start channels")?;
    info!(channels = ?started, "Channels started");

    let dispatcher = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.dispatch_outbound().await })
    };
    let agent_task = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run().await })
    };

    println!("Gateway running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    println!();
    info!("Shutting down gateway");

    manager.stop_all().await?;

    agent.stop();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, agent_task)
        .await
        .is_err()
    {
        warn!("Agent loop did not stop within timeout");
    }

    bus.stop();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, dispatcher)
        .await
        .is_err()
    {
        warn!("Outbound dispatcher did not stop within timeout");
    }

    let stats = bus.dispatch_stats();
    info!(
        delivered = stats.delivered,
        undeliverable = stats.undeliverable,
        failed = stats.failed,
        "Gateway stopped"
    );
    Ok(())
}
