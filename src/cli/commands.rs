//! CLI command implementations: build the engine from environment
//! configuration, then either serve forever or run one control action and
//! exit.

use std::sync::Arc;

use chrono::Utc;

use crate::config::EngineConfig;
use crate::coordinator::Coordinator;
use crate::events::{Event, EventBus};
use crate::gateway::{DbGateway, HttpGateway, RetryingGateway};
use crate::health::HealthMonitor;
use crate::http_server::{HttpServer, HttpServerConfig};
use crate::observability::Logger;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Runs one parsed subcommand to completion. Called directly from `main`.
pub fn run_command(cmd: Command) -> CliResult<()> {
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::from)?;
    runtime.block_on(async { dispatch(cmd).await })
}

fn build_gateway(config: &EngineConfig) -> Arc<dyn DbGateway> {
    let http = HttpGateway::new(config.primary.clone(), config.standby.clone());
    Arc::new(RetryingGateway::new(Arc::new(http), config.max_retry_attempts))
}

fn build_coordinator(config: &EngineConfig, gateway: Arc<dyn DbGateway>, events: EventBus, health: Arc<HealthMonitor>) -> Arc<Coordinator> {
    Arc::new(Coordinator::new(
        gateway,
        events,
        health,
        config.stats_file_path.clone(),
        crate::gateway::HashParams::default(),
        config.batch_size.max(1),
    ))
}

async fn dispatch(cmd: Command) -> CliResult<()> {
    let config = EngineConfig::from_env();

    match cmd {
        Command::Serve => serve(config).await,
        Command::RunOnce => one_shot(&config, |c| Box::pin(async move { Ok(serde_json::to_value(c.run_once().await)?) })).await,
        Command::ForceFull => one_shot(&config, |c| Box::pin(async move { Ok(serde_json::to_value(c.force_full().await)?) })).await,
        Command::ForceAuth => one_shot(&config, |c| Box::pin(async move { Ok(serde_json::to_value(c.force_auth().await)?) })).await,
        Command::Recover => one_shot(&config, |c| Box::pin(async move { Ok(serde_json::to_value(c.recover().await)?) })).await,
        Command::Reconcile => {
            one_shot(&config, |c| {
                Box::pin(async move {
                    let reports = c.reconcile().await.map_err(|e| CliError::engine_error(e.to_string()))?;
                    Ok(serde_json::to_value(reports)?)
                })
            })
            .await
        }
        Command::Stats => one_shot(&config, |c| Box::pin(async move { Ok(serde_json::to_value(c.stats().await)?) })).await,
        Command::ResetStats => {
            one_shot(&config, |c| {
                Box::pin(async move {
                    c.reset_stats().await.map_err(|e| CliError::engine_error(e.to_string()))?;
                    Ok(serde_json::to_value(c.stats().await)?)
                })
            })
            .await
        }
    }
}

type OneShotFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = CliResult<serde_json::Value>> + 'a>>;

/// Builds a one-off `Coordinator` against a fresh `HealthMonitor` probe,
/// runs `action`, and reports the result to stdout. No HTTP server, no
/// scheduler loop — the process exits as soon as the action completes.
async fn one_shot<'a, F>(config: &'a EngineConfig, action: F) -> CliResult<()>
where
    F: FnOnce(Arc<Coordinator>) -> OneShotFuture<'a>,
{
    let gateway = build_gateway(config);
    let events = EventBus::default();
    let health = Arc::new(HealthMonitor::new(gateway.clone(), events.clone()));
    health.refresh().await;

    let coordinator = build_coordinator(config, gateway, events, health);

    let value = action(coordinator).await?;
    write_response(&value)?;
    Ok(())
}

/// `serve` (§6a): starts the Health Monitor probe loop, the HTTP control
/// surface, and a fixed-interval `RunOnce` ticker, then blocks forever.
async fn serve(config: EngineConfig) -> CliResult<()> {
    let gateway = build_gateway(&config);
    let events = EventBus::default();
    let health = Arc::new(HealthMonitor::new(gateway.clone(), events.clone()));
    health.refresh().await;

    let coordinator = build_coordinator(&config, gateway, events.clone(), health.clone());

    let health_task = {
        let health = health.clone();
        let interval = config.health_probe_interval;
        tokio::spawn(async move { health.run_forever(interval).await })
    };

    let http_server = HttpServer::with_config(coordinator.clone(), HttpServerConfig::with_port(config.port));
    let http_task = tokio::spawn(async move {
        if let Err(err) = http_server.start().await {
            Logger::error("httpServerFailed", &[("reason", err.to_string().as_str())]);
        }
    });

    let scheduler_task = {
        let coordinator = coordinator.clone();
        let interval = config.run_interval;
        let events = events.clone();
        tokio::spawn(async move { run_scheduler(coordinator, events, interval).await })
    };

    Logger::info("serveStarted", &[("port", config.port.to_string().as_str())]);

    let _ = tokio::join!(health_task, http_task, scheduler_task);
    Ok(())
}

async fn run_scheduler(coordinator: Arc<Coordinator>, events: EventBus, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        events.publish(Event::AutoRunTriggered { timestamp: Utc::now(), interval_hint_secs: interval.as_secs() });
        coordinator.run_once().await;
    }
}
