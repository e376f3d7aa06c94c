//! Subchannel pool demo
//!
//! Drives the global pool through one full reference lifecycle:
//! 1. Two channels look up the same target pair and share one subchannel
//! 2. One channel holds its own reference across a sweep, keeping it pooled
//! 3. The channel releases it; the next sweep evicts it and cleanup stops
//! 4. A fresh lookup registers a new subchannel and re-arms cleanup
//!
//! Pool health is printed after each step, Prometheus metrics at exit.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use metrics_exporter_prometheus::PrometheusBuilder;
use subchannel::{ChannelCredentials, ChannelOptions, InsecureCredentials, Subchannel};
use subchannel_pool::Pool;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CHANNEL_TARGET: &str = "dns:///echo.internal:50051";
const SUBCHANNEL_TARGET: &str = "10.0.0.7:50051";

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, LOG_LEVEL / RUST_LOG filter
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = config::resolve_path(cli_config_path);
    let config = config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let pool = subchannel_pool::init_global_pool(&config)
        .context("failed to initialize global subchannel pool")?;
    info!(
        sweep_interval_secs = pool.sweep_interval().as_secs(),
        "global subchannel pool ready"
    );

    for (step, health) in run_scenario(&pool).await? {
        println!("== {step}\n{}", serde_json::to_string_pretty(&health)?);
    }
    println!("== metrics\n{}", prometheus.render());
    Ok(())
}

fn channel_options() -> ChannelOptions {
    ChannelOptions::new()
        .with("grpc.primary_user_agent", "subchannel-pool-demo")
        .with("grpc.keepalive_time_ms", 30_000i64)
}

fn credentials() -> Arc<dyn ChannelCredentials> {
    Arc::new(InsecureCredentials)
}

fn lookup(pool: &Pool) -> Subchannel {
    pool.get_or_create_subchannel(
        CHANNEL_TARGET,
        SUBCHANNEL_TARGET,
        &channel_options(),
        credentials(),
    )
}

/// Wait long enough for exactly one more cleanup tick.
async fn wait_for_sweep(pool: &Pool) {
    tokio::time::sleep(pool.sweep_interval() + Duration::from_millis(100)).await;
}

/// Run the lifecycle against `pool`, returning a health snapshot per step.
async fn run_scenario(pool: &Pool) -> Result<Vec<(&'static str, serde_json::Value)>> {
    let mut snapshots = Vec::new();

    let first = lookup(pool);
    let second = lookup(pool);
    ensure!(
        Subchannel::ptr_eq(&first, &second),
        "equal lookups must share one subchannel"
    );
    snapshots.push(("shared lookup", pool.health()));

    // A channel holds the subchannel across a sweep
    first.add_ref();
    wait_for_sweep(pool).await;
    ensure!(
        pool.stats().entries == 1,
        "referenced subchannel must survive the sweep"
    );
    snapshots.push(("sweep with channel reference", pool.health()));

    first.unref();
    wait_for_sweep(pool).await;
    ensure!(
        !pool.is_cleanup_armed(),
        "cleanup must stop once the pool is idle"
    );
    snapshots.push(("sweep after release", pool.health()));

    let fresh = lookup(pool);
    ensure!(
        !Subchannel::ptr_eq(&first, &fresh),
        "evicted subchannel must not be handed out again"
    );
    snapshots.push(("lookup after eviction", pool.health()));

    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scenario_runs_against_global_mode_pool() {
        let pool = Pool::new(true, Duration::from_secs(1));
        let snapshots = run_scenario(&pool).await.unwrap();

        let steps: Vec<&str> = snapshots.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            steps,
            vec![
                "shared lookup",
                "sweep with channel reference",
                "sweep after release",
                "lookup after eviction",
            ]
        );

        let (_, shared) = &snapshots[0];
        assert_eq!(shared["subchannels"][0]["refs"], 1);

        let (_, held) = &snapshots[1];
        assert_eq!(held["subchannels"][0]["refs"], 2);
        assert_eq!(held["pool"]["cleanup_armed"], true);

        let (_, released) = &snapshots[2];
        assert_eq!(released["status"], "idle");
        assert_eq!(released["pool"]["empty_buckets"], 1);

        let (_, fresh) = &snapshots[3];
        assert_eq!(fresh["status"], "active");
        assert_eq!(fresh["pool"]["cleanup_armed"], true);
    }

    #[tokio::test]
    async fn local_pool_scenario_fails_without_cleanup() {
        // No references are taken and no task runs, so the held subchannel
        // is never evicted and cleanup is never armed
        let pool = Pool::new(false, Duration::from_millis(10));
        let err = run_scenario(&pool).await.unwrap_err();
        assert!(
            err.to_string().contains("evicted subchannel"),
            "got: {err}"
        );
    }
}
