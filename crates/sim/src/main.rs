//! Demo host for the reflex runtime.
//!
//! Builds an in-memory world, loads the embedded rule set, runs the runtime
//! for a bounded time and prints the collected statistics as JSON.
//!
//! ```bash
//! RUST_LOG=runtime=debug REFLEX_SIM_SECS=3 cargo run -p reflex-sim
//! ```
mod rules;
mod world;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reflex_runtime::{HostBundle, Runtime, RuntimeConfig};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};

use world::World;

#[derive(Serialize)]
struct Report {
    runtime: reflex_runtime::RuntimeStats,
    effects: world::EffectTally,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = RuntimeConfig::from_env();
    let run_for = Duration::from_secs(
        std::env::var("REFLEX_SIM_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5),
    );
    tracing::info!(?config, run_secs = run_for.as_secs(), "starting simulation");

    let world = Arc::new(World::new());
    let mut runtime = Runtime::builder()
        .config(config.clone())
        .host(HostBundle::from_host(world.clone()))
        .rules(rules::demo_rules()?)
        .build()?;
    runtime.start()?;
    let handle = runtime.handle();

    let mut steps = time::interval(config.tick_duration);
    steps.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = time::sleep(run_for);
    tokio::pin!(deadline);

    let mut step = 0u64;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = steps.tick() => {
                world.step(step, &handle);
                step += 1;
            }
        }
    }
    world.depart(world::SAILOR, &handle);

    let report = Report {
        runtime: runtime.stats(),
        effects: world.tally(),
    };
    runtime.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(steps = step, "simulation finished");
    Ok(())
}
