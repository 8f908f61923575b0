use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use latency_probe::{ProbeConfig, TransportRegistry, Transports};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod handlers;
mod server;
mod traffic;

/// How long the traffic generator runs before the probe is restored.
const DEMO_DURATION_SECS: u64 = 10;
/// Concurrent traffic workers.
const DEMO_CONCURRENCY: u32 = 4;
const DEMO_ADDR: &str = "127.0.0.1:3001";

/// Shared state for the demo server: the simulated upstream API and the
/// record counter both hang off this.
pub struct AppState {
    /// Call records accepted on `POST /api/calls`.
    pub records_received: AtomicU64,

    /// Of those, how many describe a failed call.
    pub failed_records: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   ⏱   OUTBOUND API LATENCY PROBE  ·  DEMO         ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Configuration ─────────────────────────────────────────
    let config = ProbeConfig::from_env()?;
    info!(
        agent_url = %config.agent_url,
        sampling_rate = config.filter.sampling_rate,
        min_latency_ms = config.filter.min_latency_threshold_ms,
        filters = ?config.filter.endpoint_filters,
        "probe configuration loaded"
    );

    // ── 2. Demo server: upstream API + record counter ────────────
    let state = Arc::new(AppState {
        records_received: AtomicU64::new(0),
        failed_records: AtomicU64::new(0),
    });
    let app = server::create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(DEMO_ADDR).await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "demo server exited");
        }
    });
    println!("Upstream API    → {base_url}/api/users");
    println!("Record counter  → {base_url}/api/calls");
    println!();

    // ── 3. Instrument every transport on the global registry ─────
    let mut probe = latency_probe::install(config, Transports::all())?;
    info!(transports = ?probe.installed_kinds(), "instrumentation installed");

    // ── 4. Drive traffic through all four transports ─────────────
    let summary = traffic::run(
        TransportRegistry::global(),
        base_url,
        DEMO_CONCURRENCY,
        DEMO_DURATION_SECS,
    )
    .await;

    // ── 5. Restore and let in-flight records land ────────────────
    probe.restore();
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!();
    println!("Calls issued      : {}", summary.calls);
    println!("Calls failed      : {}", summary.failures);
    println!(
        "Records received  : {} ({} failures)",
        state.records_received.load(Ordering::Relaxed),
        state.failed_records.load(Ordering::Relaxed),
    );
    Ok(())
}
