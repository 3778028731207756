//! AutoSweep daemon - automated multi-chain fund sweeping
//!
//! Derives a wallet from SWEEP_MNEMONIC, polls its balances on every
//! chain in SWEEP_CHAINS, and moves anything above the USD thresholds
//! to SWEEP_DESTINATION. Sweep events print to stdout; the chat
//! front-end that would normally consume them is plugged in through
//! the same notify callback.

use autosweep::{
    AlchemyPriceSource, ChainKey, ChainProfile, Deduplicator, EvmGatewayBuilder, PriceCache,
    SweepRegistry,
};

use eyre::{eyre, Result};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Maintenance pass interval (idle purge + cache eviction)
const MAINTENANCE_INTERVAL_SECS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!(
        r#"
    ╔══════════════════════════════════════════════╗
    ║                                              ║
    ║        A U T O S W E E P   v0.1.0            ║
    ║   Multi-chain wallet sweeping daemon         ║
    ║                                              ║
    ╚══════════════════════════════════════════════╝
    "#
    );

    // Required environment
    let mnemonic = std::env::var("SWEEP_MNEMONIC")
        .map_err(|_| eyre!("SWEEP_MNEMONIC not set (the wallet recovery phrase)"))?;
    let destination = std::env::var("SWEEP_DESTINATION")
        .map_err(|_| eyre!("SWEEP_DESTINATION not set (the sweep target address)"))?;
    if std::env::var("ALCHEMY_API_KEY").is_err() {
        eprintln!("⚠️  WARNING: ALCHEMY_API_KEY not set!");
        eprintln!("   Balance scans and price lookups will fail without it.");
        eprintln!();
    }

    let chains = std::env::var("SWEEP_CHAINS").unwrap_or_else(|_| "ethereum".to_string());

    // Wire the services (one isolated set per process)
    let prices = Arc::new(PriceCache::new(Arc::new(AlchemyPriceSource::new()?)));
    let dedup = Arc::new(Deduplicator::new());
    let registry = SweepRegistry::new(Arc::new(EvmGatewayBuilder), prices, dedup);

    let notify: autosweep::NotifyFn = Arc::new(|event: String| {
        println!("{}", event);
    });

    for raw in chains.split(',') {
        let chain = ChainKey::from_str(raw).map_err(|e| eyre!("{}", e))?;
        let profile = ChainProfile::from_env(chain);
        let started = registry
            .start_for("default", profile, &mnemonic, &destination, notify.clone())
            .map_err(|e| eyre!("{}", e))?;
        if started {
            println!("✅ Sweeping enabled on {}", chain);
        }
    }

    let maintenance = registry
        .clone()
        .spawn_maintenance(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));

    println!(
        "🕐 Daemon up since {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    // Run until Ctrl+C
    tokio::signal::ctrl_c().await?;
    println!("\n\n🛑 Shutting down gracefully...");

    let stopped = registry.stop_all();
    maintenance.abort();

    let stats = registry.stats();
    println!("\n📊 Final Statistics:");
    println!("   Cycles Stopped:      {}", stopped);
    println!("   Transfers Notified:  {}", stats.notified_transfers);

    Ok(())
}
