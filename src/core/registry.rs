//! Sweep Registry - indexes all cycles by (account, chain)
//!
//! Enforces the central invariant: at most one active cycle per
//! SweepKey. Start/stop for one pair, all chains of an account, or
//! everything; aggregate statistics; periodic purge of accounts with
//! no recent interaction.
//!
//! Service object with explicit construction - instances are
//! independent, so tests run isolated registries.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::cycle::SweepCycle;
use crate::core::dedup::Deduplicator;
use crate::core::price_cache::PriceCache;
use crate::models::config::{ChainKey, ChainProfile};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{GlobalStats, NotifyFn, SweepKey};
use crate::providers::GatewayBuilder;
use crate::utils::constants::ACCOUNT_IDLE_HORIZON_SECS;

struct CycleHandle {
    cycle: Arc<SweepCycle>,
    /// Kept so a dropped registry entry detaches rather than leaks
    /// the task; stop itself is cooperative, never an abort.
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

/// Owns every running sweep cycle
pub struct SweepRegistry {
    gateways: Arc<dyn GatewayBuilder>,
    prices: Arc<PriceCache>,
    dedup: Arc<Deduplicator>,
    cycles: DashMap<SweepKey, CycleHandle>,
    /// Last interaction per account, for the idle purge
    last_seen: DashMap<String, Instant>,
}

impl SweepRegistry {
    pub fn new(
        gateways: Arc<dyn GatewayBuilder>,
        prices: Arc<PriceCache>,
        dedup: Arc<Deduplicator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateways,
            prices,
            dedup,
            cycles: DashMap::new(),
            last_seen: DashMap::new(),
        })
    }

    /// Start a cycle for (account, profile.key). Returns Ok(false)
    /// when one is already running - starting is idempotent.
    ///
    /// Chain support, destination address and recovery phrase are
    /// validated here, synchronously; a bad configuration is rejected
    /// to the caller and never reaches the polling loop.
    pub fn start_for(
        &self,
        account_id: &str,
        profile: ChainProfile,
        secret: &str,
        destination: &str,
        notify: NotifyFn,
    ) -> AppResult<bool> {
        self.touch(account_id);

        let key = SweepKey::new(account_id, profile.key);
        if self.cycles.contains_key(&key) {
            debug!("Sweep already running for {}", key);
            return Ok(false);
        }

        let destination = Address::from_str(destination)
            .map_err(|_| AppError::invalid_destination(destination))?;
        let gateway = self.gateways.connect(&profile, secret)?;

        let cycle = SweepCycle::new(
            key.clone(),
            profile,
            destination,
            gateway,
            self.prices.clone(),
            self.dedup.clone(),
            notify,
        );
        let task = tokio::spawn(cycle.clone().run());

        match self.cycles.entry(key) {
            Entry::Occupied(_) => {
                // Lost a start race for the same key; the existing
                // cycle wins.
                cycle.request_stop();
                task.abort();
                Ok(false)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CycleHandle { cycle, task });
                Ok(true)
            }
        }
    }

    /// Stop one cycle. Returns false when none was running.
    pub fn stop_for(&self, account_id: &str, chain: ChainKey) -> bool {
        let key = SweepKey::new(account_id, chain);
        match self.cycles.remove(&key) {
            Some((_, handle)) => {
                handle.cycle.request_stop();
                info!("🛑 Stopped sweep for {}", key);
                true
            }
            None => false,
        }
    }

    /// Stop every cycle of one account; returns how many stopped
    pub fn stop_all_for(&self, account_id: &str) -> usize {
        let keys: Vec<SweepKey> = self
            .cycles
            .iter()
            .filter(|entry| entry.key().account_id == account_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut stopped = 0;
        for key in keys {
            if self.stop_for(&key.account_id, key.chain) {
                stopped += 1;
            }
        }
        stopped
    }

    /// Stop everything; returns how many cycles stopped
    pub fn stop_all(&self) -> usize {
        let keys: Vec<SweepKey> = self.cycles.iter().map(|entry| entry.key().clone()).collect();

        let mut stopped = 0;
        for key in keys {
            if self.stop_for(&key.account_id, key.chain) {
                stopped += 1;
            }
        }
        stopped
    }

    /// Whether a cycle is running for (account, chain)
    pub fn status_for(&self, account_id: &str, chain: ChainKey) -> bool {
        self.touch(account_id);
        self.cycles.contains_key(&SweepKey::new(account_id, chain))
    }

    /// Chains with an active cycle for this account
    pub fn active_chains_for(&self, account_id: &str) -> Vec<ChainKey> {
        self.touch(account_id);
        self.cycles
            .iter()
            .filter(|entry| entry.key().account_id == account_id)
            .map(|entry| entry.key().chain)
            .collect()
    }

    /// Aggregate statistics
    pub fn stats(&self) -> GlobalStats {
        let mut accounts: Vec<String> = self
            .cycles
            .iter()
            .map(|entry| entry.key().account_id.clone())
            .collect();
        accounts.sort();
        accounts.dedup();

        GlobalStats {
            active_accounts: accounts.len(),
            active_sweeps: self.cycles.len(),
            notified_transfers: self.dedup.len(),
        }
    }

    /// Stop and forget accounts with no interaction for `max_idle`.
    /// Returns how many accounts were purged.
    pub fn purge_inactive(&self, max_idle: Duration) -> usize {
        let stale: Vec<String> = self
            .last_seen
            .iter()
            .filter(|entry| entry.value().elapsed() > max_idle)
            .map(|entry| entry.key().clone())
            .collect();

        for account in &stale {
            let stopped = self.stop_all_for(account);
            self.last_seen.remove(account);
            if stopped > 0 {
                info!("🧹 Purged idle account {} ({} cycles stopped)", account, stopped);
            }
        }
        stale.len()
    }

    /// Background maintenance: idle-account purge plus price cache
    /// eviction. Returns the task handle so the host can abort it on
    /// shutdown.
    pub fn spawn_maintenance(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                self.purge_inactive(Duration::from_secs(ACCOUNT_IDLE_HORIZON_SECS));
                self.prices.clear_expired();
            }
        })
    }

    fn touch(&self, account_id: &str) {
        self.last_seen.insert(account_id.to_string(), Instant::now());
    }
}
