//! Sweep Cycle - the per-(account, chain) polling loop
//!
//! One cycle owns one wallet on one chain: fetch balances, price them,
//! budget gas, decide, execute, notify, reschedule. The first tick
//! runs immediately so users get instant feedback; afterwards the loop
//! sleeps for the chain's poll interval between ticks.
//!
//! Stop is cooperative: the running flag is checked at tick
//! boundaries and the sleep is woken early, but an in-flight transfer
//! submission is never cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::core::decision::{plan_sweep, select_tokens};
use crate::core::dedup::Deduplicator;
use crate::core::gas;
use crate::core::price_cache::PriceCache;
use crate::models::config::ChainProfile;
use crate::models::types::{ConfirmStatus, NotifyFn, SweepKey};
use crate::providers::ChainGateway;
use crate::utils::constants::CONFIRMATION_TIMEOUT_SECS;
use crate::utils::convert::{format_readable, normalize_symbol, short_hex};

/// One running sweep cycle. Constructed by the registry, driven by its
/// own tokio task via [`SweepCycle::run`].
pub struct SweepCycle {
    key: SweepKey,
    profile: ChainProfile,
    destination: Address,
    gateway: Arc<dyn ChainGateway>,
    prices: Arc<PriceCache>,
    dedup: Arc<Deduplicator>,
    notify: NotifyFn,
    running: AtomicBool,
    /// True while a transfer-execution phase is in flight. A wallet's
    /// nonce state cannot support concurrent signing, so a tick whose
    /// predecessor is still executing skips its own execution phase.
    executing: AtomicBool,
    wake: Notify,
}

impl SweepCycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: SweepKey,
        profile: ChainProfile,
        destination: Address,
        gateway: Arc<dyn ChainGateway>,
        prices: Arc<PriceCache>,
        dedup: Arc<Deduplicator>,
        notify: NotifyFn,
    ) -> Arc<Self> {
        Arc::new(Self {
            key,
            profile,
            destination,
            gateway,
            prices,
            dedup,
            notify,
            running: AtomicBool::new(true),
            executing: AtomicBool::new(false),
            wake: Notify::new(),
        })
    }

    pub fn key(&self) -> &SweepKey {
        &self.key
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request a cooperative stop: takes effect at the next tick
    /// boundary; a sleeping loop is woken immediately. notify_one
    /// stores a permit, so a stop landing just before the sleep still
    /// wakes it.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// The polling loop. First tick runs immediately.
    pub async fn run(self: Arc<Self>) {
        info!(
            "🚀 Sweep cycle started for {} (wallet {})",
            self.key,
            short_hex(&format!("{:#x}", self.gateway.wallet_address()))
        );
        (self.notify)(format!(
            "🚀 Sweeping {} | wallet {} → {}",
            self.profile.name,
            short_hex(&format!("{:#x}", self.gateway.wallet_address())),
            short_hex(&format!("{:#x}", self.destination)),
        ));

        loop {
            if !self.is_running() {
                break;
            }

            self.tick().await;

            if !self.is_running() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.profile.poll_interval) => {}
                _ = self.wake.notified() => {}
            }
        }

        info!("🛑 Sweep cycle {} stopped", self.key);
    }

    /// One evaluation + execution pass. Transient failures skip the
    /// tick, never the loop.
    pub async fn tick(&self) {
        let native_balance = match self.gateway.native_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("⚠️ Balance fetch failed for {}: {}", self.key, e);
                return;
            }
        };

        let fee = gas::fee_level(self.gateway.as_ref()).await;

        let token_balances = match self.gateway.token_balances().await {
            Ok(balances) => balances,
            Err(e) => {
                warn!(
                    "⚠️ Token scan failed for {}: {} - native only this tick",
                    self.key, e
                );
                Vec::new()
            }
        };

        // One batched lookup for every involved symbol, native included
        let mut symbols: Vec<String> =
            token_balances.iter().map(|t| t.symbol.clone()).collect();
        symbols.push(self.profile.native_symbol.clone());
        let prices = self.prices.get_prices(&symbols).await;

        let kept = select_tokens(&token_balances, &prices, self.profile.usd_threshold);
        let token_reserve = if kept.is_empty() {
            U256::ZERO
        } else {
            gas::token_transfer_reserve(self.gateway.as_ref(), self.destination, &kept, &fee).await
        };

        let native_price = prices
            .get(&normalize_symbol(&self.profile.native_symbol))
            .copied()
            .unwrap_or(0.0);

        let plan = plan_sweep(
            &self.profile,
            native_balance,
            native_price,
            &fee,
            kept,
            token_reserve,
        );
        if plan.is_empty() {
            debug!("Nothing to sweep for {}", self.key);
            return;
        }

        if self.executing.swap(true, Ordering::SeqCst) {
            warn!(
                "⏳ Previous execution still in flight for {}, skipping this tick's transfers",
                self.key
            );
            return;
        }
        // Cleared on drop: the flag cannot stay stuck after an early
        // return or panic in the execution phase.
        let _guard = ExecutingGuard(&self.executing);

        info!(
            "🧹 Executing sweep plan for {}: {} transfer(s)",
            self.key,
            plan.len()
        );

        // Native first, so the token gas reserve is untouched by the
        // native sweep; then tokens in descending USD value.
        if let Some(native) = &plan.native {
            let description = format!(
                "{} {} (${:.2})",
                format_readable(native.readable),
                self.profile.native_symbol,
                native.usd_value
            );
            match self
                .gateway
                .submit_native_transfer(self.destination, native.amount, &fee)
                .await
            {
                Ok(tx_hash) => self.finalize_transfer(&tx_hash, &description).await,
                Err(e) => warn!("⚠️ Native transfer failed on {}: {}", self.key, e),
            }
        }

        for candidate in &plan.tokens {
            let description = format!(
                "{} {} (${:.2})",
                format_readable(candidate.readable),
                candidate.token.symbol,
                candidate.usd_value
            );
            match self
                .gateway
                .submit_token_transfer(self.destination, &candidate.token, &fee)
                .await
            {
                Ok(tx_hash) => self.finalize_transfer(&tx_hash, &description).await,
                Err(e) => {
                    // One token's failure must not abort the rest of
                    // the plan.
                    warn!(
                        "⚠️ {} transfer failed on {}: {} - continuing",
                        candidate.token.symbol, self.key, e
                    );
                }
            }
        }
    }

    /// Bounded confirmation wait, then deduplicated notification. A
    /// timeout is treated as "submitted, outcome unknown": the
    /// transfer was broadcast, and the deduplicator absorbs the case
    /// where it is observed again later.
    async fn finalize_transfer(&self, tx_hash: &str, description: &str) {
        let status = match self
            .gateway
            .await_confirmation(tx_hash, Duration::from_secs(CONFIRMATION_TIMEOUT_SECS))
            .await
        {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    "⚠️ Confirmation poll failed for {}: {} - proceeding as submitted",
                    short_hex(tx_hash),
                    e
                );
                ConfirmStatus::Pending
            }
        };

        match status {
            ConfirmStatus::Reverted => {
                warn!("⚠️ Transfer {} reverted on {}", short_hex(tx_hash), self.key);
            }
            ConfirmStatus::Confirmed | ConfirmStatus::Pending => {
                if status == ConfirmStatus::Pending {
                    info!(
                        "⏳ Confirmation timed out for {}, proceeding as submitted",
                        short_hex(tx_hash)
                    );
                }
                if self.dedup.mark(tx_hash) {
                    (self.notify)(format!(
                        "✅ Swept {} on {}\n{}",
                        description,
                        self.profile.name,
                        self.profile.explorer_link(tx_hash)
                    ));
                } else {
                    debug!("Transfer {} already reported", short_hex(tx_hash));
                }
            }
        }
    }
}

struct ExecutingGuard<'a>(&'a AtomicBool);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
