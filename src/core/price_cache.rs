//! Price Cache Module
//!
//! Converts token symbols into USD unit prices while minimizing calls
//! to the rate-limited external oracle:
//! - Fresh-entry short-circuit (TTL based)
//! - Request coalescing: concurrent lookups for one symbol share a
//!   single outbound fetch
//! - Batch fetch (up to 30 symbols per request) with a minimum gap
//!   between requests
//! - Exponential backoff with jitter on failure; on a rate-limit
//!   response cached data is served immediately instead of retrying
//! - Stale entries are kept as a degraded fallback until the explicit
//!   cleanup pass evicts them
//!
//! A returned price of 0.0 means "unknown", never "worthless".

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use rand::Rng;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::providers::PriceSource;
use crate::utils::constants::{
    PRICE_BASE_RETRY_DELAY_MS, PRICE_BATCH_SIZE, PRICE_COALESCE_WAIT_SECS, PRICE_EVICT_HORIZON_SECS,
    PRICE_FETCH_MAX_RETRIES, PRICE_FRESH_TTL_SECS, PRICE_MIN_REQUEST_GAP_MS,
};
use crate::utils::convert::normalize_symbol;

/// Cached USD price with its fetch timestamp
#[derive(Clone, Debug)]
pub struct PriceEntry {
    pub price: f64,
    pub fetched_at: Instant,
}

impl PriceEntry {
    fn new(price: f64) -> Self {
        Self {
            price,
            fetched_at: Instant::now(),
        }
    }

    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Shared USD price cache. One instance serves every sweep cycle;
/// entries are independent per symbol so interleaved ticks never
/// corrupt each other.
pub struct PriceCache {
    source: Arc<dyn PriceSource>,
    /// normalized symbol -> entry
    entries: DashMap<String, PriceEntry>,
    /// Symbols currently being fetched; concurrent callers subscribe
    /// instead of issuing a second outbound request
    inflight: StdMutex<HashMap<String, watch::Receiver<bool>>>,
    /// Timestamp of the last outbound oracle request (rate limiting)
    last_fetch: Mutex<Option<Instant>>,
    fresh_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PriceCache {
    /// Create a cache with the default fresh TTL
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::with_ttl(source, Duration::from_secs(PRICE_FRESH_TTL_SECS))
    }

    /// Create a cache with a custom fresh TTL
    pub fn with_ttl(source: Arc<dyn PriceSource>, fresh_ttl: Duration) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            inflight: StdMutex::new(HashMap::new()),
            last_fetch: Mutex::new(None),
            fresh_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// USD price for one symbol. 0.0 = unknown.
    pub async fn get_price(&self, symbol: &str) -> f64 {
        let key = normalize_symbol(symbol);
        self.get_prices(&[symbol.to_string()])
            .await
            .remove(&key)
            .unwrap_or(0.0)
    }

    /// USD prices for many symbols in one call, keyed by normalized
    /// symbol. Fresh entries short-circuit; only the stale/missing
    /// subset reaches the batch-fetch path.
    pub async fn get_prices(&self, symbols: &[String]) -> HashMap<String, f64> {
        let mut requested: Vec<String> = Vec::new();
        for raw in symbols {
            let key = normalize_symbol(raw);
            if !key.is_empty() && !requested.contains(&key) {
                requested.push(key);
            }
        }

        let mut out = HashMap::new();
        let mut need: Vec<String> = Vec::new();

        for key in &requested {
            if let Some(entry) = self.entries.get(key) {
                if entry.age() < self.fresh_ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    out.insert(key.clone(), entry.price);
                    continue;
                }
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            need.push(key.clone());
        }

        if need.is_empty() {
            return out;
        }

        // Coalesce: claim symbols nobody is fetching, subscribe to the
        // rest.
        let mut to_fetch: Vec<String> = Vec::new();
        let mut claims: Vec<(String, watch::Sender<bool>)> = Vec::new();
        let mut waiters: Vec<watch::Receiver<bool>> = Vec::new();
        {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            for key in &need {
                if let Some(rx) = inflight.get(key) {
                    waiters.push(rx.clone());
                } else {
                    let (tx, rx) = watch::channel(false);
                    inflight.insert(key.clone(), rx);
                    claims.push((key.clone(), tx));
                    to_fetch.push(key.clone());
                }
            }
        }

        if !to_fetch.is_empty() {
            // The guard releases the claims and wakes subscribers even
            // if this future is dropped mid-fetch.
            let _claims = InflightClaims {
                cache: self,
                claims,
            };
            self.fetch_batched(&to_fetch).await;
        }

        join_all(waiters.iter_mut().map(|rx| async {
            let _ = tokio::time::timeout(
                Duration::from_secs(PRICE_COALESCE_WAIT_SECS),
                rx.changed(),
            )
            .await;
        }))
        .await;

        for key in need {
            let price = self.cached_fallback(&key);
            out.insert(key, price);
        }
        out
    }

    /// Last known value for a symbol, stale included. 0.0 when the
    /// cache has never held this symbol.
    fn cached_fallback(&self, key: &str) -> f64 {
        match self.entries.get(key) {
            Some(entry) => {
                if entry.age() >= self.fresh_ttl {
                    warn!(
                        "⚠️ Serving stale price for {} ({}s old)",
                        key,
                        entry.age().as_secs()
                    );
                }
                entry.price
            }
            None => {
                debug!("📭 No price available for {}", key);
                0.0
            }
        }
    }

    /// Fetch a symbol set in oracle-sized batches
    async fn fetch_batched(&self, symbols: &[String]) {
        for chunk in symbols.chunks(PRICE_BATCH_SIZE) {
            self.respect_rate_gap().await;

            let mut attempt: u32 = 0;
            loop {
                match self.source.fetch_prices(chunk).await {
                    Ok(fetched) => {
                        for (symbol, price) in fetched {
                            if price > 0.0 {
                                self.entries
                                    .insert(normalize_symbol(&symbol), PriceEntry::new(price));
                            }
                        }
                        break;
                    }
                    Err(e) if e.to_string().contains("429") => {
                        // Do not block callers behind a rate limit;
                        // cached data answers this round.
                        warn!("⏳ Price oracle rate limited; serving cached data");
                        break;
                    }
                    Err(e) => {
                        attempt += 1;
                        if attempt >= PRICE_FETCH_MAX_RETRIES {
                            warn!("⚠️ Price fetch failed after {} attempts: {}", attempt, e);
                            break;
                        }
                        let backoff = PRICE_BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
                        let jitter =
                            rand::thread_rng().gen_range(0..=PRICE_BASE_RETRY_DELAY_MS / 2);
                        debug!(
                            "🔄 Price fetch attempt {} failed ({}), retrying in {}ms",
                            attempt,
                            e,
                            backoff + jitter
                        );
                        tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                    }
                }
            }
        }
    }

    /// Enforce the minimum gap between oracle requests. Holding the
    /// lock across the sleep serializes concurrent batches, which is
    /// the point.
    async fn respect_rate_gap(&self) {
        let mut last = self.last_fetch.lock().await;
        if let Some(prev) = *last {
            let gap = Duration::from_millis(PRICE_MIN_REQUEST_GAP_MS);
            let elapsed = prev.elapsed();
            if elapsed < gap {
                tokio::time::sleep(gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Evict entries past the long retention horizon. Staleness alone
    /// never evicts; stale entries are the fallback when a refresh
    /// fails.
    pub fn clear_expired(&self) -> usize {
        let horizon = Duration::from_secs(PRICE_EVICT_HORIZON_SECS);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.age() < horizon);
        let removed = before - self.entries.len();
        if removed > 0 {
            info!("🧹 PRICE CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.entries.len(),
            hits,
            misses,
            hit_rate,
        }
    }
}

/// Removes inflight claims and wakes subscribers on drop, so a
/// cancelled fetch can never wedge a symbol in the inflight map.
struct InflightClaims<'a> {
    cache: &'a PriceCache,
    claims: Vec<(String, watch::Sender<bool>)>,
}

impl Drop for InflightClaims<'_> {
    fn drop(&mut self) {
        let mut inflight = self
            .cache
            .inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for (key, tx) in self.claims.drain(..) {
            inflight.remove(&key);
            let _ = tx.send(true);
        }
    }
}
