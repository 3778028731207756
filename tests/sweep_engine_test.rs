//! Integration tests for the sweep engine, driven through mock chain
//! and oracle collaborators

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use eyre::Result;

use autosweep::{
    ChainGateway, ChainKey, ChainProfile, ConfirmStatus, Deduplicator, FeeLevel, GatewayBuilder,
    NotifyFn, PriceCache, PriceSource, SuggestedFees, SweepCycle, SweepKey, SweepRegistry,
    TokenBalance,
};

const PHRASE: &str = "test test test test test test test test test test test junk";
const DEST: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

// ============================================
// MOCK COLLABORATORS
// ============================================

struct MockOracle {
    prices: Mutex<HashMap<String, f64>>,
}

impl MockOracle {
    fn with_prices(pairs: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            prices: Mutex::new(pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()),
        })
    }
}

#[async_trait]
impl PriceSource for MockOracle {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        let prices = self.prices.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Submitted {
    Native(U256),
    Token(String),
}

struct MockChain {
    address: Address,
    native_balance: Mutex<U256>,
    fees: SuggestedFees,
    tokens: Mutex<Vec<TokenBalance>>,
    estimate_gas: u64,
    confirm: Mutex<ConfirmStatus>,
    /// Forces every submission to report this hash (dedup tests)
    fixed_tx_hash: Mutex<Option<String>>,
    submitted: Mutex<Vec<Submitted>>,
    tx_counter: AtomicU64,
}

impl MockChain {
    fn new(native_balance: U256) -> Arc<Self> {
        Arc::new(Self {
            address: Address::repeat_byte(0x11),
            native_balance: Mutex::new(native_balance),
            fees: SuggestedFees {
                // Boosts to a 1.5 gwei legacy fee
                gas_price: 1_000_000_000,
                priority_fee: None,
            },
            tokens: Mutex::new(Vec::new()),
            estimate_gas: 50_000,
            confirm: Mutex::new(ConfirmStatus::Confirmed),
            fixed_tx_hash: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            tx_counter: AtomicU64::new(0),
        })
    }

    fn add_token(&self, symbol: &str, raw: u128, decimals: u8) {
        self.tokens.lock().unwrap().push(TokenBalance {
            contract: Address::repeat_byte(0x22),
            raw_amount: U256::from(raw),
            symbol: symbol.to_string(),
            decimals,
        });
    }

    fn submissions(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    fn next_hash(&self) -> String {
        if let Some(fixed) = self.fixed_tx_hash.lock().unwrap().clone() {
            return fixed;
        }
        format!("0x{:064x}", self.tx_counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChainGateway for MockChain {
    fn wallet_address(&self) -> Address {
        self.address
    }

    async fn native_balance(&self) -> Result<U256> {
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn suggested_fees(&self) -> Result<SuggestedFees> {
        Ok(self.fees)
    }

    async fn token_balances(&self) -> Result<Vec<TokenBalance>> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    async fn estimate_token_transfer_gas(
        &self,
        _dest: Address,
        _token: &TokenBalance,
    ) -> Result<u64> {
        Ok(self.estimate_gas)
    }

    async fn submit_native_transfer(
        &self,
        _dest: Address,
        amount: U256,
        _fee: &FeeLevel,
    ) -> Result<String> {
        self.submitted.lock().unwrap().push(Submitted::Native(amount));
        Ok(self.next_hash())
    }

    async fn submit_token_transfer(
        &self,
        _dest: Address,
        token: &TokenBalance,
        _fee: &FeeLevel,
    ) -> Result<String> {
        self.submitted
            .lock()
            .unwrap()
            .push(Submitted::Token(token.symbol.clone()));
        Ok(self.next_hash())
    }

    async fn await_confirmation(&self, _tx_hash: &str, _timeout: Duration) -> Result<ConfirmStatus> {
        Ok(self.confirm.lock().unwrap().clone())
    }
}

struct MockChainBuilder {
    chain: Arc<MockChain>,
}

impl GatewayBuilder for MockChainBuilder {
    fn connect(
        &self,
        _profile: &ChainProfile,
        _secret: &str,
    ) -> autosweep::AppResult<Arc<dyn ChainGateway>> {
        Ok(self.chain.clone())
    }
}

// ============================================
// TEST WIRING HELPERS
// ============================================

fn collector() -> (NotifyFn, Arc<Mutex<Vec<String>>>) {
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let notify: NotifyFn = Arc::new(move |event: String| {
        sink.lock().unwrap().push(event);
    });
    (notify, events)
}

fn sweep_count(events: &Arc<Mutex<Vec<String>>>) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.contains("Swept"))
        .count()
}

fn test_profile(native_usd_threshold: f64) -> ChainProfile {
    let mut profile = ChainProfile::for_chain(ChainKey::Ethereum);
    profile.usd_threshold = 5.0;
    profile.native_usd_threshold = native_usd_threshold;
    profile
}

fn build_cycle(
    chain: &Arc<MockChain>,
    oracle: Arc<MockOracle>,
    profile: ChainProfile,
    notify: NotifyFn,
) -> Arc<SweepCycle> {
    SweepCycle::new(
        SweepKey::new("alice", ChainKey::Ethereum),
        profile,
        Address::from_str(DEST).unwrap(),
        chain.clone(),
        Arc::new(PriceCache::new(oracle)),
        Arc::new(Deduplicator::new()),
        notify,
    )
}

fn build_registry(chain: &Arc<MockChain>, oracle: Arc<MockOracle>) -> Arc<SweepRegistry> {
    SweepRegistry::new(
        Arc::new(MockChainBuilder {
            chain: chain.clone(),
        }),
        Arc::new(PriceCache::new(oracle)),
        Arc::new(Deduplicator::new()),
    )
}

/// 1.5 gwei effective fee after the boost
const FEE_WEI: u128 = 1_500_000_000;
/// Cost of one native transfer at that fee
const NATIVE_COST: u128 = 21_000 * FEE_WEI;

// ============================================
// AT MOST ONE CYCLE PER (ACCOUNT, CHAIN)
// ============================================

#[tokio::test]
async fn test_second_start_reports_already_running() {
    let chain = MockChain::new(U256::ZERO);
    let registry = build_registry(&chain, MockOracle::with_prices(&[]));
    let (notify, _) = collector();

    let first = registry
        .start_for("alice", test_profile(10.0), PHRASE, DEST, notify.clone())
        .unwrap();
    let second = registry
        .start_for("alice", test_profile(10.0), PHRASE, DEST, notify.clone())
        .unwrap();

    assert!(first);
    assert!(!second, "second start for the same key must be a no-op");

    let stats = registry.stats();
    assert_eq!(stats.active_accounts, 1);
    assert_eq!(stats.active_sweeps, 1);

    // A different chain for the same account is a different key
    let mut base_profile = test_profile(10.0);
    base_profile.key = ChainKey::Base;
    assert!(registry
        .start_for("alice", base_profile, PHRASE, DEST, notify)
        .unwrap());
    assert_eq!(registry.stats().active_sweeps, 2);
    assert_eq!(registry.stats().active_accounts, 1);

    registry.stop_all();
}

#[tokio::test]
async fn test_stop_then_restart() {
    let chain = MockChain::new(U256::ZERO);
    let registry = build_registry(&chain, MockOracle::with_prices(&[]));
    let (notify, _) = collector();

    assert!(registry
        .start_for("alice", test_profile(10.0), PHRASE, DEST, notify.clone())
        .unwrap());
    assert!(registry.status_for("alice", ChainKey::Ethereum));
    assert_eq!(registry.active_chains_for("alice"), vec![ChainKey::Ethereum]);

    assert!(registry.stop_for("alice", ChainKey::Ethereum));
    assert!(!registry.status_for("alice", ChainKey::Ethereum));

    // The key is free again after a stop
    assert!(registry
        .start_for("alice", test_profile(10.0), PHRASE, DEST, notify)
        .unwrap());
    registry.stop_all();
}

#[tokio::test]
async fn test_stop_all_for_account_leaves_others() {
    let chain = MockChain::new(U256::ZERO);
    let registry = build_registry(&chain, MockOracle::with_prices(&[]));
    let (notify, _) = collector();

    registry
        .start_for("alice", test_profile(10.0), PHRASE, DEST, notify.clone())
        .unwrap();
    let mut base = test_profile(10.0);
    base.key = ChainKey::Base;
    registry
        .start_for("alice", base, PHRASE, DEST, notify.clone())
        .unwrap();
    registry
        .start_for("bob", test_profile(10.0), PHRASE, DEST, notify)
        .unwrap();

    assert_eq!(registry.stop_all_for("alice"), 2);
    assert!(registry.active_chains_for("alice").is_empty());
    assert!(registry.status_for("bob", ChainKey::Ethereum));

    assert_eq!(registry.stop_all(), 1);
}

// ============================================
// NOTIFICATION DEDUP ACROSS CONFIRMATION RETRIES
// ============================================

#[tokio::test]
async fn test_timed_out_transfer_notifies_once() {
    // Sweepable native balance, confirmation always times out, and the
    // chain reports the same hash on every submission.
    let chain = MockChain::new(U256::from(4_000_000_000_000_000u128 + NATIVE_COST));
    *chain.confirm.lock().unwrap() = ConfirmStatus::Pending;
    *chain.fixed_tx_hash.lock().unwrap() = Some("0xdeadbeef".to_string());

    let (notify, events) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[("eth", 3000.0)]),
        test_profile(10.0),
        notify,
    );

    cycle.tick().await;
    assert_eq!(sweep_count(&events), 1, "timeout still notifies once");

    // The next tick re-submits and observes the same identifier; the
    // user must not hear about it twice.
    cycle.tick().await;
    assert_eq!(chain.submissions().len(), 2);
    assert_eq!(sweep_count(&events), 1);
}

#[tokio::test]
async fn test_reverted_transfer_not_notified() {
    let chain = MockChain::new(U256::from(4_000_000_000_000_000u128 + NATIVE_COST));
    *chain.confirm.lock().unwrap() = ConfirmStatus::Reverted;

    let (notify, events) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[("eth", 3000.0)]),
        test_profile(10.0),
        notify,
    );

    cycle.tick().await;
    assert_eq!(chain.submissions().len(), 1);
    assert_eq!(sweep_count(&events), 0);
}

// ============================================
// DUST SUPPRESSION
// ============================================

#[tokio::test]
async fn test_dust_wallet_attempts_nothing() {
    // One gas unit short of the native transfer cost, with a
    // qualifying token waiting: no partial sweeps.
    let chain = MockChain::new(U256::from(NATIVE_COST - 1));
    chain.add_token("usdt", 100_000_000, 6); // $100

    let (notify, events) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[("eth", 3000.0), ("usdt", 1.0)]),
        test_profile(10.0),
        notify,
    );

    cycle.tick().await;
    assert!(chain.submissions().is_empty(), "dust wallet must not transfer");
    assert_eq!(sweep_count(&events), 0);
}

// ============================================
// GAS RESERVE CORRECTNESS
// ============================================

#[tokio::test]
async fn test_native_sweep_reserves_token_gas() {
    // 1 native coin, one qualifying token. The native sweep must leave
    // exactly transfer-cost + buffered token reserve behind.
    let one_coin = U256::from(1_000_000_000_000_000_000u128);
    let chain = MockChain::new(one_coin);
    chain.add_token("usdt", 100_000_000, 6);

    let (notify, _) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[("eth", 3000.0), ("usdt", 1.0)]),
        test_profile(10.0),
        notify,
    );

    cycle.tick().await;

    // 50_000 estimated units, +20% buffer, at the 1.5 gwei fee
    let token_reserve = U256::from(60_000u128 * FEE_WEI);
    let expected_native = one_coin - U256::from(NATIVE_COST) - token_reserve;

    let submissions = chain.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0], Submitted::Native(expected_native));
    assert_eq!(submissions[1], Submitted::Token("usdt".to_string()));
}

// ============================================
// EXECUTION ORDER
// ============================================

#[tokio::test]
async fn test_tokens_execute_in_descending_usd_order() {
    let chain = MockChain::new(U256::from(1_000_000_000_000_000_000u128));
    chain.add_token("fifty", 50_000_000, 6); // $50
    chain.add_token("five", 5_000_000, 6); // $5
    chain.add_token("twenty", 20_000_000, 6); // $20

    let (notify, _) = collector();
    // Native threshold sky-high so only tokens move
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[
            ("eth", 3000.0),
            ("fifty", 1.0),
            ("five", 1.0),
            ("twenty", 1.0),
        ]),
        test_profile(1_000_000.0),
        notify,
    );

    cycle.tick().await;

    let submissions = chain.submissions();
    assert_eq!(
        submissions,
        vec![
            Submitted::Token("fifty".to_string()),
            Submitted::Token("twenty".to_string()),
            Submitted::Token("five".to_string()),
        ]
    );
}

// ============================================
// PER-TRANSFER FAILURE ISOLATION
// ============================================

struct FlakyChain {
    inner: Arc<MockChain>,
    fail_symbol: String,
}

#[async_trait]
impl ChainGateway for FlakyChain {
    fn wallet_address(&self) -> Address {
        self.inner.wallet_address()
    }

    async fn native_balance(&self) -> Result<U256> {
        self.inner.native_balance().await
    }

    async fn suggested_fees(&self) -> Result<SuggestedFees> {
        self.inner.suggested_fees().await
    }

    async fn token_balances(&self) -> Result<Vec<TokenBalance>> {
        self.inner.token_balances().await
    }

    async fn estimate_token_transfer_gas(
        &self,
        dest: Address,
        token: &TokenBalance,
    ) -> Result<u64> {
        self.inner.estimate_token_transfer_gas(dest, token).await
    }

    async fn submit_native_transfer(
        &self,
        dest: Address,
        amount: U256,
        fee: &FeeLevel,
    ) -> Result<String> {
        self.inner.submit_native_transfer(dest, amount, fee).await
    }

    async fn submit_token_transfer(
        &self,
        dest: Address,
        token: &TokenBalance,
        fee: &FeeLevel,
    ) -> Result<String> {
        if token.symbol == self.fail_symbol {
            return Err(eyre::eyre!("nonce too low"));
        }
        self.inner.submit_token_transfer(dest, token, fee).await
    }

    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<ConfirmStatus> {
        self.inner.await_confirmation(tx_hash, timeout).await
    }
}

#[tokio::test]
async fn test_one_failed_transfer_does_not_abort_the_plan() {
    let inner = MockChain::new(U256::from(1_000_000_000_000_000_000u128));
    inner.add_token("fifty", 50_000_000, 6);
    inner.add_token("twenty", 20_000_000, 6);

    let gateway = Arc::new(FlakyChain {
        inner: inner.clone(),
        fail_symbol: "fifty".to_string(),
    });

    let (notify, events) = collector();
    let cycle = SweepCycle::new(
        SweepKey::new("alice", ChainKey::Ethereum),
        test_profile(1_000_000.0),
        Address::from_str(DEST).unwrap(),
        gateway,
        Arc::new(PriceCache::new(MockOracle::with_prices(&[
            ("eth", 3000.0),
            ("fifty", 1.0),
            ("twenty", 1.0),
        ]))),
        Arc::new(Deduplicator::new()),
        notify,
    );

    cycle.tick().await;

    // The failing first transfer was skipped, the second went through
    assert_eq!(
        inner.submissions(),
        vec![Submitted::Token("twenty".to_string())]
    );
    assert_eq!(sweep_count(&events), 1);
}

// ============================================
// END-TO-END SCENARIO
// ============================================

#[tokio::test]
async fn test_native_sweep_above_threshold() {
    // Sweepable native worth exactly $12 with a $10 threshold
    let sweepable = U256::from(4_000_000_000_000_000u128); // 0.004 @ $3000
    let chain = MockChain::new(sweepable + U256::from(NATIVE_COST));

    let (notify, events) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[("eth", 3000.0)]),
        test_profile(10.0),
        notify,
    );

    cycle.tick().await;

    assert_eq!(chain.submissions(), vec![Submitted::Native(sweepable)]);
    assert_eq!(sweep_count(&events), 1);
}

#[tokio::test]
async fn test_native_sweep_below_threshold_is_silent() {
    // Same $12 of sweepable value, but the threshold is $15: no
    // transfers, no notifications, the cycle just reschedules.
    let sweepable = U256::from(4_000_000_000_000_000u128);
    let chain = MockChain::new(sweepable + U256::from(NATIVE_COST));

    let (notify, events) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[("eth", 3000.0)]),
        test_profile(15.0),
        notify,
    );

    cycle.tick().await;

    assert!(chain.submissions().is_empty());
    assert!(events.lock().unwrap().is_empty());
    assert!(cycle.is_running());
}

#[tokio::test]
async fn test_unknown_native_price_holds_the_sweep() {
    // No price for the native symbol: zero means unknown, not
    // worthless, so nothing moves.
    let chain = MockChain::new(U256::from(1_000_000_000_000_000_000u128));

    let (notify, events) = collector();
    let cycle = build_cycle(
        &chain,
        MockOracle::with_prices(&[]),
        test_profile(10.0),
        notify,
    );

    cycle.tick().await;
    assert!(chain.submissions().is_empty());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_emits_start_notification_and_stops_cleanly() {
    let chain = MockChain::new(U256::ZERO);
    let registry = build_registry(&chain, MockOracle::with_prices(&[]));
    let (notify, events) = collector();

    registry
        .start_for("alice", test_profile(10.0), PHRASE, DEST, notify)
        .unwrap();

    // The spawned cycle announces itself on its first run
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.contains("Sweeping Ethereum")));

    assert!(registry.stop_for("alice", ChainKey::Ethereum));
    assert_eq!(registry.stats().active_sweeps, 0);
}
