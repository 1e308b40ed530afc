//! # Fund Discovery
//!
//! Scans the wallet's receive addresses, one service key index at a time, and
//! collects every unspent output found into a [`SweepData`] aggregate.
//!
//! ## Scan State Machine
//!
//! ```text
//!             ┌──────────────────────────────────────────────┐
//!             ▼                                              │ ≥1 funded address
//!   Scanning { batch_start } ──generate──> query resolver ───┤
//!                                              │             │ 0 funded addresses
//!                                              │ error       ▼
//!                                              ▼          Stopped (gap limit)
//!                                            Failed
//! ```
//!
//! Each key index owns its own offset. A batch that returns no funded address
//! ends the scan: funds are assumed never to sit past a full batch of unused
//! addresses. Resolver failures end only the affected key index scan unless
//! [`ErrorPolicy::FailFast`] is configured.

use crate::address::AddressGenerator;
use crate::config::{ErrorPolicy, SweepConfig};
use crate::error::{SweepError, SweepResult};
use crate::keys::{KeyManager, SweepPath};
use crate::services::{UnspentOutput, UtxoResolver};
use bitcoin::ScriptBuf;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// First index past the non-hardened range
const ADDRESS_INDEX_LIMIT: u32 = 1 << 31;

/// Outputs discovered at one address, with what is needed to spend them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUtxos {
    pub path: SweepPath,
    pub redeem_script: ScriptBuf,
    pub utxos: Vec<UnspentOutput>,
}

/// Aggregate result of discovery.
///
/// Append-only and keyed by address; totals are maintained on every insert so
/// they always equal the sum over `address_utxos`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepData {
    address_utxos: BTreeMap<String, AddressUtxos>,
    total_output_count: usize,
    total_balance: u64,
    total_addresses_searched: u64,
}

/// Discovery totals for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub balance: u64,
    pub output_count: usize,
    pub addresses_searched: u64,
    pub funded_addresses: usize,
}

impl SweepData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_utxos(&self) -> &BTreeMap<String, AddressUtxos> {
        &self.address_utxos
    }

    pub fn total_output_count(&self) -> usize {
        self.total_output_count
    }

    pub fn total_balance(&self) -> u64 {
        self.total_balance
    }

    pub fn total_addresses_searched(&self) -> u64 {
        self.total_addresses_searched
    }

    pub fn record_searched(&mut self, count: u64) {
        self.total_addresses_searched += count;
    }

    /// Append outputs for an address. Outpoints already recorded are skipped.
    pub fn record_funds(
        &mut self,
        address: String,
        path: SweepPath,
        redeem_script: ScriptBuf,
        utxos: Vec<UnspentOutput>,
    ) {
        if utxos.is_empty() {
            return;
        }

        let entry = self
            .address_utxos
            .entry(address)
            .or_insert_with(|| AddressUtxos {
                path,
                redeem_script,
                utxos: Vec::new(),
            });

        for utxo in utxos {
            if entry.utxos.iter().any(|known| known.outpoint() == utxo.outpoint()) {
                continue;
            }
            self.total_output_count += 1;
            self.total_balance = self.total_balance.saturating_add(utxo.value);
            entry.utxos.push(utxo);
        }
    }

    /// Fold another aggregate into this one
    pub fn merge(&mut self, other: SweepData) {
        self.total_addresses_searched += other.total_addresses_searched;
        for (address, entry) in other.address_utxos {
            self.record_funds(address, entry.path, entry.redeem_script, entry.utxos);
        }
    }

    pub fn summary(&self) -> SweepSummary {
        SweepSummary {
            balance: self.total_balance,
            output_count: self.total_output_count,
            addresses_searched: self.total_addresses_searched,
            funded_addresses: self.address_utxos.len(),
        }
    }
}

/// Receives discovery transitions.
///
/// All methods default to doing nothing.
pub trait DiscoveryObserver: Send + Sync {
    fn batch_generated(&self, _key_index: u32, _batch_start: u32, _count: u32) {}

    fn batch_resolved(&self, _key_index: u32, _batch_start: u32, _funded_addresses: usize, _balance: u64) {}

    fn scan_stopped(&self, _key_index: u32, _addresses_searched: u64) {}

    fn scan_failed(&self, _key_index: u32, _error: &SweepError) {}
}

/// Observer that reports through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DiscoveryObserver for LogObserver {
    fn batch_generated(&self, key_index: u32, batch_start: u32, count: u32) {
        log::debug!(
            "key index {}: generated addresses {}..{}",
            key_index,
            batch_start,
            batch_start as u64 + count as u64
        );
    }

    fn batch_resolved(&self, key_index: u32, batch_start: u32, funded_addresses: usize, balance: u64) {
        if funded_addresses > 0 {
            log::info!(
                "key index {}: batch at {} has {} funded addresses ({} sats)",
                key_index,
                batch_start,
                funded_addresses,
                balance
            );
        } else {
            log::info!("key index {}: batch at {} is empty", key_index, batch_start);
        }
    }

    fn scan_stopped(&self, key_index: u32, addresses_searched: u64) {
        log::info!(
            "key index {}: gap limit reached after {} addresses",
            key_index,
            addresses_searched
        );
    }

    fn scan_failed(&self, key_index: u32, error: &SweepError) {
        log::warn!("key index {}: scan aborted: {}", key_index, error);
    }
}

/// Observer that ignores every transition
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl DiscoveryObserver for SilentObserver {}

/// Where a key index scan currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Scanning { batch_start: u32 },
    Stopped,
    Failed,
}

/// Collaborators a scan needs to advance
pub struct ScanContext<'a> {
    pub generator: AddressGenerator<'a>,
    pub resolver: &'a dyn UtxoResolver,
    pub observer: &'a dyn DiscoveryObserver,
    pub resolver_timeout: Duration,
}

/// Gap-limit scan over the receive chain of one service key index
#[derive(Debug)]
pub struct KeyIndexScan {
    key_index: u32,
    batch_size: u32,
    state: ScanState,
    found: SweepData,
}

impl KeyIndexScan {
    pub fn new(key_index: u32, batch_size: u32) -> Self {
        Self {
            key_index,
            batch_size,
            state: ScanState::Scanning { batch_start: 0 },
            found: SweepData::new(),
        }
    }

    pub fn key_index(&self) -> u32 {
        self.key_index
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, ScanState::Scanning { .. })
    }

    pub fn found(&self) -> &SweepData {
        &self.found
    }

    pub fn into_found(self) -> SweepData {
        self.found
    }

    /// Generate, resolve and merge one batch, then pick the next state
    pub async fn step(&mut self, ctx: &ScanContext<'_>) -> SweepResult<()> {
        let batch_start = match self.state {
            ScanState::Scanning { batch_start } => batch_start,
            _ => return Ok(()),
        };

        let count = self.batch_size.min(ADDRESS_INDEX_LIMIT - batch_start);
        if count == 0 {
            self.stop(ctx.observer);
            return Ok(());
        }

        let batch = match ctx.generator.generate_batch(batch_start, count, self.key_index) {
            Ok(batch) => batch,
            Err(error) => return Err(self.fail(error, ctx.observer)),
        };
        ctx.observer.batch_generated(self.key_index, batch_start, count);
        self.found.record_searched(count as u64);

        let mut addresses: Vec<String> = batch.keys().cloned().collect();
        addresses.sort();

        let deadline = ctx
            .resolver
            .batch_deadline(addresses.len())
            .map_or(ctx.resolver_timeout, |deadline| deadline.max(ctx.resolver_timeout));

        let resolved = match tokio::time::timeout(deadline, ctx.resolver.resolve(&addresses)).await {
            Ok(Ok(resolved)) => resolved,
            Ok(Err(error)) => {
                let error = SweepError::resolver(self.key_index, error.to_string());
                return Err(self.fail(error, ctx.observer));
            }
            Err(_) => {
                let error = SweepError::resolver(
                    self.key_index,
                    format!("no response within {:?}", deadline),
                );
                return Err(self.fail(error, ctx.observer));
            }
        };

        let mut funded_addresses = 0;
        let mut balance = 0u64;
        for (address, utxos) in resolved {
            if utxos.is_empty() {
                continue;
            }
            let Some(entry) = batch.get(&address) else {
                log::warn!("resolver returned unrequested address {}", address);
                continue;
            };
            funded_addresses += 1;
            balance = utxos
                .iter()
                .fold(balance, |total, utxo| total.saturating_add(utxo.value));
            self.found
                .record_funds(address, entry.path.clone(), entry.redeem_script.clone(), utxos);
        }
        ctx.observer
            .batch_resolved(self.key_index, batch_start, funded_addresses, balance);

        match batch_start.checked_add(count) {
            Some(next) if funded_addresses > 0 && next < ADDRESS_INDEX_LIMIT => {
                self.state = ScanState::Scanning { batch_start: next };
            }
            _ => self.stop(ctx.observer),
        }
        Ok(())
    }

    fn stop(&mut self, observer: &dyn DiscoveryObserver) {
        self.state = ScanState::Stopped;
        observer.scan_stopped(self.key_index, self.found.total_addresses_searched());
    }

    fn fail(&mut self, error: SweepError, observer: &dyn DiscoveryObserver) -> SweepError {
        self.state = ScanState::Failed;
        observer.scan_failed(self.key_index, &error);
        error
    }
}

/// Final state of one key index scan
#[derive(Debug)]
pub struct ScanOutcome {
    pub key_index: u32,
    pub found: SweepData,
    pub error: Option<SweepError>,
}

/// Discovery result with the errors of any scans that ended early
#[derive(Debug)]
pub struct DiscoveryReport {
    pub sweep_data: SweepData,
    pub errors: Vec<SweepError>,
}

impl DiscoveryReport {
    /// True when at least one key index scan stopped on an error
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Drives a [`KeyIndexScan`] for every configured key index
pub struct DiscoveryEngine<'a> {
    config: &'a SweepConfig,
    keys: &'a KeyManager,
    resolver: &'a dyn UtxoResolver,
    observer: &'a dyn DiscoveryObserver,
}

impl<'a> DiscoveryEngine<'a> {
    pub fn new(
        config: &'a SweepConfig,
        keys: &'a KeyManager,
        resolver: &'a dyn UtxoResolver,
        observer: &'a dyn DiscoveryObserver,
    ) -> Self {
        Self {
            config,
            keys,
            resolver,
            observer,
        }
    }

    /// Scan every key index and return the merged aggregate
    pub async fn run(&self) -> SweepResult<DiscoveryReport> {
        let mut report = DiscoveryReport {
            sweep_data: SweepData::new(),
            errors: Vec::new(),
        };

        if self.config.parallel_key_scans {
            let scans = self
                .keys
                .key_indices()
                .iter()
                .map(|&key_index| self.scan_key_index(key_index));
            for outcome in join_all(scans).await {
                self.absorb(&mut report, outcome)?;
            }
        } else {
            for &key_index in self.keys.key_indices() {
                let outcome = self.scan_key_index(key_index).await;
                self.absorb(&mut report, outcome)?;
            }
        }

        Ok(report)
    }

    /// Run one key index scan to completion
    pub async fn scan_key_index(&self, key_index: u32) -> ScanOutcome {
        let ctx = ScanContext {
            generator: AddressGenerator::new(self.keys),
            resolver: self.resolver,
            observer: self.observer,
            resolver_timeout: self.config.resolver_timeout,
        };

        let mut scan = KeyIndexScan::new(key_index, self.config.sweep_batch_size);
        let mut error = None;
        while !scan.is_finished() {
            if let Err(e) = scan.step(&ctx).await {
                error = Some(e);
            }
        }

        ScanOutcome {
            key_index,
            found: scan.into_found(),
            error,
        }
    }

    fn absorb(&self, report: &mut DiscoveryReport, outcome: ScanOutcome) -> SweepResult<()> {
        report.sweep_data.merge(outcome.found);
        match outcome.error {
            None => Ok(()),
            Some(error) if !error.is_fatal() && self.config.error_policy == ErrorPolicy::ContinueOnError => {
                report.errors.push(error);
                Ok(())
            }
            Some(error) => Err(error),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::keys::tests::test_key_manager;
    use async_trait::async_trait;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory resolver with fixed balances and addresses that trigger failures
    #[derive(Default)]
    pub(crate) struct MockResolver {
        pub funded: HashMap<String, Vec<UnspentOutput>>,
        pub failing: HashSet<String>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl UtxoResolver for MockResolver {
        async fn resolve(&self, addresses: &[String]) -> SweepResult<HashMap<String, Vec<UnspentOutput>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if addresses.iter().any(|a| self.failing.contains(a)) {
                return Err(SweepError::config("simulated outage"));
            }
            Ok(addresses
                .iter()
                .filter_map(|a| self.funded.get(a).map(|utxos| (a.clone(), utxos.clone())))
                .collect())
        }
    }

    struct SlowResolver;

    #[async_trait]
    impl UtxoResolver for SlowResolver {
        async fn resolve(&self, _addresses: &[String]) -> SweepResult<HashMap<String, Vec<UnspentOutput>>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(HashMap::new())
        }
    }

    /// Slow resolver that declares how long a batch may take
    struct PacedResolver {
        delay: Duration,
        deadline: Duration,
    }

    #[async_trait]
    impl UtxoResolver for PacedResolver {
        async fn resolve(&self, _addresses: &[String]) -> SweepResult<HashMap<String, Vec<UnspentOutput>>> {
            tokio::time::sleep(self.delay).await;
            Ok(HashMap::new())
        }

        fn batch_deadline(&self, _batch_len: usize) -> Option<Duration> {
            Some(self.deadline)
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl DiscoveryObserver for RecordingObserver {
        fn batch_generated(&self, key_index: u32, batch_start: u32, _count: u32) {
            self.events.lock().unwrap().push(format!("generated {}:{}", key_index, batch_start));
        }

        fn scan_stopped(&self, key_index: u32, addresses_searched: u64) {
            self.events.lock().unwrap().push(format!("stopped {}:{}", key_index, addresses_searched));
        }

        fn scan_failed(&self, key_index: u32, _error: &SweepError) {
            self.events.lock().unwrap().push(format!("failed {}", key_index));
        }
    }

    pub(crate) fn utxo(seed: u8, vout: u32, value: u64) -> UnspentOutput {
        UnspentOutput {
            txid: Txid::from_byte_array([seed; 32]),
            vout,
            value,
            script_pubkey: ScriptBuf::new(),
        }
    }

    pub(crate) fn address_at(keys: &KeyManager, key_index: u32, address_index: u32) -> String {
        AddressGenerator::new(keys)
            .address_for_path(&SweepPath::receive(key_index, address_index))
            .unwrap()
            .address
            .to_string()
    }

    fn config(batch_size: u32) -> SweepConfig {
        SweepConfig::default()
            .with_batch_size(batch_size)
            .unwrap()
            .with_logging(false)
    }

    #[tokio::test]
    async fn test_empty_wallet_scans_one_batch_per_key_index() {
        let keys = test_key_manager(&[0, 1, 2]);
        let resolver = MockResolver::default();
        let config = config(10);

        let report = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();

        assert_eq!(report.sweep_data.total_addresses_searched(), 30);
        assert_eq!(report.sweep_data.total_balance(), 0);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
        assert!(!report.is_partial());
    }

    #[tokio::test]
    async fn test_gap_limit_after_funded_batch() {
        let keys = test_key_manager(&[0]);
        let mut resolver = MockResolver::default();
        resolver.funded.insert(address_at(&keys, 0, 0), vec![utxo(1, 0, 10_000)]);
        resolver.funded.insert(address_at(&keys, 0, 5), vec![utxo(2, 1, 20_000)]);
        let config = config(10);

        let engine = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver);
        let outcome = engine.scan_key_index(0).await;

        assert!(outcome.error.is_none());
        // The funded batch, then one empty batch that ends the scan.
        assert_eq!(outcome.found.total_addresses_searched(), 20);
        assert_eq!(outcome.found.total_balance(), 30_000);
        assert_eq!(outcome.found.address_utxos().len(), 2);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scan_state_transitions() {
        let keys = test_key_manager(&[4]);
        let mut resolver = MockResolver::default();
        resolver.funded.insert(address_at(&keys, 4, 3), vec![utxo(9, 0, 1_000)]);
        let observer = RecordingObserver::default();
        let ctx = ScanContext {
            generator: AddressGenerator::new(&keys),
            resolver: &resolver,
            observer: &observer,
            resolver_timeout: Duration::from_secs(5),
        };

        let mut scan = KeyIndexScan::new(4, 5);
        scan.step(&ctx).await.unwrap();
        assert_eq!(scan.state(), ScanState::Scanning { batch_start: 5 });
        scan.step(&ctx).await.unwrap();
        assert_eq!(scan.state(), ScanState::Stopped);

        // Further steps are no-ops once finished.
        scan.step(&ctx).await.unwrap();
        assert_eq!(scan.found().total_addresses_searched(), 10);
        assert_eq!(
            *observer.events.lock().unwrap(),
            vec!["generated 4:0", "generated 4:5", "stopped 4:10"]
        );
    }

    #[tokio::test]
    async fn test_totals_match_discovered_outputs() {
        let keys = test_key_manager(&[0, 1]);
        let mut resolver = MockResolver::default();
        let mut seed = 7u64;
        for key_index in [0, 1] {
            for address_index in [0, 2, 9, 14, 23] {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let outputs = (0..(seed % 3 + 1) as u32)
                    .map(|vout| utxo((address_index + key_index * 40) as u8, vout, 1_000 + (seed >> 40) % 100_000))
                    .collect();
                resolver.funded.insert(address_at(&keys, key_index, address_index), outputs);
            }
        }
        let config = config(10);

        let report = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();
        let data = report.sweep_data;

        let expected_balance: u64 = resolver.funded.values().flatten().map(|u| u.value).sum();
        let expected_count: usize = resolver.funded.values().map(Vec::len).sum();
        let listed_balance: u64 = data
            .address_utxos()
            .values()
            .flat_map(|entry| entry.utxos.iter())
            .map(|u| u.value)
            .sum();

        assert_eq!(data.total_balance(), expected_balance);
        assert_eq!(data.total_balance(), listed_balance);
        assert_eq!(data.total_output_count(), expected_count);
        // Batches 0, 10 and 20 are funded, batch 30 ends each scan.
        assert_eq!(data.total_addresses_searched(), 80);
    }

    fn failing_second_batch_resolver(keys: &KeyManager) -> MockResolver {
        let mut resolver = MockResolver::default();
        resolver.funded.insert(address_at(keys, 1, 3), vec![utxo(1, 0, 40_000)]);
        resolver.funded.insert(address_at(keys, 2, 1), vec![utxo(2, 0, 60_000)]);
        resolver.failing.insert(address_at(keys, 1, 12));
        resolver
    }

    #[tokio::test]
    async fn test_resolver_failure_is_isolated() {
        let keys = test_key_manager(&[1, 2]);
        let resolver = failing_second_batch_resolver(&keys);
        let config = config(10);

        let report = DiscoveryEngine::new(&config, &keys, &resolver, &LogObserver)
            .run()
            .await
            .unwrap();

        assert!(report.is_partial());
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], SweepError::Resolver { key_index: 1, .. }));
        // Funds from key index 1's first batch survive alongside key index 2.
        assert_eq!(report.sweep_data.total_balance(), 100_000);
        assert!(report.sweep_data.address_utxos().contains_key(&address_at(&keys, 2, 1)));
        assert_eq!(report.sweep_data.total_addresses_searched(), 40);
    }

    #[tokio::test]
    async fn test_fail_fast_policy() {
        let keys = test_key_manager(&[1, 2]);
        let resolver = failing_second_batch_resolver(&keys);
        let config = config(10).with_error_policy(ErrorPolicy::FailFast);

        let result = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver)
            .run()
            .await;
        assert!(matches!(result, Err(SweepError::Resolver { key_index: 1, .. })));
        // Key index 2 was never scanned.
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_parallel_scans_match_sequential() {
        let keys = test_key_manager(&[1, 2]);
        let resolver = failing_second_batch_resolver(&keys);
        let sequential = config(10);
        let parallel = config(10).with_parallel_key_scans(true);

        let a = DiscoveryEngine::new(&sequential, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();
        let b = DiscoveryEngine::new(&parallel, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();

        assert_eq!(a.sweep_data, b.sweep_data);
        assert_eq!(a.errors.len(), b.errors.len());
    }

    #[tokio::test]
    async fn test_resolver_timeout_fails_key_index() {
        let keys = test_key_manager(&[0]);
        let config = config(5).with_resolver_timeout(Duration::from_millis(20));

        let report = DiscoveryEngine::new(&config, &keys, &SlowResolver, &SilentObserver)
            .run()
            .await
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].to_string().contains("no response"));
        assert_eq!(report.sweep_data.total_addresses_searched(), 5);
    }

    #[tokio::test]
    async fn test_resolver_deadline_extends_batch_timeout() {
        let keys = test_key_manager(&[0]);
        let config = config(5).with_resolver_timeout(Duration::from_millis(20));
        let resolver = PacedResolver {
            delay: Duration::from_millis(100),
            deadline: Duration::from_secs(2),
        };

        let report = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();

        assert!(!report.is_partial());
        assert_eq!(report.sweep_data.total_addresses_searched(), 5);
    }

    #[tokio::test]
    async fn test_configured_timeout_is_a_floor() {
        let keys = test_key_manager(&[0]);
        let config = config(5).with_resolver_timeout(Duration::from_secs(2));
        // Declared deadline shorter than the configured one
        let resolver = PacedResolver {
            delay: Duration::from_millis(100),
            deadline: Duration::from_millis(10),
        };

        let report = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();
        assert!(!report.is_partial());
    }

    #[tokio::test]
    async fn test_oversized_values_saturate() {
        let keys = test_key_manager(&[0]);
        let mut resolver = MockResolver::default();
        resolver
            .funded
            .insert(address_at(&keys, 0, 0), vec![utxo(1, 0, u64::MAX), utxo(1, 1, 10)]);
        let config = config(5);

        let report = DiscoveryEngine::new(&config, &keys, &resolver, &SilentObserver)
            .run()
            .await
            .unwrap();
        assert_eq!(report.sweep_data.total_balance(), u64::MAX);
        assert_eq!(report.sweep_data.total_output_count(), 2);
    }

    #[test]
    fn test_merge_is_append_only() {
        let path = SweepPath::receive(0, 0);
        let mut left = SweepData::new();
        left.record_searched(10);
        left.record_funds("a".into(), path.clone(), ScriptBuf::new(), vec![utxo(1, 0, 500)]);

        let mut right = SweepData::new();
        right.record_searched(10);
        right.record_funds(
            "a".into(),
            path.clone(),
            ScriptBuf::new(),
            vec![utxo(1, 0, 500), utxo(1, 1, 700)],
        );
        right.record_funds("b".into(), path, ScriptBuf::new(), vec![utxo(2, 0, 300)]);

        left.merge(right);
        assert_eq!(left.total_addresses_searched(), 20);
        assert_eq!(left.total_output_count(), 3);
        assert_eq!(left.total_balance(), 1_500);
        assert_eq!(left.summary().funded_addresses, 2);
    }
}
