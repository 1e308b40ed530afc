//! # Sweep Session
//!
//! Owns the configuration, key material and resolver of one recovery run and
//! caches the most recent discovery result. Re-running discovery swaps the
//! cached aggregate only once the new one is complete, so readers always see
//! one whole result.

use crate::config::SweepConfig;
use crate::discovery::{DiscoveryEngine, DiscoveryObserver, LogObserver, SilentObserver, SweepData};
use crate::error::{SweepError, SweepResult};
use crate::fee::SizeFeeEstimator;
use crate::keys::KeyManager;
use crate::services::UtxoResolver;
use crate::signer::SignedSweep;
use crate::transaction::{TransactionBuilder, UnsignedSweep};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of one discovery run
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub sweep_data: Arc<SweepData>,
    /// Key index scans that stopped early
    pub errors: Arc<Vec<SweepError>>,
}

pub struct SweepSession {
    config: SweepConfig,
    keys: KeyManager,
    resolver: Arc<dyn UtxoResolver>,
    observer: Arc<dyn DiscoveryObserver>,
    cached: RwLock<Option<Arc<SweepData>>>,
}

impl SweepSession {
    pub fn new(config: SweepConfig, keys: KeyManager, resolver: Arc<dyn UtxoResolver>) -> SweepResult<Self> {
        if keys.network() != config.network {
            return Err(SweepError::config(format!(
                "key material is for {} but the session targets {}",
                keys.network(),
                config.network
            )));
        }

        let observer: Arc<dyn DiscoveryObserver> = if config.logging {
            Arc::new(LogObserver)
        } else {
            Arc::new(SilentObserver)
        };

        Ok(Self {
            config,
            keys,
            resolver,
            observer,
            cached: RwLock::new(None),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn DiscoveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// Scan the wallet and replace the cached aggregate
    pub async fn discover(&self) -> SweepResult<SessionReport> {
        let engine = DiscoveryEngine::new(
            &self.config,
            &self.keys,
            self.resolver.as_ref(),
            self.observer.as_ref(),
        );
        let report = engine.run().await?;

        let sweep_data = Arc::new(report.sweep_data);
        *self.cached.write().await = Some(Arc::clone(&sweep_data));

        Ok(SessionReport {
            sweep_data,
            errors: Arc::new(report.errors),
        })
    }

    /// Most recent discovery result, if any
    pub async fn sweep_data(&self) -> Option<Arc<SweepData>> {
        self.cached.read().await.clone()
    }

    async fn current_or_discover(&self) -> SweepResult<Arc<SweepData>> {
        if let Some(data) = self.sweep_data().await {
            return Ok(data);
        }
        Ok(self.discover().await?.sweep_data)
    }

    /// Unsigned sweep of the cached funds, discovering first if needed
    pub async fn prepare(&self, destination: &str) -> SweepResult<UnsignedSweep> {
        let data = self.current_or_discover().await?;
        let estimator = SizeFeeEstimator::from_config(&self.config);
        TransactionBuilder::new(&self.keys, &estimator).prepare_sweep(&data, destination)
    }

    /// Signed sweep of the cached funds, discovering first if needed
    pub async fn sweep(&self, destination: &str) -> SweepResult<SignedSweep> {
        let data = self.current_or_discover().await?;
        let estimator = SizeFeeEstimator::from_config(&self.config);
        TransactionBuilder::new(&self.keys, &estimator).build_sweep_transaction(&data, destination)
    }
}
