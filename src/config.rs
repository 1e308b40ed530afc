//! # Configuration
//!
//! Constants used throughout the sweeper, plus the immutable [`SweepConfig`]
//! handed to each component at construction.

use crate::error::{SweepError, SweepResult};
use bitcoin::Network;
use std::time::Duration;

/// Network and explorer configuration
pub mod network {
    use std::time::Duration;

    /// Default RPC host for `scantxoutset` lookups
    pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";

    /// Default RPC port (mainnet)
    pub const DEFAULT_RPC_PORT: &str = "8332";

    /// Default RPC username
    pub const DEFAULT_RPC_USER: &str = "user";

    /// Default RPC password
    pub const DEFAULT_RPC_PASSWORD: &str = "password";

    /// Esplora API endpoints per network
    pub const ESPLORA_MAINNET: &str = "https://blockstream.info/api";
    pub const ESPLORA_TESTNET: &str = "https://blockstream.info/testnet/api";
    pub const ESPLORA_SIGNET: &str = "https://mempool.space/signet/api";
    pub const ESPLORA_REGTEST: &str = "http://127.0.0.1:3002";

    /// Request timeout for a single HTTP call
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Retry attempts for explorer calls
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;

    /// Base delay between retries, doubled on each attempt
    pub const RETRY_DELAY: Duration = Duration::from_millis(500);

    /// Concurrent explorer requests per batch
    pub const EXPLORER_CONCURRENCY: usize = 8;
}

/// Sweep operation constants
pub mod sweep {
    use std::time::Duration;

    /// Addresses generated and queried per discovery batch.
    ///
    /// This is also the gap limit: a scan stops after one full batch of
    /// consecutive unused addresses.
    pub const DEFAULT_BATCH_SIZE: u32 = 200;

    /// Default fee rate in sat/vB for the static size-based estimate
    pub const DEFAULT_FEE_RATE: u64 = 10;

    /// Outputs below this value are not relayed by standard nodes
    pub const DUST_LIMIT_SATS: u64 = 546;

    /// Upper bound on one resolver call before the key index scan is abandoned
    pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(30);

    /// Receive chain; change-chain addresses are never swept
    pub const RECEIVE_CHAIN: u32 = 0;
}

/// File paths and names
pub mod files {
    /// Default service key list
    pub const SERVICE_KEYS_FILE: &str = "service_keys.json";
}

/// Environment variable names
pub mod env {
    /// Main mnemonic phrase
    pub const PRIMARY_MNEMONIC: &str = "PRIMARY_MNEMONIC";

    /// Passphrase protecting the main mnemonic
    pub const PRIMARY_PASSPHRASE: &str = "PRIMARY_PASSPHRASE";

    /// Backup mnemonic phrase
    pub const BACKUP_MNEMONIC: &str = "BACKUP_MNEMONIC";

    /// Explorer URL override
    pub const ESPLORA_URL: &str = "ESPLORA_URL";

    /// RPC URL override
    pub const RPC_URL: &str = "RPC_URL";

    /// RPC port override
    pub const RPC_PORT: &str = "RPC_PORT";

    /// RPC username override
    pub const RPC_USER: &str = "RPC_USER";

    /// RPC password override
    pub const RPC_PASSWORD: &str = "RPC_PASSWORD";
}

/// What discovery does when a resolver call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop only the affected key index scan and keep going
    #[default]
    ContinueOnError,
    /// Abort the whole discovery on the first resolver error
    FailFast,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue-on-error" | "continue" => Ok(ErrorPolicy::ContinueOnError),
            "fail-fast" => Ok(ErrorPolicy::FailFast),
            _ => Err(format!("Invalid error policy: {}", s)),
        }
    }
}

/// Map a network identifier such as `btc-mainnet` onto a bitcoin network.
pub fn parse_network(identifier: &str) -> SweepResult<Network> {
    match identifier.to_lowercase().as_str() {
        "btc-mainnet" | "btc" | "bitcoin" => Ok(Network::Bitcoin),
        "btc-testnet" | "tbtc" => Ok(Network::Testnet),
        "btc-signet" => Ok(Network::Signet),
        "btc-regtest" => Ok(Network::Regtest),
        _ => Err(SweepError::UnknownNetwork {
            network: identifier.to_string(),
        }),
    }
}

/// Default Esplora base URL for a network
pub fn esplora_base(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => network::ESPLORA_MAINNET,
        Network::Signet => network::ESPLORA_SIGNET,
        Network::Regtest => network::ESPLORA_REGTEST,
        _ => network::ESPLORA_TESTNET,
    }
}

/// Immutable settings shared by every component of one sweep session
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub network: Network,
    pub sweep_batch_size: u32,
    /// Fee rate in sat/vB
    pub fee_rate: u64,
    pub error_policy: ErrorPolicy,
    pub parallel_key_scans: bool,
    pub resolver_timeout: Duration,
    pub logging: bool,
}

impl SweepConfig {
    /// Build a configuration from a network identifier.
    ///
    /// `testnet` overrides whatever `network` resolves to.
    pub fn new(network: &str, testnet: bool) -> SweepResult<Self> {
        let network = match parse_network(network)? {
            _ if testnet => Network::Testnet,
            parsed => parsed,
        };

        Ok(Self {
            network,
            ..Self::default()
        })
    }

    pub fn with_batch_size(mut self, sweep_batch_size: u32) -> SweepResult<Self> {
        if sweep_batch_size == 0 {
            return Err(SweepError::config("sweep batch size must be positive"));
        }
        self.sweep_batch_size = sweep_batch_size;
        Ok(self)
    }

    pub fn with_fee_rate(mut self, fee_rate: u64) -> SweepResult<Self> {
        if fee_rate == 0 {
            return Err(SweepError::config("fee rate must be positive"));
        }
        self.fee_rate = fee_rate;
        Ok(self)
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn with_parallel_key_scans(mut self, parallel: bool) -> Self {
        self.parallel_key_scans = parallel;
        self
    }

    pub fn with_resolver_timeout(mut self, timeout: Duration) -> Self {
        self.resolver_timeout = timeout;
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            sweep_batch_size: sweep::DEFAULT_BATCH_SIZE,
            fee_rate: sweep::DEFAULT_FEE_RATE,
            error_policy: ErrorPolicy::default(),
            parallel_key_scans: false,
            resolver_timeout: sweep::DEFAULT_RESOLVER_TIMEOUT,
            logging: true,
        }
    }
}
