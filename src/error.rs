//! # Error Types for the Multisig Sweeper
//!
//! This module provides error handling for key derivation, fund discovery,
//! transaction assembly and signing, plus the network clients that feed them.

use thiserror::Error;

/// Main error type for all recovery and sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    /// Unrecognized network identifier (construction time)
    #[error("Unknown network: {network}")]
    UnknownNetwork { network: String },

    /// A path references a service key index that was never declared
    #[error("Unknown service key index: {key_index}")]
    UnknownKeyIndex { key_index: u32 },

    /// Malformed derivation path
    #[error("Invalid derivation path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// External UTXO lookup failed for one key index scan
    #[error("UTXO resolver failed for key index {key_index}: {message}")]
    Resolver { key_index: u32, message: String },

    /// Discovery completed with a zero balance
    #[error("No funds found across {addresses_searched} searched addresses")]
    NoFundsFound { addresses_searched: u64 },

    /// Balance does not cover the estimated fee plus the dust threshold
    #[error("Insufficient funds for fee: balance {balance} sats, fee {fee} sats, dust limit {dust_limit} sats")]
    InsufficientFundsForFee {
        balance: u64,
        fee: u64,
        dust_limit: u64,
    },

    /// Key/redeem-script mismatch or a signature that does not verify
    #[error("Signing failed for input {input_index}: {message}")]
    SigningFailure { input_index: usize, message: String },

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// BIP32 derivation failures (e.g. hardened step from a public parent)
    #[error("Key derivation failed: {source}")]
    KeyDerivation {
        #[from]
        source: bitcoin::bip32::Error,
    },

    /// Mnemonic phrase could not be parsed
    #[error("Invalid mnemonic: {source}")]
    Mnemonic {
        #[from]
        source: bip39::Error,
    },

    /// Address parsing and validation errors
    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },

    /// Network request failures (explorer API)
    #[error("Network request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// Explorer API responded with an error or unexpected payload
    #[error("Explorer request failed: {source}")]
    Explorer {
        #[from]
        source: NetworkError,
    },

    /// Bitcoin RPC communication failures
    #[error("RPC communication failed: {source}")]
    Rpc {
        #[from]
        source: bitcoincore_rpc::Error,
    },

    /// File I/O operations
    #[error("File operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for sweep operations
pub type SweepResult<T> = Result<T, SweepError>;

impl SweepError {
    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a path error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a resolver error scoped to one key index
    pub fn resolver(key_index: u32, message: impl Into<String>) -> Self {
        Self::Resolver {
            key_index,
            message: message.into(),
        }
    }

    /// Create a signing error for one input
    pub fn signing(input_index: usize, message: impl Into<String>) -> Self {
        Self::SigningFailure {
            input_index,
            message: message.into(),
        }
    }

    /// Check if this error is retryable (network/temporary issues)
    pub fn is_retryable(&self) -> bool {
        match self {
            SweepError::Network { source } => !source.is_decode() && !source.is_builder(),
            SweepError::Explorer { source } => source.is_retryable(),
            SweepError::Rpc { .. } | SweepError::Resolver { .. } => true,
            _ => false,
        }
    }

    /// Errors that abort a sweep outright rather than one key index scan
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SweepError::Resolver { .. })
    }
}

/// Network client specific errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failures
    #[error("HTTP request failed: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Timeout errors
    #[error("Request timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// API response validation errors
    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },
}

impl NetworkError {
    /// Rate limits, server errors and timeouts may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::HttpError { status, .. } => *status == 429 || *status >= 500,
            NetworkError::Timeout { .. } => true,
            NetworkError::InvalidResponse { .. } => false,
        }
    }
}
