//! # Multisig Sweep: 2-of-3 HD Wallet Recovery Library
//!
//! Recovers the funds of a 2-of-3 P2SH multisig HD wallet without the
//! custodial service's cooperation. The primary and backup seed phrases supply
//! two signatures; the service contributes only its published xpubs, which are
//! enough to rebuild every address.
//!
//! ## Flow
//!
//! ```text
//! mnemonics + service xpubs
//!        │
//!        ▼
//!   KeyManager ──> AddressGenerator ──> DiscoveryEngine ──> SweepData
//!                                        (UtxoResolver)        │
//!                                                              ▼
//!                        SignedSweep <── TransactionSigner <── TransactionBuilder
//!                                                              (FeeEstimator)
//! ```
//!
//! ## Module Structure
//!
//! - [`config`]: Network identifiers, defaults and [`SweepConfig`]
//! - [`keys`]: Key families and derivation paths
//! - [`address`]: Redeem scripts and P2SH addresses
//! - [`discovery`]: Gap-limit fund discovery
//! - [`transaction`]: Sweep transaction assembly
//! - [`fee`]: Size-based fee estimation
//! - [`signer`]: Two-of-three signing
//! - [`session`]: Cached discovery and sweep entry point
//! - [`services`]: Esplora and Bitcoin Core UTXO resolvers
//! - [`error`]: Centralized error types

pub mod address;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fee;
pub mod keys;
pub mod services;
pub mod session;
pub mod signer;
pub mod transaction;
pub mod utils;

// Re-export commonly used types
pub use address::{AddressGenerator, MultisigDescriptor};
pub use config::{ErrorPolicy, SweepConfig};
pub use discovery::{DiscoveryEngine, DiscoveryReport, SweepData, SweepSummary};
pub use error::{SweepError, SweepResult};
pub use fee::{FeeEstimator, SizeFeeEstimator};
pub use keys::{KeyManager, ServiceKey, SweepPath};
pub use services::{EsploraResolver, RpcResolver, UnspentOutput, UtxoResolver};
pub use session::SweepSession;
pub use signer::{SignedSweep, TransactionSigner};
pub use transaction::{TransactionBuilder, UnsignedSweep};
