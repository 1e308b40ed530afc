//! # Services Module
//!
//! External UTXO lookups consumed by fund discovery.
//!
//! ## Components
//!
//! - **Resolver**: the `UtxoResolver` seam and the `UnspentOutput` it yields
//! - **Explorer Client**: Esplora REST API resolver
//! - **RPC Client**: Bitcoin Core `scantxoutset` resolver

pub mod explorer_client;
pub mod resolver;
pub mod rpc_client;

pub use explorer_client::EsploraResolver;
pub use resolver::{UnspentOutput, UtxoResolver};
pub use rpc_client::RpcResolver;
