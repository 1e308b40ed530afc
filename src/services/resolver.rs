//! UTXO resolver seam consumed by fund discovery.

use crate::error::{SweepError, SweepResult};
use async_trait::async_trait;
use bitcoin::{OutPoint, ScriptBuf, Txid};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// An unspent output observed on chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    /// Value in satoshis
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

impl UnspentOutput {
    /// Parse the resolver's wire representation
    pub fn from_parts(txid: &str, vout: u32, value: u64, script_pubkey_hex: &str) -> SweepResult<Self> {
        let txid = Txid::from_str(txid)
            .map_err(|e| SweepError::config(format!("invalid txid '{}': {}", txid, e)))?;
        let script_pubkey = ScriptBuf::from_hex(script_pubkey_hex)
            .map_err(|e| SweepError::config(format!("invalid scriptPubKey '{}': {}", script_pubkey_hex, e)))?;

        Ok(Self {
            txid,
            vout,
            value,
            script_pubkey,
        })
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// Resolves the unspent outputs held by a batch of addresses.
///
/// Addresses without outputs are simply absent from the result.
#[async_trait]
pub trait UtxoResolver: Send + Sync {
    async fn resolve(&self, addresses: &[String]) -> SweepResult<HashMap<String, Vec<UnspentOutput>>>;

    /// Longest a healthy `resolve` call over `batch_len` addresses may take.
    ///
    /// Discovery never waits less than this for a batch.
    fn batch_deadline(&self, _batch_len: usize) -> Option<Duration> {
        None
    }
}
