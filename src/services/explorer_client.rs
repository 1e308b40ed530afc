//! # Esplora Explorer Client
//!
//! Resolves unspent outputs through an Esplora-compatible REST API
//! (`/address/{address}/utxo`), one request per address with bounded
//! concurrency inside a batch.

use crate::config::network::{EXPLORER_CONCURRENCY, REQUEST_TIMEOUT};
use crate::error::{NetworkError, SweepError, SweepResult};
use crate::services::resolver::{UnspentOutput, UtxoResolver};
use crate::utils::retry;
use async_trait::async_trait;
use bitcoin::{Network, Txid};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Confirmation status of an explorer UTXO
#[derive(Debug, Clone, Deserialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// One entry of `/address/{address}/utxo`
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: UtxoStatus,
}

/// Client for an Esplora block explorer API
#[derive(Debug, Clone)]
pub struct EsploraResolver {
    client: Client,
    api_base: String,
    network: Network,
}

impl EsploraResolver {
    /// Create a new explorer client
    pub fn new(api_base: impl Into<String>, network: Network) -> SweepResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SweepError::config(format!("client creation failed: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            network,
        })
    }

    /// Fetch the unspent outputs of one address
    pub async fn get_address_utxos(&self, address: &str) -> SweepResult<Vec<ExplorerUtxo>> {
        let url = format!("{}/address/{}/utxo", self.api_base, address);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout {
                    seconds: REQUEST_TIMEOUT.as_secs(),
                }
                .into()
            } else {
                SweepError::Network { source: e }
            }
        })?;

        if !response.status().is_success() {
            return Err(NetworkError::HttpError {
                status: response.status().as_u16(),
                message: format!("Failed to fetch UTXOs for {}", address),
            }
            .into());
        }

        let utxos: Vec<ExplorerUtxo> = response
            .json()
            .await
            .map_err(|e| SweepError::Network { source: e })?;

        Ok(utxos)
    }

    async fn resolve_one(&self, address: &str) -> SweepResult<(String, Vec<UnspentOutput>)> {
        let script_pubkey = crate::utils::address::validate_and_parse(address, self.network)?.script_pubkey();

        let utxos = retry::with_backoff(|| self.get_address_utxos(address), SweepError::is_retryable).await?;

        let outputs = utxos
            .into_iter()
            .map(|utxo| -> SweepResult<UnspentOutput> {
                let txid = Txid::from_str(&utxo.txid).map_err(|e| NetworkError::InvalidResponse {
                    message: format!("bad txid '{}': {}", utxo.txid, e),
                })?;
                Ok(UnspentOutput {
                    txid,
                    vout: utxo.vout,
                    value: utxo.value,
                    script_pubkey: script_pubkey.clone(),
                })
            })
            .collect::<SweepResult<Vec<_>>>()?;

        Ok((address.to_string(), outputs))
    }
}

#[async_trait]
impl UtxoResolver for EsploraResolver {
    async fn resolve(&self, addresses: &[String]) -> SweepResult<HashMap<String, Vec<UnspentOutput>>> {
        let resolved: Vec<(String, Vec<UnspentOutput>)> = stream::iter(addresses.to_vec())
            .map(|address| async move { self.resolve_one(&address).await })
            .buffer_unordered(EXPLORER_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(resolved
            .into_iter()
            .filter(|(_, outputs)| !outputs.is_empty())
            .collect())
    }

    fn batch_deadline(&self, batch_len: usize) -> Option<Duration> {
        let waves = batch_len.div_ceil(EXPLORER_CONCURRENCY) as u32;
        Some(retry::worst_case(REQUEST_TIMEOUT) * waves)
    }
}
