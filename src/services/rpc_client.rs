use crate::config::{env as config_env, network};
use crate::error::{SweepError, SweepResult};
use crate::services::resolver::{UnspentOutput, UtxoResolver};
use async_trait::async_trait;
use bitcoin::Amount;
use bitcoincore_rpc::{Auth, Client, RpcApi};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

/// Resolves UTXOs with Bitcoin Core's `scantxoutset`, one scan per batch
#[derive(Debug, Clone)]
pub struct RpcResolver {
    client: Arc<Client>,
}

impl RpcResolver {
    /// Create a new RPC client with configuration from environment or defaults
    pub fn new() -> SweepResult<Self> {
        // Load environment variables
        dotenv::dotenv().ok();

        let rpc_url = env::var(config_env::RPC_URL)
            .unwrap_or_else(|_| network::DEFAULT_RPC_HOST.to_string());
        let rpc_port = env::var(config_env::RPC_PORT)
            .unwrap_or_else(|_| network::DEFAULT_RPC_PORT.to_string());
        let rpc_user = env::var(config_env::RPC_USER)
            .unwrap_or_else(|_| network::DEFAULT_RPC_USER.to_string());
        let rpc_password = env::var(config_env::RPC_PASSWORD)
            .unwrap_or_else(|_| network::DEFAULT_RPC_PASSWORD.to_string());

        let auth = Auth::UserPass(rpc_user, rpc_password);
        let url = format!("http://{}:{}", rpc_url, rpc_port);

        let client = Client::new(&url, auth).map_err(|e| SweepError::Rpc { source: e })?;

        Ok(RpcResolver {
            client: Arc::new(client),
        })
    }
}

fn scan_utxos(client: &Client, addresses: &[String]) -> SweepResult<Vec<Value>> {
    let scanobjects: Vec<Value> = addresses
        .iter()
        .map(|address| Value::String(format!("addr({})", address)))
        .collect();

    let result: Value = client
        .call(
            "scantxoutset",
            &[Value::String("start".to_string()), Value::Array(scanobjects)],
        )
        .map_err(|e| SweepError::Rpc { source: e })?;

    if let Some(unspents) = result["unspents"].as_array() {
        Ok(unspents.clone())
    } else {
        Ok(vec![])
    }
}

/// Group `scantxoutset` entries by address, matching on scriptPubKey
fn group_unspents(
    addresses: &[String],
    unspents: &[Value],
) -> SweepResult<HashMap<String, Vec<UnspentOutput>>> {
    let mut script_to_address = HashMap::new();
    for address in addresses {
        let parsed: bitcoin::Address<bitcoin::address::NetworkUnchecked> = address
            .parse()
            .map_err(|_| SweepError::InvalidAddress {
                address: address.clone(),
            })?;
        script_to_address.insert(parsed.assume_checked().script_pubkey(), address.clone());
    }

    let mut grouped: HashMap<String, Vec<UnspentOutput>> = HashMap::new();
    for entry in unspents {
        let field = |name: &str| {
            entry[name]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| SweepError::config(format!("scantxoutset entry missing '{}'", name)))
        };
        let vout = entry["vout"]
            .as_u64()
            .ok_or_else(|| SweepError::config("scantxoutset entry missing 'vout'"))?;
        let vout = u32::try_from(vout)
            .map_err(|_| SweepError::config(format!("scantxoutset vout {} out of range", vout)))?;
        let btc = entry["amount"]
            .as_f64()
            .ok_or_else(|| SweepError::config("scantxoutset entry missing 'amount'"))?;
        let value = Amount::from_btc(btc)
            .map_err(|e| SweepError::config(format!("invalid amount {}: {}", btc, e)))?
            .to_sat();

        let utxo = UnspentOutput::from_parts(&field("txid")?, vout, value, &field("scriptPubKey")?)?;
        match script_to_address.get(&utxo.script_pubkey) {
            Some(address) => grouped.entry(address.clone()).or_default().push(utxo),
            None => log::warn!("scantxoutset returned an output for an unrequested script"),
        }
    }

    Ok(grouped)
}

#[async_trait]
impl UtxoResolver for RpcResolver {
    async fn resolve(&self, addresses: &[String]) -> SweepResult<HashMap<String, Vec<UnspentOutput>>> {
        let client = Arc::clone(&self.client);
        let owned = addresses.to_vec();

        // The RPC client blocks for the whole UTXO set scan.
        let unspents = tokio::task::spawn_blocking(move || scan_utxos(&client, &owned))
            .await
            .map_err(|e| SweepError::config(format!("scan task failed: {}", e)))??;

        group_unspents(addresses, &unspents)
    }
}
