//! # Sweep Transaction Builder
//!
//! Turns a [`SweepData`] aggregate into one transaction spending every
//! discovered output to a single destination.
//!
//! ## Transaction Structure
//! - **Version**: 2
//! - **Locktime**: 0
//! - **Inputs**: one per discovered output, RBF enabled
//! - **Output**: destination with `balance - fee`
//!
//! Building is split in two stages. [`TransactionBuilder::prepare_sweep`]
//! returns the unsigned transaction together with the metadata each input
//! needs for signing, and [`TransactionBuilder::build_sweep_transaction`]
//! hands that to the [`TransactionSigner`].

use crate::config::sweep::DUST_LIMIT_SATS;
use crate::discovery::SweepData;
use crate::error::{SweepError, SweepResult};
use crate::fee::FeeEstimator;
use crate::keys::{KeyManager, SweepPath};
use crate::signer::{SignedSweep, TransactionSigner};
use crate::utils::address::validate_and_parse;
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

/// Everything needed to sign one input without another lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepInput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub path: SweepPath,
    pub redeem_script: ScriptBuf,
}

/// Sweep transaction before signing.
///
/// `inputs[i]` describes `tx.input[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedSweep {
    pub tx: Transaction,
    pub inputs: Vec<SweepInput>,
    pub fee: u64,
}

impl UnsignedSweep {
    pub fn input_total(&self) -> u64 {
        self.inputs.iter().fold(0, |total, input| total.saturating_add(input.value))
    }

    pub fn output_value(&self) -> u64 {
        self.tx.output.iter().map(|output| output.value.to_sat()).sum()
    }
}

/// Builds sweep transactions for one wallet
pub struct TransactionBuilder<'a> {
    keys: &'a KeyManager,
    estimator: &'a dyn FeeEstimator,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(keys: &'a KeyManager, estimator: &'a dyn FeeEstimator) -> Self {
        Self { keys, estimator }
    }

    /// Assemble the unsigned sweep of every output in `sweep_data`
    pub fn prepare_sweep(&self, sweep_data: &SweepData, destination: &str) -> SweepResult<UnsignedSweep> {
        let balance = sweep_data.total_balance();
        if balance == 0 {
            return Err(SweepError::NoFundsFound {
                addresses_searched: sweep_data.total_addresses_searched(),
            });
        }

        let destination = validate_and_parse(destination, self.keys.network())?;

        let inputs: Vec<SweepInput> = sweep_data
            .address_utxos()
            .values()
            .flat_map(|entry| {
                entry.utxos.iter().map(move |utxo| SweepInput {
                    outpoint: utxo.outpoint(),
                    value: utxo.value,
                    path: entry.path.clone(),
                    redeem_script: entry.redeem_script.clone(),
                })
            })
            .collect();

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: inputs
                .iter()
                .map(|input| TxIn {
                    previous_output: input.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![TxOut {
                value: Amount::from_sat(balance),
                script_pubkey: destination.script_pubkey(),
            }],
        };

        // Priced on the final shape, before the output value is settled.
        let fee = self.estimator.estimate_fee(&tx);
        let output_value = balance
            .checked_sub(fee)
            .filter(|value| *value >= DUST_LIMIT_SATS)
            .ok_or(SweepError::InsufficientFundsForFee {
                balance,
                fee,
                dust_limit: DUST_LIMIT_SATS,
            })?;
        tx.output[0].value = Amount::from_sat(output_value);

        log::info!(
            "Prepared sweep of {} inputs: {} sats to {}, fee {} sats",
            inputs.len(),
            output_value,
            destination,
            fee
        );

        Ok(UnsignedSweep { tx, inputs, fee })
    }

    /// Prepare and sign the sweep in one step
    pub fn build_sweep_transaction(&self, sweep_data: &SweepData, destination: &str) -> SweepResult<SignedSweep> {
        let unsigned = self.prepare_sweep(sweep_data, destination)?;
        TransactionSigner::new(self.keys).sign(unsigned)
    }
}
