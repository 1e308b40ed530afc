//! # Fee Estimation
//!
//! Sweep fees are estimated from the shape of the unsigned transaction. Every
//! input spends the same kind of P2SH 2-of-3 output, so its signed size is
//! known up to the length of the two DER signatures; the estimate assumes both
//! are maximal.

use crate::config::SweepConfig;
use bitcoin::Transaction;

const VERSION_SIZE: u64 = 4;
const LOCKTIME_SIZE: u64 = 4;
const OUTPOINT_SIZE: u64 = 36;
const SEQUENCE_SIZE: u64 = 4;
const VALUE_SIZE: u64 = 8;

/// DER signature upper bound plus the sighash byte
const MAX_SIGNATURE_SIZE: u64 = 73;

/// `OP_2 <33> <33> <33> OP_3 OP_CHECKMULTISIG`
const REDEEM_SCRIPT_SIZE: u64 = 105;

/// Signed size of one P2SH 2-of-3 input with maximal signatures
pub const P2SH_MULTISIG_INPUT_SIZE: u64 = {
    // OP_0, two signature pushes, OP_PUSHDATA1 <len> <redeem script>
    let script_sig = 1 + 2 * (1 + MAX_SIGNATURE_SIZE) + 2 + REDEEM_SCRIPT_SIZE;
    OUTPOINT_SIZE + compact_size_len(script_sig) + script_sig + SEQUENCE_SIZE
};

/// Bytes taken by a Bitcoin CompactSize encoding of `n`
const fn compact_size_len(n: u64) -> u64 {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Prices a sweep transaction before its output value is final
pub trait FeeEstimator: Send + Sync {
    /// Fee in satoshis for the signed form of `tx`
    fn estimate_fee(&self, tx: &Transaction) -> u64;
}

/// Size-based estimator at a fixed rate in sat/vB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFeeEstimator {
    fee_rate: u64,
}

impl SizeFeeEstimator {
    pub fn new(fee_rate: u64) -> Self {
        Self { fee_rate }
    }

    pub fn from_config(config: &SweepConfig) -> Self {
        Self::new(config.fee_rate)
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }

    /// Virtual size of `tx` once every input carries its two signatures
    pub fn estimate_vsize(tx: &Transaction) -> u64 {
        let inputs = tx.input.len() as u64;
        let outputs: u64 = tx
            .output
            .iter()
            .map(|output| {
                let script_len = output.script_pubkey.len() as u64;
                VALUE_SIZE + compact_size_len(script_len) + script_len
            })
            .sum();

        VERSION_SIZE
            + compact_size_len(inputs)
            + inputs * P2SH_MULTISIG_INPUT_SIZE
            + compact_size_len(tx.output.len() as u64)
            + outputs
            + LOCKTIME_SIZE
    }
}

impl FeeEstimator for SizeFeeEstimator {
    fn estimate_fee(&self, tx: &Transaction) -> u64 {
        Self::estimate_vsize(tx).saturating_mul(self.fee_rate)
    }
}
