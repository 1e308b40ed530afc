//! # Transaction Signer
//!
//! Applies the primary and backup signatures to every input of an
//! [`UnsignedSweep`]. Inputs are legacy P2SH spends, so each one gets
//!
//! ```text
//! scriptSig: OP_0 <sig_a> <sig_b> <redeem_script>
//! ```
//!
//! with the signatures in the order their keys appear in the redeem script.
//! `OP_0` absorbs the extra stack pop of `OP_CHECKMULTISIG`.

use crate::address::{is_canonical_order, redeem_script_keys};
use crate::error::{SweepError, SweepResult};
use crate::keys::{KeyFamily, KeyManager};
use crate::transaction::{SweepInput, UnsignedSweep};
use bitcoin::consensus::encode::serialize;
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_PUSHBYTES_0;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{ecdsa, PublicKey, ScriptBuf, Transaction, Txid};

/// Fully signed sweep, ready for broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSweep {
    pub tx: Transaction,
    pub fee: u64,
}

impl SignedSweep {
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Consensus serialization as hex
    pub fn to_hex(&self) -> String {
        hex::encode(serialize(&self.tx))
    }
}

/// Signs sweep inputs with keys re-derived from each input's path
pub struct TransactionSigner<'a> {
    keys: &'a KeyManager,
}

impl<'a> TransactionSigner<'a> {
    pub fn new(keys: &'a KeyManager) -> Self {
        Self { keys }
    }

    /// Sign every input. Fails without returning a partial transaction.
    pub fn sign(&self, unsigned: UnsignedSweep) -> SweepResult<SignedSweep> {
        let UnsignedSweep { mut tx, inputs, fee } = unsigned;
        if inputs.len() != tx.input.len() {
            return Err(SweepError::signing(
                0,
                format!("{} inputs but {} signing records", tx.input.len(), inputs.len()),
            ));
        }

        let script_sigs = {
            let cache = SighashCache::new(&tx);
            inputs
                .iter()
                .enumerate()
                .map(|(index, input)| self.sign_input(&cache, index, input))
                .collect::<SweepResult<Vec<_>>>()?
        };

        for (txin, script_sig) in tx.input.iter_mut().zip(script_sigs) {
            txin.script_sig = script_sig;
        }

        log::info!("Signed {} inputs of sweep {}", tx.input.len(), tx.compute_txid());
        Ok(SignedSweep { tx, fee })
    }

    fn sign_input(
        &self,
        cache: &SighashCache<&Transaction>,
        index: usize,
        input: &SweepInput,
    ) -> SweepResult<ScriptBuf> {
        let script_keys = redeem_script_keys(&input.redeem_script)
            .ok_or_else(|| SweepError::signing(index, "redeem script is not a 2-of-3 multisig"))?;
        if !is_canonical_order(&script_keys) {
            return Err(SweepError::signing(
                index,
                "redeem script keys are not in canonical order",
            ));
        }

        // Primary keeps the hardened service index, backup is derived without it.
        let private_path = input.path.to_private();
        let primary = self
            .keys
            .derive_private(KeyFamily::Primary, &private_path)
            .map_err(|e| SweepError::signing(index, e.to_string()))?;
        let backup = self
            .keys
            .derive_private(KeyFamily::Backup, &private_path.without_hardening())
            .map_err(|e| SweepError::signing(index, e.to_string()))?;

        let sighash = cache
            .legacy_signature_hash(index, &input.redeem_script, EcdsaSighashType::All.to_u32())
            .map_err(|e| SweepError::signing(index, e.to_string()))?;
        let message = Message::from_digest(sighash.to_byte_array());
        let secp = self.keys.secp();

        let mut signatures = Vec::with_capacity(2);
        for child in [primary, backup] {
            let public_key = PublicKey::new(child.private_key.public_key(secp));
            let position = script_keys
                .iter()
                .position(|key| *key == public_key)
                .ok_or_else(|| {
                    SweepError::signing(index, format!("key {} is not in the redeem script", public_key))
                })?;

            let signature = secp.sign_ecdsa(&message, &child.private_key);
            secp.verify_ecdsa(&message, &signature, &public_key.inner)
                .map_err(|e| SweepError::signing(index, format!("signature does not verify: {}", e)))?;

            let signature = ecdsa::Signature {
                signature,
                sighash_type: EcdsaSighashType::All,
            };
            signatures.push((position, signature.serialize().to_vec()));
        }

        signatures.sort_by_key(|(position, _)| *position);
        if signatures[0].0 == signatures[1].0 {
            return Err(SweepError::signing(index, "primary and backup keys coincide"));
        }

        let mut builder = Builder::new().push_opcode(OP_PUSHBYTES_0);
        for (_, signature) in signatures {
            let push = PushBytesBuf::try_from(signature)
                .map_err(|e| SweepError::signing(index, e.to_string()))?;
            builder = builder.push_slice(push);
        }
        let redeem_push = PushBytesBuf::try_from(input.redeem_script.to_bytes())
            .map_err(|e| SweepError::signing(index, e.to_string()))?;

        Ok(builder.push_slice(redeem_push).into_script())
    }
}
