//! # Multisig Address Generation
//!
//! Every funding address of the wallet is a P2SH wrapping of a 2-of-3
//! `OP_CHECKMULTISIG` redeem script:
//!
//! ```text
//! OP_2 <key_a> <key_b> <key_c> OP_3 OP_CHECKMULTISIG
//! ```
//!
//! The three keys are the primary, backup and service children for one path,
//! placed in the canonical order defined by [`sort_public_keys`]. The signer
//! relies on the same ordering, so it lives here and nowhere else.

use crate::error::{SweepError, SweepResult};
use crate::keys::{KeyFamily, KeyManager, SweepPath};
use bitcoin::{opcodes::all::*, script::Builder, Address, PublicKey, ScriptBuf};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Signatures required to spend
pub const REQUIRED_SIGNATURES: usize = 2;

/// Keys in every redeem script
pub const TOTAL_KEYS: usize = 3;

/// Canonical ordering for redeem script keys: byte-lexicographic on the
/// compressed SEC encoding.
pub fn canonical_key_order(a: &PublicKey, b: &PublicKey) -> Ordering {
    a.to_bytes().cmp(&b.to_bytes())
}

/// Sort keys into redeem script order
pub fn sort_public_keys(mut keys: Vec<PublicKey>) -> Vec<PublicKey> {
    keys.sort_by(canonical_key_order);
    keys
}

/// Whether a key list is already in redeem script order
pub fn is_canonical_order(keys: &[PublicKey]) -> bool {
    keys.windows(2)
        .all(|pair| canonical_key_order(&pair[0], &pair[1]) != Ordering::Greater)
}

/// Build the 2-of-3 multisig redeem script for keys in canonical order
pub fn multisig_redeem_script(sorted_keys: &[PublicKey]) -> ScriptBuf {
    let mut builder = Builder::new().push_int(REQUIRED_SIGNATURES as i64);
    for key in sorted_keys {
        builder = builder.push_key(key);
    }
    builder
        .push_int(sorted_keys.len() as i64)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// Extract the public keys of a 2-of-3 multisig redeem script, in script order
pub fn redeem_script_keys(redeem_script: &ScriptBuf) -> Option<Vec<PublicKey>> {
    let keys = redeem_script
        .instructions()
        .filter_map(|instruction| match instruction {
            Ok(bitcoin::script::Instruction::PushBytes(bytes)) if bytes.len() == 33 => {
                PublicKey::from_slice(bytes.as_bytes()).ok()
            }
            _ => None,
        })
        .collect::<Vec<_>>();

    let expected = multisig_redeem_script(&keys);
    (keys.len() == TOTAL_KEYS && &expected == redeem_script).then_some(keys)
}

/// Address, redeem script and path of one wallet address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigDescriptor {
    pub address: Address,
    pub redeem_script: ScriptBuf,
    pub path: SweepPath,
}

/// Redeem script and path for an address inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub redeem_script: ScriptBuf,
    pub path: SweepPath,
}

/// Generates the wallet's multisig addresses
#[derive(Debug)]
pub struct AddressGenerator<'a> {
    keys: &'a KeyManager,
}

impl<'a> AddressGenerator<'a> {
    pub fn new(keys: &'a KeyManager) -> Self {
        Self { keys }
    }

    /// The three public keys for `path` in derivation order: primary, backup, service
    pub fn derivation_keys(&self, path: &SweepPath) -> SweepResult<[PublicKey; 3]> {
        let public_path = path.to_public();
        let key_index = public_path.service_key_index()?;
        self.keys.require_key_index(key_index)?;

        let primary = self.keys.derive_public(KeyFamily::Primary, &public_path)?;
        let backup = self
            .keys
            .derive_public(KeyFamily::Backup, &public_path.without_hardening())?;
        let service = self.keys.derive_public(KeyFamily::Service, &public_path)?;

        Ok([primary, backup, service])
    }

    /// Descriptor for a single path
    pub fn address_for_path(&self, path: &SweepPath) -> SweepResult<MultisigDescriptor> {
        let sorted = sort_public_keys(self.derivation_keys(path)?.to_vec());
        let redeem_script = multisig_redeem_script(&sorted);
        let address = Address::p2sh(&redeem_script, self.keys.network())
            .map_err(|e| SweepError::invalid_path(path.to_string(), e.to_string()))?;

        Ok(MultisigDescriptor {
            address,
            redeem_script,
            path: path.to_public(),
        })
    }

    /// `count` receive addresses for `key_index` starting at `start_index`
    pub fn generate_batch(
        &self,
        start_index: u32,
        count: u32,
        key_index: u32,
    ) -> SweepResult<HashMap<String, AddressEntry>> {
        self.keys.require_key_index(key_index)?;

        let end = start_index
            .checked_add(count)
            .ok_or_else(|| SweepError::config("address index range overflows"))?;

        (start_index..end)
            .map(|address_index| {
                let descriptor = self.address_for_path(&SweepPath::receive(key_index, address_index))?;
                Ok((
                    descriptor.address.to_string(),
                    AddressEntry {
                        redeem_script: descriptor.redeem_script,
                        path: descriptor.path,
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::test_key_manager;
    use crate::keys::ServiceKey;
    use bitcoin::Network;

    const PRIMARY_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const BACKUP_MNEMONIC: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";
    // m/0' and m/1' of "letter advice cage absurd amount doctor acoustic avoid letter advice cage above"
    const SERVICE_XPUBS: [&str; 2] = [
        "xpub68BiZSLmmvzsJfbCGaXt4pg3xo7wLv6amhfJ1aTiSovaRhabPsMjGkN5NKNYXSLdsptof2xvHwhsGDFL9nBJZrJRpk6JsuesibhT8JQ1NBj",
        "xpub68BiZSLmmvzsNBNKP5zaFPFJ4jfnxuyJsfqBFDhnf697oKZM39QkdNgAv7gT1roaPtdfX7ftCLs9Heh7cug7QCfvPMizuXdvxwr8xLC5Esi",
    ];

    #[test]
    fn test_address_is_deterministic() {
        let keys = test_key_manager(&[0, 1]);
        let generator = AddressGenerator::new(&keys);
        let path = SweepPath::receive(1, 17);

        let first = generator.address_for_path(&path).unwrap();
        let second = generator.address_for_path(&path).unwrap();
        assert_eq!(first, second);
        assert!(first.address.to_string().starts_with('2'));
    }

    #[test]
    fn test_private_and_public_paths_agree() {
        let keys = test_key_manager(&[0]);
        let generator = AddressGenerator::new(&keys);
        let public = generator.address_for_path(&"M/0'/0/4".parse().unwrap()).unwrap();
        let private = generator.address_for_path(&"m/0'/0/4".parse().unwrap()).unwrap();
        assert_eq!(public, private);
    }

    #[test]
    fn test_key_order_invariance() {
        let keys = test_key_manager(&[0]);
        let generator = AddressGenerator::new(&keys);
        let [p, b, s] = generator.derivation_keys(&SweepPath::receive(0, 2)).unwrap();

        let expected = multisig_redeem_script(&sort_public_keys(vec![p, b, s]));
        for permutation in [
            vec![p, s, b],
            vec![b, p, s],
            vec![b, s, p],
            vec![s, p, b],
            vec![s, b, p],
        ] {
            assert_eq!(multisig_redeem_script(&sort_public_keys(permutation)), expected);
        }
        assert_eq!(
            generator.address_for_path(&SweepPath::receive(0, 2)).unwrap().redeem_script,
            expected
        );
    }

    #[test]
    fn test_redeem_script_shape() {
        let keys = test_key_manager(&[0]);
        let generator = AddressGenerator::new(&keys);
        let descriptor = generator.address_for_path(&SweepPath::receive(0, 0)).unwrap();

        let script_keys = redeem_script_keys(&descriptor.redeem_script).unwrap();
        assert_eq!(script_keys.len(), 3);
        assert!(is_canonical_order(&script_keys));
        // OP_2, three 34-byte key pushes, OP_3, OP_CHECKMULTISIG
        assert_eq!(descriptor.redeem_script.len(), 1 + 3 * 34 + 1 + 1);
        assert_eq!(
            descriptor.address.script_pubkey(),
            ScriptBuf::new_p2sh(&descriptor.redeem_script.script_hash())
        );
    }

    #[test]
    fn test_generate_batch() {
        let keys = test_key_manager(&[3]);
        let generator = AddressGenerator::new(&keys);
        let batch = generator.generate_batch(10, 5, 3).unwrap();
        assert_eq!(batch.len(), 5);

        let mut indices: Vec<String> = batch.values().map(|entry| entry.path.to_string()).collect();
        indices.sort();
        assert_eq!(
            indices,
            vec!["M/3'/0/10", "M/3'/0/11", "M/3'/0/12", "M/3'/0/13", "M/3'/0/14"]
        );
    }

    #[test]
    fn test_batch_for_unknown_key_index() {
        let keys = test_key_manager(&[0]);
        let generator = AddressGenerator::new(&keys);
        assert!(matches!(
            generator.generate_batch(0, 3, 9),
            Err(SweepError::UnknownKeyIndex { key_index: 9 })
        ));
    }

    #[test]
    fn test_non_canonical_script_detected() {
        let keys = test_key_manager(&[0]);
        let generator = AddressGenerator::new(&keys);
        let mut derived = sort_public_keys(generator.derivation_keys(&SweepPath::receive(0, 1)).unwrap().to_vec());
        derived.reverse();
        assert!(!is_canonical_order(&derived));
        let script = multisig_redeem_script(&derived);
        assert!(!is_canonical_order(&redeem_script_keys(&script).unwrap()));
    }

    #[test]
    fn test_known_answer_addresses() {
        let service_keys: Vec<ServiceKey> = SERVICE_XPUBS
            .iter()
            .enumerate()
            .map(|(i, xpub)| ServiceKey {
                key_index: i as u32,
                extended_public_key: xpub.to_string(),
            })
            .collect();
        let keys = KeyManager::from_mnemonics(
            PRIMARY_MNEMONIC,
            "correct horse",
            BACKUP_MNEMONIC,
            &service_keys,
            Network::Bitcoin,
        )
        .unwrap();
        let generator = AddressGenerator::new(&keys);

        let first = generator.address_for_path(&"M/0'/0/0".parse().unwrap()).unwrap();
        assert_eq!(first.address.to_string(), "3NZPqMc6UHBV3VcSbEnaZsHh8sZv6x7Abd");
        assert_eq!(
            first.redeem_script.to_hex_string(),
            "5221021b3a4b31bb290d8a901a2f81138148e59159017fef97ab20cd63690839de799c\
             210275a95c7fa786b1b79614ca94316fda182edc6b3ddcbfe2f312128f3a16f325af\
             21028901d63da8ec1c2e08522375b695fa3a4ea8ad9fffa29ceb04a361da765af03153ae"
        );

        let other = generator.address_for_path(&"M/1'/0/5".parse().unwrap()).unwrap();
        assert_eq!(other.address.to_string(), "3FrncsnXb1S817ZsSyrHxTgpS9C8Uno6i6");
        assert_eq!(
            other.redeem_script.to_hex_string(),
            "5221032c9de666d89eeca5533cbd7a47834580f788e695fa099651d4c6484e7542a21b\
             210378aae49c62efd09c54b31a039dc9b35b710156df70df3c2e2c20c9c83062b6ae\
             21037bd359c563944710d7642fce298e1280864edde0a42e83ff3537843fac9092c853ae"
        );
    }
}
