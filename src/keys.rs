//! # Key Derivation
//!
//! Turns the two user mnemonics and the published service xpubs into three key
//! families and derives child keys along [`SweepPath`]s.
//!
//! ## Path Layout
//!
//! ```text
//! M/<key_index>'/<chain>/<address_index>
//!   └─ service root: the only hardened step
//! ```
//!
//! The service publishes one xpub per key index, already derived through the
//! hardened `<key_index>'` step, so the service half of an address is computed
//! from the remaining non-hardened segments alone.

use crate::config::sweep::RECEIVE_CHAIN;
use crate::error::{SweepError, SweepResult};
use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv, Xpub};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Network, NetworkKind, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const HARDENED_LIMIT: u32 = 1 << 31;

/// One step of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub index: u32,
    pub hardened: bool,
}

/// Derivation path rooted at `M` (public) or `m` (private)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SweepPath {
    public: bool,
    steps: Vec<PathStep>,
}

impl SweepPath {
    /// Receive address path `M/<key_index>'/0/<address_index>`
    pub fn receive(key_index: u32, address_index: u32) -> Self {
        Self {
            public: true,
            steps: vec![
                PathStep {
                    index: key_index,
                    hardened: true,
                },
                PathStep {
                    index: RECEIVE_CHAIN,
                    hardened: false,
                },
                PathStep {
                    index: address_index,
                    hardened: false,
                },
            ],
        }
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn to_public(&self) -> Self {
        Self {
            public: true,
            steps: self.steps.clone(),
        }
    }

    pub fn to_private(&self) -> Self {
        Self {
            public: false,
            steps: self.steps.clone(),
        }
    }

    /// Same path with every hardened marker removed
    pub fn without_hardening(&self) -> Self {
        Self {
            public: self.public,
            steps: self
                .steps
                .iter()
                .map(|step| PathStep {
                    index: step.index,
                    hardened: false,
                })
                .collect(),
        }
    }

    /// The leading service key index.
    ///
    /// Fails unless the first step is hardened and every later step is not.
    pub fn service_key_index(&self) -> SweepResult<u32> {
        let (first, rest) = self
            .steps
            .split_first()
            .ok_or_else(|| SweepError::invalid_path(self.to_string(), "missing service key index"))?;

        if !first.hardened {
            return Err(SweepError::invalid_path(
                self.to_string(),
                "service key index must be hardened",
            ));
        }
        if rest.iter().any(|step| step.hardened) {
            return Err(SweepError::invalid_path(
                self.to_string(),
                "only the service key index may be hardened",
            ));
        }
        Ok(first.index)
    }

    /// Segments below the service root
    pub fn service_remainder(&self) -> Self {
        Self {
            public: true,
            steps: self.steps.iter().skip(1).copied().collect(),
        }
    }

    /// Convert into the BIP32 representation
    pub fn derivation_path(&self) -> SweepResult<DerivationPath> {
        let children = self
            .steps
            .iter()
            .map(|step| {
                if step.hardened {
                    ChildNumber::from_hardened_idx(step.index)
                } else {
                    ChildNumber::from_normal_idx(step.index)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DerivationPath::from(children))
    }
}

impl FromStr for SweepPath {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        let public = match parts.next() {
            Some("M") => true,
            Some("m") => false,
            _ => return Err(SweepError::invalid_path(s, "path must start with 'M' or 'm'")),
        };

        let steps = parts
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };
                let index: u32 = digits
                    .parse()
                    .map_err(|_| SweepError::invalid_path(s, format!("invalid segment '{}'", part)))?;
                if index >= HARDENED_LIMIT {
                    return Err(SweepError::invalid_path(
                        s,
                        format!("segment '{}' out of range", part),
                    ));
                }
                Ok(PathStep { index, hardened })
            })
            .collect::<SweepResult<Vec<_>>>()?;

        Ok(Self { public, steps })
    }
}

impl fmt::Display for SweepPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.public { "M" } else { "m" })?;
        for step in &self.steps {
            write!(f, "/{}", step.index)?;
            if step.hardened {
                f.write_str("'")?;
            }
        }
        Ok(())
    }
}

/// Published service key for one key index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceKey {
    pub key_index: u32,
    pub extended_public_key: String,
}

impl ServiceKey {
    /// Load the ordered service key list from a JSON file
    pub fn load_from_file(filename: &str) -> SweepResult<Vec<Self>> {
        let json = std::fs::read_to_string(filename)?;
        let keys: Vec<ServiceKey> = serde_json::from_str(&json)?;
        Ok(keys)
    }
}

/// The three key families feeding every redeem script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Primary,
    Backup,
    Service,
}

/// Holds the primary and backup private roots and the service xpubs
pub struct KeyManager {
    network: Network,
    secp: Secp256k1<All>,
    primary: Xpriv,
    backup: Xpriv,
    service_keys: BTreeMap<u32, Xpub>,
    key_order: Vec<u32>,
}

impl KeyManager {
    /// Build the key families from the user's mnemonics.
    ///
    /// The primary mnemonic is stretched with `passphrase`; the backup
    /// mnemonic always uses an empty passphrase.
    pub fn from_mnemonics(
        primary_mnemonic: &str,
        passphrase: &str,
        backup_mnemonic: &str,
        service_keys: &[ServiceKey],
        network: Network,
    ) -> SweepResult<Self> {
        let primary_seed = Mnemonic::parse_in(Language::English, primary_mnemonic)?.to_seed(passphrase);
        let backup_seed = Mnemonic::parse_in(Language::English, backup_mnemonic)?.to_seed("");

        let parsed = service_keys
            .iter()
            .map(|key| {
                Xpub::from_str(&key.extended_public_key)
                    .map(|xpub| (key.key_index, xpub))
                    .map_err(|e| {
                        SweepError::config(format!(
                            "invalid service xpub for key index {}: {}",
                            key.key_index, e
                        ))
                    })
            })
            .collect::<SweepResult<Vec<_>>>()?;

        Self::from_seeds(&primary_seed, &backup_seed, parsed, network)
    }

    /// Build the key families from raw seeds and already parsed service xpubs
    pub fn from_seeds(
        primary_seed: &[u8],
        backup_seed: &[u8],
        service_keys: Vec<(u32, Xpub)>,
        network: Network,
    ) -> SweepResult<Self> {
        let expected_kind = NetworkKind::from(network);
        let mut key_order = Vec::with_capacity(service_keys.len());
        let mut keys = BTreeMap::new();

        for (key_index, xpub) in service_keys {
            if xpub.network != expected_kind {
                return Err(SweepError::config(format!(
                    "service xpub for key index {} belongs to another network",
                    key_index
                )));
            }
            if keys.insert(key_index, xpub).is_some() {
                return Err(SweepError::config(format!(
                    "duplicate service key index {}",
                    key_index
                )));
            }
            key_order.push(key_index);
        }

        Ok(Self {
            network,
            secp: Secp256k1::new(),
            primary: Xpriv::new_master(network, primary_seed)?,
            backup: Xpriv::new_master(network, backup_seed)?,
            service_keys: keys,
            key_order,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    /// Service key indices in the order they were configured
    pub fn key_indices(&self) -> &[u32] {
        &self.key_order
    }

    /// Derive a private child from the primary or backup root
    pub fn derive_private(&self, family: KeyFamily, path: &SweepPath) -> SweepResult<Xpriv> {
        let root = match family {
            KeyFamily::Primary => &self.primary,
            KeyFamily::Backup => &self.backup,
            KeyFamily::Service => {
                return Err(SweepError::config(
                    "the service private key is never available",
                ))
            }
        };
        Ok(root.derive_priv(&self.secp, &path.derivation_path()?)?)
    }

    /// Derive the child public key for `path` from the given family.
    ///
    /// Service derivations start from the published xpub of the path's first
    /// segment, so any hardened step below it is rejected.
    pub fn derive_public(&self, family: KeyFamily, path: &SweepPath) -> SweepResult<PublicKey> {
        match family {
            KeyFamily::Primary | KeyFamily::Backup => {
                let child = self.derive_private(family, path)?;
                Ok(PublicKey::new(child.private_key.public_key(&self.secp)))
            }
            KeyFamily::Service => {
                let key_index = path
                    .steps()
                    .first()
                    .ok_or_else(|| SweepError::invalid_path(path.to_string(), "missing service key index"))?
                    .index;
                let root = self
                    .service_keys
                    .get(&key_index)
                    .ok_or(SweepError::UnknownKeyIndex { key_index })?;
                let child = root.derive_pub(&self.secp, &path.service_remainder().derivation_path()?)?;
                Ok(PublicKey::new(child.public_key))
            }
        }
    }

    /// Confirm the key index was declared
    pub fn require_key_index(&self, key_index: u32) -> SweepResult<()> {
        if self.service_keys.contains_key(&key_index) {
            Ok(())
        } else {
            Err(SweepError::UnknownKeyIndex { key_index })
        }
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("network", &self.network)
            .field("key_indices", &self.key_order)
            .finish_non_exhaustive()
    }
}
