// Key management

use crate::core::{Address, sha256_hex};
use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Prefix of every derived wallet address
pub const ADDRESS_PREFIX: &str = "0x";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("no key material supplied")]
    Missing,
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("keystore error: {0}")]
    Keystore(String),
}

/// DeriveAddress(public_key): "0x" + SHA256(compressed SEC1 key) as hex
pub fn derive_address(public_key: &PublicKey) -> Address {
    let digest = sha256_hex(&public_key.serialize());
    Address(format!("{}{}", ADDRESS_PREFIX, digest))
}

/// Parse a compressed or uncompressed SEC1 public key given as hex
pub fn parse_public_key(hex_key: &str) -> Result<PublicKey, KeyError> {
    let hex_key = hex_key.trim();
    if hex_key.is_empty() {
        return Err(KeyError::Missing);
    }
    let bytes = hex::decode(hex_key).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))?;
    PublicKey::from_slice(&bytes).map_err(|e| KeyError::InvalidPublicKey(e.to_string()))
}

/// Parse a 32-byte secret key given as hex
pub fn parse_secret_key(hex_key: &str) -> Result<SecretKey, KeyError> {
    let hex_key = hex_key.trim();
    if hex_key.is_empty() {
        return Err(KeyError::Missing);
    }
    let bytes = hex::decode(hex_key).map_err(|e| KeyError::InvalidSecretKey(e.to_string()))?;
    SecretKey::from_slice(&bytes).map_err(|e| KeyError::InvalidSecretKey(e.to_string()))
}

/// Serializable key pair (for storage)
#[derive(Serialize, Deserialize)]
struct StoredKeyPair {
    secret_key: String,
    address: Address,
}

/// Wallet identity; the secret key never leaves the process
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub address: Address,
}

impl KeyPair {
    /// GenerateKeypair()
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(&secp, secret_key)
    }

    /// Rebuild the identity from a hex secret key
    pub fn from_secret_hex(hex_key: &str) -> Result<Self, KeyError> {
        let secret_key = parse_secret_key(hex_key)?;
        Ok(Self::from_secret_key(&Secp256k1::new(), secret_key))
    }

    fn from_secret_key<C: secp256k1::Signing>(secp: &Secp256k1<C>, secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key(secp);
        let address = derive_address(&public_key);
        Self {
            secret_key,
            public_key,
            address,
        }
    }

    /// Compressed public key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    fn to_stored(&self) -> StoredKeyPair {
        StoredKeyPair {
            secret_key: self.secret_key_hex(),
            address: self.address.clone(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredKeystore {
    keys: Vec<StoredKeyPair>,
    default_address: Option<Address>,
}

/// Local wallet identities, persisted as JSON next to the ledger snapshot.
///
/// The first identity created becomes the default sender.
#[derive(Default)]
pub struct Keystore {
    identities: BTreeMap<Address, KeyPair>,
    default_address: Option<Address>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`, or start empty when it does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No keystore at {}", path.display());
            return Ok(Self::new());
        }
        log::info!("Loading keystore from {}", path.display());
        Self::load(path)
    }

    /// Generate a keypair and return its address
    pub fn create_identity(&mut self) -> Address {
        let keypair = KeyPair::generate();
        let address = keypair.address.clone();
        self.default_address.get_or_insert_with(|| address.clone());
        self.identities.insert(address.clone(), keypair);
        address
    }

    /// Identity owning `address` (case-insensitive)
    pub fn identity(&self, address: &str) -> Option<&KeyPair> {
        self.identities
            .values()
            .find(|keypair| keypair.address.matches(address))
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.identities.keys()
    }

    pub fn default_address(&self) -> Option<&Address> {
        self.default_address.as_ref()
    }

    pub fn set_default(&mut self, address: &str) -> Result<(), KeyError> {
        let address = self
            .identity(address)
            .map(|keypair| keypair.address.clone())
            .ok_or_else(|| KeyError::Keystore(format!("address {} not in keystore", address.trim())))?;
        self.default_address = Some(address);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Write the keystore through a temp file so a crash never truncates it
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), KeyError> {
        let path = path.as_ref();
        let data = StoredKeystore {
            keys: self.identities.values().map(KeyPair::to_stored).collect(),
            default_address: self.default_address.clone(),
        };
        let json = serde_json::to_vec_pretty(&data)
            .map_err(|e| KeyError::Keystore(format!("failed to serialize keystore: {}", e)))?;

        let write_err = |e: std::io::Error| {
            KeyError::Keystore(format!("failed to write {}: {}", path.display(), e))
        };
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let json = fs::read(path)
            .map_err(|e| KeyError::Keystore(format!("failed to read {}: {}", path.display(), e)))?;
        let data: StoredKeystore = serde_json::from_slice(&json)
            .map_err(|e| KeyError::Keystore(format!("failed to parse {}: {}", path.display(), e)))?;

        let mut identities = BTreeMap::new();
        for stored in data.keys {
            let keypair = KeyPair::from_secret_hex(&stored.secret_key)?;
            if keypair.address != stored.address {
                return Err(KeyError::Keystore(format!(
                    "stored address {} does not match its key",
                    stored.address
                )));
            }
            identities.insert(keypair.address.clone(), keypair);
        }

        let default_address = data
            .default_address
            .filter(|address| identities.contains_key(address));
        Ok(Self {
            identities,
            default_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp = KeyPair::generate();

        assert_eq!(kp.public_key.serialize().len(), 33); // Compressed pubkey
        assert!(kp.address.as_str().starts_with(ADDRESS_PREFIX));
        assert_eq!(kp.address.as_str().len(), 66);
    }

    #[test]
    fn test_address_is_deterministic() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&kp.secret_key_hex()).unwrap();
        assert_eq!(kp.address, restored.address);
        assert_eq!(derive_address(&kp.public_key), kp.address);
        assert_eq!(parse_public_key(&kp.public_key_hex()).unwrap(), kp.public_key);
    }

    #[test]
    fn test_malformed_keys() {
        assert_eq!(parse_secret_key("").unwrap_err(), KeyError::Missing);
        assert!(matches!(parse_secret_key("zz"), Err(KeyError::InvalidSecretKey(_))));
        assert!(matches!(parse_secret_key("00"), Err(KeyError::InvalidSecretKey(_))));
        assert!(matches!(parse_public_key("02abcd"), Err(KeyError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_first_identity_is_default() {
        let mut ks = Keystore::new();
        assert!(ks.is_empty());
        assert!(ks.default_address().is_none());

        let first = ks.create_identity();
        let second = ks.create_identity();
        assert_eq!(ks.len(), 2);
        assert_eq!(ks.default_address(), Some(&first));

        ks.set_default(&second.as_str().to_uppercase()).unwrap();
        assert_eq!(ks.default_address(), Some(&second));
        assert!(ks.set_default("0xnope").is_err());
        assert!(ks.identity(&format!(" {} ", first)).is_some());
    }

    #[test]
    fn test_save_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        assert!(Keystore::open(&path).unwrap().is_empty());

        let mut ks = Keystore::new();
        let addr = ks.create_identity();
        ks.create_identity();
        ks.save(&path).unwrap();

        let loaded = Keystore::open(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.default_address(), Some(&addr));
        assert_eq!(
            loaded.identity(addr.as_str()).unwrap().public_key,
            ks.identity(addr.as_str()).unwrap().public_key
        );
    }

    #[test]
    fn test_load_rejects_mismatched_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keystore.json");
        let kp = KeyPair::generate();
        let forged = serde_json::json!({
            "keys": [{"secret_key": kp.secret_key_hex(), "address": "0xforged"}],
            "default_address": null,
        });
        fs::write(&path, forged.to_string()).unwrap();

        assert!(matches!(Keystore::load(&path), Err(KeyError::Keystore(_))));
    }
}
