// Transaction signing and verification
//
// Signatures are DER-encoded ECDSA (secp256k1) over SHA256 of
// `Transaction::signable_bytes`, carried as lowercase hex.

use crate::core::{Transaction, sha256};
use crate::wallet::keystore::{KeyError, KeyPair, parse_public_key, parse_secret_key};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("transaction is not signed")]
    Missing,
    #[error("signature does not verify against the sender's public key")]
    Invalid,
}

fn signing_digest(tx: &Transaction) -> Message {
    Message::from_digest(*sha256(&tx.signable_bytes()).as_bytes())
}

/// Sign(private_key, transaction) -> hex signature
pub fn sign_transaction(secret_key: &SecretKey, tx: &Transaction) -> String {
    let secp = Secp256k1::signing_only();
    let signature = secp.sign_ecdsa(&signing_digest(tx), secret_key);
    hex::encode(signature.serialize_der().to_vec())
}

/// Sign with a hex-encoded secret key
pub fn sign_with_hex_key(secret_key_hex: &str, tx: &Transaction) -> Result<String, KeyError> {
    let secret_key = parse_secret_key(secret_key_hex)?;
    Ok(sign_transaction(&secret_key, tx))
}

/// Verify(public_key, transaction, signature); malformed input yields false
pub fn verify_transaction(public_key: &PublicKey, tx: &Transaction, signature_hex: &str) -> bool {
    let Ok(bytes) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(&bytes) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&signing_digest(tx), &signature, public_key)
        .is_ok()
}

/// Verify against a hex-encoded public key; a bad key fails closed
pub fn verify_with_hex_key(public_key_hex: &str, tx: &Transaction, signature_hex: &str) -> bool {
    match parse_public_key(public_key_hex) {
        Ok(public_key) => verify_transaction(&public_key, tx, signature_hex),
        Err(_) => false,
    }
}

/// Check the signature the transaction carries
pub fn verify_attached(public_key: &PublicKey, tx: &Transaction) -> Result<(), SignatureError> {
    let signature = tx.signature.as_deref().ok_or(SignatureError::Missing)?;
    if verify_transaction(public_key, tx, signature) {
        Ok(())
    } else {
        Err(SignatureError::Invalid)
    }
}

impl KeyPair {
    /// Sign and attach the signature to `tx`
    pub fn sign(&self, tx: &mut Transaction) {
        tx.signature = Some(sign_transaction(&self.secret_key, tx));
    }
}
