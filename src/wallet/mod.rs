// Wallet identities and transaction signatures

mod keystore;
mod signature;

pub use keystore::{
    ADDRESS_PREFIX, KeyError, KeyPair, Keystore, derive_address, parse_public_key,
    parse_secret_key,
};
pub use signature::{
    SignatureError, sign_transaction, sign_with_hex_key, verify_attached, verify_transaction,
    verify_with_hex_key,
};
