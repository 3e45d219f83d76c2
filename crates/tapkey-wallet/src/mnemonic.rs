//! Secret → BIP-39 mnemonic derivation and phrase parsing.
//!
//! A password is hashed with SHA-256 and the digest is used directly as
//! 256 bits of BIP-39 entropy, so the same password always yields the same
//! 24-word phrase.

use bip39::{Language, Mnemonic};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// SHA-256 of the secret's UTF-8 bytes.
pub fn secret_to_entropy(secret: &str) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(Sha256::digest(secret.as_bytes()).into())
}

/// Map 32 bytes of entropy to a checksummed 24-word English phrase.
pub fn entropy_to_mnemonic(entropy: &[u8; 32]) -> Result<Mnemonic, WalletError> {
    Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}

/// Derive the wallet mnemonic for a secret.
///
/// The encoded phrase is parsed back before it is returned; a phrase that
/// fails its own checksum points at a broken word list, not at the user.
pub fn mnemonic_from_secret(secret: &str) -> Result<Mnemonic, WalletError> {
    let entropy = secret_to_entropy(secret);
    let mnemonic = entropy_to_mnemonic(&entropy)?;
    Mnemonic::parse_in(Language::English, mnemonic.to_string())
        .map_err(|e| WalletError::InvalidMnemonic(format!("derived phrase failed checksum: {e}")))?;
    Ok(mnemonic)
}

/// Parse a user-supplied BIP-39 phrase.
///
/// Normalizes whitespace and converts to lowercase before parsing.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, WalletError> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))
}
