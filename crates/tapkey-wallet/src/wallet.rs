//! The wallet identity: one key and the address it spends from.
//!
//! A wallet is built fresh for every operation from a secret, a mnemonic or
//! an imported WIF key. It holds no UTXOs and is never written to disk.

use std::str::FromStr;

use bip39::Mnemonic;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};
use tracing::debug;
use zeroize::Zeroizing;

use tapkey_core::address::classify_for;
use tapkey_core::constants::NETWORK;
use tapkey_core::types::AddressType;

use crate::error::WalletError;
use crate::keys::{SpendingKey, derive_address};
use crate::mnemonic::mnemonic_from_secret;

/// A single-key wallet.
///
/// `address` is what the wallet claims to spend from. For derived wallets it
/// is the Taproot address of the key; for imported keys it is whatever the
/// caller supplied, checked by [`Wallet::verify_key_matches_address`] before
/// any spend.
#[derive(Clone)]
pub struct Wallet {
    mnemonic: Option<Mnemonic>,
    key: SpendingKey,
    address: Address,
    address_type: AddressType,
}

impl Wallet {
    /// Derive the wallet for a password on the configured network.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapkey_wallet::Wallet;
    /// use tapkey_core::AddressType;
    ///
    /// let a = Wallet::from_secret("correct horse").unwrap();
    /// let b = Wallet::from_secret("correct horse").unwrap();
    /// assert_eq!(a.address(), b.address());
    /// assert_eq!(a.address_type(), AddressType::Taproot);
    /// ```
    pub fn from_secret(secret: &str) -> Result<Self, WalletError> {
        Self::from_secret_for(secret, NETWORK)
    }

    pub fn from_secret_for(secret: &str, network: Network) -> Result<Self, WalletError> {
        let mnemonic = mnemonic_from_secret(secret)?;
        Self::from_mnemonic(mnemonic, network)
    }

    /// Derive the Taproot wallet for an existing phrase.
    pub fn from_mnemonic(mnemonic: Mnemonic, network: Network) -> Result<Self, WalletError> {
        let key = SpendingKey::from_mnemonic(&mnemonic, network)?;
        let address = derive_address(&key, AddressType::Taproot)?;
        debug!(%address, %network, "derived wallet");
        Ok(Self {
            mnemonic: Some(mnemonic),
            key,
            address,
            address_type: AddressType::Taproot,
        })
    }

    /// Wrap an imported key and the address it is claimed to control.
    ///
    /// The address is classified and parsed here; whether the key actually
    /// controls it is checked at spend time.
    pub fn from_wif(wif: &str, address: &str) -> Result<Self, WalletError> {
        Self::from_wif_for(wif, address, NETWORK)
    }

    pub fn from_wif_for(wif: &str, address: &str, network: Network) -> Result<Self, WalletError> {
        let address_type = classify_for(address, network);
        if !address_type.is_valid() {
            return Err(WalletError::InvalidAddress {
                role: "source",
                address: address.to_string(),
            });
        }
        let address = parse_address(address, network, "source")?;
        let key = SpendingKey::from_wif(wif, network)?;
        Ok(Self {
            mnemonic: None,
            key,
            address,
            address_type,
        })
    }

    /// Backup phrase, absent for imported keys.
    pub fn mnemonic(&self) -> Option<&Mnemonic> {
        self.mnemonic.as_ref()
    }

    pub fn key(&self) -> &SpendingKey {
        &self.key
    }

    pub fn wif(&self) -> Zeroizing<String> {
        self.key.to_wif()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn network(&self) -> Network {
        self.key.network()
    }

    /// Re-derive the address of this wallet's type from the key and require
    /// an exact string match with the claimed address.
    pub fn verify_key_matches_address(&self) -> Result<(), WalletError> {
        let derived = derive_address(&self.key, self.address_type)?;
        if derived.to_string() != self.address.to_string() {
            return Err(WalletError::KeyAddressMismatch {
                expected: self.address.to_string(),
                derived: derived.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address.to_string())
            .field("address_type", &self.address_type)
            .field("network", &self.network())
            .field("imported", &self.mnemonic.is_none())
            .finish()
    }
}

/// Parse an address string and require it to belong to `network`.
pub(crate) fn parse_address(
    address: &str,
    network: Network,
    role: &'static str,
) -> Result<Address, WalletError> {
    Address::<NetworkUnchecked>::from_str(address)
        .and_then(|a| a.require_network(network))
        .map_err(|_| WalletError::InvalidAddress {
            role,
            address: address.to_string(),
        })
}
