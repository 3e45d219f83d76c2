//! BIP-32 key derivation and per-type address derivation.
//!
//! The wallet spends from exactly one key: the BIP-86 leaf at
//! [`DERIVATION_PATH`] under the BIP-39 seed. The same key can be rendered as
//! an address of any of the four spendable types; the derived wallet uses
//! the Taproot one.

use std::fmt;
use std::str::FromStr;

use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::key::{CompressedPublicKey, TapTweak};
use bitcoin::secp256k1::{All, Keypair, Secp256k1, SecretKey, XOnlyPublicKey};
use bitcoin::{Address, Network, NetworkKind, PrivateKey};
use zeroize::Zeroizing;

use tapkey_core::constants::DERIVATION_PATH;
use tapkey_core::types::AddressType;

use crate::error::WalletError;

/// The single private key a wallet spends with.
///
/// Secret material never appears in `Debug` output.
#[derive(Clone)]
pub struct SpendingKey {
    private_key: PrivateKey,
    network: Network,
    secp: Secp256k1<All>,
}

impl SpendingKey {
    /// Derive the key at [`DERIVATION_PATH`] from a mnemonic (empty passphrase).
    pub fn from_mnemonic(mnemonic: &Mnemonic, network: Network) -> Result<Self, WalletError> {
        let seed = Zeroizing::new(mnemonic.to_seed(""));
        let secp = Secp256k1::new();
        let master = Xpriv::new_master(network, seed.as_ref())
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        let path = DerivationPath::from_str(DERIVATION_PATH)
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        let child = master
            .derive_priv(&secp, &path)
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        Ok(Self {
            private_key: child.to_priv(),
            network,
            secp,
        })
    }

    /// Import a WIF-encoded key. The WIF's network prefix must agree with
    /// `network`, and the key must be compressed.
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, WalletError> {
        let private_key =
            PrivateKey::from_wif(wif).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        if private_key.network != NetworkKind::from(network) {
            return Err(WalletError::InvalidKey(format!(
                "key is not for network {network}"
            )));
        }
        if !private_key.compressed {
            return Err(WalletError::InvalidKey("uncompressed keys are not supported".into()));
        }
        Ok(Self {
            private_key,
            network,
            secp: Secp256k1::new(),
        })
    }

    /// WIF encoding of the key. Handle with care.
    pub fn to_wif(&self) -> Zeroizing<String> {
        Zeroizing::new(self.private_key.to_wif())
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn public_key(&self) -> CompressedPublicKey {
        CompressedPublicKey(self.private_key.inner.public_key(&self.secp))
    }

    /// Untweaked x-only key: the Taproot internal key.
    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        XOnlyPublicKey::from(self.public_key().0)
    }

    /// Keypair tweaked with `TapTweak(internal_key)` and no script tree;
    /// the key that signs Taproot key-path spends.
    pub fn tweaked_keypair(&self) -> Keypair {
        let keypair = Keypair::from_secret_key(&self.secp, &self.private_key.inner);
        keypair.tap_tweak(&self.secp, None).to_inner()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.private_key.inner
    }

    pub(crate) fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }
}

impl fmt::Debug for SpendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpendingKey")
            .field("network", &self.network)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Render the key as an address of the given type.
pub fn derive_address(key: &SpendingKey, address_type: AddressType) -> Result<Address, WalletError> {
    let pubkey = key.public_key();
    let network = key.network();
    match address_type {
        AddressType::Legacy => Ok(Address::p2pkh(pubkey.pubkey_hash(), network)),
        AddressType::NestedSegwit => Ok(Address::p2shwpkh(&pubkey, network)),
        AddressType::NativeSegwit => Ok(Address::p2wpkh(&pubkey, network)),
        AddressType::Taproot => Ok(Address::p2tr(
            key.secp(),
            key.x_only_public_key(),
            None,
            network,
        )),
        AddressType::Invalid => Err(WalletError::InvalidAddress {
            role: "source",
            address: AddressType::Invalid.to_string(),
        }),
    }
}
