//! Engine constants. All monetary values in satoshis.

use bitcoin::Network;

/// Network the engine is built for.
///
/// Selected at build time: the `testnet` feature switches every address,
/// key and endpoint default over to Bitcoin testnet.
///
/// # Examples
///
/// ```
/// use tapkey_core::constants::NETWORK;
/// assert!(matches!(NETWORK, bitcoin::Network::Bitcoin | bitcoin::Network::Testnet));
/// ```
#[cfg(not(feature = "testnet"))]
pub const NETWORK: Network = Network::Bitcoin;

#[cfg(feature = "testnet")]
pub const NETWORK: Network = Network::Testnet;

/// Outputs at or below this value are uneconomical to spend; change this
/// small is folded into the fee instead.
pub const DUST_LIMIT: u64 = 546;

/// Fixed per-transaction overhead in vbytes (version, locktime, counts).
pub const BASE_TX_SIZE: u64 = 10;

pub const LEGACY_TX_INPUT_SIZE: u64 = 148;
pub const LEGACY_TX_OUTPUT_SIZE: u64 = 34;
pub const NESTED_SEGWIT_TX_INPUT_SIZE: u64 = 91;
pub const NESTED_SEGWIT_TX_OUTPUT_SIZE: u64 = 31;
pub const NATIVE_SEGWIT_TX_INPUT_SIZE: u64 = 68;
pub const NATIVE_SEGWIT_TX_OUTPUT_SIZE: u64 = 31;
pub const TAPROOT_TX_INPUT_SIZE: u64 = 58;
pub const TAPROOT_TX_OUTPUT_SIZE: u64 = 43;

/// BIP-86 path of the single key every wallet spends from: account 0,
/// external chain, first index.
pub const DERIVATION_PATH: &str = "m/86'/0'/0'/0/0";
