//! Wallet error types.

use bitcoin::Txid;
use tapkey_core::error::{FeeError, SourceError};
use thiserror::Error;

/// Errors that can occur while deriving a wallet or building a spend.
///
/// Every variant is terminal for the plan that produced it: nothing is
/// retried and nothing is broadcast after an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Source or destination address matched no known address pattern, or
    /// failed to parse for the configured network.
    #[error("invalid {role} address: {address}")]
    InvalidAddress {
        /// `"source"` or `"destination"`.
        role: &'static str,
        /// The offending address string.
        address: String,
    },

    /// The spending key does not reproduce the claimed source address.
    #[error("source address {expected} does not match key (derives {derived})")]
    KeyAddressMismatch {
        /// Address the caller claimed to spend from.
        expected: String,
        /// Address the key actually derives for that type.
        derived: String,
    },

    /// Requested amount is not below the confirmed balance.
    #[error("insufficient balance: have {have}, need more than {need}")]
    InsufficientBalance {
        /// Confirmed balance in satoshis.
        have: u64,
        /// Requested payment in satoshis.
        need: u64,
    },

    /// Confirmed UTXOs cannot cover the payment plus fee.
    #[error("insufficient inputs: have {have}, need {need}")]
    InsufficientInputs {
        /// Total value of the inputs considered.
        have: u64,
        /// Amount plus fee that had to be covered.
        need: u64,
    },

    /// A selected input's parent transaction could not be fetched or does
    /// not contain the referenced output.
    #[error("missing prevout {txid}: {reason}")]
    MissingPrevout {
        /// The parent transaction id.
        txid: Txid,
        /// What went wrong.
        reason: String,
    },

    /// The network rejected the finalized transaction.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Invalid monetary amount or fee rate.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid or non-checksumming BIP-39 phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Malformed WIF private key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// BIP-32 derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// Sighash computation or signing failure.
    #[error("signing: {0}")]
    Signing(String),

    /// PSBT finalization or extraction failure.
    #[error("finalize: {0}")]
    Finalize(String),

    /// UTXO source failure.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Fee estimation failure.
    #[error(transparent)]
    Fee(#[from] FeeError),
}
