//! # tapkey-wallet: password-derived single-key wallet engine.
//!
//! Derives one deterministic key and address from a secret, selects
//! confirmed UTXOs smallest-first with a fee that tracks the input count,
//! and builds, signs and finalizes the spending transaction through a PSBT.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`mnemonic`]: secret → entropy → BIP-39 phrase
//! - [`keys`]: BIP-32 derivation, per-type address derivation
//! - [`wallet`]: the `Wallet` identity (key + address)
//! - [`coin_selection`]: smallest-first selection and drain planning
//! - [`signer`]: per-address-type PSBT input signing
//! - [`builder`]: PSBT assembly, prevout attachment, finalization
//! - [`spend`]: the end-to-end spend flow against the collaborators

pub mod builder;
pub mod coin_selection;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod signer;
pub mod spend;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{SignedTransaction, TransactionBuilder, UnsignedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector};
pub use error::WalletError;
pub use keys::{SpendingKey, derive_address};
pub use mnemonic::{mnemonic_from_secret, parse_mnemonic};
pub use signer::Signer;
pub use spend::{PreparedSpend, SpendReceipt, SpendStage, Spender};
pub use wallet::Wallet;
