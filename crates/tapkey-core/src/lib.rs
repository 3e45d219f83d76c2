//! # tapkey-core
//! Foundation types and traits for the tapkey wallet engine.

pub mod address;
pub mod constants;
pub mod error;
pub mod fee;
pub mod traits;
pub mod types;

pub use address::{classify, classify_for};
pub use fee::{estimate_fee, estimate_size};
pub use types::{AddressType, Balance, RecommendedFees, Utxo};
