//! Error types shared across the tapkey crates.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("cannot size transaction for address type {0}")] UnknownAddressType(String),
    #[error("fee arithmetic overflow")] Overflow,
}

/// Failures reported by the UTXO, fee-rate and broadcast collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("transport: {0}")] Transport(String),
    #[error("unexpected HTTP status {status}: {body}")] Status { status: u16, body: String },
    #[error("not found: {0}")] NotFound(String),
    #[error("decode: {0}")] Decode(String),
    #[error("rejected: {0}")] Rejected(String),
}
