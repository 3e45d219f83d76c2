//! Collaborator interfaces the wallet engine depends on.
//!
//! - [`UtxoSource`]: lists UTXOs for an address and serves raw parent
//!   transactions (the CLI implements it against an Esplora server)
//! - [`Broadcaster`]: submits a finalized transaction
//! - [`FeeRateSource`]: recommended fee rates, consulted by callers only;
//!   the engine itself always takes an explicit rate
//!
//! Timeouts and retries are the implementor's business. The engine calls each
//! method at most once per plan and never retries.

use async_trait::async_trait;
use bitcoin::{Address, Txid};

use crate::error::SourceError;
use crate::types::{RecommendedFees, Utxo};

#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// All UTXOs currently held by `address`, confirmed or not.
    async fn list_utxos(&self, address: &Address) -> Result<Vec<Utxo>, SourceError>;

    /// Only the confirmed UTXOs held by `address`.
    ///
    /// Default implementation filters [`list_utxos`](Self::list_utxos).
    async fn list_confirmed(&self, address: &Address) -> Result<Vec<Utxo>, SourceError> {
        let utxos = self.list_utxos(address).await?;
        Ok(utxos.into_iter().filter(|u| u.confirmed).collect())
    }

    /// Consensus-encoded bytes of the transaction with id `txid`.
    async fn fetch_raw_tx(&self, txid: &Txid) -> Result<Vec<u8>, SourceError>;
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit a consensus-encoded transaction, returning the id the network
    /// assigned to it.
    async fn submit(&self, raw_tx: &[u8]) -> Result<Txid, SourceError>;
}

#[async_trait]
pub trait FeeRateSource: Send + Sync {
    async fn recommended(&self) -> Result<RecommendedFees, SourceError>;
}
