//! Shared test helpers: funding transactions and in-memory collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use tapkey_core::error::SourceError;
use tapkey_core::traits::{Broadcaster, UtxoSource};
use tapkey_core::types::Utxo;

/// A parent transaction paying `value` to `script` at output 0.
///
/// `salt` goes into the spent outpoint so that every funding transaction has
/// a distinct txid.
pub fn funding_tx(script: &ScriptBuf, value: u64, salt: u32) -> Transaction {
    let mut prev = [0u8; 32];
    prev[..4].copy_from_slice(&salt.to_le_bytes());
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::from_byte_array(prev), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: script.clone(),
        }],
    }
}

/// Confirmed UTXOs with the given values and synthetic txids.
pub fn utxos_with_values(values: &[u64]) -> Vec<Utxo> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let mut id = [0u8; 32];
            id[..8].copy_from_slice(&(i as u64).to_le_bytes());
            Utxo {
                txid: Txid::from_byte_array(id),
                vout: 0,
                value,
                confirmed: true,
            }
        })
        .collect()
}

/// In-memory UTXO source that serves real parent transactions and counts
/// every call.
#[derive(Default)]
pub struct MemorySource {
    utxos: Vec<Utxo>,
    raw: HashMap<Txid, Vec<u8>>,
    lists: AtomicUsize,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a funding transaction for `address` and register its output.
    pub fn fund(&mut self, address: &Address, value: u64, confirmed: bool) -> Utxo {
        let tx = funding_tx(&address.script_pubkey(), value, self.utxos.len() as u32 + 1);
        let utxo = Utxo {
            txid: tx.compute_txid(),
            vout: 0,
            value,
            confirmed,
        };
        self.raw.insert(utxo.txid, consensus::serialize(&tx));
        self.utxos.push(utxo.clone());
        utxo
    }

    /// Stop serving the parent transaction of `txid`.
    pub fn forget_raw(&mut self, txid: &Txid) {
        self.raw.remove(txid);
    }

    /// Serve `raw` as the parent transaction of `txid`.
    pub fn replace_raw(&mut self, txid: Txid, raw: Vec<u8>) {
        self.raw.insert(txid, raw);
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UtxoSource for MemorySource {
    async fn list_utxos(&self, _address: &Address) -> Result<Vec<Utxo>, SourceError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.utxos.clone())
    }

    async fn fetch_raw_tx(&self, txid: &Txid) -> Result<Vec<u8>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.raw
            .get(txid)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(txid.to_string()))
    }
}

/// Broadcaster that records submissions, or rejects them all.
#[derive(Default)]
pub struct RecordingBroadcaster {
    reject: Option<String>,
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Decoded transactions submitted so far.
    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted
            .lock()
            .map(|raw| {
                raw.iter()
                    .filter_map(|bytes| consensus::deserialize(bytes).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn submit(&self, raw_tx: &[u8]) -> Result<Txid, SourceError> {
        if let Some(reason) = &self.reject {
            return Err(SourceError::Rejected(reason.clone()));
        }
        let tx: Transaction =
            consensus::deserialize(raw_tx).map_err(|e| SourceError::Decode(e.to_string()))?;
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(raw_tx.to_vec());
        }
        Ok(tx.compute_txid())
    }
}
