//! End-to-end spend flow against the UTXO and broadcast collaborators.
//!
//! Every spend walks the same stages:
//! `Initializing → SelectingInputs → SufficientFunds → Signing → Finalized → Broadcast`,
//! or stops in `Failed` at the first error. Nothing reaches the broadcaster
//! unless every input was selected, signed and finalized.

use std::fmt;

use bitcoin::{Network, Txid};
use tracing::{debug, info, warn};

use tapkey_core::address::classify_for;
use tapkey_core::constants::NETWORK;
use tapkey_core::error::SourceError;
use tapkey_core::traits::{Broadcaster, UtxoSource};
use tapkey_core::types::{AddressType, Balance};

use crate::builder::{SignedTransaction, TransactionBuilder};
use crate::coin_selection::{CoinSelection, CoinSelector};
use crate::error::WalletError;
use crate::wallet::{Wallet, parse_address};

/// Where a spend currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendStage {
    /// Validating addresses, balance and key.
    Initializing,
    SelectingInputs,
    /// Inputs cover payment plus fee; outputs are laid out.
    SufficientFunds,
    /// Fetching parent transactions and signing inputs.
    Signing,
    /// Final scripts written, bytes extracted.
    Finalized,
    /// Accepted by the broadcaster.
    Broadcast,
    /// Stopped with the given error message.
    Failed(String),
}

impl fmt::Display for SpendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendStage::Initializing => f.write_str("initializing"),
            SpendStage::SelectingInputs => f.write_str("selecting-inputs"),
            SpendStage::SufficientFunds => f.write_str("sufficient-funds"),
            SpendStage::Signing => f.write_str("signing"),
            SpendStage::Finalized => f.write_str("finalized"),
            SpendStage::Broadcast => f.write_str("broadcast"),
            SpendStage::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Stage history of a single spend, logged as it advances.
#[derive(Debug)]
struct StageLog {
    history: Vec<SpendStage>,
}

impl StageLog {
    fn start() -> Self {
        debug!(stage = %SpendStage::Initializing, "spend: started");
        Self {
            history: vec![SpendStage::Initializing],
        }
    }

    fn resume(history: Vec<SpendStage>) -> Self {
        Self { history }
    }

    fn current(&self) -> &SpendStage {
        self.history.last().unwrap_or(&SpendStage::Initializing)
    }

    fn enter(&mut self, next: SpendStage) {
        debug!(from = %self.current(), to = %next, "spend: stage transition");
        self.history.push(next);
    }

    fn fail(&mut self, err: &WalletError) {
        warn!(stage = %self.current(), error = %err, "spend: failed");
        self.history.push(SpendStage::Failed(err.to_string()));
    }
}

#[derive(Debug, Clone, Copy)]
enum SpendMode {
    Pay { amount: u64 },
    Drain,
}

/// A finalized, not yet broadcast spend.
#[derive(Debug, Clone)]
pub struct PreparedSpend {
    pub signed: SignedTransaction,
    pub selection: CoinSelection,
    /// Stages passed through, ending in `Finalized`.
    pub stages: Vec<SpendStage>,
}

/// What was broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendReceipt {
    /// Id reported by the broadcaster.
    pub txid: Txid,
    /// Fee paid in satoshis.
    pub fee: u64,
    /// Number of inputs spent.
    pub inputs: usize,
    /// Change returned to the source, if any.
    pub change: Option<u64>,
    pub raw_hex: String,
    pub stages: Vec<SpendStage>,
}

/// Runs spends for a wallet against its collaborators.
///
/// The collaborators are called at most once per request and never retried.
/// Parent transactions are fetched one input at a time.
pub struct Spender<'a> {
    utxos: &'a dyn UtxoSource,
    broadcaster: &'a dyn Broadcaster,
    network: Network,
}

impl<'a> Spender<'a> {
    pub fn new(utxos: &'a dyn UtxoSource, broadcaster: &'a dyn Broadcaster) -> Self {
        Self {
            utxos,
            broadcaster,
            network: NETWORK,
        }
    }

    /// Classify and parse addresses for `network` instead of the build-time
    /// network.
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Confirmed and unconfirmed totals held by `wallet`.
    pub async fn balance(&self, wallet: &Wallet) -> Result<Balance, WalletError> {
        let utxos = self.utxos.list_utxos(wallet.address()).await?;
        Ok(Balance::from_utxos(&utxos))
    }

    /// Build, sign and finalize a payment of `amount` sats without
    /// broadcasting it.
    pub async fn prepare_payment(
        &self,
        wallet: &Wallet,
        destination: &str,
        amount: u64,
        fee_rate: u64,
    ) -> Result<PreparedSpend, WalletError> {
        self.prepare(wallet, destination, SpendMode::Pay { amount }, fee_rate)
            .await
    }

    /// Build, sign and finalize a drain of every confirmed UTXO without
    /// broadcasting it.
    pub async fn prepare_drain(
        &self,
        wallet: &Wallet,
        destination: &str,
        fee_rate: u64,
    ) -> Result<PreparedSpend, WalletError> {
        self.prepare(wallet, destination, SpendMode::Drain, fee_rate)
            .await
    }

    /// Pay `amount` sats to `destination`, keeping change above the dust
    /// limit.
    pub async fn send(
        &self,
        wallet: &Wallet,
        destination: &str,
        amount: u64,
        fee_rate: u64,
    ) -> Result<SpendReceipt, WalletError> {
        let prepared = self.prepare_payment(wallet, destination, amount, fee_rate).await?;
        self.broadcast(prepared).await
    }

    /// Move the whole confirmed balance to `destination`.
    pub async fn drain(
        &self,
        wallet: &Wallet,
        destination: &str,
        fee_rate: u64,
    ) -> Result<SpendReceipt, WalletError> {
        let prepared = self.prepare_drain(wallet, destination, fee_rate).await?;
        self.broadcast(prepared).await
    }

    /// Submit a prepared spend.
    pub async fn broadcast(&self, prepared: PreparedSpend) -> Result<SpendReceipt, WalletError> {
        let mut log = StageLog::resume(prepared.stages);
        let expected = prepared.signed.txid();

        let txid = match self.broadcaster.submit(&prepared.signed.bytes).await {
            Ok(txid) => txid,
            Err(e) => {
                let err = WalletError::BroadcastRejected(match e {
                    SourceError::Rejected(message) => message,
                    other => other.to_string(),
                });
                log.fail(&err);
                return Err(err);
            }
        };
        if txid != expected {
            warn!(%txid, %expected, "spend: broadcaster reported a different txid");
        }

        log.enter(SpendStage::Broadcast);
        info!(
            %txid,
            fee = prepared.signed.fee,
            inputs = prepared.selection.selected.len(),
            "spend: broadcast"
        );

        Ok(SpendReceipt {
            txid,
            fee: prepared.signed.fee,
            inputs: prepared.selection.selected.len(),
            change: prepared.selection.change,
            raw_hex: prepared.signed.hex,
            stages: log.history,
        })
    }

    async fn prepare(
        &self,
        wallet: &Wallet,
        destination: &str,
        mode: SpendMode,
        fee_rate: u64,
    ) -> Result<PreparedSpend, WalletError> {
        let mut log = StageLog::start();
        match self.run(&mut log, wallet, destination, mode, fee_rate).await {
            Ok((signed, selection)) => Ok(PreparedSpend {
                signed,
                selection,
                stages: log.history,
            }),
            Err(e) => {
                log.fail(&e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        log: &mut StageLog,
        wallet: &Wallet,
        destination: &str,
        mode: SpendMode,
        fee_rate: u64,
    ) -> Result<(SignedTransaction, CoinSelection), WalletError> {
        // Initializing: nothing below touches the network until both
        // addresses are known-good.
        let source = wallet.address();
        let source_type = classify_for(&source.to_string(), self.network);
        if !source_type.is_valid() {
            return Err(WalletError::InvalidAddress {
                role: "source",
                address: source.to_string(),
            });
        }
        let destination_type = classify_for(destination, self.network);
        if destination_type == AddressType::Invalid {
            return Err(WalletError::InvalidAddress {
                role: "destination",
                address: destination.to_string(),
            });
        }
        let destination = parse_address(destination, self.network, "destination")?;
        if let SpendMode::Pay { amount: 0 } = mode {
            return Err(WalletError::InvalidAmount("payment must be non-zero".into()));
        }
        if fee_rate == 0 {
            return Err(WalletError::InvalidAmount("fee rate must be non-zero".into()));
        }

        let utxos = self.utxos.list_confirmed(source).await?;
        let confirmed = Balance::from_utxos(&utxos).confirmed;
        if let SpendMode::Pay { amount } = mode {
            if amount >= confirmed {
                return Err(WalletError::InsufficientBalance {
                    have: confirmed,
                    need: amount,
                });
            }
        }
        wallet.verify_key_matches_address()?;

        log.enter(SpendStage::SelectingInputs);
        let selection = match mode {
            SpendMode::Pay { amount } => {
                CoinSelector::select(&utxos, amount, fee_rate, destination_type)?
            }
            SpendMode::Drain => CoinSelector::drain(&utxos, fee_rate, destination_type)?,
        };

        log.enter(SpendStage::SufficientFunds);
        debug!(
            inputs = selection.selected.len(),
            total_in = selection.total_in,
            payment = selection.payment,
            fee = selection.fee,
            change = ?selection.change,
            "spend: inputs selected"
        );
        let mut unsigned =
            TransactionBuilder::new(source, source_type, &destination).build(&selection)?;

        log.enter(SpendStage::Signing);
        for (index, utxo) in selection.selected.iter().enumerate() {
            let raw = self
                .utxos
                .fetch_raw_tx(&utxo.txid)
                .await
                .map_err(|e| WalletError::MissingPrevout {
                    txid: utxo.txid,
                    reason: e.to_string(),
                })?;
            unsigned.attach_prevout(index, &raw, wallet.key())?;
        }
        unsigned.sign(wallet.key())?;
        let signed = unsigned.finalize()?;

        log.enter(SpendStage::Finalized);
        debug!(txid = %signed.txid(), size = signed.bytes.len(), "spend: finalized");
        Ok((signed, selection))
    }
}
