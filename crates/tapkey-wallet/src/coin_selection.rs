//! Smallest-first coin selection and drain planning.
//!
//! Selection is pure: it works over an in-memory UTXO list and never touches
//! the network. Only confirmed UTXOs are ever considered.

use tapkey_core::constants::DUST_LIMIT;
use tapkey_core::fee::estimate_fee;
use tapkey_core::types::{AddressType, Utxo};

use crate::error::WalletError;

/// Outputs assumed while accumulating inputs in pay mode: payment + change.
const PAY_MODE_OUTPUTS: usize = 2;
const DRAIN_OUTPUTS: usize = 1;

/// Result of coin selection: which UTXOs to spend and the value breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, in spending order.
    pub selected: Vec<Utxo>,
    /// Sum of selected values.
    pub total_in: u64,
    /// Value of the payment output.
    pub payment: u64,
    /// Estimated fee the selection was planned against.
    pub fee: u64,
    /// Change returned to the source, present only above the dust limit.
    pub change: Option<u64>,
}

impl CoinSelection {
    pub fn output_count(&self) -> usize {
        if self.change.is_some() { 2 } else { 1 }
    }

    /// Fee actually paid by the resulting transaction: the planned fee plus
    /// any sub-dust surplus that was not returned as change.
    pub fn absolute_fee(&self) -> u64 {
        self.total_in
            .saturating_sub(self.payment)
            .saturating_sub(self.change.unwrap_or(0))
    }
}

/// Smallest-first coin selector.
///
/// Sorts confirmed UTXOs by value ascending and adds them one at a time,
/// re-estimating the fee for the growing input count, until the payment plus
/// fee is covered.
pub struct CoinSelector;

impl CoinSelector {
    /// Select inputs for a payment of `payment` sats at `fee_rate` sat/vB.
    ///
    /// The fee is estimated against `destination_type` with two outputs for
    /// every prefix considered; whether change survives is decided only once
    /// the covering prefix is found.
    ///
    /// # Examples
    ///
    /// ```
    /// use bitcoin::Txid;
    /// use bitcoin::hashes::Hash;
    /// use tapkey_core::{AddressType, Utxo};
    /// use tapkey_wallet::CoinSelector;
    ///
    /// let utxos: Vec<Utxo> = [1_000, 5_000, 20_000]
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(i, &value)| Utxo {
    ///         txid: Txid::from_byte_array([i as u8 + 1; 32]),
    ///         vout: 0,
    ///         value,
    ///         confirmed: true,
    ///     })
    ///     .collect();
    ///
    /// let sel = CoinSelector::select(&utxos, 4_000, 10, AddressType::Taproot).unwrap();
    /// assert_eq!(sel.selected.len(), 3);
    /// assert_eq!(sel.fee, 2_700);
    /// ```
    pub fn select(
        utxos: &[Utxo],
        payment: u64,
        fee_rate: u64,
        destination_type: AddressType,
    ) -> Result<CoinSelection, WalletError> {
        if payment == 0 {
            return Err(WalletError::InvalidAmount("payment must be non-zero".into()));
        }
        check_fee_rate(fee_rate)?;

        let mut candidates: Vec<&Utxo> = utxos.iter().filter(|u| u.confirmed).collect();
        candidates.sort_by_key(|u| u.value);

        let mut selected = Vec::new();
        let mut total_in: u64 = 0;
        let mut fee = estimate_fee(0, PAY_MODE_OUTPUTS, destination_type, fee_rate)?;

        for utxo in candidates {
            selected.push(utxo.clone());
            total_in = total_in.saturating_add(utxo.value);
            fee = estimate_fee(selected.len(), PAY_MODE_OUTPUTS, destination_type, fee_rate)?;

            let needed = payment.saturating_add(fee);
            if total_in >= needed {
                let remainder = total_in - needed;
                let change = (remainder > DUST_LIMIT).then_some(remainder);
                return Ok(CoinSelection {
                    selected,
                    total_in,
                    payment,
                    fee,
                    change,
                });
            }
        }

        Err(WalletError::InsufficientInputs {
            have: total_in,
            need: payment.saturating_add(fee),
        })
    }

    /// Plan a drain: every confirmed UTXO, one output worth the rest.
    pub fn drain(
        utxos: &[Utxo],
        fee_rate: u64,
        destination_type: AddressType,
    ) -> Result<CoinSelection, WalletError> {
        check_fee_rate(fee_rate)?;

        let selected: Vec<Utxo> = utxos.iter().filter(|u| u.confirmed).cloned().collect();
        let total_in = selected
            .iter()
            .fold(0u64, |acc, u| acc.saturating_add(u.value));
        let fee = estimate_fee(selected.len(), DRAIN_OUTPUTS, destination_type, fee_rate)?;

        match total_in.checked_sub(fee) {
            Some(payment) if payment > 0 => Ok(CoinSelection {
                selected,
                total_in,
                payment,
                fee,
                change: None,
            }),
            _ => Err(WalletError::InsufficientInputs {
                have: total_in,
                need: fee.saturating_add(1),
            }),
        }
    }
}

fn check_fee_rate(fee_rate: u64) -> Result<(), WalletError> {
    if fee_rate == 0 {
        return Err(WalletError::InvalidAmount("fee rate must be non-zero".into()));
    }
    Ok(())
}
