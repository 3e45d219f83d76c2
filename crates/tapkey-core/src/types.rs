//! Core data model: address types, UTXOs, balances and fee recommendations.
//!
//! All monetary values are in satoshis.

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The script family an address belongs to.
///
/// Determines the fee-size table entry and the signing path used when
/// spending from an address of this type. `Invalid` is what the classifier
/// returns for anything that matches no known pattern; it is never spendable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    /// P2PKH (`1...` / `m...`, `n...`).
    Legacy,
    /// P2SH-wrapped P2WPKH (`3...` / `2...`).
    NestedSegwit,
    /// P2WPKH (`bc1q...` / `tb1q...`).
    NativeSegwit,
    /// P2TR key-path (`bc1p...` / `tb1p...`).
    Taproot,
    Invalid,
}

impl AddressType {
    /// Every spendable type, in table order.
    pub const SPENDABLE: [AddressType; 4] = [
        AddressType::Legacy,
        AddressType::NestedSegwit,
        AddressType::NativeSegwit,
        AddressType::Taproot,
    ];

    pub fn is_valid(&self) -> bool {
        !matches!(self, AddressType::Invalid)
    }

    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Legacy => "legacy",
            AddressType::NestedSegwit => "nested-segwit",
            AddressType::NativeSegwit => "native-segwit",
            AddressType::Taproot => "taproot",
            AddressType::Invalid => "invalid",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// An unspent output held by an address, as reported by a UTXO source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Utxo {
    /// Transaction that created the output.
    pub txid: Txid,
    /// Index of the output within that transaction.
    pub vout: u32,
    /// Output value in satoshis.
    pub value: u64,
    /// Whether the creating transaction is mined. Only confirmed outputs are
    /// ever selected or counted towards the spendable balance.
    pub confirmed: bool,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

/// Balance summary split by confirmation status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balance {
    /// Sum of confirmed UTXO values.
    pub confirmed: u64,
    /// Sum of unconfirmed UTXO values (visible, never spent).
    pub unconfirmed: u64,
    pub confirmed_count: usize,
    pub unconfirmed_count: usize,
}

impl Balance {
    /// Tally a UTXO list. Sums saturate rather than wrap.
    pub fn from_utxos(utxos: &[Utxo]) -> Self {
        utxos.iter().fold(Self::default(), |mut acc, utxo| {
            if utxo.confirmed {
                acc.confirmed = acc.confirmed.saturating_add(utxo.value);
                acc.confirmed_count += 1;
            } else {
                acc.unconfirmed = acc.unconfirmed.saturating_add(utxo.value);
                acc.unconfirmed_count += 1;
            }
            acc
        })
    }
}

/// Recommended fee rates in sat/vB, fastest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: u64,
    pub half_hour_fee: u64,
    pub hour_fee: u64,
    pub economy_fee: u64,
    pub minimum_fee: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    fn utxo(seed: u8, value: u64, confirmed: bool) -> Utxo {
        Utxo {
            txid: Txid::from_byte_array([seed; 32]),
            vout: 0,
            value,
            confirmed,
        }
    }

    #[test]
    fn balance_splits_confirmed_and_unconfirmed() {
        let utxos = vec![
            utxo(1, 1_000, true),
            utxo(2, 2_000, false),
            utxo(3, 3_000, true),
        ];
        let balance = Balance::from_utxos(&utxos);
        assert_eq!(balance.confirmed, 4_000);
        assert_eq!(balance.unconfirmed, 2_000);
        assert_eq!(balance.confirmed_count, 2);
        assert_eq!(balance.unconfirmed_count, 1);
    }

    #[test]
    fn balance_of_nothing_is_zero() {
        assert_eq!(Balance::from_utxos(&[]), Balance::default());
    }

    #[test]
    fn balance_saturates() {
        let utxos = vec![utxo(1, u64::MAX, true), utxo(2, 1, true)];
        assert_eq!(Balance::from_utxos(&utxos).confirmed, u64::MAX);
    }

    #[test]
    fn outpoint_carries_txid_and_vout() {
        let mut u = utxo(9, 10, true);
        u.vout = 3;
        let op = u.outpoint();
        assert_eq!(op.txid, u.txid);
        assert_eq!(op.vout, 3);
    }

    #[test]
    fn address_type_display_matches_serde() {
        for ty in AddressType::SPENDABLE {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{ty}\""));
        }
        assert!(!AddressType::Invalid.is_valid());
    }

    #[test]
    fn address_type_display_pads() {
        assert_eq!(format!("{:<8}|", AddressType::Legacy), "legacy  |");
    }

    #[test]
    fn recommended_fees_decode_mempool_json() {
        let json = r#"{"fastestFee":21,"halfHourFee":15,"hourFee":9,"economyFee":4,"minimumFee":2}"#;
        let fees: RecommendedFees = serde_json::from_str(json).unwrap();
        assert_eq!(fees.fastest_fee, 21);
        assert_eq!(fees.half_hour_fee, 15);
        assert_eq!(fees.hour_fee, 9);
        assert_eq!(fees.economy_fee, 4);
        assert_eq!(fees.minimum_fee, 2);
    }
}
