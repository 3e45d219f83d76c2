//! PSBT assembly, prevout attachment and finalization.
//!
//! A spend moves through three values:
//! 1. [`TransactionBuilder::build`] turns a [`CoinSelection`] into an
//!    [`UnsignedTransaction`] (a PSBT with outputs and bare inputs)
//! 2. each input gets its parent transaction attached, then all inputs are
//!    signed through a [`Signer`]
//! 3. [`UnsignedTransaction::finalize`] writes the final scriptSig/witness
//!    data and extracts a [`SignedTransaction`]

use bitcoin::absolute::LockTime;
use bitcoin::consensus;
use bitcoin::psbt::Psbt;
use bitcoin::script::PushBytesBuf;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
    ecdsa,
};

use tapkey_core::types::{AddressType, Utxo};

use crate::coin_selection::CoinSelection;
use crate::error::WalletError;
use crate::keys::SpendingKey;
use crate::signer::Signer;

/// Builds the unsigned spend for one source/destination pair.
///
/// # Example
/// ```ignore
/// let mut unsigned = TransactionBuilder::new(&source, AddressType::Taproot, &dest)
///     .build(&selection)?;
/// unsigned.attach_prevout(0, &raw_parent, &key)?;
/// unsigned.sign(&key)?;
/// let signed = unsigned.finalize()?;
/// ```
pub struct TransactionBuilder {
    source: Address,
    source_type: AddressType,
    destination: Address,
}

impl TransactionBuilder {
    pub fn new(source: &Address, source_type: AddressType, destination: &Address) -> Self {
        Self {
            source: source.clone(),
            source_type,
            destination: destination.clone(),
        }
    }

    /// Lay out inputs in selection order, the payment output first and the
    /// change output (back to the source) second when there is one.
    pub fn build(&self, selection: &CoinSelection) -> Result<UnsignedTransaction, WalletError> {
        if selection.selected.is_empty() {
            return Err(WalletError::InsufficientInputs {
                have: 0,
                need: selection.payment.saturating_add(selection.fee),
            });
        }

        let input = selection
            .selected
            .iter()
            .map(|utxo| TxIn {
                previous_output: utxo.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            })
            .collect();

        let mut output = vec![TxOut {
            value: Amount::from_sat(selection.payment),
            script_pubkey: self.destination.script_pubkey(),
        }];
        if let Some(change) = selection.change {
            output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: self.source.script_pubkey(),
            });
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        };
        let psbt = Psbt::from_unsigned_tx(tx).map_err(|e| WalletError::Finalize(e.to_string()))?;

        Ok(UnsignedTransaction {
            psbt,
            address_type: self.source_type,
            source_script: self.source.script_pubkey(),
            attached: vec![false; selection.selected.len()],
            selection: selection.clone(),
        })
    }
}

/// A PSBT being prepared for signing.
#[derive(Debug)]
pub struct UnsignedTransaction {
    psbt: Psbt,
    address_type: AddressType,
    source_script: ScriptBuf,
    attached: Vec<bool>,
    selection: CoinSelection,
}

impl UnsignedTransaction {
    /// Selected UTXOs, in input order.
    pub fn inputs(&self) -> &[Utxo] {
        &self.selection.selected
    }

    pub fn selection(&self) -> &CoinSelection {
        &self.selection
    }

    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// Attach the parent transaction of input `index`.
    ///
    /// The raw bytes must decode to the transaction the UTXO names, and the
    /// referenced output must exist, carry the UTXO's value and pay the
    /// source address. Any mismatch is a `MissingPrevout`.
    pub fn attach_prevout(
        &mut self,
        index: usize,
        raw_tx: &[u8],
        key: &SpendingKey,
    ) -> Result<(), WalletError> {
        let utxo = self
            .selection
            .selected
            .get(index)
            .ok_or_else(|| WalletError::Finalize(format!("no input at index {index}")))?;
        let missing = |reason: String| WalletError::MissingPrevout {
            txid: utxo.txid,
            reason,
        };

        let prev: Transaction = consensus::deserialize(raw_tx)
            .map_err(|e| missing(format!("undecodable transaction: {e}")))?;
        let fetched: Txid = prev.compute_txid();
        if fetched != utxo.txid {
            return Err(missing(format!("source returned transaction {fetched}")));
        }
        let spent = prev
            .output
            .get(utxo.vout as usize)
            .cloned()
            .ok_or_else(|| missing(format!("no output {}", utxo.vout)))?;
        if spent.value.to_sat() != utxo.value {
            return Err(missing(format!(
                "output {} holds {} sats, expected {}",
                utxo.vout,
                spent.value.to_sat(),
                utxo.value
            )));
        }
        if spent.script_pubkey != self.source_script {
            return Err(missing(format!("output {} does not pay the source address", utxo.vout)));
        }

        let input = &mut self.psbt.inputs[index];
        match self.address_type {
            AddressType::Legacy => {
                input.non_witness_utxo = Some(prev);
            }
            AddressType::NestedSegwit => {
                input.witness_utxo = Some(spent);
                input.redeem_script = Some(ScriptBuf::new_p2wpkh(&key.public_key().wpubkey_hash()));
            }
            AddressType::NativeSegwit => {
                input.witness_utxo = Some(spent);
            }
            AddressType::Taproot => {
                input.witness_utxo = Some(spent);
                input.tap_internal_key = Some(key.x_only_public_key());
            }
            AddressType::Invalid => {
                return Err(WalletError::InvalidAddress {
                    role: "source",
                    address: AddressType::Invalid.to_string(),
                });
            }
        }
        self.attached[index] = true;
        Ok(())
    }

    /// Sign every input. All prevouts must be attached first.
    pub fn sign(&mut self, signer: &dyn Signer) -> Result<usize, WalletError> {
        if let Some(index) = self.attached.iter().position(|done| !done) {
            return Err(WalletError::Signing(format!("input {index} has no prevout attached")));
        }
        signer.sign_psbt(&mut self.psbt, self.address_type)
    }

    /// Write final scriptSig/witness data for every input and extract the
    /// network transaction.
    pub fn finalize(mut self) -> Result<SignedTransaction, WalletError> {
        for (index, input) in self.psbt.inputs.iter_mut().enumerate() {
            let unsigned = || WalletError::Finalize(format!("input {index} is not signed"));
            match self.address_type {
                AddressType::Legacy => {
                    let (pk, sig) = input
                        .partial_sigs
                        .iter()
                        .next()
                        .map(|(pk, sig)| (*pk, *sig))
                        .ok_or_else(unsigned)?;
                    let sig_push = PushBytesBuf::try_from(signature_bytes(&sig))
                        .map_err(|e| WalletError::Finalize(e.to_string()))?;
                    input.final_script_sig = Some(
                        ScriptBuf::builder()
                            .push_slice(sig_push)
                            .push_key(&pk)
                            .into_script(),
                    );
                    input.partial_sigs.clear();
                }
                AddressType::NestedSegwit => {
                    let (pk, sig) = input
                        .partial_sigs
                        .iter()
                        .next()
                        .map(|(pk, sig)| (*pk, *sig))
                        .ok_or_else(unsigned)?;
                    let redeem = input
                        .redeem_script
                        .take()
                        .ok_or_else(|| WalletError::Finalize(format!("input {index} has no redeem script")))?;
                    let redeem_push = PushBytesBuf::try_from(redeem.to_bytes())
                        .map_err(|e| WalletError::Finalize(e.to_string()))?;
                    input.final_script_sig =
                        Some(ScriptBuf::builder().push_slice(redeem_push).into_script());
                    input.final_script_witness = Some(p2wpkh_witness(&sig, &pk));
                    input.partial_sigs.clear();
                }
                AddressType::NativeSegwit => {
                    let (pk, sig) = input
                        .partial_sigs
                        .iter()
                        .next()
                        .map(|(pk, sig)| (*pk, *sig))
                        .ok_or_else(unsigned)?;
                    input.final_script_witness = Some(p2wpkh_witness(&sig, &pk));
                    input.partial_sigs.clear();
                }
                AddressType::Taproot => {
                    let sig = input.tap_key_sig.take().ok_or_else(unsigned)?;
                    input.final_script_witness = Some(Witness::p2tr_key_spend(&sig));
                    input.tap_internal_key = None;
                }
                AddressType::Invalid => {
                    return Err(WalletError::Finalize("invalid address type".into()));
                }
            }
        }

        let fee = self.selection.absolute_fee();
        // Fee policy belongs to the broadcaster; no local fee-rate ceiling.
        let tx = self.psbt.extract_tx_unchecked_fee_rate();
        let bytes = consensus::serialize(&tx);
        let hex = hex::encode(&bytes);
        Ok(SignedTransaction {
            tx,
            bytes,
            hex,
            fee,
        })
    }
}

/// DER signature with the sighash byte appended.
fn signature_bytes(sig: &ecdsa::Signature) -> Vec<u8> {
    let mut bytes = sig.signature.serialize_der().to_vec();
    bytes.push(sig.sighash_type.to_u32() as u8);
    bytes
}

fn p2wpkh_witness(sig: &ecdsa::Signature, pk: &PublicKey) -> Witness {
    let mut witness = Witness::new();
    witness.push(signature_bytes(sig));
    witness.push(pk.to_bytes());
    witness
}

/// A fully signed transaction, ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    /// Consensus encoding of `tx`.
    pub bytes: Vec<u8>,
    /// Lowercase hex of `bytes`.
    pub hex: String,
    /// Fee paid in satoshis (inputs minus outputs).
    pub fee: u64,
}

impl SignedTransaction {
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin_selection::CoinSelector;
    use crate::keys::derive_address;
    use crate::mnemonic::mnemonic_from_secret;
    use bitcoin::hashes::Hash;
    use bitcoin::{Network, OutPoint};

    fn key() -> SpendingKey {
        let m = mnemonic_from_secret("builder tests").unwrap();
        SpendingKey::from_mnemonic(&m, Network::Bitcoin).unwrap()
    }

    fn destination() -> Address {
        let m = mnemonic_from_secret("someone else").unwrap();
        let other = SpendingKey::from_mnemonic(&m, Network::Bitcoin).unwrap();
        derive_address(&other, AddressType::Taproot).unwrap()
    }

    /// A parent transaction paying `value` to `script` at output 1.
    fn funding(script: &ScriptBuf, value: u64, salt: u8) -> (Transaction, Utxo) {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::from_byte_array([salt; 32]), 0),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut {
                    value: Amount::from_sat(1),
                    script_pubkey: ScriptBuf::new(),
                },
                TxOut {
                    value: Amount::from_sat(value),
                    script_pubkey: script.clone(),
                },
            ],
        };
        let utxo = Utxo {
            txid: tx.compute_txid(),
            vout: 1,
            value,
            confirmed: true,
        };
        (tx, utxo)
    }

    fn spend(ty: AddressType) -> (SignedTransaction, CoinSelection, Address) {
        let key = key();
        let source = derive_address(&key, ty).unwrap();
        let script = source.script_pubkey();
        let (tx1, u1) = funding(&script, 30_000, 1);
        let (tx2, u2) = funding(&script, 50_000, 2);
        let dest = destination();

        let selection = CoinSelector::select(&[u1, u2], 60_000, 2, AddressType::Taproot).unwrap();
        let mut unsigned = TransactionBuilder::new(&source, ty, &dest).build(&selection).unwrap();
        for (index, utxo) in unsigned.inputs().to_vec().iter().enumerate() {
            let raw = if utxo.txid == tx1.compute_txid() { &tx1 } else { &tx2 };
            unsigned
                .attach_prevout(index, &consensus::serialize(raw), &key)
                .unwrap();
        }
        assert_eq!(unsigned.sign(&key).unwrap(), 2);
        (unsigned.finalize().unwrap(), selection, source)
    }

    #[test]
    fn taproot_spend_layout() {
        let (signed, selection, source) = spend(AddressType::Taproot);
        assert_eq!(signed.tx.input.len(), 2);
        assert_eq!(signed.tx.output.len(), 2);
        assert_eq!(signed.tx.output[0].value.to_sat(), 60_000);
        assert_eq!(signed.tx.output[0].script_pubkey, destination().script_pubkey());
        assert_eq!(signed.tx.output[1].script_pubkey, source.script_pubkey());
        assert_eq!(Some(signed.tx.output[1].value.to_sat()), selection.change);
        for input in &signed.tx.input {
            assert!(input.script_sig.is_empty());
            assert_eq!(input.witness.len(), 1);
            assert_eq!(input.witness.nth(0).map(<[u8]>::len), Some(64));
        }
        assert_eq!(signed.fee, selection.fee);
        assert_eq!(signed.hex, hex::encode(&signed.bytes));
        let decoded: Transaction = consensus::deserialize(&signed.bytes).unwrap();
        assert_eq!(decoded.compute_txid(), signed.txid());
    }

    #[test]
    fn native_segwit_spend_layout() {
        let (signed, _, _) = spend(AddressType::NativeSegwit);
        for input in &signed.tx.input {
            assert!(input.script_sig.is_empty());
            assert_eq!(input.witness.len(), 2);
            assert_eq!(input.witness.nth(1).map(<[u8]>::len), Some(33));
        }
    }

    #[test]
    fn nested_segwit_spend_layout() {
        let (signed, _, _) = spend(AddressType::NestedSegwit);
        let redeem = ScriptBuf::new_p2wpkh(&key().public_key().wpubkey_hash());
        for input in &signed.tx.input {
            // OP_PUSHBYTES_22 <0014{20-byte hash}>
            assert_eq!(input.script_sig.len(), 23);
            assert_eq!(&input.script_sig.as_bytes()[1..], redeem.as_bytes());
            assert_eq!(input.witness.len(), 2);
        }
    }

    #[test]
    fn legacy_spend_layout() {
        let (signed, _, _) = spend(AddressType::Legacy);
        for input in &signed.tx.input {
            assert!(input.witness.is_empty());
            let pushes: Vec<_> = input.script_sig.instructions().collect::<Result<_, _>>().unwrap();
            assert_eq!(pushes.len(), 2);
        }
    }

    #[test]
    fn no_change_means_one_output() {
        let key = key();
        let source = derive_address(&key, AddressType::Taproot).unwrap();
        let (tx, utxo) = funding(&source.script_pubkey(), 10_000, 3);
        let selection = CoinSelector::drain(&[utxo], 1, AddressType::Taproot).unwrap();
        let mut unsigned = TransactionBuilder::new(&source, AddressType::Taproot, &destination())
            .build(&selection)
            .unwrap();
        unsigned.attach_prevout(0, &consensus::serialize(&tx), &key).unwrap();
        unsigned.sign(&key).unwrap();
        let signed = unsigned.finalize().unwrap();
        assert_eq!(signed.tx.output.len(), 1);
        assert_eq!(signed.tx.output[0].value.to_sat(), 10_000 - 111);
        assert_eq!(signed.fee, 111);
    }

    #[test]
    fn high_fee_rate_still_finalizes() {
        let key = key();
        let source = derive_address(&key, AddressType::Taproot).unwrap();
        let legacy_dest = derive_address(&key, AddressType::Legacy).unwrap();
        let (tx, utxo) = funding(&source.script_pubkey(), 10_000_000, 5);
        // (10 + 148 + 2*34) * 20_000 = 4_520_000
        let selection = CoinSelector::select(&[utxo], 1_000, 20_000, AddressType::Legacy).unwrap();
        assert_eq!(selection.fee, 4_520_000);
        let mut unsigned = TransactionBuilder::new(&source, AddressType::Taproot, &legacy_dest)
            .build(&selection)
            .unwrap();
        unsigned.attach_prevout(0, &consensus::serialize(&tx), &key).unwrap();
        unsigned.sign(&key).unwrap();
        let signed = unsigned.finalize().unwrap();
        assert_eq!(signed.fee, 4_520_000);
        assert_eq!(signed.tx.output[1].value.to_sat(), 10_000_000 - 1_000 - 4_520_000);
    }

    fn unsigned_for(value: u64) -> (UnsignedTransaction, Transaction, SpendingKey) {
        let key = key();
        let source = derive_address(&key, AddressType::Taproot).unwrap();
        let (tx, utxo) = funding(&source.script_pubkey(), value, 4);
        let selection = CoinSelector::select(&[utxo], 1_000, 1, AddressType::Taproot).unwrap();
        let unsigned = TransactionBuilder::new(&source, AddressType::Taproot, &destination())
            .build(&selection)
            .unwrap();
        (unsigned, tx, key)
    }

    #[test]
    fn attach_wrong_transaction_is_missing_prevout() {
        let (mut unsigned, _, key) = unsigned_for(10_000);
        let (other, _) = funding(&ScriptBuf::new(), 10_000, 9);
        let err = unsigned
            .attach_prevout(0, &consensus::serialize(&other), &key)
            .unwrap_err();
        assert!(matches!(err, WalletError::MissingPrevout { .. }));
    }

    #[test]
    fn attach_garbage_is_missing_prevout() {
        let (mut unsigned, _, key) = unsigned_for(10_000);
        let err = unsigned.attach_prevout(0, &[0xde, 0xad], &key).unwrap_err();
        assert!(matches!(err, WalletError::MissingPrevout { .. }));
    }

    #[test]
    fn attach_value_mismatch_is_missing_prevout() {
        let (mut unsigned, tx, key) = unsigned_for(10_000);
        let mut forged = unsigned.selection.clone();
        forged.selected[0].value = 9_999;
        unsigned.selection = forged;
        let err = unsigned
            .attach_prevout(0, &consensus::serialize(&tx), &key)
            .unwrap_err();
        match err {
            WalletError::MissingPrevout { reason, .. } => assert!(reason.contains("9999")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sign_requires_prevouts() {
        let (mut unsigned, _, key) = unsigned_for(10_000);
        let err = unsigned.sign(&key).unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
    }

    #[test]
    fn finalize_requires_signatures() {
        let (mut unsigned, tx, key) = unsigned_for(10_000);
        unsigned.attach_prevout(0, &consensus::serialize(&tx), &key).unwrap();
        let err = unsigned.finalize().unwrap_err();
        assert!(matches!(err, WalletError::Finalize(_)));
    }
}
