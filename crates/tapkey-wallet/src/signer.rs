//! Per-address-type PSBT input signing.
//!
//! Legacy inputs get a legacy ECDSA sighash over the previous output's
//! script, both SegWit v0 forms a BIP-143 P2WPKH sighash, and Taproot inputs
//! a BIP-341 key-path Schnorr signature made with the tweaked key.

use bitcoin::ecdsa;
use bitcoin::hashes::Hash;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{PublicKey, ScriptBuf, TxOut, taproot};

use tapkey_core::types::AddressType;

use crate::error::WalletError;
use crate::keys::SpendingKey;

/// Something that can sign every input of a PSBT spending from one address.
pub trait Signer {
    /// Sign all inputs along the path for `address_type`, storing the
    /// signatures in the PSBT. Returns the number of inputs signed.
    ///
    /// Every input must already carry its spent output (`witness_utxo` or
    /// `non_witness_utxo`).
    fn sign_psbt(&self, psbt: &mut Psbt, address_type: AddressType) -> Result<usize, WalletError>;
}

impl Signer for SpendingKey {
    fn sign_psbt(&self, psbt: &mut Psbt, address_type: AddressType) -> Result<usize, WalletError> {
        let spent = spent_outputs(psbt)?;
        let tx = psbt.unsigned_tx.clone();
        let mut cache = SighashCache::new(&tx);
        let secp = self.secp();
        let pubkey = self.public_key();

        for (index, input) in psbt.inputs.iter_mut().enumerate() {
            match address_type {
                AddressType::Legacy => {
                    let sighash = cache
                        .legacy_signature_hash(
                            index,
                            &spent[index].script_pubkey,
                            EcdsaSighashType::All.to_u32(),
                        )
                        .map_err(|e| WalletError::Signing(e.to_string()))?;
                    let msg = Message::from_digest(sighash.to_byte_array());
                    let sig = secp.sign_ecdsa(&msg, self.secret_key());
                    input
                        .partial_sigs
                        .insert(PublicKey::new(pubkey.0), ecdsa::Signature::sighash_all(sig));
                }
                AddressType::NestedSegwit | AddressType::NativeSegwit => {
                    let script_code = ScriptBuf::new_p2wpkh(&pubkey.wpubkey_hash());
                    let sighash = cache
                        .p2wpkh_signature_hash(
                            index,
                            &script_code,
                            spent[index].value,
                            EcdsaSighashType::All,
                        )
                        .map_err(|e| WalletError::Signing(e.to_string()))?;
                    let msg = Message::from_digest(sighash.to_byte_array());
                    let sig = secp.sign_ecdsa(&msg, self.secret_key());
                    input
                        .partial_sigs
                        .insert(PublicKey::new(pubkey.0), ecdsa::Signature::sighash_all(sig));
                }
                AddressType::Taproot => {
                    let sighash = cache
                        .taproot_key_spend_signature_hash(
                            index,
                            &Prevouts::All(&spent),
                            TapSighashType::Default,
                        )
                        .map_err(|e| WalletError::Signing(e.to_string()))?;
                    let msg = Message::from_digest(sighash.to_byte_array());
                    let signature = secp.sign_schnorr_no_aux_rand(&msg, &self.tweaked_keypair());
                    input.tap_key_sig = Some(taproot::Signature {
                        signature,
                        sighash_type: TapSighashType::Default,
                    });
                }
                AddressType::Invalid => {
                    return Err(WalletError::Signing("cannot sign for an invalid address type".into()));
                }
            }
        }

        Ok(psbt.inputs.len())
    }
}

/// The output each PSBT input spends, in input order.
pub(crate) fn spent_outputs(psbt: &Psbt) -> Result<Vec<TxOut>, WalletError> {
    psbt.inputs
        .iter()
        .zip(&psbt.unsigned_tx.input)
        .enumerate()
        .map(|(index, (input, txin))| {
            if let Some(out) = &input.witness_utxo {
                return Ok(out.clone());
            }
            input
                .non_witness_utxo
                .as_ref()
                .and_then(|prev| prev.output.get(txin.previous_output.vout as usize))
                .cloned()
                .ok_or_else(|| WalletError::Signing(format!("input {index} has no spent output")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_address;
    use crate::mnemonic::mnemonic_from_secret;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, Network, OutPoint, Sequence, Transaction, TxIn, Txid, Witness};

    fn key() -> SpendingKey {
        let m = mnemonic_from_secret("signer tests").unwrap();
        SpendingKey::from_mnemonic(&m, Network::Bitcoin).unwrap()
    }

    fn psbt_spending(key: &SpendingKey, ty: AddressType) -> Psbt {
        let spk = derive_address(key, ty).unwrap().script_pubkey();
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::from_byte_array([7; 32]), 0),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(9_000),
                script_pubkey: spk.clone(),
            }],
        };
        let mut psbt = Psbt::from_unsigned_tx(tx).unwrap();
        psbt.inputs[0].witness_utxo = Some(TxOut {
            value: Amount::from_sat(10_000),
            script_pubkey: spk,
        });
        psbt
    }

    #[test]
    fn taproot_signs_with_tweaked_key() {
        let key = key();
        let mut psbt = psbt_spending(&key, AddressType::Taproot);
        assert_eq!(key.sign_psbt(&mut psbt, AddressType::Taproot).unwrap(), 1);
        let sig = psbt.inputs[0].tap_key_sig.as_ref().unwrap().clone();

        let spent = spent_outputs(&psbt).unwrap();
        let sighash = SighashCache::new(&psbt.unsigned_tx)
            .taproot_key_spend_signature_hash(0, &Prevouts::All(&spent), TapSighashType::Default)
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        let (output_key, _) = key.tweaked_keypair().x_only_public_key();
        key.secp()
            .verify_schnorr(&sig.signature, &msg, &output_key)
            .unwrap();
        // The untweaked internal key must not verify.
        assert!(key
            .secp()
            .verify_schnorr(&sig.signature, &msg, &key.x_only_public_key())
            .is_err());
    }

    #[test]
    fn native_segwit_partial_sig() {
        let key = key();
        let mut psbt = psbt_spending(&key, AddressType::NativeSegwit);
        key.sign_psbt(&mut psbt, AddressType::NativeSegwit).unwrap();
        let pk = PublicKey::new(key.public_key().0);
        let sig = psbt.inputs[0].partial_sigs.get(&pk).unwrap();
        assert_eq!(sig.sighash_type, EcdsaSighashType::All);
        assert!(psbt.inputs[0].tap_key_sig.is_none());
    }

    #[test]
    fn missing_spent_output_fails() {
        let key = key();
        let mut psbt = psbt_spending(&key, AddressType::Taproot);
        psbt.inputs[0].witness_utxo = None;
        let err = key.sign_psbt(&mut psbt, AddressType::Taproot).unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
    }

    #[test]
    fn invalid_type_refused() {
        let key = key();
        let mut psbt = psbt_spending(&key, AddressType::Taproot);
        assert!(key.sign_psbt(&mut psbt, AddressType::Invalid).is_err());
    }
}
