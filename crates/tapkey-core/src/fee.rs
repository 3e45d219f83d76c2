//! Transaction size and fee estimation from a fixed per-type size table.
//!
//! `size = BASE_TX_SIZE + inputs * input_size + outputs * output_size` and
//! `fee = size * fee_rate`. The table is keyed by a single address type for
//! both inputs and outputs.

use crate::constants::*;
use crate::error::FeeError;
use crate::types::AddressType;

/// `(input_size, output_size)` in vbytes for an address type.
pub fn size_table(address_type: AddressType) -> Result<(u64, u64), FeeError> {
    match address_type {
        AddressType::Legacy => Ok((LEGACY_TX_INPUT_SIZE, LEGACY_TX_OUTPUT_SIZE)),
        AddressType::NestedSegwit => Ok((NESTED_SEGWIT_TX_INPUT_SIZE, NESTED_SEGWIT_TX_OUTPUT_SIZE)),
        AddressType::NativeSegwit => Ok((NATIVE_SEGWIT_TX_INPUT_SIZE, NATIVE_SEGWIT_TX_OUTPUT_SIZE)),
        AddressType::Taproot => Ok((TAPROOT_TX_INPUT_SIZE, TAPROOT_TX_OUTPUT_SIZE)),
        AddressType::Invalid => Err(FeeError::UnknownAddressType(address_type.to_string())),
    }
}

/// Estimated virtual size of a transaction.
///
/// # Examples
///
/// ```
/// use tapkey_core::{estimate_size, AddressType};
/// assert_eq!(estimate_size(1, 2, AddressType::Taproot).unwrap(), 10 + 58 + 2 * 43);
/// ```
pub fn estimate_size(
    inputs: usize,
    outputs: usize,
    address_type: AddressType,
) -> Result<u64, FeeError> {
    let (input_size, output_size) = size_table(address_type)?;
    let inputs = (inputs as u64).checked_mul(input_size).ok_or(FeeError::Overflow)?;
    let outputs = (outputs as u64).checked_mul(output_size).ok_or(FeeError::Overflow)?;
    BASE_TX_SIZE
        .checked_add(inputs)
        .and_then(|s| s.checked_add(outputs))
        .ok_or(FeeError::Overflow)
}

/// Estimated fee in satoshis at `fee_rate` sat/vB.
///
/// # Examples
///
/// ```
/// use tapkey_core::{estimate_fee, AddressType};
/// assert_eq!(estimate_fee(2, 2, AddressType::Taproot, 10).unwrap(), 2120);
/// ```
pub fn estimate_fee(
    inputs: usize,
    outputs: usize,
    address_type: AddressType,
    fee_rate: u64,
) -> Result<u64, FeeError> {
    estimate_size(inputs, outputs, address_type)?
        .checked_mul(fee_rate)
        .ok_or(FeeError::Overflow)
}
