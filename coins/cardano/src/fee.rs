//! Size, fee and TTL arithmetic
//!
//! Size is always measured on encoded bytes. The only derived size is
//! [`update_tx_size`], which swaps the width of the TTL integer.

use crate::cbor::cbor_uint_len;
use crate::error::{ConstructionError, Result};
use crate::types::ProtocolParameters;

/// Exact size of an encoded transaction
pub fn transaction_size(bytes: &[u8]) -> u64 {
    bytes.len() as u64
}

/// Linear minimum fee: `a * size + b`
pub fn minimum_fee(size: u64, params: &ProtocolParameters) -> Result<u64> {
    params
        .min_fee_coefficient
        .checked_mul(size)
        .and_then(|fee| fee.checked_add(params.min_fee_constant))
        .ok_or_else(|| ConstructionError::CantCreateUnsignedTransaction(format!("fee overflow for size {}", size)))
}

/// Size implied by a fee, the inverse of [`minimum_fee`].
///
/// Only used to cross-check a suggested fee.
pub fn size_from_fee(fee: u64, params: &ProtocolParameters) -> Option<u64> {
    if params.min_fee_coefficient == 0 {
        return None;
    }
    fee.checked_sub(params.min_fee_constant)
        .map(|variable| variable / params.min_fee_coefficient)
}

/// Explicit TTL wins, otherwise the tip plus a relative offset
pub fn ttl(current_slot: u64, explicit: Option<u64>, relative: Option<u64>) -> Result<u64> {
    match (explicit, relative) {
        (Some(ttl), _) => Ok(ttl),
        (None, Some(offset)) => current_slot
            .checked_add(offset)
            .ok_or_else(|| ConstructionError::CantCreateUnsignedTransaction("ttl overflow".to_string())),
        (None, None) => Err(ConstructionError::TtlMissing),
    }
}

/// Adjust a size measured with `old_ttl` for a body carrying `new_ttl`
pub fn update_tx_size(size: u64, old_ttl: u64, new_ttl: u64) -> u64 {
    (size + cbor_uint_len(new_ttl) as u64).saturating_sub(cbor_uint_len(old_ttl) as u64)
}

/// Running lovelace totals of an operation list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeBalance {
    /// Sum of input amounts, negative as sent by the client
    pub inputs: i128,
    pub outputs: i128,
    /// Sum of withdrawal amounts, negative as sent by the client
    pub withdrawals: i128,
    pub key_refunds: i128,
    pub key_deposits: i128,
    pub pool_deposits: i128,
}

fn overflow(what: &str) -> ConstructionError {
    ConstructionError::CantCreateUnsignedTransaction(format!("{} overflow", what))
}

/// Add one operation's lovelace to a running total
pub fn accumulate(total: i128, amount: i128) -> Result<i128> {
    total.checked_add(amount).ok_or_else(|| overflow("lovelace total"))
}

impl FeeBalance {
    /// Whatever the operations leave unassigned goes to the fee
    pub fn implicit_fee(&self) -> Result<u64> {
        let fee = self
            .inputs
            .checked_neg()
            .and_then(|credit| credit.checked_sub(self.withdrawals))
            .and_then(|credit| credit.checked_add(self.key_refunds))
            .and_then(|credit| credit.checked_sub(self.outputs))
            .and_then(|credit| credit.checked_sub(self.key_deposits))
            .and_then(|credit| credit.checked_sub(self.pool_deposits))
            .ok_or_else(|| overflow("fee"))?;
        if fee < 0 {
            return Err(ConstructionError::OutputsBiggerThanInputs);
        }
        u64::try_from(fee).map_err(|_| overflow("fee"))
    }
}
