//! Operation list <-> transaction body
//!
//! [`process_operations`] validates an intent and collects everything the
//! body needs into a [`ProcessOperationsResult`]. [`operations_from_body`]
//! goes the other way, preferring the operations saved in the extra data
//! whenever they still describe the body they travel with.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::address::{CardanoAddress, KeyHash, KEY_HASH_LENGTH};
use crate::cbor::{
    self, blake2b_256, AssetName, AuxiliaryData, Certificate, Coin, MultiAsset, TransactionBody,
    TransactionInput, TransactionOutput, Value,
};
use crate::certificate::{
    certificate_from_operation, operation_from_certificate, operation_from_withdrawal,
    vote_registration_aux_data, vote_registration_from_aux, withdrawal_from_operation,
    VOTE_DATA_LABEL,
};
use crate::config::NetworkConfig;
use crate::error::{ConstructionError, Result};
use crate::extra_data::TransactionExtraData;
use crate::fee::{accumulate, FeeBalance};
use crate::types::{
    AccountIdentifier, Amount, CoinAction, Currency, DepositParameters, Operation,
    OperationDetails, OperationIdentifier, OperationMetadata, OperationType, TokenBundleItem,
};
use crate::witness::required_signers;

const ASSET_NAME_MAX_LENGTH: usize = 32;
const TRANSACTION_ID_LENGTH: usize = 32;

/// Everything an operation list contributes to a transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOperationsResult {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<(Vec<u8>, Coin)>,
    pub auxiliary_data: Option<AuxiliaryData>,
    pub required_signers: Vec<AccountIdentifier>,
    pub balance: FeeBalance,
}

/// A body ready to be signed, with the extra data that travels beside it
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    pub body: TransactionBody,
    pub body_bytes: Vec<u8>,
    pub body_hash_hex: String,
    pub auxiliary_data: Option<Vec<u8>>,
    pub extra: TransactionExtraData,
}

impl UnsignedTransaction {
    pub fn bytes_hex(&self) -> String {
        hex::encode(&self.body_bytes)
    }

    /// The envelope handed to the client
    pub fn to_envelope(&self) -> Result<String> {
        crate::extra_data::encode(&self.body_bytes, &self.extra)
    }
}

impl ProcessOperationsResult {
    /// Implicit fee left over by the operations
    pub fn fee(&self) -> Result<u64> {
        self.balance.implicit_fee()
    }

    /// Assemble the body with the given fee and ttl
    pub fn body(&self, fee: u64, ttl: u64) -> Result<TransactionBody> {
        let auxiliary_data_hash = match &self.auxiliary_data {
            Some(aux) => Some(blake2b_256(&cbor::to_vec(aux)?)),
            None => None,
        };
        Ok(TransactionBody {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            fee,
            ttl: Some(ttl),
            certificates: self.certificates.clone(),
            withdrawals: self.withdrawals.clone(),
            auxiliary_data_hash,
        })
    }

    /// Build the unsigned transaction for `operations`, which must be the
    /// list this result was processed from
    pub fn build_unsigned(&self, operations: &[Operation], fee: u64, ttl: u64) -> Result<UnsignedTransaction> {
        let body = self.body(fee, ttl)?;
        let body_bytes = cbor::to_vec(&body)
            .map_err(|e| ConstructionError::CantCreateUnsignedTransaction(e.to_string()))?;
        let auxiliary_data = self.auxiliary_data.as_ref().map(cbor::to_vec).transpose()?;
        let extra = TransactionExtraData::new(
            operations.to_vec(),
            auxiliary_data.as_ref().map(hex::encode),
        );
        Ok(UnsignedTransaction {
            body_hash_hex: hex::encode(blake2b_256(&body_bytes)),
            body,
            body_bytes,
            auxiliary_data,
            extra,
        })
    }
}

// ============================================================================
// Operations -> body
// ============================================================================

/// Validate an operation list and collect the body components
pub fn process_operations(
    operations: &[Operation],
    network: &NetworkConfig,
    deposits: &DepositParameters,
) -> Result<ProcessOperationsResult> {
    check_unique_indices(operations)?;

    let mut result = ProcessOperationsResult::default();
    for op in operations {
        match op.operation_type {
            OperationType::Input => {
                let (input, amount) = input_from_operation(op, network)?;
                result.inputs.push(input);
                result.balance.inputs = accumulate(result.balance.inputs, amount)?;
            }
            OperationType::Output => {
                let (output, amount) = output_from_operation(op, network)?;
                result.outputs.push(output);
                result.balance.outputs = accumulate(result.balance.outputs, amount)?;
            }
            OperationType::Withdrawal => {
                let (address, amount) = withdrawal_from_operation(op, network)?;
                result.withdrawals.push((address.to_bytes(), amount));
                result.balance.withdrawals = accumulate(result.balance.withdrawals, -i128::from(amount))?;
            }
            OperationType::VoteRegistration => {
                if result.auxiliary_data.is_some() {
                    return Err(ConstructionError::InvalidOperationType(
                        "only one voteRegistration per transaction".to_string(),
                    ));
                }
                let meta = match op.details()? {
                    OperationDetails::VoteRegistration(meta) => meta,
                    _ => return Err(ConstructionError::MissingVoteRegistrationMetadata),
                };
                result.auxiliary_data = Some(vote_registration_aux_data(meta, network)?);
            }
            OperationType::StakeKeyRegistration => {
                result.certificates.push(certificate_from_operation(op, network)?);
                result.balance.key_deposits =
                    accumulate(result.balance.key_deposits, i128::from(deposits.key_deposit))?;
            }
            OperationType::StakeKeyDeregistration => {
                result.certificates.push(certificate_from_operation(op, network)?);
                result.balance.key_refunds =
                    accumulate(result.balance.key_refunds, i128::from(deposits.key_deposit))?;
            }
            OperationType::PoolRegistration | OperationType::PoolRegistrationWithCert => {
                result.certificates.push(certificate_from_operation(op, network)?);
                result.balance.pool_deposits =
                    accumulate(result.balance.pool_deposits, i128::from(deposits.pool_deposit))?;
            }
            OperationType::StakeDelegation | OperationType::PoolRetirement => {
                result.certificates.push(certificate_from_operation(op, network)?);
            }
        }
    }
    result.required_signers = required_signers(operations, network)?;

    debug!(
        inputs = result.inputs.len(),
        outputs = result.outputs.len(),
        certificates = result.certificates.len(),
        withdrawals = result.withdrawals.len(),
        "processed operations"
    );
    Ok(result)
}

fn check_unique_indices(operations: &[Operation]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for op in operations {
        if !seen.insert(op.operation_identifier.index) {
            return Err(ConstructionError::CantCreateUnsignedTransaction(format!(
                "duplicate operation index {}",
                op.operation_identifier.index
            )));
        }
    }
    Ok(())
}

fn amount_value(op: &Operation) -> Option<i128> {
    op.amount.as_ref().and_then(Amount::parse_value)
}

/// Parse a `<tx hash>:<index>` coin identifier
pub fn parse_coin_identifier(identifier: &str) -> Result<TransactionInput> {
    let invalid = || {
        ConstructionError::TransactionInputsParametersMissing(format!(
            "invalid coin identifier {}",
            identifier
        ))
    };
    let (hash, index) = identifier.split_once(':').ok_or_else(invalid)?;
    let transaction_id: [u8; TRANSACTION_ID_LENGTH] = hex::decode(hash)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(invalid)?;
    let index = index.parse::<u64>().map_err(|_| invalid())?;
    Ok(TransactionInput {
        transaction_id,
        index,
    })
}

fn input_from_operation(op: &Operation, network: &NetworkConfig) -> Result<(TransactionInput, i128)> {
    let missing = |why: &str| {
        ConstructionError::TransactionInputsParametersMissing(format!(
            "input {}: {}",
            op.operation_identifier.index, why
        ))
    };
    let address = op.address().ok_or_else(|| missing("account is required"))?;
    CardanoAddress::decode_for_network(address, network)?;
    let coin_change = op.coin_change.as_ref().ok_or_else(|| missing("coin change is required"))?;
    let input = parse_coin_identifier(&coin_change.coin_identifier.identifier)?;
    let amount = amount_value(op).ok_or_else(|| missing("amount is required"))?;
    if amount > 0 {
        return Err(missing("input has positive value"));
    }
    // Spent value must fit a lovelace coin
    if amount < -i128::from(u64::MAX) {
        return Err(missing("input value exceeds the lovelace range"));
    }
    Ok((input, amount))
}

fn output_from_operation(op: &Operation, network: &NetworkConfig) -> Result<(TransactionOutput, i128)> {
    let missing = |why: &str| {
        ConstructionError::TransactionOutputsParametersMissing(format!(
            "output {}: {}",
            op.operation_identifier.index, why
        ))
    };
    let address = op.address().ok_or_else(|| missing("address is required"))?;
    let address = CardanoAddress::decode_for_network(address, network)?;
    let amount = amount_value(op).ok_or_else(|| missing("amount is required"))?;
    let coin = u64::try_from(amount).map_err(|_| missing("output has negative value"))?;

    let assets = match op.details()? {
        OperationDetails::Transfer {
            token_bundle: Some(bundle),
        } => multi_asset_from_bundle(bundle)?,
        _ => MultiAsset::new(),
    };

    Ok((
        TransactionOutput {
            address: address.to_bytes(),
            amount: Value { coin, assets },
        },
        amount,
    ))
}

/// Policy ids are 28 byte hashes
pub fn validate_policy_id(policy_id: &str) -> Result<KeyHash> {
    hex::decode(policy_id)
        .ok()
        .filter(|bytes| bytes.len() == KEY_HASH_LENGTH)
        .and_then(|bytes| KeyHash::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| ConstructionError::InvalidPolicyId(policy_id.to_string()))
}

/// Asset names are up to 32 bytes of hex, empty allowed
pub fn validate_token_name(name: &str) -> Result<AssetName> {
    hex::decode(name)
        .ok()
        .filter(|bytes| bytes.len() <= ASSET_NAME_MAX_LENGTH)
        .map(AssetName)
        .ok_or_else(|| ConstructionError::InvalidTokenName(name.to_string()))
}

fn multi_asset_from_bundle(bundle: &[TokenBundleItem]) -> Result<MultiAsset> {
    let mut assets = MultiAsset::new();
    for item in bundle {
        let policy = validate_policy_id(&item.policy_id)?;
        if item.tokens.is_empty() {
            return Err(ConstructionError::TokenBundleAssetsMissing);
        }
        let tokens: &mut BTreeMap<AssetName, u64> = assets.entry(policy).or_default();
        for token in &item.tokens {
            let name = validate_token_name(&token.currency.symbol)?;
            if token.value.is_empty() {
                return Err(ConstructionError::TokenAssetValueMissing);
            }
            let quantity = token
                .value
                .parse::<u64>()
                .ok()
                .filter(|q| *q > 0)
                .ok_or_else(|| {
                    ConstructionError::TransactionOutputsParametersMissing(format!(
                        "token {} has a non positive value {}",
                        token.currency.symbol, token.value
                    ))
                })?;
            if tokens.insert(name, quantity).is_some() {
                return Err(ConstructionError::TransactionOutputsParametersMissing(format!(
                    "token {} repeated in policy {}",
                    token.currency.symbol, item.policy_id
                )));
            }
        }
    }
    Ok(assets)
}

// ============================================================================
// Body -> operations
// ============================================================================

/// Rebuild the operation list of a body.
///
/// Stored operations are matched against body components by position within
/// their kind and kept verbatim when they rebuild the exact component. A
/// component without a matching stored operation gets a canonical one.
/// Outputs are always rebuilt from the body and take the lowest indices not
/// used by stored operations, so an intent numbered `0..n` parses back to the
/// same numbering.
pub fn operations_from_body(
    body: &TransactionBody,
    extra: &[Operation],
    auxiliary_data: Option<&AuxiliaryData>,
    network: &NetworkConfig,
    deposits: &DepositParameters,
) -> Result<Vec<Operation>> {
    let mut kept: Vec<Operation> = Vec::new();
    let mut rebuilt: Vec<Operation> = Vec::new();

    let mut stored_inputs = stored(extra, |op| op.operation_type == OperationType::Input);
    for input in &body.inputs {
        match stored_inputs.next() {
            Some(op) if matches!(input_from_operation(op, network), Ok((i, _)) if i == *input) => {
                kept.push(op.clone())
            }
            _ => rebuilt.push(
                Operation::new(0, OperationType::Input).with_coin_change(
                    format!("{}:{}", hex::encode(input.transaction_id), input.index),
                    CoinAction::CoinSpent,
                ),
            ),
        }
    }
    let input_ids: Vec<OperationIdentifier> = kept
        .iter()
        .filter(|op| op.operation_type == OperationType::Input)
        .map(|op| op.operation_identifier)
        .collect();

    let mut outputs = body
        .outputs
        .iter()
        .map(output_to_operation)
        .collect::<Result<Vec<_>>>()?;

    let mut stored_certificates = stored(extra, |op| op.operation_type.is_certificate());
    for (position, certificate) in body.certificates.iter().enumerate() {
        match stored_certificates.next() {
            Some(op) if certificate_from_operation(op, network).ok().as_ref() == Some(certificate) => {
                kept.push(op.clone())
            }
            _ => {
                debug!(position, "certificate without matching operation");
                rebuilt.push(operation_from_certificate(certificate, 0, network, deposits)?)
            }
        }
    }

    let mut stored_withdrawals = stored(extra, |op| op.operation_type == OperationType::Withdrawal);
    for (account, amount) in &body.withdrawals {
        let matching = stored_withdrawals.next().filter(|op| {
            matches!(
                withdrawal_from_operation(op, network),
                Ok((address, value)) if address.to_bytes() == *account && value == *amount
            )
        });
        match matching {
            Some(op) => kept.push(op.clone()),
            None => rebuilt.push(operation_from_withdrawal(account, *amount, 0)?),
        }
    }

    if let Some(aux) = auxiliary_data.filter(|aux| aux.label(VOTE_DATA_LABEL).is_some()) {
        let matching = stored(extra, |op| op.operation_type == OperationType::VoteRegistration)
            .find(|op| match op.details() {
                Ok(OperationDetails::VoteRegistration(meta)) => {
                    vote_registration_aux_data(meta, network).ok().as_ref() == Some(aux)
                }
                _ => false,
            });
        match matching {
            Some(op) => kept.push(op.clone()),
            None => rebuilt.push(
                Operation::new(0, OperationType::VoteRegistration).with_metadata(OperationMetadata {
                    vote_registration_metadata: Some(vote_registration_from_aux(aux, network)?),
                    ..Default::default()
                }),
            ),
        }
    }

    // Number outputs and rebuilt operations with the free indices, in body order
    let used: BTreeSet<i64> = kept.iter().map(|op| op.operation_identifier.index).collect();
    let mut free = (0i64..).filter(|i| !used.contains(i));
    let related = (!input_ids.is_empty()).then(|| input_ids.clone());
    for op in outputs.iter_mut() {
        op.operation_identifier = OperationIdentifier::new(free.next().unwrap_or_default());
        op.related_operations = related.clone();
    }
    for op in rebuilt.iter_mut() {
        op.operation_identifier = OperationIdentifier::new(free.next().unwrap_or_default());
    }

    let mut operations: Vec<Operation> = kept.into_iter().chain(outputs).chain(rebuilt).collect();
    operations.sort_by_key(|op| op.operation_identifier.index);
    Ok(operations)
}

fn stored<'a>(extra: &'a [Operation], pred: fn(&Operation) -> bool) -> impl Iterator<Item = &'a Operation> + 'a {
    extra.iter().filter(move |op| pred(op))
}

fn output_to_operation(output: &TransactionOutput) -> Result<Operation> {
    let address = CardanoAddress::from_bytes(&output.address)?.to_address_string()?;
    let mut op = Operation::new(0, OperationType::Output)
        .with_account(address)
        .with_amount(Amount::lovelace(output.amount.coin as i128));
    if !output.amount.assets.is_empty() {
        op = op.with_metadata(OperationMetadata {
            token_bundle: Some(token_bundle_from_assets(&output.amount.assets)),
            ..Default::default()
        });
    }
    Ok(op)
}

/// Rosetta token bundle of a multi-asset value, in canonical order
pub fn token_bundle_from_assets(assets: &MultiAsset) -> Vec<TokenBundleItem> {
    assets
        .iter()
        .map(|(policy, tokens)| TokenBundleItem {
            policy_id: hex::encode(policy),
            tokens: tokens
                .iter()
                .map(|(name, quantity)| Amount {
                    value: quantity.to_string(),
                    currency: Currency {
                        symbol: hex::encode(&name.0),
                        decimals: 0,
                        metadata: None,
                    },
                })
                .collect(),
        })
        .collect()
}
