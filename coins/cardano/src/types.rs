//! Rosetta data model
//!
//! Field names follow the Rosetta Construction API and the Cardano
//! implementation's metadata conventions so request bodies deserialize
//! directly into these types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::{ADA_DECIMALS, ADA_SYMBOL, DEFAULT_KEY_DEPOSIT, DEFAULT_POOL_DEPOSIT};
use crate::error::{ConstructionError, Result};

pub const COIN_SPENT_ACTION: &str = "coin_spent";
pub const COIN_CREATED_ACTION: &str = "coin_created";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentifier {
    pub blockchain: String,
    pub network: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationIdentifier {
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_index: Option<i64>,
}

impl OperationIdentifier {
    pub fn new(index: i64) -> Self {
        Self {
            index,
            network_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAccountIdentifier {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentifierMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentifier {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account: Option<SubAccountIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AccountIdentifierMetadata>,
}

impl AccountIdentifier {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            sub_account: None,
            metadata: None,
        }
    }

    /// Chain code carried for Byron signers
    pub fn chain_code(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.chain_code.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyMetadata {
    #[serde(rename = "policyId")]
    pub policy_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CurrencyMetadata>,
}

impl Currency {
    /// The native ADA currency
    pub fn ada() -> Self {
        Self {
            symbol: ADA_SYMBOL.to_string(),
            decimals: ADA_DECIMALS,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub currency: Currency,
}

impl Amount {
    /// Lovelace amount in ADA
    pub fn lovelace(value: i128) -> Self {
        Self {
            value: value.to_string(),
            currency: Currency::ada(),
        }
    }

    /// Parse the signed integer value
    pub fn parse_value(&self) -> Option<i128> {
        self.value.parse::<i128>().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinIdentifier {
    /// `<tx hash>:<output index>`
    pub identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinAction {
    CoinSpent,
    CoinCreated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinChange {
    pub coin_identifier: CoinIdentifier,
    pub coin_action: CoinAction,
}

/// Curve of a public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    #[serde(rename = "edwards25519")]
    Ed25519,
    #[serde(rename = "secp256k1")]
    Secp256k1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureType {
    Ed25519,
    Ecdsa,
    EcdsaRecovery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub hex_bytes: String,
    pub curve_type: CurveType,
}

impl PublicKey {
    pub fn ed25519(hex_bytes: impl Into<String>) -> Self {
        Self {
            hex_bytes: hex_bytes.into(),
            curve_type: CurveType::Ed25519,
        }
    }
}

/// Closed set of operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationType {
    Input,
    Output,
    StakeKeyRegistration,
    StakeKeyDeregistration,
    StakeDelegation,
    Withdrawal,
    PoolRegistration,
    PoolRegistrationWithCert,
    PoolRetirement,
    VoteRegistration,
}

impl OperationType {
    pub const ALL: [OperationType; 10] = [
        OperationType::Input,
        OperationType::Output,
        OperationType::StakeKeyRegistration,
        OperationType::StakeKeyDeregistration,
        OperationType::StakeDelegation,
        OperationType::Withdrawal,
        OperationType::PoolRegistration,
        OperationType::PoolRegistrationWithCert,
        OperationType::PoolRetirement,
        OperationType::VoteRegistration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Input => "input",
            OperationType::Output => "output",
            OperationType::StakeKeyRegistration => "stakeKeyRegistration",
            OperationType::StakeKeyDeregistration => "stakeKeyDeregistration",
            OperationType::StakeDelegation => "stakeDelegation",
            OperationType::Withdrawal => "withdrawal",
            OperationType::PoolRegistration => "poolRegistration",
            OperationType::PoolRegistrationWithCert => "poolRegistrationWithCert",
            OperationType::PoolRetirement => "poolRetirement",
            OperationType::VoteRegistration => "voteRegistration",
        }
    }

    /// Operations signed by a stake credential
    pub fn is_staking(&self) -> bool {
        matches!(
            self,
            OperationType::StakeKeyRegistration
                | OperationType::StakeKeyDeregistration
                | OperationType::StakeDelegation
                | OperationType::Withdrawal
        )
    }

    /// Operations signed by a pool operator
    pub fn is_pool(&self) -> bool {
        matches!(
            self,
            OperationType::PoolRegistration
                | OperationType::PoolRegistrationWithCert
                | OperationType::PoolRetirement
        )
    }

    /// Operations that become a certificate in the body
    pub fn is_certificate(&self) -> bool {
        (self.is_staking() && *self != OperationType::Withdrawal) || self.is_pool()
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = ConstructionError;

    fn from_str(s: &str) -> Result<Self> {
        OperationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConstructionError::InvalidOperationType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundleItem {
    #[serde(rename = "policyId")]
    pub policy_id: String,
    /// Each token's currency symbol is the hex asset name
    pub tokens: Vec<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMargin {
    pub numerator: String,
    pub denominator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetadata {
    pub url: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub relay_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    #[serde(rename = "dnsName", default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistrationParams {
    #[serde(rename = "vrfKeyHash", default, skip_serializing_if = "Option::is_none")]
    pub vrf_key_hash: Option<String>,
    #[serde(rename = "rewardAddress", default, skip_serializing_if = "Option::is_none")]
    pub reward_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pledge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(rename = "poolOwners", default, skip_serializing_if = "Option::is_none")]
    pub pool_owners: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relays: Option<Vec<Relay>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<PoolMargin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_percentage: Option<String>,
    #[serde(rename = "poolMetadata", default, skip_serializing_if = "Option::is_none")]
    pub pool_metadata: Option<PoolMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRegistrationMetadata {
    #[serde(rename = "stakeKey", default, skip_serializing_if = "Option::is_none")]
    pub stake_key: Option<PublicKey>,
    #[serde(rename = "votingKey", default, skip_serializing_if = "Option::is_none")]
    pub voting_key: Option<PublicKey>,
    #[serde(rename = "rewardAddress", default, skip_serializing_if = "Option::is_none")]
    pub reward_address: Option<String>,
    #[serde(rename = "votingNonce", default, skip_serializing_if = "Option::is_none")]
    pub voting_nonce: Option<u64>,
    #[serde(rename = "votingSignature", default, skip_serializing_if = "Option::is_none")]
    pub voting_signature: Option<String>,
}

/// Operation metadata as it travels over the wire.
///
/// Use [`Operation::details`] to get the typed view of the fields a given
/// operation type actually consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMetadata {
    #[serde(rename = "withdrawalAmount", default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_amount: Option<Amount>,
    #[serde(rename = "depositAmount", default, skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<Amount>,
    #[serde(rename = "refundAmount", default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staking_credential: Option<PublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_key_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    #[serde(rename = "tokenBundle", default, skip_serializing_if = "Option::is_none")]
    pub token_bundle: Option<Vec<TokenBundleItem>>,
    #[serde(rename = "poolRegistrationCert", default, skip_serializing_if = "Option::is_none")]
    pub pool_registration_cert: Option<String>,
    #[serde(rename = "poolRegistrationParams", default, skip_serializing_if = "Option::is_none")]
    pub pool_registration_params: Option<PoolRegistrationParams>,
    #[serde(rename = "voteRegistrationMetadata", default, skip_serializing_if = "Option::is_none")]
    pub vote_registration_metadata: Option<VoteRegistrationMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_identifier: OperationIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_operations: Option<Vec<OperationIdentifier>>,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_change: Option<CoinChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OperationMetadata>,
}

/// Typed view of the metadata one operation type consumes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationDetails<'a> {
    /// Input or output, optionally carrying native tokens
    Transfer {
        token_bundle: Option<&'a [TokenBundleItem]>,
    },
    /// Registration, deregistration or withdrawal
    StakeKey { staking_credential: &'a PublicKey },
    Delegation {
        staking_credential: &'a PublicKey,
        pool_key_hash: &'a str,
    },
    PoolRegistration {
        pool_key_hash: &'a str,
        params: &'a PoolRegistrationParams,
    },
    PoolRegistrationWithCert { cert_hex: &'a str },
    PoolRetirement { pool_key_hash: &'a str, epoch: u64 },
    VoteRegistration(&'a VoteRegistrationMetadata),
}

impl Operation {
    /// Bare operation with only an index and a type
    pub fn new(index: i64, operation_type: OperationType) -> Self {
        Self {
            operation_identifier: OperationIdentifier::new(index),
            related_operations: None,
            operation_type,
            status: None,
            account: None,
            amount: None,
            coin_change: None,
            metadata: None,
        }
    }

    pub fn with_account(mut self, address: impl Into<String>) -> Self {
        self.account = Some(AccountIdentifier::new(address));
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_coin_change(mut self, identifier: impl Into<String>, action: CoinAction) -> Self {
        self.coin_change = Some(CoinChange {
            coin_identifier: CoinIdentifier {
                identifier: identifier.into(),
            },
            coin_action: action,
        });
        self
    }

    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn address(&self) -> Option<&str> {
        self.account.as_ref().map(|a| a.address.as_str())
    }

    /// Checks that the metadata this type needs is present and returns it typed
    pub fn details(&self) -> Result<OperationDetails<'_>> {
        let metadata = self.metadata.as_ref();
        let staking_credential = || {
            metadata
                .and_then(|m| m.staking_credential.as_ref())
                .ok_or(ConstructionError::MissingStakingKey)
        };
        match self.operation_type {
            OperationType::Input | OperationType::Output => Ok(OperationDetails::Transfer {
                token_bundle: metadata.and_then(|m| m.token_bundle.as_deref()),
            }),
            OperationType::StakeKeyRegistration
            | OperationType::StakeKeyDeregistration
            | OperationType::Withdrawal => Ok(OperationDetails::StakeKey {
                staking_credential: staking_credential()?,
            }),
            OperationType::StakeDelegation => {
                let staking_credential = staking_credential()?;
                let pool_key_hash = metadata
                    .and_then(|m| m.pool_key_hash.as_deref())
                    .ok_or(ConstructionError::MissingPoolKey)?;
                Ok(OperationDetails::Delegation {
                    staking_credential,
                    pool_key_hash,
                })
            }
            OperationType::PoolRegistration => {
                let pool_key_hash = self.address().ok_or(ConstructionError::MissingPoolKey)?;
                let params = metadata
                    .and_then(|m| m.pool_registration_params.as_ref())
                    .ok_or(ConstructionError::MissingPoolRegistrationParameters)?;
                Ok(OperationDetails::PoolRegistration {
                    pool_key_hash,
                    params,
                })
            }
            OperationType::PoolRegistrationWithCert => {
                let cert_hex = metadata
                    .and_then(|m| m.pool_registration_cert.as_deref())
                    .ok_or(ConstructionError::MissingPoolCert)?;
                Ok(OperationDetails::PoolRegistrationWithCert { cert_hex })
            }
            OperationType::PoolRetirement => {
                let pool_key_hash = self.address().ok_or(ConstructionError::MissingPoolKey)?;
                let epoch = metadata
                    .and_then(|m| m.epoch)
                    .ok_or(ConstructionError::MissingPoolRetirementEpoch)?;
                Ok(OperationDetails::PoolRetirement {
                    pool_key_hash,
                    epoch,
                })
            }
            OperationType::VoteRegistration => metadata
                .and_then(|m| m.vote_registration_metadata.as_ref())
                .map(OperationDetails::VoteRegistration)
                .ok_or(ConstructionError::MissingVoteRegistrationMetadata),
        }
    }
}

/// Deposits charged for stake key and pool registrations, in lovelace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositParameters {
    #[serde(rename = "keyDeposit", with = "lovelace_string")]
    pub key_deposit: u64,
    #[serde(rename = "poolDeposit", with = "lovelace_string")]
    pub pool_deposit: u64,
}

impl Default for DepositParameters {
    fn default() -> Self {
        Self {
            key_deposit: DEFAULT_KEY_DEPOSIT,
            pool_deposit: DEFAULT_POOL_DEPOSIT,
        }
    }
}

/// Protocol parameter snapshot read from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParameters {
    pub min_fee_coefficient: u64,
    pub min_fee_constant: u64,
    pub max_tx_size: u64,
    pub max_val_size: u64,
    pub key_deposit: u64,
    pub pool_deposit: u64,
    pub coins_per_utxo_byte: u64,
    pub min_pool_cost: u64,
    pub max_collateral_inputs: u64,
}

impl ProtocolParameters {
    pub fn deposit_parameters(&self) -> DepositParameters {
        DepositParameters {
            key_deposit: self.key_deposit,
            pool_deposit: self.pool_deposit,
        }
    }
}

/// Unspent output as reported by the ledger collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: String,
    pub output_index: u32,
    pub address: String,
    pub lovelace: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<TokenBundleItem>,
}

impl Utxo {
    /// The Rosetta coin identifier of this output
    pub fn coin_identifier(&self) -> String {
        format!("{}:{}", self.tx_hash, self.output_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_identifier: Option<AccountIdentifier>,
    pub hex_bytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<SignatureType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signing_payload: SigningPayload,
    pub public_key: PublicKey,
    pub signature_type: SignatureType,
    pub hex_bytes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

mod lovelace_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
