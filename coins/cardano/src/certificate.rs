//! Operation <-> certificate translation
//!
//! Covers the certificate-bearing operation types plus the two other body
//! components with per-operation validation: withdrawals and CIP-36 vote
//! registrations (carried as auxiliary data).

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::address::{CardanoAddress, Credential, KeyHash, ShelleyPayload, ED25519_KEY_LENGTH};
use crate::cbor::{
    self, AuxiliaryData, Certificate, Hash32, Metadatum, PoolMetadataRef, PoolParams, PoolRelay,
    UnitInterval,
};
use crate::config::NetworkConfig;
use crate::error::{ConstructionError, Result};
use crate::types::{
    Amount, CurveType, DepositParameters, Operation, OperationDetails, OperationMetadata,
    OperationType, PoolMargin, PoolMetadata, PoolRegistrationParams, PublicKey, Relay,
    VoteRegistrationMetadata,
};

/// CIP-36 metadata labels
pub const VOTE_DATA_LABEL: u64 = 61284;
pub const VOTE_SIGNATURE_LABEL: u64 = 61285;

const VOTING_KEY_INDEX: i128 = 1;
const STAKE_KEY_INDEX: i128 = 2;
const REWARD_ADDRESS_INDEX: i128 = 3;
const VOTING_NONCE_INDEX: i128 = 4;
const SIGNATURE_INDEX: i128 = 1;

const SIGNATURE_LENGTH: usize = 64;
const POOL_METADATA_URL_MAX: usize = 64;
const DNS_NAME_MAX: usize = 64;

pub const RELAY_SINGLE_HOST_ADDR: &str = "single_host_addr";
pub const RELAY_SINGLE_HOST_NAME: &str = "single_host_name";
pub const RELAY_MULTI_HOST_NAME: &str = "multi_host_name";

// ============================================================================
// Keys and hashes
// ============================================================================

fn ed25519_key(key: &PublicKey) -> Option<Vec<u8>> {
    if key.curve_type != CurveType::Ed25519 {
        return None;
    }
    hex::decode(&key.hex_bytes)
        .ok()
        .filter(|bytes| bytes.len() == ED25519_KEY_LENGTH)
}

/// Key hash of a staking credential public key
pub fn staking_key_hash(credential: &PublicKey) -> Result<KeyHash> {
    let key = ed25519_key(credential)
        .ok_or_else(|| ConstructionError::InvalidStakingKeyFormat(credential.hex_bytes.clone()))?;
    Ok(CardanoAddress::hash_key(&key))
}

/// Reward address controlled by a staking credential
pub fn reward_address(credential: &PublicKey, network: &NetworkConfig) -> Result<CardanoAddress> {
    Ok(reward_address_for_hash(
        Credential::KeyHash(staking_key_hash(credential)?),
        network,
    ))
}

pub fn reward_address_for_hash(stake: Credential, network: &NetworkConfig) -> CardanoAddress {
    CardanoAddress::shelley(network.network_id, ShelleyPayload::Reward { stake })
}

/// Parse a 28 byte pool key hash from hex
pub fn pool_key_hash(hex_str: &str) -> Result<KeyHash> {
    hex::decode(hex_str)
        .ok()
        .and_then(|bytes| KeyHash::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| ConstructionError::InvalidPoolKeyHash(hex_str.to_string()))
}

/// Decode a reward address on `network`, rejecting payment addresses
pub fn reward_account(address: &str, network: &NetworkConfig) -> Result<CardanoAddress> {
    let decoded = CardanoAddress::decode_for_network(address, network)?;
    if !decoded.is_stake_address() {
        return Err(ConstructionError::InvalidAddress(format!(
            "{} is not a reward address",
            address
        )));
    }
    Ok(decoded)
}

// ============================================================================
// Build: Operation -> Certificate
// ============================================================================

/// Build the certificate for a certificate-bearing operation
pub fn certificate_from_operation(op: &Operation, network: &NetworkConfig) -> Result<Certificate> {
    match (op.operation_type, op.details()?) {
        (OperationType::StakeKeyRegistration, OperationDetails::StakeKey { staking_credential }) => {
            Ok(Certificate::StakeRegistration(Credential::KeyHash(
                staking_key_hash(staking_credential)?,
            )))
        }
        (OperationType::StakeKeyDeregistration, OperationDetails::StakeKey { staking_credential }) => {
            Ok(Certificate::StakeDeregistration(Credential::KeyHash(
                staking_key_hash(staking_credential)?,
            )))
        }
        (
            _,
            OperationDetails::Delegation {
                staking_credential,
                pool_key_hash: pool,
            },
        ) => Ok(Certificate::StakeDelegation(
            Credential::KeyHash(staking_key_hash(staking_credential)?),
            pool_key_hash(pool)?,
        )),
        (
            _,
            OperationDetails::PoolRegistration {
                pool_key_hash: pool,
                params,
            },
        ) => Ok(Certificate::PoolRegistration(Box::new(pool_params_from_rosetta(
            pool, params, network,
        )?))),
        (_, OperationDetails::PoolRegistrationWithCert { cert_hex }) => {
            Ok(Certificate::PoolRegistration(Box::new(decode_pool_registration_cert(cert_hex)?)))
        }
        (
            _,
            OperationDetails::PoolRetirement {
                pool_key_hash: pool,
                epoch,
            },
        ) => Ok(Certificate::PoolRetirement(pool_key_hash(pool)?, epoch)),
        _ => Err(ConstructionError::InvalidOperationType(format!(
            "{} does not produce a certificate",
            op.operation_type
        ))),
    }
}

/// Validate pool registration parameters field by field
pub fn pool_params_from_rosetta(
    pool_key: &str,
    params: &PoolRegistrationParams,
    network: &NetworkConfig,
) -> Result<PoolParams> {
    use ConstructionError::{InvalidPoolRegistrationParameters, MissingPoolRegistrationParameter};

    let operator = pool_key_hash(pool_key)?;

    let vrf_hex = params
        .vrf_key_hash
        .as_deref()
        .ok_or(MissingPoolRegistrationParameter("vrfKeyHash"))?;
    let vrf_key_hash: Hash32 = hex::decode(vrf_hex)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| InvalidPoolRegistrationParameters(format!("vrfKeyHash {}", vrf_hex)))?;

    let reward = params
        .reward_address
        .as_deref()
        .ok_or(MissingPoolRegistrationParameter("rewardAddress"))?;
    let reward_account = reward_account(reward, network)?.to_bytes();

    let pledge = parse_lovelace(params.pledge.as_deref(), "pledge")?;
    let cost = parse_lovelace(params.cost.as_deref(), "cost")?;

    let owners = params
        .pool_owners
        .as_ref()
        .ok_or(MissingPoolRegistrationParameter("poolOwners"))?;
    let owners = pool_owner_hashes(owners, network)?;

    let relays = params
        .relays
        .as_ref()
        .ok_or(MissingPoolRegistrationParameter("relays"))?;
    let relays = relays.iter().map(relay_from_rosetta).collect::<Result<Vec<_>>>()?;

    let margin = canonical_margin(params)?;

    let metadata = params
        .pool_metadata
        .as_ref()
        .map(pool_metadata_from_rosetta)
        .transpose()?;

    Ok(PoolParams {
        operator,
        vrf_key_hash,
        pledge,
        cost,
        margin,
        reward_account,
        owners,
        relays,
        metadata,
    })
}

fn parse_lovelace(value: Option<&str>, field: &'static str) -> Result<u64> {
    let value = value.ok_or(ConstructionError::MissingPoolRegistrationParameter(field))?;
    value.parse::<u64>().map_err(|_| {
        ConstructionError::InvalidPoolRegistrationParameters(format!("{} {}", field, value))
    })
}

fn pool_owner_hashes(owners: &[String], network: &NetworkConfig) -> Result<Vec<KeyHash>> {
    let mut hashes: Vec<KeyHash> = Vec::with_capacity(owners.len());
    for owner in owners {
        let hash = reward_account(owner, network)
            .ok()
            .and_then(|addr| match addr.stake_credential() {
                Some(Credential::KeyHash(hash)) => Some(*hash),
                _ => None,
            })
            .ok_or_else(|| ConstructionError::InvalidPoolOwners(owner.clone()))?;
        if hashes.contains(&hash) {
            return Err(ConstructionError::InvalidPoolOwners(format!("duplicate owner {}", owner)));
        }
        hashes.push(hash);
    }
    Ok(hashes)
}

fn relay_from_rosetta(relay: &Relay) -> Result<PoolRelay> {
    let invalid = |why: &str| ConstructionError::InvalidPoolRelays(why.to_string());

    let port = relay
        .port
        .as_deref()
        .map(|p| p.parse::<u16>().map_err(|_| invalid("port is not a valid number")))
        .transpose()?;
    let dns_name = || {
        relay
            .dns_name
            .clone()
            .filter(|name| !name.is_empty() && name.len() <= DNS_NAME_MAX)
            .ok_or_else(|| invalid("dnsName is missing or too long"))
    };

    match relay.relay_type.as_deref() {
        Some(RELAY_SINGLE_HOST_ADDR) => {
            let ipv4 = relay
                .ipv4
                .as_deref()
                .map(|ip| ip.parse::<Ipv4Addr>().map_err(|_| invalid("ipv4 is invalid")))
                .transpose()?;
            let ipv6 = relay
                .ipv6
                .as_deref()
                .map(|ip| ip.parse::<Ipv6Addr>().map_err(|_| invalid("ipv6 is invalid")))
                .transpose()?;
            if ipv4.is_none() && ipv6.is_none() {
                return Err(invalid("single_host_addr needs an ipv4 or ipv6 address"));
            }
            Ok(PoolRelay::SingleHostAddr {
                port,
                ipv4: ipv4.map(|ip| ip.octets()),
                ipv6: ipv6.map(|ip| ip.octets()),
            })
        }
        Some(RELAY_SINGLE_HOST_NAME) => Ok(PoolRelay::SingleHostName {
            port,
            dns_name: dns_name()?,
        }),
        Some(RELAY_MULTI_HOST_NAME) => Ok(PoolRelay::MultiHostName {
            dns_name: dns_name()?,
        }),
        Some(other) => Err(invalid(&format!("unknown relay type {}", other))),
        None => Err(invalid("relay type is missing")),
    }
}

fn pool_metadata_from_rosetta(metadata: &PoolMetadata) -> Result<PoolMetadataRef> {
    if metadata.url.is_empty() || metadata.url.len() > POOL_METADATA_URL_MAX {
        return Err(ConstructionError::InvalidPoolMetadata(format!("url {}", metadata.url)));
    }
    let hash: Hash32 = hex::decode(&metadata.hash)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ConstructionError::InvalidPoolMetadata(format!("hash {}", metadata.hash)))?;
    Ok(PoolMetadataRef {
        url: metadata.url.clone(),
        hash,
    })
}

/// Resolve the margin to one reduced rational.
///
/// `margin` wins when both forms are present. `margin_percentage` is a
/// decimal fraction such as `"0.025"`.
pub fn canonical_margin(params: &PoolRegistrationParams) -> Result<UnitInterval> {
    let invalid = |why: String| ConstructionError::InvalidPoolRegistrationParameters(why);

    let (numerator, denominator) = match (&params.margin, &params.margin_percentage) {
        (Some(margin), _) => {
            let numerator = margin
                .numerator
                .parse::<u64>()
                .map_err(|_| invalid(format!("margin numerator {}", margin.numerator)))?;
            let denominator = margin
                .denominator
                .parse::<u64>()
                .map_err(|_| invalid(format!("margin denominator {}", margin.denominator)))?;
            (numerator, denominator)
        }
        (None, Some(percentage)) => decimal_to_rational(percentage)
            .ok_or_else(|| invalid(format!("margin_percentage {}", percentage)))?,
        (None, None) => return Err(ConstructionError::MissingPoolRegistrationParameter("margin")),
    };

    if denominator == 0 || numerator > denominator {
        return Err(invalid(format!("margin {}/{}", numerator, denominator)));
    }
    let divisor = gcd(numerator, denominator);
    Ok(UnitInterval {
        numerator: numerator / divisor,
        denominator: denominator / divisor,
    })
}

fn decimal_to_rational(decimal: &str) -> Option<(u64, u64)> {
    let (whole, fraction) = decimal.split_once('.').unwrap_or((decimal, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 18 || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let denominator = 10u64.checked_pow(fraction.len() as u32)?;
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: u64 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    let numerator = whole.checked_mul(denominator)?.checked_add(fraction)?;
    Some((numerator, denominator))
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Decode the hex certificate of a poolRegistrationWithCert operation
pub fn decode_pool_registration_cert(cert_hex: &str) -> Result<PoolParams> {
    let invalid = |why: String| ConstructionError::InvalidPoolRegistrationCert(why);
    let bytes = hex::decode(cert_hex).map_err(|e| invalid(e.to_string()))?;
    match cbor::from_slice::<Certificate>(&bytes).map_err(|e| invalid(e.to_string()))? {
        Certificate::PoolRegistration(params) => Ok(*params),
        _ => Err(invalid("not a pool registration certificate".to_string())),
    }
}

/// Reward account bytes and lovelace amount of a withdrawal operation
pub fn withdrawal_from_operation(op: &Operation, network: &NetworkConfig) -> Result<(CardanoAddress, u64)> {
    let staking_credential = match op.details()? {
        OperationDetails::StakeKey { staking_credential } => staking_credential,
        _ => {
            return Err(ConstructionError::InvalidOperationType(
                op.operation_type.to_string(),
            ))
        }
    };
    let address = reward_address(staking_credential, network)?;

    let amount = op
        .amount
        .as_ref()
        .or_else(|| op.metadata.as_ref().and_then(|m| m.withdrawal_amount.as_ref()))
        .and_then(Amount::parse_value)
        .ok_or_else(|| {
            ConstructionError::TransactionInputsParametersMissing(format!(
                "withdrawal {} has no amount",
                op.operation_identifier.index
            ))
        })?;
    let amount = u64::try_from(amount.unsigned_abs()).map_err(|_| {
        ConstructionError::TransactionInputsParametersMissing("withdrawal amount too large".into())
    })?;
    Ok((address, amount))
}

// ============================================================================
// CIP-36 vote registration
// ============================================================================

/// Validate vote registration metadata and build the auxiliary data
pub fn vote_registration_aux_data(
    meta: &VoteRegistrationMetadata,
    network: &NetworkConfig,
) -> Result<AuxiliaryData> {
    let voting_key = meta.voting_key.as_ref().ok_or(ConstructionError::MissingVotingKey)?;
    let voting_key = ed25519_key(voting_key).ok_or(ConstructionError::InvalidVotingKeyFormat)?;

    let stake_key = meta.stake_key.as_ref().ok_or(ConstructionError::MissingStakingKey)?;
    let stake_key = ed25519_key(stake_key)
        .ok_or_else(|| ConstructionError::InvalidStakingKeyFormat(stake_key.hex_bytes.clone()))?;

    let reward = meta
        .reward_address
        .as_deref()
        .ok_or_else(|| ConstructionError::InvalidAddress("missing reward address".to_string()))?;
    let reward = reward_account(reward, network)?.to_bytes();

    let nonce = meta
        .voting_nonce
        .filter(|nonce| *nonce > 0)
        .ok_or(ConstructionError::VotingNonceNotValid)?;

    let signature = meta
        .voting_signature
        .as_deref()
        .and_then(|sig| hex::decode(sig).ok())
        .filter(|sig| sig.len() == SIGNATURE_LENGTH)
        .ok_or(ConstructionError::InvalidVotingSignature)?;

    let data = Metadatum::Map(vec![
        (Metadatum::Int(VOTING_KEY_INDEX), Metadatum::Bytes(voting_key)),
        (Metadatum::Int(STAKE_KEY_INDEX), Metadatum::Bytes(stake_key)),
        (Metadatum::Int(REWARD_ADDRESS_INDEX), Metadatum::Bytes(reward)),
        (Metadatum::Int(VOTING_NONCE_INDEX), Metadatum::Int(nonce as i128)),
    ]);
    let sig = Metadatum::Map(vec![(Metadatum::Int(SIGNATURE_INDEX), Metadatum::Bytes(signature))]);

    Ok(AuxiliaryData {
        metadata: vec![(VOTE_DATA_LABEL, data), (VOTE_SIGNATURE_LABEL, sig)],
    })
}

/// Recover vote registration metadata from auxiliary data
pub fn vote_registration_from_aux(
    aux: &AuxiliaryData,
    network: &NetworkConfig,
) -> Result<VoteRegistrationMetadata> {
    let data = aux
        .label(VOTE_DATA_LABEL)
        .ok_or(ConstructionError::MissingVoteRegistrationMetadata)?;
    let sig = aux
        .label(VOTE_SIGNATURE_LABEL)
        .and_then(|m| m.get(SIGNATURE_INDEX))
        .and_then(Metadatum::as_bytes)
        .ok_or(ConstructionError::InvalidVotingSignature)?;

    let key_at = |index: i128, err: ConstructionError| {
        data.get(index)
            .and_then(Metadatum::as_bytes)
            .map(|b| PublicKey::ed25519(hex::encode(b)))
            .ok_or(err)
    };
    let voting_key = key_at(VOTING_KEY_INDEX, ConstructionError::MissingVotingKey)?;
    let stake_key = key_at(STAKE_KEY_INDEX, ConstructionError::MissingStakingKey)?;

    let reward = data
        .get(REWARD_ADDRESS_INDEX)
        .and_then(Metadatum::as_bytes)
        .ok_or_else(|| ConstructionError::InvalidAddress("missing reward address".to_string()))?;
    let reward = CardanoAddress::from_bytes(reward)?;
    if reward.network_id() != Some(network.network_id) {
        return Err(ConstructionError::InvalidNetwork(
            "vote registration reward address".to_string(),
        ));
    }

    let nonce = data
        .get(VOTING_NONCE_INDEX)
        .and_then(Metadatum::as_int)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or(ConstructionError::VotingNonceNotValid)?;

    Ok(VoteRegistrationMetadata {
        stake_key: Some(stake_key),
        voting_key: Some(voting_key),
        reward_address: Some(reward.to_address_string()?),
        voting_nonce: Some(nonce),
        voting_signature: Some(hex::encode(sig)),
    })
}

// ============================================================================
// Parse: Certificate -> Operation
// ============================================================================

/// Amount a certificate operation moves, from the payer's perspective
pub fn deposit_amount(operation_type: OperationType, deposits: &DepositParameters) -> Option<i128> {
    match operation_type {
        OperationType::StakeKeyRegistration => Some(-(deposits.key_deposit as i128)),
        OperationType::StakeKeyDeregistration => Some(deposits.key_deposit as i128),
        OperationType::PoolRegistration | OperationType::PoolRegistrationWithCert => {
            Some(-(deposits.pool_deposit as i128))
        }
        _ => None,
    }
}

/// Rosetta view of on-chain pool parameters
pub fn pool_params_to_rosetta(params: &PoolParams, network: &NetworkConfig) -> Result<PoolRegistrationParams> {
    let reward_address = CardanoAddress::from_bytes(&params.reward_account)?.to_address_string()?;
    let pool_owners = params
        .owners
        .iter()
        .map(|owner| reward_address_for_hash(Credential::KeyHash(*owner), network).to_address_string())
        .collect::<Result<Vec<_>>>()?;
    let relays = params.relays.iter().map(relay_to_rosetta).collect();

    Ok(PoolRegistrationParams {
        vrf_key_hash: Some(hex::encode(params.vrf_key_hash)),
        reward_address: Some(reward_address),
        pledge: Some(params.pledge.to_string()),
        cost: Some(params.cost.to_string()),
        pool_owners: Some(pool_owners),
        relays: Some(relays),
        margin: Some(PoolMargin {
            numerator: params.margin.numerator.to_string(),
            denominator: params.margin.denominator.to_string(),
        }),
        margin_percentage: None,
        pool_metadata: params.metadata.as_ref().map(|m| PoolMetadata {
            url: m.url.clone(),
            hash: hex::encode(m.hash),
        }),
    })
}

fn relay_to_rosetta(relay: &PoolRelay) -> Relay {
    match relay {
        PoolRelay::SingleHostAddr { port, ipv4, ipv6 } => Relay {
            relay_type: Some(RELAY_SINGLE_HOST_ADDR.to_string()),
            ipv4: ipv4.map(|ip| Ipv4Addr::from(ip).to_string()),
            ipv6: ipv6.map(|ip| Ipv6Addr::from(ip).to_string()),
            dns_name: None,
            port: port.map(|p| p.to_string()),
        },
        PoolRelay::SingleHostName { port, dns_name } => Relay {
            relay_type: Some(RELAY_SINGLE_HOST_NAME.to_string()),
            dns_name: Some(dns_name.clone()),
            port: port.map(|p| p.to_string()),
            ..Default::default()
        },
        PoolRelay::MultiHostName { dns_name } => Relay {
            relay_type: Some(RELAY_MULTI_HOST_NAME.to_string()),
            dns_name: Some(dns_name.clone()),
            ..Default::default()
        },
    }
}

/// Canonical operation for a certificate found without matching extra data
pub fn operation_from_certificate(
    certificate: &Certificate,
    index: i64,
    network: &NetworkConfig,
    deposits: &DepositParameters,
) -> Result<Operation> {
    let reward = |cred: &Credential| reward_address_for_hash(*cred, network).to_address_string();
    let with_deposit = |op: Operation| match deposit_amount(op.operation_type, deposits) {
        Some(amount) => op.with_amount(Amount::lovelace(amount)),
        None => op,
    };

    let op = match certificate {
        Certificate::StakeRegistration(cred) => with_deposit(
            Operation::new(index, OperationType::StakeKeyRegistration).with_account(reward(cred)?),
        ),
        Certificate::StakeDeregistration(cred) => with_deposit(
            Operation::new(index, OperationType::StakeKeyDeregistration).with_account(reward(cred)?),
        ),
        Certificate::StakeDelegation(cred, pool) => Operation::new(index, OperationType::StakeDelegation)
            .with_account(reward(cred)?)
            .with_metadata(OperationMetadata {
                pool_key_hash: Some(hex::encode(pool)),
                ..Default::default()
            }),
        Certificate::PoolRegistration(params) => with_deposit(
            Operation::new(index, OperationType::PoolRegistration)
                .with_account(hex::encode(params.operator))
                .with_metadata(OperationMetadata {
                    pool_registration_params: Some(pool_params_to_rosetta(params, network)?),
                    pool_registration_cert: Some(hex::encode(cbor::to_vec(certificate)?)),
                    ..Default::default()
                }),
        ),
        Certificate::PoolRetirement(pool, epoch) => Operation::new(index, OperationType::PoolRetirement)
            .with_account(hex::encode(pool))
            .with_metadata(OperationMetadata {
                epoch: Some(*epoch),
                ..Default::default()
            }),
    };
    Ok(op)
}

/// Canonical operation for a withdrawal found without matching extra data
pub fn operation_from_withdrawal(reward_account: &[u8], amount: u64, index: i64) -> Result<Operation> {
    let address = CardanoAddress::from_bytes(reward_account)?;
    Ok(Operation::new(index, OperationType::Withdrawal)
        .with_account(address.to_address_string()?)
        .with_amount(Amount::lovelace(-(amount as i128))))
}
