//! Witness set assembly and signer discovery

use ed25519_dalek::VerifyingKey;

use crate::address::{AddressEra, CardanoAddress, Credential, KeyHash, ED25519_KEY_LENGTH};
use crate::cbor::{BootstrapWitness, Certificate, PoolParams, VkeyWitness, WitnessSet};
use crate::certificate::{
    certificate_from_operation, decode_pool_registration_cert, pool_key_hash, reward_address,
    reward_address_for_hash,
};
use crate::config::NetworkConfig;
use crate::error::{ConstructionError, Result};
use crate::types::{
    AccountIdentifier, CurveType, Operation, OperationDetails, OperationType, PublicKey, Signature,
};

pub const SIGNATURE_LENGTH: usize = 64;
pub const CHAIN_CODE_LENGTH: usize = 32;

const SECP256K1_COMPRESSED_LENGTH: usize = 33;
const SECP256K1_UNCOMPRESSED_LENGTH: usize = 65;

/// One signature as handed to combine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub public_key: PublicKey,
    pub signature_hex: String,
    /// Required for Byron signers
    pub chain_code: Option<String>,
    pub address: Option<String>,
}

impl From<&Signature> for Witness {
    fn from(signature: &Signature) -> Self {
        let account = signature.signing_payload.account_identifier.as_ref();
        Witness {
            public_key: signature.public_key.clone(),
            signature_hex: signature.hex_bytes.clone(),
            chain_code: account.and_then(|a| a.chain_code()).map(str::to_string),
            address: account.map(|a| a.address.clone()),
        }
    }
}

/// Structural check of a public key for its curve
pub fn is_key_valid(hex_str: &str, curve: CurveType) -> bool {
    let bytes = match hex::decode(hex_str) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    match curve {
        CurveType::Ed25519 => <[u8; ED25519_KEY_LENGTH]>::try_from(bytes.as_slice())
            .map(|key| VerifyingKey::from_bytes(&key).is_ok())
            .unwrap_or(false),
        CurveType::Secp256k1 => matches!(
            bytes.len(),
            SECP256K1_COMPRESSED_LENGTH | SECP256K1_UNCOMPRESSED_LENGTH
        ),
    }
}

fn signer_era(address: Option<&str>) -> (AddressEra, Option<CardanoAddress>) {
    // Pool key hashes are not addresses and sign like Shelley keys
    match address.map(CardanoAddress::decode) {
        Some(Ok(decoded)) => (decoded.era(), Some(decoded)),
        _ => (AddressEra::Shelley, None),
    }
}

/// Build the witness set for the supplied signatures.
///
/// Ed25519 signers with a Shelley address (or a pool key hash) produce vkey
/// witnesses, Byron signers produce bootstrap witnesses. A key signing twice
/// is only witnessed once.
pub fn build_witness_set(witnesses: &[Witness]) -> Result<WitnessSet> {
    let mut set = WitnessSet::default();

    for witness in witnesses {
        if witness.public_key.curve_type != CurveType::Ed25519 {
            return Err(ConstructionError::CantBuildWitnessesSet(format!(
                "unsupported curve {:?}",
                witness.public_key.curve_type
            )));
        }
        if !is_key_valid(&witness.public_key.hex_bytes, CurveType::Ed25519) {
            return Err(ConstructionError::InvalidPublicKeyFormat(
                witness.public_key.hex_bytes.clone(),
            ));
        }
        let vkey: [u8; ED25519_KEY_LENGTH] = hex::decode(&witness.public_key.hex_bytes)?
            .try_into()
            .map_err(|_| ConstructionError::InvalidPublicKeyFormat(witness.public_key.hex_bytes.clone()))?;
        let signature: [u8; SIGNATURE_LENGTH] = hex::decode(&witness.signature_hex)
            .ok()
            .and_then(|sig| sig.try_into().ok())
            .ok_or_else(|| {
                ConstructionError::CantBuildWitnessesSet(format!("signature {}", witness.signature_hex))
            })?;

        match signer_era(witness.address.as_deref()) {
            (AddressEra::Byron, Some(CardanoAddress::Byron(byron))) => {
                let chain_code: [u8; CHAIN_CODE_LENGTH] = witness
                    .chain_code
                    .as_deref()
                    .and_then(|cc| hex::decode(cc).ok())
                    .and_then(|cc| cc.try_into().ok())
                    .ok_or(ConstructionError::ChainCodeMissing)?;
                if set.bootstrap_witnesses.iter().any(|w| w.vkey == vkey) {
                    continue;
                }
                set.bootstrap_witnesses.push(BootstrapWitness {
                    vkey,
                    signature,
                    chain_code,
                    attributes: byron.attributes,
                });
            }
            (AddressEra::Shelley, _) => {
                if set.vkey_witnesses.iter().any(|w| w.vkey == vkey) {
                    continue;
                }
                set.vkey_witnesses.push(VkeyWitness { vkey, signature });
            }
            (era, _) => {
                return Err(ConstructionError::CantBuildWitnessesSet(format!(
                    "no witness kind for {:?} signer",
                    era
                )))
            }
        }
    }

    Ok(set)
}

/// Witness set of the right shape with zeroed keys, used to size a transaction
/// before anything is signed
pub fn dummy_witness_set(signers: &[AccountIdentifier]) -> WitnessSet {
    let mut set = WitnessSet::default();
    for signer in signers {
        match signer_era(Some(&signer.address)) {
            (_, Some(CardanoAddress::Byron(byron))) => {
                set.bootstrap_witnesses.push(BootstrapWitness {
                    vkey: [0; ED25519_KEY_LENGTH],
                    signature: [0; SIGNATURE_LENGTH],
                    chain_code: [0; CHAIN_CODE_LENGTH],
                    attributes: byron.attributes,
                })
            }
            _ => set.vkey_witnesses.push(VkeyWitness {
                vkey: [0; ED25519_KEY_LENGTH],
                signature: [0; SIGNATURE_LENGTH],
            }),
        }
    }
    set
}

// ============================================================================
// Signers
// ============================================================================

/// Accounts whose keys must sign for one operation
pub fn signers_for_operation(op: &Operation, network: &NetworkConfig) -> Result<Vec<AccountIdentifier>> {
    let signers = match op.operation_type {
        OperationType::Input => {
            let account = op.account.clone().ok_or_else(|| {
                ConstructionError::TransactionInputsParametersMissing(format!(
                    "input {} has no account",
                    op.operation_identifier.index
                ))
            })?;
            vec![account]
        }
        // Registration needs no witness and outputs only receive
        OperationType::Output | OperationType::StakeKeyRegistration | OperationType::VoteRegistration => {
            Vec::new()
        }
        OperationType::StakeKeyDeregistration
        | OperationType::StakeDelegation
        | OperationType::Withdrawal => {
            let credential = match op.details()? {
                OperationDetails::StakeKey { staking_credential }
                | OperationDetails::Delegation {
                    staking_credential, ..
                } => staking_credential,
                _ => return Err(ConstructionError::MissingStakingKey),
            };
            vec![AccountIdentifier::new(
                reward_address(credential, network)?.to_address_string()?,
            )]
        }
        OperationType::PoolRegistration => match certificate_from_operation(op, network)? {
            Certificate::PoolRegistration(params) => to_accounts(pool_signers(&params, network)?),
            _ => Vec::new(),
        },
        OperationType::PoolRegistrationWithCert => match op.details()? {
            OperationDetails::PoolRegistrationWithCert { cert_hex } => {
                to_accounts(pool_signers(&decode_pool_registration_cert(cert_hex)?, network)?)
            }
            _ => Vec::new(),
        },
        OperationType::PoolRetirement => match op.details()? {
            OperationDetails::PoolRetirement { pool_key_hash: pool, .. } => {
                pool_key_hash(pool)?;
                vec![AccountIdentifier::new(pool.to_lowercase())]
            }
            _ => Vec::new(),
        },
    };
    Ok(signers)
}

fn to_accounts(addresses: Vec<String>) -> Vec<AccountIdentifier> {
    addresses.into_iter().map(AccountIdentifier::new).collect()
}

/// Operator key hash, reward account and owners of a pool registration
pub fn pool_signers(params: &PoolParams, network: &NetworkConfig) -> Result<Vec<String>> {
    let mut signers = vec![
        hex::encode(params.operator),
        CardanoAddress::from_bytes(&params.reward_account)?.to_address_string()?,
    ];
    for owner in &params.owners {
        signers.push(reward_address_for_hash(Credential::KeyHash(*owner), network).to_address_string()?);
    }
    Ok(unique(signers, |s| s.clone()))
}

/// Unique signers of a whole operation list, in first-seen order
pub fn required_signers(operations: &[Operation], network: &NetworkConfig) -> Result<Vec<AccountIdentifier>> {
    let mut all = Vec::new();
    for op in operations {
        all.extend(signers_for_operation(op, network)?);
    }
    Ok(unique(all, |a| a.address.clone()))
}

/// Like [`required_signers`] but skips operations whose signer cannot be
/// determined, as happens for inputs rebuilt from a foreign body
pub fn known_signers(operations: &[Operation], network: &NetworkConfig) -> Vec<AccountIdentifier> {
    let all = operations
        .iter()
        .filter_map(|op| signers_for_operation(op, network).ok())
        .flatten()
        .collect();
    unique(all, |a: &AccountIdentifier| a.address.clone())
}

fn unique<T, K: PartialEq>(items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut seen: Vec<K> = Vec::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let k = key(&item);
        if !seen.contains(&k) {
            seen.push(k);
            out.push(item);
        }
    }
    out
}

/// Key hash a signer account must present a vkey witness for
fn signer_key_hash(address: &str) -> Option<KeyHash> {
    match CardanoAddress::decode(address) {
        Ok(decoded) if decoded.is_stake_address() => decoded.stake_credential().map(|c| *c.hash()),
        Ok(decoded) => decoded.payment_credential().map(|c| *c.hash()),
        Err(_) => pool_key_hash(address).ok(),
    }
}

/// Required signers whose witness is present in `set`
pub fn recover_signers(required: &[AccountIdentifier], set: &WitnessSet) -> Vec<AccountIdentifier> {
    let witnessed: Vec<KeyHash> = set
        .vkey_witnesses
        .iter()
        .map(|w| CardanoAddress::hash_key(&w.vkey))
        .collect();

    required
        .iter()
        .filter(|signer| match signer_era(Some(&signer.address)) {
            (AddressEra::Byron, Some(CardanoAddress::Byron(byron))) => set
                .bootstrap_witnesses
                .iter()
                .any(|w| byron.is_spent_by(&w.vkey, &w.chain_code)),
            _ => signer_key_hash(&signer.address)
                .map(|hash| witnessed.contains(&hash))
                .unwrap_or(false),
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ByronAddress;
    use crate::types::{AccountIdentifierMetadata, Amount, CoinAction, OperationMetadata};
    use ed25519_dalek::{Signer, SigningKey};

    const BYRON_MAINNET: &str = "Ae2tdPwUPEZC6WJfVQxTNN2tWw4skGrN6zRVukvxJmTFy1nYkVGQBuURU3L";
    const STAKE_KEY: &str = "964774728c8306a42252adbfb07ccd6ef42399f427ade25a5933ce190c5a8760";
    const REWARD_ADDRESS: &str = "stake1uxnjdq7ma0kqsmrny460fu5azvnqtap3486jvaudacuam3g3yc4nu";

    fn signing_key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn witness(key: &SigningKey, address: Option<String>, chain_code: Option<String>) -> Witness {
        Witness {
            public_key: PublicKey::ed25519(hex::encode(key.verifying_key().as_bytes())),
            signature_hex: hex::encode(key.sign(b"body hash").to_bytes()),
            chain_code,
            address,
        }
    }

    fn enterprise(key: &SigningKey) -> String {
        CardanoAddress::enterprise(key.verifying_key().as_bytes(), 1)
            .unwrap()
            .to_address_string()
            .unwrap()
    }

    // ============================================================================
    // Key validation
    // ============================================================================

    #[test]
    fn test_is_key_valid() {
        let key = hex::encode(signing_key(1).verifying_key().as_bytes());
        assert!(is_key_valid(&key, CurveType::Ed25519));
        assert!(!is_key_valid(&key[..62], CurveType::Ed25519));
        assert!(!is_key_valid("zz", CurveType::Ed25519));
        assert!(is_key_valid(&"02".repeat(33), CurveType::Secp256k1));
        assert!(is_key_valid(&"04".repeat(65), CurveType::Secp256k1));
        assert!(!is_key_valid(&"04".repeat(32), CurveType::Secp256k1));
    }

    // ============================================================================
    // Witness set
    // ============================================================================

    #[test]
    fn test_shelley_vkey_witness() {
        let key = signing_key(1);
        let set = build_witness_set(&[witness(&key, Some(enterprise(&key)), None)]).unwrap();
        assert_eq!(set.vkey_witnesses.len(), 1);
        assert!(set.bootstrap_witnesses.is_empty());
        assert_eq!(&set.vkey_witnesses[0].vkey, key.verifying_key().as_bytes());
    }

    #[test]
    fn test_duplicate_signer_witnessed_once() {
        let key = signing_key(1);
        let w = witness(&key, Some(enterprise(&key)), None);
        let set = build_witness_set(&[w.clone(), w]).unwrap();
        assert_eq!(set.vkey_witnesses.len(), 1);
    }

    #[test]
    fn test_byron_bootstrap_witness() {
        let key = signing_key(2);
        let w = witness(&key, Some(BYRON_MAINNET.to_string()), Some("ab".repeat(32)));
        let set = build_witness_set(&[w]).unwrap();
        assert!(set.vkey_witnesses.is_empty());
        assert_eq!(set.bootstrap_witnesses.len(), 1);
        assert_eq!(set.bootstrap_witnesses[0].chain_code, [0xab; 32]);
    }

    #[test]
    fn test_byron_without_chain_code() {
        let key = signing_key(2);
        let w = witness(&key, Some(BYRON_MAINNET.to_string()), None);
        assert_eq!(build_witness_set(&[w]), Err(ConstructionError::ChainCodeMissing));
    }

    #[test]
    fn test_secp256k1_rejected() {
        let mut w = witness(&signing_key(3), None, None);
        w.public_key.curve_type = CurveType::Secp256k1;
        assert!(matches!(
            build_witness_set(&[w]),
            Err(ConstructionError::CantBuildWitnessesSet(_))
        ));
    }

    #[test]
    fn test_short_signature_rejected() {
        let mut w = witness(&signing_key(3), None, None);
        w.signature_hex.truncate(100);
        assert!(matches!(
            build_witness_set(&[w]),
            Err(ConstructionError::CantBuildWitnessesSet(_))
        ));
    }

    #[test]
    fn test_dummy_witness_shape() {
        let signers = vec![
            AccountIdentifier::new(enterprise(&signing_key(1))),
            AccountIdentifier::new(BYRON_MAINNET),
            AccountIdentifier::new("1b".repeat(28)),
        ];
        let set = dummy_witness_set(&signers);
        assert_eq!(set.vkey_witnesses.len(), 2);
        assert_eq!(set.bootstrap_witnesses.len(), 1);
    }

    // ============================================================================
    // Signers
    // ============================================================================

    fn staking_op(index: i64, operation_type: OperationType) -> Operation {
        Operation::new(index, operation_type).with_metadata(OperationMetadata {
            staking_credential: Some(PublicKey::ed25519(STAKE_KEY)),
            pool_key_hash: Some("1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5".into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_signers_for_staking_operations() {
        let network = NetworkConfig::mainnet();
        let registration = staking_op(0, OperationType::StakeKeyRegistration);
        assert!(signers_for_operation(&registration, &network).unwrap().is_empty());

        let delegation = staking_op(1, OperationType::StakeDelegation);
        let signers = signers_for_operation(&delegation, &network).unwrap();
        assert_eq!(signers, vec![AccountIdentifier::new(REWARD_ADDRESS)]);
    }

    #[test]
    fn test_input_requires_account() {
        let op = Operation::new(0, OperationType::Input);
        assert!(matches!(
            signers_for_operation(&op, &NetworkConfig::mainnet()),
            Err(ConstructionError::TransactionInputsParametersMissing(_))
        ));
    }

    #[test]
    fn test_required_signers_unique_first_seen() {
        let network = NetworkConfig::mainnet();
        let address = enterprise(&signing_key(1));
        let input = |i: i64| {
            Operation::new(i, OperationType::Input)
                .with_account(address.clone())
                .with_amount(Amount::lovelace(-1))
                .with_coin_change(format!("{}:{}", "aa".repeat(32), i), CoinAction::CoinSpent)
        };
        let ops = vec![
            input(0),
            staking_op(1, OperationType::Withdrawal),
            input(2),
            staking_op(3, OperationType::StakeKeyDeregistration),
        ];
        let signers = required_signers(&ops, &network).unwrap();
        let addresses: Vec<_> = signers.iter().map(|s| s.address.as_str()).collect();
        assert_eq!(addresses, vec![address.as_str(), REWARD_ADDRESS]);
    }

    #[test]
    fn test_pool_retirement_signer() {
        let pool = "1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5";
        let op = Operation::new(0, OperationType::PoolRetirement)
            .with_account(pool)
            .with_metadata(OperationMetadata {
                epoch: Some(300),
                ..Default::default()
            });
        let signers = signers_for_operation(&op, &NetworkConfig::mainnet()).unwrap();
        assert_eq!(signers, vec![AccountIdentifier::new(pool)]);
    }

    #[test]
    fn test_recover_signers() {
        let payer = signing_key(1);
        let other = signing_key(4);
        let required = vec![
            AccountIdentifier::new(enterprise(&payer)),
            AccountIdentifier::new(enterprise(&other)),
        ];
        let set = build_witness_set(&[witness(&payer, Some(enterprise(&payer)), None)]).unwrap();
        assert_eq!(recover_signers(&required, &set), vec![required[0].clone()]);
    }

    /// Byron mainnet address whose root commits to `key` and `chain_code`
    fn byron_for(key: &SigningKey, chain_code: [u8; 32]) -> String {
        let root =
            ByronAddress::spending_root(key.verifying_key().as_bytes(), &chain_code, &[0xa0], 0).unwrap();
        CardanoAddress::Byron(ByronAddress::new(root, vec![0xa0], 0).unwrap()).to_string()
    }

    fn byron_signer(address: &str, chain_code: [u8; 32]) -> AccountIdentifier {
        let mut signer = AccountIdentifier::new(address);
        signer.metadata = Some(AccountIdentifierMetadata {
            chain_code: Some(hex::encode(chain_code)),
        });
        signer
    }

    #[test]
    fn test_recover_byron_signer() {
        let key = signing_key(2);
        let address = byron_for(&key, [0xab; 32]);
        let signer = byron_signer(&address, [0xab; 32]);
        let set = build_witness_set(&[witness(&key, Some(address), Some("ab".repeat(32)))]).unwrap();

        assert_eq!(recover_signers(&[signer.clone()], &set), vec![signer.clone()]);
        assert!(recover_signers(&[signer], &WitnessSet::default()).is_empty());
    }

    #[test]
    fn test_recover_only_witnessed_byron_signer() {
        let signed = signing_key(2);
        let unsigned = signing_key(3);
        let signed_address = byron_for(&signed, [0xab; 32]);
        let required = vec![
            byron_signer(&signed_address, [0xab; 32]),
            byron_signer(&byron_for(&unsigned, [0xcd; 32]), [0xcd; 32]),
        ];
        let set =
            build_witness_set(&[witness(&signed, Some(signed_address), Some("ab".repeat(32)))]).unwrap();

        assert_eq!(recover_signers(&required, &set), vec![required[0].clone()]);
    }

    #[test]
    fn test_byron_witness_for_another_address() {
        // Right key, wrong chain code: the root does not match
        let key = signing_key(2);
        let address = byron_for(&key, [0xab; 32]);
        let set = build_witness_set(&[witness(&key, Some(address.clone()), Some("cd".repeat(32)))]).unwrap();

        assert!(recover_signers(&[byron_signer(&address, [0xab; 32])], &set).is_empty());
        assert!(recover_signers(&[AccountIdentifier::new(BYRON_MAINNET)], &set).is_empty());
    }
}
