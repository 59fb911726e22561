//! End-to-end runs of the construction steps against in-process collaborators

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use walletd_cardano_rosetta::cbor::blake2b_256;
use walletd_cardano_rosetta::extra_data;
use walletd_cardano_rosetta::types::{OperationMetadata, PoolRegistrationParams};
use walletd_cardano_rosetta::*;

const PAYMENT_KEY: &str = "159abeeecdf167ccc0ea60b30f9522154a0d74161aeb159fb43b6b0695f057b3";
const STAKING_KEY: &str = "964774728c8306a42252adbfb07ccd6ef42399f427ade25a5933ce190c5a8760";
const BASE_ADDRESS: &str = "addr1q9dhy809valxaer3nlvg2h5nudd62pxp6lu0cs36zczhfr98y6pah6lvppk8xft57nef6yexqh6rr204yemcmm3emhzsgg4fg0";
const POOL_HASH: &str = "1b268f4cba3faa7e36d8a0cc4adca2096fb856119412ee7330f692b5";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mainnet() -> NetworkIdentifier {
    NetworkIdentifier {
        blockchain: "cardano".into(),
        network: "mainnet".into(),
    }
}

fn service() -> ConstructionService {
    ConstructionService::new(ConstructionConfig::new(NetworkConfig::mainnet())).unwrap()
}

fn params() -> ProtocolParameters {
    ProtocolParameters {
        min_fee_coefficient: 44,
        min_fee_constant: 155_381,
        max_tx_size: 16_384,
        max_val_size: 5_000,
        key_deposit: 2_000_000,
        pool_deposit: 500_000_000,
        coins_per_utxo_byte: 4_310,
        min_pool_cost: 340_000_000,
        max_collateral_inputs: 3,
    }
}

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

fn owner_address(key: &SigningKey) -> String {
    CardanoAddress::enterprise(key.verifying_key().as_bytes(), MAINNET_NETWORK_ID)
        .unwrap()
        .to_address_string()
        .unwrap()
}

/// Spend 5 ADA, send 4.8 ADA back, leave 0.2 ADA as fee
fn transfer(owner: &str) -> Vec<Operation> {
    vec![
        Operation::new(0, OperationType::Input)
            .with_account(owner)
            .with_amount(Amount::lovelace(-5_000_000))
            .with_coin_change(format!("{}:1", "2f".repeat(32)), CoinAction::CoinSpent),
        Operation::new(1, OperationType::Output)
            .with_account(owner)
            .with_amount(Amount::lovelace(4_800_000)),
    ]
}

fn payload_metadata(ttl: u64) -> ConstructionMetadata {
    ConstructionMetadata {
        ttl: Some(ttl.to_string()),
        protocol_parameters: Some(params()),
    }
}

fn sign(key: &SigningKey, payload: &SigningPayload) -> Signature {
    let message = hex::decode(&payload.hex_bytes).unwrap();
    Signature {
        signing_payload: payload.clone(),
        public_key: PublicKey::ed25519(hex::encode(key.verifying_key().as_bytes())),
        signature_type: SignatureType::Ed25519,
        hex_bytes: hex::encode(key.sign(&message).to_bytes()),
    }
}

struct FixedLedger {
    tip: u64,
}

#[async_trait]
impl LedgerDataProvider for FixedLedger {
    async fn find_latest_protocol_parameters(&self) -> Result<ProtocolParameters> {
        Ok(params())
    }

    async fn find_tip_slot(&self) -> Result<u64> {
        Ok(self.tip)
    }

    async fn find_utxo(&self, _address: &str) -> Result<Vec<Utxo>> {
        Ok(Vec::new())
    }
}

struct SlowLedger;

#[async_trait]
impl LedgerDataProvider for SlowLedger {
    async fn find_latest_protocol_parameters(&self) -> Result<ProtocolParameters> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(params())
    }

    async fn find_tip_slot(&self) -> Result<u64> {
        Ok(0)
    }

    async fn find_utxo(&self, _address: &str) -> Result<Vec<Utxo>> {
        Ok(Vec::new())
    }
}

/// Records what it was handed and answers with the body hash
#[derive(Default)]
struct RecordingNode {
    submitted: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl NodeSubmission for RecordingNode {
    async fn submit(&self, signed_transaction: &[u8]) -> Result<String> {
        self.submitted.lock().unwrap().push(signed_transaction.to_vec());
        let raw = cbor::RawTransaction::split(signed_transaction)?;
        Ok(hex::encode(blake2b_256(raw.body)))
    }
}

// ============================================================================
// Derive
// ============================================================================

#[test]
fn test_derive_base_address() {
    init_tracing();
    let response = service()
        .derive(&ConstructionDeriveRequest {
            network_identifier: mainnet(),
            public_key: PublicKey::ed25519(PAYMENT_KEY),
            metadata: Some(DeriveMetadata {
                address_type: Some("Base".into()),
                staking_credential: Some(PublicKey::ed25519(STAKING_KEY)),
            }),
        })
        .unwrap();
    assert_eq!(response.account_identifier.address, BASE_ADDRESS);
}

#[test]
fn test_derive_unknown_address_type() {
    let result = service().derive(&ConstructionDeriveRequest {
        network_identifier: mainnet(),
        public_key: PublicKey::ed25519(PAYMENT_KEY),
        metadata: Some(DeriveMetadata {
            address_type: Some("Pointer".into()),
            staking_credential: None,
        }),
    });
    assert!(matches!(result, Err(ConstructionError::InvalidAddressType(_))));
}

// ============================================================================
// Full flow
// ============================================================================

#[tokio::test]
async fn test_transfer_flow() {
    init_tracing();
    let key = signing_key();
    let owner = owner_address(&key);
    let operations = transfer(&owner);
    let node = Arc::new(RecordingNode::default());
    let service = service()
        .with_ledger(Arc::new(FixedLedger { tip: 50_000_000 }))
        .with_submitter(node.clone());

    let preprocess = service
        .preprocess(&ConstructionPreprocessRequest {
            network_identifier: mainnet(),
            operations: operations.clone(),
            metadata: None,
        })
        .unwrap();
    assert_eq!(preprocess.required_public_keys, vec![AccountIdentifier::new(owner.clone())]);

    let metadata = service
        .metadata(&ConstructionMetadataRequest {
            network_identifier: mainnet(),
            options: preprocess.options,
            public_keys: vec![],
        })
        .await
        .unwrap();
    assert_eq!(metadata.metadata.ttl.as_deref(), Some("50001000"));
    // ttl 0 encodes in one byte, 50001000 in five
    let expected_size = preprocess.options.transaction_size + 4;
    assert_eq!(
        metadata.suggested_fee,
        vec![Amount::lovelace((44 * expected_size + 155_381) as i128)]
    );

    let payloads = service
        .payloads(&ConstructionPayloadsRequest {
            network_identifier: mainnet(),
            operations: operations.clone(),
            metadata: metadata.metadata.clone(),
        })
        .unwrap();
    assert_eq!(payloads.payloads.len(), 1);
    let payload = &payloads.payloads[0];
    assert_eq!(payload.account_identifier, Some(AccountIdentifier::new(owner.clone())));

    let (body, extra) = extra_data::decode(&payloads.unsigned_transaction).unwrap();
    assert_eq!(payload.hex_bytes, hex::encode(blake2b_256(&body)));
    assert_eq!(extra.transaction_metadata_hex, None);
    let decoded: cbor::TransactionBody = cbor::from_slice(&body).unwrap();
    assert_eq!(decoded.fee, 200_000);
    assert_eq!(decoded.ttl, Some(50_001_000));

    let unsigned = service
        .parse(&ConstructionParseRequest {
            network_identifier: mainnet(),
            signed: false,
            transaction: payloads.unsigned_transaction.clone(),
        })
        .unwrap();
    assert_eq!(unsigned.operations[0], operations[0]);
    assert_eq!(unsigned.operations[1].account, operations[1].account);
    assert_eq!(unsigned.operations[1].amount, operations[1].amount);
    assert!(unsigned.account_identifier_signers.is_empty());

    let combined = service
        .combine(&ConstructionCombineRequest {
            network_identifier: mainnet(),
            unsigned_transaction: payloads.unsigned_transaction.clone(),
            signatures: vec![sign(&key, payload)],
        })
        .unwrap();

    let signed = service
        .parse(&ConstructionParseRequest {
            network_identifier: mainnet(),
            signed: true,
            transaction: combined.signed_transaction.clone(),
        })
        .unwrap();
    assert_eq!(signed.operations, unsigned.operations);
    assert_eq!(signed.account_identifier_signers, vec![AccountIdentifier::new(owner)]);

    let hash = service
        .hash(&ConstructionHashRequest {
            network_identifier: mainnet(),
            signed_transaction: combined.signed_transaction.clone(),
        })
        .unwrap();
    assert_eq!(hash.transaction_identifier.hash, payload.hex_bytes);

    let submitted = service
        .submit(&ConstructionSubmitRequest {
            network_identifier: mainnet(),
            signed_transaction: combined.signed_transaction.clone(),
        })
        .await
        .unwrap();
    assert_eq!(submitted.transaction_identifier, hash.transaction_identifier);
    assert_eq!(node.submitted.lock().unwrap().len(), 1);
}

#[test]
fn test_signed_parse_without_matching_witness() {
    let key = signing_key();
    let owner = owner_address(&key);
    let service = service();
    let payloads = service
        .payloads(&ConstructionPayloadsRequest {
            network_identifier: mainnet(),
            operations: transfer(&owner),
            metadata: payload_metadata(1_000),
        })
        .unwrap();

    // A valid signature from a key that does not own the input
    let stranger = SigningKey::from_bytes(&[9u8; 32]);
    let combined = service
        .combine(&ConstructionCombineRequest {
            network_identifier: mainnet(),
            unsigned_transaction: payloads.unsigned_transaction,
            signatures: vec![sign(&stranger, &payloads.payloads[0])],
        })
        .unwrap();

    let parsed = service
        .parse(&ConstructionParseRequest {
            network_identifier: mainnet(),
            signed: true,
            transaction: combined.signed_transaction,
        })
        .unwrap();
    assert!(parsed.account_identifier_signers.is_empty());
}

#[test]
fn test_stake_registration_and_delegation() {
    let key = signing_key();
    let owner = owner_address(&key);
    let staking = PublicKey::ed25519(STAKING_KEY);
    let operations = vec![
        Operation::new(0, OperationType::Input)
            .with_account(owner.clone())
            .with_amount(Amount::lovelace(-10_000_000))
            .with_coin_change(format!("{}:0", "3a".repeat(32)), CoinAction::CoinSpent),
        Operation::new(1, OperationType::Output)
            .with_account(owner.clone())
            .with_amount(Amount::lovelace(7_800_000)),
        Operation::new(2, OperationType::StakeKeyRegistration).with_metadata(OperationMetadata {
            staking_credential: Some(staking.clone()),
            ..Default::default()
        }),
        Operation::new(3, OperationType::StakeDelegation).with_metadata(OperationMetadata {
            staking_credential: Some(staking),
            pool_key_hash: Some(POOL_HASH.into()),
            ..Default::default()
        }),
    ];

    let service = service();
    let preprocess = service
        .preprocess(&ConstructionPreprocessRequest {
            network_identifier: mainnet(),
            operations: operations.clone(),
            metadata: None,
        })
        .unwrap();
    let signers: Vec<String> = preprocess
        .required_public_keys
        .iter()
        .map(|a| a.address.clone())
        .collect();
    assert_eq!(
        signers,
        vec![owner, "stake1uxnjdq7ma0kqsmrny460fu5azvnqtap3486jvaudacuam3g3yc4nu".to_string()]
    );

    let payloads = service
        .payloads(&ConstructionPayloadsRequest {
            network_identifier: mainnet(),
            operations: operations.clone(),
            metadata: payload_metadata(1_000),
        })
        .unwrap();
    let (body, _) = extra_data::decode(&payloads.unsigned_transaction).unwrap();
    let decoded: cbor::TransactionBody = cbor::from_slice(&body).unwrap();
    // 10 ADA in, 7.8 ADA out, 2 ADA key deposit
    assert_eq!(decoded.fee, 200_000);
    assert_eq!(decoded.certificates.len(), 2);

    let parsed = service
        .parse(&ConstructionParseRequest {
            network_identifier: mainnet(),
            signed: false,
            transaction: payloads.unsigned_transaction,
        })
        .unwrap();
    assert_eq!(parsed.operations[2], operations[2]);
    assert_eq!(parsed.operations[3], operations[3]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_pool_registration_missing_vrf_key_hash() {
    let operations = vec![Operation::new(0, OperationType::PoolRegistration).with_metadata(
        OperationMetadata {
            pool_key_hash: Some(POOL_HASH.into()),
            pool_registration_params: Some(PoolRegistrationParams {
                reward_address: Some(
                    "stake1uxnjdq7ma0kqsmrny460fu5azvnqtap3486jvaudacuam3g3yc4nu".into(),
                ),
                pledge: Some("5000000".into()),
                cost: Some("340000000".into()),
                pool_owners: Some(vec![
                    "stake1uxnjdq7ma0kqsmrny460fu5azvnqtap3486jvaudacuam3g3yc4nu".into(),
                ]),
                relays: Some(vec![]),
                ..Default::default()
            }),
            ..Default::default()
        },
    )];

    let result = service().preprocess(&ConstructionPreprocessRequest {
        network_identifier: mainnet(),
        operations,
        metadata: None,
    });
    assert_eq!(
        result,
        Err(ConstructionError::MissingPoolRegistrationParameter("vrfKeyHash"))
    );
}

#[test]
fn test_outputs_bigger_than_inputs() {
    let owner = owner_address(&signing_key());
    let mut operations = transfer(&owner);
    operations[1].amount = Some(Amount::lovelace(5_000_001));
    let result = service().payloads(&ConstructionPayloadsRequest {
        network_identifier: mainnet(),
        operations,
        metadata: payload_metadata(1_000),
    });
    assert_eq!(result, Err(ConstructionError::OutputsBiggerThanInputs));
}

#[tokio::test]
async fn test_offline_service_refuses_chain_access() {
    let config = ConstructionConfig::new(NetworkConfig::mainnet()).with_offline(true);
    let service = ConstructionService::new(config)
        .unwrap()
        .with_submitter(Arc::new(RecordingNode::default()));
    let result = service
        .submit(&ConstructionSubmitRequest {
            network_identifier: mainnet(),
            signed_transaction: "00".into(),
        })
        .await;
    assert_eq!(result, Err(ConstructionError::NotSupportedInOfflineMode));
}

#[tokio::test(start_paused = true)]
async fn test_metadata_ledger_timeout() {
    let config = ConstructionConfig::new(NetworkConfig::mainnet()).with_ledger_timeout(Duration::from_secs(5));
    let service = ConstructionService::new(config)
        .unwrap()
        .with_ledger(Arc::new(SlowLedger));
    let result = service
        .metadata(&ConstructionMetadataRequest {
            network_identifier: mainnet(),
            options: ConstructionOptions {
                relative_ttl: 1_000,
                transaction_size: 300,
            },
            public_keys: vec![],
        })
        .await;
    assert!(matches!(result, Err(ConstructionError::GatewayError { .. })));
}

#[tokio::test]
async fn test_submit_through_submit_api() {
    let key = signing_key();
    let owner = owner_address(&key);
    let mut server = mockito::Server::new_async().await;

    let config = ConstructionConfig::new(NetworkConfig::mainnet()).with_submit_api_url(server.url());
    let service = ConstructionService::new(config).unwrap();
    let payloads = service
        .payloads(&ConstructionPayloadsRequest {
            network_identifier: mainnet(),
            operations: transfer(&owner),
            metadata: payload_metadata(1_000),
        })
        .unwrap();
    let combined = service
        .combine(&ConstructionCombineRequest {
            network_identifier: mainnet(),
            unsigned_transaction: payloads.unsigned_transaction,
            signatures: vec![sign(&key, &payloads.payloads[0])],
        })
        .unwrap();

    let hash = payloads.payloads[0].hex_bytes.clone();
    let mock = server
        .mock("POST", "/api/submit/tx")
        .match_header("content-type", "application/cbor")
        .with_status(202)
        .with_body(format!("\"{}\"", hash))
        .create_async()
        .await;

    let response = service
        .submit(&ConstructionSubmitRequest {
            network_identifier: mainnet(),
            signed_transaction: combined.signed_transaction,
        })
        .await
        .unwrap();
    assert_eq!(response.transaction_identifier.hash, hash);
    mock.assert_async().await;
}
