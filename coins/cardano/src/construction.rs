//! The Rosetta construction flow
//!
//! ```text
//! derive -> preprocess -> metadata -> payloads -> parse -> combine -> parse -> hash -> submit
//! ```
//!
//! Every step is a request/response transform. Nothing is kept between
//! calls: state that must survive from one step to the next travels inside
//! the extra data envelope. Only metadata and submit leave the process.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::{AddressKind, CardanoAddress, ED25519_KEY_LENGTH};
use crate::cbor::{self, blake2b_256, AuxiliaryData, RawTransaction, TransactionBody, WitnessSet};
use crate::config::{ConstructionConfig, BLOCKCHAIN_NAME};
use crate::error::{ConstructionError, Result};
use crate::extra_data::{self, TransactionExtraData};
use crate::fee::{minimum_fee, transaction_size, update_tx_size};
use crate::operations::{operations_from_body, process_operations};
use crate::provider::{LedgerDataProvider, NodeSubmission, SubmitApiClient};
use crate::timeout::with_timeout;
use crate::types::{
    AccountIdentifier, Amount, CurveType, DepositParameters, NetworkIdentifier, Operation,
    ProtocolParameters, PublicKey, Signature, SignatureType, SigningPayload, TransactionIdentifier,
};
use crate::witness::{build_witness_set, dummy_witness_set, known_signers, recover_signers, Witness};

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeriveMetadata {
    /// `Base`, `Enterprise` or `Reward`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staking_credential: Option<PublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionDeriveRequest {
    pub network_identifier: NetworkIdentifier,
    pub public_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DeriveMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionDeriveResponse {
    pub account_identifier: AccountIdentifier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_parameters: Option<DepositParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionPreprocessRequest {
    pub network_identifier: NetworkIdentifier,
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PreprocessMetadata>,
}

/// Options preprocess hands to metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionOptions {
    pub relative_ttl: u64,
    pub transaction_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionPreprocessResponse {
    pub options: ConstructionOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_public_keys: Vec<AccountIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionMetadataRequest {
    pub network_identifier: NetworkIdentifier,
    pub options: ConstructionOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_keys: Vec<PublicKey>,
}

/// Chain-dependent values payloads needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionMetadata {
    /// Absolute slot, as a decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_parameters: Option<ProtocolParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionMetadataResponse {
    pub metadata: ConstructionMetadata,
    pub suggested_fee: Vec<Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionPayloadsRequest {
    pub network_identifier: NetworkIdentifier,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub metadata: ConstructionMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionPayloadsResponse {
    pub unsigned_transaction: String,
    pub payloads: Vec<SigningPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionParseRequest {
    pub network_identifier: NetworkIdentifier,
    pub signed: bool,
    pub transaction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionParseResponse {
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_identifier_signers: Vec<AccountIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionCombineRequest {
    pub network_identifier: NetworkIdentifier,
    pub unsigned_transaction: String,
    pub signatures: Vec<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionCombineResponse {
    pub signed_transaction: String,
}

/// Request shared by hash and submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionHashRequest {
    pub network_identifier: NetworkIdentifier,
    pub signed_transaction: String,
}

pub type ConstructionSubmitRequest = ConstructionHashRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIdentifierResponse {
    pub transaction_identifier: TransactionIdentifier,
}

// ============================================================================
// Service
// ============================================================================

/// Stateless construction engine for one configured network
#[derive(Clone)]
pub struct ConstructionService {
    config: ConstructionConfig,
    ledger: Option<Arc<dyn LedgerDataProvider>>,
    submitter: Option<Arc<dyn NodeSubmission>>,
}

impl std::fmt::Debug for ConstructionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructionService")
            .field("config", &self.config)
            .field("ledger", &self.ledger.is_some())
            .field("submitter", &self.submitter.is_some())
            .finish()
    }
}

impl ConstructionService {
    /// Create a service from a validated configuration. A submit-api URL in
    /// the configuration wires up a [`SubmitApiClient`].
    pub fn new(config: ConstructionConfig) -> Result<Self> {
        config.validate()?;
        let submitter = match &config.submit_api_url {
            Some(url) => Some(Arc::new(SubmitApiClient::new(url)?) as Arc<dyn NodeSubmission>),
            None => None,
        };
        Ok(Self {
            config,
            ledger: None,
            submitter,
        })
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerDataProvider>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn NodeSubmission>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn config(&self) -> &ConstructionConfig {
        &self.config
    }

    fn check_network(&self, identifier: &NetworkIdentifier) -> Result<()> {
        if identifier.blockchain != BLOCKCHAIN_NAME {
            return Err(ConstructionError::InvalidBlockchain(identifier.blockchain.clone()));
        }
        if identifier.network != self.config.network.name {
            return Err(ConstructionError::InvalidNetwork(identifier.network.clone()));
        }
        Ok(())
    }

    fn online(&self) -> Result<()> {
        if self.config.offline {
            return Err(ConstructionError::NotSupportedInOfflineMode);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // derive
    // ------------------------------------------------------------------------

    /// Address of a public key, Enterprise unless another type is requested
    pub fn derive(&self, request: &ConstructionDeriveRequest) -> Result<ConstructionDeriveResponse> {
        self.check_network(&request.network_identifier)?;
        let metadata = request.metadata.clone().unwrap_or_default();

        let payment = ed25519_key_bytes(&request.public_key)
            .ok_or_else(|| ConstructionError::InvalidPublicKeyFormat(request.public_key.hex_bytes.clone()))?;
        let staking = match &metadata.staking_credential {
            Some(credential) => Some(
                ed25519_key_bytes(credential)
                    .ok_or_else(|| ConstructionError::InvalidStakingKeyFormat(credential.hex_bytes.clone()))?,
            ),
            None => None,
        };
        let kind = match metadata.address_type.as_deref() {
            Some(name) => AddressKind::from_name(name)?,
            None => AddressKind::Enterprise,
        };

        let address = CardanoAddress::encode(
            self.config.network.network_id,
            kind,
            &payment,
            staking.as_deref(),
        )?
        .to_address_string()?;
        info!(network = %self.config.network.name, kind = ?kind, "derived address");

        Ok(ConstructionDeriveResponse {
            account_identifier: AccountIdentifier::new(address),
        })
    }

    // ------------------------------------------------------------------------
    // preprocess
    // ------------------------------------------------------------------------

    /// Measure the transaction the operations will produce, signed with dummy
    /// witnesses and a zero ttl
    pub fn preprocess(&self, request: &ConstructionPreprocessRequest) -> Result<ConstructionPreprocessResponse> {
        self.check_network(&request.network_identifier)?;
        let metadata = request.metadata.clone().unwrap_or_default();
        let relative_ttl = metadata.relative_ttl.unwrap_or(self.config.default_relative_ttl);
        let deposits = metadata
            .deposit_parameters
            .unwrap_or(self.config.deposit_parameters);

        let result = process_operations(&request.operations, &self.config.network, &deposits)?;
        let unsigned = result.build_unsigned(&request.operations, result.fee()?, 0)?;
        let dummy = dummy_witness_set(&result.required_signers);
        let signed = RawTransaction::assemble(&unsigned.body_bytes, &dummy, unsigned.auxiliary_data.as_deref())?;
        let size = transaction_size(&signed);

        info!(
            operations = request.operations.len(),
            signers = result.required_signers.len(),
            size,
            relative_ttl,
            "preprocessed operations"
        );
        Ok(ConstructionPreprocessResponse {
            options: ConstructionOptions {
                relative_ttl,
                transaction_size: size,
            },
            required_public_keys: result.required_signers,
        })
    }

    // ------------------------------------------------------------------------
    // metadata
    // ------------------------------------------------------------------------

    /// Absolute ttl, protocol parameters and the minimum fee for the size
    /// preprocess measured
    pub async fn metadata(&self, request: &ConstructionMetadataRequest) -> Result<ConstructionMetadataResponse> {
        self.check_network(&request.network_identifier)?;
        self.online()?;
        let ledger = self
            .ledger
            .as_ref()
            .ok_or_else(|| ConstructionError::ConfigurationError("no ledger provider configured".to_string()))?;

        let (tip, params) = with_timeout(self.config.timeouts.ledger, "ledger lookup", async {
            tokio::join!(ledger.find_tip_slot(), ledger.find_latest_protocol_parameters())
        })
        .await?;
        let (tip, params) = (tip?, params?);

        let ttl = crate::fee::ttl(tip, None, Some(request.options.relative_ttl))?;
        let size = update_tx_size(request.options.transaction_size, 0, ttl);
        let fee = minimum_fee(size, &params)?;
        info!(tip, ttl, size, fee, "built construction metadata");

        Ok(ConstructionMetadataResponse {
            metadata: ConstructionMetadata {
                ttl: Some(ttl.to_string()),
                protocol_parameters: Some(params),
            },
            suggested_fee: vec![Amount::lovelace(fee as i128)],
        })
    }

    // ------------------------------------------------------------------------
    // payloads
    // ------------------------------------------------------------------------

    /// Unsigned transaction plus one signing payload per signer
    pub fn payloads(&self, request: &ConstructionPayloadsRequest) -> Result<ConstructionPayloadsResponse> {
        self.check_network(&request.network_identifier)?;
        let ttl = request
            .metadata
            .ttl
            .as_deref()
            .ok_or(ConstructionError::TtlMissing)?
            .parse::<u64>()
            .map_err(|e| ConstructionError::GeneralDeserializationError(format!("ttl: {}", e)))?;
        let params = request
            .metadata
            .protocol_parameters
            .as_ref()
            .ok_or(ConstructionError::ProtocolParametersMissing)?;

        let result = process_operations(&request.operations, &self.config.network, &params.deposit_parameters())?;
        let fee = result.fee()?;
        let unsigned = result.build_unsigned(&request.operations, fee, ttl)?;

        let payloads = result
            .required_signers
            .iter()
            .map(|signer| SigningPayload {
                account_identifier: Some(signer.clone()),
                hex_bytes: unsigned.body_hash_hex.clone(),
                signature_type: Some(SignatureType::Ed25519),
            })
            .collect::<Vec<_>>();

        info!(
            hash = %unsigned.body_hash_hex,
            fee,
            ttl,
            payloads = payloads.len(),
            "created unsigned transaction"
        );
        Ok(ConstructionPayloadsResponse {
            unsigned_transaction: unsigned.to_envelope()?,
            payloads,
        })
    }

    // ------------------------------------------------------------------------
    // parse
    // ------------------------------------------------------------------------

    /// Operations of an unsigned or signed transaction, plus the signers whose
    /// witnesses a signed one carries
    pub fn parse(&self, request: &ConstructionParseRequest) -> Result<ConstructionParseResponse> {
        self.check_network(&request.network_identifier)?;
        let (transaction, extra) = extra_data::decode(&request.transaction)?;

        let (body, auxiliary_data, witness_set) = if request.signed {
            let raw = RawTransaction::split(&transaction)?;
            let witness_set: WitnessSet = cbor::from_slice(raw.witness_set)?;
            let auxiliary_data = match raw.auxiliary_data {
                Some(aux) => Some(cbor::from_slice::<AuxiliaryData>(aux)?),
                None => stored_auxiliary_data(&extra)?,
            };
            (cbor::from_slice::<TransactionBody>(raw.body)?, auxiliary_data, Some(witness_set))
        } else {
            (
                cbor::from_slice::<TransactionBody>(&transaction)?,
                stored_auxiliary_data(&extra)?,
                None,
            )
        };

        let network = &self.config.network;
        let operations = operations_from_body(
            &body,
            &extra.operations,
            auxiliary_data.as_ref(),
            network,
            &self.config.deposit_parameters,
        )?;
        let signers = match &witness_set {
            Some(set) => recover_signers(&known_signers(&operations, network), set),
            None => Vec::new(),
        };

        debug!(
            signed = request.signed,
            operations = operations.len(),
            signers = signers.len(),
            "parsed transaction"
        );
        Ok(ConstructionParseResponse {
            operations,
            account_identifier_signers: signers,
        })
    }

    // ------------------------------------------------------------------------
    // combine
    // ------------------------------------------------------------------------

    /// Attach the witness set built from `signatures`. The body bytes are
    /// reused verbatim so the hash does not change.
    pub fn combine(&self, request: &ConstructionCombineRequest) -> Result<ConstructionCombineResponse> {
        self.check_network(&request.network_identifier)?;
        let (body, extra) = extra_data::decode(&request.unsigned_transaction)?;

        let witnesses: Vec<Witness> = request.signatures.iter().map(Witness::from).collect();
        let witness_set = build_witness_set(&witnesses)?;
        let auxiliary_data = extra
            .transaction_metadata_hex
            .as_deref()
            .map(hex::decode)
            .transpose()?;

        let signed = RawTransaction::assemble(&body, &witness_set, auxiliary_data.as_deref())
            .map_err(|e| ConstructionError::CantCreateSignedTransaction(e.to_string()))?;
        info!(
            hash = %hex::encode(blake2b_256(&body)),
            witnesses = witness_set.vkey_witnesses.len() + witness_set.bootstrap_witnesses.len(),
            "combined signatures"
        );

        Ok(ConstructionCombineResponse {
            signed_transaction: extra_data::encode(&signed, &extra)?,
        })
    }

    // ------------------------------------------------------------------------
    // hash
    // ------------------------------------------------------------------------

    pub fn hash(&self, request: &ConstructionHashRequest) -> Result<TransactionIdentifierResponse> {
        self.check_network(&request.network_identifier)?;
        let (transaction, _) = extra_data::decode(&request.signed_transaction)?;
        let raw = RawTransaction::split(&transaction)?;
        Ok(TransactionIdentifierResponse {
            transaction_identifier: TransactionIdentifier {
                hash: hex::encode(blake2b_256(raw.body)),
            },
        })
    }

    // ------------------------------------------------------------------------
    // submit
    // ------------------------------------------------------------------------

    pub async fn submit(&self, request: &ConstructionSubmitRequest) -> Result<TransactionIdentifierResponse> {
        self.check_network(&request.network_identifier)?;
        self.online()?;
        let submitter = self
            .submitter
            .as_ref()
            .ok_or_else(|| ConstructionError::ConfigurationError("no node submission configured".to_string()))?;

        let (transaction, _) = extra_data::decode(&request.signed_transaction)?;
        let local_hash = hex::encode(blake2b_256(RawTransaction::split(&transaction)?.body));

        let node_hash = with_timeout(self.config.timeouts.submit, "submit", submitter.submit(&transaction))
            .await??;
        if node_hash != local_hash {
            warn!(%node_hash, %local_hash, "node reported a different transaction hash");
        }
        info!(hash = %local_hash, "submitted transaction");

        Ok(TransactionIdentifierResponse {
            transaction_identifier: TransactionIdentifier { hash: node_hash },
        })
    }
}

/// Public key bytes accepted by derive: 32 bytes, or 64 with a chain code
fn ed25519_key_bytes(key: &PublicKey) -> Option<Vec<u8>> {
    if key.curve_type != CurveType::Ed25519 {
        return None;
    }
    let mut bytes = hex::decode(&key.hex_bytes).ok()?;
    if bytes.len() != ED25519_KEY_LENGTH && bytes.len() != 2 * ED25519_KEY_LENGTH {
        return None;
    }
    bytes.truncate(ED25519_KEY_LENGTH);
    Some(bytes)
}

fn stored_auxiliary_data(extra: &TransactionExtraData) -> Result<Option<AuxiliaryData>> {
    match &extra.transaction_metadata_hex {
        Some(hex_str) => Ok(Some(cbor::from_slice(&hex::decode(hex_str)?)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::types::{CoinAction, OperationType};

    const PAYMENT_KEY: &str = "1B400D60AAF34EAF6DCBAB9BBA46001A23497886CF11066F7846933D30E5AD3F";
    const ENTERPRISE: &str = "addr1vxa5pudxg77g3sdaddecmw8tvc6hmynywn49lltt4fmvn7cpnkcpx";

    fn service() -> ConstructionService {
        ConstructionService::new(ConstructionConfig::new(NetworkConfig::mainnet())).unwrap()
    }

    fn mainnet() -> NetworkIdentifier {
        NetworkIdentifier {
            blockchain: "cardano".into(),
            network: "mainnet".into(),
        }
    }

    fn transfer() -> Vec<Operation> {
        vec![
            Operation::new(0, OperationType::Input)
                .with_account(ENTERPRISE)
                .with_amount(Amount::lovelace(-5_000_000))
                .with_coin_change(format!("{}:0", "2f".repeat(32)), CoinAction::CoinSpent),
            Operation::new(1, OperationType::Output)
                .with_account(ENTERPRISE)
                .with_amount(Amount::lovelace(4_800_000)),
        ]
    }

    // ============================================================================
    // Network checks
    // ============================================================================

    #[test]
    fn test_network_checks() {
        let mut request = ConstructionDeriveRequest {
            network_identifier: mainnet(),
            public_key: PublicKey::ed25519(PAYMENT_KEY),
            metadata: None,
        };
        request.network_identifier.blockchain = "bitcoin".into();
        assert!(matches!(
            service().derive(&request),
            Err(ConstructionError::InvalidBlockchain(_))
        ));

        request.network_identifier = mainnet();
        request.network_identifier.network = "preprod".into();
        assert!(matches!(
            service().derive(&request),
            Err(ConstructionError::InvalidNetwork(_))
        ));
    }

    // ============================================================================
    // Derive
    // ============================================================================

    #[test]
    fn test_derive_enterprise_default() {
        let request = ConstructionDeriveRequest {
            network_identifier: mainnet(),
            public_key: PublicKey::ed25519(PAYMENT_KEY),
            metadata: None,
        };
        let response = service().derive(&request).unwrap();
        assert_eq!(response.account_identifier.address, ENTERPRISE);
    }

    #[test]
    fn test_derive_accepts_chain_code_suffix() {
        let request = ConstructionDeriveRequest {
            network_identifier: mainnet(),
            public_key: PublicKey::ed25519(format!("{}{}", PAYMENT_KEY, "00".repeat(32))),
            metadata: None,
        };
        assert_eq!(service().derive(&request).unwrap().account_identifier.address, ENTERPRISE);
    }

    #[test]
    fn test_derive_base_requires_staking_key() {
        let request = ConstructionDeriveRequest {
            network_identifier: mainnet(),
            public_key: PublicKey::ed25519(PAYMENT_KEY),
            metadata: Some(DeriveMetadata {
                address_type: Some("Base".into()),
                staking_credential: None,
            }),
        };
        assert_eq!(service().derive(&request), Err(ConstructionError::MissingStakingKey));
    }

    #[test]
    fn test_derive_invalid_key() {
        let request = ConstructionDeriveRequest {
            network_identifier: mainnet(),
            public_key: PublicKey::ed25519("abcd"),
            metadata: None,
        };
        assert!(matches!(
            service().derive(&request),
            Err(ConstructionError::InvalidPublicKeyFormat(_))
        ));
    }

    // ============================================================================
    // Preprocess / payloads
    // ============================================================================

    #[test]
    fn test_preprocess_defaults() {
        let request = ConstructionPreprocessRequest {
            network_identifier: mainnet(),
            operations: transfer(),
            metadata: None,
        };
        let response = service().preprocess(&request).unwrap();
        assert_eq!(response.options.relative_ttl, 1000);
        assert!(response.options.transaction_size > 0);
        assert_eq!(response.required_public_keys, vec![AccountIdentifier::new(ENTERPRISE)]);
    }

    #[test]
    fn test_payloads_requires_ttl_and_parameters() {
        let mut request = ConstructionPayloadsRequest {
            network_identifier: mainnet(),
            operations: transfer(),
            metadata: ConstructionMetadata::default(),
        };
        assert_eq!(service().payloads(&request), Err(ConstructionError::TtlMissing));

        request.metadata.ttl = Some("1000".into());
        assert_eq!(
            service().payloads(&request),
            Err(ConstructionError::ProtocolParametersMissing)
        );
    }

    #[tokio::test]
    async fn test_offline_metadata_refused() {
        let config = ConstructionConfig::new(NetworkConfig::mainnet()).with_offline(true);
        let service = ConstructionService::new(config).unwrap();
        let request = ConstructionMetadataRequest {
            network_identifier: mainnet(),
            options: ConstructionOptions {
                relative_ttl: 1000,
                transaction_size: 300,
            },
            public_keys: vec![],
        };
        assert_eq!(
            service.metadata(&request).await,
            Err(ConstructionError::NotSupportedInOfflineMode)
        );
    }

    #[test]
    fn test_submit_without_submitter() {
        let request = ConstructionSubmitRequest {
            network_identifier: mainnet(),
            signed_transaction: "00".into(),
        };
        let result = tokio_test::block_on(service().submit(&request));
        assert!(matches!(result, Err(ConstructionError::ConfigurationError(_))));
        assert!(!result.unwrap_err().retriable());
    }

    #[test]
    fn test_hash_rejects_unsigned_envelope() {
        let service = service();
        let payloads = service
            .payloads(&ConstructionPayloadsRequest {
                network_identifier: mainnet(),
                operations: transfer(),
                metadata: ConstructionMetadata {
                    ttl: Some("1000".into()),
                    protocol_parameters: Some(ProtocolParameters {
                        min_fee_coefficient: 44,
                        min_fee_constant: 155_381,
                        max_tx_size: 16_384,
                        max_val_size: 5_000,
                        key_deposit: 2_000_000,
                        pool_deposit: 500_000_000,
                        coins_per_utxo_byte: 4_310,
                        min_pool_cost: 340_000_000,
                        max_collateral_inputs: 3,
                    }),
                },
            })
            .unwrap();
        let result = service.hash(&ConstructionHashRequest {
            network_identifier: mainnet(),
            signed_transaction: payloads.unsigned_transaction,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_request_json_names() {
        let json = serde_json::json!({
            "network_identifier": { "blockchain": "cardano", "network": "mainnet" },
            "public_key": { "hex_bytes": PAYMENT_KEY, "curve_type": "edwards25519" },
            "metadata": { "address_type": "Reward" }
        });
        let request: ConstructionDeriveRequest = serde_json::from_value(json).unwrap();
        assert_eq!(
            request.metadata.unwrap().address_type.as_deref(),
            Some("Reward")
        );
    }
}
