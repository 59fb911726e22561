//! Error taxonomy for the construction engine.
//!
//! Every step returns [`ConstructionError`]. Each variant maps to a stable
//! numeric [`ErrorCode`] and a `retriable` flag, and renders into the
//! [`RosettaError`] object the HTTP boundary hands back to clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeout::TimeoutError;

/// Result type for construction operations
pub type Result<T> = std::result::Result<T, ConstructionError>;

/// Errors raised while building, parsing, signing or submitting transactions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    // ============ Request / Network Errors ============
    /// Network identifier does not match the configured network
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Blockchain identifier is not cardano
    #[error("Invalid blockchain: {0}")]
    InvalidBlockchain(String),

    /// Operation type not known or not allowed here
    #[error("Invalid operation type: {0}")]
    InvalidOperationType(String),

    // ============ Address Errors ============
    /// Address could not be decoded
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Bech32 address mixing upper and lower case characters
    #[error("Invalid address casing: {0}")]
    InvalidAddressCasing(String),

    /// Address kind not valid for the request
    #[error("Invalid address type: {0}")]
    InvalidAddressType(String),

    // ============ Key Errors ============
    /// Public key with the wrong length or encoding
    #[error("Invalid public key format: {0}")]
    InvalidPublicKeyFormat(String),

    /// Staking key with the wrong length or encoding
    #[error("Invalid staking key format: {0}")]
    InvalidStakingKeyFormat(String),

    /// Staking credential required but absent
    #[error("Staking key is required for this type of operation or address")]
    MissingStakingKey,

    /// Byron witness without a chain code
    #[error("Missing chain code for byron address")]
    ChainCodeMissing,

    // ============ Pool Errors ============
    /// Pool key hash required but absent
    #[error("Pool key hash is required to operate")]
    MissingPoolKey,

    /// Pool key hash not 28 bytes of hex
    #[error("Invalid pool key hash: {0}")]
    InvalidPoolKeyHash(String),

    /// poolRegistrationWithCert without a certificate
    #[error("Pool registration certificate is required for pool registration")]
    MissingPoolCert,

    /// Certificate hex undecodable or not a pool registration
    #[error("Invalid pool registration certificate: {0}")]
    InvalidPoolRegistrationCert(String),

    /// poolRegistration without parameters
    #[error("Pool registration parameters were expected")]
    MissingPoolRegistrationParameters,

    /// A single pool registration parameter is absent
    #[error("Pool registration parameter is missing: {0}")]
    MissingPoolRegistrationParameter(&'static str),

    /// A pool registration parameter is malformed
    #[error("Invalid pool registration parameters: {0}")]
    InvalidPoolRegistrationParameters(String),

    /// Relays empty or malformed
    #[error("Pool relays are invalid: {0}")]
    InvalidPoolRelays(String),

    /// Owners unparseable or duplicated
    #[error("Invalid pool owners: {0}")]
    InvalidPoolOwners(String),

    /// Pool metadata url or hash malformed
    #[error("Pool metadata is invalid: {0}")]
    InvalidPoolMetadata(String),

    /// poolRetirement without an epoch
    #[error("Mandatory parameter is missing: epoch")]
    MissingPoolRetirementEpoch,

    // ============ Vote Registration Errors ============
    /// voteRegistration without metadata
    #[error("Missing vote registration metadata")]
    MissingVoteRegistrationMetadata,

    /// Voting key absent
    #[error("Voting key is missing")]
    MissingVotingKey,

    /// Voting key not a 32 byte Ed25519 key
    #[error("Voting key format is invalid")]
    InvalidVotingKeyFormat,

    /// Voting signature not 64 bytes of hex
    #[error("Invalid voting signature")]
    InvalidVotingSignature,

    /// Voting nonce absent or zero
    #[error("Voting nonce not valid")]
    VotingNonceNotValid,

    // ============ Token Errors ============
    /// Token bundle entry without tokens
    #[error("Assets are required for output operation token bundle")]
    TokenBundleAssetsMissing,

    /// Token amount without a value
    #[error("Asset value is required for token asset")]
    TokenAssetValueMissing,

    /// Policy id not 28 bytes of hex
    #[error("Invalid policy id: {0}")]
    InvalidPolicyId(String),

    /// Asset name longer than 32 bytes or not hex
    #[error("Invalid token name: {0}")]
    InvalidTokenName(String),

    // ============ Transaction Errors ============
    /// Input operation malformed
    #[error("Transaction inputs parameters errors in operations array: {0}")]
    TransactionInputsParametersMissing(String),

    /// Output operation malformed
    #[error("Transaction outputs parameters errors in operations array: {0}")]
    TransactionOutputsParametersMissing(String),

    /// Operations consume less than they produce
    #[error("The transaction you are trying to build has more outputs than inputs")]
    OutputsBiggerThanInputs,

    /// Unsigned transaction could not be assembled
    #[error("Cant create unsigned transaction: {0}")]
    CantCreateUnsignedTransaction(String),

    /// Signed transaction could not be assembled
    #[error("Cant create signed transaction: {0}")]
    CantCreateSignedTransaction(String),

    /// Signatures could not form a witness set
    #[error("Cant build witnesses set: {0}")]
    CantBuildWitnessesSet(String),

    /// Extra data envelope could not be encoded
    #[error("Cant encode extra data: {0}")]
    CantEncodeExtraData(String),

    /// Encoding failure outside the envelope
    #[error("Serialization error: {0}")]
    GeneralSerializationError(String),

    /// Malformed or truncated CBOR or hex
    #[error("Deserialization error: {0}")]
    GeneralDeserializationError(String),

    /// Neither an explicit ttl nor a relative offset was supplied
    #[error("Ttl is missing")]
    TtlMissing,

    /// Protocol parameters absent from payloads metadata
    #[error("Protocol parameters are missing")]
    ProtocolParametersMissing,

    // ============ Gateway Errors ============
    /// The step needs chain access but the deployment is offline
    #[error("Operation not supported in offline mode")]
    NotSupportedInOfflineMode,

    /// Outbound call to a collaborator timed out
    #[error("Gateway error during '{operation}': {reason}")]
    GatewayError {
        /// The outbound call
        operation: String,
        /// What went wrong
        reason: String,
    },

    /// Node rejected the transaction
    #[error("Error when sending the transaction: {0}")]
    SendTransactionError(String),

    /// Deployment is missing a collaborator or carries invalid settings
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// Unexpected I/O failure
    #[error("An error occurred: {0}")]
    UnspecifiedError(String),
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Invalid network
    InvalidNetwork = 4000,
    /// Invalid blockchain
    InvalidBlockchain = 4004,
    /// Invalid public key format
    InvalidPublicKeyFormat = 4007,
    /// Input parameters missing
    TransactionInputsParametersMissing = 4008,
    /// Output parameters missing
    TransactionOutputsParametersMissing = 4009,
    /// Outputs bigger than inputs
    OutputsBiggerThanInputs = 4010,
    /// Cant create signed transaction
    CantCreateSignedTransaction = 4011,
    /// Cant create unsigned transaction
    CantCreateUnsignedTransaction = 4012,
    /// Invalid address
    InvalidAddress = 4015,
    /// Invalid address type
    InvalidAddressType = 4016,
    /// Invalid staking key format
    InvalidStakingKeyFormat = 4017,
    /// Staking key missing
    StakingKeyMissing = 4018,
    /// Invalid operation type
    InvalidOperationType = 4019,
    /// Pool key missing
    PoolKeyMissing = 4020,
    /// Token bundle assets missing
    TokenBundleAssetsMissing = 4021,
    /// Token asset value missing
    TokenAssetValueMissing = 4022,
    /// Invalid policy id
    InvalidPolicyId = 4023,
    /// Invalid token name
    InvalidTokenName = 4024,
    /// Invalid pool key hash
    InvalidPoolKeyHash = 4025,
    /// Pool certificate missing
    PoolCertMissing = 4026,
    /// Invalid pool certificate
    InvalidPoolCert = 4027,
    /// Pool registration parameters missing
    PoolRegistrationParamsMissing = 4029,
    /// Invalid pool relays
    InvalidPoolRelays = 4030,
    /// Invalid pool metadata
    InvalidPoolMetadata = 4031,
    /// Invalid pool owners
    InvalidPoolOwners = 4034,
    /// Invalid pool registration parameters
    InvalidPoolRegistrationParams = 4035,
    /// Retirement epoch missing
    MissingPoolRetirementEpoch = 4036,
    /// Invalid address casing
    InvalidAddressCasing = 4039,
    /// Ttl missing
    TtlMissing = 4040,
    /// Protocol parameters missing
    ProtocolParametersMissing = 4041,
    /// Unspecified error
    UnspecifiedError = 5000,
    /// Cant serialize
    GeneralSerializationError = 5002,
    /// Cant parse transaction
    GeneralDeserializationError = 5003,
    /// Cant build witnesses set
    CantBuildWitnessesSet = 5005,
    /// Send transaction error
    SendTransactionError = 5006,
    /// Voting nonce not valid
    VotingNonceNotValid = 5007,
    /// Invalid voting signature
    InvalidVotingSignature = 5008,
    /// Voting key missing
    MissingVotingKey = 5009,
    /// Invalid voting key format
    InvalidVotingKeyFormat = 5010,
    /// Vote registration metadata missing
    MissingVoteRegistrationMetadata = 5011,
    /// Chain code missing
    ChainCodeMissing = 5012,
    /// Gateway error
    GatewayError = 5020,
    /// Not supported in offline mode
    NotSupportedInOfflineMode = 5021,
    /// Invalid engine configuration
    ConfigurationError = 5022,
}

impl ErrorCode {
    /// Static description rendered as the Rosetta error message
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidNetwork => "Invalid Network configuration",
            ErrorCode::InvalidBlockchain => "Invalid blockchain",
            ErrorCode::InvalidPublicKeyFormat => "Invalid public key format",
            ErrorCode::TransactionInputsParametersMissing => {
                "Transaction inputs parameters errors in operations array"
            }
            ErrorCode::TransactionOutputsParametersMissing => {
                "Transaction outputs parameters errors in operations array"
            }
            ErrorCode::OutputsBiggerThanInputs => {
                "The transaction you are trying to build has more outputs than inputs"
            }
            ErrorCode::CantCreateSignedTransaction => {
                "Cant create signed transaction from transaction bytes"
            }
            ErrorCode::CantCreateUnsignedTransaction => {
                "Cant create unsigned transaction from transaction bytes"
            }
            ErrorCode::InvalidAddress => "Provided address is invalid",
            ErrorCode::InvalidAddressType => "Provided address type is invalid",
            ErrorCode::InvalidStakingKeyFormat => "Invalid staking key format",
            ErrorCode::StakingKeyMissing => "Staking key is required for this type of address",
            ErrorCode::InvalidOperationType => "Provided operation type is invalid",
            ErrorCode::PoolKeyMissing => "Pool key hash is required to operate",
            ErrorCode::TokenBundleAssetsMissing => {
                "Assets are required for output operation token bundle"
            }
            ErrorCode::TokenAssetValueMissing => "Asset value is required for token asset",
            ErrorCode::InvalidPolicyId => "Invalid policy id",
            ErrorCode::InvalidTokenName => "Invalid token name",
            ErrorCode::InvalidPoolKeyHash => "Provided pool key hash has invalid format",
            ErrorCode::PoolCertMissing => {
                "Pool registration certificate is required for pool registration"
            }
            ErrorCode::InvalidPoolCert => "Invalid pool registration certificate format",
            ErrorCode::PoolRegistrationParamsMissing => "Pool registration parameters were expected",
            ErrorCode::InvalidPoolRelays => "Pool relays are invalid",
            ErrorCode::InvalidPoolMetadata => "Pool metadata is invalid",
            ErrorCode::InvalidPoolOwners => "Invalid pool owners received",
            ErrorCode::InvalidPoolRegistrationParams => {
                "Invalid pool registration parameters received"
            }
            ErrorCode::MissingPoolRetirementEpoch => "Mandatory parameter is missing: Epoch",
            ErrorCode::InvalidAddressCasing => "Provided address is invalid due to casing",
            ErrorCode::TtlMissing => "Ttl is required to build the transaction",
            ErrorCode::ProtocolParametersMissing => "Protocol parameters are required",
            ErrorCode::UnspecifiedError => "An error occurred",
            ErrorCode::GeneralSerializationError => "Cant serialize data",
            ErrorCode::GeneralDeserializationError => "Cant deserialize data",
            ErrorCode::CantBuildWitnessesSet => {
                "Cant build witnesses set for transaction probably because of provided signatures"
            }
            ErrorCode::SendTransactionError => "Error when sending the transaction",
            ErrorCode::VotingNonceNotValid => "Voting nonce not valid",
            ErrorCode::InvalidVotingSignature => "Invalid voting signature",
            ErrorCode::MissingVotingKey => "Voting key is missing",
            ErrorCode::InvalidVotingKeyFormat => "Voting key format is invalid",
            ErrorCode::MissingVoteRegistrationMetadata => "Missing vote registration metadata",
            ErrorCode::ChainCodeMissing => "Missing chain code",
            ErrorCode::GatewayError => "Gateway error",
            ErrorCode::NotSupportedInOfflineMode => "Operation not supported in offline mode",
            ErrorCode::ConfigurationError => "Invalid engine configuration",
        }
    }
}

impl ConstructionError {
    /// Returns the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            ConstructionError::InvalidNetwork(_) => ErrorCode::InvalidNetwork,
            ConstructionError::InvalidBlockchain(_) => ErrorCode::InvalidBlockchain,
            ConstructionError::InvalidOperationType(_) => ErrorCode::InvalidOperationType,
            ConstructionError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            ConstructionError::InvalidAddressCasing(_) => ErrorCode::InvalidAddressCasing,
            ConstructionError::InvalidAddressType(_) => ErrorCode::InvalidAddressType,
            ConstructionError::InvalidPublicKeyFormat(_) => ErrorCode::InvalidPublicKeyFormat,
            ConstructionError::InvalidStakingKeyFormat(_) => ErrorCode::InvalidStakingKeyFormat,
            ConstructionError::MissingStakingKey => ErrorCode::StakingKeyMissing,
            ConstructionError::ChainCodeMissing => ErrorCode::ChainCodeMissing,
            ConstructionError::MissingPoolKey => ErrorCode::PoolKeyMissing,
            ConstructionError::InvalidPoolKeyHash(_) => ErrorCode::InvalidPoolKeyHash,
            ConstructionError::MissingPoolCert => ErrorCode::PoolCertMissing,
            ConstructionError::InvalidPoolRegistrationCert(_) => ErrorCode::InvalidPoolCert,
            ConstructionError::MissingPoolRegistrationParameters
            | ConstructionError::MissingPoolRegistrationParameter(_) => {
                ErrorCode::PoolRegistrationParamsMissing
            }
            ConstructionError::InvalidPoolRegistrationParameters(_) => {
                ErrorCode::InvalidPoolRegistrationParams
            }
            ConstructionError::InvalidPoolRelays(_) => ErrorCode::InvalidPoolRelays,
            ConstructionError::InvalidPoolOwners(_) => ErrorCode::InvalidPoolOwners,
            ConstructionError::InvalidPoolMetadata(_) => ErrorCode::InvalidPoolMetadata,
            ConstructionError::MissingPoolRetirementEpoch => ErrorCode::MissingPoolRetirementEpoch,
            ConstructionError::MissingVoteRegistrationMetadata => {
                ErrorCode::MissingVoteRegistrationMetadata
            }
            ConstructionError::MissingVotingKey => ErrorCode::MissingVotingKey,
            ConstructionError::InvalidVotingKeyFormat => ErrorCode::InvalidVotingKeyFormat,
            ConstructionError::InvalidVotingSignature => ErrorCode::InvalidVotingSignature,
            ConstructionError::VotingNonceNotValid => ErrorCode::VotingNonceNotValid,
            ConstructionError::TokenBundleAssetsMissing => ErrorCode::TokenBundleAssetsMissing,
            ConstructionError::TokenAssetValueMissing => ErrorCode::TokenAssetValueMissing,
            ConstructionError::InvalidPolicyId(_) => ErrorCode::InvalidPolicyId,
            ConstructionError::InvalidTokenName(_) => ErrorCode::InvalidTokenName,
            ConstructionError::TransactionInputsParametersMissing(_) => {
                ErrorCode::TransactionInputsParametersMissing
            }
            ConstructionError::TransactionOutputsParametersMissing(_) => {
                ErrorCode::TransactionOutputsParametersMissing
            }
            ConstructionError::OutputsBiggerThanInputs => ErrorCode::OutputsBiggerThanInputs,
            ConstructionError::CantCreateUnsignedTransaction(_)
            | ConstructionError::CantEncodeExtraData(_) => ErrorCode::CantCreateUnsignedTransaction,
            ConstructionError::CantCreateSignedTransaction(_) => {
                ErrorCode::CantCreateSignedTransaction
            }
            ConstructionError::CantBuildWitnessesSet(_) => ErrorCode::CantBuildWitnessesSet,
            ConstructionError::GeneralSerializationError(_) => ErrorCode::GeneralSerializationError,
            ConstructionError::GeneralDeserializationError(_) => {
                ErrorCode::GeneralDeserializationError
            }
            ConstructionError::TtlMissing => ErrorCode::TtlMissing,
            ConstructionError::ProtocolParametersMissing => ErrorCode::ProtocolParametersMissing,
            ConstructionError::NotSupportedInOfflineMode => ErrorCode::NotSupportedInOfflineMode,
            ConstructionError::GatewayError { .. } => ErrorCode::GatewayError,
            ConstructionError::SendTransactionError(_) => ErrorCode::SendTransactionError,
            ConstructionError::ConfigurationError(_) => ErrorCode::ConfigurationError,
            ConstructionError::UnspecifiedError(_) => ErrorCode::UnspecifiedError,
        }
    }

    /// Returns true if the caller may retry the same request
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            ConstructionError::GatewayError { .. } | ConstructionError::UnspecifiedError(_)
        )
    }

    /// Render as the structured error object returned to Rosetta clients
    pub fn to_rosetta_error(&self) -> RosettaError {
        let code = self.code();
        RosettaError {
            code: code as u32,
            message: code.message().to_string(),
            retriable: self.retriable(),
            details: Some(ErrorDetails {
                message: self.to_string(),
            }),
        }
    }
}

/// Rosetta error object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosettaError {
    pub code: u32,
    pub message: String,
    pub retriable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Free-form details attached to a [`RosettaError`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
}

// ============ From implementations for common error types ============

impl From<hex::FromHexError> for ConstructionError {
    fn from(err: hex::FromHexError) -> Self {
        ConstructionError::GeneralDeserializationError(format!("invalid hex: {}", err))
    }
}

impl From<minicbor::decode::Error> for ConstructionError {
    fn from(err: minicbor::decode::Error) -> Self {
        ConstructionError::GeneralDeserializationError(err.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for ConstructionError {
    fn from(err: minicbor::encode::Error<E>) -> Self {
        ConstructionError::GeneralSerializationError(err.to_string())
    }
}

impl From<TimeoutError> for ConstructionError {
    fn from(err: TimeoutError) -> Self {
        ConstructionError::GatewayError {
            operation: err.operation.clone(),
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ConstructionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConstructionError::GatewayError {
                operation: "http request".to_string(),
                reason: err.to_string(),
            }
        } else {
            ConstructionError::UnspecifiedError(err.to_string())
        }
    }
}
