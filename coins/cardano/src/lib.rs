//! # WalletD Cardano Rosetta
//!
//! Offline-first Rosetta construction engine for Cardano.
//!
//! ## Flow
//!
//! A client turns a list of Rosetta operations into a signed transaction by
//! walking the construction steps of [`ConstructionService`]:
//!
//! - **derive**: public key to Enterprise, Base or Reward address
//! - **preprocess**: size estimate and required signers
//! - **metadata**: ttl, protocol parameters and the suggested fee (online)
//! - **payloads**: unsigned transaction and one signing payload per signer
//! - **parse**: operations back out of an unsigned or signed transaction
//! - **combine**: attach signatures as a witness set
//! - **hash**: transaction id
//! - **submit**: hand the transaction to a node (online)
//!
//! Transactions travel between steps as hex of a CBOR envelope holding the
//! transaction bytes and the operations they were built from.
//!
//! ## Example
//!
//! ```rust,no_run
//! use walletd_cardano_rosetta::{
//!     ConstructionConfig, ConstructionDeriveRequest, ConstructionService, NetworkConfig,
//!     NetworkIdentifier, PublicKey,
//! };
//!
//! fn main() -> walletd_cardano_rosetta::Result<()> {
//!     let service = ConstructionService::new(ConstructionConfig::new(NetworkConfig::mainnet()))?;
//!     let response = service.derive(&ConstructionDeriveRequest {
//!         network_identifier: NetworkIdentifier {
//!             blockchain: "cardano".into(),
//!             network: "mainnet".into(),
//!         },
//!         public_key: PublicKey::ed25519(
//!             "1B400D60AAF34EAF6DCBAB9BBA46001A23497886CF11066F7846933D30E5AD3F",
//!         ),
//!         metadata: None,
//!     })?;
//!     println!("Address: {}", response.account_identifier.address);
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod cbor;
pub mod certificate;
pub mod config;
pub mod construction;
pub mod error;
pub mod extra_data;
pub mod fee;
pub mod operations;
pub mod provider;
pub mod timeout;
pub mod types;
pub mod witness;

pub use address::{AddressEra, AddressKind, CardanoAddress};
pub use config::{
    ConstructionConfig, NetworkConfig, BLOCKCHAIN_NAME, LOVELACE_PER_ADA, MAINNET_NETWORK_ID,
    TESTNET_NETWORK_ID,
};
pub use construction::*;
pub use error::{ConstructionError, ErrorCode, Result, RosettaError};
pub use extra_data::TransactionExtraData;
pub use provider::{LedgerDataProvider, NodeSubmission, SubmitApiClient};
pub use timeout::{TimeoutConfig, TimeoutError};
pub use types::{
    AccountIdentifier, Amount, CoinAction, CurveType, DepositParameters, NetworkIdentifier,
    Operation, OperationType, ProtocolParameters, PublicKey, Signature, SignatureType,
    SigningPayload, TransactionIdentifier, Utxo,
};
