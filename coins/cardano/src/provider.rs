//! Collaborators the pipeline calls out to
//!
//! The ledger view and the node are consumed through traits so the pipeline
//! stays testable offline. [`SubmitApiClient`] talks to a cardano-submit-api
//! instance over HTTP.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConstructionError, Result};
use crate::types::{ProtocolParameters, Utxo};

const SUBMIT_PATH: &str = "api/submit/tx";
const CBOR_CONTENT_TYPE: &str = "application/cbor";
const TX_HASH_HEX_LENGTH: usize = 64;

/// Read access to chain state
#[async_trait]
pub trait LedgerDataProvider: Send + Sync {
    async fn find_latest_protocol_parameters(&self) -> Result<ProtocolParameters>;

    /// Slot of the current chain tip
    async fn find_tip_slot(&self) -> Result<u64>;

    async fn find_utxo(&self, address: &str) -> Result<Vec<Utxo>>;
}

/// Hands signed transactions to a node
#[async_trait]
pub trait NodeSubmission: Send + Sync {
    /// Submit the CBOR of a signed transaction and return its hash
    async fn submit(&self, signed_transaction: &[u8]) -> Result<String>;
}

/// HTTP client for cardano-submit-api
#[derive(Debug, Clone)]
pub struct SubmitApiClient {
    client: Client,
    endpoint: Url,
}

impl SubmitApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    /// Use a preconfigured reqwest client
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}/{}", base_url.trim_end_matches('/'), SUBMIT_PATH))
            .map_err(|e| {
                ConstructionError::ConfigurationError(format!("invalid submit api url {}: {}", base_url, e))
            })?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl NodeSubmission for SubmitApiClient {
    async fn submit(&self, signed_transaction: &[u8]) -> Result<String> {
        debug!(endpoint = %self.endpoint, size = signed_transaction.len(), "submitting transaction");
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, CBOR_CONTENT_TYPE)
            .body(signed_transaction.to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::ACCEPTED {
            warn!(%status, "submit api rejected transaction");
            return Err(ConstructionError::SendTransactionError(format!("{}: {}", status, body)));
        }

        // The accepted body is the transaction id as a JSON string
        let hash: String = serde_json::from_str(&body).map_err(|_| {
            ConstructionError::SendTransactionError(format!("unexpected submit api response {}", body))
        })?;
        if hash.len() != TX_HASH_HEX_LENGTH || hex::decode(&hash).is_err() {
            return Err(ConstructionError::SendTransactionError(format!(
                "submit api returned {} instead of a transaction hash",
                hash
            )));
        }
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = SubmitApiClient::new("http://localhost:8090/").unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:8090/api/submit/tx");
        assert!(SubmitApiClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_submit_accepted() {
        let mut server = mockito::Server::new_async().await;
        let hash = "ab".repeat(32);
        let mock = server
            .mock("POST", "/api/submit/tx")
            .match_header("content-type", "application/cbor")
            .with_status(202)
            .with_body(format!("\"{}\"", hash))
            .create_async()
            .await;

        let client = SubmitApiClient::new(&server.url()).unwrap();
        assert_eq!(client.submit(&[0x84, 0xa0]).await.unwrap(), hash);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/submit/tx")
            .with_status(400)
            .with_body("BadInputsUTxO")
            .create_async()
            .await;

        let client = SubmitApiClient::new(&server.url()).unwrap();
        match client.submit(&[0x84]).await {
            Err(ConstructionError::SendTransactionError(msg)) => assert!(msg.contains("BadInputsUTxO")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_malformed_hash() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/submit/tx")
            .with_status(202)
            .with_body("\"abc\"")
            .create_async()
            .await;

        let client = SubmitApiClient::new(&server.url()).unwrap();
        assert!(matches!(
            client.submit(&[0x84]).await,
            Err(ConstructionError::SendTransactionError(_))
        ));
    }
}
