use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

// Proof verification on the relayer side can take a while
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the privacy-pool relayer.
///
/// Private strategies carry an opaque proof payload (`zkp_data`) that only
/// the relayer can turn into an on-chain withdrawal; this service never
/// interprets the proof, it just hands it over.
#[derive(Clone)]
pub struct RelayerClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawalResponse {
    tx_hash: String,
}

impl RelayerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Submit a private withdrawal. `proof` is passed through verbatim.
    pub async fn execute_private_withdrawal(
        &self,
        strategy_id: Uuid,
        proof: &serde_json::Value,
        recipient: &str,
    ) -> Result<String> {
        let url = format!("{}/execute-private-withdrawal", self.base_url);

        let body = serde_json::json!({
            "strategy_id": strategy_id,
            "proof": proof,
            "recipient": recipient,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(format!("relayer error: {}", response.status()).into());
        }

        let withdrawal: WithdrawalResponse = response.json().await?;
        if withdrawal.tx_hash.is_empty() {
            return Err("relayer returned an empty tx hash".into());
        }
        Ok(withdrawal.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_private_withdrawal_passthrough() {
        let mut server = mockito::Server::new_async().await;
        let id = Uuid::new_v4();
        let mock = server
            .mock("POST", "/execute-private-withdrawal")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "strategy_id": id,
                "proof": {"proof": ["0x1", "0x2"], "publicInputs": {"root": "0xabc"}},
                "recipient": "recipient-address",
            })))
            .with_status(200)
            .with_body(r#"{"tx_hash": "5signature"}"#)
            .create_async()
            .await;

        let client = RelayerClient::new(&server.url()).unwrap();
        let proof = serde_json::json!({
            "proof": ["0x1", "0x2"],
            "publicInputs": {"root": "0xabc"},
        });
        let tx = client
            .execute_private_withdrawal(id, &proof, "recipient-address")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(tx, "5signature");
    }

    #[tokio::test]
    async fn test_relayer_rejection_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/execute-private-withdrawal")
            .with_status(422)
            .create_async()
            .await;

        let client = RelayerClient::new(&server.url()).unwrap();
        let result = client
            .execute_private_withdrawal(Uuid::new_v4(), &serde_json::json!({}), "r")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_tx_hash_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/execute-private-withdrawal")
            .with_status(200)
            .with_body(r#"{"tx_hash": ""}"#)
            .create_async()
            .await;

        let client = RelayerClient::new(&server.url()).unwrap();
        let result = client
            .execute_private_withdrawal(Uuid::new_v4(), &serde_json::json!({}), "r")
            .await;
        assert!(result.is_err());
    }
}
