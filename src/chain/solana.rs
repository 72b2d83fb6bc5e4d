use crate::chain::tx::{self, Keypair};
use crate::chain::Ledger;
use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC client for a Solana node, holding the executor keypair.
pub struct SolanaClient {
    client: Client,
    rpc_url: String,
    keypair: Keypair,
}

impl SolanaClient {
    pub fn new(rpc_url: &str, executor_key_base58: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            rpc_url: rpc_url.to_string(),
            keypair: Keypair::from_base58(executor_key_base58)?,
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(&self.rpc_url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(format!("RPC HTTP error: {}", response.status()).into());
        }

        let body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            return Err(format!("RPC error from {}: {}", method, error).into());
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| format!("RPC response for {} missing result", method).into())
    }

    async fn latest_blockhash(&self) -> Result<String> {
        let result = self
            .rpc_call(
                "getLatestBlockhash",
                json!([{ "commitment": "confirmed" }]),
            )
            .await?;

        result["value"]["blockhash"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "getLatestBlockhash returned no blockhash".into())
    }

    /// Submit a fully signed transaction; returns the signature.
    async fn send_raw(&self, tx_bytes: &[u8]) -> Result<String> {
        let encoded = BASE64.encode(tx_bytes);
        let result = self
            .rpc_call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64" }]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "sendTransaction returned no signature".into())
    }
}

#[async_trait]
impl Ledger for SolanaClient {
    fn signer_pubkey(&self) -> String {
        self.keypair.pubkey_base58()
    }

    async fn transfer_lamports(&self, recipient: &str, lamports: u64) -> Result<String> {
        let blockhash = self.latest_blockhash().await?;
        let tx_bytes = tx::build_transfer(&self.keypair, recipient, lamports, &blockhash)?;
        let signature = self.send_raw(&tx_bytes).await?;
        tracing::info!(
            "Transferred {} lamports to {}: {}",
            lamports,
            recipient,
            signature
        );
        Ok(signature)
    }

    async fn transfer_token(
        &self,
        source_token_account: &str,
        dest_token_account: &str,
        base_units: u64,
    ) -> Result<String> {
        let blockhash = self.latest_blockhash().await?;
        let tx_bytes = tx::build_token_transfer(
            &self.keypair,
            source_token_account,
            dest_token_account,
            base_units,
            &blockhash,
        )?;
        let signature = self.send_raw(&tx_bytes).await?;
        tracing::info!(
            "Transferred {} token units from {} to {}: {}",
            base_units,
            source_token_account,
            dest_token_account,
            signature
        );
        Ok(signature)
    }

    async fn send_swap_transaction(&self, tx_base64: &str) -> Result<String> {
        let tx_bytes = BASE64.decode(tx_base64)?;
        let signed = tx::countersign(&tx_bytes, &self.keypair)?;
        self.send_raw(&signed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "4rQanLxTFvdgtLsGirzPAhMaEQQCHci6wMZ3VeXsv87cJrBEncCquCBLufmBWkz7YG2DPhsW2iN3iS75QWDVNB1c";

    fn test_key() -> String {
        // Any 32-byte seed works for these tests
        bs58::encode([11u8; 32]).into_string()
    }

    #[tokio::test]
    async fn test_transfer_lamports_happy_path() {
        let mut server = mockito::Server::new_async().await;
        let blockhash_mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"method": "getLatestBlockhash"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(format!(
                r#"{{"jsonrpc":"2.0","id":1,"result":{{"value":{{"blockhash":"{}"}}}}}}"#,
                bs58::encode([9u8; 32]).into_string()
            ))
            .create_async()
            .await;
        let send_mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"method": "sendTransaction"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"5TxSignature"}"#)
            .create_async()
            .await;

        let client = SolanaClient::new(&server.url(), &test_key()).unwrap();
        let recipient = bs58::encode([3u8; 32]).into_string();
        let signature = client.transfer_lamports(&recipient, 1_000).await.unwrap();

        blockhash_mock.assert_async().await;
        send_mock.assert_async().await;
        assert_eq!(signature, "5TxSignature");
    }

    #[tokio::test]
    async fn test_rpc_rejection_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"Blockhash not found"}}"#,
            )
            .create_async()
            .await;

        let client = SolanaClient::new(&server.url(), &test_key()).unwrap();
        let recipient = bs58::encode([3u8; 32]).into_string();
        let result = client.transfer_lamports(&recipient, 1_000).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Blockhash"));
    }

    #[test]
    fn test_signer_pubkey_is_base58() {
        // Constructor accepts the 64-byte wallet export format too
        let client = SolanaClient::new("http://127.0.0.1:1", TEST_KEY);
        assert!(client.is_ok());

        let client = SolanaClient::new("http://127.0.0.1:1", &test_key()).unwrap();
        let pubkey = client.signer_pubkey();
        assert_eq!(bs58::decode(&pubkey).into_vec().unwrap().len(), 32);
    }

    #[test]
    fn test_bad_key_rejected() {
        assert!(SolanaClient::new("http://127.0.0.1:1", "not-a-key").is_err());
    }
}
