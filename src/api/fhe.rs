use crate::models::Strategy;
use crate::scheduler::ConditionEvaluator;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Homomorphic evaluation is slow; give the engine room to finish.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the FHE condition-evaluator engine.
///
/// The engine operates on the strategy's encrypted bounds without ever
/// seeing them in the clear; we only learn the boolean trigger decision.
#[derive(Clone)]
pub struct FheClient {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct EvaluationPayload<'a> {
    strategy_type: &'a str,
    encrypted_upper_bound: &'a str,
    encrypted_lower_bound: &'a str,
    server_key: &'a str,
    encrypted_client_key: &'a str,
    current_price_cents: u32,
}

#[derive(Deserialize)]
struct EvaluationResponse {
    is_triggered: bool,
}

impl FheClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            endpoint: endpoint.to_string(),
        })
    }

    /// Ask the engine whether the strategy's encrypted condition holds at
    /// the given price. The price goes over the wire as integer cents.
    pub async fn evaluate(&self, strategy: &Strategy, current_price: f64) -> Result<bool> {
        let cents = (current_price * 100.0).round();
        if !(0.0..=u32::MAX as f64).contains(&cents) {
            return Err(format!("price out of range for evaluation: {}", current_price).into());
        }

        let payload = EvaluationPayload {
            strategy_type: &strategy.strategy_type,
            encrypted_upper_bound: &strategy.encrypted_upper_bound,
            encrypted_lower_bound: &strategy.encrypted_lower_bound,
            server_key: &strategy.server_key,
            encrypted_client_key: &strategy.encrypted_client_key,
            current_price_cents: cents as u32,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("FHE engine error: {}", response.status()).into());
        }

        let body: EvaluationResponse = response.json().await?;
        Ok(body.is_triggered)
    }
}

#[async_trait]
impl ConditionEvaluator for FheClient {
    async fn is_met(&self, strategy: &Strategy, current_price: f64) -> Result<bool> {
        self.evaluate(strategy, current_price).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn strategy() -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            user_id: "u".to_string(),
            strategy_type: "LIMIT_SELL_RALLY".to_string(),
            asset_in: "SOL".to_string(),
            asset_out: "USDC".to_string(),
            amount: 1.0,
            price_feed_id: None,
            recipient_address: "r".to_string(),
            server_key: "server-key-hex".to_string(),
            encrypted_client_key: "client-key-hex".to_string(),
            encrypted_upper_bound: "upper-ct".to_string(),
            encrypted_lower_bound: "lower-ct".to_string(),
            zkp_data: None,
            status: StrategyStatus::Pending,
            tx_hash: None,
            executed_at: None,
            utxo_commitments: None,
            is_private: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_evaluate_triggered() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/evaluateStrategy")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "strategy_type": "LIMIT_SELL_RALLY",
                "current_price_cents": 15042,
            })))
            .with_status(200)
            .with_body(r#"{"is_triggered": true}"#)
            .create_async()
            .await;

        let client = FheClient::new(&format!("{}/evaluateStrategy", server.url())).unwrap();
        let triggered = client.evaluate(&strategy(), 150.42).await.unwrap();

        mock.assert_async().await;
        assert!(triggered);
    }

    #[tokio::test]
    async fn test_evaluate_not_triggered() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/evaluateStrategy")
            .with_status(200)
            .with_body(r#"{"is_triggered": false}"#)
            .create_async()
            .await;

        let client = FheClient::new(&format!("{}/evaluateStrategy", server.url())).unwrap();
        assert!(!client.evaluate(&strategy(), 99.0).await.unwrap());
    }

    #[tokio::test]
    async fn test_engine_failure_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/evaluateStrategy")
            .with_status(502)
            .create_async()
            .await;

        let client = FheClient::new(&format!("{}/evaluateStrategy", server.url())).unwrap();
        assert!(client.evaluate(&strategy(), 99.0).await.is_err());
    }

    #[tokio::test]
    async fn test_negative_price_rejected_locally() {
        let client = FheClient::new("http://127.0.0.1:1/evaluateStrategy").unwrap();
        assert!(client.evaluate(&strategy(), -1.0).await.is_err());
    }
}
