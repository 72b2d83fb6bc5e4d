use crate::scheduler::PriceSource;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Pyth Hermes price oracle.
///
/// All feeds for a cycle are fetched in a single batched call; a feed the
/// oracle doesn't know is simply absent from the result, never an error
/// for the whole call.
#[derive(Clone)]
pub struct PythClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestPriceResponse {
    parsed: Vec<ParsedPrice>,
}

#[derive(Debug, Deserialize)]
struct ParsedPrice {
    id: String,
    price: PriceField,
}

#[derive(Debug, Deserialize)]
struct PriceField {
    price: String,
    expo: i32,
}

impl PythClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch current prices for the given feed ids in one round-trip.
    ///
    /// The result map is keyed by the feed id exactly as requested
    /// (Hermes strips the `0x` prefix in its response).
    pub async fn fetch_prices(&self, feed_ids: &[String]) -> Result<HashMap<String, f64>> {
        if feed_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query: Vec<(&str, &str)> = feed_ids
            .iter()
            .map(|id| ("ids[]", id.as_str()))
            .collect();

        let url = format!("{}/v2/updates/price/latest", self.base_url);
        let response = self.client.get(&url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(format!("Hermes API error: {}", response.status()).into());
        }

        let body: LatestPriceResponse = response.json().await?;

        let mut prices = HashMap::new();
        for parsed in body.parsed {
            let raw: i64 = parsed.price.price.parse()?;
            let value = raw as f64 * 10f64.powi(parsed.price.expo);

            // Key by the caller's spelling of the id
            let requested = feed_ids
                .iter()
                .find(|id| id.trim_start_matches("0x") == parsed.id.trim_start_matches("0x"));
            if let Some(id) = requested {
                prices.insert(id.clone(), value);
            }
        }

        Ok(prices)
    }
}

#[async_trait]
impl PriceSource for PythClient {
    async fn fetch(&self, feed_ids: &[String]) -> Result<HashMap<String, f64>> {
        self.fetch_prices(feed_ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL_FEED: &str = "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";
    const ETH_FEED: &str = "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";

    #[tokio::test]
    async fn test_fetch_prices_batched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/updates/price/latest")
            .match_query(mockito::Matcher::Regex("ids".to_string()))
            .with_status(200)
            .with_body(format!(
                r#"{{"parsed": [
                    {{"id": "{}", "price": {{"price": "10012345678", "expo": -8}}}},
                    {{"id": "{}", "price": {{"price": "250000000000", "expo": -8}}}}
                ]}}"#,
                SOL_FEED.trim_start_matches("0x"),
                ETH_FEED.trim_start_matches("0x"),
            ))
            .create_async()
            .await;

        let client = PythClient::new(&server.url()).unwrap();
        let prices = client
            .fetch_prices(&[SOL_FEED.to_string(), ETH_FEED.to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(prices.len(), 2);
        assert!((prices[SOL_FEED] - 100.12345678).abs() < 1e-9);
        assert!((prices[ETH_FEED] - 2500.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_absent_feed_is_omitted_not_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/updates/price/latest")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"parsed": [{{"id": "{}", "price": {{"price": "15000000000", "expo": -8}}}}]}}"#,
                SOL_FEED.trim_start_matches("0x"),
            ))
            .create_async()
            .await;

        let client = PythClient::new(&server.url()).unwrap();
        let prices = client
            .fetch_prices(&[SOL_FEED.to_string(), "0xdeadbeef".to_string()])
            .await
            .unwrap();

        assert_eq!(prices.len(), 1);
        assert!(prices.contains_key(SOL_FEED));
        assert!(!prices.contains_key("0xdeadbeef"));
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/updates/price/latest")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = PythClient::new(&server.url()).unwrap();
        let result = client.fetch_prices(&[SOL_FEED.to_string()]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_request_skips_network() {
        // No mock server at all - an empty id set must not hit the wire
        let client = PythClient::new("http://127.0.0.1:1").unwrap();
        let prices = client.fetch_prices(&[]).await.unwrap();
        assert!(prices.is_empty());
    }
}
