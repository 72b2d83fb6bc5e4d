use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Range compliance API.
///
/// Screens recipient addresses before any execution path runs. The policy
/// on screener unavailability is configurable: fail-open records the skip
/// reason and allows, fail-closed blocks.
#[derive(Clone)]
pub struct RangeClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    risk_threshold: u32,
    fail_open: bool,
}

/// Screening outcome; `reason` is recorded either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceDecision {
    pub allowed: bool,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RiskResponse {
    #[serde(default)]
    risk_score: u32,
}

impl RangeClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        risk_threshold: u32,
        fail_open: bool,
    ) -> crate::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            risk_threshold,
            fail_open,
        })
    }

    /// Screen a recipient address. Never returns an error: unavailability
    /// resolves to the configured fail-open/fail-closed policy.
    pub async fn check_address(&self, address: &str) -> ComplianceDecision {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => {
                return ComplianceDecision {
                    allowed: true,
                    reason: "compliance screening skipped: no API key configured".to_string(),
                }
            }
        };

        let url = format!(
            "{}/risk/address?address={}&network=solana",
            self.base_url, address
        );

        let result = async {
            let response = self
                .client
                .get(&url)
                .header("X-API-KEY", api_key)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(format!("Range API error: {}", response.status()).into());
            }

            let body: RiskResponse = response.json().await?;
            crate::Result::Ok(body.risk_score)
        }
        .await;

        match result {
            Ok(score) if score > self.risk_threshold => ComplianceDecision {
                allowed: false,
                reason: format!(
                    "address risk score {} exceeds threshold {}",
                    score, self.risk_threshold
                ),
            },
            Ok(score) => ComplianceDecision {
                allowed: true,
                reason: format!("risk score {} within threshold", score),
            },
            Err(e) => {
                tracing::warn!("compliance check failed for {}: {}", address, e);
                ComplianceDecision {
                    allowed: self.fail_open,
                    reason: format!(
                        "compliance check skipped ({}), fail-{}",
                        e,
                        if self.fail_open { "open" } else { "closed" }
                    ),
                }
            }
        }
    }
}
