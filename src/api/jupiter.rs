use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the Jupiter swap aggregator.
///
/// Two-step flow: fetch a quote for the pair, then ask the aggregator to
/// build the swap transaction around that quote. The returned transaction
/// still needs the fee payer's signature before submission.
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    price_impact_pct: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

/// Quote information from Jupiter
#[derive(Debug, Clone)]
pub struct Quote {
    /// Output per unit of input, in raw units; callers handle decimals
    pub price: f64,
    pub price_impact_pct: f64,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Full quote body, passed back verbatim when building the swap
    pub raw: serde_json::Value,
}

impl JupiterClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.base_url, input_mint, output_mint, amount, slippage_bps
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(format!("Jupiter quote error: {}", response.status()).into());
        }

        let raw: serde_json::Value = response.json().await?;
        let parsed: QuoteResponse = serde_json::from_value(raw.clone())?;

        let in_amount: u64 = parsed.in_amount.parse()?;
        let out_amount: u64 = parsed.out_amount.parse()?;
        let price_impact: f64 = parsed.price_impact_pct.parse().unwrap_or(0.0);

        Ok(Quote {
            price: out_amount as f64 / in_amount as f64,
            price_impact_pct: price_impact,
            in_amount,
            out_amount,
            raw,
        })
    }

    /// Build the swap transaction for a previously fetched quote.
    ///
    /// `destination_token_account` routes the swap output somewhere other
    /// than the signer's own account; without it Jupiter pays the signer.
    /// Returns the base64-encoded transaction with the fee payer signature
    /// slot left blank for `user_public_key` to fill.
    pub async fn build_swap(
        &self,
        quote: &Quote,
        user_public_key: &str,
        destination_token_account: Option<&str>,
    ) -> Result<String> {
        let url = format!("{}/swap", self.base_url);

        let mut body = serde_json::json!({
            "quoteResponse": quote.raw,
            "userPublicKey": user_public_key,
            "wrapAndUnwrapSol": true,
        });
        if let Some(destination) = destination_token_account {
            body["destinationTokenAccount"] = serde_json::Value::String(destination.to_string());
        }

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(format!("Jupiter swap error: {}", response.status()).into());
        }

        let swap: SwapResponse = response.json().await?;
        Ok(swap.swap_transaction)
    }
}
