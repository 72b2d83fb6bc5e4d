use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Primary reference asset; its price gates any strategy whose own feed is
/// unavailable, and a cycle aborts entirely when this feed is missing.
pub const PRIMARY_ASSET: &str = "SOL";

/// Pyth price feed IDs (stable across chains).
/// Verified from: https://hermes.pyth.network/v2/price_feeds
const PYTH_PRICE_FEED_IDS: &[(&str, &str)] = &[
    (
        "SOL",
        "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d",
    ),
    (
        "ETH",
        "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace",
    ),
    (
        "BTC",
        "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
    ),
    (
        "USDC",
        "0xeaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a",
    ),
];

/// Token mints on devnet/testnet
const DEVNET_TOKEN_MINTS: &[(&str, &str)] = &[
    ("SOL", "So11111111111111111111111111111111111111112"),
    ("USDC", "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    ("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
];

/// Token mints on mainnet-beta
const MAINNET_TOKEN_MINTS: &[(&str, &str)] = &[
    ("SOL", "So11111111111111111111111111111111111111112"),
    ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
    ("USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"),
];

const TOKEN_DECIMALS: &[(&str, u8)] = &[("SOL", 9), ("USDC", 6), ("USDT", 6)];

/// Strategy types understood by the condition evaluator
pub const KNOWN_STRATEGY_TYPES: &[&str] = &[
    "LIMIT_ORDER",
    "BRACKET_ORDER_SHORT",
    "LIMIT_BUY_DIP",
    "LIMIT_SELL_RALLY",
];

/// Target Solana network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Devnet,
    Testnet,
    MainnetBeta,
}

impl Network {
    /// Production networks route swaps through the aggregator; everything
    /// else uses the synthetic swap path.
    pub fn is_production(&self) -> bool {
        matches!(self, Network::MainnetBeta)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::MainnetBeta => "mainnet-beta",
        }
    }
}

impl FromStr for Network {
    type Err = Box<dyn std::error::Error + Send + Sync>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            "mainnet-beta" | "mainnet" => Ok(Network::MainnetBeta),
            other => Err(format!("unknown network: {}", other).into()),
        }
    }
}

/// Strategy lifecycle state. PENDING rows are swept every cycle; the only
/// transition is PENDING -> EXECUTED, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyStatus {
    Pending,
    Executed,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Pending => "PENDING",
            StrategyStatus::Executed => "EXECUTED",
        }
    }
}

impl FromStr for StrategyStatus {
    type Err = Box<dyn std::error::Error + Send + Sync>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(StrategyStatus::Pending),
            "EXECUTED" => Ok(StrategyStatus::Executed),
            other => Err(format!("invalid strategy status: {}", other).into()),
        }
    }
}

/// A user-submitted conditional order with encrypted trigger bounds.
///
/// Confidential fields are write-once at creation; the scheduler reads them
/// but never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: Uuid,
    pub user_id: String,
    pub strategy_type: String,
    pub asset_in: String,
    pub asset_out: String,
    pub amount: f64,
    /// Optional override of which price series gates this strategy
    pub price_feed_id: Option<String>,
    pub recipient_address: String,

    // Confidential condition material (opaque to the scheduler)
    pub server_key: String,
    pub encrypted_client_key: String,
    pub encrypted_upper_bound: String,
    pub encrypted_lower_bound: String,
    /// Opaque proof payload, consumed only by the private execution path
    pub zkp_data: Option<String>,

    pub status: StrategyStatus,
    pub tx_hash: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,

    /// Privacy-pool bookkeeping, opaque to this service
    pub utxo_commitments: Option<String>,
    pub is_private: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Strategy {
    /// The price feed that gates this strategy: explicit override first,
    /// then the canonical feed for `asset_in`.
    pub fn feed_id(&self) -> Option<&str> {
        self.price_feed_id
            .as_deref()
            .or_else(|| feed_id_for(&self.asset_in))
    }
}

/// Validation failure for a strategy creation request
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(f64),
    #[error("unknown strategy type: {0}")]
    UnknownStrategyType(String),
}

/// Strategy creation request, as accepted from the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStrategy {
    pub user_id: String,
    pub strategy_type: String,
    pub asset_in: String,
    pub asset_out: String,
    pub amount: f64,
    #[serde(default)]
    pub price_feed_id: Option<String>,
    pub recipient_address: String,
    pub server_key: String,
    pub encrypted_client_key: String,
    pub encrypted_upper_bound: String,
    pub encrypted_lower_bound: String,
    #[serde(default)]
    pub zkp_data: Option<String>,
    #[serde(default)]
    pub utxo_commitments: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

impl NewStrategy {
    /// Complete validation; a missing required field fails the whole
    /// request rather than being silently defaulted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("user_id"));
        }
        if self.strategy_type.trim().is_empty() {
            return Err(ValidationError::MissingField("strategy_type"));
        }
        if self.asset_in.trim().is_empty() {
            return Err(ValidationError::MissingField("asset_in"));
        }
        if self.asset_out.trim().is_empty() {
            return Err(ValidationError::MissingField("asset_out"));
        }
        if self.recipient_address.trim().is_empty() {
            return Err(ValidationError::MissingField("recipient_address"));
        }
        if !(self.amount > 0.0) {
            return Err(ValidationError::NonPositiveAmount(self.amount));
        }
        if !KNOWN_STRATEGY_TYPES.contains(&self.strategy_type.as_str()) {
            return Err(ValidationError::UnknownStrategyType(
                self.strategy_type.clone(),
            ));
        }
        Ok(())
    }
}

/// Canonical Pyth feed id for an asset symbol
pub fn feed_id_for(symbol: &str) -> Option<&'static str> {
    let symbol = symbol.to_uppercase();
    PYTH_PRICE_FEED_IDS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, id)| *id)
}

/// Mint address for an asset on the given network
pub fn token_mint(network: Network, symbol: &str) -> Option<&'static str> {
    let table = if network.is_production() {
        MAINNET_TOKEN_MINTS
    } else {
        DEVNET_TOKEN_MINTS
    };
    let symbol = symbol.to_uppercase();
    table.iter().find(|(s, _)| *s == symbol).map(|(_, m)| *m)
}

/// Decimal exponent for an asset symbol
pub fn token_decimals(symbol: &str) -> Option<u8> {
    let symbol = symbol.to_uppercase();
    TOKEN_DECIMALS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, d)| *d)
}

/// Convert a human-readable amount to the asset's smallest units
/// (e.g. SOL -> lamports). Returns None for non-finite, negative, or
/// overflowing amounts.
pub fn to_base_units(amount: f64, decimals: u8) -> Option<u64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let scaled = amount * 10f64.powi(decimals as i32);
    if scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled.round() as u64)
}
