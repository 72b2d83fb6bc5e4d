use crate::models::Network;
use std::collections::HashMap;

/// Runtime configuration, built once at startup from the environment and
/// passed by reference into the scheduler and dispatcher.
#[derive(Debug, Clone)]
pub struct Config {
    /// Scheduler polling interval in seconds
    pub check_interval_secs: u64,
    /// Target Solana network
    pub network: Network,
    /// Resolved RPC endpoint
    pub rpc_url: String,
    /// Base58-encoded ed25519 seed for the executor/reserve account
    pub executor_key: Option<String>,
    /// FHE condition-evaluator endpoint
    pub fhe_engine_url: String,
    /// Pyth Hermes price oracle base URL
    pub pyth_hermes_url: String,
    /// Jupiter swap aggregator base URL
    pub jupiter_api_url: String,
    /// Privacy-pool relayer base URL
    pub relayer_url: String,
    /// Range compliance API base URL
    pub range_api_url: String,
    /// Range API key; screening is skipped when unset
    pub range_api_key: Option<String>,
    /// Block addresses with risk score above this
    pub range_risk_threshold: u32,
    /// Treat an unreachable compliance service as an allow
    pub compliance_fail_open: bool,
    /// Postgres connection URL
    pub database_url: String,
    /// Passphrase for the at-rest column codec
    pub db_encryption_key: String,
    /// Slippage tolerance for aggregator swaps, in basis points
    pub slippage_bps: u16,
    /// Reserve-owned token accounts by symbol, for synthetic swap payouts
    pub reserve_token_accounts: HashMap<String, String>,
}

impl Config {
    /// Build configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> crate::Result<Self> {
        let network = env_or("SOLANA_NETWORK", "devnet").parse::<Network>()?;

        Ok(Self {
            check_interval_secs: env_or("CHECK_INTERVAL_SECONDS", "10").parse()?,
            rpc_url: resolve_rpc_url(network),
            network,
            executor_key: std::env::var("EXECUTOR_PRIVATE_KEY").ok(),
            fhe_engine_url: env_or("FHE_ENGINE_URL", "http://localhost:5001/evaluateStrategy"),
            pyth_hermes_url: env_or("PYTH_HERMES_URL", "https://hermes.pyth.network"),
            jupiter_api_url: env_or("JUPITER_API_URL", "https://api.jup.ag/swap/v1"),
            relayer_url: env_or("RELAYER_URL", "http://localhost:4000"),
            range_api_url: env_or("RANGE_API_URL", "https://api.range.org/v1"),
            range_api_key: std::env::var("RANGE_API_KEY").ok(),
            range_risk_threshold: env_or("RANGE_RISK_THRESHOLD", "70").parse()?,
            compliance_fail_open: env_or("COMPLIANCE_FAIL_OPEN", "true").parse()?,
            database_url: env_or("DATABASE_URL", "postgres://localhost/strategies"),
            db_encryption_key: env_or("DB_ENCRYPTION_KEY", "dev-only-key"),
            slippage_bps: env_or("SLIPPAGE_BPS", "50").parse()?,
            reserve_token_accounts: parse_token_accounts(&env_or(
                "RESERVE_TOKEN_ACCOUNTS",
                "",
            ))?,
        })
    }
}

/// Parse `SYMBOL=pubkey,SYMBOL=pubkey` pairs.
fn parse_token_accounts(raw: &str) -> crate::Result<HashMap<String, String>> {
    let mut accounts = HashMap::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let (symbol, pubkey) = entry
            .split_once('=')
            .ok_or_else(|| format!("malformed RESERVE_TOKEN_ACCOUNTS entry: {}", entry))?;
        accounts.insert(
            symbol.trim().to_uppercase(),
            pubkey.trim().to_string(),
        );
    }
    Ok(accounts)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Pick the best available RPC endpoint.
///
/// Priority: Helius (keyed) > explicit SOLANA_RPC_URL > public devnet.
fn resolve_rpc_url(network: Network) -> String {
    if let Ok(api_key) = std::env::var("HELIUS_API_KEY") {
        let subdomain = match network {
            Network::MainnetBeta => "mainnet",
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
        };
        return format!("https://{}.helius-rpc.com/?api-key={}", subdomain, api_key);
    }

    if let Ok(custom) = std::env::var("SOLANA_RPC_URL") {
        return custom;
    }

    // Public endpoint, rate limited
    "https://api.devnet.solana.com".to_string()
}
