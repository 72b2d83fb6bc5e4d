use strategy_executor::api::{FheClient, JupiterClient, PythClient, RangeClient, RelayerClient};
use strategy_executor::chain::{Ledger, SolanaClient};
use strategy_executor::db::PostgresStore;
use strategy_executor::execution::Dispatcher;
use strategy_executor::scheduler::Scheduler;
use strategy_executor::{Config, Result};

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let config = Config::from_env()?;
    tracing::info!("🚀 Strategy executor starting");
    tracing::info!("  Network: {}", config.network.as_str());
    tracing::info!("  RPC: {}", config.rpc_url);
    tracing::info!("  Check interval: {}s", config.check_interval_secs);
    tracing::info!(
        "  Compliance: {} (fail-{})",
        if config.range_api_key.is_some() {
            "enabled"
        } else {
            "disabled, no API key"
        },
        if config.compliance_fail_open {
            "open"
        } else {
            "closed"
        }
    );

    let executor_key = config
        .executor_key
        .as_deref()
        .ok_or("EXECUTOR_PRIVATE_KEY not found in environment")?;

    let store = Arc::new(PostgresStore::new(&config.database_url, &config.db_encryption_key).await?);
    tracing::info!("✅ Database connected and migrated");

    let ledger = Arc::new(SolanaClient::new(&config.rpc_url, executor_key)?);
    tracing::info!("  Executor account: {}", ledger.signer_pubkey());

    let dispatcher = Dispatcher::new(
        ledger,
        JupiterClient::new(&config.jupiter_api_url)?,
        RangeClient::new(
            &config.range_api_url,
            config.range_api_key.clone(),
            config.range_risk_threshold,
            config.compliance_fail_open,
        )?,
        RelayerClient::new(&config.relayer_url)?,
        config.network,
        config.slippage_bps,
        config.reserve_token_accounts.clone(),
    );

    let scheduler = Scheduler::new(
        store,
        Arc::new(PythClient::new(&config.pyth_hermes_url)?),
        Arc::new(FheClient::new(&config.fhe_engine_url)?),
        Arc::new(dispatcher),
        config.check_interval_secs,
    );

    let scheduler_task = tokio::spawn(async move {
        scheduler.run().await;
    });

    tracing::info!("✅ Scheduler loop spawned");
    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        result = scheduler_task => {
            tracing::error!("Scheduler loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 Strategy executor stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strategy_executor=info".into()),
        )
        .init();
}
