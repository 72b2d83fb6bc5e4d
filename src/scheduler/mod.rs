use crate::db::StrategyStore;
use crate::models::{self, Strategy, PRIMARY_ASSET};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Dispatch claim lease. Long enough to outlive any single execution
/// attempt (the slowest external call is bounded at 60s); a row whose
/// commit failed after submission stays hidden from the sweep this long.
const CLAIM_LEASE_SECS: i64 = 120;

/// Batched price lookup for one scheduler cycle.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Prices keyed by feed id, for every feed the source knows. Unknown
    /// feeds are simply absent from the map.
    async fn fetch(&self, feed_ids: &[String]) -> Result<HashMap<String, f64>>;
}

/// Decides whether a strategy's (encrypted) condition holds at a price.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn is_met(&self, strategy: &Strategy, current_price: f64) -> Result<bool>;
}

/// Executes a triggered strategy.
///
/// `Ok(Some(signature))` means the trade landed; `Ok(None)` means the
/// strategy cannot be executed as written (bad recipient, compliance
/// denial) and should stay PENDING without being treated as an outage;
/// `Err` is a transient failure worth retrying next cycle.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    async fn execute(&self, strategy: &Strategy, current_price: f64) -> Result<Option<String>>;
}

/// The polling loop at the heart of the service.
///
/// Every tick it snapshots PENDING strategies, fetches all needed prices in
/// one batch, asks the evaluator about each strategy, and hands triggered
/// ones to the executor. One bad strategy never takes down the batch.
pub struct Scheduler {
    store: Arc<dyn StrategyStore>,
    prices: Arc<dyn PriceSource>,
    evaluator: Arc<dyn ConditionEvaluator>,
    executor: Arc<dyn StrategyExecutor>,
    interval: Duration,
    claimant: String,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn StrategyStore>,
        prices: Arc<dyn PriceSource>,
        evaluator: Arc<dyn ConditionEvaluator>,
        executor: Arc<dyn StrategyExecutor>,
        interval_secs: u64,
    ) -> Self {
        Self {
            store,
            prices,
            evaluator,
            executor,
            interval: Duration::from_secs(interval_secs),
            claimant: format!("scheduler-{}", Uuid::new_v4()),
        }
    }

    /// Run forever. Cycle errors are logged, never fatal.
    pub async fn run(&self) {
        tracing::info!("Scheduler started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                tracing::error!("Scheduler cycle failed: {}", e);
            }
        }
    }

    /// One full sweep of the PENDING set.
    pub async fn run_cycle(&self) -> Result<()> {
        let pending = self.store.list_pending().await?;
        if pending.is_empty() {
            tracing::debug!("No pending strategies");
            return Ok(());
        }
        tracing::debug!("Checking {} pending strategies", pending.len());

        let feed_ids = collect_feed_ids(&pending);
        let prices = self.prices.fetch(&feed_ids).await?;

        // Without the primary price there is no fallback for strategies
        // whose own feed came back empty, so skip the whole cycle.
        let primary_feed = models::feed_id_for(PRIMARY_ASSET)
            .ok_or("primary asset has no feed id")?;
        let primary_price = match prices.get(primary_feed) {
            Some(p) => *p,
            None => {
                tracing::warn!(
                    "Primary {} price unavailable, skipping cycle",
                    PRIMARY_ASSET
                );
                return Ok(());
            }
        };

        for strategy in &pending {
            if let Err(e) = self.process_one(strategy, &prices, primary_price).await {
                tracing::error!("Error processing strategy {}: {}", strategy.id, e);
            }
        }

        Ok(())
    }

    async fn process_one(
        &self,
        strategy: &Strategy,
        prices: &HashMap<String, f64>,
        primary_price: f64,
    ) -> Result<()> {
        let price = strategy
            .feed_id()
            .and_then(|feed| prices.get(feed))
            .copied()
            .unwrap_or(primary_price);

        let triggered = match self.evaluator.is_met(strategy, price).await {
            Ok(t) => t,
            Err(e) => {
                // Evaluation failure means "not triggered this cycle"
                tracing::warn!("Evaluation failed for strategy {}: {}", strategy.id, e);
                return Ok(());
            }
        };

        if !triggered {
            return Ok(());
        }
        tracing::info!(
            "Strategy {} triggered at price {:.4}",
            strategy.id,
            price
        );

        // Claim before dispatch. If the process dies between on-chain
        // submission and the status commit, the lease keeps later sweeps
        // from double-executing until it expires.
        if !self
            .store
            .claim(strategy.id, &self.claimant, CLAIM_LEASE_SECS)
            .await?
        {
            tracing::warn!("Strategy {} is claimed elsewhere, skipping", strategy.id);
            return Ok(());
        }

        match self.executor.execute(strategy, price).await {
            Ok(Some(signature)) => {
                if self.store.mark_executed(strategy.id, &signature).await? {
                    tracing::info!("Strategy {} executed: {}", strategy.id, signature);
                } else {
                    tracing::warn!(
                        "Strategy {} already executed, dropping signature {}",
                        strategy.id,
                        signature
                    );
                }
            }
            Ok(None) => {
                // Nothing landed on chain; re-admit the row immediately
                self.store
                    .release_claim(strategy.id, &self.claimant)
                    .await?;
                tracing::warn!(
                    "Strategy {} triggered but was not executable, leaving PENDING",
                    strategy.id
                );
            }
            Err(e) => {
                self.store
                    .release_claim(strategy.id, &self.claimant)
                    .await?;
                return Err(e);
            }
        }

        Ok(())
    }
}

/// Deduplicated feed set for one cycle: the primary asset's feed plus each
/// strategy's own.
fn collect_feed_ids(pending: &[Strategy]) -> Vec<String> {
    let mut feed_ids: Vec<String> = Vec::new();
    if let Some(primary) = models::feed_id_for(PRIMARY_ASSET) {
        feed_ids.push(primary.to_string());
    }
    for strategy in pending {
        if let Some(feed) = strategy.feed_id() {
            if !feed_ids.iter().any(|f| f == feed) {
                feed_ids.push(feed.to_string());
            }
        }
    }
    feed_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{feed_id_for, StrategyStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn strategy(asset_in: &str, feed_override: Option<&str>) -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            user_id: "u".to_string(),
            strategy_type: "LIMIT_ORDER".to_string(),
            asset_in: asset_in.to_string(),
            asset_out: "USDC".to_string(),
            amount: 1.0,
            price_feed_id: feed_override.map(str::to_string),
            recipient_address: "r".to_string(),
            server_key: String::new(),
            encrypted_client_key: String::new(),
            encrypted_upper_bound: String::new(),
            encrypted_lower_bound: String::new(),
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

    #[test]
    fn test_feed_set_always_contains_primary() {
        let feeds = collect_feed_ids(&[]);
        assert_eq!(feeds, vec![feed_id_for("SOL").unwrap().to_string()]);
    }

    #[test]
    fn test_feed_set_dedupes() {
        let pending = vec![
            strategy("SOL", None),
            strategy("ETH", None),
            strategy("ETH", None),
            strategy("SOL", Some("0xcustom")),
        ];
        let feeds = collect_feed_ids(&pending);
        assert_eq!(
            feeds,
            vec![
                feed_id_for("SOL").unwrap().to_string(),
                feed_id_for("ETH").unwrap().to_string(),
                "0xcustom".to_string(),
            ]
        );
    }

    #[test]
    fn test_unknown_asset_contributes_no_feed() {
        let pending = vec![strategy("DOGE", None)];
        let feeds = collect_feed_ids(&pending);
        assert_eq!(feeds.len(), 1);
    }
}
