use crate::db::StrategyStore;
use crate::models::{NewStrategy, Strategy, StrategyStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory strategy store.
///
/// Mirrors the Postgres store's semantics (creation-order pending snapshot,
/// read-then-write executed transition) for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    strategies: HashMap<Uuid, Strategy>,
    insertion_order: Vec<Uuid>,
    claims: HashMap<Uuid, Claim>,
}

struct Claim {
    claimant: String,
    until: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn insert(&self, new: NewStrategy) -> crate::Result<Strategy> {
        let now = Utc::now();
        let strategy = Strategy {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            strategy_type: new.strategy_type,
            asset_in: new.asset_in,
            asset_out: new.asset_out,
            amount: new.amount,
            price_feed_id: new.price_feed_id,
            recipient_address: new.recipient_address,
            server_key: new.server_key,
            encrypted_client_key: new.encrypted_client_key,
            encrypted_upper_bound: new.encrypted_upper_bound,
            encrypted_lower_bound: new.encrypted_lower_bound,
            zkp_data: new.zkp_data,
            status: StrategyStatus::Pending,
            tx_hash: None,
            executed_at: None,
            utxo_commitments: new.utxo_commitments,
            is_private: new.is_private,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.write().await;
        inner.insertion_order.push(strategy.id);
        inner.strategies.insert(strategy.id, strategy.clone());
        Ok(strategy)
    }

    async fn get(&self, id: Uuid) -> crate::Result<Option<Strategy>> {
        Ok(self.inner.read().await.strategies.get(&id).cloned())
    }

    async fn list_pending(&self) -> crate::Result<Vec<Strategy>> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        Ok(inner
            .insertion_order
            .iter()
            .filter_map(|id| inner.strategies.get(id))
            .filter(|s| s.status == StrategyStatus::Pending)
            .filter(|s| !inner.claims.get(&s.id).is_some_and(|c| c.until > now))
            .cloned()
            .collect())
    }

    async fn claim(&self, id: Uuid, claimant: &str, lease_secs: i64) -> crate::Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.strategies.get(&id) {
            Some(s) if s.status == StrategyStatus::Pending => {}
            _ => return Ok(false),
        }

        let now = Utc::now();
        if let Some(claim) = inner.claims.get(&id) {
            if claim.until > now && claim.claimant != claimant {
                return Ok(false);
            }
        }

        inner.claims.insert(
            id,
            Claim {
                claimant: claimant.to_string(),
                until: now + chrono::Duration::seconds(lease_secs),
            },
        );
        Ok(true)
    }

    async fn release_claim(&self, id: Uuid, claimant: &str) -> crate::Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .claims
            .get(&id)
            .is_some_and(|c| c.claimant == claimant)
        {
            inner.claims.remove(&id);
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> crate::Result<Vec<Strategy>> {
        let inner = self.inner.read().await;
        let mut strategies: Vec<Strategy> = inner
            .strategies
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        strategies.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(strategies)
    }

    async fn mark_executed(&self, id: Uuid, tx_hash: &str) -> crate::Result<bool> {
        let mut inner = self.inner.write().await;
        let strategy = match inner.strategies.get_mut(&id) {
            Some(s) => s,
            None => return Ok(false),
        };
        if strategy.status == StrategyStatus::Executed {
            return Ok(false);
        }

        strategy.status = StrategyStatus::Executed;
        strategy.tx_hash = Some(tx_hash.to_string());
        strategy.executed_at = Some(Utc::now());
        strategy.updated_at = Utc::now();
        inner.claims.remove(&id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user: &str) -> NewStrategy {
        NewStrategy {
            user_id: user.to_string(),
            strategy_type: "LIMIT_ORDER".to_string(),
            asset_in: "SOL".to_string(),
            asset_out: "SOL".to_string(),
            amount: 0.01,
            price_feed_id: None,
            recipient_address: "recipient".to_string(),
            server_key: "sk".to_string(),
            encrypted_client_key: "ck".to_string(),
            encrypted_upper_bound: "ub".to_string(),
            encrypted_lower_bound: "lb".to_string(),
            zkp_data: None,
            utxo_commitments: None,
            is_private: false,
        }
    }

    #[tokio::test]
    async fn test_insert_starts_pending() {
        let store = MemoryStore::new();
        let s = store.insert(request("u1")).await.unwrap();

        assert_eq!(s.status, StrategyStatus::Pending);
        assert!(s.tx_hash.is_none());
        assert!(s.executed_at.is_none());

        let fetched = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, s.id);
    }

    #[tokio::test]
    async fn test_list_pending_creation_order() {
        let store = MemoryStore::new();
        let a = store.insert(request("u1")).await.unwrap();
        let b = store.insert(request("u1")).await.unwrap();
        let c = store.insert(request("u2")).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(
            pending.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![a.id, b.id, c.id]
        );
    }

    #[tokio::test]
    async fn test_mark_executed_exactly_once() {
        let store = MemoryStore::new();
        let s = store.insert(request("u1")).await.unwrap();

        assert!(store.mark_executed(s.id, "sig1").await.unwrap());

        let executed = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(executed.status, StrategyStatus::Executed);
        assert_eq!(executed.tx_hash.as_deref(), Some("sig1"));
        assert!(executed.executed_at.is_some());

        // Second commit is a no-op; the first signature wins
        assert!(!store.mark_executed(s.id, "sig2").await.unwrap());
        let still = store.get(s.id).await.unwrap().unwrap();
        assert_eq!(still.tx_hash.as_deref(), Some("sig1"));

        // Executed rows leave the pending snapshot
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_executed_missing_row() {
        let store = MemoryStore::new();
        assert!(!store.mark_executed(Uuid::new_v4(), "sig").await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_hides_row_until_released() {
        let store = MemoryStore::new();
        let s = store.insert(request("u1")).await.unwrap();

        assert!(store.claim(s.id, "worker-a", 60).await.unwrap());
        assert!(store.list_pending().await.unwrap().is_empty());

        // Another claimant cannot steal a live claim; the holder can renew
        assert!(!store.claim(s.id, "worker-b", 60).await.unwrap());
        assert!(store.claim(s.id, "worker-a", 60).await.unwrap());

        store.release_claim(s.id, "worker-a").await.unwrap();
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_claim_readmits_row() {
        let store = MemoryStore::new();
        let s = store.insert(request("u1")).await.unwrap();

        // A lease in the past is expired immediately
        assert!(store.claim(s.id, "worker-a", -1).await.unwrap());
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
        assert!(store.claim(s.id, "worker-b", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_a_no_op() {
        let store = MemoryStore::new();
        let s = store.insert(request("u1")).await.unwrap();

        assert!(store.claim(s.id, "worker-a", 60).await.unwrap());
        store.release_claim(s.id, "worker-b").await.unwrap();
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_rejects_executed_and_missing_rows() {
        let store = MemoryStore::new();
        let s = store.insert(request("u1")).await.unwrap();
        store.mark_executed(s.id, "sig").await.unwrap();

        assert!(!store.claim(s.id, "worker-a", 60).await.unwrap());
        assert!(!store.claim(Uuid::new_v4(), "worker-a", 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let store = MemoryStore::new();
        store.insert(request("u1")).await.unwrap();
        store.insert(request("u2")).await.unwrap();
        store.insert(request("u1")).await.unwrap();

        assert_eq!(store.list_for_user("u1").await.unwrap().len(), 2);
        assert_eq!(store.list_for_user("u3").await.unwrap().len(), 0);
    }
}
