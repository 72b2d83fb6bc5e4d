pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::models::{NewStrategy, Strategy};
use async_trait::async_trait;
use uuid::Uuid;

/// Durable record of strategies and their lifecycle state.
///
/// The scheduler is the only writer of the PENDING -> EXECUTED transition;
/// the API layer only inserts and reads. `mark_executed` must re-read the
/// row before mutating so a concurrently-touched row is never clobbered.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Persist a new PENDING strategy and return it with id and timestamps.
    async fn insert(&self, new: NewStrategy) -> crate::Result<Strategy>;

    /// Fetch a strategy by id.
    async fn get(&self, id: Uuid) -> crate::Result<Option<Strategy>>;

    /// Snapshot of all PENDING strategies, in creation order. Rows under a
    /// live dispatch claim are excluded until their lease expires.
    async fn list_pending(&self) -> crate::Result<Vec<Strategy>>;

    /// Claim a PENDING strategy ahead of dispatch.
    ///
    /// The claim is a lease: it expires `lease_secs` after it is taken, and
    /// while live it keeps the row out of `list_pending`. A claimant may
    /// renew its own claim. Returns false if the row is missing, already
    /// EXECUTED, or held by another live claimant.
    async fn claim(&self, id: Uuid, claimant: &str, lease_secs: i64) -> crate::Result<bool>;

    /// Release a claim that did not end in a commit, re-admitting the row
    /// to the next pending snapshot. Only the holder can release.
    async fn release_claim(&self, id: Uuid, claimant: &str) -> crate::Result<()>;

    /// All strategies owned by a user, newest first.
    async fn list_for_user(&self, user_id: &str) -> crate::Result<Vec<Strategy>>;

    /// Transition a strategy to EXECUTED with its transaction signature.
    ///
    /// Returns true if this call performed the transition; false if the row
    /// is missing or was already EXECUTED (the existing signature wins).
    async fn mark_executed(&self, id: Uuid, tx_hash: &str) -> crate::Result<bool>;
}
