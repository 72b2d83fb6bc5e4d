// Distributed ledger access
pub mod solana;
pub mod tx;

pub use solana::SolanaClient;

use async_trait::async_trait;

/// Port over the target ledger.
///
/// One implementation per ledger family; the dispatcher only ever talks to
/// this trait so execution paths stay testable without a live chain.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Base58 public key of the executor/reserve signer
    fn signer_pubkey(&self) -> String;

    /// Move native lamports from the reserve to a recipient
    async fn transfer_lamports(&self, recipient: &str, lamports: u64) -> crate::Result<String>;

    /// Move SPL token base units between token accounts, signed by the reserve
    async fn transfer_token(
        &self,
        source_token_account: &str,
        dest_token_account: &str,
        base_units: u64,
    ) -> crate::Result<String>;

    /// Countersign an aggregator-built transaction and submit it
    async fn send_swap_transaction(&self, tx_base64: &str) -> crate::Result<String>;
}
