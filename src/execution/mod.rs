use crate::api::jupiter::JupiterClient;
use crate::api::range::RangeClient;
use crate::api::relayer::RelayerClient;
use crate::chain::{tx, Ledger};
use crate::models::{self, Network, Strategy};
use crate::scheduler::StrategyExecutor;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// How a triggered strategy gets settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionRoute {
    /// Proof-carrying withdrawal through the privacy-pool relayer
    PrivateWithdrawal,
    /// Same asset in and out; pay the recipient from the reserve
    DirectTransfer,
    /// Synthetic swap at the oracle price, for non-production networks
    MockSwap,
    /// Real swap through the aggregator
    AggregatorSwap,
}

impl ExecutionRoute {
    /// Privacy wins over everything; a same-asset pair never swaps; real
    /// swaps only exist where the aggregator has liquidity.
    pub fn select(is_private: bool, asset_in: &str, asset_out: &str, production: bool) -> Self {
        if is_private {
            ExecutionRoute::PrivateWithdrawal
        } else if asset_in.eq_ignore_ascii_case(asset_out) {
            ExecutionRoute::DirectTransfer
        } else if production {
            ExecutionRoute::AggregatorSwap
        } else {
            ExecutionRoute::MockSwap
        }
    }
}

/// Routes triggered strategies to their execution path.
///
/// Every path is gated by compliance screening first. A `None` return
/// means the strategy is unexecutable as written and stays PENDING; real
/// outages surface as errors so the scheduler retries next cycle.
pub struct Dispatcher {
    ledger: Arc<dyn Ledger>,
    jupiter: JupiterClient,
    compliance: RangeClient,
    relayer: RelayerClient,
    network: Network,
    slippage_bps: u16,
    reserve_token_accounts: HashMap<String, String>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        jupiter: JupiterClient,
        compliance: RangeClient,
        relayer: RelayerClient,
        network: Network,
        slippage_bps: u16,
        reserve_token_accounts: HashMap<String, String>,
    ) -> Self {
        Self {
            ledger,
            jupiter,
            compliance,
            relayer,
            network,
            slippage_bps,
            reserve_token_accounts,
        }
    }

    async fn private_withdrawal(&self, strategy: &Strategy) -> Result<Option<String>> {
        let raw = match strategy.zkp_data.as_deref() {
            Some(raw) => raw,
            None => {
                tracing::warn!(
                    "Private strategy {} has no proof payload, cannot execute",
                    strategy.id
                );
                return Ok(None);
            }
        };

        let proof: serde_json::Value = match serde_json::from_str(raw) {
            Ok(proof) => proof,
            Err(e) => {
                tracing::warn!("Strategy {} proof payload is malformed: {}", strategy.id, e);
                return Ok(None);
            }
        };

        let tx_hash = self
            .relayer
            .execute_private_withdrawal(strategy.id, &proof, &strategy.recipient_address)
            .await?;
        Ok(Some(tx_hash))
    }

    async fn direct_transfer(&self, strategy: &Strategy) -> Result<Option<String>> {
        if tx::decode_pubkey(&strategy.recipient_address).is_err() {
            tracing::warn!(
                "Strategy {} recipient {} is not a valid address",
                strategy.id,
                strategy.recipient_address
            );
            return Ok(None);
        }

        let symbol = strategy.asset_in.to_uppercase();
        let Some(decimals) = models::token_decimals(&symbol) else {
            tracing::warn!("Strategy {} asset {} has no decimals table entry", strategy.id, symbol);
            return Ok(None);
        };
        let units = match models::to_base_units(strategy.amount, decimals) {
            Some(units) if units > 0 => units,
            _ => {
                tracing::warn!(
                    "Strategy {} amount {} rounds to zero base units",
                    strategy.id,
                    strategy.amount
                );
                return Ok(None);
            }
        };

        let signature = if symbol == models::PRIMARY_ASSET {
            self.ledger
                .transfer_lamports(&strategy.recipient_address, units)
                .await?
        } else {
            let Some(source) = self.reserve_token_accounts.get(&symbol) else {
                tracing::warn!("No reserve token account configured for {}", symbol);
                return Ok(None);
            };
            self.ledger
                .transfer_token(source, &strategy.recipient_address, units)
                .await?
        };
        Ok(Some(signature))
    }

    /// Pay out `asset_out` from the reserve at the oracle price, as a stand-in
    /// for a real swap on networks without aggregator liquidity.
    async fn mock_swap(&self, strategy: &Strategy, price: f64) -> Result<Option<String>> {
        if tx::decode_pubkey(&strategy.recipient_address).is_err() {
            tracing::warn!(
                "Strategy {} recipient {} is not a valid address",
                strategy.id,
                strategy.recipient_address
            );
            return Ok(None);
        }

        let out_symbol = strategy.asset_out.to_uppercase();
        let Some(decimals) = models::token_decimals(&out_symbol) else {
            tracing::warn!(
                "Strategy {} output asset {} has no decimals table entry",
                strategy.id,
                out_symbol
            );
            return Ok(None);
        };

        // Oracle price is quoted for asset_in; the output amount is the
        // input notional at that price.
        let out_amount = strategy.amount * price;
        let units = match models::to_base_units(out_amount, decimals) {
            Some(units) if units > 0 => units,
            _ => {
                tracing::warn!(
                    "Strategy {} synthetic swap output {} rounds to zero",
                    strategy.id,
                    out_amount
                );
                return Ok(None);
            }
        };

        let signature = if out_symbol == models::PRIMARY_ASSET {
            self.ledger
                .transfer_lamports(&strategy.recipient_address, units)
                .await?
        } else {
            let Some(source) = self.reserve_token_accounts.get(&out_symbol) else {
                tracing::warn!("No reserve token account configured for {}", out_symbol);
                return Ok(None);
            };
            self.ledger
                .transfer_token(source, &strategy.recipient_address, units)
                .await?
        };
        Ok(Some(signature))
    }

    async fn aggregator_swap(&self, strategy: &Strategy) -> Result<Option<String>> {
        if tx::decode_pubkey(&strategy.recipient_address).is_err() {
            tracing::warn!(
                "Strategy {} recipient {} is not a valid address",
                strategy.id,
                strategy.recipient_address
            );
            return Ok(None);
        }

        let in_symbol = strategy.asset_in.to_uppercase();
        let out_symbol = strategy.asset_out.to_uppercase();

        let (Some(input_mint), Some(output_mint)) = (
            models::token_mint(self.network, &in_symbol),
            models::token_mint(self.network, &out_symbol),
        ) else {
            tracing::warn!(
                "Strategy {} pair {}/{} has no mint mapping on {}",
                strategy.id,
                in_symbol,
                out_symbol,
                self.network.as_str()
            );
            return Ok(None);
        };
        let Some(decimals) = models::token_decimals(&in_symbol) else {
            tracing::warn!("Strategy {} asset {} has no decimals table entry", strategy.id, in_symbol);
            return Ok(None);
        };
        let amount = match models::to_base_units(strategy.amount, decimals) {
            Some(units) if units > 0 => units,
            _ => {
                tracing::warn!(
                    "Strategy {} amount {} rounds to zero base units",
                    strategy.id,
                    strategy.amount
                );
                return Ok(None);
            }
        };

        let quote = self
            .jupiter
            .get_quote(input_mint, output_mint, amount, self.slippage_bps)
            .await?;
        tracing::info!(
            "Strategy {} quote: {} -> {} (impact {}%)",
            strategy.id,
            quote.in_amount,
            quote.out_amount,
            quote.price_impact_pct
        );

        // The executor signs and pays fees; the swap output itself goes to
        // the recipient's token account, not back to the reserve.
        let tx_base64 = self
            .jupiter
            .build_swap(
                &quote,
                &self.ledger.signer_pubkey(),
                Some(&strategy.recipient_address),
            )
            .await?;
        let signature = self.ledger.send_swap_transaction(&tx_base64).await?;
        Ok(Some(signature))
    }
}

#[async_trait]
impl StrategyExecutor for Dispatcher {
    async fn execute(&self, strategy: &Strategy, price: f64) -> Result<Option<String>> {
        let decision = self.compliance.check_address(&strategy.recipient_address).await;
        if !decision.allowed {
            tracing::warn!(
                "Strategy {} blocked by compliance: {}",
                strategy.id,
                decision.reason
            );
            return Ok(None);
        }
        tracing::debug!("Compliance for strategy {}: {}", strategy.id, decision.reason);

        let route = ExecutionRoute::select(
            strategy.is_private,
            &strategy.asset_in,
            &strategy.asset_out,
            self.network.is_production(),
        );
        tracing::info!("Executing strategy {} via {:?}", strategy.id, route);

        match route {
            ExecutionRoute::PrivateWithdrawal => self.private_withdrawal(strategy).await,
            ExecutionRoute::DirectTransfer => self.direct_transfer(strategy).await,
            ExecutionRoute::MockSwap => self.mock_swap(strategy, price).await,
            ExecutionRoute::AggregatorSwap => self.aggregator_swap(strategy).await,
        }
    }
}
