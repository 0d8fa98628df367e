use rust_decimal::Decimal;

use crate::api::ExchangeGateway;
use crate::error::BotError;
use crate::models::{Action, Decision, MarketPair, OrderResult};
use crate::Result;

/// Smallest order the exchange accepts, in quote currency
pub const DEFAULT_MIN_ORDER_NOTIONAL: i64 = 5000;
/// Share of the quote balance held back for the taker fee, in basis points
pub const DEFAULT_BUY_FEE_RESERVE_BPS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Bought(OrderResult),
    Sold(OrderResult),
    Held,
}

/// Turns an oracle decision into at most one market order
pub struct Executor {
    pair: MarketPair,
    min_order_notional: Decimal,
    /// Fraction of the quote balance actually spent on a buy
    spend_ratio: Decimal,
}

impl Executor {
    pub fn new(pair: MarketPair) -> Self {
        Self::with_limits(
            pair,
            Decimal::from(DEFAULT_MIN_ORDER_NOTIONAL),
            DEFAULT_BUY_FEE_RESERVE_BPS,
        )
    }

    pub fn with_limits(pair: MarketPair, min_order_notional: Decimal, fee_reserve_bps: u32) -> Self {
        // 5 bps -> 0.9995
        let spend_ratio = Decimal::ONE - Decimal::new(i64::from(fee_reserve_bps), 4);
        Self {
            pair,
            min_order_notional,
            spend_ratio,
        }
    }

    /// Act on `decision`. Hold never touches the gateway.
    pub async fn execute(
        &self,
        decision: &Decision,
        gateway: &dyn ExchangeGateway,
    ) -> Result<ExecutionOutcome> {
        match decision.action {
            Action::Buy => self.buy(gateway).await.map(ExecutionOutcome::Bought),
            Action::Sell => self.sell(gateway).await.map(ExecutionOutcome::Sold),
            Action::Hold => {
                tracing::info!("⏸️  Holding {}: {}", self.pair, decision.reason);
                Ok(ExecutionOutcome::Held)
            }
        }
    }

    async fn buy(&self, gateway: &dyn ExchangeGateway) -> Result<OrderResult> {
        let available = gateway.get_balances().await?.available(&self.pair.quote);

        if available <= self.min_order_notional {
            return Err(BotError::InsufficientFunds {
                currency: self.pair.quote.clone(),
                available,
                required: self.min_order_notional,
            });
        }

        let amount = self.buy_amount(available);
        tracing::info!("🟢 Market buy {} for {} {}", self.pair, amount, self.pair.quote);

        let order = gateway.place_market_buy(&self.pair, amount).await?;
        tracing::info!("Buy order accepted: {} ({})", order.uuid, order.state);
        Ok(order)
    }

    async fn sell(&self, gateway: &dyn ExchangeGateway) -> Result<OrderResult> {
        // An unreadable balance counts as no position
        let held = match gateway.get_balances().await {
            Ok(snapshot) => snapshot.available(&self.pair.base),
            Err(e) => {
                tracing::warn!("Could not read {} balance: {}", self.pair.base, e);
                Decimal::ZERO
            }
        };

        if held <= Decimal::ZERO {
            return Err(BotError::NoPosition {
                currency: self.pair.base.clone(),
            });
        }

        let price = gateway.get_current_price(&self.pair).await?;
        let price = Decimal::try_from(price)
            .map_err(|e| BotError::market_data("get_current_price", e))?;
        let notional = held * price;

        if notional <= self.min_order_notional {
            return Err(BotError::InsufficientFunds {
                currency: self.pair.base.clone(),
                available: notional,
                required: self.min_order_notional,
            });
        }

        tracing::info!(
            "🔴 Market sell {} {} (~{} {})",
            held,
            self.pair.base,
            notional.round_dp(0),
            self.pair.quote
        );

        let order = gateway.place_market_sell(&self.pair, held).await?;
        tracing::info!("Sell order accepted: {} ({})", order.uuid, order.state);
        Ok(order)
    }

    fn buy_amount(&self, available: Decimal) -> Decimal {
        available * self.spend_ratio
    }
}
