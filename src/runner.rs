use std::time::Duration;

use crate::api::ExchangeGateway;
use crate::context::ContextAggregator;
use crate::error::BotError;
use crate::execution::{ExecutionOutcome, Executor};
use crate::models::Decision;
use crate::oracle::DecisionOracle;

/// How a single cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// Context could not be built; nothing was asked or traded
    Aborted(BotError),
    /// The oracle gave no usable answer; nothing was traded
    NoDecision(BotError),
    /// A decision was acted on (or the attempt failed)
    Executed {
        decision: Decision,
        result: Result<ExecutionOutcome, BotError>,
    },
}

/// Drives context -> decision -> execution, one cycle at a time
pub struct TradingLoop {
    gateway: Box<dyn ExchangeGateway>,
    aggregator: ContextAggregator,
    oracle: Box<dyn DecisionOracle>,
    executor: Executor,
    interval: Duration,
}

impl TradingLoop {
    pub fn new(
        gateway: Box<dyn ExchangeGateway>,
        aggregator: ContextAggregator,
        oracle: Box<dyn DecisionOracle>,
        executor: Executor,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            aggregator,
            oracle,
            executor,
            interval,
        }
    }

    /// Run one cycle. Never returns an error: every failure is logged with
    /// the stage it happened in and folded into the outcome.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let pair = self.aggregator.pair().clone();

        let request = match self.aggregator.build_context(self.gateway.as_ref()).await {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(stage = "context", "❌ {}: {} - aborting cycle", pair, e);
                return CycleOutcome::Aborted(e);
            }
        };

        let decision = match self.oracle.decide(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(stage = "decision", "⚠️  {}: {} - no trade this cycle", pair, e);
                return CycleOutcome::NoDecision(e);
            }
        };

        tracing::info!("🤖 {} decision: {} ({})", pair, decision.action, decision.reason);

        let result = self.executor.execute(&decision, self.gateway.as_ref()).await;
        match &result {
            Ok(ExecutionOutcome::Bought(order)) | Ok(ExecutionOutcome::Sold(order)) => {
                tracing::info!("✅ {} {} order {} placed", pair, order.side, order.uuid);
            }
            Ok(ExecutionOutcome::Held) => {}
            Err(e @ BotError::InsufficientFunds { .. }) | Err(e @ BotError::NoPosition { .. }) => {
                tracing::info!(stage = "execution", "{}: {} - skipping order", pair, e);
            }
            Err(e) => {
                tracing::error!(stage = "execution", "❌ {}: {} - order not placed", pair, e);
            }
        }

        CycleOutcome::Executed { decision, result }
    }

    /// Cycle until Ctrl+C, pausing `interval` after each one
    pub async fn run(&self) {
        tracing::info!(
            "🔁 Trading {} every {}s (Ctrl+C to stop)",
            self.aggregator.pair(),
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
                    break;
                }
                _ = self.cycle_then_wait() => {}
            }
        }
    }

    async fn cycle_then_wait(&self) {
        self.run_cycle().await;
        tokio::time::sleep(self.interval).await;
    }
}
