use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure the trading loop knows how to classify.
///
/// Only `Configuration` is fatal. Everything else is caught at the cycle
/// boundary, logged, and the loop moves on to its next tick.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("market data error ({operation}): {source}")]
    MarketData {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("insufficient history: need {required} periods, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("decision oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("malformed decision: {0}")]
    MalformedDecision(String),

    #[error("insufficient {currency}: available {available}, need more than {required}")]
    InsufficientFunds {
        currency: String,
        available: Decimal,
        required: Decimal,
    },

    #[error("no {currency} position to sell")]
    NoPosition { currency: String },

    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("chart render failed: {0}")]
    ChartRender(String),
}

impl BotError {
    /// Wrap any lower-level failure as a market data error for `operation`
    pub fn market_data<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        BotError::MarketData {
            operation,
            source: source.into(),
        }
    }

    pub fn provider(provider: &'static str, reason: impl ToString) -> Self {
        BotError::ProviderUnavailable {
            provider,
            reason: reason.to_string(),
        }
    }

    /// Whether the process must stop. Nothing past startup is.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Configuration(_))
    }
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Configuration(err.to_string())
    }
}
