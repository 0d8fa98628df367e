pub mod fear_greed;
pub mod serpapi;
pub mod upbit;

pub use fear_greed::FearGreedClient;
pub use serpapi::SerpApiClient;
pub use upbit::UpbitClient;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{
    AccountSnapshot, CandleInterval, CandleSeries, MarketPair, NewsItem, OrderBookSnapshot,
    OrderResult, SentimentSample,
};
use crate::Result;

/// Exchange account and market data access
///
/// Every call is one request. Failures come back as `BotError::MarketData`
/// and are never retried here.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn get_balances(&self) -> Result<AccountSnapshot>;

    async fn get_order_book(&self, pair: &MarketPair) -> Result<OrderBookSnapshot>;

    /// Candles oldest first. Fails with `InsufficientHistory` when the
    /// exchange returns fewer than the indicator look-back needs.
    async fn get_candles(
        &self,
        pair: &MarketPair,
        interval: CandleInterval,
        count: usize,
    ) -> Result<CandleSeries>;

    async fn get_current_price(&self, pair: &MarketPair) -> Result<f64>;

    /// Market buy spending `quote_amount` of the quote currency
    async fn place_market_buy(&self, pair: &MarketPair, quote_amount: Decimal)
        -> Result<OrderResult>;

    /// Market sell of `base_amount` of the base currency
    async fn place_market_sell(&self, pair: &MarketPair, base_amount: Decimal)
        -> Result<OrderResult>;
}

/// Daily market sentiment readings, most recent first
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    async fn get_sentiment(&self, limit: usize) -> Result<Vec<SentimentSample>>;
}

/// Headlines relevant to the traded asset, most relevant first
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn get_news(&self, query: &str) -> Result<Vec<NewsItem>>;
}
