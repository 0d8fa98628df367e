// Decision context assembly: market data, indicators, sentiment, news, chart
pub mod chart;

pub use chart::{ChartRenderer, HeadlessBrowserRenderer};

use crate::api::{ExchangeGateway, NewsProvider, SentimentProvider};
use crate::indicators::compute_indicators;
use crate::models::{CandleInterval, DecisionRequest, MarketPair, NewsItem, SentimentSample};
use crate::Result;

pub const DEFAULT_CANDLE_COUNT: usize = 60;
pub const DEFAULT_SENTIMENT_LIMIT: usize = 30;
pub const DEFAULT_NEWS_QUERY: &str = "bitcoin OR cryptocurrency";

/// Gathers everything the oracle needs for one cycle
///
/// Exchange data (balances, order book, candles) is mandatory; any failure
/// there aborts the cycle. Sentiment, news and the chart are best effort.
pub struct ContextAggregator {
    pair: MarketPair,
    candle_count: usize,
    sentiment_limit: usize,
    news_query: String,
    sentiment: Box<dyn SentimentProvider>,
    news: Option<Box<dyn NewsProvider>>,
    chart: Option<Box<dyn ChartRenderer>>,
}

impl ContextAggregator {
    pub fn new(pair: MarketPair, sentiment: Box<dyn SentimentProvider>) -> Self {
        Self {
            pair,
            candle_count: DEFAULT_CANDLE_COUNT,
            sentiment_limit: DEFAULT_SENTIMENT_LIMIT,
            news_query: DEFAULT_NEWS_QUERY.to_string(),
            sentiment,
            news: None,
            chart: None,
        }
    }

    pub fn with_news(mut self, news: Box<dyn NewsProvider>, query: impl Into<String>) -> Self {
        self.news = Some(news);
        self.news_query = query.into();
        self
    }

    pub fn with_chart(mut self, chart: Box<dyn ChartRenderer>) -> Self {
        self.chart = Some(chart);
        self
    }

    pub fn with_candle_count(mut self, count: usize) -> Self {
        self.candle_count = count;
        self
    }

    pub fn with_sentiment_limit(mut self, limit: usize) -> Self {
        self.sentiment_limit = limit;
        self
    }

    pub fn pair(&self) -> &MarketPair {
        &self.pair
    }

    /// Fetch and derive a fresh [`DecisionRequest`]
    pub async fn build_context(&self, gateway: &dyn ExchangeGateway) -> Result<DecisionRequest> {
        let balances = gateway.get_balances().await?.for_pair(&self.pair);
        let orderbook = gateway.get_order_book(&self.pair).await?;

        let daily_candles = gateway
            .get_candles(&self.pair, CandleInterval::Day, self.candle_count)
            .await?;
        let hourly_candles = gateway
            .get_candles(&self.pair, CandleInterval::Minute60, self.candle_count)
            .await?;

        let daily = compute_indicators(&daily_candles)?;
        let hourly = compute_indicators(&hourly_candles)?;

        tracing::info!(
            "📊 {} context: {} daily rows, {} hourly rows",
            self.pair,
            daily.len(),
            hourly.len()
        );

        let sentiment = self.collect_sentiment().await;
        let news = self.collect_news().await;
        let chart = self.collect_chart().await;

        Ok(DecisionRequest {
            market: self.pair.clone(),
            balances,
            orderbook,
            daily,
            hourly,
            sentiment,
            news,
            chart,
        })
    }

    async fn collect_sentiment(&self) -> Vec<SentimentSample> {
        match self.sentiment.get_sentiment(self.sentiment_limit).await {
            Ok(samples) => {
                tracing::debug!("Fetched {} sentiment samples", samples.len());
                samples
            }
            Err(e) => {
                tracing::warn!(stage = "sentiment", "{} - continuing without sentiment", e);
                Vec::new()
            }
        }
    }

    async fn collect_news(&self) -> Vec<NewsItem> {
        let Some(news) = &self.news else {
            tracing::info!(stage = "news", "No news provider configured (SERPAPI_API_KEY unset), skipping news");
            return Vec::new();
        };

        match news.get_news(&self.news_query).await {
            Ok(items) => {
                tracing::debug!("Fetched {} headlines", items.len());
                items
            }
            Err(e) => {
                tracing::warn!(stage = "news", "{} - continuing without news", e);
                Vec::new()
            }
        }
    }

    async fn collect_chart(&self) -> Option<crate::models::ChartImage> {
        let renderer = self.chart.as_ref()?;

        match renderer.render_chart(&self.pair).await {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!(stage = "chart", "{} - continuing without chart image", e);
                None
            }
        }
    }
}
