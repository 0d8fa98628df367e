use anyhow::Context;
use autotrade::api::{FearGreedClient, SerpApiClient, UpbitClient};
use autotrade::config::{Credentials, Settings};
use autotrade::context::{ContextAggregator, HeadlessBrowserRenderer};
use autotrade::execution::Executor;
use autotrade::oracle::{FewShotAssets, GeminiOracle};
use autotrade::TradingLoop;
use rust_decimal::Decimal;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    tracing::info!("🚀 AutoTrade starting");

    let settings = Settings::load().context("failed to load settings")?;
    let credentials = Credentials::from_env().context("missing credentials")?;
    let pair = settings.market()?;

    tracing::info!(
        "Market {} | model {} | chart {}",
        pair,
        settings.oracle.model,
        if settings.chart.enabled { "on" } else { "off" }
    );

    let trading_loop = build_loop(&settings, credentials)?;
    trading_loop.run().await;

    tracing::info!("👋 AutoTrade stopped");
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autotrade=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_loop(settings: &Settings, credentials: Credentials) -> anyhow::Result<TradingLoop> {
    let pair = settings.market()?;

    let gateway = UpbitClient::new(
        credentials.upbit_access_key,
        credentials.upbit_secret_key,
        settings.exchange.base_url.as_str(),
        Duration::from_secs(settings.exchange.timeout_secs),
    )?;

    let sentiment = FearGreedClient::new(
        settings.sentiment.base_url.as_str(),
        Duration::from_secs(settings.exchange.timeout_secs),
    )?;

    let mut aggregator = ContextAggregator::new(pair.clone(), Box::new(sentiment))
        .with_candle_count(settings.trading.candle_count)
        .with_sentiment_limit(settings.sentiment.limit);

    match credentials.serpapi_api_key {
        Some(key) => {
            let news = SerpApiClient::new(
                key,
                settings.news.base_url.as_str(),
                Duration::from_secs(settings.exchange.timeout_secs),
            )?
            .with_locale(settings.news.gl.as_str(), settings.news.hl.as_str())
            .with_limit(settings.news.limit);
            aggregator = aggregator.with_news(Box::new(news), settings.news.query.as_str());
        }
        None => tracing::warn!("SERPAPI_API_KEY not set - news headlines disabled"),
    }

    if settings.chart.enabled {
        let renderer = HeadlessBrowserRenderer::new(
            settings.chart.browser.as_str(),
            settings.chart.url_template.as_str(),
        )
        .with_window(settings.chart.width, settings.chart.height)
        .with_timeout(Duration::from_secs(settings.chart.timeout_secs));
        aggregator = aggregator.with_chart(Box::new(renderer));
    }

    if credentials.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set - every cycle will end without a decision");
    }

    let oracle = GeminiOracle::new(
        credentials.gemini_api_key,
        settings.oracle.base_url.as_str(),
        settings.oracle.model.as_str(),
        Duration::from_secs(settings.oracle.timeout_secs),
        FewShotAssets::builtin()?,
    )?
    .with_streaming(settings.oracle.stream)
    .with_thinking_budget(settings.oracle.thinking_budget);

    let executor = Executor::with_limits(
        pair,
        Decimal::from(settings.trading.min_order_notional),
        settings.trading.buy_fee_reserve_bps,
    );

    Ok(TradingLoop::new(
        Box::new(gateway),
        aggregator,
        Box::new(oracle),
        executor,
        Duration::from_secs(settings.trading.cycle_interval_secs),
    ))
}
