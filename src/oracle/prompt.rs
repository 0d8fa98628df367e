use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::models::{DecisionRequest, MarketPair};
use crate::Result;

const BUILTIN_FEW_SHOT: &str = include_str!("../../assets/few_shot.json");

/// Static prompt material: instruction, request header, worked examples
#[derive(Debug, Clone, Deserialize)]
pub struct FewShotAssets {
    pub system_instruction: String,
    pub request_preamble: String,
    pub examples: Vec<FewShotExample>,
}

/// One demonstration exchange; `response` is the exact JSON the model
/// is expected to answer with
#[derive(Debug, Clone, Deserialize)]
pub struct FewShotExample {
    pub request: String,
    pub reasoning: String,
    pub response: String,
}

impl FewShotAssets {
    /// Assets compiled into the binary from `assets/few_shot.json`
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_FEW_SHOT)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let assets: FewShotAssets = serde_json::from_str(raw)
            .map_err(|e| BotError::Configuration(format!("invalid few-shot assets: {}", e)))?;

        // Examples must demonstrate the exact answer schema
        for (i, example) in assets.examples.iter().enumerate() {
            super::parse_decision(&example.response).map_err(|e| {
                BotError::Configuration(format!("few-shot example {} has a bad response: {}", i, e))
            })?;
        }

        Ok(assets)
    }

    pub fn preamble_for(&self, market: &MarketPair) -> String {
        self.request_preamble.replace("{market}", &market.to_string())
    }
}

#[derive(Serialize)]
struct SentimentRow<'a> {
    value: u32,
    classification: &'a str,
    date: String,
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(unsendable)
}

fn compact<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(unsendable)
}

fn unsendable(e: serde_json::Error) -> BotError {
    BotError::OracleUnavailable(format!("failed to serialize request: {}", e))
}

/// Render the live request as the sectioned text sent to the model
pub fn render_request(assets: &FewShotAssets, request: &DecisionRequest) -> Result<String> {
    let sentiment: Vec<SentimentRow> = request
        .sentiment
        .iter()
        .map(|s| SentimentRow {
            value: s.value,
            classification: &s.classification,
            date: s.timestamp.format("%Y-%m-%d").to_string(),
        })
        .collect();

    let mut text = format!(
        r#"{preamble}

### 1. My Current Investment Status ({quote} & {base} only)
{balances}

### 2. Current Order Book
{orderbook}

### 3. Chart Data with Indicators (Daily)
{daily}

### 4. Chart Data with Indicators (Hourly)
{hourly}

### 5. Fear & Greed Index (Sentiment, Last {days} Days)
{sentiment}

### 6. Latest News Headlines (Qualitative Factor)
{news}
"#,
        preamble = assets.preamble_for(&request.market),
        quote = request.market.quote,
        base = request.market.base,
        balances = pretty(&request.balances.balances)?,
        orderbook = pretty(&request.orderbook)?,
        daily = compact(&request.daily.to_split_table())?,
        hourly = compact(&request.hourly.to_split_table())?,
        days = request.sentiment.len(),
        sentiment = pretty(&sentiment)?,
        news = pretty(&request.news)?,
    );

    if request.chart.is_some() {
        text.push_str(
            "\n### 7. Chart Image\nThe attached image shows the recent price chart with Bollinger bands.\n",
        );
    }

    Ok(text)
}
