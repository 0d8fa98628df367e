use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// A traded market such as `KRW-BTC` (quote currency first, Upbit style)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPair {
    pub quote: String,
    pub base: String,
}

impl MarketPair {
    pub fn new(quote: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            base: base.into(),
        }
    }
}

impl FromStr for MarketPair {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((quote, base)) if !quote.is_empty() && !base.is_empty() => {
                Ok(Self::new(quote.to_uppercase(), base.to_uppercase()))
            }
            _ => Err(BotError::Configuration(format!(
                "invalid market '{}', expected QUOTE-BASE (e.g. KRW-BTC)",
                s
            ))),
        }
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.quote, self.base)
    }
}

/// Candle granularity requested from the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleInterval {
    Day,
    Minute60,
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandleInterval::Day => write!(f, "day"),
            CandleInterval::Minute60 => write!(f, "minute60"),
        }
    }
}

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub market: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candles for one interval, oldest first
#[derive(Debug, Clone)]
pub struct CandleSeries {
    pub market: String,
    pub interval: CandleInterval,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// One candle plus every indicator derived for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub bb_mid: f64,
    pub bb_high: f64,
    pub bb_low: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_diff: f64,
}

/// Indicator table for one candle series; warm-up rows already dropped
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub market: String,
    pub interval: CandleInterval,
    pub rows: Vec<IndicatorRow>,
}

/// Column-oriented view of an [`IndicatorSet`] (`columns` / `index` / `data`)
#[derive(Debug, Serialize)]
pub struct SplitTable {
    pub columns: Vec<&'static str>,
    pub index: Vec<String>,
    pub data: Vec<[f64; 12]>,
}

impl IndicatorSet {
    pub const COLUMNS: [&'static str; 12] = [
        "open",
        "high",
        "low",
        "close",
        "volume",
        "bb_mid",
        "bb_high",
        "bb_low",
        "rsi",
        "macd",
        "macd_signal",
        "macd_diff",
    ];

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn latest(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    pub fn to_split_table(&self) -> SplitTable {
        SplitTable {
            columns: Self::COLUMNS.to_vec(),
            index: self.rows.iter().map(|r| r.timestamp.to_rfc3339()).collect(),
            data: self
                .rows
                .iter()
                .map(|r| {
                    [
                        r.open,
                        r.high,
                        r.low,
                        r.close,
                        r.volume,
                        r.bb_mid,
                        r.bb_high,
                        r.bb_low,
                        r.rsi,
                        r.macd,
                        r.macd_signal,
                        r.macd_diff,
                    ]
                })
                .collect(),
        }
    }
}

/// Holdings in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    pub balance: Decimal,
    pub locked: Decimal,
    pub avg_buy_price: Decimal,
    pub unit_currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountSnapshot {
    pub balances: Vec<Balance>,
}

impl AccountSnapshot {
    /// Available (unlocked) amount of `currency`, zero when not held
    pub fn available(&self, currency: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.currency.eq_ignore_ascii_case(currency))
            .map(|b| b.balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Keep only the currencies that belong to `pair`
    pub fn for_pair(&self, pair: &MarketPair) -> AccountSnapshot {
        AccountSnapshot {
            balances: self
                .balances
                .iter()
                .filter(|b| b.currency == pair.quote || b.currency == pair.base)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookUnit {
    pub ask_price: f64,
    pub bid_price: f64,
    pub ask_size: f64,
    pub bid_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub market: String,
    pub timestamp: i64,
    pub total_ask_size: f64,
    pub total_bid_size: f64,
    pub orderbook_units: Vec<OrderBookUnit>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.orderbook_units.first().map(|u| u.bid_price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.orderbook_units.first().map(|u| u.ask_price)
    }
}

/// One day of the fear & greed index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSample {
    pub value: u32,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub date: Option<String>,
}

/// Rendered chart; only lives for the cycle that produced it
#[derive(Clone)]
pub struct ChartImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ChartImage {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            bytes,
        }
    }
}

impl fmt::Debug for ChartImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Everything the oracle gets to see for one cycle
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub market: MarketPair,
    pub balances: AccountSnapshot,
    pub orderbook: OrderBookSnapshot,
    pub daily: IndicatorSet,
    pub hourly: IndicatorSet,
    pub sentiment: Vec<SentimentSample>,
    pub news: Vec<NewsItem>,
    pub chart: Option<ChartImage>,
}

/// Trading action recommended by the oracle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl FromStr for Action {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "hold" => Ok(Action::Hold),
            other => Err(BotError::MalformedDecision(format!(
                "unknown decision '{}', expected buy|sell|hold",
                other
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub reason: String,
}

/// Exchange acknowledgement of a placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub uuid: String,
    pub side: String,
    pub ord_type: String,
    pub state: String,
    pub market: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(currency: &str, amount: i64) -> Balance {
        Balance {
            currency: currency.to_string(),
            balance: Decimal::from(amount),
            locked: Decimal::ZERO,
            avg_buy_price: Decimal::ZERO,
            unit_currency: "KRW".to_string(),
        }
    }

    #[test]
    fn test_market_pair_parsing() {
        let pair: MarketPair = "krw-btc".parse().unwrap();
        assert_eq!(pair.quote, "KRW");
        assert_eq!(pair.base, "BTC");
        assert_eq!(pair.to_string(), "KRW-BTC");

        assert!("KRWBTC".parse::<MarketPair>().is_err());
        assert!("-BTC".parse::<MarketPair>().is_err());
    }

    #[test]
    fn test_account_snapshot_available() {
        let snapshot = AccountSnapshot {
            balances: vec![balance("KRW", 10_000), balance("ETH", 3)],
        };

        assert_eq!(snapshot.available("KRW"), Decimal::from(10_000));
        assert_eq!(snapshot.available("BTC"), Decimal::ZERO);
    }

    #[test]
    fn test_account_snapshot_for_pair() {
        let snapshot = AccountSnapshot {
            balances: vec![balance("KRW", 10_000), balance("ETH", 3), balance("BTC", 1)],
        };
        let pair = MarketPair::new("KRW", "BTC");

        let filtered = snapshot.for_pair(&pair);
        assert_eq!(filtered.balances.len(), 2);
        assert_eq!(filtered.available("ETH"), Decimal::ZERO);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("buy".parse::<Action>().unwrap(), Action::Buy);
        assert_eq!("hold".parse::<Action>().unwrap(), Action::Hold);
        assert!(matches!(
            "BUY".parse::<Action>(),
            Err(BotError::MalformedDecision(_))
        ));
    }
}
