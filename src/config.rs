use config::{Config, Environment, File};
use serde::Deserialize;

use crate::api::fear_greed::FEAR_GREED_API_BASE;
use crate::api::serpapi::SERPAPI_API_BASE;
use crate::api::upbit::UPBIT_API_BASE;
use crate::context::chart::DEFAULT_CHART_URL;
use crate::context::{DEFAULT_CANDLE_COUNT, DEFAULT_NEWS_QUERY, DEFAULT_SENTIMENT_LIMIT};
use crate::error::BotError;
use crate::execution::executor::{DEFAULT_BUY_FEE_RESERVE_BPS, DEFAULT_MIN_ORDER_NOTIONAL};
use crate::indicators::MIN_HISTORY;
use crate::models::MarketPair;
use crate::oracle::gemini::{DEFAULT_MODEL, GEMINI_API_BASE};
use crate::Result;

const CONFIG_FILE: &str = "autotrade";
const ENV_PREFIX: &str = "AUTOTRADE";

pub const MIN_CYCLE_INTERVAL_SECS: u64 = 10;
pub const MAX_CYCLE_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Trading {
    pub market: String,
    pub cycle_interval_secs: u64,
    pub candle_count: usize,
    pub min_order_notional: u64,
    pub buy_fee_reserve_bps: u32,
}

impl Default for Trading {
    fn default() -> Self {
        Self {
            market: "KRW-BTC".to_string(),
            cycle_interval_secs: 10,
            candle_count: DEFAULT_CANDLE_COUNT,
            min_order_notional: DEFAULT_MIN_ORDER_NOTIONAL as u64,
            buy_fee_reserve_bps: DEFAULT_BUY_FEE_RESERVE_BPS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Exchange {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for Exchange {
    fn default() -> Self {
        Self {
            base_url: UPBIT_API_BASE.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Oracle {
    pub base_url: String,
    pub model: String,
    pub stream: bool,
    pub thinking_budget: Option<i32>,
    pub timeout_secs: u64,
}

impl Default for Oracle {
    fn default() -> Self {
        Self {
            base_url: GEMINI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            stream: false,
            thinking_budget: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sentiment {
    pub base_url: String,
    pub limit: usize,
}

impl Default for Sentiment {
    fn default() -> Self {
        Self {
            base_url: FEAR_GREED_API_BASE.to_string(),
            limit: DEFAULT_SENTIMENT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct News {
    pub base_url: String,
    pub query: String,
    pub gl: String,
    pub hl: String,
    pub limit: usize,
}

impl Default for News {
    fn default() -> Self {
        Self {
            base_url: SERPAPI_API_BASE.to_string(),
            query: DEFAULT_NEWS_QUERY.to_string(),
            gl: "us".to_string(),
            hl: "en".to_string(),
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Chart {
    pub enabled: bool,
    pub browser: String,
    pub url_template: String,
    pub width: u32,
    pub height: u32,
    pub timeout_secs: u64,
}

impl Default for Chart {
    fn default() -> Self {
        Self {
            enabled: false,
            browser: "chromium".to_string(),
            url_template: DEFAULT_CHART_URL.to_string(),
            width: 1920,
            height: 1080,
            timeout_secs: 60,
        }
    }
}

/// Runtime settings: defaults, then `autotrade.toml`, then
/// `AUTOTRADE_<SECTION>__<KEY>` environment variables
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trading: Trading,
    pub exchange: Exchange,
    pub oracle: Oracle,
    pub sentiment: Sentiment,
    pub news: News,
    pub chart: Chart,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let interval = self.trading.cycle_interval_secs;
        if !(MIN_CYCLE_INTERVAL_SECS..=MAX_CYCLE_INTERVAL_SECS).contains(&interval) {
            return Err(BotError::Configuration(format!(
                "trading.cycle_interval_secs must be within {}..={}, got {}",
                MIN_CYCLE_INTERVAL_SECS, MAX_CYCLE_INTERVAL_SECS, interval
            )));
        }

        if self.trading.candle_count < MIN_HISTORY {
            return Err(BotError::Configuration(format!(
                "trading.candle_count must be at least {}, got {}",
                MIN_HISTORY, self.trading.candle_count
            )));
        }

        self.market()?;
        Ok(())
    }

    pub fn market(&self) -> Result<MarketPair> {
        self.trading.market.parse()
    }
}

/// Secrets, read from the environment only
#[derive(Clone)]
pub struct Credentials {
    pub upbit_access_key: String,
    pub upbit_secret_key: String,
    pub gemini_api_key: Option<String>,
    pub serpapi_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| BotError::Configuration(format!("{} is not set", key)))
        };

        Ok(Self {
            upbit_access_key: required("UPBIT_ACCESS_KEY")?,
            upbit_secret_key: required("UPBIT_SECRET_KEY")?,
            gemini_api_key: optional("GEMINI_API_KEY"),
            serpapi_api_key: optional("SERPAPI_API_KEY"),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("upbit_access_key", &"***")
            .field("upbit_secret_key", &"***")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("serpapi_api_key", &self.serpapi_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}
