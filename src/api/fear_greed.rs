use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::SentimentProvider;
use crate::error::BotError;
use crate::models::SentimentSample;
use crate::Result;

pub const FEAR_GREED_API_BASE: &str = "https://api.alternative.me";

const PROVIDER: &str = "fear & greed index";

/// Client for the alternative.me crypto Fear & Greed index
#[derive(Clone)]
pub struct FearGreedClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

// The API sends every field as a string
#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
    timestamp: String,
}

impl TryFrom<FngEntry> for SentimentSample {
    type Error = String;

    fn try_from(entry: FngEntry) -> std::result::Result<Self, Self::Error> {
        let value = entry
            .value
            .parse::<u32>()
            .map_err(|e| format!("bad value '{}': {}", entry.value, e))?;
        let secs = entry
            .timestamp
            .parse::<i64>()
            .map_err(|e| format!("bad timestamp '{}': {}", entry.timestamp, e))?;
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| format!("timestamp out of range: {}", secs))?;

        Ok(SentimentSample {
            value,
            classification: entry.value_classification,
            timestamp,
        })
    }
}

impl FearGreedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SentimentProvider for FearGreedClient {
    async fn get_sentiment(&self, limit: usize) -> Result<Vec<SentimentSample>> {
        let url = format!("{}/fng/?limit={}", self.base_url, limit);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::provider(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(BotError::provider(
                PROVIDER,
                format!("HTTP {}", response.status()),
            ));
        }

        let body: FngResponse = response
            .json()
            .await
            .map_err(|e| BotError::provider(PROVIDER, e))?;

        body.data
            .into_iter()
            .map(SentimentSample::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BotError::provider(PROVIDER, e))
    }
}
