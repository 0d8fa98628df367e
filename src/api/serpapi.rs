use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::NewsProvider;
use crate::error::BotError;
use crate::models::NewsItem;
use crate::Result;

pub const SERPAPI_API_BASE: &str = "https://serpapi.com";

const PROVIDER: &str = "SerpAPI news";

/// Google News headlines through SerpAPI
#[derive(Clone)]
pub struct SerpApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    gl: String,
    hl: String,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl SerpApiClient {
    pub fn new(api_key: String, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            gl: "us".to_string(),
            hl: "en".to_string(),
            limit: 10,
        })
    }

    /// Country / language of the Google News results
    pub fn with_locale(mut self, gl: impl Into<String>, hl: impl Into<String>) -> Self {
        self.gl = gl.into();
        self.hl = hl.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl NewsProvider for SerpApiClient {
    async fn get_news(&self, query: &str) -> Result<Vec<NewsItem>> {
        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("engine", "google_news"),
                ("q", query),
                ("gl", self.gl.as_str()),
                ("hl", self.hl.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::provider(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(BotError::provider(
                PROVIDER,
                format!("HTTP {}", response.status()),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| BotError::provider(PROVIDER, e))?;

        // Story clusters come back without a top-level title; skip them
        Ok(body
            .news_results
            .into_iter()
            .filter_map(|r| {
                r.title.map(|title| NewsItem {
                    title,
                    date: r.date,
                })
            })
            .take(self.limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_news_keeps_top_ten_titles() {
        let mut server = mockito::Server::new_async().await;
        let results: Vec<serde_json::Value> = (0..15)
            .map(|i| {
                json!({
                    "position": i + 1,
                    "title": format!("Headline {}", i),
                    "date": "03/01/2024, 08:00 AM, +0000 UTC",
                    "link": "https://example.com"
                })
            })
            .collect();
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("engine".into(), "google_news".into()),
                Matcher::UrlEncoded("q".into(), "bitcoin OR cryptocurrency".into()),
                Matcher::UrlEncoded("api_key".into(), "key".into()),
            ]))
            .with_status(200)
            .with_body(json!({ "news_results": results }).to_string())
            .create_async()
            .await;

        let client = SerpApiClient::new("key".to_string(), server.url(), Duration::from_secs(5))
            .unwrap();
        let news = client.get_news("bitcoin OR cryptocurrency").await.unwrap();

        mock.assert_async().await;
        assert_eq!(news.len(), 10);
        assert_eq!(news[0].title, "Headline 0");
        assert!(news[0].date.is_some());
    }

    #[tokio::test]
    async fn test_missing_results_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({ "search_metadata": {"status": "Success"} }).to_string())
            .create_async()
            .await;

        let client = SerpApiClient::new("key".to_string(), server.url(), Duration::from_secs(5))
            .unwrap();
        assert!(client.get_news("bitcoin").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search.json")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = SerpApiClient::new("bad".to_string(), server.url(), Duration::from_secs(5))
            .unwrap();
        assert!(matches!(
            client.get_news("bitcoin").await,
            Err(BotError::ProviderUnavailable { .. })
        ));
    }
}
