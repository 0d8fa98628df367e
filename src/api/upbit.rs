use async_trait::async_trait;
use chrono::NaiveDateTime;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::ExchangeGateway;
use crate::error::BotError;
use crate::indicators::MIN_HISTORY;
use crate::models::{
    AccountSnapshot, Balance, Candle, CandleInterval, CandleSeries, MarketPair,
    OrderBookSnapshot, OrderResult,
};
use crate::Result;

// Upbit Open API
// Docs: https://docs.upbit.com/reference
pub const UPBIT_API_BASE: &str = "https://api.upbit.com/v1";

/// Client for the Upbit exchange REST API
#[derive(Clone)]
pub struct UpbitClient {
    client: Client,
    base_url: String,
    access_key: String,
    secret_key: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct AccountRaw {
    currency: String,
    balance: String,
    locked: String,
    avg_buy_price: String,
    unit_currency: String,
}

#[derive(Debug, Deserialize)]
struct CandleRaw {
    market: String,
    candle_date_time_utc: String,
    opening_price: f64,
    high_price: f64,
    low_price: f64,
    trade_price: f64,
    candle_acc_trade_volume: f64,
}

#[derive(Debug, Deserialize)]
struct TickerRaw {
    trade_price: f64,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    access_key: &'a str,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

impl TryFrom<AccountRaw> for Balance {
    type Error = rust_decimal::Error;

    fn try_from(raw: AccountRaw) -> std::result::Result<Self, Self::Error> {
        Ok(Balance {
            currency: raw.currency,
            balance: Decimal::from_str(&raw.balance)?,
            locked: Decimal::from_str(&raw.locked)?,
            avg_buy_price: Decimal::from_str(&raw.avg_buy_price)?,
            unit_currency: raw.unit_currency,
        })
    }
}

impl TryFrom<CandleRaw> for Candle {
    type Error = chrono::ParseError;

    fn try_from(raw: CandleRaw) -> std::result::Result<Self, Self::Error> {
        let timestamp =
            NaiveDateTime::parse_from_str(&raw.candle_date_time_utc, "%Y-%m-%dT%H:%M:%S")?
                .and_utc();
        Ok(Candle {
            market: raw.market,
            timestamp,
            open: raw.opening_price,
            high: raw.high_price,
            low: raw.low_price,
            close: raw.trade_price,
            volume: raw.candle_acc_trade_volume,
        })
    }
}

/// SHA-512 hex digest Upbit expects for signed parameters
pub fn query_hash(query: &str) -> String {
    hex::encode(Sha512::digest(query.as_bytes()))
}

fn encode_query(params: &[(&str, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn candles_path(interval: CandleInterval) -> &'static str {
    match interval {
        CandleInterval::Day => "/candles/days",
        CandleInterval::Minute60 => "/candles/minutes/60",
    }
}

// ============== Implementation ==============

impl UpbitClient {
    pub fn new(
        access_key: String,
        secret_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key,
            secret_key,
        })
    }

    /// Bearer token for a private endpoint; `query` is the urlencoded
    /// parameter string when the call carries parameters
    fn authorization(&self, operation: &'static str, query: Option<&str>) -> Result<String> {
        let claims = Claims {
            access_key: &self.access_key,
            nonce: Uuid::new_v4().to_string(),
            query_hash: query.map(query_hash),
            query_hash_alg: query.map(|_| "SHA512"),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret_key.as_bytes()),
        )
        .map_err(|e| BotError::market_data(operation, e))?;

        Ok(format!("Bearer {}", token))
    }

    async fn read_json<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::market_data(
                operation,
                format!("Upbit API error {}: {}", status, body),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BotError::market_data(operation, e))
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}?{}", self.base_url, path, encode_query(params));
        tracing::debug!(operation, url = %url, "Upbit request");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| BotError::market_data(operation, e))?;

        Self::read_json(operation, response).await
    }

    async fn post_order(&self, params: Vec<(&str, String)>) -> Result<OrderResult> {
        const OPERATION: &str = "place_order";

        let query = encode_query(&params);
        let authorization = self.authorization(OPERATION, Some(&query))?;
        let body: serde_json::Map<String, serde_json::Value> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();

        tracing::debug!(query = %query, "Upbit order request");

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .header("Authorization", authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::market_data(OPERATION, e))?;

        Self::read_json(OPERATION, response).await
    }
}

#[async_trait]
impl ExchangeGateway for UpbitClient {
    async fn get_balances(&self) -> Result<AccountSnapshot> {
        const OPERATION: &str = "get_balances";

        let response = self
            .client
            .get(format!("{}/accounts", self.base_url))
            .header("Authorization", self.authorization(OPERATION, None)?)
            .send()
            .await
            .map_err(|e| BotError::market_data(OPERATION, e))?;

        let raw: Vec<AccountRaw> = Self::read_json(OPERATION, response).await?;
        let balances = raw
            .into_iter()
            .map(Balance::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BotError::market_data(OPERATION, e))?;

        Ok(AccountSnapshot { balances })
    }

    async fn get_order_book(&self, pair: &MarketPair) -> Result<OrderBookSnapshot> {
        const OPERATION: &str = "get_order_book";

        let books: Vec<OrderBookSnapshot> = self
            .get_public(OPERATION, "/orderbook", &[("markets", pair.to_string())])
            .await?;

        books
            .into_iter()
            .next()
            .ok_or_else(|| BotError::market_data(OPERATION, format!("no order book for {}", pair)))
    }

    async fn get_candles(
        &self,
        pair: &MarketPair,
        interval: CandleInterval,
        count: usize,
    ) -> Result<CandleSeries> {
        const OPERATION: &str = "get_candles";

        let raw: Vec<CandleRaw> = self
            .get_public(
                OPERATION,
                candles_path(interval),
                &[("market", pair.to_string()), ("count", count.to_string())],
            )
            .await?;

        // Upbit returns newest first
        let mut candles = raw
            .into_iter()
            .map(Candle::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BotError::market_data(OPERATION, e))?;
        candles.reverse();

        if candles.len() < MIN_HISTORY {
            return Err(BotError::InsufficientHistory {
                required: MIN_HISTORY,
                available: candles.len(),
            });
        }

        tracing::debug!(
            "Fetched {} {} candles for {}",
            candles.len(),
            interval,
            pair
        );

        Ok(CandleSeries {
            market: pair.to_string(),
            interval,
            candles,
        })
    }

    async fn get_current_price(&self, pair: &MarketPair) -> Result<f64> {
        const OPERATION: &str = "get_current_price";

        let tickers: Vec<TickerRaw> = self
            .get_public(OPERATION, "/ticker", &[("markets", pair.to_string())])
            .await?;

        tickers
            .first()
            .map(|t| t.trade_price)
            .ok_or_else(|| BotError::market_data(OPERATION, format!("no ticker for {}", pair)))
    }

    async fn place_market_buy(&self, pair: &MarketPair, quote_amount: Decimal) -> Result<OrderResult> {
        self.post_order(vec![
            ("market", pair.to_string()),
            ("side", "bid".to_string()),
            ("ord_type", "price".to_string()),
            ("price", quote_amount.normalize().to_string()),
        ])
        .await
    }

    async fn place_market_sell(&self, pair: &MarketPair, base_amount: Decimal) -> Result<OrderResult> {
        self.post_order(vec![
            ("market", pair.to_string()),
            ("side", "ask".to_string()),
            ("ord_type", "market".to_string()),
            ("volume", base_amount.normalize().to_string()),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> UpbitClient {
        UpbitClient::new(
            "access".to_string(),
            "secret".to_string(),
            server.url(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn pair() -> MarketPair {
        MarketPair::new("KRW", "BTC")
    }

    fn candle_json(i: usize) -> serde_json::Value {
        // newest first, like the real endpoint
        let day = 60 - i;
        json!({
            "market": "KRW-BTC",
            "candle_date_time_utc": format!("2024-{:02}-{:02}T00:00:00", 1 + (day - 1) / 28, 1 + (day - 1) % 28),
            "candle_date_time_kst": "ignored",
            "opening_price": 100.0 + day as f64,
            "high_price": 105.0 + day as f64,
            "low_price": 95.0 + day as f64,
            "trade_price": 101.0 + day as f64,
            "timestamp": 0,
            "candle_acc_trade_price": 1.0,
            "candle_acc_trade_volume": 2.5
        })
    }

    #[test]
    fn test_query_hash_is_sha512_hex() {
        assert_eq!(
            query_hash("abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_authorization_claims() {
        let client = UpbitClient::new(
            "my-access".to_string(),
            "my-secret".to_string(),
            UPBIT_API_BASE,
            Duration::from_secs(5),
        )
        .unwrap();

        let header = client
            .authorization("test", Some("market=KRW-BTC&side=bid"))
            .unwrap();
        let token = header.strip_prefix("Bearer ").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        let claims = decode::<serde_json::Value>(
            token,
            &DecodingKey::from_secret(b"my-secret"),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims["access_key"], "my-access");
        assert_eq!(claims["query_hash_alg"], "SHA512");
        assert_eq!(claims["query_hash"], query_hash("market=KRW-BTC&side=bid"));
        assert!(Uuid::parse_str(claims["nonce"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_get_balances() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"currency": "KRW", "balance": "10000.5", "locked": "0", "avg_buy_price": "0", "avg_buy_price_modified": true, "unit_currency": "KRW"},
                    {"currency": "BTC", "balance": "0.00120000", "locked": "0", "avg_buy_price": "90000000", "avg_buy_price_modified": false, "unit_currency": "KRW"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let snapshot = client_for(&server).get_balances().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.available("KRW"), Decimal::from_str("10000.5").unwrap());
        assert_eq!(snapshot.available("BTC"), Decimal::from_str("0.0012").unwrap());
    }

    #[tokio::test]
    async fn test_get_candles_reorders_oldest_first() {
        let mut server = mockito::Server::new_async().await;
        let body: Vec<serde_json::Value> = (0..60).map(candle_json).collect();
        let mock = server
            .mock("GET", "/candles/days")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("market".into(), "KRW-BTC".into()),
                Matcher::UrlEncoded("count".into(), "60".into()),
            ]))
            .with_status(200)
            .with_body(serde_json::Value::Array(body).to_string())
            .create_async()
            .await;

        let series = client_for(&server)
            .get_candles(&pair(), CandleInterval::Day, 60)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(series.len(), 60);
        assert!(series
            .candles
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(series.candles.last().unwrap().close, 161.0);
    }

    #[tokio::test]
    async fn test_get_candles_insufficient_history() {
        let mut server = mockito::Server::new_async().await;
        let body: Vec<serde_json::Value> = (0..10).map(candle_json).collect();
        server
            .mock("GET", "/candles/minutes/60")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(serde_json::Value::Array(body).to_string())
            .create_async()
            .await;

        let result = client_for(&server)
            .get_candles(&pair(), CandleInterval::Minute60, 60)
            .await;

        assert!(matches!(
            result,
            Err(BotError::InsufficientHistory {
                required: 35,
                available: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_http_error_is_market_data_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/orderbook")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = client_for(&server).get_order_book(&pair()).await;

        match result {
            Err(BotError::MarketData { operation, source }) => {
                assert_eq!(operation, "get_order_book");
                assert!(source.to_string().contains("500"));
            }
            other => panic!("expected market data error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_market_data_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{\"not\": \"a list\"}")
            .create_async()
            .await;

        let result = client_for(&server).get_current_price(&pair()).await;
        assert!(matches!(result, Err(BotError::MarketData { .. })));
    }

    #[tokio::test]
    async fn test_get_current_price() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ticker")
            .match_query(Matcher::UrlEncoded("markets".into(), "KRW-BTC".into()))
            .with_status(200)
            .with_body(json!([{"market": "KRW-BTC", "trade_price": 95000000.0}]).to_string())
            .create_async()
            .await;

        let price = client_for(&server).get_current_price(&pair()).await.unwrap();
        assert_eq!(price, 95_000_000.0);
    }

    #[tokio::test]
    async fn test_place_market_buy_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_header("authorization", Matcher::Regex("^Bearer .+".to_string()))
            .match_body(Matcher::Json(json!({
                "market": "KRW-BTC",
                "side": "bid",
                "ord_type": "price",
                "price": "9995"
            })))
            .with_status(201)
            .with_body(
                json!({
                    "uuid": "9ca023a5-851b-4fec-9f0a-48cd83c2eaae",
                    "side": "bid",
                    "ord_type": "price",
                    "price": "9995",
                    "state": "wait",
                    "market": "KRW-BTC",
                    "created_at": "2024-03-01T12:00:00+09:00",
                    "volume": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let amount = Decimal::from(10_000) * Decimal::new(9995, 4);
        let order = client_for(&server)
            .place_market_buy(&pair(), amount)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.side, "bid");
        assert_eq!(order.volume, None);
    }

    #[tokio::test]
    async fn test_place_market_sell_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_body(Matcher::Json(json!({
                "market": "KRW-BTC",
                "side": "ask",
                "ord_type": "market",
                "volume": "0.0012"
            })))
            .with_status(201)
            .with_body(
                json!({
                    "uuid": "abc",
                    "side": "ask",
                    "ord_type": "market",
                    "state": "wait",
                    "market": "KRW-BTC",
                    "created_at": "2024-03-01T12:00:00+09:00",
                    "volume": "0.0012"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let order = client_for(&server)
            .place_market_sell(&pair(), Decimal::from_str("0.00120000").unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.volume.as_deref(), Some("0.0012"));
    }
}
