//! CoinMarketCap quotes client
//!
//! Fetches the latest USD quote for a currency symbol via
//! `/v1/cryptocurrency/quotes/latest`.

use crate::config::FeedConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// CoinMarketCap API client
#[derive(Debug, Clone)]
pub struct CoinMarketCap {
    http: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    status: ApiStatus,
    #[serde(default)]
    data: HashMap<String, CurrencyQuote>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrencyQuote {
    quote: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    price: Option<Decimal>,
}

impl CoinMarketCap {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/v1/cryptocurrency/quotes/latest", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("symbol", symbol), ("convert", "USD")])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        let quotes: QuotesResponse = serde_json::from_str(&body).map_err(|e| {
            BotError::MalformedQuote(format!("http {}: {}", status, e))
        })?;

        debug!(symbol, %status, "quote response received");
        extract_price(quotes, symbol)
    }
}

/// Pull the USD price for `symbol` out of a parsed quotes response,
/// mapping API-level failures onto the feed error taxonomy.
fn extract_price(resp: QuotesResponse, symbol: &str) -> Result<Decimal> {
    if resp.status.error_code != 0 {
        let message = resp
            .status
            .error_message
            .unwrap_or_else(|| format!("error code {}", resp.status.error_code));
        // CMC answers 400 with an "Invalid value for \"symbol\"" message
        // for unknown symbols; everything else is a feed-side problem.
        if message.contains("symbol") {
            return Err(BotError::CurrencyNotFound(symbol.to_string()));
        }
        return Err(BotError::FeedUnavailable(message));
    }

    let currency = resp
        .data
        .get(symbol)
        .ok_or_else(|| BotError::CurrencyNotFound(symbol.to_string()))?;

    let usd = currency
        .quote
        .get("USD")
        .ok_or_else(|| BotError::MalformedQuote(format!("no USD quote for {}", symbol)))?;

    usd.price
        .ok_or_else(|| BotError::MalformedQuote(format!("null price for {}", symbol)))
}

#[async_trait]
impl super::PriceSource for CoinMarketCap {
    async fn price(&self, symbol: &str) -> Result<Decimal> {
        self.fetch_quote(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(json: &str) -> QuotesResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_price_happy_path() {
        let resp = parse(
            r#"{
                "status": {"error_code": 0, "error_message": null},
                "data": {
                    "BTC": {"quote": {"USD": {"price": 27123.45}}}
                }
            }"#,
        );
        let price = extract_price(resp, "BTC").unwrap();
        assert_eq!(price, dec!(27123.45));
    }

    #[test]
    fn test_extract_price_unknown_symbol_in_status() {
        let resp = parse(
            r#"{
                "status": {"error_code": 400, "error_message": "Invalid value for \"symbol\": \"XYZ\""},
                "data": {}
            }"#,
        );
        match extract_price(resp, "XYZ") {
            Err(BotError::CurrencyNotFound(s)) => assert_eq!(s, "XYZ"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_extract_price_rate_limited() {
        let resp = parse(
            r#"{
                "status": {"error_code": 1008, "error_message": "You have exceeded your API rate limit"},
                "data": {}
            }"#,
        );
        assert!(matches!(
            extract_price(resp, "BTC"),
            Err(BotError::FeedUnavailable(_))
        ));
    }

    #[test]
    fn test_extract_price_symbol_missing_from_data() {
        let resp = parse(
            r#"{
                "status": {"error_code": 0, "error_message": null},
                "data": {"ETH": {"quote": {"USD": {"price": 1800.0}}}}
            }"#,
        );
        assert!(matches!(
            extract_price(resp, "BTC"),
            Err(BotError::CurrencyNotFound(_))
        ));
    }

    #[test]
    fn test_extract_price_missing_usd_quote() {
        let resp = parse(
            r#"{
                "status": {"error_code": 0, "error_message": null},
                "data": {"BTC": {"quote": {"EUR": {"price": 25000.0}}}}
            }"#,
        );
        assert!(matches!(
            extract_price(resp, "BTC"),
            Err(BotError::MalformedQuote(_))
        ));
    }

    #[test]
    fn test_extract_price_null_price() {
        let resp = parse(
            r#"{
                "status": {"error_code": 0, "error_message": null},
                "data": {"BTC": {"quote": {"USD": {"price": null}}}}
            }"#,
        );
        assert!(matches!(
            extract_price(resp, "BTC"),
            Err(BotError::MalformedQuote(_))
        ));
    }

    #[test]
    fn test_response_without_data_field_parses() {
        // Error responses omit "data" entirely.
        let resp = parse(r#"{"status": {"error_code": 500, "error_message": "oops"}}"#);
        assert!(matches!(
            extract_price(resp, "BTC"),
            Err(BotError::FeedUnavailable(_))
        ));
    }
}
