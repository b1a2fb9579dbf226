use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::price::{PriceMap, PriceQuote, QuoteProvider, SymbolMatch, SymbolSearchProvider};

const USER_AGENT: &str = "folio/1.0";

/// Yahoo Finance backed quote and symbol search provider.
pub struct YahooFinanceProvider {
    base_url: String,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        debug!("Requesting {}", url);
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} URL: {}", response.status(), url));
        }
        Ok(response)
    }
}

#[derive(Deserialize, Debug)]
struct YahooQuoteResponse {
    #[serde(alias = "quoteResponse")]
    quote_response: QuoteResult,
}

#[derive(Deserialize, Debug)]
struct QuoteResult {
    result: Vec<QuoteItem>,
}

#[derive(Deserialize, Debug)]
struct QuoteItem {
    symbol: String,
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "shortName")]
    short_name: Option<String>,
    #[serde(alias = "longName")]
    long_name: Option<String>,
    #[serde(alias = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct YahooSearchResponse {
    #[serde(default)]
    quotes: Vec<SearchItem>,
}

#[derive(Deserialize, Debug)]
struct SearchItem {
    symbol: String,
    shortname: Option<String>,
    longname: Option<String>,
    #[serde(alias = "exchDisp")]
    exch_disp: Option<String>,
    exchange: Option<String>,
    #[serde(alias = "quoteType")]
    quote_type: Option<String>,
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(count = symbols.len()))]
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<PriceMap> {
        if symbols.is_empty() {
            return Ok(PriceMap::new());
        }

        let url = Url::parse_with_params(
            &format!("{}/v7/finance/quote", self.base_url),
            &[("symbols", symbols.join(","))],
        )?;
        let data = self.get(url).await?.json::<YahooQuoteResponse>().await?;
        debug!(
            "Received {} quotes for {} symbols",
            data.quote_response.result.len(),
            symbols.len()
        );

        let quotes = data
            .quote_response
            .result
            .into_iter()
            .map(|item| {
                let timestamp = item
                    .regular_market_time
                    .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
                    .unwrap_or_else(Utc::now);
                (
                    item.symbol,
                    PriceQuote {
                        description: item.long_name.or(item.short_name),
                        currency: item.currency,
                        price: item.regular_market_price,
                        timestamp,
                    },
                )
            })
            .collect();
        Ok(quotes)
    }
}

#[async_trait]
impl SymbolSearchProvider for YahooFinanceProvider {
    #[instrument(name = "YahooSymbolSearch", skip(self))]
    async fn search(&self, query: &str, kind: Option<&str>) -> Result<Vec<SymbolMatch>> {
        let url = Url::parse_with_params(
            &format!("{}/v1/finance/search", self.base_url),
            &[("q", query), ("quotesCount", "10"), ("newsCount", "0")],
        )?;
        let data = self.get(url).await?.json::<YahooSearchResponse>().await?;

        let matches = data
            .quotes
            .into_iter()
            .filter(|item| match kind {
                Some(kind) => item
                    .quote_type
                    .as_deref()
                    .is_some_and(|qt| qt.eq_ignore_ascii_case(kind)),
                None => true,
            })
            .map(|item| SymbolMatch {
                symbol: item.symbol,
                name: item.longname.or(item.shortname),
                exchange: item.exch_disp.or(item.exchange),
                quote_type: item.quote_type,
            })
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_server = MockServer::start().await;
        let mock_response = r#"{
            "quoteResponse": {
                "result": [
                    {
                        "symbol": "AAPL",
                        "regularMarketPrice": 150.65,
                        "currency": "USD",
                        "shortName": "Apple Inc.",
                        "regularMarketTime": 1700000000
                    },
                    {
                        "symbol": "BTC-USD",
                        "regularMarketPrice": 43000.0,
                        "currency": "USD",
                        "shortName": "Bitcoin USD"
                    }
                ],
                "error": null
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "AAPL,BTC-USD,NOPE"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri());
        let symbols = vec![
            "AAPL".to_string(),
            "BTC-USD".to_string(),
            "NOPE".to_string(),
        ];
        let quotes = provider.fetch_quotes(&symbols).await.unwrap();

        assert_eq!(quotes.len(), 2);
        let apple = &quotes["AAPL"];
        assert_eq!(apple.price, Some(150.65));
        assert_eq!(apple.currency.as_deref(), Some("USD"));
        assert_eq!(apple.description.as_deref(), Some("Apple Inc."));
        assert_eq!(apple.timestamp.timestamp(), 1700000000);
        assert!(quotes.contains_key("BTC-USD"));
        assert!(!quotes.contains_key("NOPE"));
    }

    #[tokio::test]
    async fn test_empty_symbol_list_skips_request() {
        // No mock mounted: any request would fail
        let mock_server = MockServer::start().await;
        let provider = YahooFinanceProvider::new(&mock_server.uri());
        let quotes = provider.fetch_quotes(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_quote_api_error_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri());
        let result = provider.fetch_quotes(&["AAPL".to_string()]).await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("HTTP error: 500 Internal Server Error")
        );
    }

    #[tokio::test]
    async fn test_symbol_search_filters_by_type() {
        let mock_server = MockServer::start().await;
        let mock_response = r#"{
            "quotes": [
                {"symbol": "AAPL", "shortname": "Apple Inc.", "exchDisp": "NASDAQ", "quoteType": "EQUITY"},
                {"symbol": "APLE", "longname": "Apple Hospitality REIT", "exchange": "NYQ", "quoteType": "EQUITY"},
                {"symbol": "AAPL240119C00150000", "quoteType": "OPTION"}
            ]
        }"#;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "apple"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri());

        let all = provider.search("apple", None).await.unwrap();
        assert_eq!(all.len(), 3);

        let equities = provider.search("apple", Some("equity")).await.unwrap();
        assert_eq!(equities.len(), 2);
        assert_eq!(equities[0].symbol, "AAPL");
        assert_eq!(equities[0].exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(equities[1].name.as_deref(), Some("Apple Hospitality REIT"));
        assert_eq!(equities[1].exchange.as_deref(), Some("NYQ"));
    }
}
