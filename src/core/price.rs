//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Crypto tickers the quote provider only knows in their `<TICKER>-USD` form.
pub const CRYPTO_TICKERS: &[&str] = &[
    "BTC", "ETH", "USDT", "BNB", "SOL", "XRP", "USDC", "ADA", "AVAX", "DOGE", "DOT", "TRX",
    "LINK", "MATIC", "LTC", "BCH", "XLM", "ATOM", "UNI", "XMR",
];

/// Latest known quote for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub description: Option<String>,
    pub currency: Option<String>,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Quotes keyed by the symbol the caller asked for.
pub type PriceMap = HashMap<String, PriceQuote>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub quote_type: Option<String>,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetches quotes for all `symbols` in one upstream request. Symbols the
    /// upstream does not know are left out of the returned map.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<PriceMap>;
}

#[async_trait]
pub trait SymbolSearchProvider: Send + Sync {
    async fn search(&self, query: &str, kind: Option<&str>) -> Result<Vec<SymbolMatch>>;
}

/// Rewrites a ticker into the form the quote provider expects.
pub fn upstream_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if CRYPTO_TICKERS.contains(&upper.as_str()) {
        format!("{upper}-USD")
    } else {
        symbol.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_symbol_rewrites_crypto() {
        assert_eq!(upstream_symbol("BTC"), "BTC-USD");
        assert_eq!(upstream_symbol("eth"), "ETH-USD");
        assert_eq!(upstream_symbol("AAPL"), "AAPL");
        assert_eq!(upstream_symbol("BTC-USD"), "BTC-USD");
    }
}
