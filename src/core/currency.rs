//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exchange rates relative to `base`: one unit of `base` buys `rates[code]`
/// units of `code`. Codes are stored lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub base: String,
    pub date: Option<String>,
    pub rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn new(base: &str, rates: HashMap<String, f64>) -> Self {
        Self {
            base: base.to_lowercase(),
            date: None,
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.to_lowercase(), rate))
                .collect(),
        }
    }

    /// A table without any rates; every conversion through it is a no-op.
    pub fn empty(base: &str) -> Self {
        Self::new(base, HashMap::new())
    }

    /// Rate for `code`, ignoring zero, negative and non-finite entries.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates
            .get(&code.to_lowercase())
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }
}

/// Converts `amount` held in `from` into the table's base currency. A
/// currency missing from the table converts at rate 1.
pub fn convert(amount: f64, from: &str, rates: &RateTable) -> f64 {
    amount / rates.rate(from).unwrap_or(1.0)
}

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn fetch_rates(&self, base: &str) -> Result<RateTable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, f64)]) -> RateTable {
        RateTable::new(
            "usd",
            entries
                .iter()
                .map(|(code, rate)| (code.to_string(), *rate))
                .collect(),
        )
    }

    #[test]
    fn test_convert_divides_by_rate() {
        let rates = table(&[("eur", 0.9)]);
        let converted = convert(1000.0, "EUR", &rates);
        assert!((converted - 1111.111).abs() < 0.001);
    }

    #[test]
    fn test_convert_missing_currency_is_noop() {
        let rates = table(&[("eur", 0.9)]);
        assert_eq!(convert(250.0, "JPY", &rates), 250.0);
        assert_eq!(convert(250.0, "EUR", &RateTable::empty("usd")), 250.0);
    }

    #[test]
    fn test_rate_lookup_is_case_insensitive() {
        let rates = RateTable::new("USD", HashMap::from([("GBP".to_string(), 0.8)]));
        assert_eq!(rates.base, "usd");
        assert_eq!(rates.rate("gbp"), Some(0.8));
        assert_eq!(rates.rate("GBP"), Some(0.8));
    }

    #[test]
    fn test_zero_rate_is_ignored() {
        let rates = table(&[("xyz", 0.0)]);
        assert_eq!(rates.rate("xyz"), None);
        assert_eq!(convert(10.0, "XYZ", &rates), 10.0);
    }
}
