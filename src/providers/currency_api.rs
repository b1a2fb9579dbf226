use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::currency::{CurrencyRateProvider, RateTable};

/// Rate tables from the static currency API, one JSON file per base currency
/// (`<base_url>/<code>.json`).
pub struct CurrencyApiProvider {
    base_url: String,
}

impl CurrencyApiProvider {
    pub fn new(base_url: &str) -> Self {
        CurrencyApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CurrencyRateProvider for CurrencyApiProvider {
    #[instrument(name = "CurrencyRatesFetch", skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<RateTable> {
        let code = base.trim().to_lowercase();
        let url = format!("{}/{}.json", self.base_url, code);
        debug!("Requesting currency rates from {}", url);

        let client = reqwest::Client::builder().user_agent("folio/1.0").build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for base currency: {}", e, code))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for base currency: {}",
                response.status(),
                code
            ));
        }

        let text = response.text().await?;
        let data: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", code, e))?;

        let table = data
            .get(&code)
            .and_then(|v| v.as_object())
            .ok_or_else(|| anyhow!("No rate data found for base currency: {}", code))?;

        let rates: HashMap<String, f64> = table
            .iter()
            .filter_map(|(currency, rate)| rate.as_f64().map(|r| (currency.clone(), r)))
            .collect();

        let mut rate_table = RateTable::new(&code, rates);
        rate_table.date = data.get("date").and_then(|d| d.as_str()).map(str::to_string);
        Ok(rate_table)
    }
}
