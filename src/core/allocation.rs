use crate::core::currency::{RateTable, convert};
use crate::core::models::Asset;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Stocks,
    #[serde(rename = "option")]
    Options,
    Futures,
    Etf,
    MutualFunds,
    Bonds,
    Crypto,
    RealEstate,
    Cash,
    CertificatesOfDeposit,
    SavingsAccount,
    P2pLoans,
    Commodities,
    #[serde(other)]
    Other,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 14] = [
        AssetCategory::Stocks,
        AssetCategory::Options,
        AssetCategory::Futures,
        AssetCategory::Etf,
        AssetCategory::MutualFunds,
        AssetCategory::Bonds,
        AssetCategory::Crypto,
        AssetCategory::RealEstate,
        AssetCategory::Cash,
        AssetCategory::CertificatesOfDeposit,
        AssetCategory::SavingsAccount,
        AssetCategory::P2pLoans,
        AssetCategory::Commodities,
        AssetCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Stocks => "stocks",
            AssetCategory::Options => "option",
            AssetCategory::Futures => "futures",
            AssetCategory::Etf => "etf",
            AssetCategory::MutualFunds => "mutual_funds",
            AssetCategory::Bonds => "bonds",
            AssetCategory::Crypto => "crypto",
            AssetCategory::RealEstate => "real_estate",
            AssetCategory::Cash => "cash",
            AssetCategory::CertificatesOfDeposit => "certificates_of_deposit",
            AssetCategory::SavingsAccount => "savings_account",
            AssetCategory::P2pLoans => "p2p_loans",
            AssetCategory::Commodities => "commodities",
            AssetCategory::Other => "other",
        }
    }

    /// Coarse group the category is charted under.
    pub fn group(&self) -> DisplayGroup {
        match self {
            AssetCategory::Stocks | AssetCategory::Options | AssetCategory::Futures => {
                DisplayGroup::Stocks
            }
            AssetCategory::Etf | AssetCategory::MutualFunds => DisplayGroup::Funds,
            AssetCategory::Bonds => DisplayGroup::Bonds,
            AssetCategory::Crypto => DisplayGroup::Crypto,
            AssetCategory::RealEstate => DisplayGroup::RealEstate,
            AssetCategory::Cash
            | AssetCategory::CertificatesOfDeposit
            | AssetCategory::SavingsAccount
            | AssetCategory::P2pLoans => DisplayGroup::Cash,
            AssetCategory::Commodities => DisplayGroup::Commodities,
            AssetCategory::Other => DisplayGroup::Others,
        }
    }
}

impl Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        AssetCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == needle)
            .ok_or_else(|| anyhow::anyhow!("Invalid asset category: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayGroup {
    Stocks,
    Funds,
    Bonds,
    Crypto,
    RealEstate,
    Cash,
    Commodities,
    Others,
}

impl DisplayGroup {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayGroup::Stocks => "Stocks",
            DisplayGroup::Funds => "Funds",
            DisplayGroup::Bonds => "Bonds",
            DisplayGroup::Crypto => "Crypto",
            DisplayGroup::RealEstate => "Real Estate",
            DisplayGroup::Cash => "Cash",
            DisplayGroup::Commodities => "Commodities",
            DisplayGroup::Others => "Others",
        }
    }
}

/// One bucket of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<K> {
    pub key: K,
    pub total_value: f64,
    /// Share of the overall total, in percent.
    pub percentage_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub group: DisplayGroup,
    pub label: &'static str,
    pub total_value: f64,
    pub percentage_of_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyTotal {
    pub currency: String,
    pub total_value: f64,
    pub percentage_of_total: f64,
}

/// Sums `(key, value)` pairs per key.
///
/// Buckets are created in first-seen order and then stably sorted by
/// descending total, so equal totals keep their input order. Percentages are
/// 0 for every bucket when the overall total is 0.
pub fn aggregate<K, I>(items: I) -> Vec<Bucket<K>>
where
    K: Eq + Hash,
    I: IntoIterator<Item = (K, f64)>,
{
    let mut totals: IndexMap<K, f64> = IndexMap::new();
    for (key, value) in items {
        *totals.entry(key).or_insert(0.0) += value;
    }

    let grand_total: f64 = totals.values().sum();
    let mut buckets: Vec<Bucket<K>> = totals
        .into_iter()
        .map(|(key, total_value)| Bucket {
            key,
            total_value,
            percentage_of_total: if grand_total != 0.0 {
                total_value / grand_total * 100.0
            } else {
                0.0
            },
        })
        .collect();
    buckets.sort_by(|a, b| b.total_value.total_cmp(&a.total_value));
    buckets
}

/// Groups valued assets into display groups, summing amounts converted into
/// the rate table's base currency.
pub fn group_by_category(assets: &[Asset], rates: &RateTable) -> Vec<CategoryTotal> {
    aggregate(assets.iter().map(|asset| {
        (
            asset.category.group(),
            convert(
                asset.current_valuation.amount,
                &asset.current_valuation.currency,
                rates,
            ),
        )
    }))
    .into_iter()
    .map(|bucket| CategoryTotal {
        group: bucket.key,
        label: bucket.key.label(),
        total_value: bucket.total_value,
        percentage_of_total: bucket.percentage_of_total,
    })
    .collect()
}

/// Groups valued assets by the currency they are held in.
pub fn group_by_currency(assets: &[Asset], rates: &RateTable) -> Vec<CurrencyTotal> {
    aggregate(assets.iter().map(|asset| {
        let currency = &asset.current_valuation.currency;
        (
            currency.to_uppercase(),
            convert(asset.current_valuation.amount, currency, rates),
        )
    }))
    .into_iter()
    .map(|bucket| CurrencyTotal {
        currency: bucket.key,
        total_value: bucket.total_value,
        percentage_of_total: bucket.percentage_of_total,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Valuation;
    use std::collections::HashMap;

    fn asset(category: AssetCategory, currency: &str, amount: f64) -> Asset {
        let mut asset = Asset::new(uuid::Uuid::new_v4(), category, "test");
        asset.current_valuation = Valuation {
            currency: currency.to_string(),
            amount,
        };
        asset
    }

    #[test]
    fn test_every_category_has_a_group() {
        for category in AssetCategory::ALL {
            let parsed: AssetCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
            assert!(!category.group().label().is_empty());
        }
        assert_eq!(AssetCategory::Options.group(), DisplayGroup::Stocks);
        assert_eq!(AssetCategory::P2pLoans.group(), DisplayGroup::Cash);
        assert_eq!(
            AssetCategory::CertificatesOfDeposit.group(),
            DisplayGroup::Cash
        );
    }

    #[test]
    fn test_unknown_category_deserializes_to_other() {
        let category: AssetCategory = serde_json::from_str(r#""art""#).unwrap();
        assert_eq!(category, AssetCategory::Other);
        assert_eq!(category.group(), DisplayGroup::Others);

        let option: AssetCategory = serde_json::from_str(r#""option""#).unwrap();
        assert_eq!(option, AssetCategory::Options);
        assert_eq!(serde_json::to_string(&AssetCategory::P2pLoans).unwrap(), r#""p2p_loans""#);
    }

    #[test]
    fn test_stocks_and_options_share_a_group() {
        let assets = vec![
            asset(AssetCategory::Stocks, "USD", 100.0),
            asset(AssetCategory::Options, "USD", 50.0),
        ];
        let groups = group_by_category(&assets, &RateTable::empty("usd"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Stocks");
        assert_eq!(groups[0].total_value, 150.0);
        assert_eq!(groups[0].percentage_of_total, 100.0);
    }

    #[test]
    fn test_groups_sorted_by_descending_total() {
        let assets = vec![
            asset(AssetCategory::Cash, "USD", 10.0),
            asset(AssetCategory::Crypto, "USD", 300.0),
            asset(AssetCategory::Bonds, "USD", 90.0),
        ];
        let groups = group_by_category(&assets, &RateTable::empty("usd"));
        let labels: Vec<_> = groups.iter().map(|g| g.label).collect();
        assert_eq!(labels, vec!["Crypto", "Bonds", "Cash"]);
    }

    #[test]
    fn test_equal_totals_keep_input_order() {
        let buckets = aggregate(vec![("b", 5.0), ("a", 5.0), ("c", 7.0)]);
        let keys: Vec<_> = buckets.iter().map(|b| b.key).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_currency_percentages_sum_to_hundred() {
        let rates = RateTable::new("usd", HashMap::from([("eur".to_string(), 0.5)]));
        let assets = vec![
            asset(AssetCategory::Stocks, "USD", 100.0),
            asset(AssetCategory::Cash, "EUR", 50.0),
            asset(AssetCategory::Bonds, "usd", 200.0),
        ];
        let groups = group_by_currency(&assets, &rates);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].currency, "USD");
        assert_eq!(groups[0].total_value, 300.0);
        assert_eq!(groups[1].currency, "EUR");
        assert_eq!(groups[1].total_value, 100.0);

        let sum: f64 = groups.iter().map(|g| g.percentage_of_total).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!((groups[0].percentage_of_total - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_portfolio_has_zero_percentages() {
        let assets = vec![
            asset(AssetCategory::Stocks, "USD", 0.0),
            asset(AssetCategory::Cash, "EUR", 0.0),
        ];
        let groups = group_by_currency(&assets, &RateTable::empty("usd"));
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.percentage_of_total == 0.0));
        assert!(group_by_category(&[], &RateTable::empty("usd")).is_empty());
    }
}
