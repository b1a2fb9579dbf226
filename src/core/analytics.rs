//! Portfolio-level calculations built on valuation, conversion and grouping.
use crate::core::allocation::{CategoryTotal, CurrencyTotal, group_by_category, group_by_currency};
use crate::core::currency::{RateTable, convert};
use crate::core::models::{Asset, DEFAULT_CURRENCY, Investment, Operation, Transaction};
use crate::core::price::PriceQuote;
use crate::core::valuation::valuate;
use crate::providers::caching::PricingGateway;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 60.0 * 60.0;

/// Prices every symbol-bearing asset with one gateway lookup and returns
/// the valuated copies in input order.
pub async fn value_assets(assets: &[Asset], gateway: &PricingGateway) -> Vec<Asset> {
    let symbols: Vec<String> = assets
        .iter()
        .filter_map(|asset| asset.symbol.clone())
        .collect();
    let prices = gateway.get_prices(&symbols).await;
    debug!(
        "Priced {} of {} symbols for {} assets",
        prices.len(),
        symbols.len(),
        assets.len()
    );
    assets.iter().map(|asset| valuate(asset, &prices)).collect()
}

/// Totals of a user's assets in one display currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub currency: String,
    pub total_value: f64,
    pub asset_count: usize,
    pub by_category: Vec<CategoryTotal>,
    pub by_currency: Vec<CurrencyTotal>,
}

/// Summarizes already valuated assets. `rates` must be the table for
/// `currency`.
pub fn summarize(assets: &[Asset], rates: &RateTable, currency: &str) -> PortfolioSummary {
    let total_value = assets
        .iter()
        .map(|asset| {
            convert(
                asset.current_valuation.amount,
                &asset.current_valuation.currency,
                rates,
            )
        })
        .sum();

    PortfolioSummary {
        currency: currency.to_uppercase(),
        total_value,
        asset_count: assets.len(),
        by_category: group_by_category(assets, rates),
        by_currency: group_by_currency(assets, rates),
    }
}

/// Position and return figures for one investment, in the investment's own
/// currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentPerformance {
    pub currency: String,
    pub units: f64,
    pub cost_basis: f64,
    pub realized_gain: f64,
    pub income: f64,
    pub net_deposits: f64,
    pub current_value: f64,
    pub gain: f64,
    pub return_pct: f64,
    pub transaction_count: usize,
}

/// Cash moved by a transaction. Income and cash movements recorded without
/// units carry their amount in `price_per_unit`.
fn cash_amount(transaction: &Transaction) -> f64 {
    if transaction.shares != 0.0 {
        transaction.shares * transaction.price_per_unit
    } else {
        transaction.price_per_unit
    }
}

fn years_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds() as f64 / SECONDS_PER_YEAR).max(0.0)
}

/// Replays an investment's transactions in date order.
///
/// Sells reduce the cost basis at average cost. A priced investment is worth
/// `units × price`; without a price it is carried at cost. An investment with
/// no symbol is worth its net deposits, each grown by `annual_interest_rate`
/// percent simple interest from its own date until `now`.
pub fn investment_performance(
    investment: &Investment,
    quote: Option<&PriceQuote>,
    now: DateTime<Utc>,
) -> InvestmentPerformance {
    let mut transactions: Vec<&Transaction> = investment.transactions.iter().collect();
    transactions.sort_by_key(|transaction| transaction.date);

    let rate = investment.annual_interest_rate.unwrap_or(0.0) / 100.0;
    let mut units = 0.0;
    let mut cost_basis = 0.0;
    let mut realized_gain = 0.0;
    let mut income = 0.0;
    let mut net_deposits = 0.0;
    let mut accrued_deposits = 0.0;

    for transaction in &transactions {
        match transaction.operation {
            Operation::Buy => {
                units += transaction.shares;
                cost_basis += cash_amount(transaction);
            }
            Operation::Sell => {
                let sold = transaction.shares.min(units);
                let average_cost = if units > 0.0 { cost_basis / units } else { 0.0 };
                realized_gain += sold * (transaction.price_per_unit - average_cost);
                cost_basis -= sold * average_cost;
                units -= sold;
            }
            Operation::Dividend | Operation::Interest => income += cash_amount(transaction),
            Operation::Deposit | Operation::Withdrawal => {
                let amount = match transaction.operation {
                    Operation::Deposit => cash_amount(transaction),
                    _ => -cash_amount(transaction),
                };
                net_deposits += amount;
                accrued_deposits += amount * (1.0 + rate * years_between(transaction.date, now));
            }
        }
    }

    let (current_value, invested) = if investment.symbol.is_some() {
        let value = match quote.and_then(|q| q.price) {
            Some(price) => units * price,
            None => cost_basis,
        };
        (value, cost_basis)
    } else {
        (accrued_deposits, net_deposits)
    };

    let gain = current_value - invested + realized_gain + income;
    let return_pct = if invested > 0.0 {
        gain / invested * 100.0
    } else {
        0.0
    };

    let currency = quote
        .and_then(|q| q.currency.clone())
        .or_else(|| transactions.first().map(|t| t.currency.clone()))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    InvestmentPerformance {
        currency,
        units,
        cost_basis,
        realized_gain,
        income,
        net_deposits,
        current_value,
        gain,
        return_pct,
        transaction_count: transactions.len(),
    }
}
