//! Request and response bodies plus list query handling.

use crate::api::error::{ApiError, ApiResult, FieldErrors};
use crate::core::allocation::AssetCategory;
use crate::core::models::{Operation, User, Valuation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Query parameters shared by every list endpoint. Each endpoint reads the
/// filters that apply to it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub action: Option<String>,
    pub error_type: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl ListParams {
    /// The requested sort field, which must be one of `allowed`.
    pub fn sort_field<'a>(&'a self, allowed: &[&str], default: &'a str) -> ApiResult<&'a str> {
        match self.sort.as_deref() {
            None => Ok(default),
            Some(field) if allowed.contains(&field) => Ok(field),
            Some(field) => Err(ApiError::field(
                "sort",
                format!("Cannot sort by {field}; expected one of {}", allowed.join(", ")),
            )),
        }
    }

    pub fn sort_order(&self) -> ApiResult<SortOrder> {
        match self.order.as_deref().map(str::to_lowercase).as_deref() {
            None | Some("desc") => Ok(SortOrder::Desc),
            Some("asc") => Ok(SortOrder::Asc),
            Some(_) => Err(ApiError::field("order", "Order must be asc or desc")),
        }
    }

    /// Lowercased search term, if a non-blank one was given.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn category_filter(&self) -> ApiResult<Option<AssetCategory>> {
        match self.category.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::field("category", format!("Unknown category: {raw}"))),
        }
    }

    pub fn user_id_filter(&self) -> ApiResult<Option<Uuid>> {
        match self.user_id.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| ApiError::field("userId", "Invalid user id")),
        }
    }
}

/// Case-insensitive match of a lowercased `term` in any of `fields`.
pub fn matches_search(term: &str, fields: &[Option<&str>]) -> bool {
    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(term))
}

pub fn compare_f64(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Slices `items` to the requested page. `page` is 1-based; `limit`
/// defaults to 20 and is capped at 100.
pub fn paginate<T>(items: Vec<T>, params: &ListParams) -> Page<T> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1).max(1);
    let total = items.len();
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    Page {
        items,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    }
}

pub fn parse_id(raw: &str, resource: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid {resource} id: {raw}")))
}

fn check_category(errors: &mut FieldErrors, raw: &str) -> Option<AssetCategory> {
    match raw.parse() {
        Ok(category) => Some(category),
        Err(_) => {
            errors.add("category", format!("Unknown category: {raw}"));
            None
        }
    }
}

fn check_description(errors: &mut FieldErrors, description: &str) {
    if description.trim().is_empty() {
        errors.add("description", "Description is required");
    }
}

fn check_non_negative(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    if let Some(value) = value {
        if !value.is_finite() || value < 0.0 {
            errors.add(field, format!("{field} must be a non-negative number"));
        }
    }
}

fn check_currency(errors: &mut FieldErrors, field: &str, currency: &str) {
    let code = currency.trim();
    if code.len() < 3 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.add(field, "Currency must be a currency code such as USD");
    }
}

/// Trims a symbol, mapping blank input to no symbol.
pub fn normalize_symbol(symbol: Option<String>) -> Option<String> {
    symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInput {
    pub category: String,
    pub description: String,
    pub symbol: Option<String>,
    pub shares: Option<f64>,
    pub current_valuation: Option<Valuation>,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl AssetInput {
    pub fn validate(&self) -> ApiResult<AssetCategory> {
        let mut errors = FieldErrors::default();
        let category = check_category(&mut errors, &self.category);
        check_description(&mut errors, &self.description);
        check_non_negative(&mut errors, "shares", self.shares);
        if let Some(valuation) = &self.current_valuation {
            check_non_negative(&mut errors, "currentValuation.amount", Some(valuation.amount));
            check_currency(&mut errors, "currentValuation.currency", &valuation.currency);
        }
        errors.into_result()?;
        Ok(category.unwrap_or(AssetCategory::Other))
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field
/// (`None`, via `#[serde(default)]`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial asset update. Absent fields are left alone; an empty `symbol`
/// removes the symbol, and `null` clears `shares` or `notes`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPatch {
    pub category: Option<String>,
    pub description: Option<String>,
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub shares: Option<Option<f64>>,
    pub current_valuation: Option<Valuation>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl AssetPatch {
    pub fn validate(&self) -> ApiResult<Option<AssetCategory>> {
        let mut errors = FieldErrors::default();
        let category = self
            .category
            .as_deref()
            .and_then(|raw| check_category(&mut errors, raw));
        if let Some(description) = &self.description {
            check_description(&mut errors, description);
        }
        check_non_negative(&mut errors, "shares", self.shares.flatten());
        if let Some(valuation) = &self.current_valuation {
            check_non_negative(&mut errors, "currentValuation.amount", Some(valuation.amount));
            check_currency(&mut errors, "currentValuation.currency", &valuation.currency);
        }
        errors.into_result()?;
        Ok(category)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentInput {
    pub category: String,
    pub description: String,
    pub symbol: Option<String>,
    pub annual_interest_rate: Option<f64>,
}

impl InvestmentInput {
    pub fn validate(&self) -> ApiResult<AssetCategory> {
        let mut errors = FieldErrors::default();
        let category = check_category(&mut errors, &self.category);
        check_description(&mut errors, &self.description);
        check_non_negative(&mut errors, "annualInterestRate", self.annual_interest_rate);
        errors.into_result()?;
        Ok(category.unwrap_or(AssetCategory::Other))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub date: Option<DateTime<Utc>>,
    pub operation: String,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub price_per_unit: f64,
    pub currency: Option<String>,
    pub note: Option<String>,
}

impl TransactionInput {
    pub fn validate(&self) -> ApiResult<Operation> {
        let mut errors = FieldErrors::default();
        let operation = match self.operation.parse::<Operation>() {
            Ok(operation) => Some(operation),
            Err(_) => {
                errors.add(
                    "operation",
                    "Operation must be one of buy, sell, dividend, interest, deposit, withdrawal",
                );
                None
            }
        };
        check_non_negative(&mut errors, "shares", Some(self.shares));
        check_non_negative(&mut errors, "pricePerUnit", Some(self.price_per_unit));
        if matches!(operation, Some(Operation::Buy | Operation::Sell)) && self.shares == 0.0 {
            errors.add("shares", "Buy and sell transactions need a share count");
        }
        if let Some(currency) = &self.currency {
            check_currency(&mut errors, "currency", currency);
        }
        errors.into_result()?;
        Ok(operation.unwrap_or(Operation::Buy))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInput {
    pub action: String,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub error_stack: Option<String>,
    pub url: Option<String>,
    pub request_method: Option<String>,
    pub user_agent: Option<String>,
}

impl LogInput {
    pub fn validate(&self) -> ApiResult<()> {
        if self.action.trim().is_empty() {
            return Err(ApiError::field("action", "Action is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    pub base: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub currency: Option<String>,
}

/// A user as listed to administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub is_admin: bool,
    pub asset_count: usize,
    pub categories: Vec<AssetCategory>,
    pub providers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<usize>, limit: Option<usize>) -> ListParams {
        ListParams {
            page,
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_paginate_defaults_and_caps() {
        let items: Vec<usize> = (0..250).collect();

        let page = paginate(items.clone(), &params(None, None));
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.total, 250);
        assert_eq!(page.total_pages, 13);

        let page = paginate(items.clone(), &params(Some(2), Some(500)));
        assert_eq!(page.limit, 100);
        assert_eq!(page.items.first(), Some(&100));

        let page = paginate(items.clone(), &params(Some(0), Some(0)));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);

        let page = paginate(items, &params(Some(99), None));
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_sort_params() {
        let mut p = ListParams::default();
        assert_eq!(p.sort_field(&["date"], "createdAt").unwrap(), "createdAt");
        assert_eq!(p.sort_order().unwrap(), SortOrder::Desc);

        p.sort = Some("date".to_string());
        p.order = Some("ASC".to_string());
        assert_eq!(p.sort_field(&["date"], "createdAt").unwrap(), "date");
        assert_eq!(p.sort_order().unwrap(), SortOrder::Asc);

        p.sort = Some("password".to_string());
        p.order = Some("sideways".to_string());
        assert!(p.sort_field(&["date"], "createdAt").is_err());
        assert!(p.sort_order().is_err());
    }

    #[test]
    fn test_asset_input_validation() {
        let input: AssetInput = serde_json::from_value(serde_json::json!({
            "category": "gold",
            "description": " ",
            "shares": -1.0
        }))
        .unwrap();
        match input.validate().unwrap_err() {
            ApiError::Validation { fields } => {
                assert_eq!(fields.len(), 3);
                assert!(fields.contains_key("category"));
                assert!(fields.contains_key("description"));
                assert!(fields.contains_key("shares"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let input: AssetInput = serde_json::from_value(serde_json::json!({
            "category": "option",
            "description": "Calls"
        }))
        .unwrap();
        assert_eq!(input.validate().unwrap(), AssetCategory::Options);
    }

    #[test]
    fn test_asset_patch_null_clears_and_absent_keeps() {
        let patch: AssetPatch = serde_json::from_value(serde_json::json!({
            "shares": null,
            "notes": "rebalanced"
        }))
        .unwrap();
        assert_eq!(patch.shares, Some(None));
        assert_eq!(patch.notes, Some(Some("rebalanced".to_string())));
        assert!(patch.validate().is_ok());

        let patch: AssetPatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(patch.shares, None);
        assert_eq!(patch.notes, None);

        let patch: AssetPatch =
            serde_json::from_value(serde_json::json!({"shares": -2.0})).unwrap();
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_transaction_input_validation() {
        let input: TransactionInput = serde_json::from_value(serde_json::json!({
            "operation": "buy",
            "pricePerUnit": 10.0
        }))
        .unwrap();
        assert!(input.validate().is_err());

        let input: TransactionInput = serde_json::from_value(serde_json::json!({
            "operation": "dividend",
            "pricePerUnit": 3.5
        }))
        .unwrap();
        assert_eq!(input.validate().unwrap(), Operation::Dividend);
    }

    #[test]
    fn test_search_matching() {
        assert!(matches_search("apple", &[None, Some("Apple Inc.")]));
        assert!(!matches_search("pear", &[Some("Apple Inc."), None]));
        assert_eq!(normalize_symbol(Some(" aapl ".to_string())).as_deref(), Some("AAPL"));
        assert_eq!(normalize_symbol(Some("  ".to_string())), None);
    }
}
