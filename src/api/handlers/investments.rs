//! Investments and their embedded transaction ledgers.

use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    InvestmentInput, ListParams, Page, TransactionInput, compare_text, matches_search,
    normalize_symbol, paginate, parse_id,
};
use crate::core::analytics::{InvestmentPerformance, investment_performance};
use crate::core::models::{DEFAULT_CURRENCY, Investment, Transaction, User};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SORT_FIELDS: &[&str] = &["createdAt", "updatedAt", "description", "category"];

fn load(state: &AppState, user: &User, raw_id: &str) -> ApiResult<Investment> {
    let id = parse_id(raw_id, "investment")?;
    state
        .store
        .get_investment(user.id, id)?
        .ok_or_else(|| ApiError::not_found("Investment"))
}

fn build_transaction(id: Uuid, input: TransactionInput) -> ApiResult<Transaction> {
    let operation = input.validate()?;
    Ok(Transaction {
        id,
        date: input.date.unwrap_or_else(Utc::now),
        operation,
        shares: input.shares,
        price_per_unit: input.price_per_unit,
        currency: input
            .currency
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        note: input.note,
    })
}

pub async fn list_investments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, ApiError>,
) -> ApiResult<Json<Page<Investment>>> {
    let field = params.sort_field(SORT_FIELDS, "createdAt")?;
    let order = params.sort_order()?;
    let category = params.category_filter()?;
    let search = params.search_term();

    let mut investments: Vec<Investment> = state
        .store
        .investments_for(user.id)?
        .into_iter()
        .filter(|investment| category.is_none_or(|c| investment.category == c))
        .filter(|investment| {
            search.as_deref().is_none_or(|term| {
                matches_search(
                    term,
                    &[
                        Some(investment.description.as_str()),
                        investment.symbol.as_deref(),
                    ],
                )
            })
        })
        .collect();

    investments.sort_by(|a, b| {
        order.apply(match field {
            "updatedAt" => a.updated_at.cmp(&b.updated_at),
            "description" => compare_text(&a.description, &b.description),
            "category" => a.category.as_str().cmp(b.category.as_str()),
            _ => a.created_at.cmp(&b.created_at),
        })
    });

    Ok(Json(paginate(investments, &params)))
}

pub async fn create_investment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(input), _): WithRejection<Json<InvestmentInput>, ApiError>,
) -> ApiResult<(StatusCode, Json<Investment>)> {
    let category = input.validate()?;
    let mut investment = Investment::new(user.id, category, input.description.trim());
    investment.symbol = normalize_symbol(input.symbol);
    investment.annual_interest_rate = input.annual_interest_rate;
    state.store.save_investment(&investment)?;

    info!(user_id = %user.id, investment_id = %investment.id, "Created investment");
    Ok((StatusCode::CREATED, Json(investment)))
}

pub async fn get_investment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Investment>> {
    Ok(Json(load(&state, &user, &id)?))
}

/// Replaces an investment's details. Its transactions are kept.
pub async fn update_investment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    WithRejection(Json(input), _): WithRejection<Json<InvestmentInput>, ApiError>,
) -> ApiResult<Json<Investment>> {
    let mut investment = load(&state, &user, &id)?;
    investment.category = input.validate()?;
    investment.description = input.description.trim().to_string();
    investment.symbol = normalize_symbol(input.symbol);
    investment.annual_interest_rate = input.annual_interest_rate;
    investment.updated_at = Utc::now();
    state.store.save_investment(&investment)?;

    info!(user_id = %user.id, investment_id = %investment.id, "Updated investment");
    Ok(Json(investment))
}

pub async fn delete_investment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "investment")?;
    if !state.store.delete_investment(user.id, id)? {
        return Err(ApiError::not_found("Investment"));
    }
    info!(user_id = %user.id, investment_id = %id, "Deleted investment");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let investment = load(&state, &user, &id)?;
    Ok(Json(investment.transactions.iter().cloned().collect()))
}

pub async fn add_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    WithRejection(Json(input), _): WithRejection<Json<TransactionInput>, ApiError>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let mut investment = load(&state, &user, &id)?;
    let transaction = build_transaction(Uuid::new_v4(), input)?;
    let transaction_id = investment.transactions.insert(transaction);
    investment.updated_at = Utc::now();
    state.store.save_investment(&investment)?;

    let stored = investment
        .transactions
        .get(&transaction_id)
        .cloned()
        .ok_or_else(|| ApiError::not_found("Transaction"))?;
    info!(investment_id = %investment.id, transaction_id = %transaction_id, "Added transaction");
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((id, transaction_id)): Path<(String, String)>,
    WithRejection(Json(input), _): WithRejection<Json<TransactionInput>, ApiError>,
) -> ApiResult<Json<Transaction>> {
    let mut investment = load(&state, &user, &id)?;
    let transaction_id = parse_id(&transaction_id, "transaction")?;
    let updated = build_transaction(transaction_id, input)?;

    let Some(slot) = investment.transactions.get_mut(&transaction_id) else {
        return Err(ApiError::not_found("Transaction"));
    };
    *slot = updated.clone();
    investment.updated_at = Utc::now();
    state.store.save_investment(&investment)?;

    info!(investment_id = %investment.id, transaction_id = %transaction_id, "Updated transaction");
    Ok(Json(updated))
}

pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((id, transaction_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut investment = load(&state, &user, &id)?;
    let transaction_id = parse_id(&transaction_id, "transaction")?;
    if investment.transactions.remove(&transaction_id).is_none() {
        return Err(ApiError::not_found("Transaction"));
    }
    investment.updated_at = Utc::now();
    state.store.save_investment(&investment)?;

    info!(investment_id = %investment.id, transaction_id = %transaction_id, "Deleted transaction");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_performance(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<InvestmentPerformance>> {
    let investment = load(&state, &user, &id)?;
    let quote = match &investment.symbol {
        Some(symbol) => state
            .pricing
            .get_prices(std::slice::from_ref(symbol))
            .await
            .remove(symbol),
        None => None,
    };
    Ok(Json(investment_performance(
        &investment,
        quote.as_ref(),
        Utc::now(),
    )))
}
