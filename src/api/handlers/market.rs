//! Symbol search and currency rates.

use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{RatesQuery, SymbolQuery};
use crate::core::currency::RateTable;
use crate::core::price::{SymbolMatch, SymbolSearchProvider};
use axum::{
    Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;
use tracing::{info, warn};

fn query_text(params: &SymbolQuery) -> ApiResult<&str> {
    params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::field("query", "Query is required"))
}

pub async fn search_symbols(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    WithRejection(Query(params), _): WithRejection<Query<SymbolQuery>, ApiError>,
) -> ApiResult<Json<Vec<SymbolMatch>>> {
    let query = query_text(&params)?;
    let matches = state
        .search
        .search(query, params.kind.as_deref())
        .await
        .map_err(|e| {
            warn!("Symbol search failed for {}: {}", query, e);
            ApiError::upstream(e)
        })?;
    info!("Symbol search for {} returned {} matches", query, matches.len());
    Ok(Json(matches))
}

/// Same as [`search_symbols`] but always asks the upstream API.
pub async fn search_symbols_direct(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    WithRejection(Query(params), _): WithRejection<Query<SymbolQuery>, ApiError>,
) -> ApiResult<Json<Vec<SymbolMatch>>> {
    let query = query_text(&params)?;
    let matches = state
        .search
        .search_direct(query, params.kind.as_deref())
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(matches))
}

pub async fn get_rates(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    WithRejection(Query(params), _): WithRejection<Query<RatesQuery>, ApiError>,
) -> ApiResult<Json<RateTable>> {
    let base = params
        .base
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| state.config.currency.clone());
    let rates = state
        .rates
        .fetch_rates(&base)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(rates))
}
