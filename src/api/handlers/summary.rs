use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::SummaryQuery;
use crate::core::analytics::{PortfolioSummary, summarize, value_assets};
use axum::{
    Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;
use tracing::info;

/// Totals of the caller's assets in the requested display currency.
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Query(params), _): WithRejection<Query<SummaryQuery>, ApiError>,
) -> ApiResult<Json<PortfolioSummary>> {
    let currency = params
        .currency
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.config.currency.clone());

    let assets = state.store.assets_for(user.id)?;
    let valued = value_assets(&assets, &state.pricing).await;
    let rates = state
        .rates
        .fetch_rates(&currency)
        .await
        .map_err(ApiError::upstream)?;

    let summary = summarize(&valued, &rates, &currency);
    info!(
        user_id = %user.id,
        "Summarized {} assets: {:.2} {}",
        summary.asset_count,
        summary.total_value,
        summary.currency
    );
    Ok(Json(summary))
}
