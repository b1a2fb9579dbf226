//! Asset CRUD. Responses carry live valuations for symbol-bearing assets.

use crate::api::AppState;
use crate::api::auth::AuthUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    AssetInput, AssetPatch, ListParams, Page, compare_f64, compare_text, matches_search,
    normalize_symbol, paginate, parse_id,
};
use crate::core::analytics::value_assets;
use crate::core::currency::{RateTable, convert};
use crate::core::models::{Asset, User};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use std::slice;
use std::sync::Arc;
use tracing::{info, warn};

const SORT_FIELDS: &[&str] = &[
    "createdAt",
    "updatedAt",
    "date",
    "description",
    "category",
    "value",
];

/// Stores an asset. The amount of a symbol-bearing asset is derived from
/// live prices on every read, so it is not kept.
fn persist(state: &AppState, asset: &Asset) -> ApiResult<()> {
    if asset.symbol.is_some() {
        let mut stored = asset.clone();
        stored.current_valuation.amount = 0.0;
        state.store.save_asset(&stored)?;
    } else {
        state.store.save_asset(asset)?;
    }
    Ok(())
}

async fn with_valuation(state: &AppState, asset: Asset) -> Asset {
    let mut valued = value_assets(slice::from_ref(&asset), &state.pricing).await;
    valued.pop().unwrap_or(asset)
}

/// Rates into the configured currency, used to compare values across
/// currencies. Without rates, values compare as raw amounts.
async fn display_rates(state: &AppState) -> RateTable {
    match state.rates.fetch_rates(&state.config.currency).await {
        Ok(rates) => rates,
        Err(e) => {
            warn!("Sorting by raw amounts, rates unavailable: {}", e);
            RateTable::empty(&state.config.currency)
        }
    }
}

fn load(state: &AppState, user: &User, raw_id: &str) -> ApiResult<Asset> {
    let id = parse_id(raw_id, "asset")?;
    state
        .store
        .get_asset(user.id, id)?
        .ok_or_else(|| ApiError::not_found("Asset"))
}

pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, ApiError>,
) -> ApiResult<Json<Page<Asset>>> {
    let field = params.sort_field(SORT_FIELDS, "createdAt")?;
    let order = params.sort_order()?;
    let category = params.category_filter()?;
    let search = params.search_term();

    let assets: Vec<Asset> = state
        .store
        .assets_for(user.id)?
        .into_iter()
        .filter(|asset| category.is_none_or(|c| asset.category == c))
        .filter(|asset| {
            search.as_deref().is_none_or(|term| {
                matches_search(
                    term,
                    &[
                        Some(asset.description.as_str()),
                        asset.symbol.as_deref(),
                        asset.notes.as_deref(),
                    ],
                )
            })
        })
        .collect();

    let mut assets = value_assets(&assets, &state.pricing).await;
    let rates = if field == "value" {
        display_rates(&state).await
    } else {
        RateTable::empty(&state.config.currency)
    };
    let display_value = |asset: &Asset| {
        convert(
            asset.current_valuation.amount,
            &asset.current_valuation.currency,
            &rates,
        )
    };
    assets.sort_by(|a, b| {
        order.apply(match field {
            "updatedAt" => a.updated_at.cmp(&b.updated_at),
            "date" => a.date.cmp(&b.date),
            "description" => compare_text(&a.description, &b.description),
            "category" => a.category.as_str().cmp(b.category.as_str()),
            "value" => compare_f64(display_value(a), display_value(b)),
            _ => a.created_at.cmp(&b.created_at),
        })
    });

    info!(user_id = %user.id, "Listing {} assets", assets.len());
    Ok(Json(paginate(assets, &params)))
}

pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(input), _): WithRejection<Json<AssetInput>, ApiError>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    let category = input.validate()?;

    let mut asset = Asset::new(user.id, category, input.description.trim());
    asset.symbol = normalize_symbol(input.symbol);
    asset.shares = input.shares;
    if let Some(valuation) = input.current_valuation {
        asset.current_valuation = valuation;
    }
    if let Some(date) = input.date {
        asset.date = date;
    }
    asset.notes = input.notes;
    persist(&state, &asset)?;

    info!(user_id = %user.id, asset_id = %asset.id, "Created asset");
    Ok((StatusCode::CREATED, Json(with_valuation(&state, asset).await)))
}

pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Asset>> {
    let asset = load(&state, &user, &id)?;
    Ok(Json(with_valuation(&state, asset).await))
}

pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    WithRejection(Json(patch), _): WithRejection<Json<AssetPatch>, ApiError>,
) -> ApiResult<Json<Asset>> {
    let mut asset = load(&state, &user, &id)?;
    let category = patch.validate()?;

    if let Some(category) = category {
        asset.category = category;
    }
    if let Some(description) = patch.description {
        asset.description = description.trim().to_string();
    }
    if let Some(symbol) = patch.symbol {
        asset.symbol = normalize_symbol(Some(symbol));
    }
    if let Some(shares) = patch.shares {
        asset.shares = shares;
    }
    if let Some(valuation) = patch.current_valuation {
        asset.current_valuation = valuation;
    }
    if let Some(date) = patch.date {
        asset.date = date;
    }
    if let Some(notes) = patch.notes {
        asset.notes = notes.filter(|n| !n.trim().is_empty());
    }
    asset.updated_at = Utc::now();
    persist(&state, &asset)?;

    info!(user_id = %user.id, asset_id = %asset.id, "Updated asset");
    Ok(Json(with_valuation(&state, asset).await))
}

pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "asset")?;
    if !state.store.delete_asset(user.id, id)? {
        return Err(ApiError::not_found("Asset"));
    }
    info!(user_id = %user.id, asset_id = %id, "Deleted asset");
    Ok(StatusCode::NO_CONTENT)
}
