use crate::api::AppState;
use crate::api::auth::AdminUser;
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{ListParams, Page, UserView, compare_text, matches_search, paginate};
use crate::core::allocation::AssetCategory;
use crate::core::models::User;
use axum::{
    Json,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;
use tracing::debug;

const SORT_FIELDS: &[&str] = &["createdAt", "lastAccessAt", "name", "email"];

fn view(state: &AppState, user: User) -> ApiResult<UserView> {
    let assets = state.store.assets_for(user.id)?;
    let mut categories: Vec<AssetCategory> = Vec::new();
    for asset in &assets {
        if !categories.contains(&asset.category) {
            categories.push(asset.category);
        }
    }
    let providers = state
        .store
        .accounts_for(user.id)?
        .into_iter()
        .map(|account| account.provider)
        .collect();

    Ok(UserView {
        is_admin: state.config.is_admin(&user.email),
        asset_count: assets.len(),
        categories,
        providers,
        user,
    })
}

/// Lists users with their asset statistics and linked sign-in providers.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, ApiError>,
) -> ApiResult<Json<Page<UserView>>> {
    let field = params.sort_field(SORT_FIELDS, "createdAt")?;
    let order = params.sort_order()?;
    let search = params.search_term();

    let mut users: Vec<User> = state
        .store
        .list_users()?
        .into_iter()
        .filter(|user| {
            search.as_deref().is_none_or(|term| {
                matches_search(term, &[Some(user.name.as_str()), Some(user.email.as_str())])
            })
        })
        .collect();

    users.sort_by(|a, b| {
        order.apply(match field {
            "lastAccessAt" => a.last_access_at.cmp(&b.last_access_at),
            "name" => compare_text(&a.name, &b.name),
            "email" => a.email.cmp(&b.email),
            _ => a.created_at.cmp(&b.created_at),
        })
    });

    let page = paginate(users, &params);
    let items = page
        .items
        .into_iter()
        .map(|user| view(&state, user))
        .collect::<ApiResult<Vec<_>>>()?;

    debug!(admin_id = %admin.id, "Listing {} of {} users", items.len(), page.total);
    Ok(Json(Page {
        items,
        total: page.total,
        page: page.page,
        limit: page.limit,
        total_pages: page.total_pages,
    }))
}
