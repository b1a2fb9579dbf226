//! Client error log ingestion and the admin log viewer.

use crate::api::AppState;
use crate::api::auth::{AdminUser, AuthUser};
use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{ListParams, LogInput, Page, compare_text, matches_search, paginate};
use crate::core::models::LogEntry;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const SORT_FIELDS: &[&str] = &["createdAt", "action"];

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    WithRejection(Query(params), _): WithRejection<Query<ListParams>, ApiError>,
) -> ApiResult<Json<Page<LogEntry>>> {
    let field = params.sort_field(SORT_FIELDS, "createdAt")?;
    let order = params.sort_order()?;
    let user_id = params.user_id_filter()?;
    let search = params.search_term();

    let mut logs: Vec<LogEntry> = state
        .store
        .list_logs()?
        .into_iter()
        .filter(|entry| {
            params
                .action
                .as_deref()
                .is_none_or(|action| entry.action == action)
        })
        .filter(|entry| {
            params
                .error_type
                .as_deref()
                .is_none_or(|error_type| entry.error_type.as_deref() == Some(error_type))
        })
        .filter(|entry| user_id.is_none_or(|id| entry.user_id == Some(id)))
        .filter(|entry| {
            search.as_deref().is_none_or(|term| {
                matches_search(
                    term,
                    &[
                        Some(entry.action.as_str()),
                        entry.error_message.as_deref(),
                        entry.url.as_deref(),
                    ],
                )
            })
        })
        .collect();

    logs.sort_by(|a, b| {
        order.apply(match field {
            "action" => compare_text(&a.action, &b.action),
            _ => a.created_at.cmp(&b.created_at),
        })
    });

    debug!(admin_id = %admin.id, "Listing {} log entries", logs.len());
    Ok(Json(paginate(logs, &params)))
}

/// Records a client-side event. Anonymous reports are accepted; a report
/// identical to one seen within the dedup window is dropped.
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    user: Option<AuthUser>,
    headers: HeaderMap,
    WithRejection(Json(input), _): WithRejection<Json<LogInput>, ApiError>,
) -> ApiResult<Response> {
    input.validate()?;

    let user_agent = input.user_agent.or_else(|| {
        headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    });
    let entry = LogEntry {
        id: Uuid::new_v4(),
        user_id: user.map(|AuthUser(user)| user.id),
        action: input.action.trim().to_string(),
        error_type: input.error_type,
        error_message: input.error_message,
        error_stack: input.error_stack,
        url: input.url,
        request_method: input.request_method,
        user_agent,
        created_at: Utc::now(),
    };

    if !state.recent_errors.admit(&entry.fingerprint()).await {
        return Ok((StatusCode::OK, Json(json!({ "deduplicated": true }))).into_response());
    }

    state.store.append_log(&entry)?;
    info!(action = %entry.action, "Recorded client log");
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}
