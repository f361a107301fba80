//! Admin handlers: editor assignment, user directory and notification log

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::paper_key;
use crate::AppState;
use reviewflow_common::{
    auth::{AuthContext, Role},
    errors::Result,
    notify::OutboxEntry,
    workflow::{Paper, UserRecord},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignEditorRequest {
    pub paper_id: String,
    pub editor_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignEditorRequest {
    pub paper_id: String,
    pub new_editor_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchParams {
    pub q: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationLogParams {
    #[serde(default = "default_log_limit")]
    pub limit: u64,
}

fn default_log_limit() -> u64 {
    100
}

pub async fn assign_editor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AssignEditorRequest>,
) -> Result<Json<Paper>> {
    let key = paper_key(&request.paper_id)?;
    let paper = state
        .workflow
        .assign_editor(&auth.identity, &key, request.editor_id)
        .await?;
    Ok(Json(paper))
}

pub async fn reassign_editor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ReassignEditorRequest>,
) -> Result<Json<Paper>> {
    let key = paper_key(&request.paper_id)?;
    let paper = state
        .workflow
        .reassign_editor(&auth.identity, &key, request.new_editor_id)
        .await?;
    Ok(Json(paper))
}

/// Verified users matching `q`, optionally of one role
pub async fn search_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<UserSearchParams>,
) -> Result<Json<Vec<UserRecord>>> {
    let role = params
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(str::parse::<Role>)
        .transpose()?;

    let users = state
        .workflow
        .search_users(&auth.identity, params.q, role)
        .await?;
    Ok(Json(users))
}

/// Recent outbox rows with delivery state
pub async fn notification_log(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<NotificationLogParams>,
) -> Result<Json<Vec<OutboxEntry>>> {
    let entries = state
        .workflow
        .notification_log(&auth.identity, params.limit)
        .await?;
    Ok(Json(entries))
}
