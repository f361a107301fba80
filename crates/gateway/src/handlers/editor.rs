//! Editor handlers: reviewer assignment, decisions and reviewer search

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::paper_key;
use crate::AppState;
use reviewflow_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    workflow::{Decision, Paper, UserRecord},
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignReviewersRequest {
    pub paper_id: String,

    #[validate(length(min = 1, max = 20))]
    pub reviewer_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub paper_id: String,
    pub decision: Decision,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewerSearchParams {
    pub q: Option<String>,
}

pub async fn assign_reviewers(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AssignReviewersRequest>,
) -> Result<Json<Paper>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("reviewerIds".to_string()),
    })?;

    let key = paper_key(&request.paper_id)?;
    let paper = state
        .workflow
        .assign_reviewers(&auth.identity, &key, request.reviewer_ids)
        .await?;
    Ok(Json(paper))
}

pub async fn record_decision(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Paper>> {
    let key = paper_key(&request.paper_id)?;
    let paper = state
        .workflow
        .record_decision(&auth.identity, &key, request.decision)
        .await?;

    tracing::info!(
        paper_code = %paper.code,
        decision = %request.decision,
        request_id = %auth.request_id,
        "Editorial decision recorded"
    );

    Ok(Json(paper))
}

/// Verified reviewers matching `q`
pub async fn search_reviewers(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(params): Query<ReviewerSearchParams>,
) -> Result<Json<Vec<UserRecord>>> {
    let reviewers = state
        .workflow
        .search_reviewers(&auth.identity, params.q)
        .await?;
    Ok(Json(reviewers))
}
