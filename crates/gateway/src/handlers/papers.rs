//! Paper submission, listing and history handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{form::Form, paper_key};
use crate::AppState;
use reviewflow_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    workflow::{NewPaper, Paper, PaperHistory, PaperQuery},
};

/// Text fields of a new submission
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaperRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(min = 1, max = 10000))]
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// Submit a new manuscript (`title`, `abstract`, file part `paper`)
pub async fn submit_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Paper>)> {
    let mut form = Form::read(multipart).await?;

    let request = SubmitPaperRequest {
        title: form.required("title")?.to_string(),
        abstract_text: form.required("abstract")?.to_string(),
    };
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let manuscript = form.take_file("paper");
    let paper = state
        .workflow
        .submit_paper(
            &auth.identity,
            NewPaper {
                title: request.title,
                abstract_text: request.abstract_text,
            },
            manuscript,
        )
        .await?;

    tracing::info!(
        paper_code = %paper.code,
        request_id = %auth.request_id,
        "Paper submitted"
    );

    Ok((StatusCode::CREATED, Json(paper)))
}

/// Papers visible to the caller, newest first
pub async fn list_papers(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PaperQuery>,
) -> Result<Json<Vec<Paper>>> {
    let papers = state.workflow.list_papers(&auth.identity, query).await?;
    Ok(Json(papers))
}

/// Version history of one paper
pub async fn paper_history(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<PaperHistory>> {
    let key = paper_key(&id)?;
    let history = state.workflow.paper_history(&auth.identity, &key).await?;
    Ok(Json(history))
}

/// Upload a revised manuscript (file part `file`)
pub async fn resubmit(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Paper>> {
    let key = paper_key(&id)?;
    let mut form = Form::read(multipart).await?;

    let paper = state
        .workflow
        .resubmit(&auth.identity, &key, form.take_file("file"))
        .await?;

    tracing::info!(
        paper_code = %paper.code,
        version = paper.current_version(),
        request_id = %auth.request_id,
        "Revision submitted"
    );

    Ok(Json(paper))
}
