//! Production handlers: final formatted file and publication status

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Deserialize;

use super::{form::Form, paper_key};
use crate::AppState;
use reviewflow_common::{
    auth::AuthContext,
    errors::Result,
    workflow::{Paper, PaperStatus},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePublicationRequest {
    /// Paper id or code
    #[serde(alias = "productionId")]
    pub paper_id: String,
    pub status: String,
}

/// Attach the final formatted file (file part `finalFile`)
pub async fn upload_final(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Paper>> {
    let key = paper_key(&paper_id)?;
    let mut form = Form::read(multipart).await?;

    let paper = state
        .workflow
        .upload_final(&auth.identity, &key, form.take_file("finalFile"))
        .await?;

    tracing::info!(
        paper_code = %paper.code,
        request_id = %auth.request_id,
        "Final file uploaded"
    );

    Ok(Json(paper))
}

/// Move a paper through Awaiting Proof, Proof Approved and Published
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<UpdatePublicationRequest>,
) -> Result<Json<Paper>> {
    let key = paper_key(&request.paper_id)?;
    let target = request.status.parse::<PaperStatus>()?;

    let paper = state
        .workflow
        .update_publication_status(&auth.identity, &key, target)
        .await?;

    Ok(Json(paper))
}
