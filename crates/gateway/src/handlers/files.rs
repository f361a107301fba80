//! Artifact downloads

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use super::paper_key;
use crate::AppState;
use reviewflow_common::{auth::AuthContext, errors::Result};

/// Stream the manuscript (or, for production editors, the final file)
pub async fn download(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<String>,
) -> Result<Response> {
    let key = paper_key(&paper_id)?;
    let download = state.workflow.download(&auth.identity, &key).await?;

    tracing::debug!(
        file_name = %download.file_name,
        size = download.artifact.meta.size,
        "Serving artifact"
    );

    let disposition = format!("attachment; filename=\"{}\"", download.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, download.artifact.meta.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.artifact.bytes,
    )
        .into_response())
}
