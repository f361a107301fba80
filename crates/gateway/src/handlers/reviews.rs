//! Peer review handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use super::{form::Form, paper_key};
use crate::AppState;
use reviewflow_common::{
    auth::AuthContext,
    errors::Result,
    workflow::{Decision, Review, ReviewSubmission, SupplementaryAnswers},
};

/// Submit a review for the current manuscript version.
///
/// Multipart fields: `ratings` and `additionalQuestions` as JSON,
/// `recommendation`, `confidentialCommentsToEditor`, `commentsToAuthor`,
/// plus up to ten `reviewFiles` parts.
pub async fn submit_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Review>)> {
    let key = paper_key(&paper_id)?;
    let mut form = Form::read(multipart).await?;

    let answers = match form.text("additionalQuestions") {
        Some(raw) if !raw.trim().is_empty() => form.json("additionalQuestions")?,
        _ => SupplementaryAnswers::default(),
    };
    let submission = ReviewSubmission {
        ratings: form.json("ratings")?,
        answers,
        recommendation: form.required("recommendation")?.parse::<Decision>()?,
        confidential_comments: form.text("confidentialCommentsToEditor").map(String::from),
        comments_to_author: form.text("commentsToAuthor").map(String::from),
    };
    let attachments = form.take_files("reviewFiles");

    let review = state
        .workflow
        .submit_review(&auth.identity, &key, submission, attachments)
        .await?;

    tracing::info!(
        review_id = %review.id,
        paper_id = %review.paper_id,
        request_id = %auth.request_id,
        "Review recorded"
    );

    Ok((StatusCode::CREATED, Json(review)))
}

/// Reviews of a paper, newest first
pub async fn list_reviews(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<String>,
) -> Result<Json<Vec<Review>>> {
    let key = paper_key(&paper_id)?;
    let reviews = state.workflow.list_reviews(&auth.identity, &key).await?;
    Ok(Json(reviews))
}
