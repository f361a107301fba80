//! Review aggregate manager

use super::engine::{observe, Parties, Workflow};
use super::machine::{self, Action, Actor};
use super::model::{Decision, PaperKey, Review, ReviewRatings, SupplementaryAnswers};
use super::store::ChangeSet;
use crate::auth::Identity;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::{ArtifactRef, Upload, UploadPolicy};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

/// A reviewer's evaluation as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSubmission {
    pub ratings: ReviewRatings,
    #[serde(default)]
    pub answers: SupplementaryAnswers,
    pub recommendation: Decision,
    #[serde(default)]
    pub confidential_comments: Option<String>,
    #[serde(default)]
    pub comments_to_author: Option<String>,
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl Workflow {
    /// Record an assigned reviewer's evaluation and move the paper to Review Received.
    ///
    /// One review per reviewer per manuscript version.
    #[instrument(skip(self, identity, submission, attachments), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn submit_review(
        &self,
        identity: &Identity,
        key: &PaperKey,
        submission: ReviewSubmission,
        attachments: Vec<Upload>,
    ) -> Result<Review> {
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result = machine::transition(
                paper.status,
                Action::SubmitReview,
                &Actor::of(identity, &paper),
            )?;

            let version = paper.current_version();
            let existing = self.store.list_reviews(paper.id).await?;
            if existing
                .iter()
                .any(|r| r.reviewer_id == identity.user_id && r.paper_version == version)
            {
                return Err(AppError::DuplicateReview {
                    reviewer_id: identity.user_id.to_string(),
                    version,
                });
            }

            UploadPolicy::REVIEW_ATTACHMENT.check_all(&attachments)?;

            let mut stored: Vec<ArtifactRef> = Vec::with_capacity(attachments.len());
            for upload in &attachments {
                match self
                    .store_upload(Some(upload), "review_files", &UploadPolicy::REVIEW_ATTACHMENT)
                    .await
                {
                    Ok(reference) => stored.push(reference),
                    Err(e) => {
                        self.discard(&stored).await;
                        return Err(e);
                    }
                }
            }

            let review = Review {
                id: Uuid::now_v7(),
                paper_id: paper.id,
                reviewer_id: identity.user_id,
                paper_version: version,
                ratings: submission.ratings,
                answers: submission.answers,
                recommendation: submission.recommendation,
                confidential_comments: non_blank(submission.confidential_comments),
                comments_to_author: non_blank(submission.comments_to_author),
                attachments: stored.clone(),
                created_at: Utc::now(),
            };

            paper.status = result.next;
            let change = ChangeSet {
                review: Some(review.clone()),
                ..ChangeSet::default()
            };
            let paper = self
                .commit_with_artifacts(paper, &result.effects, &Parties::of(identity), change, &stored)
                .await?;

            metrics::record_review(review.recommendation.as_str());
            info!(
                paper_code = %paper.code,
                review_id = %review.id,
                version,
                "Review submitted"
            );
            Ok::<Review, AppError>(review)
        };
        observe(Action::SubmitReview.name(), outcome.await)
    }

    /// Reviews of a paper, newest first.
    ///
    /// Visible to admins, the owner, assigned reviewers and the assigned
    /// editor. Confidential comments are included for every permitted viewer.
    pub async fn list_reviews(&self, identity: &Identity, key: &PaperKey) -> Result<Vec<Review>> {
        let paper = self.load_paper(key).await?;
        if !Actor::of(identity, &paper).is_party() {
            return Err(AppError::forbidden("You may not view reviews for this paper"));
        }
        self.store.list_reviews(paper.id).await
    }
}
