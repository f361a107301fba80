//! Read-side operations: role-filtered listings, history, downloads and
//! directory search. None of these mutate state.

use super::engine::Workflow;
use super::machine::Actor;
use super::model::{Paper, PaperKey, PaperStatus, PaperVersion, UserRecord};
use super::store::{PaperFilter, UserQuery};
use crate::auth::{Identity, Role};
use crate::errors::{AppError, Result};
use crate::notify::OutboxEntry;
use crate::storage::Artifact;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Directory searches never return more than this many users
const SEARCH_LIMIT: u64 = 20;

/// Query parameters of a paper listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperQuery {
    /// A status display name, or "All"
    #[serde(default)]
    pub status: Option<String>,
    /// Admin only
    #[serde(default)]
    pub author: Option<Uuid>,
    /// Admin only
    #[serde(default)]
    pub reviewer: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperHistory {
    pub code: String,
    pub title: String,
    pub status: PaperStatus,
    pub current_version: i32,
    pub versions: Vec<PaperVersion>,
    pub author_id: Uuid,
    pub reviewer_ids: Vec<Uuid>,
}

impl From<Paper> for PaperHistory {
    fn from(paper: Paper) -> Self {
        Self {
            current_version: paper.current_version(),
            code: paper.code,
            title: paper.title,
            status: paper.status,
            versions: paper.versions,
            author_id: paper.author_id,
            reviewer_ids: paper.reviewer_ids,
        }
    }
}

/// An artifact with the file name it should be served under
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub artifact: Artifact,
}

fn with_extension(stem: String, original: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
        None => stem,
    }
}

impl Workflow {
    /// Papers visible to the caller, newest first
    pub async fn list_papers(&self, identity: &Identity, query: PaperQuery) -> Result<Vec<Paper>> {
        let mut filter = PaperFilter::default();

        let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let show_all = status == Some("All");
        if let Some(status) = status.filter(|_| !show_all) {
            filter.statuses = Some(vec![status.parse()?]);
        }

        match identity.role {
            Role::Author => filter.author_id = Some(identity.user_id),
            Role::Editor => filter.editor_id = Some(identity.user_id),
            Role::Reviewer => {
                filter.reviewer_id = Some(identity.user_id);
                if status.is_none() {
                    filter.exclude_statuses = vec![PaperStatus::Accepted, PaperStatus::Rejected];
                }
            }
            Role::Admin => {
                filter.author_id = query.author;
                filter.reviewer_id = query.reviewer;
            }
            Role::ProductionEditor => {}
        }

        debug!(role = %identity.role, ?filter, "Listing papers");
        self.store.list_papers(&filter).await
    }

    /// Version history; visible to the paper's parties only
    pub async fn paper_history(&self, identity: &Identity, key: &PaperKey) -> Result<PaperHistory> {
        let paper = self.load_paper(key).await?;
        if !Actor::of(identity, &paper).is_party() {
            return Err(AppError::forbidden("You may not view this paper's history"));
        }
        Ok(paper.into())
    }

    /// Current manuscript for the paper's parties, final file for production
    pub async fn download(&self, identity: &Identity, key: &PaperKey) -> Result<Download> {
        let paper = self.load_paper(key).await?;

        let (reference, stem) = if identity.role == Role::ProductionEditor {
            let reference = paper.final_artifact.clone().ok_or_else(|| AppError::NotFound {
                resource_type: "final file".to_string(),
                id: paper.code.clone(),
            })?;
            (reference, format!("final_paper_{}", paper.code))
        } else if Actor::of(identity, &paper).is_party() {
            (
                paper.current_artifact.clone(),
                format!("paper_{}_v{}", paper.code, paper.current_version()),
            )
        } else {
            return Err(AppError::forbidden("You may not download this paper"));
        };

        let artifact = self.artifacts.fetch(&reference).await?;
        let file_name = with_extension(stem, &artifact.meta.file_name);
        debug!(paper_code = %paper.code, file_name = %file_name, "Serving artifact");
        Ok(Download { file_name, artifact })
    }

    /// Verified reviewers matching `text`, for editors picking reviewers
    pub async fn search_reviewers(
        &self,
        identity: &Identity,
        text: Option<String>,
    ) -> Result<Vec<UserRecord>> {
        if !matches!(identity.role, Role::Editor | Role::Admin) {
            return Err(AppError::forbidden("Only editors may search reviewers"));
        }
        self.store
            .search_users(&UserQuery {
                text,
                role: Some(Role::Reviewer),
                limit: SEARCH_LIMIT,
            })
            .await
    }

    /// Admin directory search over verified users
    pub async fn search_users(
        &self,
        identity: &Identity,
        text: Option<String>,
        role: Option<Role>,
    ) -> Result<Vec<UserRecord>> {
        if identity.role != Role::Admin {
            return Err(AppError::forbidden("Only an admin may search users"));
        }
        self.store
            .search_users(&UserQuery {
                text,
                role,
                limit: SEARCH_LIMIT,
            })
            .await
    }

    /// Most recent outbox rows with their delivery state
    pub async fn notification_log(&self, identity: &Identity, limit: u64) -> Result<Vec<OutboxEntry>> {
        if identity.role != Role::Admin {
            return Err(AppError::forbidden("Only an admin may view the notification log"));
        }
        self.store.recent(limit.clamp(1, 500)).await
    }
}
