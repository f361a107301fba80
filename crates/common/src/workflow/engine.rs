//! Paper lifecycle engine
//!
//! Each operation follows the same shape: load the paper, resolve the
//! caller's relationship, run `machine::transition`, check inputs, store
//! any artifact, then commit the updated paper and its rendered
//! notifications as one `ChangeSet`. Artifacts stored for a change that
//! fails to commit are discarded again.

use super::machine::{self, Action, Actor, Audience, Effect};
use super::model::{Decision, Paper, PaperKey, PaperStatus, UserRecord};
use super::notices::{self, NoticeContext};
use super::paper_code;
use super::store::{ChangeSet, PaperWrite, WorkflowStore};
use crate::auth::{Identity, Role};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::notify::OutboundMessage;
use crate::storage::{ArtifactRef, ArtifactStore, Upload, UploadPolicy};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    /// Recipient of new-submission notices; none when unset
    pub admin_address: Option<String>,
}

/// Fields of a new manuscript submission
#[derive(Debug, Clone)]
pub struct NewPaper {
    pub title: String,
    pub abstract_text: String,
}

/// Who besides the paper's own parties a notification may address
pub(super) struct Parties<'a> {
    pub actor: &'a Identity,
    pub previous_editor: Option<Uuid>,
    pub new_reviewers: &'a [Uuid],
}

impl<'a> Parties<'a> {
    pub fn of(actor: &'a Identity) -> Self {
        Self {
            actor,
            previous_editor: None,
            new_reviewers: &[],
        }
    }
}

pub struct Workflow {
    pub(super) store: Arc<dyn WorkflowStore>,
    pub(super) artifacts: Arc<dyn ArtifactStore>,
    settings: WorkflowSettings,
}

/// Record the outcome of an operation and pass it through
pub(super) fn observe<T>(action: &str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => metrics::record_transition(action, "ok"),
        Err(e) => metrics::record_transition(action, e.kind()),
    }
    result
}

pub(super) fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

impl Workflow {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        artifacts: Arc<dyn ArtifactStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            artifacts,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    pub(super) async fn load_paper(&self, key: &PaperKey) -> Result<Paper> {
        self.store
            .find_paper(key)
            .await?
            .ok_or_else(|| AppError::PaperNotFound { id: key.to_string() })
    }

    /// Check an upload against its policy and persist it
    pub(super) async fn store_upload(
        &self,
        upload: Option<&Upload>,
        field: &str,
        policy: &UploadPolicy,
    ) -> Result<ArtifactRef> {
        let upload = upload.ok_or_else(|| AppError::MissingField {
            field: field.to_string(),
        })?;
        policy.check(upload)?;

        let reference = self.artifacts.store(upload).await?;
        metrics::record_artifact_bytes(policy.kind, upload.len());
        Ok(reference)
    }

    /// Best-effort cleanup of artifacts whose owning write did not commit
    pub(super) async fn discard(&self, references: &[ArtifactRef]) {
        let outcomes = join_all(references.iter().map(|r| self.artifacts.discard(r))).await;
        for (reference, outcome) in references.iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!(reference = %reference, error = %e, "Failed to discard orphaned artifact");
            }
        }
    }

    async fn addresses(&self, ids: &[Uuid]) -> Result<Vec<String>> {
        let users = self.store.find_users(ids).await?;
        if users.len() < ids.len() {
            warn!(
                requested = ids.len(),
                found = users.len(),
                "Some notification recipients are missing from the directory"
            );
        }
        Ok(users.into_iter().map(|u| u.email).collect())
    }

    async fn recipients(
        &self,
        audience: Audience,
        paper: &Paper,
        parties: &Parties<'_>,
    ) -> Result<Vec<String>> {
        match audience {
            Audience::Author => self.addresses(&[paper.author_id]).await,
            Audience::Admin => Ok(self.settings.admin_address.iter().cloned().collect()),
            Audience::Editor => match paper.editor_id {
                Some(id) => self.addresses(&[id]).await,
                None => Ok(Vec::new()),
            },
            Audience::PreviousEditor => match parties.previous_editor {
                Some(id) => self.addresses(&[id]).await,
                None => Ok(Vec::new()),
            },
            Audience::NewReviewers => self.addresses(parties.new_reviewers).await,
            Audience::AllReviewers => self.addresses(&paper.reviewer_ids).await,
            Audience::Actor => Ok(vec![parties.actor.email.clone()]),
        }
    }

    /// Resolve audiences and render one message per recipient
    pub(super) async fn render_effects(
        &self,
        effects: &[Effect],
        paper: &Paper,
        parties: &Parties<'_>,
    ) -> Result<Vec<OutboundMessage>> {
        let author_name = if parties.actor.user_id == paper.author_id {
            parties.actor.name.as_deref()
        } else {
            None
        };
        let ctx = NoticeContext { paper, author_name };

        let mut messages = Vec::new();
        for effect in effects {
            for recipient in self.recipients(effect.audience, paper, parties).await? {
                messages.push(notices::render(&effect.notice, &ctx, &recipient));
            }
        }
        Ok(messages)
    }

    /// Bump the revision and commit the paper with its notifications
    pub(super) async fn commit_paper(
        &self,
        mut paper: Paper,
        effects: &[Effect],
        parties: &Parties<'_>,
        mut change: ChangeSet,
    ) -> Result<Paper> {
        let expected_revision = paper.revision;
        paper.revision += 1;
        paper.updated_at = Utc::now();

        change
            .outbox
            .extend(self.render_effects(effects, &paper, parties).await?);
        change.paper = Some(PaperWrite::Update {
            paper: paper.clone(),
            expected_revision,
        });

        self.store.commit(change).await?;
        Ok(paper)
    }

    /// Commit, discarding `stored` artifacts if the commit fails
    pub(super) async fn commit_with_artifacts(
        &self,
        paper: Paper,
        effects: &[Effect],
        parties: &Parties<'_>,
        change: ChangeSet,
        stored: &[ArtifactRef],
    ) -> Result<Paper> {
        match self.commit_paper(paper, effects, parties, change).await {
            Ok(paper) => Ok(paper),
            Err(e) => {
                self.discard(stored).await;
                Err(e)
            }
        }
    }

    async fn require_user(&self, id: Uuid, role: Role, field: &str) -> Result<UserRecord> {
        let user = self
            .store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: id.to_string() })?;

        if user.role != role {
            return Err(AppError::validation(
                field,
                format!("{} is not a {}", user.name, role),
            ));
        }
        Ok(user)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create a paper at version 1 with a fresh `RPMS{YY}-{NNN}` code
    #[instrument(skip(self, identity, submission, manuscript), fields(actor_id = %identity.user_id))]
    pub async fn submit_paper(
        &self,
        identity: &Identity,
        submission: NewPaper,
        manuscript: Option<Upload>,
    ) -> Result<Paper> {
        observe("submit", self.submit_paper_inner(identity, submission, manuscript).await)
    }

    async fn submit_paper_inner(
        &self,
        identity: &Identity,
        submission: NewPaper,
        manuscript: Option<Upload>,
    ) -> Result<Paper> {
        let result = machine::submission(identity.role)?;

        let title = required_text("title", &submission.title)?;
        let abstract_text = required_text("abstract", &submission.abstract_text)?;

        let artifact = self
            .store_upload(manuscript.as_ref(), "file", &UploadPolicy::MANUSCRIPT)
            .await?;

        let now = Utc::now();
        let year = paper_code::year_bucket(now);
        let seq = match self.store.next_sequence(&paper_code::counter_name(year)).await {
            Ok(seq) => seq,
            Err(e) => {
                self.discard(std::slice::from_ref(&artifact)).await;
                return Err(e);
            }
        };

        let mut paper = Paper {
            id: Uuid::now_v7(),
            code: paper_code::format(year, seq),
            title,
            abstract_text,
            status: result.next,
            author_id: identity.user_id,
            editor_id: None,
            reviewer_ids: Vec::new(),
            final_decision: None,
            current_artifact: artifact.clone(),
            final_artifact: None,
            versions: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        paper.push_version(artifact.clone(), now);

        let parties = Parties::of(identity);
        let commit = async {
            let outbox = self.render_effects(&result.effects, &paper, &parties).await?;
            self.store
                .commit(ChangeSet {
                    paper: Some(PaperWrite::Insert(paper.clone())),
                    outbox,
                    ..ChangeSet::default()
                })
                .await
        };

        if let Err(e) = commit.await {
            self.discard(std::slice::from_ref(&artifact)).await;
            return Err(e);
        }

        metrics::record_submission(manuscript.as_ref().map_or(0, Upload::len));
        info!(paper_code = %paper.code, paper_id = %paper.id, "Paper submitted");
        Ok(paper)
    }

    // ========================================================================
    // Editor Assignment
    // ========================================================================

    /// Admin assigns the first editor to a freshly submitted paper
    #[instrument(skip(self, identity), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn assign_editor(
        &self,
        identity: &Identity,
        key: &PaperKey,
        editor_id: Uuid,
    ) -> Result<Paper> {
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result = machine::transition(
                paper.status,
                Action::AssignEditor,
                &Actor::of(identity, &paper),
            )?;
            self.require_user(editor_id, Role::Editor, "editor_id").await?;

            paper.editor_id = Some(editor_id);
            paper.status = result.next;

            let paper = self
                .commit_paper(paper, &result.effects, &Parties::of(identity), ChangeSet::default())
                .await?;
            info!(paper_code = %paper.code, editor_id = %editor_id, "Editor assigned");
            Ok::<Paper, AppError>(paper)
        };
        observe(Action::AssignEditor.name(), outcome.await)
    }

    /// Admin replaces the editor of any paper that is not yet Rejected or Published
    #[instrument(skip(self, identity), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn reassign_editor(
        &self,
        identity: &Identity,
        key: &PaperKey,
        new_editor_id: Uuid,
    ) -> Result<Paper> {
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result = machine::transition(
                paper.status,
                Action::ReassignEditor,
                &Actor::of(identity, &paper),
            )?;
            self.require_user(new_editor_id, Role::Editor, "new_editor_id")
                .await?;

            let previous_editor = paper.editor_id;
            if previous_editor == Some(new_editor_id) {
                return Err(AppError::validation(
                    "new_editor_id",
                    "This editor is already assigned to the paper",
                ));
            }

            paper.editor_id = Some(new_editor_id);
            paper.status = result.next;

            let parties = Parties {
                previous_editor,
                ..Parties::of(identity)
            };
            let paper = self
                .commit_paper(paper, &result.effects, &parties, ChangeSet::default())
                .await?;
            info!(
                paper_code = %paper.code,
                previous_editor = ?previous_editor,
                editor_id = %new_editor_id,
                "Editor reassigned"
            );
            Ok::<Paper, AppError>(paper)
        };
        observe(Action::ReassignEditor.name(), outcome.await)
    }

    // ========================================================================
    // Reviewer Assignment & Decision
    // ========================================================================

    /// Assigned editor adds reviewers; only newly added reviewers are notified
    #[instrument(skip(self, identity, reviewer_ids), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn assign_reviewers(
        &self,
        identity: &Identity,
        key: &PaperKey,
        reviewer_ids: Vec<Uuid>,
    ) -> Result<Paper> {
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result = machine::transition(
                paper.status,
                Action::AssignReviewers,
                &Actor::of(identity, &paper),
            )?;

            if reviewer_ids.is_empty() {
                return Err(AppError::MissingField {
                    field: "reviewer_ids".to_string(),
                });
            }

            let mut added: Vec<Uuid> = Vec::new();
            for id in reviewer_ids {
                self.require_user(id, Role::Reviewer, "reviewer_ids").await?;
                if !paper.is_reviewer(id) && !added.contains(&id) {
                    added.push(id);
                }
            }

            if added.is_empty() {
                return Err(AppError::validation(
                    "reviewer_ids",
                    "All selected reviewers are already assigned",
                ));
            }

            paper.reviewer_ids.extend(added.iter().copied());
            paper.status = result.next;

            let parties = Parties {
                new_reviewers: &added,
                ..Parties::of(identity)
            };
            let paper = self
                .commit_paper(paper, &result.effects, &parties, ChangeSet::default())
                .await?;
            info!(paper_code = %paper.code, added = added.len(), "Reviewers assigned");
            Ok::<Paper, AppError>(paper)
        };
        observe(Action::AssignReviewers.name(), outcome.await)
    }

    /// Assigned editor records the final decision
    #[instrument(skip(self, identity), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn record_decision(
        &self,
        identity: &Identity,
        key: &PaperKey,
        decision: Decision,
    ) -> Result<Paper> {
        let action = Action::Decide(decision);
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result =
                machine::transition(paper.status, action, &Actor::of(identity, &paper))?;

            paper.final_decision = Some(decision);
            paper.status = result.next;

            let paper = self
                .commit_paper(paper, &result.effects, &Parties::of(identity), ChangeSet::default())
                .await?;
            info!(paper_code = %paper.code, decision = %decision, status = %paper.status, "Decision recorded");
            Ok::<Paper, AppError>(paper)
        };
        observe(action.name(), outcome.await)
    }

    // ========================================================================
    // Revision
    // ========================================================================

    /// Owner (or admin) uploads a revised manuscript as version N+1
    #[instrument(skip(self, identity, revision), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn resubmit(
        &self,
        identity: &Identity,
        key: &PaperKey,
        revision: Option<Upload>,
    ) -> Result<Paper> {
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result = machine::transition(
                paper.status,
                Action::Resubmit,
                &Actor::of(identity, &paper),
            )?;

            let artifact = self
                .store_upload(revision.as_ref(), "file", &UploadPolicy::REVISION)
                .await?;

            paper.push_version(artifact.clone(), Utc::now());
            paper.status = result.next;

            let paper = self
                .commit_with_artifacts(
                    paper,
                    &result.effects,
                    &Parties::of(identity),
                    ChangeSet::default(),
                    &[artifact],
                )
                .await?;
            info!(paper_code = %paper.code, version = paper.current_version(), "Revision submitted");
            Ok::<Paper, AppError>(paper)
        };
        observe(Action::Resubmit.name(), outcome.await)
    }

    // ========================================================================
    // Production
    // ========================================================================

    /// Production editor attaches the final formatted file
    #[instrument(skip(self, identity, file), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn upload_final(
        &self,
        identity: &Identity,
        key: &PaperKey,
        file: Option<Upload>,
    ) -> Result<Paper> {
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result = machine::transition(
                paper.status,
                Action::UploadFinal,
                &Actor::of(identity, &paper),
            )?;

            let artifact = self
                .store_upload(file.as_ref(), "final_file", &UploadPolicy::FINAL_PUBLICATION)
                .await?;

            paper.final_artifact = Some(artifact.clone());
            paper.status = result.next;

            let paper = self
                .commit_with_artifacts(
                    paper,
                    &result.effects,
                    &Parties::of(identity),
                    ChangeSet::default(),
                    &[artifact],
                )
                .await?;
            info!(paper_code = %paper.code, "Final file uploaded");
            Ok::<Paper, AppError>(paper)
        };
        observe(Action::UploadFinal.name(), outcome.await)
    }

    /// Production editor moves a paper between proof stages or publishes it
    #[instrument(skip(self, identity), fields(paper = %key, actor_id = %identity.user_id))]
    pub async fn update_publication_status(
        &self,
        identity: &Identity,
        key: &PaperKey,
        target: PaperStatus,
    ) -> Result<Paper> {
        let action = Action::UpdatePublication(target);
        let outcome = async {
            let mut paper = self.load_paper(key).await?;
            let result =
                machine::transition(paper.status, action, &Actor::of(identity, &paper))?;

            if result.next == PaperStatus::Published && paper.final_artifact.is_none() {
                return Err(AppError::validation(
                    "status",
                    "A final formatted file must be uploaded before publishing",
                ));
            }

            paper.status = result.next;

            let paper = self
                .commit_paper(paper, &result.effects, &Parties::of(identity), ChangeSet::default())
                .await?;
            info!(paper_code = %paper.code, status = %paper.status, "Publication status updated");
            Ok::<Paper, AppError>(paper)
        };
        observe(action.name(), outcome.await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::OutboxStore;
    use crate::workflow::testing::{docx, payment, pdf, png, Fixture};

    #[tokio::test]
    async fn test_first_submission_of_the_year() {
        let fx = Fixture::new().await;
        let paper = fx.submit("Graph Algorithms").await;

        let year = paper_code::year_bucket(Utc::now());
        assert_eq!(paper.code, paper_code::format(year, 1));
        assert_eq!(paper.status, PaperStatus::Submitted);
        assert_eq!(paper.current_version(), 1);
        assert!(paper.versions_consistent());

        // Author and admin each get one message
        let outbox = fx.store.recent(10).await.unwrap();
        let recipients: Vec<&str> = outbox.iter().map(|e| e.message.recipient.as_str()).collect();
        assert_eq!(outbox.len(), 2);
        assert!(recipients.contains(&fx.author.email.as_str()));
        assert!(recipients.contains(&"admin@journal.example"));
    }

    #[tokio::test]
    async fn test_submission_validation() {
        let fx = Fixture::new().await;

        let err = fx
            .workflow
            .submit_paper(
                &fx.author,
                NewPaper {
                    title: "  ".to_string(),
                    abstract_text: "x".to_string(),
                },
                Some(docx()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "title"));

        let err = fx
            .workflow
            .submit_paper(
                &fx.author,
                NewPaper {
                    title: "Graph Algorithms".to_string(),
                    abstract_text: "x".to_string(),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "file"));

        let err = fx
            .workflow
            .submit_paper(
                &fx.editor,
                NewPaper {
                    title: "Graph Algorithms".to_string(),
                    abstract_text: "x".to_string(),
                },
                Some(docx()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert!(fx.artifacts.is_empty().await);
    }

    #[tokio::test]
    async fn test_artifact_store_failure_commits_nothing() {
        let fx = Fixture::new().await;
        fx.artifacts.fail_writes(true);

        let err = fx
            .workflow
            .submit_paper(
                &fx.author,
                NewPaper {
                    title: "Graph Algorithms".to_string(),
                    abstract_text: "x".to_string(),
                },
                Some(docx()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ArtifactStore { .. }));
        assert!(err.is_server_error());
        assert!(fx.store.list_papers(&Default::default()).await.unwrap().is_empty());
        assert!(fx.store.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_codes() {
        let fx = Arc::new(Fixture::new().await);

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let fx = fx.clone();
                tokio::spawn(async move { fx.submit(&format!("Paper {}", i)).await.code })
            })
            .collect();

        let mut seqs = Vec::new();
        for handle in handles {
            let code = handle.await.unwrap();
            seqs.push(paper_code::parse(&code).unwrap().1);
        }
        seqs.sort_unstable();
        assert_eq!(seqs, (1..=20).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_assign_editor_notifies_editor_and_author() {
        let fx = Fixture::new().await;
        let paper = fx.submit("Graph Algorithms").await;
        let before = fx.store.recent(100).await.unwrap().len();

        let paper = fx
            .workflow
            .assign_editor(&fx.admin, &PaperKey::Id(paper.id), fx.editor.user_id)
            .await
            .unwrap();

        assert_eq!(paper.status, PaperStatus::EditorAssigned);
        assert_eq!(paper.editor_id, Some(fx.editor.user_id));
        assert_eq!(paper.revision, 1);

        let outbox = fx.store.recent(100).await.unwrap();
        let new: Vec<_> = outbox[..outbox.len() - before].iter().collect();
        assert_eq!(new.len(), 2);
        assert!(new.iter().any(|e| e.message.recipient == fx.editor.email));
        assert!(new.iter().any(|e| e.message.recipient == fx.author.email));
    }

    #[tokio::test]
    async fn test_assign_editor_rejects_non_editor() {
        let fx = Fixture::new().await;
        let paper = fx.submit("Graph Algorithms").await;

        let err = fx
            .workflow
            .assign_editor(&fx.admin, &PaperKey::Id(paper.id), fx.reviewer1.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = fx
            .workflow
            .assign_editor(&fx.admin, &PaperKey::Id(paper.id), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserNotFound { .. }));

        let err = fx
            .workflow
            .assign_editor(&fx.editor, &PaperKey::Id(paper.id), fx.editor.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_lookup_by_code() {
        let fx = Fixture::new().await;
        let paper = fx.submit("Graph Algorithms").await;

        let key: PaperKey = paper.code.parse().unwrap();
        let assigned = fx
            .workflow
            .assign_editor(&fx.admin, &key, fx.editor.user_id)
            .await
            .unwrap();
        assert_eq!(assigned.id, paper.id);

        let missing: PaperKey = "RPMS00-999".parse().unwrap();
        let err = fx
            .workflow
            .assign_editor(&fx.admin, &missing, fx.editor.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaperNotFound { .. }));
    }

    #[tokio::test]
    async fn test_reassign_notifies_old_and_new_editor() {
        let fx = Fixture::new().await;
        let paper = fx.with_editor("Graph Algorithms").await;
        let before = fx.store.recent(100).await.unwrap().len();

        let paper = fx
            .workflow
            .reassign_editor(&fx.admin, &PaperKey::Id(paper.id), fx.editor2.user_id)
            .await
            .unwrap();
        assert_eq!(paper.status, PaperStatus::EditorReassigned);
        assert_eq!(paper.editor_id, Some(fx.editor2.user_id));

        let outbox = fx.store.recent(100).await.unwrap();
        let new: Vec<&str> = outbox[..outbox.len() - before]
            .iter()
            .map(|e| e.message.recipient.as_str())
            .collect();
        assert_eq!(new.len(), 3);
        assert!(new.contains(&fx.editor.email.as_str()));
        assert!(new.contains(&fx.editor2.email.as_str()));
        assert!(new.contains(&fx.author.email.as_str()));

        // The old editor lost their capabilities
        let err = fx
            .workflow
            .assign_reviewers(&fx.editor, &PaperKey::Id(paper.id), vec![fx.reviewer1.user_id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_reassign_after_acceptance_keeps_status() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);
        let before = fx.store.recent(100).await.unwrap().len();

        let reassigned = fx
            .workflow
            .reassign_editor(&fx.admin, &key, fx.editor2.user_id)
            .await
            .unwrap();
        assert_eq!(reassigned.status, PaperStatus::Accepted);
        assert_eq!(reassigned.editor_id, Some(fx.editor2.user_id));
        assert_eq!(fx.store.recent(100).await.unwrap().len() - before, 3);

        // Payment and production carry on from where they were
        fx.workflow
            .submit_payment(&fx.author, payment(&reassigned), Some(png()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reassign_refused_once_terminal() {
        let fx = Fixture::new().await;
        let paper = fx.reviewed("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);
        fx.workflow
            .record_decision(&fx.editor, &key, Decision::Reject)
            .await
            .unwrap();

        let err = fx
            .workflow
            .reassign_editor(&fx.admin, &key, fx.editor2.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_assign_reviewers_appends_and_notifies_new_only() {
        let fx = Fixture::new().await;
        let paper = fx.with_editor("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);

        let paper = fx
            .workflow
            .assign_reviewers(&fx.editor, &key, vec![fx.reviewer1.user_id, fx.reviewer2.user_id])
            .await
            .unwrap();
        assert_eq!(paper.status, PaperStatus::UnderReview);
        assert_eq!(paper.reviewer_ids, vec![fx.reviewer1.user_id, fx.reviewer2.user_id]);

        let before = fx.store.recent(100).await.unwrap().len();
        let paper = fx
            .workflow
            .assign_reviewers(&fx.editor, &key, vec![fx.reviewer2.user_id, fx.reviewer3.user_id])
            .await
            .unwrap();
        assert_eq!(
            paper.reviewer_ids,
            vec![fx.reviewer1.user_id, fx.reviewer2.user_id, fx.reviewer3.user_id]
        );

        let outbox = fx.store.recent(100).await.unwrap();
        let new: Vec<&str> = outbox[..outbox.len() - before]
            .iter()
            .map(|e| e.message.recipient.as_str())
            .collect();
        assert_eq!(new.len(), 2);
        assert!(new.contains(&fx.reviewer3.email.as_str()));
        assert!(new.contains(&fx.author.email.as_str()));

        let err = fx
            .workflow
            .assign_reviewers(&fx.editor, &key, vec![fx.reviewer1.user_id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_assign_reviewers_requires_reviewer_role() {
        let fx = Fixture::new().await;
        let paper = fx.with_editor("Graph Algorithms").await;

        let err = fx
            .workflow
            .assign_reviewers(&fx.editor, &PaperKey::Id(paper.id), vec![fx.author.user_id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let unchanged = fx.workflow.load_paper(&PaperKey::Id(paper.id)).await.unwrap();
        assert_eq!(unchanged.status, PaperStatus::EditorAssigned);
        assert!(unchanged.reviewer_ids.is_empty());
    }

    #[tokio::test]
    async fn test_stale_revision_conflicts() {
        let fx = Fixture::new().await;
        let paper = fx.submit("Graph Algorithms").await;

        // Two admins read revision 0; the second write must not clobber the first
        let stale = paper.clone();
        fx.workflow
            .assign_editor(&fx.admin, &PaperKey::Id(paper.id), fx.editor.user_id)
            .await
            .unwrap();

        let mut competing = stale;
        competing.editor_id = Some(fx.editor2.user_id);
        let err = fx
            .workflow
            .commit_paper(competing, &[], &Parties::of(&fx.admin), ChangeSet::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let stored = fx.workflow.load_paper(&PaperKey::Id(paper.id)).await.unwrap();
        assert_eq!(stored.editor_id, Some(fx.editor.user_id));
    }

    #[tokio::test]
    async fn test_reject_is_terminal() {
        let fx = Fixture::new().await;
        let paper = fx.reviewed("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);

        let paper = fx
            .workflow
            .record_decision(&fx.editor, &key, Decision::Reject)
            .await
            .unwrap();
        assert_eq!(paper.status, PaperStatus::Rejected);
        assert_eq!(paper.final_decision, Some(Decision::Reject));

        let err = fx
            .workflow
            .assign_reviewers(&fx.editor, &key, vec![fx.reviewer3.user_id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_decision_notifies_author_and_all_reviewers() {
        let fx = Fixture::new().await;
        let paper = fx.reviewed("Graph Algorithms").await;
        let before = fx.store.recent(100).await.unwrap().len();

        fx.workflow
            .record_decision(&fx.editor, &PaperKey::Id(paper.id), Decision::ReviseAndResubmit)
            .await
            .unwrap();

        let outbox = fx.store.recent(100).await.unwrap();
        // author + two reviewers
        assert_eq!(outbox.len() - before, 3);
    }

    #[tokio::test]
    async fn test_resubmit_appends_version() {
        let fx = Fixture::new().await;
        let paper = fx.reviewed("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);
        fx.workflow
            .record_decision(&fx.editor, &key, Decision::ReviseAndResubmit)
            .await
            .unwrap();

        let paper = fx.workflow.resubmit(&fx.author, &key, Some(pdf())).await.unwrap();
        assert_eq!(paper.status, PaperStatus::RevisedSubmitted);
        assert_eq!(paper.current_version(), 2);
        assert!(paper.versions_consistent());

        // Revisions must be PDF
        fx.workflow
            .record_decision(&fx.editor, &key, Decision::ConditionallyAccept)
            .await
            .unwrap();
        let err = fx.workflow.resubmit(&fx.admin, &key, Some(docx())).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType { .. }));

        let paper = fx.workflow.resubmit(&fx.admin, &key, Some(pdf())).await.unwrap();
        assert_eq!(paper.current_version(), 3);
    }

    #[tokio::test]
    async fn test_resubmit_by_other_author_forbidden() {
        let fx = Fixture::new().await;
        let paper = fx.reviewed("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);
        fx.workflow
            .record_decision(&fx.editor, &key, Decision::ReviseAndResubmit)
            .await
            .unwrap();

        let err = fx
            .workflow
            .resubmit(&fx.author2, &key, Some(pdf()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert_eq!(fx.workflow.load_paper(&key).await.unwrap().current_version(), 1);
    }

    #[tokio::test]
    async fn test_publication_requires_final_file() {
        let fx = Fixture::new().await;
        let paper = fx.paid("Graph Algorithms").await;
        let key = PaperKey::Id(paper.id);
        assert_eq!(paper.status, PaperStatus::ProofApproved);

        let err = fx
            .workflow
            .update_publication_status(&fx.production, &key, PaperStatus::Published)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let paper = fx
            .workflow
            .upload_final(&fx.production, &key, Some(pdf()))
            .await
            .unwrap();
        assert!(paper.final_artifact.is_some());
        assert_eq!(paper.status, PaperStatus::ProofApproved);

        let paper = fx
            .workflow
            .update_publication_status(&fx.production, &key, PaperStatus::Published)
            .await
            .unwrap();
        assert_eq!(paper.status, PaperStatus::Published);

        let outbox = fx.store.recent(1).await.unwrap();
        assert!(outbox[0].message.subject.ends_with("Published"));
    }
}
