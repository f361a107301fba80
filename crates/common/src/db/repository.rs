//! Repository pattern for database operations
//!
//! `Repository` is the durable `WorkflowStore`. A `ChangeSet` is applied
//! inside one transaction, so a failed revision or payment guard rolls
//! back every row of the change. Listings read from the replica when one
//! is configured; lookups that precede a guarded write read the primary.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::notify::{DeliveryStatus, OutboundMessage, OutboxEntry, OutboxStore};
use crate::storage::ArtifactRef;
use crate::workflow::model as domain;
use crate::workflow::store::{
    ChangeSet, PaperFilter, PaperWrite, PaymentFilter, PaymentWrite, UserQuery, WorkflowStore,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, Statement, TransactionTrait,
};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// How long a claimed outbox row stays invisible to other dispatchers
const CLAIM_LEASE_SECS: f64 = 300.0;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Insert or refresh a directory entry
    pub async fn upsert_user(&self, user: &domain::UserRecord) -> Result<()> {
        let model = UserActiveModel {
            id: Set(user.id),
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            role: Set(user.role.as_str().to_string()),
            verified: Set(user.verified),
            created_at: Set(Utc::now().into()),
        };

        UserEntity::insert(model)
            .on_conflict(
                OnConflict::column(UserColumn::Id)
                    .update_columns([
                        UserColumn::Name,
                        UserColumn::Email,
                        UserColumn::Role,
                        UserColumn::Verified,
                    ])
                    .to_owned(),
            )
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    async fn with_versions<C: ConnectionTrait>(
        conn: &C,
        rows: Vec<Paper>,
    ) -> Result<Vec<domain::Paper>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();
        let versions = PaperVersionEntity::find()
            .filter(PaperVersionColumn::PaperId.is_in(ids))
            .order_by_asc(PaperVersionColumn::Version)
            .all(conn)
            .await?;

        let mut by_paper: HashMap<Uuid, Vec<PaperVersion>> = HashMap::new();
        for version in versions {
            by_paper.entry(version.paper_id).or_default().push(version);
        }

        rows.into_iter()
            .map(|row| {
                let versions = by_paper.remove(&row.id).unwrap_or_default();
                paper_from_rows(row, versions)
            })
            .collect()
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn corrupt(table: &str, e: impl fmt::Display) -> AppError {
    AppError::Internal {
        message: format!("Corrupt {} row: {}", table, e),
    }
}

fn utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn fixed(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.into()
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Escape LIKE wildcards so user text matches literally
fn like_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn user_from_row(row: User) -> Result<domain::UserRecord> {
    Ok(domain::UserRecord {
        role: row.role.parse().map_err(|e| corrupt("users", e))?,
        id: row.id,
        name: row.name,
        email: row.email,
        verified: row.verified,
    })
}

fn paper_from_rows(row: Paper, versions: Vec<PaperVersion>) -> Result<domain::Paper> {
    let reviewer_ids: Vec<Uuid> =
        serde_json::from_value(row.reviewer_ids).map_err(|e| corrupt("papers", e))?;
    let final_decision = row
        .final_decision
        .map(|d| d.parse::<domain::Decision>())
        .transpose()
        .map_err(|e| corrupt("papers", e))?;

    Ok(domain::Paper {
        id: row.id,
        code: row.code,
        title: row.title,
        abstract_text: row.abstract_text,
        status: row.status.parse().map_err(|e| corrupt("papers", e))?,
        author_id: row.author_id,
        editor_id: row.editor_id,
        reviewer_ids,
        final_decision,
        current_artifact: ArtifactRef::new(row.current_artifact),
        final_artifact: row.final_artifact.map(ArtifactRef::new),
        versions: versions
            .into_iter()
            .map(|v| domain::PaperVersion {
                version: v.version,
                artifact: ArtifactRef::new(v.artifact),
                submitted_at: utc(v.submitted_at),
            })
            .collect(),
        revision: row.revision,
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    })
}

fn paper_to_active(paper: &domain::Paper) -> Result<PaperActiveModel> {
    Ok(PaperActiveModel {
        id: Set(paper.id),
        code: Set(paper.code.clone()),
        title: Set(paper.title.clone()),
        abstract_text: Set(paper.abstract_text.clone()),
        status: Set(paper.status.as_str().to_string()),
        author_id: Set(paper.author_id),
        editor_id: Set(paper.editor_id),
        reviewer_ids: Set(serde_json::to_value(&paper.reviewer_ids)?),
        final_decision: Set(paper.final_decision.map(|d| d.as_str().to_string())),
        current_artifact: Set(paper.current_artifact.as_str().to_string()),
        final_artifact: Set(paper.final_artifact.as_ref().map(|a| a.as_str().to_string())),
        revision: Set(paper.revision),
        created_at: Set(fixed(paper.created_at)),
        updated_at: Set(fixed(paper.updated_at)),
    })
}

fn versions_to_active(paper: &domain::Paper) -> Vec<PaperVersionActiveModel> {
    paper
        .versions
        .iter()
        .map(|v| PaperVersionActiveModel {
            paper_id: Set(paper.id),
            version: Set(v.version),
            artifact: Set(v.artifact.as_str().to_string()),
            submitted_at: Set(fixed(v.submitted_at)),
        })
        .collect()
}

fn review_from_row(row: Review) -> Result<domain::Review> {
    Ok(domain::Review {
        id: row.id,
        paper_id: row.paper_id,
        reviewer_id: row.reviewer_id,
        paper_version: row.paper_version,
        ratings: serde_json::from_value(row.ratings).map_err(|e| corrupt("reviews", e))?,
        answers: serde_json::from_value(row.answers).map_err(|e| corrupt("reviews", e))?,
        recommendation: row
            .recommendation
            .parse()
            .map_err(|e| corrupt("reviews", e))?,
        confidential_comments: row.confidential_comments,
        comments_to_author: row.comments_to_author,
        attachments: serde_json::from_value(row.attachments)
            .map_err(|e| corrupt("reviews", e))?,
        created_at: utc(row.created_at),
    })
}

fn review_to_active(review: &domain::Review) -> Result<ReviewActiveModel> {
    Ok(ReviewActiveModel {
        id: Set(review.id),
        paper_id: Set(review.paper_id),
        reviewer_id: Set(review.reviewer_id),
        paper_version: Set(review.paper_version),
        ratings: Set(serde_json::to_value(&review.ratings)?),
        answers: Set(serde_json::to_value(review.answers)?),
        recommendation: Set(review.recommendation.as_str().to_string()),
        confidential_comments: Set(review.confidential_comments.clone()),
        comments_to_author: Set(review.comments_to_author.clone()),
        attachments: Set(serde_json::to_value(&review.attachments)?),
        created_at: Set(fixed(review.created_at)),
    })
}

fn payment_from_row(row: Payment) -> Result<domain::Payment> {
    Ok(domain::Payment {
        id: row.id,
        paper_id: row.paper_id,
        author_id: row.author_id,
        amount: row.amount,
        method: row.method.parse().map_err(|e| corrupt("payments", e))?,
        transaction_id: row.transaction_id,
        status: row.status.parse().map_err(|e| corrupt("payments", e))?,
        rejection_reason: row.rejection_reason,
        proof: ArtifactRef::new(row.proof),
        created_at: utc(row.created_at),
        updated_at: utc(row.updated_at),
    })
}

fn payment_to_active(payment: &domain::Payment) -> PaymentActiveModel {
    PaymentActiveModel {
        id: Set(payment.id),
        paper_id: Set(payment.paper_id),
        author_id: Set(payment.author_id),
        amount: Set(payment.amount),
        method: Set(payment.method.as_str().to_string()),
        transaction_id: Set(payment.transaction_id.clone()),
        status: Set(payment.status.as_str().to_string()),
        rejection_reason: Set(payment.rejection_reason.clone()),
        proof: Set(payment.proof.as_str().to_string()),
        created_at: Set(fixed(payment.created_at)),
        updated_at: Set(fixed(payment.updated_at)),
    }
}

fn outbox_from_row(row: NotificationOutbox) -> OutboxEntry {
    OutboxEntry {
        id: row.id,
        status: row.delivery_status(),
        message: OutboundMessage {
            recipient: row.recipient,
            subject: row.subject,
            html: row.html,
        },
        attempts: row.attempts,
        last_error: row.last_error,
        created_at: utc(row.created_at),
        sent_at: row.sent_at.map(utc),
    }
}

fn outbox_to_active(message: OutboundMessage, now: DateTime<Utc>) -> NotificationOutboxActiveModel {
    NotificationOutboxActiveModel {
        id: Set(Uuid::now_v7()),
        recipient: Set(message.recipient),
        subject: Set(message.subject),
        html: Set(message.html),
        status: Set(DeliveryStatus::Pending.into()),
        attempts: Set(0),
        last_error: Set(None),
        next_attempt_at: Set(fixed(now)),
        created_at: Set(fixed(now)),
        sent_at: Set(None),
    }
}

// ============================================================================
// Workflow Store
// ============================================================================

#[async_trait]
impl WorkflowStore for Repository {
    async fn next_sequence(&self, counter: &str) -> Result<i64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO sequence_counters (name, seq)
            VALUES ($1, 1)
            ON CONFLICT (name) DO UPDATE SET seq = sequence_counters.seq + 1
            RETURNING seq
            "#,
            vec![counter.into()],
        );

        let row = self
            .write_conn()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: format!("Counter {} returned no row", counter),
            })?;
        Ok(row.try_get::<i64>("", "seq")?)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<domain::UserRecord>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await?
            .map(user_from_row)
            .transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<domain::UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        UserEntity::find()
            .filter(UserColumn::Id.is_in(ids.iter().copied()))
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(user_from_row)
            .collect()
    }

    async fn search_users(&self, query: &UserQuery) -> Result<Vec<domain::UserRecord>> {
        let mut select = UserEntity::find().filter(UserColumn::Verified.eq(true));

        if let Some(role) = query.role {
            select = select.filter(UserColumn::Role.eq(role.as_str()));
        }

        if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(text);
            select = select.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(UserColumn::Name))).like(pattern.clone()))
                    .add(Expr::expr(Func::lower(Expr::col(UserColumn::Email))).like(pattern)),
            );
        }

        select
            .order_by_asc(UserColumn::Name)
            .limit(query.limit)
            .all(self.read_conn())
            .await?
            .into_iter()
            .map(user_from_row)
            .collect()
    }

    async fn find_paper(&self, key: &domain::PaperKey) -> Result<Option<domain::Paper>> {
        let conn = self.write_conn();
        let row = match key {
            domain::PaperKey::Id(id) => PaperEntity::find_by_id(*id).one(conn).await?,
            domain::PaperKey::Code(code) => {
                PaperEntity::find()
                    .filter(PaperColumn::Code.eq(code.as_str()))
                    .one(conn)
                    .await?
            }
        };

        match row {
            Some(row) => Ok(Self::with_versions(conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<domain::Paper>> {
        let mut select = PaperEntity::find();

        if let Some(id) = filter.author_id {
            select = select.filter(PaperColumn::AuthorId.eq(id));
        }
        if let Some(id) = filter.editor_id {
            select = select.filter(PaperColumn::EditorId.eq(id));
        }
        if let Some(id) = filter.reviewer_id {
            select = select.filter(Expr::cust_with_values(
                "reviewer_ids @> ?",
                [serde_json::json!([id])],
            ));
        }
        if let Some(ref statuses) = filter.statuses {
            select = select.filter(PaperColumn::Status.is_in(statuses.iter().map(|s| s.as_str())));
        }
        if !filter.exclude_statuses.is_empty() {
            select = select.filter(
                PaperColumn::Status.is_not_in(filter.exclude_statuses.iter().map(|s| s.as_str())),
            );
        }

        let rows = select
            .order_by_desc(PaperColumn::CreatedAt)
            .all(self.read_conn())
            .await?;
        debug!(count = rows.len(), "Listed papers");
        Self::with_versions(self.read_conn(), rows).await
    }

    async fn list_reviews(&self, paper_id: Uuid) -> Result<Vec<domain::Review>> {
        ReviewEntity::find()
            .filter(ReviewColumn::PaperId.eq(paper_id))
            .order_by_desc(ReviewColumn::CreatedAt)
            .all(self.write_conn())
            .await?
            .into_iter()
            .map(review_from_row)
            .collect()
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<domain::Payment>> {
        PaymentEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .map(payment_from_row)
            .transpose()
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<domain::Payment>> {
        let mut select = PaymentEntity::find();
        if let Some(id) = filter.author_id {
            select = select.filter(PaymentColumn::AuthorId.eq(id));
        }
        if let Some(id) = filter.paper_id {
            select = select.filter(PaymentColumn::PaperId.eq(id));
        }

        select
            .order_by_desc(PaymentColumn::CreatedAt)
            .all(self.write_conn())
            .await?
            .into_iter()
            .map(payment_from_row)
            .collect()
    }

    async fn commit(&self, change: ChangeSet) -> Result<()> {
        // Dropping the transaction on an early return rolls it back
        let txn = self.write_conn().begin().await?;

        match change.paper {
            Some(PaperWrite::Insert(paper)) => {
                PaperEntity::insert(paper_to_active(&paper)?)
                    .exec(&txn)
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            AppError::Conflict {
                                message: format!("Paper {} already exists", paper.code),
                            }
                        } else {
                            e.into()
                        }
                    })?;
                PaperVersionEntity::insert_many(versions_to_active(&paper))
                    .exec(&txn)
                    .await?;
            }
            Some(PaperWrite::Update {
                paper,
                expected_revision,
            }) => {
                let updated = PaperEntity::update_many()
                    .set(paper_to_active(&paper)?)
                    .filter(PaperColumn::Id.eq(paper.id))
                    .filter(PaperColumn::Revision.eq(expected_revision))
                    .exec(&txn)
                    .await?;
                if updated.rows_affected == 0 {
                    warn!(paper_code = %paper.code, expected_revision, "Stale paper revision");
                    return Err(AppError::Conflict {
                        message: format!(
                            "Paper {} was modified concurrently; reload and retry",
                            paper.code
                        ),
                    });
                }

                // Versions are append-only; existing rows are left untouched
                PaperVersionEntity::insert_many(versions_to_active(&paper))
                    .on_conflict(
                        OnConflict::columns([PaperVersionColumn::PaperId, PaperVersionColumn::Version])
                            .do_nothing()
                            .to_owned(),
                    )
                    .do_nothing()
                    .exec(&txn)
                    .await?;
            }
            None => {}
        }

        if let Some(review) = change.review {
            ReviewEntity::insert(review_to_active(&review)?)
                .exec(&txn)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        AppError::DuplicateReview {
                            reviewer_id: review.reviewer_id.to_string(),
                            version: review.paper_version,
                        }
                    } else {
                        e.into()
                    }
                })?;
        }

        match change.payment {
            Some(PaymentWrite::Insert(payment)) => {
                PaymentEntity::insert(payment_to_active(&payment))
                    .exec(&txn)
                    .await
                    .map_err(|e| {
                        if is_unique_violation(&e) {
                            AppError::Conflict {
                                message: "This paper already has an open payment".to_string(),
                            }
                        } else {
                            e.into()
                        }
                    })?;
            }
            Some(PaymentWrite::Decide(payment)) => {
                let pending: String = domain::PaymentStatus::Pending.as_str().to_string();
                let updated = PaymentEntity::update_many()
                    .set(payment_to_active(&payment))
                    .filter(PaymentColumn::Id.eq(payment.id))
                    .filter(PaymentColumn::Status.eq(pending))
                    .exec(&txn)
                    .await?;
                if updated.rows_affected == 0 {
                    let status = PaymentEntity::find_by_id(payment.id)
                        .one(&txn)
                        .await?
                        .map(|p| p.status)
                        .ok_or_else(|| AppError::PaymentNotFound {
                            id: payment.id.to_string(),
                        })?;
                    return Err(AppError::PaymentAlreadyDecided {
                        id: payment.id.to_string(),
                        status,
                    });
                }
            }
            None => {}
        }

        if !change.outbox.is_empty() {
            let now = Utc::now();
            let rows: Vec<_> = change
                .outbox
                .into_iter()
                .map(|message| outbox_to_active(message, now))
                .collect();
            NotificationOutboxEntity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

// ============================================================================
// Notification Outbox
// ============================================================================

#[async_trait]
impl OutboxStore for Repository {
    async fn claim_due(&self, limit: u64) -> Result<Vec<OutboxEntry>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE notification_outbox
            SET attempts = attempts + 1,
                next_attempt_at = NOW() + make_interval(secs => $2)
            WHERE id IN (
                SELECT id FROM notification_outbox
                WHERE status = 'pending' AND next_attempt_at <= NOW()
                ORDER BY next_attempt_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
            vec![(limit as i64).into(), CLAIM_LEASE_SECS.into()],
        );

        let mut rows = NotificationOutboxEntity::find()
            .from_raw_sql(stmt)
            .all(self.write_conn())
            .await?;
        rows.sort_by_key(|row| row.created_at);
        Ok(rows.into_iter().map(outbox_from_row).collect())
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        let status: String = DeliveryStatus::Sent.into();
        NotificationOutboxEntity::update_many()
            .col_expr(NotificationOutboxColumn::Status, Expr::value(status))
            .col_expr(NotificationOutboxColumn::SentAt, Expr::value(fixed(Utc::now())))
            .filter(NotificationOutboxColumn::Id.eq(id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let status: String = match retry_at {
            Some(_) => DeliveryStatus::Pending.into(),
            None => DeliveryStatus::Failed.into(),
        };

        let mut update = NotificationOutboxEntity::update_many()
            .col_expr(NotificationOutboxColumn::Status, Expr::value(status))
            .col_expr(NotificationOutboxColumn::LastError, Expr::value(error.to_string()));
        if let Some(at) = retry_at {
            update = update.col_expr(NotificationOutboxColumn::NextAttemptAt, Expr::value(fixed(at)));
        }

        update
            .filter(NotificationOutboxColumn::Id.eq(id))
            .exec(self.write_conn())
            .await?;
        Ok(())
    }

    async fn recent(&self, limit: u64) -> Result<Vec<OutboxEntry>> {
        let rows = NotificationOutboxEntity::find()
            .order_by_desc(NotificationOutboxColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await?;
        Ok(rows.into_iter().map(outbox_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::PaperStatus;

    fn paper_row() -> Paper {
        let now = fixed(Utc::now());
        Paper {
            id: Uuid::new_v4(),
            code: "RPMS25-001".to_string(),
            title: "Graph Algorithms".to_string(),
            abstract_text: "Shortest paths".to_string(),
            status: "Under Review".to_string(),
            author_id: Uuid::new_v4(),
            editor_id: Some(Uuid::new_v4()),
            reviewer_ids: serde_json::json!([Uuid::new_v4(), Uuid::new_v4()]),
            final_decision: None,
            current_artifact: "v2".to_string(),
            final_artifact: None,
            revision: 7,
            created_at: now,
            updated_at: now,
        }
    }

    fn version(paper_id: Uuid, version: i32, artifact: &str) -> PaperVersion {
        PaperVersion {
            paper_id,
            version,
            artifact: artifact.to_string(),
            submitted_at: fixed(Utc::now()),
        }
    }

    #[test]
    fn test_paper_row_mapping() {
        let row = paper_row();
        let id = row.id;
        let paper =
            paper_from_rows(row, vec![version(id, 1, "v1"), version(id, 2, "v2")]).unwrap();

        assert_eq!(paper.status, PaperStatus::UnderReview);
        assert_eq!(paper.reviewer_ids.len(), 2);
        assert_eq!(paper.current_version(), 2);
        assert!(paper.versions_consistent());
        assert_eq!(paper.revision, 7);
    }

    #[test]
    fn test_corrupt_rows_are_internal_errors() {
        let mut row = paper_row();
        row.status = "Lost in the mail".to_string();
        let err = paper_from_rows(row, Vec::new()).unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));

        let mut row = paper_row();
        row.reviewer_ids = serde_json::json!({"not": "a list"});
        assert!(paper_from_rows(row, Vec::new()).is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Rita"), "%rita%");
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }

    #[test]
    fn test_new_outbox_rows_are_due_immediately() {
        let now = Utc::now();
        let row = outbox_to_active(
            OutboundMessage {
                recipient: "a@example.org".to_string(),
                subject: "s".to_string(),
                html: "h".to_string(),
            },
            now,
        );
        assert_eq!(row.status.unwrap(), "pending");
        assert_eq!(row.next_attempt_at.unwrap(), fixed(now));
        assert_eq!(row.attempts.unwrap(), 0);
    }
}
