//! In-memory implementation of `WorkflowStore`.
//!
//! All state sits behind one `RwLock`, so a commit is trivially atomic.
//! Everything is lost on restart; used by tests and local runs.

use super::{ChangeSet, PaperFilter, PaperWrite, PaymentFilter, PaymentWrite, UserQuery, WorkflowStore};
use crate::errors::{AppError, Result};
use crate::notify::{DeliveryStatus, OutboxEntry, OutboxStore};
use crate::workflow::model::{Paper, PaperKey, Payment, PaymentStatus, Review, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// How long a claimed outbox row stays invisible to other dispatchers
const CLAIM_LEASE_SECS: i64 = 300;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserRecord>,
    papers: HashMap<Uuid, Paper>,
    reviews: Vec<Review>,
    payments: HashMap<Uuid, Payment>,
    counters: HashMap<String, i64>,
    outbox: Vec<(OutboxEntry, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user in the directory
    pub async fn add_user(&self, user: UserRecord) {
        self.state.write().await.users.insert(user.id, user);
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
}

/// Reject a change set before anything is applied
fn validate(state: &State, change: &ChangeSet) -> Result<()> {
    match &change.paper {
        Some(PaperWrite::Insert(paper)) => {
            if state.papers.contains_key(&paper.id)
                || state.papers.values().any(|p| p.code == paper.code)
            {
                return Err(AppError::Conflict {
                    message: format!("Paper {} already exists", paper.code),
                });
            }
        }
        Some(PaperWrite::Update {
            paper,
            expected_revision,
        }) => {
            let stored = state
                .papers
                .get(&paper.id)
                .ok_or_else(|| AppError::PaperNotFound {
                    id: paper.id.to_string(),
                })?;
            if stored.revision != *expected_revision {
                return Err(AppError::Conflict {
                    message: format!(
                        "Paper {} was modified concurrently; reload and retry",
                        paper.code
                    ),
                });
            }
        }
        None => {}
    }

    if let Some(review) = &change.review {
        let duplicate = state.reviews.iter().any(|r| {
            r.paper_id == review.paper_id
                && r.reviewer_id == review.reviewer_id
                && r.paper_version == review.paper_version
        });
        if duplicate {
            return Err(AppError::DuplicateReview {
                reviewer_id: review.reviewer_id.to_string(),
                version: review.paper_version,
            });
        }
    }

    if let Some(PaymentWrite::Insert(payment)) = &change.payment {
        let open = state.payments.values().any(|p| {
            p.paper_id == payment.paper_id
                && matches!(p.status, PaymentStatus::Pending | PaymentStatus::Verified)
        });
        if open {
            return Err(AppError::Conflict {
                message: "This paper already has an open payment".to_string(),
            });
        }
    }

    if let Some(PaymentWrite::Decide(payment)) = &change.payment {
        let stored = state
            .payments
            .get(&payment.id)
            .ok_or_else(|| AppError::PaymentNotFound {
                id: payment.id.to_string(),
            })?;
        if stored.status != PaymentStatus::Pending {
            return Err(AppError::PaymentAlreadyDecided {
                id: payment.id.to_string(),
                status: stored.status.to_string(),
            });
        }
    }

    Ok(())
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn next_sequence(&self, counter: &str) -> Result<i64> {
        let mut state = self.state.write().await;
        let seq = state.counters.entry(counter.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn search_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>> {
        let state = self.state.read().await;
        let mut users: Vec<UserRecord> = state
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users.truncate(query.limit as usize);
        Ok(users)
    }

    async fn find_paper(&self, key: &PaperKey) -> Result<Option<Paper>> {
        let state = self.state.read().await;
        let paper = match key {
            PaperKey::Id(id) => state.papers.get(id).cloned(),
            PaperKey::Code(_) => state.papers.values().find(|p| key.matches(p)).cloned(),
        };
        Ok(paper)
    }

    async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        let state = self.state.read().await;
        let mut papers: Vec<Paper> = state
            .papers
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut papers, |p| p.created_at);
        Ok(papers)
    }

    async fn list_reviews(&self, paper_id: Uuid) -> Result<Vec<Review>> {
        let state = self.state.read().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| r.paper_id == paper_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| r.created_at);
        Ok(reviews)
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        newest_first(&mut payments, |p| p.created_at);
        Ok(payments)
    }

    async fn commit(&self, change: ChangeSet) -> Result<()> {
        let mut state = self.state.write().await;
        validate(&state, &change)?;

        match change.paper {
            Some(PaperWrite::Insert(paper)) | Some(PaperWrite::Update { paper, .. }) => {
                state.papers.insert(paper.id, paper);
            }
            None => {}
        }

        if let Some(review) = change.review {
            state.reviews.push(review);
        }

        match change.payment {
            Some(PaymentWrite::Insert(payment)) | Some(PaymentWrite::Decide(payment)) => {
                state.payments.insert(payment.id, payment);
            }
            None => {}
        }

        let now = Utc::now();
        for message in change.outbox {
            let entry = OutboxEntry {
                id: Uuid::now_v7(),
                message,
                status: DeliveryStatus::Pending,
                attempts: 0,
                last_error: None,
                created_at: now,
                sent_at: None,
            };
            state.outbox.push((entry, now));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn claim_due(&self, limit: u64) -> Result<Vec<OutboxEntry>> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let lease_until = now + Duration::seconds(CLAIM_LEASE_SECS);

        let mut claimed = Vec::new();
        for (entry, next_attempt_at) in state.outbox.iter_mut() {
            if claimed.len() as u64 >= limit {
                break;
            }
            if entry.status == DeliveryStatus::Pending && *next_attempt_at <= now {
                entry.attempts += 1;
                *next_attempt_at = lease_until;
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some((entry, _)) = state.outbox.iter_mut().find(|(e, _)| e.id == id) {
            entry.status = DeliveryStatus::Sent;
            entry.sent_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, retry_at: Option<DateTime<Utc>>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some((entry, next_attempt_at)) = state.outbox.iter_mut().find(|(e, _)| e.id == id) {
            entry.last_error = Some(error.to_string());
            match retry_at {
                Some(at) => {
                    entry.status = DeliveryStatus::Pending;
                    *next_attempt_at = at;
                }
                None => entry.status = DeliveryStatus::Failed,
            }
        }
        Ok(())
    }

    async fn recent(&self, limit: u64) -> Result<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .rev()
            .take(limit as usize)
            .map(|(entry, _)| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use std::sync::Arc;

    fn user(name: &str, role: Role, verified: bool) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            role,
            verified,
        }
    }

    #[tokio::test]
    async fn test_concurrent_sequence_has_no_gaps() {
        let store = Arc::new(InMemoryStore::new());

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.next_sequence("paper-25").await.unwrap() })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (1..=50).collect::<Vec<i64>>());

        // Counters are independent per name
        assert_eq!(store.next_sequence("paper-26").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_search() {
        let store = InMemoryStore::new();
        store.add_user(user("Rita", Role::Reviewer, true)).await;
        store.add_user(user("Ravi", Role::Reviewer, false)).await;
        store.add_user(user("Rhea", Role::Editor, true)).await;

        let query = UserQuery {
            text: Some("R".to_string()),
            role: Some(Role::Reviewer),
            limit: 20,
        };
        let found = store.search_users(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Rita");

        let by_email = UserQuery {
            text: Some("RHEA@EXAMPLE".to_string()),
            ..UserQuery::default()
        };
        assert_eq!(store.search_users(&by_email).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_respects_limit_and_lease() {
        let store = InMemoryStore::new();
        let outbox = (0..3)
            .map(|i| crate::notify::OutboundMessage {
                recipient: format!("r{}@example.org", i),
                subject: "s".to_string(),
                html: "h".to_string(),
            })
            .collect();
        store
            .commit(ChangeSet {
                outbox,
                ..ChangeSet::default()
            })
            .await
            .unwrap();

        let first = store.claim_due(2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|e| e.attempts == 1));

        // Leased rows are not handed out twice
        let second = store.claim_due(10).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(store.claim_due(10).await.unwrap().len(), 0);
    }
}
