//! Persistence abstraction for the workflow core.
//!
//! Reads are plain lookups. Every write a workflow operation makes is
//! bundled into one `ChangeSet` and applied by `commit` atomically:
//! either the paper, review, payment and outbox rows all land, or none do.

mod memory;

pub use memory::InMemoryStore;

use super::model::{Paper, PaperKey, PaperStatus, Payment, Review, UserRecord};
use crate::auth::Role;
use crate::errors::Result;
use crate::notify::{OutboundMessage, OutboxStore};
use async_trait::async_trait;
use uuid::Uuid;

/// Paper write guarded by the revision the caller read
#[derive(Debug, Clone)]
pub enum PaperWrite {
    Insert(Paper),
    /// Fails with `Conflict` unless the stored revision equals `expected_revision`.
    /// The stored row takes `paper.revision`, which the engine sets to expected + 1.
    Update { paper: Paper, expected_revision: i64 },
}

/// Payment write; decisions only apply to a payment that is still Pending
#[derive(Debug, Clone)]
pub enum PaymentWrite {
    Insert(Payment),
    Decide(Payment),
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub paper: Option<PaperWrite>,
    pub review: Option<Review>,
    pub payment: Option<PaymentWrite>,
    pub outbox: Vec<OutboundMessage>,
}

/// Filter for paper listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperFilter {
    pub author_id: Option<Uuid>,
    pub editor_id: Option<Uuid>,
    pub reviewer_id: Option<Uuid>,
    /// Only these statuses, when set
    pub statuses: Option<Vec<PaperStatus>>,
    pub exclude_statuses: Vec<PaperStatus>,
}

impl PaperFilter {
    pub fn matches(&self, paper: &Paper) -> bool {
        self.author_id.map_or(true, |id| paper.author_id == id)
            && self.editor_id.map_or(true, |id| paper.editor_id == Some(id))
            && self.reviewer_id.map_or(true, |id| paper.is_reviewer(id))
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&paper.status))
            && !self.exclude_statuses.contains(&paper.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub author_id: Option<Uuid>,
    pub paper_id: Option<Uuid>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.author_id.map_or(true, |id| payment.author_id == id)
            && self.paper_id.map_or(true, |id| payment.paper_id == id)
    }
}

/// Directory search over verified users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    /// Case-insensitive substring of name or email
    pub text: Option<String>,
    pub role: Option<Role>,
    pub limit: u64,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            text: None,
            role: None,
            limit: 20,
        }
    }
}

impl UserQuery {
    pub fn matches(&self, user: &UserRecord) -> bool {
        if !user.verified {
            return false;
        }
        if self.role.is_some_and(|role| user.role != role) {
            return false;
        }
        match self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => {
                let needle = text.to_lowercase();
                user.name.to_lowercase().contains(&needle)
                    || user.email.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

/// Storage used by the workflow engine
#[async_trait]
pub trait WorkflowStore: OutboxStore + Send + Sync {
    /// Atomically increment the named counter and return the new value (first call yields 1)
    async fn next_sequence(&self, counter: &str) -> Result<i64>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Users for the given ids; unknown ids are skipped
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserRecord>>;

    async fn search_users(&self, query: &UserQuery) -> Result<Vec<UserRecord>>;

    async fn find_paper(&self, key: &PaperKey) -> Result<Option<Paper>>;

    /// Matching papers, newest first
    async fn list_papers(&self, filter: &PaperFilter) -> Result<Vec<Paper>>;

    /// Reviews of a paper, newest first
    async fn list_reviews(&self, paper_id: Uuid) -> Result<Vec<Review>>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>>;

    /// Matching payments, newest first
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>>;

    /// Apply every write of one operation atomically
    async fn commit(&self, change: ChangeSet) -> Result<()>;

    /// Check connectivity of the backing store
    async fn ping(&self) -> Result<()>;
}
