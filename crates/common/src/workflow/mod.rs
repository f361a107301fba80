//! Manuscript workflow core
//!
//! - `machine`: the pure lifecycle transition function
//! - `model`: papers, reviews, payments and directory records
//! - `store`: the persistence seam and its in-memory implementation
//! - `Workflow`: the engine that loads state, runs a transition, stores
//!   artifacts and commits the outcome with its notifications

mod engine;
pub mod machine;
pub mod model;
pub mod notices;
pub mod paper_code;
mod payments;
mod queries;
mod reviews;
pub mod store;

pub use engine::{NewPaper, Workflow, WorkflowSettings};
pub use machine::{Action, Actor, Audience, Effect, Notice, Relationship, TransitionResult};
pub use model::{
    Decision, Paper, PaperKey, PaperStatus, PaperVersion, Payment, PaymentMethod, PaymentStatus,
    Rating, Review, ReviewRatings, SupplementaryAnswers, UserRecord,
};
pub use payments::{PaymentDecision, PaymentSubmission};
pub use queries::{Download, PaperHistory, PaperQuery};
pub use reviews::ReviewSubmission;
pub use store::{ChangeSet, InMemoryStore, PaperFilter, PaymentFilter, UserQuery, WorkflowStore};

#[cfg(test)]
pub(crate) mod testing;
