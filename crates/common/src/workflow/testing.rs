//! Shared fixture for workflow tests: an in-memory store with one user
//! per role and helpers that walk a paper through the lifecycle.

use super::engine::{NewPaper, Workflow, WorkflowSettings};
use super::model::{
    Decision, Paper, PaperKey, PaymentMethod, Rating, ReviewRatings, SupplementaryAnswers,
    UserRecord,
};
use super::payments::{PaymentDecision, PaymentSubmission};
use super::reviews::ReviewSubmission;
use super::store::InMemoryStore;
use crate::auth::{Identity, Role};
use crate::storage::{MemoryArtifactStore, Upload};
use std::sync::Arc;
use uuid::Uuid;

pub const ADMIN_ADDRESS: &str = "admin@journal.example";

pub fn docx() -> Upload {
    Upload::new(
        "manuscript.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        b"PK\x03\x04 manuscript".to_vec(),
    )
}

pub fn pdf() -> Upload {
    Upload::new("revision.pdf", "application/pdf", b"%PDF-1.7 body".to_vec())
}

pub fn png() -> Upload {
    Upload::new("receipt.png", "image/png", b"\x89PNG receipt".to_vec())
}

pub fn ratings() -> ReviewRatings {
    ReviewRatings {
        technical_quality: Rating::Good,
        significance: Rating::Excellent,
        presentation: Rating::Fair,
        relevance: Rating::Good,
        originality: Rating::Good,
        adequacy_of_citations: Rating::Poor,
        overall: Rating::Good,
        other_factors: None,
    }
}

pub fn review(recommendation: Decision) -> ReviewSubmission {
    ReviewSubmission {
        ratings: ratings(),
        answers: SupplementaryAnswers::default(),
        recommendation,
        confidential_comments: Some("Borderline novelty".to_string()),
        comments_to_author: Some("Please expand section 3".to_string()),
    }
}

pub fn payment(paper: &Paper) -> PaymentSubmission {
    PaymentSubmission {
        paper: PaperKey::Id(paper.id),
        amount: "150.00".to_string(),
        method: PaymentMethod::BankTransfer,
        transaction_id: "TXN-42".to_string(),
    }
}

pub struct Fixture {
    pub workflow: Workflow,
    pub store: Arc<InMemoryStore>,
    pub artifacts: Arc<MemoryArtifactStore>,
    pub admin: Identity,
    pub editor: Identity,
    pub editor2: Identity,
    pub reviewer1: Identity,
    pub reviewer2: Identity,
    pub reviewer3: Identity,
    pub author: Identity,
    pub author2: Identity,
    pub production: Identity,
}

fn identity(name: &str, role: Role) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        role,
        verified: true,
        email: format!("{}@journal.example", name),
        name: Some(name.to_string()),
    }
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let workflow = Workflow::new(
            store.clone(),
            artifacts.clone(),
            WorkflowSettings {
                admin_address: Some(ADMIN_ADDRESS.to_string()),
            },
        );

        let fixture = Self {
            workflow,
            store,
            artifacts,
            admin: identity("admin", Role::Admin),
            editor: identity("editor", Role::Editor),
            editor2: identity("editor2", Role::Editor),
            reviewer1: identity("reviewer1", Role::Reviewer),
            reviewer2: identity("reviewer2", Role::Reviewer),
            reviewer3: identity("reviewer3", Role::Reviewer),
            author: identity("author", Role::Author),
            author2: identity("author2", Role::Author),
            production: identity("production", Role::ProductionEditor),
        };

        for who in [
            &fixture.admin,
            &fixture.editor,
            &fixture.editor2,
            &fixture.reviewer1,
            &fixture.reviewer2,
            &fixture.reviewer3,
            &fixture.author,
            &fixture.author2,
            &fixture.production,
        ] {
            fixture
                .store
                .add_user(UserRecord {
                    id: who.user_id,
                    name: who.name.clone().unwrap_or_default(),
                    email: who.email.clone(),
                    role: who.role,
                    verified: true,
                })
                .await;
        }

        fixture
    }

    pub async fn submit(&self, title: &str) -> Paper {
        self.workflow
            .submit_paper(
                &self.author,
                NewPaper {
                    title: title.to_string(),
                    abstract_text: "We study shortest paths.".to_string(),
                },
                Some(docx()),
            )
            .await
            .unwrap()
    }

    /// Submitted, then assigned to `editor`
    pub async fn with_editor(&self, title: &str) -> Paper {
        let paper = self.submit(title).await;
        self.workflow
            .assign_editor(&self.admin, &PaperKey::Id(paper.id), self.editor.user_id)
            .await
            .unwrap()
    }

    /// Under review by reviewer1 and reviewer2
    pub async fn under_review(&self, title: &str) -> Paper {
        let paper = self.with_editor(title).await;
        self.workflow
            .assign_reviewers(
                &self.editor,
                &PaperKey::Id(paper.id),
                vec![self.reviewer1.user_id, self.reviewer2.user_id],
            )
            .await
            .unwrap()
    }

    /// Under review, with one review from reviewer1
    pub async fn reviewed(&self, title: &str) -> Paper {
        let paper = self.under_review(title).await;
        let key = PaperKey::Id(paper.id);
        self.workflow
            .submit_review(&self.reviewer1, &key, review(Decision::Accept), Vec::new())
            .await
            .unwrap();
        self.workflow.load_paper(&key).await.unwrap()
    }

    pub async fn accepted(&self, title: &str) -> Paper {
        let paper = self.reviewed(title).await;
        self.workflow
            .record_decision(&self.editor, &PaperKey::Id(paper.id), Decision::Accept)
            .await
            .unwrap()
    }

    /// Accepted, with a verified payment
    pub async fn paid(&self, title: &str) -> Paper {
        let paper = self.accepted(title).await;
        let submitted = self
            .workflow
            .submit_payment(&self.author, payment(&paper), Some(png()))
            .await
            .unwrap();
        self.workflow
            .decide_payment(
                &self.admin,
                submitted.id,
                PaymentDecision::Verified,
            )
            .await
            .unwrap();
        self.workflow.load_paper(&PaperKey::Id(paper.id)).await.unwrap()
    }
}
