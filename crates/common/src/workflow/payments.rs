//! Payment verification
//!
//! Authors submit proof of payment for an accepted paper; an admin then
//! verifies or rejects it. Verification drives the paper to Proof Approved,
//! rejection only records the reason and tells the author.

use super::engine::{observe, required_text, Parties, Workflow};
use super::machine::{self, Action, Actor};
use super::model::{PaperKey, PaperStatus, Payment, PaymentMethod, PaymentStatus};
use super::store::{ChangeSet, PaymentFilter, PaymentWrite};
use crate::auth::{Identity, Role};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::{Upload, UploadPolicy};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

/// Fields of a payment submission; `amount` is parsed by the workflow
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub paper: PaperKey,
    pub amount: String,
    pub method: PaymentMethod,
    pub transaction_id: String,
}

/// Admin decision on a pending payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDecision {
    Verified,
    Rejected { reason: String },
}

impl PaymentDecision {
    /// Build a decision from its wire form. A rejection needs a non-blank reason.
    pub fn parse(status: &str, reason: Option<String>) -> Result<Self> {
        match status.parse::<PaymentStatus>()? {
            PaymentStatus::Verified => Ok(PaymentDecision::Verified),
            PaymentStatus::Rejected => {
                let reason = required_text("reason", reason.as_deref().unwrap_or_default())?;
                Ok(PaymentDecision::Rejected { reason })
            }
            other => Err(AppError::validation(
                "status",
                format!("A payment can only be Verified or Rejected, not {}", other),
            )),
        }
    }

    fn status(&self) -> PaymentStatus {
        match self {
            PaymentDecision::Verified => PaymentStatus::Verified,
            PaymentDecision::Rejected { .. } => PaymentStatus::Rejected,
        }
    }
}

/// Largest amount a `NUMERIC(12,2)` column holds, exclusive
const AMOUNT_LIMIT: i64 = 10_000_000_000;

fn parse_amount(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    let amount: Decimal = raw
        .parse()
        .map_err(|_| AppError::validation("amount", format!("'{}' is not a decimal number", raw)))?;
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("amount", "Amount must be a positive number"));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::validation("amount", "Amount has at most two decimal places"));
    }
    if amount >= Decimal::from(AMOUNT_LIMIT) {
        return Err(AppError::validation("amount", "Amount is too large"));
    }
    Ok(amount)
}

impl Workflow {
    /// Record a Pending payment with its proof for the caller's accepted paper
    #[instrument(skip(self, identity, submission, proof), fields(paper = %submission.paper, actor_id = %identity.user_id))]
    pub async fn submit_payment(
        &self,
        identity: &Identity,
        submission: PaymentSubmission,
        proof: Option<Upload>,
    ) -> Result<Payment> {
        let outcome = async {
            if identity.role != Role::Author {
                return Err(AppError::forbidden("Only authors can submit payments"));
            }

            let paper = self.load_paper(&submission.paper).await?;
            if paper.author_id != identity.user_id {
                return Err(AppError::forbidden("You can only pay for your own papers"));
            }
            if paper.status != PaperStatus::Accepted {
                return Err(AppError::InvalidTransition {
                    action: "submit payment for".to_string(),
                    status: paper.status.to_string(),
                });
            }

            let amount = parse_amount(&submission.amount)?;
            let transaction_id = required_text("transaction_id", &submission.transaction_id)?;

            let existing = self
                .store
                .list_payments(&PaymentFilter {
                    paper_id: Some(paper.id),
                    ..PaymentFilter::default()
                })
                .await?;
            if let Some(open) = existing.iter().find(|p| {
                matches!(p.status, PaymentStatus::Pending | PaymentStatus::Verified)
            }) {
                return Err(AppError::Conflict {
                    message: format!(
                        "Payment for {} is already {}",
                        paper.code,
                        open.status.as_str().to_lowercase()
                    ),
                });
            }

            let proof = self
                .store_upload(proof.as_ref(), "proof", &UploadPolicy::PAYMENT_PROOF)
                .await?;

            let now = Utc::now();
            let payment = Payment {
                id: Uuid::now_v7(),
                paper_id: paper.id,
                author_id: identity.user_id,
                amount,
                method: submission.method,
                transaction_id,
                status: PaymentStatus::Pending,
                rejection_reason: None,
                proof: proof.clone(),
                created_at: now,
                updated_at: now,
            };

            let change = ChangeSet {
                payment: Some(PaymentWrite::Insert(payment.clone())),
                ..ChangeSet::default()
            };
            if let Err(e) = self.store.commit(change).await {
                self.discard(std::slice::from_ref(&proof)).await;
                return Err(e);
            }

            metrics::record_payment("submitted");
            info!(
                paper_code = %paper.code,
                payment_id = %payment.id,
                method = payment.method.as_str(),
                "Payment submitted"
            );
            Ok::<Payment, AppError>(payment)
        };
        observe("submit_payment", outcome.await)
    }

    /// Admin verifies or rejects a pending payment.
    ///
    /// A payment is decided once; any later decision fails with
    /// `PaymentAlreadyDecided` and enqueues nothing.
    #[instrument(skip(self, identity, decision), fields(payment_id = %payment_id, actor_id = %identity.user_id))]
    pub async fn decide_payment(
        &self,
        identity: &Identity,
        payment_id: Uuid,
        decision: PaymentDecision,
    ) -> Result<Payment> {
        let outcome = async {
            if identity.role != Role::Admin {
                return Err(AppError::forbidden("Only an admin may decide payments"));
            }

            let mut payment = self
                .store
                .find_payment(payment_id)
                .await?
                .ok_or_else(|| AppError::PaymentNotFound {
                    id: payment_id.to_string(),
                })?;
            if payment.status != PaymentStatus::Pending {
                return Err(AppError::PaymentAlreadyDecided {
                    id: payment_id.to_string(),
                    status: payment.status.to_string(),
                });
            }

            let mut paper = self.load_paper(&PaperKey::Id(payment.paper_id)).await?;
            let parties = Parties::of(identity);

            payment.status = decision.status();
            payment.updated_at = Utc::now();

            match &decision {
                PaymentDecision::Verified => {
                    let result = machine::transition(
                        paper.status,
                        Action::VerifyPayment,
                        &Actor::of(identity, &paper),
                    )?;
                    payment.rejection_reason = None;
                    paper.status = result.next;

                    let change = ChangeSet {
                        payment: Some(PaymentWrite::Decide(payment.clone())),
                        ..ChangeSet::default()
                    };
                    let paper = self
                        .commit_paper(paper, &result.effects, &parties, change)
                        .await?;
                    info!(paper_code = %paper.code, status = %paper.status, "Payment verified");
                }
                PaymentDecision::Rejected { reason } => {
                    payment.rejection_reason = Some(reason.clone());

                    let effects = machine::payment_rejected(reason);
                    let outbox = self.render_effects(&effects, &paper, &parties).await?;
                    self.store
                        .commit(ChangeSet {
                            payment: Some(PaymentWrite::Decide(payment.clone())),
                            outbox,
                            ..ChangeSet::default()
                        })
                        .await?;
                    info!(paper_code = %paper.code, reason = %reason, "Payment rejected");
                }
            }

            metrics::record_payment(payment.status.as_str());
            Ok::<Payment, AppError>(payment)
        };
        observe(Action::VerifyPayment.name(), outcome.await)
    }

    /// Admins see every payment, authors only their own
    pub async fn list_payments(
        &self,
        identity: &Identity,
        paper: Option<&PaperKey>,
    ) -> Result<Vec<Payment>> {
        let author_id = match identity.role {
            Role::Admin => None,
            Role::Author => Some(identity.user_id),
            _ => return Err(AppError::forbidden("You may not view payments")),
        };

        let paper_id = match paper {
            Some(key) => Some(self.load_paper(key).await?.id),
            None => None,
        };

        self.store
            .list_payments(&PaymentFilter { author_id, paper_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::OutboxStore;
    use crate::workflow::model::Decision;
    use crate::workflow::store::WorkflowStore;
    use crate::workflow::testing::{payment, png, Fixture};

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 150.50 ").unwrap().to_string(), "150.50");
        assert_eq!(parse_amount("100.10").unwrap().to_string(), "100.10");
        assert_eq!(parse_amount("80").unwrap(), Decimal::from(80));
        assert_eq!(parse_amount("9999999999.99").unwrap().to_string(), "9999999999.99");
        for bad in [
            "0",
            "-3",
            "abc",
            "",
            "NaN",
            "inf",
            "0.001",
            "12.345",
            "10000000000",
            "12345678901234567.89",
        ] {
            assert!(
                matches!(parse_amount(bad), Err(AppError::Validation { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(
            PaymentDecision::parse("Verified", None).unwrap(),
            PaymentDecision::Verified
        );
        assert_eq!(
            PaymentDecision::parse("Rejected", Some(" blurry receipt ".to_string())).unwrap(),
            PaymentDecision::Rejected {
                reason: "blurry receipt".to_string()
            }
        );
        assert!(matches!(
            PaymentDecision::parse("Rejected", Some("  ".to_string())),
            Err(AppError::MissingField { .. })
        ));
        assert!(matches!(
            PaymentDecision::parse("Pending", None),
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_moves_paper_to_proof_approved() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;

        let submitted = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap();
        assert_eq!(submitted.status, PaymentStatus::Pending);
        assert_eq!(submitted.amount.to_string(), "150.00");

        let before = fx.store.recent(100).await.unwrap().len();
        let verified = fx
            .workflow
            .decide_payment(&fx.admin, submitted.id, PaymentDecision::Verified)
            .await
            .unwrap();
        assert_eq!(verified.status, PaymentStatus::Verified);
        assert!(verified.rejection_reason.is_none());

        let paper = fx.workflow.load_paper(&PaperKey::Id(paper.id)).await.unwrap();
        assert_eq!(paper.status, PaperStatus::ProofApproved);

        let outbox = fx.store.recent(100).await.unwrap();
        assert_eq!(outbox.len() - before, 1);
        assert_eq!(outbox[0].message.recipient, fx.author.email);
        assert_eq!(outbox[0].message.subject, "Payment Verified");
    }

    #[tokio::test]
    async fn test_second_decision_is_rejected_without_side_effects() {
        let fx = Fixture::new().await;
        let paper = fx.paid("Graph Algorithms").await;
        let payments = fx.workflow.list_payments(&fx.admin, None).await.unwrap();
        let before = fx.store.recent(100).await.unwrap().len();

        for decision in [
            PaymentDecision::Verified,
            PaymentDecision::Rejected {
                reason: "late".to_string(),
            },
        ] {
            let err = fx
                .workflow
                .decide_payment(&fx.admin, payments[0].id, decision)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::PaymentAlreadyDecided { .. }));
        }

        assert_eq!(fx.store.recent(100).await.unwrap().len(), before);
        let paper = fx.workflow.load_paper(&PaperKey::Id(paper.id)).await.unwrap();
        assert_eq!(paper.status, PaperStatus::ProofApproved);

        // A verified paper takes no further payments
        let err = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_rejection_keeps_paper_status() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;
        let submitted = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap();

        let rejected = fx
            .workflow
            .decide_payment(
                &fx.admin,
                submitted.id,
                PaymentDecision::Rejected {
                    reason: "Transaction id not found".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(
            rejected.rejection_reason.as_deref(),
            Some("Transaction id not found")
        );

        let reloaded = fx.workflow.load_paper(&PaperKey::Id(paper.id)).await.unwrap();
        assert_eq!(reloaded.status, PaperStatus::Accepted);
        assert_eq!(reloaded.revision, paper.revision);

        let outbox = fx.store.recent(1).await.unwrap();
        assert_eq!(outbox[0].message.subject, "Payment Rejected");
        assert!(outbox[0].message.html.contains("Transaction id not found"));

        // The author may try again
        fx.workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_amount_keeps_its_decimal_form() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;
        let mut submission = payment(&paper);
        submission.amount = "100.10".to_string();

        let submitted = fx
            .workflow
            .submit_payment(&fx.author, submission, Some(png()))
            .await
            .unwrap();
        let listed = fx.workflow.list_payments(&fx.author, None).await.unwrap();
        assert_eq!(listed[0].amount, submitted.amount);

        let json = serde_json::to_value(&listed[0]).unwrap();
        assert_eq!(json["amount"], "100.10");
        let back: Payment = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount.to_string(), "100.10");
    }

    #[tokio::test]
    async fn test_one_open_payment_per_paper() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;
        let first = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap();

        let err = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(fx.workflow.list_payments(&fx.admin, None).await.unwrap().len(), 1);

        // The store refuses a second open payment even past the pre-check
        let mut sibling = first.clone();
        sibling.id = Uuid::now_v7();
        let err = fx
            .store
            .commit(ChangeSet {
                payment: Some(PaymentWrite::Insert(sibling)),
                ..ChangeSet::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        fx.workflow
            .decide_payment(&fx.admin, first.id, PaymentDecision::Verified)
            .await
            .unwrap();
        let statuses: Vec<PaymentStatus> = fx
            .workflow
            .list_payments(&fx.admin, None)
            .await
            .unwrap()
            .iter()
            .map(|p| p.status)
            .collect();
        assert_eq!(statuses, vec![PaymentStatus::Verified]);
    }

    #[tokio::test]
    async fn test_submission_rules() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;

        let err = fx
            .workflow
            .submit_payment(&fx.author2, payment(&paper), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let err = fx
            .workflow
            .submit_payment(&fx.admin, payment(&paper), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));

        let err = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "proof"));

        let mut bad = payment(&paper);
        bad.amount = "-10".to_string();
        let err = fx
            .workflow
            .submit_payment(&fx.author, bad, Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        assert!(fx.workflow.list_payments(&fx.admin, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_for_rejected_paper_fails() {
        let fx = Fixture::new().await;
        let paper = fx.reviewed("Graph Algorithms").await;
        let paper = fx
            .workflow
            .record_decision(&fx.editor, &PaperKey::Id(paper.id), Decision::Reject)
            .await
            .unwrap();

        let err = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_only_admin_decides() {
        let fx = Fixture::new().await;
        let paper = fx.accepted("Graph Algorithms").await;
        let submitted = fx
            .workflow
            .submit_payment(&fx.author, payment(&paper), Some(png()))
            .await
            .unwrap();

        for who in [&fx.author, &fx.editor, &fx.production] {
            let err = fx
                .workflow
                .decide_payment(who, submitted.id, PaymentDecision::Verified)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Forbidden { .. }));
        }

        let err = fx
            .workflow
            .decide_payment(&fx.admin, Uuid::new_v4(), PaymentDecision::Verified)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_payment_listing_scope() {
        let fx = Fixture::new().await;
        fx.paid("Graph Algorithms").await;

        assert_eq!(fx.workflow.list_payments(&fx.admin, None).await.unwrap().len(), 1);
        assert_eq!(fx.workflow.list_payments(&fx.author, None).await.unwrap().len(), 1);
        assert!(fx.workflow.list_payments(&fx.author2, None).await.unwrap().is_empty());

        let err = fx.workflow.list_payments(&fx.reviewer1, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }
}
