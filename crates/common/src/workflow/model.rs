//! Domain types for papers, reviews and payments

use crate::auth::Role;
use crate::errors::{AppError, Result};
use crate::storage::ArtifactRef;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Paper status; display strings are the wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperStatus {
    Submitted,
    #[serde(rename = "Editor Assigned")]
    EditorAssigned,
    #[serde(rename = "Editor Reassigned")]
    EditorReassigned,
    #[serde(rename = "Under Review")]
    UnderReview,
    #[serde(rename = "Review Received")]
    ReviewReceived,
    #[serde(rename = "Revision Required")]
    RevisionRequired,
    #[serde(rename = "Revised Submitted")]
    RevisedSubmitted,
    #[serde(rename = "Conditionally Accept")]
    ConditionallyAccept,
    Accepted,
    Rejected,
    #[serde(rename = "Awaiting Proof")]
    AwaitingProof,
    #[serde(rename = "Proof Approved")]
    ProofApproved,
    Published,
}

impl PaperStatus {
    pub const ALL: [PaperStatus; 13] = [
        PaperStatus::Submitted,
        PaperStatus::EditorAssigned,
        PaperStatus::EditorReassigned,
        PaperStatus::UnderReview,
        PaperStatus::ReviewReceived,
        PaperStatus::RevisionRequired,
        PaperStatus::RevisedSubmitted,
        PaperStatus::ConditionallyAccept,
        PaperStatus::Accepted,
        PaperStatus::Rejected,
        PaperStatus::AwaitingProof,
        PaperStatus::ProofApproved,
        PaperStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Submitted => "Submitted",
            PaperStatus::EditorAssigned => "Editor Assigned",
            PaperStatus::EditorReassigned => "Editor Reassigned",
            PaperStatus::UnderReview => "Under Review",
            PaperStatus::ReviewReceived => "Review Received",
            PaperStatus::RevisionRequired => "Revision Required",
            PaperStatus::RevisedSubmitted => "Revised Submitted",
            PaperStatus::ConditionallyAccept => "Conditionally Accept",
            PaperStatus::Accepted => "Accepted",
            PaperStatus::Rejected => "Rejected",
            PaperStatus::AwaitingProof => "Awaiting Proof",
            PaperStatus::ProofApproved => "Proof Approved",
            PaperStatus::Published => "Published",
        }
    }

    /// Rejected and Published accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaperStatus::Rejected | PaperStatus::Published)
    }

    /// Statuses between submission and the editorial decision
    pub fn is_editorial(&self) -> bool {
        matches!(
            self,
            PaperStatus::Submitted
                | PaperStatus::EditorAssigned
                | PaperStatus::EditorReassigned
                | PaperStatus::UnderReview
                | PaperStatus::ReviewReceived
                | PaperStatus::RevisionRequired
                | PaperStatus::RevisedSubmitted
                | PaperStatus::ConditionallyAccept
        )
    }
}

impl fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        PaperStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::InvalidFormat {
                message: format!("Unknown paper status: {}", s),
            })
    }
}

/// Editorial verdict; also the reviewer's recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    #[serde(rename = "Conditionally Accept")]
    ConditionallyAccept,
    #[serde(rename = "Revise & Resubmit")]
    ReviseAndResubmit,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "Accept",
            Decision::ConditionallyAccept => "Conditionally Accept",
            Decision::ReviseAndResubmit => "Revise & Resubmit",
            Decision::Reject => "Reject",
        }
    }

    /// Paper status reached when an editor issues this decision
    pub fn resulting_status(&self) -> PaperStatus {
        match self {
            Decision::Accept => PaperStatus::Accepted,
            Decision::ConditionallyAccept => PaperStatus::ConditionallyAccept,
            Decision::ReviseAndResubmit => PaperStatus::RevisionRequired,
            Decision::Reject => PaperStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Accept" => Ok(Decision::Accept),
            "Conditionally Accept" => Ok(Decision::ConditionallyAccept),
            "Revise & Resubmit" => Ok(Decision::ReviseAndResubmit),
            "Reject" => Ok(Decision::Reject),
            other => Err(AppError::validation(
                "decision",
                format!("Unknown decision: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// The fixed review rubric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRatings {
    pub technical_quality: Rating,
    pub significance: Rating,
    pub presentation: Rating,
    pub relevance: Rating,
    pub originality: Rating,
    pub adequacy_of_citations: Rating,
    pub overall: Rating,
    #[serde(default)]
    pub other_factors: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupplementaryAnswers {
    pub suggest_own_references: bool,
    pub recommend_for_best_paper_award: bool,
    pub suggest_another_journal: bool,
    pub willing_to_review_revisions: bool,
}

/// One entry of a paper's append-only version history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperVersion {
    pub version: i32,
    pub artifact: ArtifactRef,
    pub submitted_at: DateTime<Utc>,
}

/// The manuscript aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub status: PaperStatus,
    pub author_id: Uuid,
    pub editor_id: Option<Uuid>,
    pub reviewer_ids: Vec<Uuid>,
    pub final_decision: Option<Decision>,
    pub current_artifact: ArtifactRef,
    pub final_artifact: Option<ArtifactRef>,
    pub versions: Vec<PaperVersion>,
    /// Optimistic concurrency token, bumped on every committed change
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Paper {
    pub fn current_version(&self) -> i32 {
        self.versions.last().map_or(0, |v| v.version)
    }

    /// Append version N+1 and point the current artifact at it
    pub fn push_version(&mut self, artifact: ArtifactRef, at: DateTime<Utc>) {
        let version = self.current_version() + 1;
        self.current_artifact = artifact.clone();
        self.versions.push(PaperVersion {
            version,
            artifact,
            submitted_at: at,
        });
    }

    pub fn is_reviewer(&self, user_id: Uuid) -> bool {
        self.reviewer_ids.contains(&user_id)
    }

    /// Version numbers are 1..=N and the current artifact is the last version's
    pub fn versions_consistent(&self) -> bool {
        !self.versions.is_empty()
            && self
                .versions
                .iter()
                .enumerate()
                .all(|(i, v)| v.version == i as i32 + 1)
            && self
                .versions
                .last()
                .is_some_and(|v| v.artifact == self.current_artifact)
    }
}

/// An immutable reviewer evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub paper_id: Uuid,
    pub reviewer_id: Uuid,
    /// Manuscript version the review was written against
    pub paper_version: i32,
    pub ratings: ReviewRatings,
    pub answers: SupplementaryAnswers,
    pub recommendation: Decision,
    pub confidential_comments: Option<String>,
    pub comments_to_author: Option<String>,
    pub attachments: Vec<ArtifactRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Razorpay,
    PayPal,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Razorpay => "Razorpay",
            PaymentMethod::PayPal => "PayPal",
            PaymentMethod::BankTransfer => "Bank Transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Razorpay" => Ok(PaymentMethod::Razorpay),
            "PayPal" => Ok(PaymentMethod::PayPal),
            "Bank Transfer" => Ok(PaymentMethod::BankTransfer),
            other => Err(AppError::validation(
                "method",
                format!("Unknown payment method: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Verified => "Verified",
            PaymentStatus::Rejected => "Rejected",
            PaymentStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Verified" => Ok(PaymentStatus::Verified),
            "Rejected" => Ok(PaymentStatus::Rejected),
            "Completed" => Ok(PaymentStatus::Completed),
            other => Err(AppError::validation(
                "status",
                format!("Unknown payment status: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub paper_id: Uuid,
    pub author_id: Uuid,
    /// Serialized as a string, e.g. "150.00"
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// Present exactly when status is Rejected
    pub rejection_reason: Option<String>,
    pub proof: ArtifactRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Directory entry for a user known to the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
}

/// A paper addressed by internal id or human-readable code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaperKey {
    Id(Uuid),
    Code(String),
}

impl PaperKey {
    pub fn matches(&self, paper: &Paper) -> bool {
        match self {
            PaperKey::Id(id) => paper.id == *id,
            PaperKey::Code(code) => paper.code == *code,
        }
    }
}

impl fmt::Display for PaperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaperKey::Id(id) => write!(f, "{}", id),
            PaperKey::Code(code) => f.write_str(code),
        }
    }
}

impl From<Uuid> for PaperKey {
    fn from(id: Uuid) -> Self {
        PaperKey::Id(id)
    }
}

impl FromStr for PaperKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(PaperKey::Id(id));
        }
        if super::paper_code::parse(s).is_some() {
            return Ok(PaperKey::Code(s.to_string()));
        }
        Err(AppError::InvalidFormat {
            message: format!("'{}' is neither a paper id nor a paper code", s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        for status in PaperStatus::ALL {
            assert_eq!(status.as_str().parse::<PaperStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
        assert!("Lost".parse::<PaperStatus>().is_err());
    }

    #[test]
    fn test_decision_mapping() {
        assert_eq!(Decision::Accept.resulting_status(), PaperStatus::Accepted);
        assert_eq!(
            Decision::ReviseAndResubmit.resulting_status(),
            PaperStatus::RevisionRequired
        );
        assert_eq!(
            "Revise & Resubmit".parse::<Decision>().unwrap(),
            Decision::ReviseAndResubmit
        );
    }

    #[test]
    fn test_push_version_keeps_history_consistent() {
        let now = Utc::now();
        let mut paper = Paper {
            id: Uuid::new_v4(),
            code: "RPMS25-001".to_string(),
            title: "Graph Algorithms".to_string(),
            abstract_text: "Shortest paths".to_string(),
            status: PaperStatus::Submitted,
            author_id: Uuid::new_v4(),
            editor_id: None,
            reviewer_ids: Vec::new(),
            final_decision: None,
            current_artifact: ArtifactRef::new("a"),
            final_artifact: None,
            versions: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        assert!(!paper.versions_consistent());

        paper.push_version(ArtifactRef::new("a"), now);
        paper.push_version(ArtifactRef::new("b"), now);

        assert_eq!(paper.current_version(), 2);
        assert_eq!(paper.current_artifact, ArtifactRef::new("b"));
        assert!(paper.versions_consistent());
    }

    #[test]
    fn test_paper_key_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(id.to_string().parse::<PaperKey>().unwrap(), PaperKey::Id(id));
        assert_eq!(
            "RPMS25-007".parse::<PaperKey>().unwrap(),
            PaperKey::Code("RPMS25-007".to_string())
        );
        assert!("not-a-paper".parse::<PaperKey>().is_err());
    }

    #[test]
    fn test_ratings_wire_names() {
        let json = serde_json::json!({
            "technicalQuality": "Good",
            "significance": "Fair",
            "presentation": "Good",
            "relevance": "Excellent",
            "originality": "Poor",
            "adequacyOfCitations": "Good",
            "overall": "Good"
        });
        let ratings: ReviewRatings = serde_json::from_value(json).unwrap();
        assert_eq!(ratings.originality, Rating::Poor);
        assert_eq!(ratings.other_factors, None);
    }
}
