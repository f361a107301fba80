//! The paper lifecycle state machine
//!
//! `transition` is a pure function of (current status, action, actor).
//! It performs the role check, the relationship check and the status
//! gate in that order, and returns the next status together with the
//! notifications the engine must enqueue. No I/O happens here; the
//! engine loads state, calls `transition`, applies the result and
//! commits everything in one write.

use super::model::{Decision, Paper, PaperStatus};
use crate::auth::{Identity, Role};
use crate::errors::{AppError, Result};

/// Every status-changing action a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AssignEditor,
    ReassignEditor,
    AssignReviewers,
    SubmitReview,
    Decide(Decision),
    Resubmit,
    VerifyPayment,
    UploadFinal,
    UpdatePublication(PaperStatus),
}

impl Action {
    /// Stable name used in logs, metrics and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Action::AssignEditor => "assign_editor",
            Action::ReassignEditor => "reassign_editor",
            Action::AssignReviewers => "assign_reviewers",
            Action::SubmitReview => "submit_review",
            Action::Decide(_) => "final_decision",
            Action::Resubmit => "resubmit",
            Action::VerifyPayment => "verify_payment",
            Action::UploadFinal => "upload_final",
            Action::UpdatePublication(_) => "update_publication_status",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Action::AssignEditor => "assign an editor to",
            Action::ReassignEditor => "reassign the editor of",
            Action::AssignReviewers => "assign reviewers to",
            Action::SubmitReview => "submit a review for",
            Action::Decide(_) => "record a final decision on",
            Action::Resubmit => "resubmit",
            Action::VerifyPayment => "verify payment for",
            Action::UploadFinal => "upload the final file for",
            Action::UpdatePublication(_) => "change the publication status of",
        }
    }
}

/// How the caller relates to the paper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relationship {
    pub is_owner: bool,
    pub is_assigned_editor: bool,
    pub is_assigned_reviewer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
    pub relation: Relationship,
}

impl Actor {
    pub fn new(role: Role, relation: Relationship) -> Self {
        Self { role, relation }
    }

    /// Resolve an identity's relationship to a paper
    pub fn of(identity: &Identity, paper: &Paper) -> Self {
        Self {
            role: identity.role,
            relation: Relationship {
                is_owner: paper.author_id == identity.user_id,
                is_assigned_editor: paper.editor_id == Some(identity.user_id),
                is_assigned_reviewer: paper.is_reviewer(identity.user_id),
            },
        }
    }

    /// Admin, owner, assigned editor or assigned reviewer
    pub fn is_party(&self) -> bool {
        self.role == Role::Admin
            || self.relation.is_owner
            || self.relation.is_assigned_editor
            || self.relation.is_assigned_reviewer
    }
}

/// Who receives a notification; resolved to addresses by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Author,
    Admin,
    /// The editor assigned after the transition
    Editor,
    /// The editor replaced by a reassignment
    PreviousEditor,
    /// Reviewers added by this assignment only
    NewReviewers,
    AllReviewers,
    /// The caller
    Actor,
}

/// What happened, rendered into a message by `notices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SubmissionReceived,
    NewSubmission,
    EditorAssignment,
    EditorAssigned,
    EditorReleased,
    EditorReassigned,
    ReviewerAssignment,
    UnderReview,
    ReviewReceived,
    ReviewThanks,
    DecisionToAuthor(Decision),
    DecisionToReviewer(Decision),
    PaymentVerified,
    PaymentRejected { reason: String },
    FinalFileUploaded,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub audience: Audience,
    pub notice: Notice,
}

impl Effect {
    pub fn notify(audience: Audience, notice: Notice) -> Self {
        Self { audience, notice }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub next: PaperStatus,
    pub effects: Vec<Effect>,
}

fn deny(message: &str) -> AppError {
    AppError::forbidden(message)
}

/// Role and relationship requirements per action
fn authorize(action: &Action, actor: &Actor) -> Result<()> {
    let rel = actor.relation;
    match action {
        Action::AssignEditor | Action::ReassignEditor | Action::VerifyPayment => {
            if actor.role != Role::Admin {
                return Err(deny("Only an admin may perform this action"));
            }
        }
        Action::AssignReviewers | Action::Decide(_) => {
            if actor.role != Role::Editor {
                return Err(deny("Only an editor may perform this action"));
            }
            if !rel.is_assigned_editor {
                return Err(deny("You are not the assigned editor for this paper"));
            }
        }
        Action::SubmitReview => {
            if actor.role != Role::Reviewer {
                return Err(deny("Only a reviewer may submit reviews"));
            }
            if !rel.is_assigned_reviewer {
                return Err(deny("You are not assigned to review this paper"));
            }
        }
        Action::Resubmit => match actor.role {
            Role::Admin => {}
            Role::Author if rel.is_owner => {}
            Role::Author => return Err(deny("Only the paper's author may resubmit it")),
            _ => return Err(deny("Only the author or an admin may resubmit a paper")),
        },
        Action::UploadFinal | Action::UpdatePublication(_) => {
            if actor.role != Role::ProductionEditor {
                return Err(deny("Only a production editor may perform this action"));
            }
        }
    }
    Ok(())
}

/// Status gate: the status an action leads to from `status`, if allowed
fn next_status(status: PaperStatus, action: &Action) -> Option<PaperStatus> {
    use PaperStatus::*;

    match action {
        Action::AssignEditor => matches!(status, Submitted).then_some(EditorAssigned),
        // After the decision the editor changes but the status stays put
        Action::ReassignEditor => {
            if status.is_terminal() {
                None
            } else if status.is_editorial() {
                Some(EditorReassigned)
            } else {
                Some(status)
            }
        }
        Action::AssignReviewers => matches!(
            status,
            EditorAssigned | EditorReassigned | UnderReview | ReviewReceived | RevisedSubmitted
        )
        .then_some(UnderReview),
        Action::SubmitReview => {
            matches!(status, UnderReview | ReviewReceived).then_some(ReviewReceived)
        }
        Action::Decide(decision) => matches!(status, ReviewReceived | RevisedSubmitted)
            .then(|| decision.resulting_status()),
        Action::Resubmit => {
            matches!(status, RevisionRequired | ConditionallyAccept).then_some(RevisedSubmitted)
        }
        Action::VerifyPayment => matches!(status, Accepted).then_some(ProofApproved),
        Action::UploadFinal => matches!(status, AwaitingProof | ProofApproved).then_some(ProofApproved),
        Action::UpdatePublication(target) => {
            let from_ok = matches!(status, AwaitingProof | ProofApproved);
            let to_ok = matches!(target, AwaitingProof | ProofApproved | Published);
            (from_ok && to_ok).then_some(*target)
        }
    }
}

fn effects_for(action: &Action, from: PaperStatus, next: PaperStatus) -> Vec<Effect> {
    use Audience::*;

    match action {
        Action::AssignEditor => vec![
            Effect::notify(Editor, Notice::EditorAssignment),
            Effect::notify(Author, Notice::EditorAssigned),
        ],
        Action::ReassignEditor => vec![
            Effect::notify(PreviousEditor, Notice::EditorReleased),
            Effect::notify(Editor, Notice::EditorAssignment),
            Effect::notify(Author, Notice::EditorReassigned),
        ],
        Action::AssignReviewers => vec![
            Effect::notify(NewReviewers, Notice::ReviewerAssignment),
            Effect::notify(Author, Notice::UnderReview),
        ],
        Action::SubmitReview => vec![
            Effect::notify(Editor, Notice::ReviewReceived),
            Effect::notify(Actor, Notice::ReviewThanks),
        ],
        Action::Decide(decision) => vec![
            Effect::notify(Author, Notice::DecisionToAuthor(*decision)),
            Effect::notify(AllReviewers, Notice::DecisionToReviewer(*decision)),
        ],
        Action::Resubmit => Vec::new(),
        Action::VerifyPayment => vec![Effect::notify(Author, Notice::PaymentVerified)],
        Action::UploadFinal => vec![Effect::notify(Author, Notice::FinalFileUploaded)],
        Action::UpdatePublication(_) => {
            if next == PaperStatus::Published && from != PaperStatus::Published {
                vec![Effect::notify(Author, Notice::Published)]
            } else {
                Vec::new()
            }
        }
    }
}

/// Validate `action` by `actor` on a paper in `status`.
///
/// Check order: role, relationship, status gate.
pub fn transition(status: PaperStatus, action: Action, actor: &Actor) -> Result<TransitionResult> {
    authorize(&action, actor)?;

    let next = next_status(status, &action).ok_or_else(|| AppError::InvalidTransition {
        action: action.describe().to_string(),
        status: status.to_string(),
    })?;

    Ok(TransitionResult {
        next,
        effects: effects_for(&action, status, next),
    })
}

/// Creation is not a transition from an existing status; only authors may submit.
pub fn submission(actor_role: Role) -> Result<TransitionResult> {
    if actor_role != Role::Author {
        return Err(deny("Only authors can submit papers"));
    }

    Ok(TransitionResult {
        next: PaperStatus::Submitted,
        effects: vec![
            Effect::notify(Audience::Author, Notice::SubmissionReceived),
            Effect::notify(Audience::Admin, Notice::NewSubmission),
        ],
    })
}

/// Effects of a rejected payment; the paper status is not involved
pub fn payment_rejected(reason: &str) -> Vec<Effect> {
    vec![Effect::notify(
        Audience::Author,
        Notice::PaymentRejected {
            reason: reason.to_string(),
        },
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaperStatus::*;

    fn admin() -> Actor {
        Actor::new(Role::Admin, Relationship::default())
    }

    fn assigned_editor() -> Actor {
        Actor::new(
            Role::Editor,
            Relationship {
                is_assigned_editor: true,
                ..Relationship::default()
            },
        )
    }

    fn assigned_reviewer() -> Actor {
        Actor::new(
            Role::Reviewer,
            Relationship {
                is_assigned_reviewer: true,
                ..Relationship::default()
            },
        )
    }

    fn owner() -> Actor {
        Actor::new(
            Role::Author,
            Relationship {
                is_owner: true,
                ..Relationship::default()
            },
        )
    }

    fn production() -> Actor {
        Actor::new(Role::ProductionEditor, Relationship::default())
    }

    #[test]
    fn test_canonical_flow() {
        let steps: Vec<(PaperStatus, Action, Actor, PaperStatus)> = vec![
            (Submitted, Action::AssignEditor, admin(), EditorAssigned),
            (EditorAssigned, Action::AssignReviewers, assigned_editor(), UnderReview),
            (UnderReview, Action::SubmitReview, assigned_reviewer(), ReviewReceived),
            (ReviewReceived, Action::Decide(Decision::Accept), assigned_editor(), Accepted),
            (Accepted, Action::VerifyPayment, admin(), ProofApproved),
            (ProofApproved, Action::UploadFinal, production(), ProofApproved),
            (ProofApproved, Action::UpdatePublication(Published), production(), Published),
        ];

        for (from, action, actor, expected) in steps {
            let result = transition(from, action, &actor).unwrap();
            assert_eq!(result.next, expected, "{:?} from {}", action, from);
        }
    }

    #[test]
    fn test_role_checked_before_status() {
        // Wrong role on a terminal paper still reports Forbidden
        let err = transition(Rejected, Action::AssignEditor, &owner()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_unassigned_editor_forbidden() {
        let other_editor = Actor::new(Role::Editor, Relationship::default());
        let err = transition(EditorAssigned, Action::AssignReviewers, &other_editor).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_unassigned_reviewer_forbidden() {
        let stranger = Actor::new(Role::Reviewer, Relationship::default());
        let err = transition(UnderReview, Action::SubmitReview, &stranger).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        let attempts = [
            (Action::AssignReviewers, assigned_editor()),
            (Action::SubmitReview, assigned_reviewer()),
            (Action::Decide(Decision::Accept), assigned_editor()),
            (Action::ReassignEditor, admin()),
            (Action::Resubmit, owner()),
            (Action::VerifyPayment, admin()),
            (Action::UploadFinal, production()),
        ];

        for status in [Rejected, Published] {
            for (action, actor) in attempts {
                let err = transition(status, action, &actor).unwrap_err();
                assert!(
                    matches!(err, AppError::InvalidTransition { .. }),
                    "{:?} on {} should be gated",
                    action,
                    status
                );
            }
        }
    }

    #[test]
    fn test_decision_outcomes() {
        let cases = [
            (Decision::Accept, Accepted),
            (Decision::Reject, Rejected),
            (Decision::ConditionallyAccept, ConditionallyAccept),
            (Decision::ReviseAndResubmit, RevisionRequired),
        ];
        for (decision, expected) in cases {
            let result =
                transition(RevisedSubmitted, Action::Decide(decision), &assigned_editor()).unwrap();
            assert_eq!(result.next, expected);
            assert_eq!(result.effects.len(), 2);
        }
    }

    #[test]
    fn test_decision_requires_reviews() {
        let err = transition(UnderReview, Action::Decide(Decision::Accept), &assigned_editor())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_resubmit_by_owner_or_admin() {
        assert_eq!(
            transition(RevisionRequired, Action::Resubmit, &owner()).unwrap().next,
            RevisedSubmitted
        );
        assert_eq!(
            transition(ConditionallyAccept, Action::Resubmit, &admin()).unwrap().next,
            RevisedSubmitted
        );

        let other_author = Actor::new(Role::Author, Relationship::default());
        assert!(matches!(
            transition(RevisionRequired, Action::Resubmit, &other_author),
            Err(AppError::Forbidden { .. })
        ));
        assert!(matches!(
            transition(RevisionRequired, Action::Resubmit, &assigned_editor()),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_reassignment_window() {
        for status in PaperStatus::ALL {
            let allowed = transition(status, Action::ReassignEditor, &admin()).is_ok();
            assert_eq!(allowed, !status.is_terminal(), "reassign from {}", status);
        }
    }

    #[test]
    fn test_reassignment_after_decision_keeps_status() {
        for status in [Accepted, AwaitingProof, ProofApproved] {
            let result = transition(status, Action::ReassignEditor, &admin()).unwrap();
            assert_eq!(result.next, status);
            assert_eq!(result.effects.len(), 3);
        }
        assert_eq!(
            transition(UnderReview, Action::ReassignEditor, &admin()).unwrap().next,
            EditorReassigned
        );
    }

    #[test]
    fn test_payment_verification_only_from_accepted() {
        for status in PaperStatus::ALL {
            let result = transition(status, Action::VerifyPayment, &admin());
            assert_eq!(result.is_ok(), status == Accepted, "verify from {}", status);
        }
    }

    #[test]
    fn test_publication_targets() {
        assert!(transition(
            ProofApproved,
            Action::UpdatePublication(AwaitingProof),
            &production()
        )
        .is_ok());
        assert!(matches!(
            transition(ProofApproved, Action::UpdatePublication(Accepted), &production()),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(matches!(
            transition(Accepted, Action::UpdatePublication(Published), &production()),
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_publication_notifies_only_on_publish() {
        let published =
            transition(ProofApproved, Action::UpdatePublication(Published), &production()).unwrap();
        assert_eq!(
            published.effects,
            vec![Effect::notify(Audience::Author, Notice::Published)]
        );

        let back = transition(ProofApproved, Action::UpdatePublication(AwaitingProof), &production())
            .unwrap();
        assert!(back.effects.is_empty());
    }

    #[test]
    fn test_reassign_notifies_three_parties() {
        let result = transition(UnderReview, Action::ReassignEditor, &admin()).unwrap();
        let audiences: Vec<Audience> = result.effects.iter().map(|e| e.audience).collect();
        assert_eq!(
            audiences,
            vec![Audience::PreviousEditor, Audience::Editor, Audience::Author]
        );
    }

    #[test]
    fn test_submission_is_author_only() {
        assert_eq!(submission(Role::Author).unwrap().next, Submitted);
        assert!(matches!(
            submission(Role::Editor),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = transition(Submitted, Action::SubmitReview, &assigned_reviewer()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot submit a review for a paper in status 'Submitted'"
        );
    }
}
