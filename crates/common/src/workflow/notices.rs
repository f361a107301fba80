//! Subject and body text for every workflow notice

use super::machine::Notice;
use super::model::Paper;
use crate::notify::OutboundMessage;

/// Paper facts a message may mention
#[derive(Debug, Clone)]
pub struct NoticeContext<'a> {
    pub paper: &'a Paper,
    pub author_name: Option<&'a str>,
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a notice for one recipient
pub fn render(notice: &Notice, ctx: &NoticeContext<'_>, recipient: &str) -> OutboundMessage {
    let code = &ctx.paper.code;
    let title = escape(&ctx.paper.title);

    let (subject, html) = match notice {
        Notice::SubmissionReceived => (
            "Submission received".to_string(),
            format!(
                "<p>Thank you for your submission. Your paper <strong>{}</strong> \
                 (\"{}\") has been received and will be assigned to an editor shortly.</p>",
                code, title
            ),
        ),
        Notice::NewSubmission => {
            let author = ctx.author_name.map(escape).unwrap_or_else(|| "an author".to_string());
            (
                format!("New Paper Submitted by {}", author),
                format!("<p>New paper {} (\"{}\") submitted by {}.</p>", code, title, author),
            )
        }
        Notice::EditorAssignment => (
            format!("New Paper Assignment: {}", code),
            format!("<p>You have been assigned a new paper: {} (\"{}\").</p>", code, title),
        ),
        Notice::EditorAssigned => (
            format!("Editor Assigned for {}", code),
            format!("<p>An editor has been assigned to your paper {}.</p>", code),
        ),
        Notice::EditorReleased => (
            format!("Paper Reassigned: {}", code),
            format!("<p>Paper {} has been reassigned to another editor.</p>", code),
        ),
        Notice::EditorReassigned => (
            format!("Editor Reassigned for {}", code),
            format!("<p>The editor for your paper {} has been changed.</p>", code),
        ),
        Notice::ReviewerAssignment => (
            "New Paper Assignment".to_string(),
            format!("<p>You have been assigned to review paper {} (\"{}\").</p>", code, title),
        ),
        Notice::UnderReview => (
            "Paper Under Review".to_string(),
            format!("<p>Your paper {} is now under review.</p>", code),
        ),
        Notice::ReviewReceived => (
            format!("Review Received for {}", code),
            format!("<p>A review has been received for paper {}.</p>", code),
        ),
        Notice::ReviewThanks => (
            "Thank you for your review".to_string(),
            format!("<p>Thank you for submitting your review for paper {}.</p>", code),
        ),
        Notice::DecisionToAuthor(decision) => (
            format!("Decision on Paper {}", code),
            format!(
                "<p>The final decision on your paper {} is: <strong>{}</strong>.</p>",
                code,
                escape(decision.as_str())
            ),
        ),
        Notice::DecisionToReviewer(_) => (
            format!("Decision on Paper {}", code),
            format!("<p>The final decision on paper {} has been made.</p>", code),
        ),
        Notice::PaymentVerified => (
            "Payment Verified".to_string(),
            format!(
                "<p>Your payment for paper {} has been verified. \
                 The paper is now proceeding to the production stage.</p>",
                code
            ),
        ),
        Notice::PaymentRejected { reason } => (
            "Payment Rejected".to_string(),
            format!(
                "<p>Your payment proof for paper {} was rejected. Reason: {}. \
                 Please upload a valid proof again.</p>",
                code,
                escape(reason)
            ),
        ),
        Notice::FinalFileUploaded => (
            format!("Paper {} in Production", code),
            format!(
                "<p>Your paper <strong>{}</strong> is now in the production stage.</p>",
                code
            ),
        ),
        Notice::Published => (
            format!("Paper {} Published", code),
            format!(
                "<p>Congratulations! Your paper <strong>{}</strong> has been published.</p>",
                code
            ),
        ),
    };

    OutboundMessage {
        recipient: recipient.to_string(),
        subject,
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ArtifactRef;
    use crate::workflow::model::{Decision, PaperStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn paper(title: &str) -> Paper {
        let now = Utc::now();
        Paper {
            id: Uuid::new_v4(),
            code: "RPMS25-003".to_string(),
            title: title.to_string(),
            abstract_text: String::new(),
            status: PaperStatus::Submitted,
            author_id: Uuid::new_v4(),
            editor_id: None,
            reviewer_ids: Vec::new(),
            final_decision: None,
            current_artifact: ArtifactRef::new("x"),
            final_artifact: None,
            versions: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_text_is_escaped() {
        let paper = paper("<script>alert(1)</script>");
        let ctx = NoticeContext {
            paper: &paper,
            author_name: Some("A & B"),
        };

        let message = render(&Notice::NewSubmission, &ctx, "admin@example.org");
        assert_eq!(message.subject, "New Paper Submitted by A &amp; B");
        assert!(message.html.contains("&lt;script&gt;"));
        assert!(!message.html.contains("<script>"));
    }

    #[test]
    fn test_decision_and_rejection_text() {
        let paper = paper("Graph Algorithms");
        let ctx = NoticeContext {
            paper: &paper,
            author_name: None,
        };

        let decision = render(
            &Notice::DecisionToAuthor(Decision::ReviseAndResubmit),
            &ctx,
            "author@example.org",
        );
        assert_eq!(decision.subject, "Decision on Paper RPMS25-003");
        assert!(decision.html.contains("Revise &amp; Resubmit"));

        let rejected = render(
            &Notice::PaymentRejected {
                reason: "Blurry receipt".to_string(),
            },
            &ctx,
            "author@example.org",
        );
        assert!(rejected.html.contains("Reason: Blurry receipt"));
        assert_eq!(rejected.recipient, "author@example.org");
    }
}
