// event.rs — What an inbound comment means to the lifecycle.
//
// Classification is purely textual plus the author's bot flag. The order
// matters: the apply command is recognised before anything else, and bot
// comments only count when they are ticked suggestions.

use rk_changeset::comment::{self, SUGGESTION_SIGNATURE, SUMMARY_SIGNATURE};
use rk_submit::{Comment, CommentKind, ReviewRequest};
use serde::{Deserialize, Serialize};

/// A comment event delivered to the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub request: ReviewRequest,
    pub comment: Comment,
    /// Platform installation the event came through, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<u64>,
}

impl InboundEvent {
    pub fn new(request: ReviewRequest, comment: Comment) -> Self {
        Self {
            request,
            comment,
            installation_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentEvent {
    /// The whole comment is the apply command.
    ApplyCommand,
    /// A bot suggestion whose acceptance box was ticked.
    Acceptance,
    /// A human review comment that may deserve a rule.
    Candidate,
    Ignored(String),
}

pub fn classify(comment: &Comment, apply_command: &str) -> CommentEvent {
    let body = comment.body.as_str();

    if body.trim() == apply_command && !body.contains(SUMMARY_SIGNATURE) {
        return CommentEvent::ApplyCommand;
    }

    if body.contains(SUGGESTION_SIGNATURE) && comment::is_checked(body) {
        if comment.author.is_bot {
            return CommentEvent::Acceptance;
        }
        return CommentEvent::Ignored("ticked suggestion not authored by a bot".to_string());
    }

    if comment.kind == CommentKind::Issue {
        return CommentEvent::Ignored("issue comment".to_string());
    }
    if comment::has_bot_signature(body) {
        return CommentEvent::Ignored("bot comment".to_string());
    }
    if comment.is_reply() {
        return CommentEvent::Ignored("reply inside an existing thread".to_string());
    }
    CommentEvent::Candidate
}
