use finscribe_answer::AnswerResponse;

use super::error::SessionError;
use super::ids::{PairId, RequestToken};

/// Outcome of one answer request as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Answered(AnswerResponse),
    Failed(SessionError),
}

/// Message posted to the controller mailbox when an answer request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub token: RequestToken,
    pub outcome: CompletionOutcome,
}

/// What `apply_completion` did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDisposition {
    /// Written into the assistant turn at this index.
    Applied(usize),
    /// The pair was cleared or a newer request superseded this one.
    Discarded,
}

/// Notifications for the presentation layer, delivered on the subscription channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AnswerResolved {
        pair: PairId,
        index: usize,
        document_name: String,
    },
    AnswerFailed {
        pair: PairId,
        index: usize,
        error: SessionError,
    },
    DocumentsWarning {
        message: String,
    },
}

impl SessionEvent {
    /// Index of the assistant turn the event touched, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::AnswerResolved { index, .. } | Self::AnswerFailed { index, .. } => Some(*index),
            Self::DocumentsWarning { .. } => None,
        }
    }
}
