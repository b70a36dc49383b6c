use std::fmt;

use finscribe_answer::{AnswerResponse, HistoryRole, HistoryTurn};

use super::ids::PairId;

/// Content shown in an assistant turn whose answer request failed.
pub const ANSWER_ERROR_MESSAGE: &str = "Error fetching answer. Please try again.";

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => formatter.write_str("user"),
            Self::Assistant => formatter.write_str("assistant"),
        }
    }
}

impl From<Role> for HistoryRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => HistoryRole::User,
            Role::Assistant => HistoryRole::Assistant,
        }
    }
}

/// What a turn currently displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnContent {
    /// Assistant placeholder while its answer is in flight.
    Pending,
    Text(String),
    /// Terminal failure for one attempt; the pair can be regenerated.
    Error(String),
}

impl TurnContent {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Text payload, or `None` while pending.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Text(text) | Self::Error(text) => Some(text),
        }
    }
}

/// One chat entry. Turns of the same pair share `pair`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub pair: PairId,
    pub role: Role,
    pub content: TurnContent,
    pub document_name: Option<String>,
}

impl Turn {
    pub fn user(pair: PairId, text: impl Into<String>) -> Self {
        Self {
            pair,
            role: Role::User,
            content: TurnContent::Text(text.into()),
            document_name: None,
        }
    }

    pub fn assistant_pending(pair: PairId) -> Self {
        Self {
            pair,
            role: Role::Assistant,
            content: TurnContent::Pending,
            document_name: None,
        }
    }

    pub fn assistant_answer(pair: PairId, response: AnswerResponse) -> Self {
        Self {
            pair,
            role: Role::Assistant,
            content: TurnContent::Text(response.answer),
            document_name: Some(response.document_name),
        }
    }

    pub fn assistant_error(pair: PairId, message: impl Into<String>) -> Self {
        Self {
            pair,
            role: Role::Assistant,
            content: TurnContent::Error(message.into()),
            document_name: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// History entry sent to the answer service. A pending turn is sent with empty
    /// content; a failed one carries its error message.
    pub fn to_history(&self) -> HistoryTurn {
        let mut entry =
            HistoryTurn::new(self.role.into(), self.content.text().unwrap_or_default());
        if let Some(document_name) = &self.document_name {
            entry = entry.with_document_name(document_name.clone());
        }
        entry
    }
}
