//! Plain-text rendering of turns for copy and export.

use std::fmt::Write as _;

use super::turn::{Role, Turn, TurnContent};

pub const USER_LABEL: &str = "You";
pub const ASSISTANT_LABEL: &str = "FINSCRIBE";
pub const PENDING_TEXT: &str = "...";

/// Text of a single turn as a user would copy it.
pub fn turn_text(turn: &Turn) -> &str {
    match &turn.content {
        TurnContent::Pending => PENDING_TEXT,
        TurnContent::Text(text) | TurnContent::Error(text) => text,
    }
}

/// Renders `turns` as a labelled transcript, one block per turn.
pub fn render(turns: &[Turn]) -> String {
    let mut output = String::new();
    for turn in turns {
        let label = match turn.role {
            Role::User => USER_LABEL,
            Role::Assistant => ASSISTANT_LABEL,
        };
        let _ = writeln!(output, "{label}: {}", turn_text(turn));
        if let Some(document_name) = &turn.document_name {
            let _ = writeln!(output, "Document: {document_name}");
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use finscribe_answer::AnswerResponse;

    use super::*;
    use crate::ids::PairId;

    #[test]
    fn renders_labels_documents_and_pending() {
        let first = PairId::new(1);
        let second = PairId::new(2);
        let turns = vec![
            Turn::user(first, "What is the revenue?"),
            Turn::assistant_answer(first, AnswerResponse::new("$5M", "10k.pdf")),
            Turn::user(second, "And margin?"),
            Turn::assistant_pending(second),
        ];

        assert_eq!(
            render(&turns),
            "You: What is the revenue?\n\
             FINSCRIBE: $5M\n\
             Document: 10k.pdf\n\
             You: And margin?\n\
             FINSCRIBE: ...\n"
        );
    }

    #[test]
    fn error_turn_copies_its_message() {
        let turn = Turn::assistant_error(PairId::new(1), "Error fetching answer. Please try again.");
        assert_eq!(turn_text(&turn), "Error fetching answer. Please try again.");
        assert_eq!(render(&[]), "");
    }
}
