use snafu::ensure;

use super::error::{MissingIdentitySnafu, SessionResult};

/// Authenticated identity passed explicitly to every request-issuing command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionContext {
    user_id: String,
    username: Option<String>,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into().trim().to_string(),
            username: None,
        }
    }

    /// Context with no signed-in user; every request-issuing command rejects it.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        let username = username.into().trim().to_string();
        self.username = (!username.is_empty()).then_some(username);
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_empty()
    }

    /// The user id, or `MissingIdentity` for `stage`.
    pub fn identity(&self, stage: &'static str) -> SessionResult<&str> {
        ensure!(self.is_authenticated(), MissingIdentitySnafu { stage });
        Ok(&self.user_id)
    }
}

/// Result of the upload/processing step a session may start from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSeed {
    /// Forwarded with every answer request so the backend can scope retrieval.
    pub processing_id: Option<String>,
    pub paragraphs: Vec<String>,
}

impl SessionSeed {
    pub fn new(processing_id: impl Into<String>) -> Self {
        Self {
            processing_id: Some(processing_id.into()),
            paragraphs: Vec::new(),
        }
    }

    pub fn with_paragraphs(mut self, paragraphs: Vec<String>) -> Self {
        self.paragraphs = paragraphs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    #[test]
    fn blank_user_id_is_missing_identity() {
        let context = SessionContext::new("   ");
        assert_eq!(
            context.identity("submit").unwrap_err(),
            SessionError::MissingIdentity { stage: "submit" }
        );
        assert!(!SessionContext::anonymous().is_authenticated());
    }

    #[test]
    fn identity_is_trimmed_user_id() {
        let context = SessionContext::new(" user-7 ").with_username("  ");
        assert_eq!(context.identity("submit").unwrap(), "user-7");
        assert_eq!(context.username(), None);
    }
}
