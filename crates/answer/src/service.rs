use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::AnswerResult;
use super::ids::CorrelationId;
use super::retry::RetryPolicy;

pub const DEFAULT_ANSWER_ENDPOINT: &str = "http://127.0.0.1:5001";
pub const DEFAULT_BACKEND_ENDPOINT: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const UNKNOWN_DOCUMENT_NAME: &str = "Unknown Document";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub answer_endpoint: String,
    pub backend_endpoint: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ANSWER_ENDPOINT, DEFAULT_BACKEND_ENDPOINT)
    }
}

impl ServiceConfig {
    pub fn new(answer_endpoint: impl Into<String>, backend_endpoint: impl Into<String>) -> Self {
        Self {
            answer_endpoint: answer_endpoint.into().trim().to_string(),
            backend_endpoint: backend_endpoint.into().trim().to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Speaker of one history entry as the answer backend sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
}

impl HistoryTurn {
    pub fn new(role: HistoryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            document_name: None,
        }
    }

    pub fn with_document_name(mut self, document_name: impl Into<String>) -> Self {
        self.document_name = Some(document_name.into());
        self
    }
}

/// One question sent to the answer oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRequest {
    pub query: String,
    #[serde(rename = "chatHistory")]
    pub history: Vec<HistoryTurn>,
    pub user_id: String,
    /// Id of the upload/processing run that seeded the session, if any.
    #[serde(rename = "request_id", skip_serializing_if = "Option::is_none")]
    pub processing_id: Option<String>,
    pub correlation_id: CorrelationId,
}

impl AnswerRequest {
    pub fn new(
        query: impl Into<String>,
        history: Vec<HistoryTurn>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            history,
            user_id: user_id.into(),
            processing_id: None,
            correlation_id: CorrelationId::new_v4(),
        }
    }

    pub fn with_processing_id(mut self, processing_id: Option<String>) -> Self {
        self.processing_id = processing_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    #[serde(default = "unknown_document_name")]
    pub document_name: String,
}

impl AnswerResponse {
    pub fn new(answer: impl Into<String>, document_name: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            document_name: document_name.into(),
        }
    }
}

/// Opaque answer oracle.
///
/// Implementations must be safe to call concurrently; every call is independent and the
/// returned future owns everything it needs so it can be spawned onto the runtime.
pub trait AnswerService: Send + Sync {
    fn answer(&self, request: AnswerRequest) -> BoxFuture<'static, AnswerResult<AnswerResponse>>;
}

fn unknown_document_name() -> String {
    UNKNOWN_DOCUMENT_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_uses_backend_field_names() {
        let request = AnswerRequest::new(
            "What is the revenue?",
            vec![
                HistoryTurn::new(HistoryRole::User, "Who audits the firm?"),
                HistoryTurn::new(HistoryRole::Assistant, "KPMG").with_document_name("10k.pdf"),
            ],
            "user-7",
        )
        .with_processing_id(Some("run-3".to_string()));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["query"], "What is the revenue?");
        assert_eq!(value["user_id"], "user-7");
        assert_eq!(value["request_id"], "run-3");
        assert_eq!(
            value["chatHistory"],
            json!([
                {"role": "user", "content": "Who audits the firm?"},
                {"role": "assistant", "content": "KPMG", "document_name": "10k.pdf"}
            ])
        );
        assert_eq!(
            value["correlation_id"],
            json!(request.correlation_id.to_string())
        );
    }

    #[test]
    fn request_omits_absent_processing_id() {
        let request = AnswerRequest::new("q", Vec::new(), "user-7");
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("request_id").is_none());
    }

    #[test]
    fn response_without_document_name_falls_back() {
        let response: AnswerResponse = serde_json::from_value(json!({"answer": "$5M"})).unwrap();
        assert_eq!(response, AnswerResponse::new("$5M", UNKNOWN_DOCUMENT_NAME));
    }

    #[test]
    fn config_trims_endpoints() {
        let config = ServiceConfig::new(" http://answers:5001 ", "http://backend:5000\n");
        assert_eq!(config.answer_endpoint, "http://answers:5001");
        assert_eq!(config.backend_endpoint, "http://backend:5000");
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
