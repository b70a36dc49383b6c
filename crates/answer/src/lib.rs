use std::sync::Arc;

mod backend;
mod error;
mod http;
mod ids;
mod retry;
mod service;

pub use backend::{
    BackendClient, ClearOutcome, DocumentCatalog, DocumentCatalogSource, DocumentLister,
    KnowledgeBaseStatus, fetch_document_catalog,
};
pub use error::{AnswerError, AnswerResult};
pub use http::HttpAnswerClient;
pub use ids::{CorrelationId, InvalidIdError};
pub use retry::RetryPolicy;
pub use service::{
    AnswerRequest, AnswerResponse, AnswerService, BoxFuture, DEFAULT_ANSWER_ENDPOINT,
    DEFAULT_BACKEND_ENDPOINT, DEFAULT_REQUEST_TIMEOUT, HistoryRole, HistoryTurn, ServiceConfig,
    UNKNOWN_DOCUMENT_NAME,
};

/// Builds the HTTP-backed answer oracle for `config`.
pub fn create_answer_service(config: ServiceConfig) -> AnswerResult<Arc<dyn AnswerService>> {
    Ok(Arc::new(HttpAnswerClient::new(config)?))
}
