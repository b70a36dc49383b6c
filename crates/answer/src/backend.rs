use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::error::{AnswerResult, MissingIdentitySnafu, UnexpectedPayloadSnafu};
use super::http::{build_http_client, endpoint_url, post_json};
use super::service::{BoxFuture, ServiceConfig};

pub const LIST_DOCUMENTS_PATH: &str = "list_documents";
pub const CHECK_KNOWLEDGE_BASE_PATH: &str = "check_knowledge_base";
pub const CLEAR_KNOWLEDGE_BASE_PATH: &str = "clear_index";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentCatalogSource {
    Backend,
    Unavailable,
}

/// Documents visible to the current user, in backend display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCatalog {
    pub documents: Vec<String>,
    pub source: DocumentCatalogSource,
    pub warning: Option<String>,
}

impl DocumentCatalog {
    pub fn from_backend(documents: Vec<String>) -> Self {
        Self {
            documents,
            source: DocumentCatalogSource::Backend,
            warning: None,
        }
    }

    pub fn unavailable(warning: impl Into<String>) -> Self {
        Self {
            documents: Vec::new(),
            source: DocumentCatalogSource::Unavailable,
            warning: Some(warning.into()),
        }
    }
}

pub trait DocumentLister: Send + Sync {
    fn list_documents<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, AnswerResult<Vec<String>>>;
}

/// Lists documents, degrading any failure to an empty catalog with a warning.
pub async fn fetch_document_catalog(lister: &dyn DocumentLister, user_id: &str) -> DocumentCatalog {
    match lister.list_documents(user_id).await {
        Ok(documents) => DocumentCatalog::from_backend(documents),
        Err(error) => {
            tracing::warn!(error = %error, "document listing failed; showing an empty list");
            DocumentCatalog::unavailable(format!("Failed to load document list: {error}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeBaseStatus {
    pub record_count: u64,
}

impl KnowledgeBaseStatus {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    AlreadyEmpty,
}

#[derive(Debug, Serialize)]
struct UserScoped<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DocumentListPayload {
    #[serde(default)]
    documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeBasePayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "recordCount")]
    record_count: u64,
}

#[derive(Debug, Deserialize)]
struct ClearPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the knowledge-base side of the backend (listing, status, clearing).
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl BackendClient {
    pub fn new(config: ServiceConfig) -> AnswerResult<Self> {
        // Validate once up front so a bad endpoint surfaces at startup.
        endpoint_url(&config.backend_endpoint, LIST_DOCUMENTS_PATH)?;
        let client = build_http_client(config.request_timeout)?;
        Ok(Self { client, config })
    }

    async fn post_user_scoped<R>(
        &self,
        path: &'static str,
        user_id: &str,
        stage: &'static str,
    ) -> AnswerResult<R>
    where
        R: serde::de::DeserializeOwned,
    {
        ensure!(!user_id.trim().is_empty(), MissingIdentitySnafu { stage });
        let url = endpoint_url(&self.config.backend_endpoint, path)?;
        let body = UserScoped { user_id };
        let client = &self.client;
        let url = url.as_str();
        let body = &body;
        self.config
            .retry
            .run(stage, move |_| post_json::<_, R>(client, url, body, stage))
            .await
    }

    pub async fn knowledge_base_status(&self, user_id: &str) -> AnswerResult<KnowledgeBaseStatus> {
        let payload: KnowledgeBasePayload = self
            .post_user_scoped(CHECK_KNOWLEDGE_BASE_PATH, user_id, "check-knowledge-base")
            .await?;

        ensure!(
            payload.status.as_deref() == Some("success"),
            UnexpectedPayloadSnafu {
                stage: "check-knowledge-base-status",
                details: format!("status {:?}", payload.status),
            }
        );

        Ok(KnowledgeBaseStatus {
            record_count: payload.record_count,
        })
    }

    /// Clears every embedding the backend stores for `user_id`. Not retried.
    pub async fn clear_knowledge_base(&self, user_id: &str) -> AnswerResult<ClearOutcome> {
        ensure!(
            !user_id.trim().is_empty(),
            MissingIdentitySnafu {
                stage: "clear-knowledge-base",
            }
        );
        let url = endpoint_url(&self.config.backend_endpoint, CLEAR_KNOWLEDGE_BASE_PATH)?;
        let payload: ClearPayload = post_json(
            &self.client,
            &url,
            &UserScoped { user_id },
            "clear-knowledge-base",
        )
        .await?;

        match payload.status.as_deref() {
            Some("cleared") => Ok(ClearOutcome::Cleared),
            Some("empty") => Ok(ClearOutcome::AlreadyEmpty),
            other => UnexpectedPayloadSnafu {
                stage: "clear-knowledge-base-status",
                details: payload
                    .message
                    .unwrap_or_else(|| format!("status {other:?}")),
            }
            .fail(),
        }
    }
}

impl DocumentLister for BackendClient {
    fn list_documents<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, AnswerResult<Vec<String>>> {
        Box::pin(async move {
            let payload: DocumentListPayload = self
                .post_user_scoped(LIST_DOCUMENTS_PATH, user_id, "list-documents")
                .await?;
            Ok(payload.documents)
        })
    }
}
