use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, ensure};

use super::error::{
    AnswerResult, BuildHttpClientSnafu, DecodeResponseSnafu, InvalidEndpointSnafu,
    MissingIdentitySnafu, ResponseStatusSnafu, SendRequestSnafu,
};
use super::service::{AnswerRequest, AnswerResponse, AnswerService, BoxFuture, ServiceConfig};

pub const ANSWER_PATH: &str = "get_answer";

pub(crate) fn build_http_client(request_timeout: Duration) -> AnswerResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .context(BuildHttpClientSnafu {
            stage: "build-http-client",
        })
}

/// Joins `path` onto `base`, tolerating a trailing slash on the base.
pub(crate) fn endpoint_url(base: &str, path: &str) -> AnswerResult<String> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path);
    reqwest::Url::parse(&joined)
        .map(|url| url.to_string())
        .map_err(|source| {
            InvalidEndpointSnafu {
                stage: "endpoint-url",
                endpoint: base.to_string(),
                details: source.to_string(),
            }
            .build()
        })
}

pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    stage: &'static str,
) -> AnswerResult<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .context(SendRequestSnafu { stage, url })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return ResponseStatusSnafu {
            stage,
            url,
            status: status.as_u16(),
            body,
        }
        .fail();
    }

    response
        .json::<R>()
        .await
        .context(DecodeResponseSnafu { stage, url })
}

/// Answer oracle reached over JSON/HTTP.
#[derive(Debug, Clone)]
pub struct HttpAnswerClient {
    client: reqwest::Client,
    answer_url: String,
    config: ServiceConfig,
}

impl HttpAnswerClient {
    pub fn new(config: ServiceConfig) -> AnswerResult<Self> {
        let answer_url = endpoint_url(&config.answer_endpoint, ANSWER_PATH)?;
        let client = build_http_client(config.request_timeout)?;
        Ok(Self {
            client,
            answer_url,
            config,
        })
    }

    async fn request_answer(
        client: reqwest::Client,
        answer_url: String,
        config: ServiceConfig,
        request: AnswerRequest,
    ) -> AnswerResult<AnswerResponse> {
        ensure!(
            !request.user_id.trim().is_empty(),
            MissingIdentitySnafu {
                stage: "request-answer",
            }
        );

        tracing::debug!(
            correlation_id = %request.correlation_id,
            history_len = request.history.len(),
            "requesting answer"
        );

        let client = &client;
        let answer_url = answer_url.as_str();
        let body = &request;
        let response = config
            .retry
            .run("request-answer", move |attempt| async move {
                tracing::trace!(
                    correlation_id = %body.correlation_id,
                    attempt,
                    "posting answer request"
                );
                post_json::<_, AnswerResponse>(client, answer_url, body, "post-answer").await
            })
            .await?;

        tracing::debug!(
            correlation_id = %request.correlation_id,
            document_name = %response.document_name,
            "answer received"
        );
        Ok(response)
    }
}

impl AnswerService for HttpAnswerClient {
    fn answer(&self, request: AnswerRequest) -> BoxFuture<'static, AnswerResult<AnswerResponse>> {
        Box::pin(Self::request_answer(
            self.client.clone(),
            self.answer_url.clone(),
            self.config.clone(),
            request,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::AnswerError;
    use crate::retry::RetryPolicy;
    use crate::service::{HistoryRole, HistoryTurn};

    fn config_for(server: &MockServer, retry: RetryPolicy) -> ServiceConfig {
        ServiceConfig::new(server.uri(), server.uri()).with_retry(retry)
    }

    #[test]
    fn endpoint_url_tolerates_trailing_slash() {
        assert_eq!(
            endpoint_url("http://127.0.0.1:5001/", ANSWER_PATH).unwrap(),
            "http://127.0.0.1:5001/get_answer"
        );
        assert!(matches!(
            endpoint_url("not a url", ANSWER_PATH),
            Err(AnswerError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn posts_query_and_decodes_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/get_answer"))
            .and(body_partial_json(json!({
                "query": "What is the revenue?",
                "user_id": "user-7",
                "chatHistory": [{"role": "user", "content": "Hi"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"answer": "$5M", "document_name": "10k.pdf"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAnswerClient::new(config_for(&server, RetryPolicy::no_retry())).unwrap();
        let request = AnswerRequest::new(
            "What is the revenue?",
            vec![HistoryTurn::new(HistoryRole::User, "Hi")],
            "user-7",
        );

        let response = client.answer(request).await.unwrap();
        assert_eq!(response, AnswerResponse::new("$5M", "10k.pdf"));
    }

    #[tokio::test]
    async fn retries_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/get_answer"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/get_answer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"answer": "ok", "document_name": "a.pdf"})),
            )
            .mount(&server)
            .await;

        let retry = RetryPolicy::new(2, Duration::ZERO);
        let client = HttpAnswerClient::new(config_for(&server, retry)).unwrap();
        let response = client
            .answer(AnswerRequest::new("q", Vec::new(), "user-7"))
            .await
            .unwrap();
        assert_eq!(response.answer, "ok");
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/get_answer"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Missing query"})))
            .expect(1)
            .mount(&server)
            .await;

        let retry = RetryPolicy::new(3, Duration::ZERO);
        let client = HttpAnswerClient::new(config_for(&server, retry)).unwrap();
        let error = client
            .answer(AnswerRequest::new("q", Vec::new(), "user-7"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AnswerError::ResponseStatus { status: 400, .. }
        ));
    }

    #[tokio::test]
    async fn blank_user_id_fails_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = HttpAnswerClient::new(config_for(&server, RetryPolicy::no_retry())).unwrap();
        let error = client
            .answer(AnswerRequest::new("q", Vec::new(), "  "))
            .await
            .unwrap_err();
        assert!(matches!(error, AnswerError::MissingIdentity { .. }));
    }
}
