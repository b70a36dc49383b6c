use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AnswerError {
    #[snafu(display("user id is missing on `{stage}`"))]
    MissingIdentity { stage: &'static str },
    #[snafu(display("endpoint '{endpoint}' is not a valid URL: {details}"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
        details: String,
    },
    #[snafu(display("failed to build HTTP client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {url} failed on `{stage}`: {source}"))]
    SendRequest {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("{url} returned status {status} on `{stage}`: {body}"))]
    ResponseStatus {
        stage: &'static str,
        url: String,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode response from {url} on `{stage}`: {source}"))]
    DecodeResponse {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("unexpected payload on `{stage}`: {details}"))]
    UnexpectedPayload {
        stage: &'static str,
        details: String,
    },
}

impl AnswerError {
    /// Returns true for failures a later attempt may not hit again.
    ///
    /// Connection errors, timeouts and 5xx responses qualify; client errors and payload
    /// problems are permanent for the same request body.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SendRequest { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            Self::ResponseStatus { status, .. } => *status >= 500,
            Self::MissingIdentity { .. }
            | Self::InvalidEndpoint { .. }
            | Self::BuildHttpClient { .. }
            | Self::DecodeResponse { .. }
            | Self::UnexpectedPayload { .. } => false,
        }
    }
}

pub type AnswerResult<T> = Result<T, AnswerError>;
