use snafu::Snafu;

use super::turn::Role;

/// Command rejections and answer failures surfaced to the presentation layer.
///
/// None of these are fatal to the process: a rejected command leaves the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("no authenticated user for `{stage}`; please sign in again"))]
    MissingIdentity { stage: &'static str },
    #[snafu(display("query is empty on `{stage}`"))]
    EmptyQuery { stage: &'static str },
    #[snafu(display("answer service failed on `{stage}`: {message}"))]
    TransportFailure {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("turn {index} is a {role} turn; `{stage}` needs a user turn"))]
    InvalidRole {
        stage: &'static str,
        index: usize,
        role: Role,
    },
    #[snafu(display("turn index {index} is out of range for {len} turns on `{stage}`"))]
    IndexOutOfRange {
        stage: &'static str,
        index: usize,
        len: usize,
    },
    #[snafu(display("turn {index} is not being edited on `{stage}`"))]
    NoActiveEdit { stage: &'static str, index: usize },
}

pub type SessionResult<T> = Result<T, SessionError>;
