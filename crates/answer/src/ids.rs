use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use uuid::Uuid;

#[derive(Debug, Snafu)]
#[snafu(display("'{raw}' is not a valid {id_type}: {source}"))]
pub struct InvalidIdError {
    id_type: &'static str,
    raw: String,
    source: uuid::Error,
}

// Wire ids share one shape so the backend sees the same string format for each of them.
macro_rules! define_wire_id {
    ($name:ident, $id_type:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(raw: &str) -> Result<Self, InvalidIdError> {
                let parsed = Uuid::parse_str(raw).context(InvalidIdSnafu {
                    id_type: $id_type,
                    raw: raw.to_string(),
                })?;
                Ok(Self(parsed))
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Self::parse(raw)
            }
        }
    };
}

define_wire_id!(CorrelationId, "correlation-id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_serializes_as_plain_uuid_string() {
        let id = CorrelationId::parse("6f1c7a4e-2f0b-4a57-9c1e-0d2a8f5b3c11").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1c7a4e-2f0b-4a57-9c1e-0d2a8f5b3c11\"");
        assert_eq!(id.to_string().parse::<CorrelationId>().unwrap(), id);
    }

    #[test]
    fn rejects_malformed_correlation_id() {
        let error = CorrelationId::parse("not-a-uuid").unwrap_err();
        assert!(error.to_string().contains("correlation-id"));
    }
}
