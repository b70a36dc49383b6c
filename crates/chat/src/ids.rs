use std::fmt;

// Session-local ids are plain counters; they never leave the process.
macro_rules! define_session_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn raw(&self) -> u64 {
                self.0
            }

            pub(crate) fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

define_session_id!(PairId, "pair");
define_session_id!(Generation, "gen");

/// Routing key for one issued answer request.
///
/// `pair` stays valid while its turns shift position; `generation` changes on every
/// submit/regenerate so superseded completions can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken {
    pub pair: PairId,
    pub generation: Generation,
}

impl RequestToken {
    pub const fn new(pair: PairId, generation: Generation) -> Self {
        Self { pair, generation }
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.pair, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix_and_advance() {
        let pair = PairId::new(1);
        assert_eq!(pair.to_string(), "pair-1");
        assert_eq!(pair.next(), PairId::new(2));
        assert_eq!(
            RequestToken::new(pair, Generation::new(9)).to_string(),
            "pair-1/gen-9"
        );
    }

    #[test]
    fn next_saturates() {
        assert_eq!(Generation::new(u64::MAX).next().raw(), u64::MAX);
    }
}
