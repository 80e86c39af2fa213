use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when an identifier cannot be parsed from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    kind: &'static str,
    raw: String,
}

impl IdParseError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from {:?}", self.kind, self.raw)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self::new).map_err(|_| IdParseError {
                    kind: stringify!($name),
                    raw: s.to_owned(),
                })
            }
        }
    };
}

numeric_id!(
    /// Identifier of a quiz.
    QuizId
);
numeric_id!(
    /// Identifier of a question within the quiz bank.
    QuestionId
);
numeric_id!(
    /// Identifier of a single answer option.
    AnswerId
);
numeric_id!(
    /// Identifier of the person taking quizzes.
    UserId
);
numeric_id!(
    /// Storage identifier of a persisted quiz result.
    ResultId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_id_display_and_parse() {
        let id = QuizId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<QuizId>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "q-1".parse::<QuestionId>().unwrap_err();
        assert_eq!(err.kind(), "QuestionId");
        assert!(err.to_string().contains("q-1"));
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", AnswerId::new(7)), "AnswerId(7)");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&UserId::new(9)).unwrap();
        assert_eq!(json, "9");
    }
}
