use thiserror::Error;

use crate::model::{IdParseError, QuizError, ResultError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error(transparent)]
    IdParse(#[from] IdParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuizId;

    #[test]
    fn domain_errors_convert_into_crate_error() {
        let err: Error = QuizError::EmptyTitle.into();
        assert!(matches!(err, Error::Quiz(QuizError::EmptyTitle)));

        let parse = "abc".parse::<QuizId>().unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::IdParse(_)));
    }
}
