use crate::diagnostics::Diagnostic;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An invariant of the engine itself was violated; distinct from an
    /// ineligible loop, which is an ordinary value-level outcome.
    #[error("internal error: {0}")]
    Internal(String),
    #[error("{0}")]
    Diagnostic(Diagnostic),
    #[error("{0}")]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        Error::Diagnostic(diagnostic)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}
