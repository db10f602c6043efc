use lp_core::diagnostics::report_internal;
use lp_core::error::Error;

const DIAGNOSTIC_CONTEXT: &str = "loop_rewrite";

/// Create an internal-error signal for a broken engine invariant. Distinct
/// from ineligibility, which is an ordinary verdict, not an error.
pub fn internal_error(message: impl Into<String>) -> Error {
    report_internal(DIAGNOSTIC_CONTEXT, message)
}

/// Create a generic rewrite error.
pub fn rewrite_error(message: impl Into<eyre::Error>) -> Error {
    Error::Generic(message.into().to_string())
}
