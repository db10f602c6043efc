use crate::span::Span;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// A structured message about something the engine noticed. Ineligibility is
/// never reported this way; diagnostics carry genuine invariant violations.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub span: Option<Span>,
    pub source_context: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            span: None,
            source_context: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            span: None,
            source_context: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.source_context {
            Some(context) => write!(f, "[{}] {}", context, self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(span) = &self.span {
            write!(f, " at {}", span)?;
        }
        Ok(())
    }
}

/// Log and package an internal invariant violation. Callers are expected to
/// degrade this to "not eligible" rather than propagate a partial rewrite.
pub fn report_internal(context: &str, message: impl Into<String>) -> crate::error::Error {
    let diagnostic = Diagnostic::error(message.into()).with_source_context(context);
    tracing::error!(context, %diagnostic, "internal invariant violation");
    crate::error::Error::Internal(diagnostic.to_string())
}
