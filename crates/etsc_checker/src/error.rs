//! Checker errors.

use etsc_core::text::{SourcePosition, TextSpan};
use etsc_diagnostics::{Diagnostic, DiagnosticCategory};

/// A user type error. The first one aborts checking of the compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} [{file}:{}:{}]", position.line, position.column)]
pub struct TypeError {
    pub message: String,
    pub code: u32,
    pub file: String,
    pub span: TextSpan,
    pub position: SourcePosition,
}

impl TypeError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::from_rendered(
            DiagnosticCategory::TypeError,
            self.code,
            self.message.clone(),
            Some(self.file.clone()),
            Some(self.span),
            Some(self.position),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckerError {
    #[error(transparent)]
    Type(#[from] TypeError),
    /// A broken invariant of the compiler itself, such as a missing builtin.
    #[error("internal checker error: {0}")]
    Internal(String),
}

impl CheckerError {
    pub fn internal(message: impl Into<String>) -> Self {
        CheckerError::Internal(message.into())
    }

    pub fn as_type_error(&self) -> Option<&TypeError> {
        match self {
            CheckerError::Type(e) => Some(e),
            CheckerError::Internal(_) => None,
        }
    }
}

pub type CheckResult<T> = Result<T, CheckerError>;
