//! Driver errors.

use etsc_checker::CheckerError;
use etsc_codegen::CodegenError;
use etsc_diagnostics::Diagnostic;
use etsc_lowering::LoweringError;
use etsc_options::OptionsError;

/// A source text the diagnostics of a [`CompileError::User`] may point into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
    /// Syntax, binding or type errors in the compiled sources.
    #[error("{}", summary(diagnostics))]
    User { diagnostics: Vec<Diagnostic>, sources: Vec<SourceText> },
    /// A broken invariant of the compiler.
    #[error("{0}")]
    Internal(String),
}

fn summary(diagnostics: &[Diagnostic]) -> String {
    match diagnostics.first() {
        Some(first) if diagnostics.len() == 1 => first.to_string(),
        Some(first) => format!("{} (and {} more)", first, diagnostics.len() - 1),
        None => "compilation failed".to_string(),
    }
}

impl CompileError {
    pub(crate) fn io(path: impl Into<String>, error: &std::io::Error) -> Self {
        CompileError::Io { path: path.into(), message: error.to_string() }
    }

    pub(crate) fn from_checker(error: CheckerError, sources: &[SourceText]) -> Self {
        match error {
            CheckerError::Type(e) => CompileError::User { diagnostics: vec![e.to_diagnostic()], sources: sources.to_vec() },
            CheckerError::Internal(_) => CompileError::Internal(error.to_string()),
        }
    }

    pub(crate) fn from_lowering(error: LoweringError, sources: &[SourceText]) -> Self {
        match error {
            LoweringError::Check(e) => Self::from_checker(e, sources),
            LoweringError::Postcondition(_) => CompileError::Internal(error.to_string()),
        }
    }

    pub(crate) fn from_codegen(error: CodegenError, sources: &[SourceText]) -> Self {
        match error {
            CodegenError::Check(e) => Self::from_checker(e, sources),
            other => CompileError::Internal(other.to_string()),
        }
    }

    /// Process exit status for this error: 1 for options and files, 2 for
    /// errors in the sources, 3 for internal errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Options(_) | CompileError::Io { .. } => 1,
            CompileError::User { .. } => 2,
            CompileError::Internal(_) => 3,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
