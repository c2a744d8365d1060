//! Code generation errors.
//!
//! None of these are user errors: a program that passed the checker must
//! never produce one. They surface as internal compiler errors.

use etsc_checker::CheckerError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    /// The accumulator does not hold the checked type of the expression
    /// just compiled.
    #[error("accumulator holds '{found}' after compiling {node} in {function}, expected '{expected}'")]
    AccumulatorMismatch { function: String, node: String, expected: String, found: String },
    #[error("unreachable code reached in codegen: {0}")]
    Unreachable(String),
    #[error("label L{label} of {function} is jumped to but never bound")]
    UnboundLabel { function: String, label: u32 },
    /// A register, or the accumulator, was read while the side table had
    /// no type for it.
    #[error("{register} is read without a known type in {function}")]
    UntypedRegister { function: String, register: String },
    #[error(transparent)]
    Check(#[from] CheckerError),
    #[error("internal codegen error: {0}")]
    Internal(String),
}

impl CodegenError {
    pub fn internal(message: impl Into<String>) -> Self {
        CodegenError::Internal(message.into())
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        CodegenError::Unreachable(message.into())
    }
}

pub type CodegenResult<T> = Result<T, CodegenError>;
