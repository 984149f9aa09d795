use std::path::PathBuf;

use thiserror::Error;

use crate::parser::Span;

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String, span: Span },
    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String, span: Span },
    #[error("{function}() expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
        span: Span,
    },
    #[error("parameter '{parameter}' of {function}() requires a code block")]
    CodeBlockRequired {
        function: String,
        parameter: String,
        span: Span,
    },
    #[error("unsupported operand types for '{operator}': {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: &'static str,
        right: &'static str,
        span: Span,
    },
    #[error("{message}")]
    Builtin { message: String, span: Span },
    #[error("{type_name} has no attribute '{attribute}'")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
        span: Span,
    },
    #[error("'{name}' is a {type_name} and cannot be indexed")]
    NotIndexable {
        name: String,
        type_name: &'static str,
        span: Span,
    },
    #[error("'{name}' is a {type_name} and does not support item assignment")]
    ImmutableValue {
        name: String,
        type_name: &'static str,
        span: Span,
    },
    #[error("index must be an integer, got {type_name}")]
    NonIntegerIndex { type_name: &'static str, span: Span },
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        span: Span,
    },
    #[error("division by zero")]
    DivisionByZero { span: Span },
    #[error("integer overflow in '{operator}'")]
    IntegerOverflow { operator: String, span: Span },
    #[error("string of {length} bytes exceeds the limit of {limit}")]
    StringTooLong {
        length: u128,
        limit: usize,
        span: Span,
    },
    #[error("eval() requires an expr(...) value, got {type_name}")]
    NotAnExpression { type_name: &'static str, span: Span },
    #[error("'return' outside of a function")]
    ReturnOutsideFunction { span: Span },
    #[error("maximum call depth of {limit} exceeded")]
    RecursionLimit { limit: usize, span: Span },
    #[error("module not found: {module}")]
    ModuleNotFound { module: String, span: Span },
    #[error("circular import of module {}", .module.display())]
    CircularImport { module: PathBuf, span: Span },
    #[error("module {} has no function '{name}'", .module.display())]
    MissingExport {
        module: PathBuf,
        name: String,
        span: Span,
    },
    #[error("error in module {}: {source}", .module.display())]
    ModuleFailed {
        module: PathBuf,
        source: Box<crate::Error>,
        span: Span,
    },
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl InterpreterError {
    /// Position of the construct that failed. Output errors carry none.
    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable { span, .. }
            | Self::UndefinedFunction { span, .. }
            | Self::ArityMismatch { span, .. }
            | Self::CodeBlockRequired { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::Builtin { span, .. }
            | Self::UnknownAttribute { span, .. }
            | Self::NotIndexable { span, .. }
            | Self::ImmutableValue { span, .. }
            | Self::NonIntegerIndex { span, .. }
            | Self::IndexOutOfBounds { span, .. }
            | Self::DivisionByZero { span }
            | Self::IntegerOverflow { span, .. }
            | Self::StringTooLong { span, .. }
            | Self::NotAnExpression { span, .. }
            | Self::ReturnOutsideFunction { span }
            | Self::RecursionLimit { span, .. }
            | Self::ModuleNotFound { span, .. }
            | Self::CircularImport { span, .. }
            | Self::MissingExport { span, .. }
            | Self::ModuleFailed { span, .. } => *span,
            Self::Output(_) => Span::Indetermined,
        }
    }
}
