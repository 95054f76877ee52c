// ABOUTME: Typed runtime-error carrier for the interpreter; converted to a
// diagnostic at the pipeline boundary

use crate::diagnostics::{Diagnostic, MessageCode};
use thiserror::Error;

/// Errors raised while a script is running, including quota violations.
///
/// The interpreter propagates these with `?`; the pipeline turns the first
/// one into an Execution-stage diagnostic with the position of the statement
/// that raised it.
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("cannot compare {left} with {right}")]
    IncomparableTypes { left: String, right: String },

    #[error("operator '{op}' is not supported between {left} and {right}")]
    UnsupportedBinaryOperation {
        op: String,
        left: String,
        right: String,
    },

    #[error("operator '{op}' is not supported on {operand}")]
    UnsupportedUnaryOperation { op: String, operand: String },

    #[error("cannot convert {from} to {to}")]
    InvalidType { from: String, to: String },

    #[error("invalid argument type for '{function}': {message}")]
    InvalidArgumentType { function: String, message: String },

    #[error("cannot set property '{property}' on {target}")]
    SetPropertyOnNonObject { property: String, target: String },

    #[error("cannot set index on {target}")]
    SetIndexOnNonContainer { target: String },

    #[error("value of type {0} is not iterable")]
    NotIterable(String),

    #[error("undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("required argument '{0}' was not provided")]
    ArgumentNotProvided(String),

    #[error("argument '{name}': expected {expected}, found {actual}")]
    ArgumentTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("wrong number of arguments to '{0}'")]
    InvalidNumberArguments(String),

    /// A `fail` statement; the payload is the script-supplied message.
    #[error("{0}")]
    ScriptFailure(String),

    /// Any other runtime fault, including internal inconsistencies.
    #[error("{0}")]
    Runtime(String),

    #[error("execution was cancelled by the host")]
    Cancelled,

    #[error("execution time limit of {0} ms exceeded")]
    ExecutionTimeLimitExceeded(u128),

    #[error("statement limit of {0} exceeded")]
    StatementLimitExceeded(u64),

    #[error("loop iteration limit of {0} exceeded")]
    LoopIterationLimitExceeded(u64),

    #[error("call depth limit of {0} exceeded")]
    CallDepthLimitExceeded(u32),

    #[error("script call depth limit of {0} exceeded")]
    ScriptCallDepthExceeded(u32),

    #[error("recursive script invocation detected")]
    RecursiveScriptCall,
}

impl ExecutionError {
    pub fn invalid_type(from: &str, to: &str) -> Self {
        ExecutionError::InvalidType {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn incomparable(left: &str, right: &str) -> Self {
        ExecutionError::IncomparableTypes {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn unsupported_binary(op: &str, left: &str, right: &str) -> Self {
        ExecutionError::UnsupportedBinaryOperation {
            op: op.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn unsupported_unary(op: &str, operand: &str) -> Self {
        ExecutionError::UnsupportedUnaryOperation {
            op: op.to_string(),
            operand: operand.to_string(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        ExecutionError::Runtime(message.into())
    }

    /// The diagnostic code this error surfaces as.
    pub fn code(&self) -> MessageCode {
        match self {
            ExecutionError::DivisionByZero => MessageCode::DivisionByZero,
            ExecutionError::ModuloByZero => MessageCode::ModuloByZero,
            ExecutionError::IncomparableTypes { .. } => MessageCode::IncomparableTypes,
            ExecutionError::UnsupportedBinaryOperation { .. } => {
                MessageCode::UnsupportedBinaryOperation
            }
            ExecutionError::UnsupportedUnaryOperation { .. } => {
                MessageCode::UnsupportedUnaryOperation
            }
            ExecutionError::InvalidType { .. } => MessageCode::InvalidType,
            ExecutionError::InvalidArgumentType { .. } => MessageCode::InvalidArgumentType,
            ExecutionError::SetPropertyOnNonObject { .. } => MessageCode::SetPropertyOnNonObject,
            ExecutionError::SetIndexOnNonContainer { .. } => MessageCode::SetIndexOnNonContainer,
            ExecutionError::NotIterable(_) => MessageCode::NotIterable,
            ExecutionError::UndefinedFunction(_) => MessageCode::UndefinedFunction,
            ExecutionError::ArgumentNotProvided(_) => MessageCode::ArgumentNotProvided,
            ExecutionError::ArgumentTypeMismatch { .. } => MessageCode::ArgumentTypeMismatch,
            ExecutionError::InvalidNumberArguments(_) => MessageCode::InvalidNumberArguments,
            ExecutionError::ScriptFailure(_) | ExecutionError::Runtime(_) => {
                MessageCode::RuntimeError
            }
            ExecutionError::Cancelled => MessageCode::CancelledByHost,
            ExecutionError::ExecutionTimeLimitExceeded(_) => {
                MessageCode::ExecutionTimeLimitExceeded
            }
            ExecutionError::StatementLimitExceeded(_) => MessageCode::StatementLimitExceeded,
            ExecutionError::LoopIterationLimitExceeded(_) => {
                MessageCode::LoopIterationLimitExceeded
            }
            ExecutionError::CallDepthLimitExceeded(_) => MessageCode::CallDepthLimitExceeded,
            ExecutionError::ScriptCallDepthExceeded(_) => MessageCode::ScriptCallDepthExceeded,
            ExecutionError::RecursiveScriptCall => MessageCode::RecursiveScriptCall,
        }
    }

    /// Positional template arguments matching `MessageCode::template`.
    pub fn arguments(&self) -> Vec<String> {
        match self {
            ExecutionError::DivisionByZero
            | ExecutionError::ModuloByZero
            | ExecutionError::Cancelled
            | ExecutionError::RecursiveScriptCall => vec![],
            ExecutionError::IncomparableTypes { left, right } => {
                vec![left.clone(), right.clone()]
            }
            ExecutionError::UnsupportedBinaryOperation { op, left, right } => {
                vec![op.clone(), left.clone(), right.clone()]
            }
            ExecutionError::UnsupportedUnaryOperation { op, operand } => {
                vec![op.clone(), operand.clone()]
            }
            ExecutionError::InvalidType { from, to } => vec![from.clone(), to.clone()],
            ExecutionError::InvalidArgumentType { function, message } => {
                vec![function.clone(), message.clone()]
            }
            ExecutionError::SetPropertyOnNonObject { property, target } => {
                vec![property.clone(), target.clone()]
            }
            ExecutionError::SetIndexOnNonContainer { target } => vec![target.clone()],
            ExecutionError::NotIterable(type_name) => vec![type_name.clone()],
            ExecutionError::UndefinedFunction(name)
            | ExecutionError::ArgumentNotProvided(name)
            | ExecutionError::InvalidNumberArguments(name) => vec![name.clone()],
            ExecutionError::ArgumentTypeMismatch {
                name,
                expected,
                actual,
            } => vec![name.clone(), expected.clone(), actual.clone()],
            ExecutionError::ScriptFailure(message) | ExecutionError::Runtime(message) => {
                vec![message.clone()]
            }
            ExecutionError::ExecutionTimeLimitExceeded(ms) => vec![ms.to_string()],
            ExecutionError::StatementLimitExceeded(n)
            | ExecutionError::LoopIterationLimitExceeded(n) => vec![n.to_string()],
            ExecutionError::CallDepthLimitExceeded(n)
            | ExecutionError::ScriptCallDepthExceeded(n) => vec![n.to_string()],
        }
    }

    /// Converts this error into an Execution-stage diagnostic.
    pub fn to_diagnostic(&self, line: u32, column: u32) -> Diagnostic {
        Diagnostic::new(self.code(), line, column, self.arguments())
    }
}
