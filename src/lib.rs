// ABOUTME: Jyro, an embeddable sandboxed scripting language for
// transforming JSON-like data under hard resource quotas

pub mod ast;
pub mod binary;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod functions;
pub mod interpreter;
pub mod json;
pub mod lexer;
pub mod limits;
pub mod linker;
pub mod parser;
pub mod pipeline;
pub mod stdlib;
pub mod validator;
pub mod value;

pub use crate::context::ExecutionContext;
pub use crate::diagnostics::{Diagnostic, MessageCode, Severity, Stage};
pub use crate::error::ExecutionError;
pub use crate::functions::{FunctionRegistry, FunctionSignature, JyroFunction, Parameter};
pub use crate::json::{parse_json, value_from_json, value_to_json};
pub use crate::limits::{CancellationToken, ExecutionLimits};
pub use crate::pipeline::{
    CompiledScript, ExecutionMetadata, ExecutionOptions, Jyro, JyroBuilder, JyroResult,
    StageTimings,
};
pub use crate::value::{JyroType, Value};
