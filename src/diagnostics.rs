// ABOUTME: Diagnostic codes, severities, stages and the message template
// registry shared by every pipeline stage

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// Pipeline stage a diagnostic originated from. Derived from the numeric
/// range of its message code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Lexing,
    Parsing,
    Validation,
    Linking,
    Execution,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexing => f.write_str("lexing"),
            Stage::Parsing => f.write_str("parsing"),
            Stage::Validation => f.write_str("validation"),
            Stage::Linking => f.write_str("linking"),
            Stage::Execution => f.write_str("execution"),
        }
    }
}

/// Every message the engine can emit. Numeric codes are grouped by stage:
/// 1000s lexing, 2000s parsing, 3000s validation, 4000s linking, 5000s
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MessageCode {
    // Lexing
    UnexpectedCharacter,
    UnterminatedString,
    InvalidNumberFormat,
    // Parsing
    UnexpectedToken,
    MissingToken,
    InvalidBinaryFormat,
    // Validation
    InvalidVariableReference,
    InvalidAssignmentTarget,
    TypeMismatch,
    LoopStatementOutsideOfLoop,
    ExcessiveLoopNesting,
    UnreachableCode,
    // Linking
    UndefinedFunction,
    DuplicateFunction,
    TooFewArguments,
    TooManyArguments,
    InvalidNumberArguments,
    // Execution
    RuntimeError,
    CancelledByHost,
    InvalidType,
    InvalidArgumentType,
    DivisionByZero,
    ModuloByZero,
    IncomparableTypes,
    UnsupportedBinaryOperation,
    UnsupportedUnaryOperation,
    InvalidCast,
    SetPropertyOnNonObject,
    SetIndexOnNonContainer,
    NotIterable,
    ArgumentNotProvided,
    ArgumentTypeMismatch,
    ExecutionTimeLimitExceeded,
    StatementLimitExceeded,
    LoopIterationLimitExceeded,
    CallDepthLimitExceeded,
    ScriptCallDepthExceeded,
    RecursiveScriptCall,
}

impl MessageCode {
    pub fn code(&self) -> u16 {
        match self {
            MessageCode::UnexpectedCharacter => 1001,
            MessageCode::UnterminatedString => 1002,
            MessageCode::InvalidNumberFormat => 1003,
            MessageCode::UnexpectedToken => 2001,
            MessageCode::MissingToken => 2002,
            MessageCode::InvalidBinaryFormat => 2003,
            MessageCode::InvalidVariableReference => 3001,
            MessageCode::InvalidAssignmentTarget => 3002,
            MessageCode::TypeMismatch => 3003,
            MessageCode::LoopStatementOutsideOfLoop => 3004,
            MessageCode::ExcessiveLoopNesting => 3005,
            MessageCode::UnreachableCode => 3006,
            MessageCode::UndefinedFunction => 4001,
            MessageCode::DuplicateFunction => 4002,
            MessageCode::TooFewArguments => 4003,
            MessageCode::TooManyArguments => 4004,
            MessageCode::InvalidNumberArguments => 4005,
            MessageCode::RuntimeError => 5000,
            MessageCode::CancelledByHost => 5001,
            MessageCode::InvalidType => 5002,
            MessageCode::InvalidArgumentType => 5003,
            MessageCode::DivisionByZero => 5004,
            MessageCode::ModuloByZero => 5005,
            MessageCode::IncomparableTypes => 5006,
            MessageCode::UnsupportedBinaryOperation => 5007,
            MessageCode::UnsupportedUnaryOperation => 5008,
            MessageCode::InvalidCast => 5009,
            MessageCode::SetPropertyOnNonObject => 5010,
            MessageCode::SetIndexOnNonContainer => 5011,
            MessageCode::NotIterable => 5012,
            MessageCode::ArgumentNotProvided => 5013,
            MessageCode::ArgumentTypeMismatch => 5014,
            MessageCode::ExecutionTimeLimitExceeded => 5020,
            MessageCode::StatementLimitExceeded => 5021,
            MessageCode::LoopIterationLimitExceeded => 5022,
            MessageCode::CallDepthLimitExceeded => 5023,
            MessageCode::ScriptCallDepthExceeded => 5024,
            MessageCode::RecursiveScriptCall => 5025,
        }
    }

    pub fn stage(&self) -> Stage {
        match self.code() {
            1000..=1999 => Stage::Lexing,
            2000..=2999 => Stage::Parsing,
            3000..=3999 => Stage::Validation,
            4000..=4999 => Stage::Linking,
            _ => Stage::Execution,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MessageCode::ExcessiveLoopNesting | MessageCode::UnreachableCode => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// English message template with positional `{0}`-style placeholders.
    /// Kept in one registry so localisation stays additive.
    pub fn template(&self) -> &'static str {
        match self {
            MessageCode::UnexpectedCharacter => "Unexpected character '{0}'",
            MessageCode::UnterminatedString => "Unterminated string literal",
            MessageCode::InvalidNumberFormat => "Invalid number format '{0}'",
            MessageCode::UnexpectedToken => "Unexpected token '{0}', expected {1}",
            MessageCode::MissingToken => "Missing token: expected {0}",
            MessageCode::InvalidBinaryFormat => "Invalid binary script: {0}",
            MessageCode::InvalidVariableReference => "Invalid variable reference '{0}': {1}",
            MessageCode::InvalidAssignmentTarget => "Invalid assignment target: {0}",
            MessageCode::TypeMismatch => "Type mismatch: expected {0}, found {1}",
            MessageCode::LoopStatementOutsideOfLoop => "'{0}' used outside of a loop",
            MessageCode::ExcessiveLoopNesting => "Loop nesting depth {0} exceeds {1}",
            MessageCode::UnreachableCode => "Unreachable code after '{0}'",
            MessageCode::UndefinedFunction => "Undefined function '{0}'",
            MessageCode::DuplicateFunction => "Function '{0}' is registered more than once",
            MessageCode::TooFewArguments => {
                "Too few arguments to '{0}': expected at least {1}, found {2}"
            }
            MessageCode::TooManyArguments => {
                "Too many arguments to '{0}': expected at most {1}, found {2}"
            }
            MessageCode::InvalidNumberArguments => "Wrong number of arguments to '{0}'",
            MessageCode::RuntimeError => "{0}",
            MessageCode::CancelledByHost => "Execution was cancelled by the host",
            MessageCode::InvalidType => "Cannot convert {0} to {1}",
            MessageCode::InvalidArgumentType => "Invalid argument type for '{0}': {1}",
            MessageCode::DivisionByZero => "Division by zero",
            MessageCode::ModuloByZero => "Modulo by zero",
            MessageCode::IncomparableTypes => "Cannot compare {0} with {1}",
            MessageCode::UnsupportedBinaryOperation => {
                "Operator '{0}' is not supported between {1} and {2}"
            }
            MessageCode::UnsupportedUnaryOperation => "Operator '{0}' is not supported on {1}",
            MessageCode::InvalidCast => "Cannot cast {0} to {1}",
            MessageCode::SetPropertyOnNonObject => "Cannot set property '{0}' on {1}",
            MessageCode::SetIndexOnNonContainer => "Cannot set index on {0}",
            MessageCode::NotIterable => "Value of type {0} is not iterable",
            MessageCode::ArgumentNotProvided => "Required argument '{0}' was not provided",
            MessageCode::ArgumentTypeMismatch => "Argument '{0}': expected {1}, found {2}",
            MessageCode::ExecutionTimeLimitExceeded => "Execution time limit of {0} ms exceeded",
            MessageCode::StatementLimitExceeded => "Statement limit of {0} exceeded",
            MessageCode::LoopIterationLimitExceeded => "Loop iteration limit of {0} exceeded",
            MessageCode::CallDepthLimitExceeded => "Call depth limit of {0} exceeded",
            MessageCode::ScriptCallDepthExceeded => "Script call depth limit of {0} exceeded",
            MessageCode::RecursiveScriptCall => "Recursive script invocation detected",
        }
    }
}

/// A single engine message: code, derived severity/stage, source location
/// (1-based; zero means "no location") and template arguments.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub code: MessageCode,
    pub severity: Severity,
    pub stage: Stage,
    pub line: u32,
    pub column: u32,
    pub arguments: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: MessageCode, line: u32, column: u32, arguments: Vec<String>) -> Self {
        Diagnostic {
            code,
            severity: code.severity(),
            stage: code.stage(),
            line,
            column,
            arguments,
        }
    }

    /// A diagnostic with no source location.
    pub fn unpositioned(code: MessageCode, arguments: Vec<String>) -> Self {
        Diagnostic::new(code, 0, 0, arguments)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders the message by substituting `{0}`, `{1}`, ... placeholders.
    pub fn message(&self) -> String {
        format_template(self.code.template(), &self.arguments)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity, self.code.code())?;
        if self.line > 0 {
            write!(f, " ({}:{})", self.line, self.column)?;
        }
        write!(f, ": {}", self.message())
    }
}

fn format_template(template: &str, arguments: &[String]) -> String {
    let mut out = template.to_string();
    for (i, arg) in arguments.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", i), arg);
    }
    out
}
