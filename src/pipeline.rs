// ABOUTME: The public engine façade: composes lexer, parser, validator,
// linker, compiler and interpreter, with per-stage timings and run results

use crate::ast::Program;
use crate::binary::{
    deserialize_program, hash_source, serialize_program, BinaryWriteError,
};
use crate::context::ExecutionContext;
use crate::diagnostics::{Diagnostic, MessageCode};
use crate::functions::{FunctionRegistry, JyroFunction};
use crate::interpreter::CompiledProgram;
use crate::lexer::tokenize;
use crate::limits::{CancellationToken, ExecutionLimits, ResourceLimiter};
use crate::linker::{link, LinkedProgram};
use crate::parser::parse;
use crate::validator::validate;
use crate::value::Value;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Names always available to scripts without declaration.
const BUILTIN_NAMES: &[&str] = &["Data"];

/// Host-configurable knobs for one engine instance.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub limits: ExecutionLimits,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Wall-clock spent in each pipeline stage. The `.jyrx` path reports zero
/// for Parse/Validate/Link; deserialisation is booked under Compile.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StageTimings {
    pub parse: Duration,
    pub validate: Duration,
    pub link: Duration,
    pub compile: Duration,
    pub execute: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.parse + self.validate + self.link + self.compile + self.execute
    }
}

/// Counters and timing for one run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionMetadata {
    pub processing_time: Duration,
    pub statement_count: u64,
    pub loop_count: u64,
    pub function_call_count: u64,
    pub max_call_depth: u32,
    pub started_at: DateTime<Utc>,
    pub stages: StageTimings,
}

/// Outcome of a run: the (possibly partially) mutated data, every
/// diagnostic, and metadata. `is_successful` is false iff any
/// Error-severity diagnostic was emitted.
#[derive(Debug)]
pub struct JyroResult {
    pub is_successful: bool,
    pub data: Value,
    pub messages: Vec<Diagnostic>,
    pub metadata: ExecutionMetadata,
    pub return_value: Option<Value>,
}

impl JyroResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter().filter(|m| m.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages
            .iter()
            .filter(|m| m.severity == crate::diagnostics::Severity::Warning)
    }
}

/// A compiled script ready for repeated execution, with compile-time
/// warnings and stage timings attached.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub(crate) program: CompiledProgram,
    pub warnings: Vec<Diagnostic>,
    pub timings: StageTimings,
}

impl CompiledScript {
    /// Encodes this script as `.jyrx` bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BinaryWriteError> {
        let names: Vec<String> = self.program.linked.functions.keys().cloned().collect();
        serialize_program(&self.program.linked.program, &names, self.program.source_hash)
    }

    pub fn source_hash(&self) -> [u8; 32] {
        self.program.source_hash
    }

    pub fn required_functions(&self) -> impl Iterator<Item = &str> {
        self.program.linked.functions.keys().map(String::as_str)
    }
}

/// The engine: a function registry plus options, exposing
/// compile / execute / run.
#[derive(Debug, Default)]
pub struct Jyro {
    registry: FunctionRegistry,
    options: ExecutionOptions,
}

impl Jyro {
    pub fn new() -> Self {
        Jyro::default()
    }

    pub fn with_options(options: ExecutionOptions) -> Self {
        Jyro {
            registry: FunctionRegistry::new(),
            options,
        }
    }

    pub fn builder() -> JyroBuilder {
        JyroBuilder::new()
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// source → tokens → AST → validated AST → linked → compiled.
    /// Warnings ride along on the compiled script; any Error aborts.
    pub fn compile(&self, source: &str) -> Result<CompiledScript, Vec<Diagnostic>> {
        let mut timings = StageTimings::default();

        let started = Instant::now();
        let tokens = tokenize(source)?;
        let program = parse(tokens)?;
        timings.parse = started.elapsed();
        debug!(
            "parsed {} top-level statements in {:?}",
            program.statements.len(),
            timings.parse
        );

        let started = Instant::now();
        let mut warnings = validate(&program, BUILTIN_NAMES);
        timings.validate = started.elapsed();
        if warnings.iter().any(Diagnostic::is_error) {
            return Err(warnings);
        }

        let started = Instant::now();
        let linked = link(program, &self.registry)?;
        timings.link = started.elapsed();
        debug!(
            "linked {} referenced functions in {:?}",
            linked.functions.len(),
            timings.link
        );

        let started = Instant::now();
        let compiled = CompiledProgram::new(linked, hash_source(source));
        timings.compile = started.elapsed();

        warnings.retain(|d| !d.is_error());
        Ok(CompiledScript {
            program: compiled,
            warnings,
            timings,
        })
    }

    /// bytes → AST, re-resolving function references against the current
    /// registry. Validation and linking checks were already performed when
    /// the blob was produced, so only existence is re-checked here.
    pub fn compile_bytes(&self, bytes: &[u8]) -> Result<CompiledScript, Vec<Diagnostic>> {
        let started = Instant::now();
        let decoded = deserialize_program(bytes).map_err(|e| vec![e.to_diagnostic()])?;
        let mut functions: IndexMap<String, Rc<dyn JyroFunction>> = IndexMap::new();
        let mut missing = Vec::new();
        for name in &decoded.required_functions {
            match self.registry.get(name) {
                Some(function) => {
                    functions.insert(name.clone(), function.clone());
                }
                None => missing.push(Diagnostic::unpositioned(
                    MessageCode::UndefinedFunction,
                    vec![name.clone()],
                )),
            }
        }
        if !missing.is_empty() {
            return Err(missing);
        }
        let linked = LinkedProgram {
            program: decoded.program,
            functions,
        };
        let timings = StageTimings {
            compile: started.elapsed(),
            ..StageTimings::default()
        };
        debug!("loaded binary script in {:?}", timings.compile);
        Ok(CompiledScript {
            program: CompiledProgram::new(linked, decoded.source_hash),
            warnings: Vec::new(),
            timings,
        })
    }

    pub fn execute(&self, script: &CompiledScript, data: Value) -> JyroResult {
        self.execute_with_token(script, data, CancellationToken::new())
    }

    /// Runs a compiled script against `data` under this engine's limits,
    /// linked to a host cancellation token.
    pub fn execute_with_token(
        &self,
        script: &CompiledScript,
        data: Value,
        token: CancellationToken,
    ) -> JyroResult {
        let started_at = Utc::now();
        let limiter = ResourceLimiter::with_token(self.options.limits.clone(), token);
        let mut ctx = ExecutionContext::new(script.program.linked.functions.clone(), limiter);

        let started = Instant::now();
        let outcome = script.program.execute(data, &mut ctx);
        let execute_time = started.elapsed();

        let mut messages = script.warnings.clone();
        messages.extend(ctx.take_messages());
        let stages = StageTimings {
            execute: execute_time,
            ..script.timings
        };
        let metadata = ExecutionMetadata {
            processing_time: stages.total(),
            statement_count: ctx.limiter().statement_count(),
            loop_count: ctx.limiter().loop_iterations(),
            function_call_count: ctx.limiter().function_call_count(),
            max_call_depth: ctx.limiter().max_call_depth_seen(),
            started_at,
            stages,
        };
        let is_successful = !messages.iter().any(Diagnostic::is_error);
        debug!(
            "executed {} statements in {:?} (success: {})",
            metadata.statement_count, execute_time, is_successful
        );
        JyroResult {
            is_successful,
            data: outcome.data,
            messages,
            metadata,
            return_value: outcome.return_value,
        }
    }

    /// compile + execute in one step. Compile failures return an
    /// unsuccessful result carrying the untouched data.
    pub fn run(&self, source: &str, data: Value) -> JyroResult {
        match self.compile(source) {
            Ok(script) => self.execute(&script, data),
            Err(messages) => failed_result(data, messages),
        }
    }

    /// Re-links an already-loaded program (used by the script-in-script
    /// collaborator to execute a nested program under the same registry).
    pub fn link_program(&self, program: Program) -> Result<LinkedProgram, Vec<Diagnostic>> {
        link(program, &self.registry)
    }
}

fn failed_result(data: Value, messages: Vec<Diagnostic>) -> JyroResult {
    JyroResult {
        is_successful: false,
        data,
        messages,
        metadata: ExecutionMetadata {
            processing_time: Duration::ZERO,
            statement_count: 0,
            loop_count: 0,
            function_call_count: 0,
            max_call_depth: 0,
            started_at: Utc::now(),
            stages: StageTimings::default(),
        },
        return_value: None,
    }
}

// ============================================================================
// Fluent builder
// ============================================================================

enum ScriptSource {
    Text(String),
    Bytes(Vec<u8>),
}

/// One-shot fluent surface over [`Jyro`]:
/// `Jyro::builder().with_script(src).with_data(data).run()`.
pub struct JyroBuilder {
    source: Option<ScriptSource>,
    data: Value,
    registry: FunctionRegistry,
    options: ExecutionOptions,
    registration_errors: Vec<Diagnostic>,
}

impl JyroBuilder {
    pub fn new() -> Self {
        JyroBuilder {
            source: None,
            data: Value::Null,
            registry: FunctionRegistry::new(),
            options: ExecutionOptions::default(),
            registration_errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_script(mut self, source: impl Into<String>) -> Self {
        self.source = Some(ScriptSource::Text(source.into()));
        self
    }

    #[must_use]
    pub fn with_script_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.source = Some(ScriptSource::Bytes(bytes));
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_standard_library(mut self) -> Self {
        if let Err(duplicate) = crate::stdlib::register_standard_library(&mut self.registry) {
            self.registration_errors.push(Diagnostic::unpositioned(
                MessageCode::DuplicateFunction,
                vec![duplicate.0],
            ));
        }
        self
    }

    #[must_use]
    pub fn with_function(mut self, function: Rc<dyn JyroFunction>) -> Self {
        if let Err(duplicate) = self.registry.register(function) {
            self.registration_errors.push(Diagnostic::unpositioned(
                MessageCode::DuplicateFunction,
                vec![duplicate.0],
            ));
        }
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run(self) -> JyroResult {
        self.run_with_token(CancellationToken::new())
    }

    pub fn run_with_token(self, token: CancellationToken) -> JyroResult {
        if !self.registration_errors.is_empty() {
            return failed_result(self.data, self.registration_errors);
        }
        let engine = Jyro {
            registry: self.registry,
            options: self.options,
        };
        match self.source {
            None => failed_result(
                self.data,
                vec![Diagnostic::unpositioned(
                    MessageCode::RuntimeError,
                    vec!["no script source provided".to_string()],
                )],
            ),
            Some(ScriptSource::Text(source)) => match engine.compile(&source) {
                Ok(script) => engine.execute_with_token(&script, self.data, token),
                Err(messages) => failed_result(self.data, messages),
            },
            Some(ScriptSource::Bytes(bytes)) => match engine.compile_bytes(&bytes) {
                Ok(script) => engine.execute_with_token(&script, self.data, token),
                Err(messages) => failed_result(self.data, messages),
            },
        }
    }
}

impl Default for JyroBuilder {
    fn default() -> Self {
        JyroBuilder::new()
    }
}
