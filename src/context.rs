// ABOUTME: Per-run execution state: variable scopes, the linked function
// table, the resource limiter, diagnostics and the script-call stack

use crate::diagnostics::Diagnostic;
use crate::error::ExecutionError;
use crate::functions::JyroFunction;
use crate::limits::{CancellationToken, ResourceLimiter};
use crate::value::{JyroType, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

/// A named binding. The optional hint makes every later store through this
/// binding coerce (typed variables are strict at all assignment sites).
#[derive(Debug, Clone)]
pub struct Variable {
    pub value: Value,
    pub type_hint: Option<JyroType>,
}

/// Lexical scope chain with function-call frames.
///
/// Lookups walk from the innermost scope down to the current frame barrier
/// and then consult the root scope, so lambda bodies see their parameters
/// plus root bindings (including `Data`) but not the caller's locals.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<HashMap<String, Variable>>,
    frame_barriers: Vec<usize>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![HashMap::new()],
            frame_barriers: Vec::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "root scope must not be popped");
        self.scopes.pop();
    }

    /// Opens a function frame: a fresh scope whose lookups cannot see the
    /// caller's locals, only the root scope.
    pub fn push_frame(&mut self) {
        self.frame_barriers.push(self.scopes.len());
        self.scopes.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        if let Some(barrier) = self.frame_barriers.pop() {
            self.scopes.truncate(barrier);
        }
    }

    fn visible_range(&self) -> std::ops::Range<usize> {
        let barrier = self.frame_barriers.last().copied().unwrap_or(0);
        barrier..self.scopes.len()
    }

    pub fn declare(
        &mut self,
        name: &str,
        value: Value,
        type_hint: Option<JyroType>,
    ) -> Result<(), ExecutionError> {
        let coerced = match type_hint {
            Some(hint) => value.coerce_to(hint)?,
            None => value,
        };
        let current = self.scopes.last_mut().expect("scope stack is never empty");
        if current.contains_key(name) {
            return Err(ExecutionError::runtime(format!(
                "variable '{}' is already declared in this scope",
                name
            )));
        }
        current.insert(
            name.to_string(),
            Variable {
                value: coerced,
                type_hint,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        for index in self.visible_range().rev() {
            if let Some(variable) = self.scopes[index].get(name) {
                return Some(&variable.value);
            }
        }
        self.scopes[0].get(name).map(|v| &v.value)
    }

    /// Mutable access for lvalue path writes; bypasses hint coercion, which
    /// only applies to whole-variable assignment.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let range = self.visible_range();
        for index in range.rev() {
            if self.scopes[index].contains_key(name) {
                return self
                    .scopes
                    .get_mut(index)
                    .and_then(|scope| scope.get_mut(name))
                    .map(|v| &mut v.value);
            }
        }
        self.scopes[0].get_mut(name).map(|v| &mut v.value)
    }

    /// Stores into the nearest visible binding, applying its type hint.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ExecutionError> {
        let range = self.visible_range();
        for index in range.rev().chain(std::iter::once(0)) {
            if self.scopes[index].contains_key(name) {
                let hint = self.scopes[index][name].type_hint;
                let coerced = match hint {
                    Some(hint) => value.coerce_to(hint)?,
                    None => value,
                };
                self.scopes[index]
                    .get_mut(name)
                    .expect("binding checked above")
                    .value = coerced;
                return Ok(());
            }
        }
        Err(ExecutionError::runtime(format!(
            "variable '{}' is not declared",
            name
        )))
    }

    /// Removes a root-scope binding, returning its value.
    pub fn take_root(&mut self, name: &str) -> Option<Value> {
        self.scopes[0].remove(name).map(|v| v.value)
    }
}

/// Per-run state handed to the interpreter and to host functions.
pub struct ExecutionContext {
    pub scopes: ScopeStack,
    functions: IndexMap<String, Rc<dyn JyroFunction>>,
    limiter: ResourceLimiter,
    messages: Vec<Diagnostic>,
    script_call_stack: Vec<[u8; 32]>,
}

impl ExecutionContext {
    pub fn new(
        functions: IndexMap<String, Rc<dyn JyroFunction>>,
        limiter: ResourceLimiter,
    ) -> Self {
        ExecutionContext {
            scopes: ScopeStack::new(),
            functions,
            limiter,
            messages: Vec::new(),
            script_call_stack: Vec::new(),
        }
    }

    pub fn limiter(&self) -> &ResourceLimiter {
        &self.limiter
    }

    pub fn limiter_mut(&mut self) -> &mut ResourceLimiter {
        &mut self.limiter
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.limiter.token()
    }

    pub fn function(&self, name: &str) -> Option<Rc<dyn JyroFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn functions(&self) -> &IndexMap<String, Rc<dyn JyroFunction>> {
        &self.functions
    }

    pub fn add_message(&mut self, message: Diagnostic) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.messages)
    }

    /// Guards script-in-script invocation: re-entry with a source hash that
    /// is already on the stack is a cycle, and total depth is bounded.
    pub fn check_and_enter_script_call(&mut self, hash: [u8; 32]) -> Result<(), ExecutionError> {
        if self.script_call_stack.contains(&hash) {
            return Err(ExecutionError::RecursiveScriptCall);
        }
        let max_depth = self.limiter.max_script_call_depth();
        if self.script_call_stack.len() as u32 >= max_depth {
            return Err(ExecutionError::ScriptCallDepthExceeded(max_depth));
        }
        self.script_call_stack.push(hash);
        Ok(())
    }

    pub fn exit_script_call(&mut self) {
        self.script_call_stack.pop();
    }

    pub fn script_call_depth(&self) -> usize {
        self.script_call_stack.len()
    }
}
