// ABOUTME: Minimal standard library registered by with_standard_library()
//
// Four categories, one module each. Every function is pure: array helpers
// return new arrays and scripts rebind (`a = Append(a, x)`).

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::functions::{DuplicateFunction, FunctionRegistry, FunctionSignature, JyroFunction};
use crate::value::Value;
use std::rc::Rc;

pub mod arrays;
pub mod math;
pub mod strings;
pub mod types;

/// Registers the whole standard set into a registry.
pub fn register_standard_library(registry: &mut FunctionRegistry) -> Result<(), DuplicateFunction> {
    arrays::register(registry)?;
    strings::register(registry)?;
    math::register(registry)?;
    types::register(registry)?;
    Ok(())
}

type Handler = fn(&[Value], &mut ExecutionContext) -> Result<Value, ExecutionError>;

/// A stdlib entry: a signature plus a plain function pointer. Argument
/// counts and declared types are enforced by the call machinery before the
/// handler runs.
struct BuiltinFunction {
    signature: FunctionSignature,
    handler: Handler,
}

impl BuiltinFunction {
    fn new(signature: FunctionSignature, handler: Handler) -> Rc<dyn JyroFunction> {
        Rc::new(BuiltinFunction { signature, handler })
    }
}

impl JyroFunction for BuiltinFunction {
    fn name(&self) -> &str {
        &self.signature.name
    }

    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn execute(
        &self,
        args: &[Value],
        ctx: &mut ExecutionContext,
    ) -> Result<Value, ExecutionError> {
        (self.handler)(args, ctx)
    }
}

/// Optional-argument access: absent arguments read as Null.
fn arg<'a>(args: &'a [Value], index: usize) -> &'a Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn number_arg(function: &str, args: &[Value], index: usize) -> Result<f64, ExecutionError> {
    match arg(args, index) {
        Value::Number(n) => Ok(n.value),
        other => Err(ExecutionError::InvalidArgumentType {
            function: function.to_string(),
            message: format!("expected number, found {}", other.type_name()),
        }),
    }
}

fn string_arg<'a>(
    function: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a str, ExecutionError> {
    match arg(args, index) {
        Value::String(s) => Ok(s),
        other => Err(ExecutionError::InvalidArgumentType {
            function: function.to_string(),
            message: format!("expected string, found {}", other.type_name()),
        }),
    }
}

fn array_arg<'a>(
    function: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a [Value], ExecutionError> {
    match arg(args, index) {
        Value::Array(items) => Ok(items),
        other => Err(ExecutionError::InvalidArgumentType {
            function: function.to_string(),
            message: format!("expected array, found {}", other.type_name()),
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::limits::{ExecutionLimits, ResourceLimiter};
    use indexmap::IndexMap;

    pub fn call(name: &str, args: &[Value]) -> Result<Value, ExecutionError> {
        let mut registry = FunctionRegistry::new();
        register_standard_library(&mut registry).unwrap();
        let function = registry.get(name).expect("function is registered").clone();
        let mut ctx = ExecutionContext::new(
            IndexMap::new(),
            ResourceLimiter::new(ExecutionLimits::default()),
        );
        function.signature().check_arguments(args)?;
        function.execute(args, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_without_duplicates() {
        let mut registry = FunctionRegistry::new();
        register_standard_library(&mut registry).unwrap();
        assert!(registry.len() >= 20);
        assert!(registry.contains("Append"));
        assert!(registry.contains("TypeOf"));
    }
}
