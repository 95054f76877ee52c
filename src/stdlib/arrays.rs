//! Array helpers: Append, Length, Contains, Sort, Reverse, Map, Filter,
//! Keys, Values. All of them return new values.

use super::{arg, array_arg, BuiltinFunction};
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::functions::{DuplicateFunction, FunctionRegistry, FunctionSignature};
use crate::interpreter::invoke_function;
use crate::value::{JyroType, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), DuplicateFunction> {
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Append")
            .required("array", JyroType::Array)
            .required("item", JyroType::Any)
            .returns(JyroType::Array),
        append,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Length")
            .required("value", JyroType::Any)
            .returns(JyroType::Number),
        length,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Contains")
            .required("container", JyroType::Any)
            .required("item", JyroType::Any)
            .returns(JyroType::Boolean),
        contains,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Sort")
            .required("array", JyroType::Array)
            .returns(JyroType::Array),
        sort,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Reverse")
            .required("array", JyroType::Array)
            .returns(JyroType::Array),
        reverse,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Map")
            .required("array", JyroType::Array)
            .required("transform", JyroType::Function)
            .returns(JyroType::Array),
        map,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Filter")
            .required("array", JyroType::Array)
            .required("predicate", JyroType::Function)
            .returns(JyroType::Array),
        filter,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Keys")
            .required("object", JyroType::Object)
            .returns(JyroType::Array),
        keys,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Values")
            .required("object", JyroType::Object)
            .returns(JyroType::Array),
        values,
    ))?;
    Ok(())
}

fn append(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let mut items = array_arg("Append", args, 0)?.to_vec();
    items.push(arg(args, 1).clone());
    Ok(Value::Array(items))
}

fn length(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let len = match arg(args, 0) {
        Value::Array(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => {
            return Err(ExecutionError::InvalidArgumentType {
                function: "Length".to_string(),
                message: format!("{} has no length", other.type_name()),
            })
        }
    };
    Ok(Value::number(len as f64))
}

fn contains(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let found = match (arg(args, 0), arg(args, 1)) {
        (Value::Array(items), item) => items.iter().any(|candidate| candidate.equals_value(item)),
        (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
        (Value::Object(map), Value::String(key)) => map.contains_key(key.as_str()),
        (container, _) => {
            return Err(ExecutionError::InvalidArgumentType {
                function: "Contains".to_string(),
                message: format!("cannot search in {}", container.type_name()),
            })
        }
    };
    Ok(Value::Boolean(found))
}

/// Sorts a homogeneous array of numbers or strings; mixed element types are
/// rejected rather than given an arbitrary order.
fn sort(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let items = array_arg("Sort", args, 0)?;
    if items.iter().all(|v| matches!(v, Value::Number(_))) {
        let mut sorted = items.to_vec();
        sorted.sort_by(|a, b| match (a, b) {
            (Value::Number(l), Value::Number(r)) => {
                l.value.partial_cmp(&r.value).unwrap_or(std::cmp::Ordering::Equal)
            }
            _ => std::cmp::Ordering::Equal,
        });
        return Ok(Value::Array(sorted));
    }
    if items.iter().all(|v| matches!(v, Value::String(_))) {
        let mut sorted = items.to_vec();
        sorted.sort_by(|a, b| match (a, b) {
            (Value::String(l), Value::String(r)) => l.cmp(r),
            _ => std::cmp::Ordering::Equal,
        });
        return Ok(Value::Array(sorted));
    }
    Err(ExecutionError::InvalidArgumentType {
        function: "Sort".to_string(),
        message: "array must contain only numbers or only strings".to_string(),
    })
}

fn reverse(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let mut items = array_arg("Reverse", args, 0)?.to_vec();
    items.reverse();
    Ok(Value::Array(items))
}

fn map(args: &[Value], ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let items = array_arg("Map", args, 0)?.to_vec();
    let transform = function_arg("Map", args, 1)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        ctx.limiter().check_execution_time()?;
        out.push(invoke_function(&transform, vec![item], ctx)?);
    }
    Ok(Value::Array(out))
}

fn filter(args: &[Value], ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let items = array_arg("Filter", args, 0)?.to_vec();
    let predicate = function_arg("Filter", args, 1)?;
    let mut out = Vec::new();
    for item in items {
        ctx.limiter().check_execution_time()?;
        if invoke_function(&predicate, vec![item.clone()], ctx)?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::Array(out))
}

fn keys(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    match arg(args, 0) {
        Value::Object(map) => Ok(Value::Array(
            map.keys().map(|k| Value::String(k.clone())).collect(),
        )),
        other => Err(ExecutionError::InvalidArgumentType {
            function: "Keys".to_string(),
            message: format!("expected object, found {}", other.type_name()),
        }),
    }
}

fn values(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    match arg(args, 0) {
        Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
        other => Err(ExecutionError::InvalidArgumentType {
            function: "Values".to_string(),
            message: format!("expected object, found {}", other.type_name()),
        }),
    }
}

fn function_arg(
    function: &str,
    args: &[Value],
    index: usize,
) -> Result<crate::value::FunctionValue, ExecutionError> {
    match arg(args, index) {
        Value::Function(f) => Ok(f.clone()),
        other => Err(ExecutionError::InvalidArgumentType {
            function: function.to_string(),
            message: format!("expected function, found {}", other.type_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::call;
    use crate::value::Value;

    #[test]
    fn test_append_returns_new_array() {
        let original = Value::Array(vec![Value::number(1.0)]);
        let appended = call("Append", &[original.clone(), Value::number(2.0)]).unwrap();
        assert_eq!(
            appended,
            Value::Array(vec![Value::number(1.0), Value::number(2.0)])
        );
        assert_eq!(original, Value::Array(vec![Value::number(1.0)]));
    }

    #[test]
    fn test_length() {
        assert_eq!(
            call("Length", &[Value::string("héllo")]).unwrap(),
            Value::number(5.0)
        );
        assert_eq!(call("Length", &[Value::Null]).unwrap(), Value::number(0.0));
        assert!(call("Length", &[Value::number(5.0)]).is_err());
    }

    #[test]
    fn test_contains() {
        let arr = Value::Array(vec![Value::number(1.0), Value::string("x")]);
        assert_eq!(
            call("Contains", &[arr, Value::string("x")]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            call("Contains", &[Value::string("hello"), Value::string("ell")]).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_sort_numbers_and_strings() {
        let nums = Value::Array(vec![
            Value::number(3.0),
            Value::number(1.0),
            Value::number(2.0),
        ]);
        assert_eq!(
            call("Sort", &[nums]).unwrap(),
            Value::Array(vec![
                Value::number(1.0),
                Value::number(2.0),
                Value::number(3.0)
            ])
        );
        let mixed = Value::Array(vec![Value::number(1.0), Value::string("a")]);
        assert!(call("Sort", &[mixed]).is_err());
    }
}
