//! String helpers: Upper, Lower, Trim, Split, Join, Replace.

use super::{arg, array_arg, string_arg, BuiltinFunction};
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::functions::{DuplicateFunction, FunctionRegistry, FunctionSignature};
use crate::value::{JyroType, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), DuplicateFunction> {
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Upper")
            .required("text", JyroType::String)
            .returns(JyroType::String),
        upper,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Lower")
            .required("text", JyroType::String)
            .returns(JyroType::String),
        lower,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Trim")
            .required("text", JyroType::String)
            .returns(JyroType::String),
        trim,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Split")
            .required("text", JyroType::String)
            .required("separator", JyroType::String)
            .returns(JyroType::Array),
        split,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Join")
            .required("array", JyroType::Array)
            .required("separator", JyroType::String)
            .returns(JyroType::String),
        join,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Replace")
            .required("text", JyroType::String)
            .required("from", JyroType::String)
            .required("to", JyroType::String)
            .returns(JyroType::String),
        replace,
    ))?;
    Ok(())
}

fn upper(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::String(string_arg("Upper", args, 0)?.to_uppercase()))
}

fn lower(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::String(string_arg("Lower", args, 0)?.to_lowercase()))
}

fn trim(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::String(string_arg("Trim", args, 0)?.trim().to_string()))
}

fn split(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let text = string_arg("Split", args, 0)?;
    let separator = string_arg("Split", args, 1)?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(separator)
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Ok(Value::Array(parts))
}

fn join(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let items = array_arg("Join", args, 0)?;
    let separator = string_arg("Join", args, 1)?;
    let joined = items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(separator);
    Ok(Value::String(joined))
}

fn replace(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let text = string_arg("Replace", args, 0)?;
    let from = string_arg("Replace", args, 1)?;
    let to = string_arg("Replace", args, 2)?;
    if from.is_empty() {
        return Ok(arg(args, 0).clone());
    }
    Ok(Value::String(text.replace(from, to)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::call;
    use crate::value::Value;

    #[test]
    fn test_case_and_trim() {
        assert_eq!(
            call("Upper", &[Value::string("abc")]).unwrap(),
            Value::string("ABC")
        );
        assert_eq!(
            call("Lower", &[Value::string("AbC")]).unwrap(),
            Value::string("abc")
        );
        assert_eq!(
            call("Trim", &[Value::string("  x ")]).unwrap(),
            Value::string("x")
        );
    }

    #[test]
    fn test_split_and_join() {
        let parts = call("Split", &[Value::string("a,b,c"), Value::string(",")]).unwrap();
        assert_eq!(
            parts,
            Value::Array(vec![
                Value::string("a"),
                Value::string("b"),
                Value::string("c")
            ])
        );
        assert_eq!(
            call("Join", &[parts, Value::string("-")]).unwrap(),
            Value::string("a-b-c")
        );
    }

    #[test]
    fn test_split_empty_separator_yields_chars() {
        assert_eq!(
            call("Split", &[Value::string("ab"), Value::string("")]).unwrap(),
            Value::Array(vec![Value::string("a"), Value::string("b")])
        );
    }

    #[test]
    fn test_replace() {
        assert_eq!(
            call(
                "Replace",
                &[
                    Value::string("a-b-c"),
                    Value::string("-"),
                    Value::string("+")
                ]
            )
            .unwrap(),
            Value::string("a+b+c")
        );
    }
}
