//! Type and conversion helpers: TypeOf, ToString, ToNumber, ToBoolean.

use super::{arg, BuiltinFunction};
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::functions::{DuplicateFunction, FunctionRegistry, FunctionSignature};
use crate::value::{JyroType, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), DuplicateFunction> {
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("TypeOf")
            .required("value", JyroType::Any)
            .returns(JyroType::String),
        type_of,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("ToString")
            .required("value", JyroType::Any)
            .returns(JyroType::String),
        to_string,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("ToNumber")
            .required("value", JyroType::Any)
            .returns(JyroType::Number),
        to_number,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("ToBoolean")
            .required("value", JyroType::Any)
            .returns(JyroType::Boolean),
        to_boolean,
    ))?;
    Ok(())
}

fn type_of(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::String(arg(args, 0).type_name().to_string()))
}

fn to_string(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::String(arg(args, 0).to_string()))
}

/// Applies the engine's number coercion table; inconvertible values fail
/// with `InvalidType`, exactly as a typed `var number` would.
fn to_number(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    arg(args, 0).coerce_to(JyroType::Number)
}

fn to_boolean(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    arg(args, 0).coerce_to(JyroType::Boolean)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::call;
    use crate::value::Value;

    #[test]
    fn test_type_of() {
        assert_eq!(
            call("TypeOf", &[Value::Array(vec![])]).unwrap(),
            Value::string("array")
        );
        assert_eq!(call("TypeOf", &[Value::Null]).unwrap(), Value::string("null"));
    }

    #[test]
    fn test_to_string_renders_display_form() {
        assert_eq!(
            call("ToString", &[Value::number(6.0)]).unwrap(),
            Value::string("6")
        );
        assert_eq!(
            call("ToString", &[Value::Boolean(true)]).unwrap(),
            Value::string("true")
        );
    }

    #[test]
    fn test_to_number() {
        assert_eq!(
            call("ToNumber", &[Value::string(" 2.5 ")]).unwrap(),
            Value::number(2.5)
        );
        assert!(call("ToNumber", &[Value::Array(vec![])]).is_err());
    }

    #[test]
    fn test_to_boolean() {
        assert_eq!(
            call("ToBoolean", &[Value::string("TRUE")]).unwrap(),
            Value::Boolean(true)
        );
    }
}
