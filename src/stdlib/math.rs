//! Numeric helpers: Abs, Floor, Ceil, Round, Min, Max.

use super::{number_arg, BuiltinFunction};
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::functions::{DuplicateFunction, FunctionRegistry, FunctionSignature};
use crate::value::{JyroType, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), DuplicateFunction> {
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Abs")
            .required("value", JyroType::Number)
            .returns(JyroType::Number),
        abs,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Floor")
            .required("value", JyroType::Number)
            .returns(JyroType::Number),
        floor,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Ceil")
            .required("value", JyroType::Number)
            .returns(JyroType::Number),
        ceil,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Round")
            .required("value", JyroType::Number)
            .returns(JyroType::Number),
        round,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Min")
            .required("left", JyroType::Number)
            .required("right", JyroType::Number)
            .returns(JyroType::Number),
        min,
    ))?;
    registry.register(BuiltinFunction::new(
        FunctionSignature::new("Max")
            .required("left", JyroType::Number)
            .required("right", JyroType::Number)
            .returns(JyroType::Number),
        max,
    ))?;
    Ok(())
}

fn abs(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::number(number_arg("Abs", args, 0)?.abs()))
}

fn floor(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::number(number_arg("Floor", args, 0)?.floor()))
}

fn ceil(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::number(number_arg("Ceil", args, 0)?.ceil()))
}

fn round(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    Ok(Value::number(number_arg("Round", args, 0)?.round()))
}

fn min(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let left = number_arg("Min", args, 0)?;
    let right = number_arg("Min", args, 1)?;
    Ok(Value::number(left.min(right)))
}

fn max(args: &[Value], _ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    let left = number_arg("Max", args, 0)?;
    let right = number_arg("Max", args, 1)?;
    Ok(Value::number(left.max(right)))
}
