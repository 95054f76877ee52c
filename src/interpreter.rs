// ABOUTME: Tree-walking interpreter executing a linked program against a
// mutable data root under the resource limiter

use crate::ast::{
    BinaryOperator, Expression, ForDirection, IncrementKind, Literal, Position, Statement,
    UnaryOperator,
};
use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::linker::LinkedProgram;
use crate::value::{FunctionValue, LambdaValue, Number, Value};
use std::rc::Rc;

/// How a block finished: normally, by loop control, or by terminating the
/// whole run.
#[derive(Debug)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
    Fail(String, Position),
}

/// A runtime error annotated with the position of the statement that
/// raised it.
#[derive(Debug, Clone)]
pub struct Fault {
    pub error: ExecutionError,
    pub position: Position,
}

impl Fault {
    fn at(position: Position, error: ExecutionError) -> Self {
        Fault { error, position }
    }
}

/// Result of one program execution. `data` is the root after mutation,
/// regardless of success.
#[derive(Debug)]
pub struct RunOutcome {
    pub data: Value,
    pub return_value: Option<Value>,
    pub failed: bool,
}

/// A linked program in executable form, bound to its source hash.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub linked: LinkedProgram,
    pub source_hash: [u8; 32],
}

impl CompiledProgram {
    pub fn new(linked: LinkedProgram, source_hash: [u8; 32]) -> Self {
        CompiledProgram {
            linked,
            source_hash,
        }
    }

    /// Runs the program with `data` bound as `Data` in the root scope.
    /// Runtime faults become Execution diagnostics on the context; the
    /// mutated root is always handed back.
    pub fn execute(&self, data: Value, ctx: &mut ExecutionContext) -> RunOutcome {
        ctx.limiter_mut().start();
        if let Err(error) = ctx.scopes.declare("Data", data, None) {
            ctx.add_message(error.to_diagnostic(0, 0));
            return RunOutcome {
                data: Value::Null,
                return_value: None,
                failed: true,
            };
        }

        let mut failed = false;
        let mut return_value = None;
        match run_statements(&self.linked.program.statements, ctx) {
            Ok(Flow::Normal) | Ok(Flow::Break) | Ok(Flow::Continue) => {}
            Ok(Flow::Return(value)) => return_value = Some(value),
            Ok(Flow::Fail(message, pos)) => {
                ctx.add_message(
                    ExecutionError::ScriptFailure(message).to_diagnostic(pos.line, pos.column),
                );
                failed = true;
            }
            Err(fault) => {
                ctx.add_message(
                    fault
                        .error
                        .to_diagnostic(fault.position.line, fault.position.column),
                );
                failed = true;
            }
        }

        let data = ctx.scopes.take_root("Data").unwrap_or(Value::Null);
        RunOutcome {
            data,
            return_value,
            failed,
        }
    }
}

type ExecResult<T> = Result<T, Fault>;

fn run_statements(statements: &[Statement], ctx: &mut ExecutionContext) -> ExecResult<Flow> {
    for stmt in statements {
        match run_statement(stmt, ctx)? {
            Flow::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Flow::Normal)
}

/// Runs a block in a fresh child scope, optionally seeding an iterator
/// binding.
fn run_block(
    statements: &[Statement],
    ctx: &mut ExecutionContext,
    iterator: Option<(&str, Value)>,
) -> ExecResult<Flow> {
    ctx.scopes.push_scope();
    let seeded = match iterator {
        Some((name, value)) => ctx.scopes.declare(name, value, None),
        None => Ok(()),
    };
    let result = match seeded {
        Ok(()) => run_statements(statements, ctx),
        Err(error) => Err(Fault::at(Position::default(), error)),
    };
    ctx.scopes.pop_scope();
    result
}

fn run_statement(stmt: &Statement, ctx: &mut ExecutionContext) -> ExecResult<Flow> {
    let pos = stmt.position();
    ctx.limiter_mut()
        .check_and_count_statement()
        .map_err(|e| Fault::at(pos, e))?;

    match stmt {
        Statement::VarDecl {
            name,
            type_hint,
            initializer,
            ..
        } => {
            let value = match initializer {
                Some(init) => eval(init, ctx).map_err(|e| Fault::at(pos, e))?,
                None => Value::Null,
            };
            ctx.scopes
                .declare(name, value, *type_hint)
                .map_err(|e| Fault::at(pos, e))?;
            Ok(Flow::Normal)
        }
        Statement::Assignment {
            target, op, value, ..
        } => {
            let new_value = match op.binary_op() {
                None => eval(value, ctx).map_err(|e| Fault::at(pos, e))?,
                Some(binary_op) => {
                    let current = eval(target, ctx).map_err(|e| Fault::at(pos, e))?;
                    let rhs = eval(value, ctx).map_err(|e| Fault::at(pos, e))?;
                    apply_binary(binary_op, current, rhs).map_err(|e| Fault::at(pos, e))?
                }
            };
            assign(target, new_value, ctx).map_err(|e| Fault::at(pos, e))?;
            Ok(Flow::Normal)
        }
        Statement::If {
            branches,
            else_block,
            ..
        } => {
            for (condition, block) in branches {
                let chosen = eval(condition, ctx).map_err(|e| Fault::at(pos, e))?;
                if chosen.is_truthy() {
                    return run_block(block, ctx, None);
                }
            }
            match else_block {
                Some(block) => run_block(block, ctx, None),
                None => Ok(Flow::Normal),
            }
        }
        Statement::While {
            condition, body, ..
        } => {
            loop {
                let keep_going = eval(condition, ctx).map_err(|e| Fault::at(pos, e))?;
                if !keep_going.is_truthy() {
                    break;
                }
                ctx.limiter_mut()
                    .check_and_enter_loop()
                    .map_err(|e| Fault::at(pos, e))?;
                match run_block(body, ctx, None)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    other => return Ok(other),
                }
            }
            Ok(Flow::Normal)
        }
        Statement::ForEach {
            iterator,
            collection,
            body,
            ..
        } => {
            let source = eval(collection, ctx).map_err(|e| Fault::at(pos, e))?;
            let items: Vec<Value> = match source {
                Value::Array(items) => items,
                Value::Object(map) => map.into_values().collect(),
                Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                other => {
                    return Err(Fault::at(
                        pos,
                        ExecutionError::NotIterable(other.type_name().to_string()),
                    ))
                }
            };
            for item in items {
                ctx.limiter_mut()
                    .check_and_enter_loop()
                    .map_err(|e| Fault::at(pos, e))?;
                match run_block(body, ctx, Some((iterator.as_str(), item)))? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    other => return Ok(other),
                }
            }
            Ok(Flow::Normal)
        }
        Statement::For {
            iterator,
            start,
            end,
            step,
            direction,
            body,
            ..
        } => {
            let start = eval_number(start, ctx).map_err(|e| Fault::at(pos, e))?;
            let end = eval_number(end, ctx).map_err(|e| Fault::at(pos, e))?;
            let step = match step {
                Some(step) => eval_number(step, ctx).map_err(|e| Fault::at(pos, e))?,
                None => match direction {
                    ForDirection::Ascending => 1.0,
                    ForDirection::Descending => -1.0,
                },
            };
            // A zero step is an empty loop, not an error. The step's sign
            // decides the termination test, so `for i = 5 to 1 by -2` counts
            // down even though it was spelled with `to`.
            if step == 0.0 {
                return Ok(Flow::Normal);
            }
            let mut i = start;
            while if step > 0.0 { i <= end } else { i >= end } {
                ctx.limiter_mut()
                    .check_and_enter_loop()
                    .map_err(|e| Fault::at(pos, e))?;
                match run_block(body, ctx, Some((iterator.as_str(), Value::number(i))))? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    other => return Ok(other),
                }
                i += step;
            }
            Ok(Flow::Normal)
        }
        Statement::Switch {
            discriminant,
            cases,
            default,
            ..
        } => {
            let subject = eval(discriminant, ctx).map_err(|e| Fault::at(pos, e))?;
            for case in cases {
                let mut hit = false;
                for candidate in &case.values {
                    let candidate = eval(candidate, ctx).map_err(|e| Fault::at(pos, e))?;
                    if candidate.equals_value(&subject) {
                        hit = true;
                        break;
                    }
                }
                if hit {
                    return match run_block(&case.body, ctx, None)? {
                        // break exits the switch; there is no fall-through
                        Flow::Break => Ok(Flow::Normal),
                        other => Ok(other),
                    };
                }
            }
            match default {
                Some(block) => match run_block(block, ctx, None)? {
                    Flow::Break => Ok(Flow::Normal),
                    other => Ok(other),
                },
                None => Ok(Flow::Normal),
            }
        }
        Statement::Return { value, .. } => {
            let value = match value {
                Some(value) => eval(value, ctx).map_err(|e| Fault::at(pos, e))?,
                None => Value::Null,
            };
            Ok(Flow::Return(value))
        }
        Statement::Fail { message, .. } => {
            let message = match message {
                Some(message) => eval(message, ctx)
                    .map_err(|e| Fault::at(pos, e))?
                    .to_string(),
                None => "Script failed".to_string(),
            };
            Ok(Flow::Fail(message, pos))
        }
        Statement::Break { .. } => Ok(Flow::Break),
        Statement::Continue { .. } => Ok(Flow::Continue),
        Statement::ExprStmt { expression, .. } => {
            eval(expression, ctx).map_err(|e| Fault::at(pos, e))?;
            Ok(Flow::Normal)
        }
    }
}

fn eval_number(expr: &Expression, ctx: &mut ExecutionContext) -> Result<f64, ExecutionError> {
    match eval(expr, ctx)? {
        Value::Number(n) => Ok(n.value),
        other => Err(ExecutionError::invalid_type(other.type_name(), "number")),
    }
}

// ============================================================================
// Expression evaluation
// ============================================================================

pub(crate) fn eval(expr: &Expression, ctx: &mut ExecutionContext) -> Result<Value, ExecutionError> {
    match expr {
        Expression::Literal { value, .. } => Ok(literal_value(value)),
        Expression::Identifier { name, .. } => ctx
            .scopes
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::runtime(format!("variable '{}' is not declared", name))),
        Expression::Binary {
            op, left, right, ..
        } => match op {
            BinaryOperator::And => {
                let left = eval(left, ctx)?;
                if !left.is_truthy() {
                    Ok(left)
                } else {
                    eval(right, ctx)
                }
            }
            BinaryOperator::Or => {
                let left = eval(left, ctx)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    eval(right, ctx)
                }
            }
            BinaryOperator::Coalesce => {
                let left = eval(left, ctx)?;
                if matches!(left, Value::Null) {
                    eval(right, ctx)
                } else {
                    Ok(left)
                }
            }
            op => {
                let left = eval(left, ctx)?;
                let right = eval(right, ctx)?;
                apply_binary(*op, left, right)
            }
        },
        Expression::Unary { op, operand, .. } => {
            let operand = eval(operand, ctx)?;
            match op {
                UnaryOperator::Negate => match operand {
                    Value::Number(n) => Ok(Value::Number(Number {
                        value: -n.value,
                        force_float: n.force_float,
                    })),
                    other => Err(ExecutionError::unsupported_unary("-", other.type_name())),
                },
                UnaryOperator::Not => Ok(Value::Boolean(!operand.is_truthy())),
            }
        }
        Expression::Ternary {
            condition,
            then_value,
            else_value,
            ..
        } => {
            if eval(condition, ctx)?.is_truthy() {
                eval(then_value, ctx)
            } else {
                eval(else_value, ctx)
            }
        }
        Expression::Call {
            name, arguments, ..
        } => eval_call(name, arguments, ctx),
        Expression::PropertyAccess {
            target, property, ..
        } => {
            // Reads are soft: a missing property, a Null target or a
            // non-object all yield Null.
            let target = eval(target, ctx)?;
            Ok(target.get_property(property).cloned().unwrap_or(Value::Null))
        }
        Expression::IndexAccess { target, index, .. } => {
            let target = eval(target, ctx)?;
            let index = eval(index, ctx)?;
            Ok(match (&target, &index) {
                (Value::Object(map), Value::String(key)) => {
                    map.get(key).cloned().unwrap_or(Value::Null)
                }
                (_, Value::Number(n)) => target.get_index(n.value).unwrap_or(Value::Null),
                _ => Value::Null,
            })
        }
        Expression::ObjectLiteral { entries, .. } => {
            let mut map = indexmap::IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                let value = eval(value, ctx)?;
                map.insert(key.clone(), value);
            }
            Ok(Value::Object(map))
        }
        Expression::ArrayLiteral { elements, .. } => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(eval(element, ctx)?);
            }
            Ok(Value::Array(items))
        }
        Expression::Lambda {
            parameters, body, ..
        } => Ok(Value::Function(FunctionValue::Lambda(Rc::new(
            LambdaValue {
                parameters: parameters.clone(),
                body: (**body).clone(),
            },
        )))),
        Expression::TypeCheck {
            target,
            expected,
            negated,
            ..
        } => {
            let value = eval(target, ctx)?;
            let matches = value.matches_type(*expected);
            Ok(Value::Boolean(matches != *negated))
        }
        Expression::IncrementDecrement {
            target,
            kind,
            prefix,
            ..
        } => {
            let current = eval(target, ctx)?;
            let Value::Number(n) = current else {
                let op = if *kind == IncrementKind::Increment {
                    "++"
                } else {
                    "--"
                };
                return Err(ExecutionError::unsupported_unary(op, current.type_name()));
            };
            let delta = if *kind == IncrementKind::Increment {
                1.0
            } else {
                -1.0
            };
            let updated = Value::Number(Number {
                value: n.value + delta,
                force_float: n.force_float,
            });
            assign(target, updated.clone(), ctx)?;
            Ok(if *prefix {
                updated
            } else {
                Value::Number(n)
            })
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Number(n) => Value::number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Operator dispatch for the non-short-circuiting binary operators. The
/// logical operators are still handled totally for compound-assignment use.
pub(crate) fn apply_binary(
    op: BinaryOperator,
    left: Value,
    right: Value,
) -> Result<Value, ExecutionError> {
    match op {
        BinaryOperator::Add => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(Number {
                value: l.value + r.value,
                force_float: l.force_float || r.force_float,
            })),
            (Value::String(l), r) => Ok(Value::String(format!("{}{}", l, r))),
            (l, Value::String(r)) => Ok(Value::String(format!("{}{}", l, r))),
            (Value::Array(mut l), Value::Array(r)) => {
                l.extend(r);
                Ok(Value::Array(l))
            }
            (l, r) => Err(ExecutionError::unsupported_binary(
                "+",
                l.type_name(),
                r.type_name(),
            )),
        },
        BinaryOperator::Subtract | BinaryOperator::Multiply => match (left, right) {
            (Value::Number(l), Value::Number(r)) => {
                let value = if op == BinaryOperator::Subtract {
                    l.value - r.value
                } else {
                    l.value * r.value
                };
                Ok(Value::Number(Number {
                    value,
                    force_float: l.force_float || r.force_float,
                }))
            }
            (l, r) => Err(ExecutionError::unsupported_binary(
                op.symbol(),
                l.type_name(),
                r.type_name(),
            )),
        },
        BinaryOperator::Divide => match (left, right) {
            (Value::Number(l), Value::Number(r)) => {
                if r.value == 0.0 {
                    Err(ExecutionError::DivisionByZero)
                } else {
                    Ok(Value::Number(Number {
                        value: l.value / r.value,
                        force_float: l.force_float || r.force_float,
                    }))
                }
            }
            (l, r) => Err(ExecutionError::unsupported_binary(
                "/",
                l.type_name(),
                r.type_name(),
            )),
        },
        BinaryOperator::Modulo => match (left, right) {
            (Value::Number(l), Value::Number(r)) => {
                if r.value == 0.0 {
                    Err(ExecutionError::ModuloByZero)
                } else {
                    Ok(Value::Number(Number {
                        value: l.value % r.value,
                        force_float: l.force_float || r.force_float,
                    }))
                }
            }
            (l, r) => Err(ExecutionError::unsupported_binary(
                "%",
                l.type_name(),
                r.type_name(),
            )),
        },
        BinaryOperator::Equal => Ok(Value::Boolean(left.equals_value(&right))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!left.equals_value(&right))),
        BinaryOperator::Less
        | BinaryOperator::LessOrEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterOrEqual => compare(op, left, right),
        BinaryOperator::And => Ok(if !left.is_truthy() { left } else { right }),
        BinaryOperator::Or => Ok(if left.is_truthy() { left } else { right }),
        BinaryOperator::Coalesce => Ok(if matches!(left, Value::Null) {
            right
        } else {
            left
        }),
    }
}

fn compare(op: BinaryOperator, left: Value, right: Value) -> Result<Value, ExecutionError> {
    let ordering_holds = |less: bool, equal: bool| match op {
        BinaryOperator::Less => less,
        BinaryOperator::LessOrEqual => less || equal,
        BinaryOperator::Greater => !less && !equal,
        BinaryOperator::GreaterOrEqual => !less,
        _ => false,
    };
    match (&left, &right) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(ordering_holds(
            l.value < r.value,
            crate::value::numbers_equal(l.value, r.value),
        ))),
        (Value::String(l), Value::String(r)) => {
            Ok(Value::Boolean(ordering_holds(l < r, l == r)))
        }
        (Value::Boolean(l), Value::Boolean(r)) => {
            // false sorts before true
            Ok(Value::Boolean(ordering_holds(!l & r, l == r)))
        }
        _ => Err(ExecutionError::incomparable(
            left.type_name(),
            right.type_name(),
        )),
    }
}

// ============================================================================
// Calls
// ============================================================================

fn eval_call(
    name: &str,
    arguments: &[Expression],
    ctx: &mut ExecutionContext,
) -> Result<Value, ExecutionError> {
    // A script variable holding a function value shadows the registry.
    if let Some(bound) = ctx.scopes.get(name).cloned() {
        return match bound {
            Value::Function(function) => {
                let args = eval_arguments(arguments, ctx)?;
                invoke_function(&function, args, ctx)
            }
            other => Err(ExecutionError::runtime(format!(
                "'{}' is a {} and cannot be called",
                name,
                other.type_name()
            ))),
        };
    }
    let Some(function) = ctx.function(name) else {
        return Err(ExecutionError::UndefinedFunction(name.to_string()));
    };
    let args = eval_arguments(arguments, ctx)?;
    invoke_function(&FunctionValue::Host(function), args, ctx)
}

fn eval_arguments(
    arguments: &[Expression],
    ctx: &mut ExecutionContext,
) -> Result<Vec<Value>, ExecutionError> {
    let mut args = Vec::with_capacity(arguments.len());
    for argument in arguments {
        args.push(eval(argument, ctx)?);
    }
    Ok(args)
}

/// Invokes a function value: lambdas run inline in a fresh frame over the
/// root scope, host functions through their `execute` hook. Also the entry
/// point for stdlib functions applying user lambdas (`Map`, `Filter`).
pub fn invoke_function(
    function: &FunctionValue,
    args: Vec<Value>,
    ctx: &mut ExecutionContext,
) -> Result<Value, ExecutionError> {
    ctx.limiter_mut().check_and_enter_call()?;
    let result = match function {
        FunctionValue::Lambda(lambda) => invoke_lambda(lambda, args, ctx),
        FunctionValue::Host(host) => host
            .signature()
            .check_arguments(&args)
            .and_then(|()| host.execute(&args, ctx)),
    };
    ctx.limiter_mut().exit_call();
    result
}

fn invoke_lambda(
    lambda: &LambdaValue,
    args: Vec<Value>,
    ctx: &mut ExecutionContext,
) -> Result<Value, ExecutionError> {
    if args.len() < lambda.parameters.len() {
        return Err(ExecutionError::ArgumentNotProvided(
            lambda.parameters[args.len()].clone(),
        ));
    }
    if args.len() > lambda.parameters.len() {
        return Err(ExecutionError::InvalidNumberArguments("<lambda>".to_string()));
    }
    ctx.scopes.push_frame();
    let mut bound = Ok(());
    for (parameter, arg) in lambda.parameters.iter().zip(args) {
        if let Err(error) = ctx.scopes.declare(parameter, arg, None) {
            bound = Err(error);
            break;
        }
    }
    let result = match bound {
        Ok(()) => eval(&lambda.body, ctx),
        Err(error) => Err(error),
    };
    ctx.scopes.pop_frame();
    result
}

// ============================================================================
// Assignment targets
// ============================================================================

/// One step of an lvalue path, with index expressions already evaluated.
enum Segment {
    Property(String),
    Index(Value),
}

fn assign(
    target: &Expression,
    value: Value,
    ctx: &mut ExecutionContext,
) -> Result<(), ExecutionError> {
    match target {
        Expression::Identifier { name, .. } => ctx.scopes.set(name, value),
        Expression::PropertyAccess { .. } | Expression::IndexAccess { .. } => {
            let (root, segments) = resolve_path(target, ctx)?;
            let root_value = ctx.scopes.get_mut(&root).ok_or_else(|| {
                ExecutionError::runtime(format!("variable '{}' is not declared", root))
            })?;
            write_path(root_value, &segments, value)
        }
        _ => Err(ExecutionError::runtime(
            "invalid assignment target".to_string(),
        )),
    }
}

/// Flattens a property/index chain into its root variable name and ordered
/// segments, evaluating index expressions up front.
fn resolve_path(
    target: &Expression,
    ctx: &mut ExecutionContext,
) -> Result<(String, Vec<Segment>), ExecutionError> {
    match target {
        Expression::Identifier { name, .. } => Ok((name.clone(), Vec::new())),
        Expression::PropertyAccess {
            target, property, ..
        } => {
            let (root, mut segments) = resolve_path(target, ctx)?;
            segments.push(Segment::Property(property.clone()));
            Ok((root, segments))
        }
        Expression::IndexAccess { target, index, .. } => {
            let key = eval(index, ctx)?;
            let (root, mut segments) = resolve_path(target, ctx)?;
            segments.push(Segment::Index(key));
            Ok((root, segments))
        }
        other => Err(ExecutionError::runtime(format!(
            "invalid assignment target at line {}",
            other.position().line
        ))),
    }
}

fn write_path(
    current: &mut Value,
    segments: &[Segment],
    value: Value,
) -> Result<(), ExecutionError> {
    let (segment, rest) = segments
        .split_first()
        .expect("assignment paths have at least one segment");
    if rest.is_empty() {
        return write_segment(current, segment, value);
    }
    let next = match segment {
        Segment::Property(name) => match current {
            Value::Object(map) => map.get_mut(name.as_str()),
            other => {
                return Err(ExecutionError::SetPropertyOnNonObject {
                    property: name.clone(),
                    target: other.type_name().to_string(),
                })
            }
        },
        Segment::Index(key) => match (current, key) {
            (Value::Object(map), Value::String(key)) => map.get_mut(key.as_str()),
            (Value::Array(items), Value::Number(n)) => {
                array_index(n.value, items.len())?.and_then(|idx| items.get_mut(idx))
            }
            (other, _) => {
                return Err(ExecutionError::SetIndexOnNonContainer {
                    target: other.type_name().to_string(),
                })
            }
        },
    };
    match next {
        Some(inner) => write_path(inner, rest, value),
        // A missing intermediate reads as Null, and writing into Null fails.
        None => match &rest[0] {
            Segment::Property(name) => Err(ExecutionError::SetPropertyOnNonObject {
                property: name.clone(),
                target: "null".to_string(),
            }),
            Segment::Index(_) => Err(ExecutionError::SetIndexOnNonContainer {
                target: "null".to_string(),
            }),
        },
    }
}

fn write_segment(
    current: &mut Value,
    segment: &Segment,
    value: Value,
) -> Result<(), ExecutionError> {
    match segment {
        Segment::Property(name) => match current {
            Value::Object(map) => {
                map.insert(name.clone(), value);
                Ok(())
            }
            other => Err(ExecutionError::SetPropertyOnNonObject {
                property: name.clone(),
                target: other.type_name().to_string(),
            }),
        },
        Segment::Index(key) => match (current, key) {
            (Value::Object(map), Value::String(key)) => {
                // literal key; never dot-split
                map.insert(key.clone(), value);
                Ok(())
            }
            (Value::Array(items), Value::Number(n)) => {
                let idx = checked_index(n.value)?;
                if idx >= items.len() {
                    // writing past the end pads with Null
                    items.resize(idx + 1, Value::Null);
                }
                items[idx] = value;
                Ok(())
            }
            (other, _) => Err(ExecutionError::SetIndexOnNonContainer {
                target: other.type_name().to_string(),
            }),
        },
    }
}

fn checked_index(index: f64) -> Result<usize, ExecutionError> {
    if index.fract() != 0.0 || index < 0.0 || index > u32::MAX as f64 {
        return Err(ExecutionError::runtime(format!(
            "invalid array index {}",
            index
        )));
    }
    Ok(index as usize)
}

fn array_index(index: f64, len: usize) -> Result<Option<usize>, ExecutionError> {
    let idx = checked_index(index)?;
    Ok(if idx < len { Some(idx) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionRegistry;
    use crate::json::{parse_json, value_to_json};
    use crate::limits::{ExecutionLimits, ResourceLimiter};
    use crate::linker::link;
    use crate::parser::parse_source;

    fn run_with(source: &str, data: &str, limits: ExecutionLimits) -> (RunOutcome, Vec<crate::diagnostics::Diagnostic>) {
        let program = parse_source(source).unwrap();
        let linked = link(program, &FunctionRegistry::new()).unwrap();
        let compiled = CompiledProgram::new(linked, crate::binary::hash_source(source));
        let mut ctx = ExecutionContext::new(
            compiled.linked.functions.clone(),
            ResourceLimiter::new(limits),
        );
        let outcome = compiled.execute(parse_json(data).unwrap(), &mut ctx);
        let messages = ctx.take_messages();
        (outcome, messages)
    }

    fn run(source: &str, data: &str) -> (RunOutcome, Vec<crate::diagnostics::Diagnostic>) {
        run_with(source, data, ExecutionLimits::default())
    }

    fn data_json(source: &str, data: &str) -> String {
        let (outcome, messages) = run(source, data);
        assert!(messages.is_empty(), "unexpected messages: {:?}", messages);
        serde_json::to_string(&value_to_json(&outcome.data)).unwrap()
    }

    #[test]
    fn test_greeting_scenario() {
        assert_eq!(
            data_json(
                "Data.greeting = 'Hello, ' + Data.name + '!'\nData.canVote = Data.age >= 18",
                "{\"name\":\"Alice\",\"age\":25}"
            ),
            "{\"name\":\"Alice\",\"age\":25,\"greeting\":\"Hello, Alice!\",\"canVote\":true}"
        );
    }

    #[test]
    fn test_loop_sum_scenario() {
        assert_eq!(
            data_json(
                "var t = 0\nforeach o in Data.orders do t = t + o.total end\nData.total = t",
                "{\"orders\":[{\"total\":150.0},{\"total\":75.5}]}"
            ),
            "{\"orders\":[{\"total\":150.0},{\"total\":75.5}],\"total\":225.5}"
        );
    }

    #[test]
    fn test_range_for_negative_step_counts_down() {
        assert_eq!(
            data_json("var a = []\nfor i = 5 to 1 by -2 do a = a + [i] end\nData.a = a", "{}"),
            "{\"a\":[5,3,1]}"
        );
    }

    #[test]
    fn test_range_for_zero_step_is_empty() {
        assert_eq!(
            data_json("var n = 0\nfor i = 1 to 10 by 0 do n = n + 1 end\nData.n = n", "{}"),
            "{\"n\":0}"
        );
    }

    #[test]
    fn test_soft_property_reads() {
        assert_eq!(
            data_json("Data.a = Data.missing\nData.b = Data.missing.deeper\nData.c = Data.a[0]", "{}"),
            "{\"a\":null,\"b\":null,\"c\":null}"
        );
    }

    #[test]
    fn test_write_into_missing_path_fails() {
        let (outcome, messages) = run("Data.a.b = 1", "{}");
        assert!(outcome.failed);
        assert_eq!(
            messages[0].code,
            crate::diagnostics::MessageCode::SetPropertyOnNonObject
        );
    }

    #[test]
    fn test_array_write_pads_with_null() {
        assert_eq!(
            data_json("Data.a = [1]\nData.a[3] = 9", "{}"),
            "{\"a\":[1,null,null,9]}"
        );
    }

    #[test]
    fn test_division_by_zero() {
        let (outcome, messages) = run("Data.x = 1 / 0", "{}");
        assert!(outcome.failed);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].code, crate::diagnostics::MessageCode::DivisionByZero);
        assert_eq!(messages[0].line, 1);
    }

    #[test]
    fn test_partial_mutation_survives_failure() {
        let (outcome, _) = run("Data.first = 1\nData.second = 1 % 0", "{}");
        assert!(outcome.failed);
        assert_eq!(
            serde_json::to_string(&value_to_json(&outcome.data)).unwrap(),
            "{\"first\":1}"
        );
    }

    #[test]
    fn test_and_or_return_deciding_operand() {
        assert_eq!(
            data_json("Data.a = null and 5\nData.b = 0 or 'x'\nData.c = 2 and 3", "{}"),
            "{\"a\":null,\"b\":\"x\",\"c\":3}"
        );
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(
            data_json("Data.a = null ?? 5\nData.b = false ?? 5", "{}"),
            "{\"a\":5,\"b\":false}"
        );
    }

    #[test]
    fn test_string_concat_uses_display_form() {
        assert_eq!(
            data_json("Data.s = 'n=' + 6.0 + ' b=' + true + ' v=' + null", "{}"),
            "{\"s\":\"n=6 b=true v=null\"}"
        );
    }

    #[test]
    fn test_switch_no_fall_through() {
        let source = "switch Data.k do case 1, 2 then Data.r = 'low' case 3 then Data.r = 'mid' default Data.r = 'other' end";
        assert_eq!(data_json(source, "{\"k\":2}"), "{\"k\":2,\"r\":\"low\"}");
        assert_eq!(data_json(source, "{\"k\":3}"), "{\"k\":3,\"r\":\"mid\"}");
        assert_eq!(data_json(source, "{\"k\":9}"), "{\"k\":9,\"r\":\"other\"}");
    }

    #[test]
    fn test_break_exits_switch_and_loops() {
        assert_eq!(
            data_json(
                "var n = 0\nwhile true do n = n + 1\nif n >= 3 then break end end\nData.n = n",
                "{}"
            ),
            "{\"n\":3}"
        );
        assert_eq!(
            data_json(
                "switch 1 do case 1 then Data.r = 'before'\nbreak end\nData.after = true",
                "{}"
            ),
            "{\"r\":\"before\",\"after\":true}"
        );
    }

    #[test]
    fn test_continue_skips_iteration() {
        assert_eq!(
            data_json(
                "var n = 0\nforeach i in [1, 2, 3, 4] do if i % 2 == 0 then continue end\nn = n + i end\nData.n = n",
                "{}"
            ),
            "{\"n\":4}"
        );
    }

    #[test]
    fn test_foreach_iterator_rebinding_leaves_source_untouched() {
        assert_eq!(
            data_json(
                "foreach o in Data.items do o = 99 end",
                "{\"items\":[1,2]}"
            ),
            "{\"items\":[1,2]}"
        );
    }

    #[test]
    fn test_foreach_over_object_values_and_string_chars() {
        assert_eq!(
            data_json(
                "var n = 0\nforeach v in Data.obj do n = n + v end\nvar s = ''\nforeach c in 'abc' do s = c + s end\nData.n = n\nData.s = s",
                "{\"obj\":{\"a\":1,\"b\":2}}"
            ),
            "{\"obj\":{\"a\":1,\"b\":2},\"n\":3,\"s\":\"cba\"}"
        );
    }

    #[test]
    fn test_not_iterable() {
        let (_, messages) = run("foreach x in 5 do end", "{}");
        assert_eq!(messages[0].code, crate::diagnostics::MessageCode::NotIterable);
    }

    #[test]
    fn test_increment_prefix_and_postfix() {
        assert_eq!(
            data_json("var x = 5\nData.a = x++\nData.b = x\nData.c = ++x\nData.d = --x", "{}"),
            "{\"a\":5,\"b\":6,\"c\":7,\"d\":6}"
        );
    }

    #[test]
    fn test_increment_preserves_float_spelling() {
        assert_eq!(
            data_json("Data.n++\nData.m--", "{\"n\":6.0,\"m\":3}"),
            "{\"n\":7.0,\"m\":2}"
        );
    }

    #[test]
    fn test_type_checks() {
        assert_eq!(
            data_json(
                "Data.a = 5 is number\nData.b = 'x' is not string\nData.c = null is null\nData.d = [] is object",
                "{}"
            ),
            "{\"a\":true,\"b\":false,\"c\":true,\"d\":false}"
        );
    }

    #[test]
    fn test_lambda_bound_to_variable_is_callable() {
        assert_eq!(
            data_json("var double = x => x * 2\nData.n = double(21)", "{}"),
            "{\"n\":42}"
        );
    }

    #[test]
    fn test_lambda_sees_root_but_not_caller_locals() {
        let (outcome, messages) = run(
            "var f = x => x + local\nif true then var local = 1\nData.n = f(1) end",
            "{}",
        );
        assert!(outcome.failed);
        assert_eq!(messages[0].code, crate::diagnostics::MessageCode::RuntimeError);
        // root bindings are visible
        assert_eq!(
            data_json("var base = 10\nvar f = x => x + base\nData.n = f(1)", "{}"),
            "{\"n\":11}"
        );
    }

    #[test]
    fn test_typed_variable_strict_at_assignment() {
        let (outcome, messages) = run("var n: number = '5'\nn = [1]", "{}");
        assert!(outcome.failed);
        assert_eq!(messages[0].code, crate::diagnostics::MessageCode::InvalidType);
        assert_eq!(
            data_json("var n: number = '5'\nn = true\nData.n = n", "{}"),
            "{\"n\":1}"
        );
    }

    #[test]
    fn test_return_ends_run_normally() {
        let (outcome, messages) = run("Data.x = 1\nreturn 42\nData.y = 2", "{}");
        assert!(!outcome.failed);
        assert!(messages.is_empty());
        assert_eq!(outcome.return_value, Some(Value::number(42.0)));
        assert_eq!(
            serde_json::to_string(&value_to_json(&outcome.data)).unwrap(),
            "{\"x\":1}"
        );
    }

    #[test]
    fn test_fail_records_runtime_error() {
        let (outcome, messages) = run("fail 'bad'", "{}");
        assert!(outcome.failed);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].code, crate::diagnostics::MessageCode::RuntimeError);
        assert_eq!(messages[0].arguments, vec!["bad".to_string()]);
    }

    #[test]
    fn test_incomparable_types() {
        let (_, messages) = run("Data.x = 1 < 'a'", "{}");
        assert_eq!(messages[0].code, crate::diagnostics::MessageCode::IncomparableTypes);
    }

    #[test]
    fn test_boolean_ordering() {
        assert_eq!(
            data_json("Data.a = false < true\nData.b = true <= true", "{}"),
            "{\"a\":true,\"b\":true}"
        );
    }

    #[test]
    fn test_index_access_literal_string_key_never_splits() {
        assert_eq!(
            data_json("Data.v = Data['a.b']", "{\"a.b\":7,\"a\":{\"b\":1}}"),
            "{\"a.b\":7,\"a\":{\"b\":1},\"v\":7}"
        );
    }

    #[test]
    fn test_statement_limit_stops_run() {
        let (outcome, messages) = run_with(
            "var n = 0\nwhile true do n = n + 1 end",
            "{}",
            ExecutionLimits::new().max_statements(100),
        );
        assert!(outcome.failed);
        assert_eq!(
            messages[0].code,
            crate::diagnostics::MessageCode::StatementLimitExceeded
        );
    }

    #[test]
    fn test_loop_iteration_limit() {
        let (_, messages) = run_with(
            "while true do end",
            "{}",
            ExecutionLimits::new().max_loop_iterations(10),
        );
        assert_eq!(
            messages[0].code,
            crate::diagnostics::MessageCode::LoopIterationLimitExceeded
        );
    }

    #[test]
    fn test_object_and_array_literals_fresh_each_evaluation() {
        assert_eq!(
            data_json(
                "var a = []\nfor i = 1 to 2 do var o = { n: i }\na = a + [o] end\nData.a = a",
                "{}"
            ),
            "{\"a\":[{\"n\":1},{\"n\":2}]}"
        );
    }

    #[test]
    fn test_compound_assignment_on_property() {
        assert_eq!(
            data_json("Data.n += 5\nData.s = 'a'\nData.s += 'b'", "{\"n\":1}"),
            "{\"n\":6,\"s\":\"ab\"}"
        );
    }
}
