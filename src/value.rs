// ABOUTME: Runtime value model for Jyro scripts

use crate::ast::Expression;
use crate::error::ExecutionError;
use crate::functions::JyroFunction;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Recursion cap for equality, display and serialization over value trees.
pub const MAX_VALUE_DEPTH: usize = 200;

/// Numeric payload carried by [`Value::Number`].
///
/// `force_float` preserves the distinction between JSON `6` and `6.0` so that
/// data round-trips without changing its spelling.
#[derive(Debug, Clone, Copy)]
pub struct Number {
    pub value: f64,
    pub force_float: bool,
}

impl Number {
    pub fn new(value: f64) -> Self {
        Number {
            value,
            force_float: false,
        }
    }

    pub fn float(value: f64) -> Self {
        Number {
            value,
            force_float: true,
        }
    }

    /// True when the number should be rendered without a fractional part.
    pub fn is_integer_like(&self) -> bool {
        !self.force_float && self.value.fract() == 0.0 && self.value.is_finite()
    }
}

/// The type tag of a runtime value, also used for variable hints, `is`
/// checks and function parameter declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JyroType {
    Null,
    Number,
    String,
    Boolean,
    Array,
    Object,
    Function,
    Any,
}

impl JyroType {
    pub fn name(&self) -> &'static str {
        match self {
            JyroType::Null => "null",
            JyroType::Number => "number",
            JyroType::String => "string",
            JyroType::Boolean => "boolean",
            JyroType::Array => "array",
            JyroType::Object => "object",
            JyroType::Function => "function",
            JyroType::Any => "any",
        }
    }

    pub fn parse(name: &str) -> Option<JyroType> {
        match name {
            "null" => Some(JyroType::Null),
            "number" => Some(JyroType::Number),
            "string" => Some(JyroType::String),
            "boolean" => Some(JyroType::Boolean),
            "array" => Some(JyroType::Array),
            "object" => Some(JyroType::Object),
            "function" => Some(JyroType::Function),
            "any" => Some(JyroType::Any),
            _ => None,
        }
    }

    /// Stable tag used by the `.jyrx` encoder.
    pub fn tag(self) -> u8 {
        match self {
            JyroType::Null => 0,
            JyroType::Number => 1,
            JyroType::String => 2,
            JyroType::Boolean => 3,
            JyroType::Array => 4,
            JyroType::Object => 5,
            JyroType::Function => 6,
            JyroType::Any => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Option<JyroType> {
        match tag {
            0 => Some(JyroType::Null),
            1 => Some(JyroType::Number),
            2 => Some(JyroType::String),
            3 => Some(JyroType::Boolean),
            4 => Some(JyroType::Array),
            5 => Some(JyroType::Object),
            6 => Some(JyroType::Function),
            7 => Some(JyroType::Any),
            _ => None,
        }
    }
}

impl fmt::Display for JyroType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A callable value: either a script lambda or a host-registered function.
#[derive(Clone)]
pub enum FunctionValue {
    Lambda(Rc<LambdaValue>),
    Host(Rc<dyn JyroFunction>),
}

/// A lambda literal captured as a value: its parameter names and body.
#[derive(Debug, Clone)]
pub struct LambdaValue {
    pub parameters: Vec<String>,
    pub body: Expression,
}

impl FunctionValue {
    pub fn name(&self) -> &str {
        match self {
            FunctionValue::Lambda(_) => "<lambda>",
            FunctionValue::Host(f) => f.name(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            FunctionValue::Lambda(l) => l.parameters.len(),
            FunctionValue::Host(f) => f.signature().parameters.len(),
        }
    }

    /// Identity comparison; function values have no structural equality.
    pub fn same_identity(&self, other: &FunctionValue) -> bool {
        match (self, other) {
            (FunctionValue::Lambda(a), FunctionValue::Lambda(b)) => Rc::ptr_eq(a, b),
            (FunctionValue::Host(a), FunctionValue::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

/// Primary value type for Jyro data and script results.
///
/// Values are owned trees: reads clone subtrees, writes navigate mutable
/// paths from a root binding. Reference cycles are unrepresentable.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Function(FunctionValue),
}

impl Value {
    pub fn number(value: f64) -> Value {
        Value::Number(Number::new(value))
    }

    pub fn float(value: f64) -> Value {
        Value::Number(Number::float(value))
    }

    pub fn string(value: impl Into<String>) -> Value {
        Value::String(value.into())
    }

    pub fn jyro_type(&self) -> JyroType {
        match self {
            Value::Null => JyroType::Null,
            Value::Boolean(_) => JyroType::Boolean,
            Value::Number(_) => JyroType::Number,
            Value::String(_) => JyroType::String,
            Value::Array(_) => JyroType::Array,
            Value::Object(_) => JyroType::Object,
            Value::Function(_) => JyroType::Function,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.jyro_type().name()
    }

    pub fn matches_type(&self, expected: JyroType) -> bool {
        expected == JyroType::Any || self.jyro_type() == expected
    }

    /// Truthiness: Null is false, Booleans are themselves, Numbers are true
    /// outside of epsilon-zero, Strings are true when non-empty, and
    /// containers and functions are always true (even when empty).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => n.value.abs() > f64::EPSILON,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Deep structural equality: Null equals Null, numbers compare within
    /// epsilon, arrays are positional, objects ignore insertion order.
    /// Functions compare by identity only.
    pub fn equals_value(&self, other: &Value) -> bool {
        deep_equals(self, other, 0)
    }

    /// The semantic `Equal` check, which never treats Null as equal to Null.
    pub fn strict_equals(&self, other: &Value) -> bool {
        if matches!(self, Value::Null) && matches!(other, Value::Null) {
            return false;
        }
        deep_equals(self, other, 0)
    }

    /// Property lookup with dotted-path traversal: a `.` in `key` descends
    /// through nested objects one segment at a time.
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        if key.contains('.') {
            let mut current = self;
            for part in key.split('.') {
                current = current.get_literal(part)?;
            }
            Some(current)
        } else {
            self.get_literal(key)
        }
    }

    /// Literal-key property lookup; never splits on dots.
    pub fn get_literal(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Element lookup by numeric index; out-of-range and fractional indices
    /// yield None.
    pub fn get_index(&self, index: f64) -> Option<Value> {
        if index.fract() != 0.0 || index < 0.0 {
            return None;
        }
        let idx = index as usize;
        match self {
            Value::Array(items) => items.get(idx).cloned(),
            Value::String(s) => s.chars().nth(idx).map(|c| Value::String(c.to_string())),
            _ => None,
        }
    }

    /// Coerces a value to a declared type hint.
    ///
    /// Null passes through every hint (typed variables are nullable); any
    /// other cross-type combination not in the coercion table fails with
    /// `InvalidType`.
    pub fn coerce_to(&self, target: JyroType) -> Result<Value, ExecutionError> {
        if target == JyroType::Any || matches!(self, Value::Null) || self.jyro_type() == target {
            return Ok(self.clone());
        }
        match target {
            JyroType::Number => match self {
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::number)
                    .map_err(|_| ExecutionError::invalid_type(self.type_name(), "number")),
                Value::Boolean(b) => Ok(Value::number(if *b { 1.0 } else { 0.0 })),
                _ => Err(ExecutionError::invalid_type(self.type_name(), "number")),
            },
            JyroType::String => match self {
                Value::Number(_) | Value::Boolean(_) => Ok(Value::String(self.to_string())),
                _ => Err(ExecutionError::invalid_type(self.type_name(), "string")),
            },
            JyroType::Boolean => match self {
                Value::Number(n) => Ok(Value::Boolean(n.value.abs() > f64::EPSILON)),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(ExecutionError::invalid_type(self.type_name(), "boolean")),
                },
                _ => Err(ExecutionError::invalid_type(self.type_name(), "boolean")),
            },
            _ => Err(ExecutionError::invalid_type(self.type_name(), target.name())),
        }
    }
}

fn deep_equals(a: &Value, b: &Value, depth: usize) -> bool {
    if depth > MAX_VALUE_DEPTH {
        return true;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x.value, y.value),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(l, r)| deep_equals(l, r, depth + 1))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, left)| {
                    y.get(key)
                        .is_some_and(|right| deep_equals(left, right, depth + 1))
                })
        }
        (Value::Function(x), Value::Function(y)) => x.same_identity(y),
        _ => false,
    }
}

/// Epsilon comparison used everywhere two numbers are tested for equality.
pub fn numbers_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals_value(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(f, self, 0, false)
    }
}

fn fmt_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize, quoted: bool) -> fmt::Result {
    if depth > MAX_VALUE_DEPTH {
        return f.write_str("...");
    }
    match value {
        Value::Null => f.write_str("null"),
        Value::Boolean(b) => write!(f, "{}", b),
        Value::Number(n) => {
            if n.is_integer_like() {
                write!(f, "{}", n.value as i64)
            } else {
                write!(f, "{}", n.value)
            }
        }
        Value::String(s) => {
            if quoted {
                write!(f, "\"{}\"", s)
            } else {
                f.write_str(s)
            }
        }
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_value(f, item, depth + 1, true)?;
            }
            f.write_str("]")
        }
        Value::Object(map) => {
            f.write_str("{")?;
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "\"{}\": ", key)?;
                fmt_value(f, item, depth + 1, true)?;
            }
            f.write_str("}")
        }
        Value::Function(_) => f.write_str("<function>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(entries: &[(&str, Value)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_truthiness_matrix() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(!Value::number(0.0).is_truthy());
        assert!(Value::number(0.5).is_truthy());
        assert!(Value::number(-3.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
        // Empty containers are truthy, unlike some languages.
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::Object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_number_display() {
        assert_eq!(Value::number(42.0).to_string(), "42");
        assert_eq!(Value::number(-2.5).to_string(), "-2.5");
        assert_eq!(Value::number(0.0).to_string(), "0");
        assert_eq!(Value::float(6.0).to_string(), "6");
    }

    #[test]
    fn test_string_display_unquoted_at_top_level() {
        assert_eq!(Value::string("hello").to_string(), "hello");
        let arr = Value::Array(vec![Value::string("a"), Value::number(1.0)]);
        assert_eq!(arr.to_string(), "[\"a\", 1]");
    }

    #[test]
    fn test_deep_equality_objects_ignore_order() {
        let a = obj(&[("x", Value::number(1.0)), ("y", Value::number(2.0))]);
        let b = obj(&[("y", Value::number(2.0)), ("x", Value::number(1.0))]);
        assert!(a.equals_value(&b));
    }

    #[test]
    fn test_array_equality_is_positional() {
        let a = Value::Array(vec![Value::number(1.0), Value::number(2.0)]);
        let b = Value::Array(vec![Value::number(2.0), Value::number(1.0)]);
        assert!(!a.equals_value(&b));
    }

    #[test]
    fn test_null_equality_split() {
        assert!(Value::Null.equals_value(&Value::Null));
        assert!(!Value::Null.strict_equals(&Value::Null));
    }

    #[test]
    fn test_numbers_equal_within_epsilon() {
        let a = Value::number(0.1 + 0.2);
        let b = Value::number(0.3);
        assert!(a.equals_value(&b));
    }

    #[test]
    fn test_get_property_splits_dots() {
        let nested = obj(&[("inner", obj(&[("leaf", Value::number(7.0))]))]);
        assert_eq!(nested.get_property("inner.leaf"), Some(&Value::number(7.0)));
        // literal lookup never splits
        assert!(nested.get_literal("inner.leaf").is_none());
    }

    #[test]
    fn test_get_index() {
        let arr = Value::Array(vec![Value::number(10.0), Value::number(20.0)]);
        assert_eq!(arr.get_index(1.0), Some(Value::number(20.0)));
        assert_eq!(arr.get_index(2.0), None);
        assert_eq!(arr.get_index(0.5), None);
        assert_eq!(arr.get_index(-1.0), None);
        let s = Value::string("abc");
        assert_eq!(s.get_index(1.0), Some(Value::string("b")));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(
            Value::string("2.5").coerce_to(JyroType::Number).unwrap(),
            Value::number(2.5)
        );
        assert_eq!(
            Value::Boolean(true).coerce_to(JyroType::Number).unwrap(),
            Value::number(1.0)
        );
        assert!(Value::Array(vec![]).coerce_to(JyroType::Number).is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            Value::string("TRUE").coerce_to(JyroType::Boolean).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Value::number(0.0).coerce_to(JyroType::Boolean).unwrap(),
            Value::Boolean(false)
        );
        assert!(Value::string("yes").coerce_to(JyroType::Boolean).is_err());
    }

    #[test]
    fn test_null_passes_any_hint() {
        assert_eq!(Value::Null.coerce_to(JyroType::Array).unwrap(), Value::Null);
        assert_eq!(Value::Null.coerce_to(JyroType::Number).unwrap(), Value::Null);
    }
}
