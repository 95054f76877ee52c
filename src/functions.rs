// ABOUTME: Host function contract: signatures, the JyroFunction trait and
// the registry scripts are linked against

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::value::{JyroType, Value};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// One declared parameter of a host function.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub param_type: JyroType,
    pub is_optional: bool,
}

/// Callable shape of a host function: parameter list, return type and the
/// derived argument-count bounds the linker enforces.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: JyroType,
    pub min_args: usize,
    pub max_args: usize,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionSignature {
            name: name.into(),
            parameters: Vec::new(),
            return_type: JyroType::Any,
            min_args: 0,
            max_args: 0,
        }
    }

    #[must_use]
    pub fn required(mut self, name: &str, param_type: JyroType) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            param_type,
            is_optional: false,
        });
        self.min_args += 1;
        self.max_args += 1;
        self
    }

    #[must_use]
    pub fn optional(mut self, name: &str, param_type: JyroType) -> Self {
        self.parameters.push(Parameter {
            name: name.to_string(),
            param_type,
            is_optional: true,
        });
        self.max_args += 1;
        self
    }

    #[must_use]
    pub fn returns(mut self, return_type: JyroType) -> Self {
        self.return_type = return_type;
        self
    }

    /// Runtime argument check: count already validated at link time for
    /// registry calls, but types are only checked here.
    pub fn check_arguments(&self, args: &[Value]) -> Result<(), ExecutionError> {
        if args.len() < self.min_args {
            let missing = &self.parameters[args.len()];
            return Err(ExecutionError::ArgumentNotProvided(missing.name.clone()));
        }
        if args.len() > self.max_args {
            return Err(ExecutionError::InvalidNumberArguments(self.name.clone()));
        }
        for (param, arg) in self.parameters.iter().zip(args.iter()) {
            // Null flows through like an absent optional value.
            if matches!(arg, Value::Null) {
                continue;
            }
            if !arg.matches_type(param.param_type) {
                return Err(ExecutionError::ArgumentTypeMismatch {
                    name: param.name.clone(),
                    expected: param.param_type.name().to_string(),
                    actual: arg.type_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A host-registered function callable from scripts.
///
/// Implementations may throw the runtime-error carrier; the engine converts
/// it to a diagnostic. Long-running implementations should poll
/// `ctx.limiter().check_execution_time()` and observe the cancellation token
/// in blocking operations.
pub trait JyroFunction {
    fn name(&self) -> &str;
    fn signature(&self) -> &FunctionSignature;
    fn execute(
        &self,
        args: &[Value],
        ctx: &mut ExecutionContext,
    ) -> Result<Value, ExecutionError>;
}

/// Registration error: a second function under an existing name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateFunction(pub String);

impl fmt::Display for DuplicateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function '{}' is registered more than once", self.0)
    }
}

impl std::error::Error for DuplicateFunction {}

/// The set of functions available to a run. Insertion order is preserved so
/// linking and diagnostics stay deterministic.
#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Rc<dyn JyroFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    pub fn register(&mut self, function: Rc<dyn JyroFunction>) -> Result<(), DuplicateFunction> {
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(DuplicateFunction(name));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn JyroFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<dyn JyroFunction>)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub(FunctionSignature);

    impl JyroFunction for Stub {
        fn name(&self) -> &str {
            &self.0.name
        }
        fn signature(&self) -> &FunctionSignature {
            &self.0
        }
        fn execute(
            &self,
            _args: &[Value],
            _ctx: &mut ExecutionContext,
        ) -> Result<Value, ExecutionError> {
            Ok(Value::Null)
        }
    }

    fn stub(name: &str) -> Rc<dyn JyroFunction> {
        Rc::new(Stub(FunctionSignature::new(name).required(
            "value",
            JyroType::Any,
        )))
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = FunctionRegistry::new();
        registry.register(stub("Length")).unwrap();
        assert_eq!(
            registry.register(stub("Length")),
            Err(DuplicateFunction("Length".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_signature_bounds() {
        let sig = FunctionSignature::new("Split")
            .required("text", JyroType::String)
            .optional("separator", JyroType::String);
        assert_eq!(sig.min_args, 1);
        assert_eq!(sig.max_args, 2);
    }

    #[test]
    fn test_check_arguments_types() {
        let sig = FunctionSignature::new("Upper").required("text", JyroType::String);
        assert!(sig.check_arguments(&[Value::string("x")]).is_ok());
        assert!(matches!(
            sig.check_arguments(&[Value::number(1.0)]),
            Err(ExecutionError::ArgumentTypeMismatch { .. })
        ));
        assert!(matches!(
            sig.check_arguments(&[]),
            Err(ExecutionError::ArgumentNotProvided(_))
        ));
        // Null passes any declared type
        assert!(sig.check_arguments(&[Value::Null]).is_ok());
    }
}
