// ABOUTME: Resolves Call nodes against the function registry, checks arity
// and narrows the program to the functions it actually references

use crate::ast::{Expression, Program, Statement};
use crate::diagnostics::{Diagnostic, MessageCode};
use crate::functions::{FunctionRegistry, JyroFunction};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::rc::Rc;

/// A validated program plus the subset of registry functions it references.
#[derive(Clone)]
pub struct LinkedProgram {
    pub program: Program,
    pub functions: IndexMap<String, Rc<dyn JyroFunction>>,
}

impl std::fmt::Debug for LinkedProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("statements", &self.program.statements.len())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Links a validated program. Calls whose name is bound by a script
/// variable or lambda parameter dispatch to function values at runtime and
/// are skipped here; everything else must resolve in the registry with a
/// compatible argument count.
pub fn link(program: Program, registry: &FunctionRegistry) -> Result<LinkedProgram, Vec<Diagnostic>> {
    let script_names = collect_script_names(&program);
    let mut linker = Linker {
        registry,
        script_names,
        referenced: IndexMap::new(),
        diagnostics: Vec::new(),
    };
    for stmt in &program.statements {
        linker.walk_statement(stmt);
    }
    if linker.diagnostics.is_empty() {
        Ok(LinkedProgram {
            program,
            functions: linker.referenced,
        })
    } else {
        Err(linker.diagnostics)
    }
}

/// Every name a script binds itself: variable declarations, loop iterators
/// and lambda parameters.
fn collect_script_names(program: &Program) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in &program.statements {
        collect_statement_names(stmt, &mut names);
    }
    names
}

fn collect_statement_names(stmt: &Statement, names: &mut HashSet<String>) {
    match stmt {
        Statement::VarDecl {
            name, initializer, ..
        } => {
            names.insert(name.clone());
            if let Some(init) = initializer {
                collect_expression_names(init, names);
            }
        }
        Statement::Assignment { target, value, .. } => {
            collect_expression_names(target, names);
            collect_expression_names(value, names);
        }
        Statement::If {
            branches,
            else_block,
            ..
        } => {
            for (condition, block) in branches {
                collect_expression_names(condition, names);
                for s in block {
                    collect_statement_names(s, names);
                }
            }
            if let Some(block) = else_block {
                for s in block {
                    collect_statement_names(s, names);
                }
            }
        }
        Statement::While {
            condition, body, ..
        } => {
            collect_expression_names(condition, names);
            for s in body {
                collect_statement_names(s, names);
            }
        }
        Statement::ForEach {
            iterator,
            collection,
            body,
            ..
        } => {
            names.insert(iterator.clone());
            collect_expression_names(collection, names);
            for s in body {
                collect_statement_names(s, names);
            }
        }
        Statement::For {
            iterator,
            start,
            end,
            step,
            body,
            ..
        } => {
            names.insert(iterator.clone());
            collect_expression_names(start, names);
            collect_expression_names(end, names);
            if let Some(step) = step {
                collect_expression_names(step, names);
            }
            for s in body {
                collect_statement_names(s, names);
            }
        }
        Statement::Switch {
            discriminant,
            cases,
            default,
            ..
        } => {
            collect_expression_names(discriminant, names);
            for case in cases {
                for value in &case.values {
                    collect_expression_names(value, names);
                }
                for s in &case.body {
                    collect_statement_names(s, names);
                }
            }
            if let Some(block) = default {
                for s in block {
                    collect_statement_names(s, names);
                }
            }
        }
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                collect_expression_names(value, names);
            }
        }
        Statement::Fail { message, .. } => {
            if let Some(message) = message {
                collect_expression_names(message, names);
            }
        }
        Statement::Break { .. } | Statement::Continue { .. } => {}
        Statement::ExprStmt { expression, .. } => collect_expression_names(expression, names),
    }
}

fn collect_expression_names(expr: &Expression, names: &mut HashSet<String>) {
    match expr {
        Expression::Literal { .. } | Expression::Identifier { .. } => {}
        Expression::Binary { left, right, .. } => {
            collect_expression_names(left, names);
            collect_expression_names(right, names);
        }
        Expression::Unary { operand, .. } => collect_expression_names(operand, names),
        Expression::Ternary {
            condition,
            then_value,
            else_value,
            ..
        } => {
            collect_expression_names(condition, names);
            collect_expression_names(then_value, names);
            collect_expression_names(else_value, names);
        }
        Expression::Call { arguments, .. } => {
            for arg in arguments {
                collect_expression_names(arg, names);
            }
        }
        Expression::PropertyAccess { target, .. } => collect_expression_names(target, names),
        Expression::IndexAccess { target, index, .. } => {
            collect_expression_names(target, names);
            collect_expression_names(index, names);
        }
        Expression::ObjectLiteral { entries, .. } => {
            for (_, value) in entries {
                collect_expression_names(value, names);
            }
        }
        Expression::ArrayLiteral { elements, .. } => {
            for element in elements {
                collect_expression_names(element, names);
            }
        }
        Expression::Lambda {
            parameters, body, ..
        } => {
            for param in parameters {
                names.insert(param.clone());
            }
            collect_expression_names(body, names);
        }
        Expression::TypeCheck { target, .. } => collect_expression_names(target, names),
        Expression::IncrementDecrement { target, .. } => collect_expression_names(target, names),
    }
}

struct Linker<'a> {
    registry: &'a FunctionRegistry,
    script_names: HashSet<String>,
    referenced: IndexMap<String, Rc<dyn JyroFunction>>,
    diagnostics: Vec<Diagnostic>,
}

impl Linker<'_> {
    fn walk_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::VarDecl { initializer, .. } => {
                if let Some(init) = initializer {
                    self.walk_expression(init);
                }
            }
            Statement::Assignment { target, value, .. } => {
                self.walk_expression(target);
                self.walk_expression(value);
            }
            Statement::If {
                branches,
                else_block,
                ..
            } => {
                for (condition, block) in branches {
                    self.walk_expression(condition);
                    for s in block {
                        self.walk_statement(s);
                    }
                }
                if let Some(block) = else_block {
                    for s in block {
                        self.walk_statement(s);
                    }
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                self.walk_expression(condition);
                for s in body {
                    self.walk_statement(s);
                }
            }
            Statement::ForEach {
                collection, body, ..
            } => {
                self.walk_expression(collection);
                for s in body {
                    self.walk_statement(s);
                }
            }
            Statement::For {
                start,
                end,
                step,
                body,
                ..
            } => {
                self.walk_expression(start);
                self.walk_expression(end);
                if let Some(step) = step {
                    self.walk_expression(step);
                }
                for s in body {
                    self.walk_statement(s);
                }
            }
            Statement::Switch {
                discriminant,
                cases,
                default,
                ..
            } => {
                self.walk_expression(discriminant);
                for case in cases {
                    for value in &case.values {
                        self.walk_expression(value);
                    }
                    for s in &case.body {
                        self.walk_statement(s);
                    }
                }
                if let Some(block) = default {
                    for s in block {
                        self.walk_statement(s);
                    }
                }
            }
            Statement::Return { value, .. } => {
                if let Some(value) = value {
                    self.walk_expression(value);
                }
            }
            Statement::Fail { message, .. } => {
                if let Some(message) = message {
                    self.walk_expression(message);
                }
            }
            Statement::Break { .. } | Statement::Continue { .. } => {}
            Statement::ExprStmt { expression, .. } => self.walk_expression(expression),
        }
    }

    fn walk_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Call {
                name,
                arguments,
                pos,
            } => {
                for arg in arguments {
                    self.walk_expression(arg);
                }
                if self.script_names.contains(name) {
                    return;
                }
                let Some(function) = self.registry.get(name) else {
                    self.diagnostics.push(Diagnostic::new(
                        MessageCode::UndefinedFunction,
                        pos.line,
                        pos.column,
                        vec![name.clone()],
                    ));
                    return;
                };
                let signature = function.signature();
                if arguments.len() < signature.min_args {
                    self.diagnostics.push(Diagnostic::new(
                        MessageCode::TooFewArguments,
                        pos.line,
                        pos.column,
                        vec![
                            name.clone(),
                            signature.min_args.to_string(),
                            arguments.len().to_string(),
                        ],
                    ));
                } else if arguments.len() > signature.max_args {
                    self.diagnostics.push(Diagnostic::new(
                        MessageCode::TooManyArguments,
                        pos.line,
                        pos.column,
                        vec![
                            name.clone(),
                            signature.max_args.to_string(),
                            arguments.len().to_string(),
                        ],
                    ));
                } else {
                    self.referenced.insert(name.clone(), function.clone());
                }
            }
            Expression::Literal { .. } | Expression::Identifier { .. } => {}
            Expression::Binary { left, right, .. } => {
                self.walk_expression(left);
                self.walk_expression(right);
            }
            Expression::Unary { operand, .. } => self.walk_expression(operand),
            Expression::Ternary {
                condition,
                then_value,
                else_value,
                ..
            } => {
                self.walk_expression(condition);
                self.walk_expression(then_value);
                self.walk_expression(else_value);
            }
            Expression::PropertyAccess { target, .. } => self.walk_expression(target),
            Expression::IndexAccess { target, index, .. } => {
                self.walk_expression(target);
                self.walk_expression(index);
            }
            Expression::ObjectLiteral { entries, .. } => {
                for (_, value) in entries {
                    self.walk_expression(value);
                }
            }
            Expression::ArrayLiteral { elements, .. } => {
                for element in elements {
                    self.walk_expression(element);
                }
            }
            Expression::Lambda { body, .. } => self.walk_expression(body),
            Expression::TypeCheck { target, .. } => self.walk_expression(target),
            Expression::IncrementDecrement { target, .. } => self.walk_expression(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::error::ExecutionError;
    use crate::functions::FunctionSignature;
    use crate::parser::parse_source;
    use crate::value::{JyroType, Value};

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

    fn registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry
            .register(Rc::new(Stub(
                FunctionSignature::new("Length").required("value", JyroType::Any),
            )))
            .unwrap();
        registry
            .register(Rc::new(Stub(
                FunctionSignature::new("Append")
                    .required("array", JyroType::Array)
                    .required("item", JyroType::Any),
            )))
            .unwrap();
        registry
            .register(Rc::new(Stub(
                FunctionSignature::new("Unused").required("value", JyroType::Any),
            )))
            .unwrap();
        registry
    }

    fn link_src(source: &str) -> Result<LinkedProgram, Vec<Diagnostic>> {
        link(parse_source(source).unwrap(), &registry())
    }

    #[test]
    fn test_links_referenced_subset() {
        let linked = link_src("Data.n = Length(Data.items)").unwrap();
        assert_eq!(linked.functions.len(), 1);
        assert!(linked.functions.contains_key("Length"));
    }

    #[test]
    fn test_undefined_function() {
        let errs = link_src("Data.n = Missing(1)").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, MessageCode::UndefinedFunction);
        assert_eq!(errs[0].arguments, vec!["Missing".to_string()]);
    }

    #[test]
    fn test_arity_bounds() {
        let errs = link_src("Data.n = Append(Data.items)").unwrap_err();
        assert_eq!(errs[0].code, MessageCode::TooFewArguments);
        let errs = link_src("Data.n = Append(Data.items, 1, 2)").unwrap_err();
        assert_eq!(errs[0].code, MessageCode::TooManyArguments);
    }

    #[test]
    fn test_variable_held_lambdas_skip_registry() {
        let linked = link_src("var f = x => x\nData.n = f(1)").unwrap();
        assert!(linked.functions.is_empty());
    }

    #[test]
    fn test_collects_all_errors() {
        let errs = link_src("Data.a = Missing(1)\nData.b = AlsoMissing(2)").unwrap_err();
        assert_eq!(errs.len(), 2);
    }
}
