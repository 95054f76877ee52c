// ABOUTME: Semantic validation over the AST: scoping, assignment targets,
// loop statements, nesting depth and reachability

use crate::ast::{Expression, Program, Statement};
use crate::diagnostics::{Diagnostic, MessageCode};
use std::collections::HashSet;

/// Loop nesting beyond this depth draws a warning.
const MAX_COMFORTABLE_LOOP_DEPTH: u32 = 3;

/// Validates a parsed program. Returns every diagnostic found; the pipeline
/// aborts when any carries Error severity.
pub fn validate(program: &Program, builtins: &[&str]) -> Vec<Diagnostic> {
    let mut validator = Validator {
        builtins: builtins.iter().map(|s| s.to_string()).collect(),
        scopes: vec![HashSet::new()],
        frame_barriers: Vec::new(),
        loop_depth: 0,
        switch_depth: 0,
        diagnostics: Vec::new(),
    };
    validator.walk_statements(&program.statements);
    validator.diagnostics
}

struct Validator {
    builtins: HashSet<String>,
    scopes: Vec<HashSet<String>>,
    frame_barriers: Vec<usize>,
    loop_depth: u32,
    switch_depth: u32,
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn report(&mut self, code: MessageCode, pos: crate::ast::Position, args: Vec<String>) {
        self.diagnostics
            .push(Diagnostic::new(code, pos.line, pos.column, args));
    }

    /// Name visibility mirrors the runtime scope stack: scopes down to the
    /// innermost lambda frame barrier, plus the root scope.
    fn visible_range(&self) -> std::ops::Range<usize> {
        let barrier = self.frame_barriers.last().copied().unwrap_or(0);
        barrier..self.scopes.len()
    }

    fn is_declared(&self, name: &str) -> bool {
        self.builtins.contains(name)
            || self.scopes[self.visible_range()]
                .iter()
                .any(|scope| scope.contains(name))
            || self.scopes[0].contains(name)
    }

    fn declare(&mut self, name: &str, pos: crate::ast::Position) {
        let current = self.scopes.last_mut().expect("scope stack is never empty");
        if current.contains(name) || self.builtins.contains(name) {
            self.report(
                MessageCode::InvalidVariableReference,
                pos,
                vec![name.to_string(), "already declared".to_string()],
            );
        } else {
            current.insert(name.to_string());
        }
    }

    /// Walks one block in its own child scope, optionally seeding an
    /// iterator binding, and checks reachability exactly per block.
    fn walk_block(&mut self, statements: &[Statement], iterator: Option<&str>) {
        self.scopes.push(HashSet::new());
        if let Some(name) = iterator {
            self.scopes
                .last_mut()
                .expect("scope stack is never empty")
                .insert(name.to_string());
        }
        self.walk_statements(statements);
        self.scopes.pop();
    }

    fn walk_statements(&mut self, statements: &[Statement]) {
        let mut terminated_by: Option<&'static str> = None;
        for stmt in statements {
            if let Some(keyword) = terminated_by.take() {
                // Only warn once per block, on the first dead statement.
                if self.loop_depth > 0 {
                    self.report(
                        MessageCode::UnreachableCode,
                        stmt.position(),
                        vec![keyword.to_string()],
                    );
                }
            }
            self.walk_statement(stmt);
            if stmt.is_terminator() {
                terminated_by = Some(stmt.keyword());
            }
        }
    }

    fn walk_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::VarDecl {
                name,
                initializer,
                pos,
                ..
            } => {
                if let Some(init) = initializer {
                    self.walk_expression(init);
                }
                self.declare(name, *pos);
            }
            Statement::Assignment {
                target, value, pos, ..
            } => {
                self.check_assignment_target(target, *pos);
                self.walk_expression(value);
            }
            Statement::If {
                branches,
                else_block,
                ..
            } => {
                for (condition, block) in branches {
                    self.walk_expression(condition);
                    self.walk_block(block, None);
                }
                if let Some(block) = else_block {
                    self.walk_block(block, None);
                }
            }
            Statement::While {
                condition,
                body,
                pos,
            } => {
                self.walk_expression(condition);
                self.enter_loop(*pos);
                self.walk_block(body, None);
                self.loop_depth -= 1;
            }
            Statement::ForEach {
                iterator,
                collection,
                body,
                pos,
            } => {
                self.walk_expression(collection);
                self.enter_loop(*pos);
                self.walk_block(body, Some(iterator));
                self.loop_depth -= 1;
            }
            Statement::For {
                iterator,
                start,
                end,
                step,
                body,
                pos,
                ..
            } => {
                self.walk_expression(start);
                self.walk_expression(end);
                if let Some(step) = step {
                    self.walk_expression(step);
                }
                self.enter_loop(*pos);
                self.walk_block(body, Some(iterator));
                self.loop_depth -= 1;
            }
            Statement::Switch {
                discriminant,
                cases,
                default,
                ..
            } => {
                self.walk_expression(discriminant);
                self.switch_depth += 1;
                for case in cases {
                    for value in &case.values {
                        self.walk_expression(value);
                    }
                    self.walk_block(&case.body, None);
                }
                if let Some(block) = default {
                    self.walk_block(block, None);
                }
                self.switch_depth -= 1;
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
            Statement::Break { pos } => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.report(
                        MessageCode::LoopStatementOutsideOfLoop,
                        *pos,
                        vec!["break".to_string()],
                    );
                }
            }
            Statement::Continue { pos } => {
                if self.loop_depth == 0 {
                    self.report(
                        MessageCode::LoopStatementOutsideOfLoop,
                        *pos,
                        vec!["continue".to_string()],
                    );
                }
            }
            Statement::ExprStmt { expression, .. } => self.walk_expression(expression),
        }
    }

    fn enter_loop(&mut self, pos: crate::ast::Position) {
        self.loop_depth += 1;
        if self.loop_depth > MAX_COMFORTABLE_LOOP_DEPTH {
            self.report(
                MessageCode::ExcessiveLoopNesting,
                pos,
                vec![
                    self.loop_depth.to_string(),
                    MAX_COMFORTABLE_LOOP_DEPTH.to_string(),
                ],
            );
        }
    }

    fn check_assignment_target(&mut self, target: &Expression, pos: crate::ast::Position) {
        if !target.is_assignable() {
            self.report(
                MessageCode::InvalidAssignmentTarget,
                pos,
                vec!["left side is not assignable".to_string()],
            );
            self.walk_expression(target);
            return;
        }
        if let Expression::Identifier { name, .. } = target {
            if name == "Data" {
                self.report(
                    MessageCode::InvalidAssignmentTarget,
                    pos,
                    vec!["'Data' cannot be reassigned".to_string()],
                );
                return;
            }
            if !self.is_declared(name) {
                self.report(
                    MessageCode::InvalidVariableReference,
                    pos,
                    vec![name.clone(), "is not declared".to_string()],
                );
            }
            return;
        }
        // Property/index chains: validate the base expression normally.
        self.walk_expression(target);
    }

    fn walk_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Literal { .. } => {}
            Expression::Identifier { name, pos } => {
                if !self.is_declared(name) {
                    self.report(
                        MessageCode::InvalidVariableReference,
                        *pos,
                        vec![name.clone(), "is not declared".to_string()],
                    );
                }
            }
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
            Expression::Call { arguments, .. } => {
                // Name resolution happens at link time.
                for arg in arguments {
                    self.walk_expression(arg);
                }
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
            Expression::Lambda {
                parameters, body, ..
            } => {
                // Lambda bodies execute in a fresh frame over the root scope,
                // so only parameters and root bindings are visible here.
                self.frame_barriers.push(self.scopes.len());
                self.scopes.push(parameters.iter().cloned().collect());
                self.walk_expression(body);
                self.scopes.pop();
                self.frame_barriers.pop();
            }
            Expression::TypeCheck { target, .. } => self.walk_expression(target),
            Expression::IncrementDecrement { target, pos, .. } => {
                if !target.is_assignable() {
                    self.report(
                        MessageCode::InvalidAssignmentTarget,
                        *pos,
                        vec!["increment target is not assignable".to_string()],
                    );
                } else {
                    self.walk_expression(target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn check(source: &str) -> Vec<Diagnostic> {
        let program = parse_source(source).unwrap();
        validate(&program, &["Data"])
    }

    fn codes(source: &str) -> Vec<MessageCode> {
        check(source).into_iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_undeclared_read() {
        assert_eq!(codes("Data.x = missing"), vec![MessageCode::InvalidVariableReference]);
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        assert_eq!(
            codes("var x = 1\nvar x = 2"),
            vec![MessageCode::InvalidVariableReference]
        );
    }

    #[test]
    fn test_shadowing_builtin_rejected() {
        assert_eq!(codes("var Data = 1"), vec![MessageCode::InvalidVariableReference]);
    }

    #[test]
    fn test_inner_scope_is_invisible_outside() {
        let source = "if true then var inner = 1 end\nData.x = inner";
        assert_eq!(codes(source), vec![MessageCode::InvalidVariableReference]);
    }

    #[test]
    fn test_assign_to_bare_data() {
        assert_eq!(codes("Data = 1"), vec![MessageCode::InvalidAssignmentTarget]);
        // property writes on Data are fine
        assert!(codes("Data.x = 1").is_empty());
    }

    #[test]
    fn test_assign_to_non_target() {
        assert_eq!(codes("1 + 2 = 3"), vec![MessageCode::InvalidAssignmentTarget]);
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(codes("break"), vec![MessageCode::LoopStatementOutsideOfLoop]);
        assert_eq!(codes("continue"), vec![MessageCode::LoopStatementOutsideOfLoop]);
    }

    #[test]
    fn test_break_allowed_in_switch_continue_not() {
        assert!(codes("switch 1 do case 1 then break end").is_empty());
        assert_eq!(
            codes("switch 1 do case 1 then continue end"),
            vec![MessageCode::LoopStatementOutsideOfLoop]
        );
    }

    #[test]
    fn test_iterator_scoped_to_loop() {
        assert!(codes("foreach o in Data.orders do Data.t = o end").is_empty());
        assert_eq!(
            codes("foreach o in Data.orders do end\nData.t = o"),
            vec![MessageCode::InvalidVariableReference]
        );
    }

    #[test]
    fn test_excessive_nesting_warning() {
        let source = "while true do while true do while true do while true do end end end end";
        let diags = check(source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, MessageCode::ExcessiveLoopNesting);
        assert_eq!(diags[0].severity, crate::diagnostics::Severity::Warning);
    }

    #[test]
    fn test_unreachable_after_terminator_in_loop() {
        let source = "while true do break\nData.x = 1 end";
        let diags = check(source);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, MessageCode::UnreachableCode);
    }

    #[test]
    fn test_top_level_return_has_no_unreachable_warning() {
        assert!(codes("return\nData.x = 1").is_empty());
    }

    #[test]
    fn test_lambda_parameters_are_in_scope() {
        assert!(codes("var f = (a, b) => a + b").is_empty());
    }

    #[test]
    fn test_lambda_sees_root_declarations() {
        assert!(codes("var base = 1\nvar f = x => x + base").is_empty());
    }

    #[test]
    fn test_lambda_cannot_see_enclosing_locals() {
        // the lambda body runs in a frame over the root scope, so a local
        // from an enclosing block is out of reach at runtime too
        let source =
            "foreach o in Data.items do var local = o\nvar f = () => local\nData.out = f() end";
        assert_eq!(codes(source), vec![MessageCode::InvalidVariableReference]);
    }

    #[test]
    fn test_nested_lambda_cannot_see_outer_lambda_parameters() {
        assert_eq!(
            codes("var f = x => (y => x + y)"),
            vec![MessageCode::InvalidVariableReference]
        );
    }

    #[test]
    fn test_increment_target_shape() {
        assert!(codes("var x = 1\nx++").is_empty());
        assert_eq!(codes("5++"), vec![MessageCode::InvalidAssignmentTarget]);
    }
}
