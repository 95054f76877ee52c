// ABOUTME: Recursive-descent parser turning the token stream into the AST
//
// Precedence, lowest to highest: ternary, or, and, equality, relational
// (including `is` type checks), additive, multiplicative, coalesce, unary,
// postfix. `elseif` chains are flattened into condition/block pairs.

use crate::ast::{
    AssignmentOperator, BinaryOperator, Expression, ForDirection, IncrementKind, Literal, Position,
    Program, Statement, SwitchCase, UnaryOperator,
};
use crate::diagnostics::{Diagnostic, MessageCode};
use crate::lexer::{Token, TokenKind};
use crate::value::JyroType;

/// Parses a token stream into a program. All collected syntax errors are
/// returned together; a statement that fails to parse is skipped and
/// scanning resumes at the next plausible statement start.
pub fn parse(tokens: Vec<Token>) -> Result<Program, Vec<Diagnostic>> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics: Vec::new(),
    };
    let program = parser.parse_program();
    if parser.diagnostics.iter().any(|d| d.is_error()) {
        Err(parser.diagnostics)
    } else {
        Ok(program)
    }
}

/// Convenience entry point: lex and parse in one step.
pub fn parse_source(source: &str) -> Result<Program, Vec<Diagnostic>> {
    parse(crate::lexer::tokenize(source)?)
}

type ParseResult<T> = Result<T, ()>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            self.error_unexpected(expected);
            Err(())
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<(String, Position)> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let token = self.advance();
                Ok((name, token.pos))
            }
            _ => {
                self.error_unexpected(expected);
                Err(())
            }
        }
    }

    /// Records an UnexpectedToken (or MissingToken at end of input) at the
    /// current position.
    fn error_unexpected(&mut self, expected: &str) {
        let token = self.peek().clone();
        let diag = if token.kind == TokenKind::Eof {
            Diagnostic::new(
                MessageCode::MissingToken,
                token.pos.line,
                token.pos.column,
                vec![expected.to_string()],
            )
        } else {
            Diagnostic::new(
                MessageCode::UnexpectedToken,
                token.pos.line,
                token.pos.column,
                vec![token.kind.describe(), expected.to_string()],
            )
        };
        self.diagnostics.push(diag);
    }

    /// Skips forward to the next plausible statement boundary.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof
                | TokenKind::Var
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::Switch
                | TokenKind::Return
                | TokenKind::Fail
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::End
                | TokenKind::Elseif
                | TokenKind::Else
                | TokenKind::Case
                | TokenKind::Default => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::Eof) {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(()) => {
                    // Step over the offending token before resyncing so the
                    // loop always makes progress.
                    if !self.at(&TokenKind::Eof) {
                        self.advance();
                    }
                    self.synchronize();
                }
            }
        }
        Program::new(statements)
    }

    /// Parses statements until a block closer (`end`, `elseif`, `else`,
    /// `case`, `default`) without consuming it.
    fn parse_block(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::End
                | TokenKind::Elseif
                | TokenKind::Else
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Eof => return statements,
                _ => match self.parse_statement() {
                    Ok(stmt) => statements.push(stmt),
                    Err(()) => {
                        if !self.at(&TokenKind::Eof) {
                            self.advance();
                        }
                        self.synchronize();
                    }
                },
            }
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.peek_kind() {
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Return => {
                let pos = self.advance().pos;
                let value = self.parse_optional_expression(pos.line)?;
                Ok(Statement::Return { value, pos })
            }
            TokenKind::Fail => {
                let pos = self.advance().pos;
                let message = self.parse_optional_expression(pos.line)?;
                Ok(Statement::Fail { message, pos })
            }
            TokenKind::Break => {
                let pos = self.advance().pos;
                Ok(Statement::Break { pos })
            }
            TokenKind::Continue => {
                let pos = self.advance().pos;
                Ok(Statement::Continue { pos })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_var_decl(&mut self) -> ParseResult<Statement> {
        let pos = self.advance().pos;
        let (name, _) = self.expect_identifier("variable name")?;
        let type_hint = if self.matches(&TokenKind::Colon) {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let initializer = if self.matches(&TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Statement::VarDecl {
            name,
            type_hint,
            initializer,
            pos,
        })
    }

    fn parse_type_name(&mut self) -> ParseResult<JyroType> {
        if self.at(&TokenKind::Null) {
            self.advance();
            return Ok(JyroType::Null);
        }
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                if let Some(ty) = JyroType::parse(&name) {
                    self.advance();
                    Ok(ty)
                } else {
                    self.error_unexpected("type name");
                    Err(())
                }
            }
            _ => {
                self.error_unexpected("type name");
                Err(())
            }
        }
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let pos = self.advance().pos;
        let mut branches = Vec::new();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "'then'")?;
        branches.push((condition, self.parse_block()));
        while self.matches(&TokenKind::Elseif) {
            let condition = self.parse_expression()?;
            self.expect(TokenKind::Then, "'then'")?;
            branches.push((condition, self.parse_block()));
        }
        let else_block = if self.matches(&TokenKind::Else) {
            Some(self.parse_block())
        } else {
            None
        };
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::If {
            branches,
            else_block,
            pos,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Statement> {
        let pos = self.advance().pos;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Do, "'do'")?;
        let body = self.parse_block();
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::While {
            condition,
            body,
            pos,
        })
    }

    fn parse_foreach(&mut self) -> ParseResult<Statement> {
        let pos = self.advance().pos;
        let (iterator, _) = self.expect_identifier("iterator name")?;
        self.expect(TokenKind::In, "'in'")?;
        let collection = self.parse_expression()?;
        self.expect(TokenKind::Do, "'do'")?;
        let body = self.parse_block();
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::ForEach {
            iterator,
            collection,
            body,
            pos,
        })
    }

    fn parse_for(&mut self) -> ParseResult<Statement> {
        let pos = self.advance().pos;
        let (iterator, _) = self.expect_identifier("iterator name")?;
        self.expect(TokenKind::Equal, "'='")?;
        let start = self.parse_expression()?;
        let direction = if self.matches(&TokenKind::To) {
            ForDirection::Ascending
        } else if self.matches(&TokenKind::Downto) {
            ForDirection::Descending
        } else {
            self.error_unexpected("'to' or 'downto'");
            return Err(());
        };
        let end = self.parse_expression()?;
        let step = if self.matches(&TokenKind::By) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Do, "'do'")?;
        let body = self.parse_block();
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::For {
            iterator,
            start,
            end,
            step,
            direction,
            body,
            pos,
        })
    }

    fn parse_switch(&mut self) -> ParseResult<Statement> {
        let pos = self.advance().pos;
        let discriminant = self.parse_expression()?;
        self.expect(TokenKind::Do, "'do'")?;
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            if self.matches(&TokenKind::Case) {
                let mut values = vec![self.parse_expression()?];
                while self.matches(&TokenKind::Comma) {
                    values.push(self.parse_expression()?);
                }
                self.expect(TokenKind::Then, "'then'")?;
                cases.push(SwitchCase {
                    values,
                    body: self.parse_block(),
                });
            } else if self.matches(&TokenKind::Default) {
                if default.is_some() {
                    self.error_unexpected("'end' (only one default block is allowed)");
                    return Err(());
                }
                default = Some(self.parse_block());
            } else {
                break;
            }
        }
        self.expect(TokenKind::End, "'end'")?;
        Ok(Statement::Switch {
            discriminant,
            cases,
            default,
            pos,
        })
    }

    /// `return` and `fail` take an expression only when one starts on the
    /// same line as the keyword; a following line is the next statement.
    fn parse_optional_expression(&mut self, keyword_line: u32) -> ParseResult<Option<Expression>> {
        if self.peek().pos.line == keyword_line && self.starts_expression() {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Identifier(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Minus
                | TokenKind::Not
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
        )
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let target = self.parse_expression()?;
        let pos = target.position();
        let op = match self.peek_kind() {
            TokenKind::Equal => Some(AssignmentOperator::Assign),
            TokenKind::PlusEqual => Some(AssignmentOperator::Add),
            TokenKind::MinusEqual => Some(AssignmentOperator::Subtract),
            TokenKind::StarEqual => Some(AssignmentOperator::Multiply),
            TokenKind::SlashEqual => Some(AssignmentOperator::Divide),
            TokenKind::PercentEqual => Some(AssignmentOperator::Modulo),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let value = self.parse_expression()?;
                Ok(Statement::Assignment {
                    target,
                    op,
                    value,
                    pos,
                })
            }
            None => Ok(Statement::ExprStmt {
                expression: target,
                pos,
            }),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let condition = self.parse_or()?;
        if self.matches(&TokenKind::Question) {
            let then_value = self.parse_expression()?;
            self.expect(TokenKind::Colon, "':'")?;
            let else_value = self.parse_expression()?;
            let pos = condition.position();
            return Ok(Expression::Ternary {
                condition: Box::new(condition),
                then_value: Box::new(then_value),
                else_value: Box::new(else_value),
                pos,
            });
        }
        Ok(condition)
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_and()?;
        while self.matches(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOperator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_equality()?;
        while self.matches(&TokenKind::And) {
            let right = self.parse_equality()?;
            left = binary(BinaryOperator::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::BangEqual => BinaryOperator::NotEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
    }

    fn parse_relational(&mut self) -> ParseResult<Expression> {
        let left = self.parse_additive()?;
        if self.matches(&TokenKind::Is) {
            let negated = self.matches(&TokenKind::Not);
            let expected = self.parse_type_name()?;
            let pos = left.position();
            return Ok(Expression::TypeCheck {
                target: Box::new(left),
                expected,
                negated,
                pos,
            });
        }
        let mut left = left;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinaryOperator::Less,
                TokenKind::LessEqual => BinaryOperator::LessOrEqual,
                TokenKind::Greater => BinaryOperator::Greater,
                TokenKind::GreaterEqual => BinaryOperator::GreaterOrEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_coalesce()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_coalesce()?;
            left = binary(op, left, right);
        }
    }

    fn parse_coalesce(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;
        while self.matches(&TokenKind::QuestionQuestion) {
            let right = self.parse_unary()?;
            left = binary(BinaryOperator::Coalesce, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        match self.peek_kind() {
            TokenKind::Minus => {
                let pos = self.advance().pos;
                let operand = self.parse_unary()?;
                Ok(Expression::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Not => {
                let pos = self.advance().pos;
                let operand = self.parse_unary()?;
                Ok(Expression::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let token = self.advance();
                let kind = if token.kind == TokenKind::PlusPlus {
                    IncrementKind::Increment
                } else {
                    IncrementKind::Decrement
                };
                let target = self.parse_unary()?;
                Ok(Expression::IncrementDecrement {
                    target: Box::new(target),
                    kind,
                    prefix: true,
                    pos: token.pos,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (property, _) = self.expect_identifier("property name")?;
                    let pos = expr.position();
                    expr = Expression::PropertyAccess {
                        target: Box::new(expr),
                        property,
                        pos,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightBracket, "']'")?;
                    let pos = expr.position();
                    expr = Expression::IndexAccess {
                        target: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let token = self.advance();
                    let kind = if token.kind == TokenKind::PlusPlus {
                        IncrementKind::Increment
                    } else {
                        IncrementKind::Decrement
                    };
                    let pos = expr.position();
                    expr = Expression::IncrementDecrement {
                        target: Box::new(expr),
                        kind,
                        prefix: false,
                        pos,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.peek_kind().clone() {
            TokenKind::Number(n) => {
                let pos = self.advance().pos;
                Ok(Expression::Literal {
                    value: Literal::Number(n),
                    pos,
                })
            }
            TokenKind::String(s) => {
                let pos = self.advance().pos;
                Ok(Expression::Literal {
                    value: Literal::String(s),
                    pos,
                })
            }
            TokenKind::True => {
                let pos = self.advance().pos;
                Ok(Expression::Literal {
                    value: Literal::Boolean(true),
                    pos,
                })
            }
            TokenKind::False => {
                let pos = self.advance().pos;
                Ok(Expression::Literal {
                    value: Literal::Boolean(false),
                    pos,
                })
            }
            TokenKind::Null => {
                let pos = self.advance().pos;
                Ok(Expression::Literal {
                    value: Literal::Null,
                    pos,
                })
            }
            TokenKind::Identifier(name) => {
                let pos = self.advance().pos;
                if self.at(&TokenKind::Arrow) {
                    self.advance();
                    let body = self.parse_expression()?;
                    return Ok(Expression::Lambda {
                        parameters: vec![name],
                        body: Box::new(body),
                        pos,
                    });
                }
                if self.matches(&TokenKind::LeftParen) {
                    let arguments = self.parse_arguments()?;
                    return Ok(Expression::Call {
                        name,
                        arguments,
                        pos,
                    });
                }
                Ok(Expression::Identifier { name, pos })
            }
            TokenKind::LeftParen => {
                if self.lambda_ahead() {
                    self.parse_lambda()
                } else {
                    self.advance();
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::RightParen, "')'")?;
                    Ok(expr)
                }
            }
            TokenKind::LeftBracket => {
                let pos = self.advance().pos;
                let mut elements = Vec::new();
                if !self.at(&TokenKind::RightBracket) {
                    elements.push(self.parse_expression()?);
                    while self.matches(&TokenKind::Comma) {
                        elements.push(self.parse_expression()?);
                    }
                }
                self.expect(TokenKind::RightBracket, "']'")?;
                Ok(Expression::ArrayLiteral { elements, pos })
            }
            TokenKind::LeftBrace => {
                let pos = self.advance().pos;
                let mut entries = Vec::new();
                if !self.at(&TokenKind::RightBrace) {
                    entries.push(self.parse_object_entry()?);
                    while self.matches(&TokenKind::Comma) {
                        entries.push(self.parse_object_entry()?);
                    }
                }
                self.expect(TokenKind::RightBrace, "'}'")?;
                Ok(Expression::ObjectLiteral { entries, pos })
            }
            _ => {
                self.error_unexpected("expression");
                Err(())
            }
        }
    }

    fn parse_object_entry(&mut self) -> ParseResult<(String, Expression)> {
        let key = match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                name
            }
            TokenKind::String(s) => {
                self.advance();
                s
            }
            _ => {
                self.error_unexpected("property key");
                return Err(());
            }
        };
        self.expect(TokenKind::Colon, "':'")?;
        let value = self.parse_expression()?;
        Ok((key, value))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        let mut arguments = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            arguments.push(self.parse_expression()?);
            while self.matches(&TokenKind::Comma) {
                arguments.push(self.parse_expression()?);
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;
        Ok(arguments)
    }

    /// Lookahead from a `(`: does the matching `)` have a `=>` after it?
    fn lambda_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while i < self.tokens.len() {
            match self.tokens[i].kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self
                            .tokens
                            .get(i + 1)
                            .is_some_and(|t| t.kind == TokenKind::Arrow);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_lambda(&mut self) -> ParseResult<Expression> {
        let pos = self.advance().pos; // '('
        let mut parameters = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            parameters.push(self.expect_identifier("parameter name")?.0);
            while self.matches(&TokenKind::Comma) {
                parameters.push(self.expect_identifier("parameter name")?.0);
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;
        self.expect(TokenKind::Arrow, "'=>'")?;
        let body = self.parse_expression()?;
        Ok(Expression::Lambda {
            parameters,
            body: Box::new(body),
            pos,
        })
    }
}

fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Expression {
    let pos = left.position();
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse_source(source).unwrap()
    }

    fn parse_expr(source: &str) -> Expression {
        let program = parse_ok(source);
        match program.statements.into_iter().next().unwrap() {
            Statement::ExprStmt { expression, .. } => expression,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_add_vs_mul() {
        match parse_expr("1 + 2 * 3") {
            Expression::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOperator::Add);
                assert!(matches!(
                    *right,
                    Expression::Binary {
                        op: BinaryOperator::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_coalesce_binds_tighter_than_mul() {
        match parse_expr("a ?? b * c") {
            Expression::Binary { op, left, .. } => {
                assert_eq!(op, BinaryOperator::Multiply);
                assert!(matches!(
                    *left,
                    Expression::Binary {
                        op: BinaryOperator::Coalesce,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_elseif_chain_flattens() {
        let program = parse_ok("if a then elseif b then elseif c then else end");
        match &program.statements[0] {
            Statement::If {
                branches,
                else_block,
                ..
            } => {
                assert_eq!(branches.len(), 3);
                assert!(else_block.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_for_downto() {
        let program = parse_ok("for i = 10 downto 0 by 2 do end");
        match &program.statements[0] {
            Statement::For {
                direction, step, ..
            } => {
                assert_eq!(*direction, ForDirection::Descending);
                assert!(step.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_switch_multi_value_cases() {
        let program = parse_ok("switch x do case 1, 2 then break case 3 then default end");
        match &program.statements[0] {
            Statement::Switch { cases, default, .. } => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].values.len(), 2);
                assert!(default.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_property_chain_and_index() {
        match parse_expr("Data.orders[0].total") {
            Expression::PropertyAccess { target, property, .. } => {
                assert_eq!(property, "total");
                assert!(matches!(*target, Expression::IndexAccess { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lambda_forms() {
        assert!(matches!(
            parse_expr("x => x + 1"),
            Expression::Lambda { ref parameters, .. } if parameters.len() == 1
        ));
        assert!(matches!(
            parse_expr("(a, b) => a + b"),
            Expression::Lambda { ref parameters, .. } if parameters.len() == 2
        ));
        assert!(matches!(
            parse_expr("() => 1"),
            Expression::Lambda { ref parameters, .. } if parameters.is_empty()
        ));
    }

    #[test]
    fn test_grouping_is_not_lambda() {
        assert!(matches!(
            parse_expr("(1 + 2) * 3"),
            Expression::Binary {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_type_check() {
        match parse_expr("x is not number") {
            Expression::TypeCheck {
                expected, negated, ..
            } => {
                assert_eq!(expected, JyroType::Number);
                assert!(negated);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_var_with_hint() {
        let program = parse_ok("var n: number = 5");
        match &program.statements[0] {
            Statement::VarDecl {
                name, type_hint, ..
            } => {
                assert_eq!(name, "n");
                assert_eq!(*type_hint, Some(JyroType::Number));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        let program = parse_ok("t += o.total");
        assert!(matches!(
            program.statements[0],
            Statement::Assignment {
                op: AssignmentOperator::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_increment_forms() {
        assert!(matches!(
            parse_expr("++x"),
            Expression::IncrementDecrement { prefix: true, .. }
        ));
        assert!(matches!(
            parse_expr("x--"),
            Expression::IncrementDecrement { prefix: false, .. }
        ));
    }

    #[test]
    fn test_object_and_array_literals() {
        match parse_expr("{ name: 'n', \"a b\": [1, 2] }") {
            Expression::ObjectLiteral { entries, .. } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[1].0, "a b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_end_reports_missing_token() {
        let errs = parse_source("if x then").unwrap_err();
        assert!(errs.iter().any(|d| d.code == MessageCode::MissingToken));
    }

    #[test]
    fn test_recovers_to_report_multiple_errors() {
        let errs = parse_source("var = 1\nvar = 2").unwrap_err();
        assert!(errs.len() >= 2);
        assert!(errs.iter().all(|d| d.code == MessageCode::UnexpectedToken));
    }

    #[test]
    fn test_return_value_must_share_the_keyword_line() {
        let program = parse_ok("return\nData.x = 1");
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(
            program.statements[0],
            Statement::Return { value: None, .. }
        ));
        let program = parse_ok("return 42");
        assert!(matches!(
            &program.statements[0],
            Statement::Return { value: Some(_), .. }
        ));
    }

    #[test]
    fn test_ternary() {
        assert!(matches!(
            parse_expr("a ? 1 : 2"),
            Expression::Ternary { .. }
        ));
    }
}
