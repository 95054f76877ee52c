// ABOUTME: The .jyrx binary format: a compact little-endian encoding of the
// validated AST plus the required-function table and source hash

use crate::ast::{
    AssignmentOperator, BinaryOperator, Expression, ForDirection, IncrementKind, Literal, Position,
    Program, Statement, SwitchCase, UnaryOperator,
};
use crate::diagnostics::{Diagnostic, MessageCode};
use crate::value::JyroType;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"JYRX";
pub const FORMAT_VERSION: u16 = 2;

const HEADER_LEN: usize = 44;
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
const MAX_DEPTH: usize = 200;
const MAX_FUNCTIONS: usize = 1000;
const MAX_LIST_LEN: usize = 10_000;
const MAX_STRING_LEN: usize = 65_535;

// Expression tags
const EXPR_LITERAL: u8 = 0x01;
const EXPR_IDENTIFIER: u8 = 0x02;
const EXPR_BINARY: u8 = 0x03;
const EXPR_UNARY: u8 = 0x04;
const EXPR_TERNARY: u8 = 0x05;
const EXPR_CALL: u8 = 0x06;
const EXPR_PROPERTY: u8 = 0x07;
const EXPR_INDEX: u8 = 0x08;
const EXPR_OBJECT: u8 = 0x09;
const EXPR_ARRAY: u8 = 0x0A;
const EXPR_LAMBDA: u8 = 0x0B;
const EXPR_TYPE_CHECK: u8 = 0x0C;
const EXPR_INC_DEC: u8 = 0x0D;

// Statement tags
const STMT_VAR_DECL: u8 = 0x20;
const STMT_ASSIGNMENT: u8 = 0x21;
const STMT_IF: u8 = 0x22;
const STMT_WHILE: u8 = 0x23;
const STMT_FOREACH: u8 = 0x24;
const STMT_FOR: u8 = 0x25;
const STMT_SWITCH: u8 = 0x26;
const STMT_RETURN: u8 = 0x27;
const STMT_FAIL: u8 = 0x28;
const STMT_BREAK: u8 = 0x29;
const STMT_CONTINUE: u8 = 0x2A;
const STMT_EXPR: u8 = 0x2B;

// Literal tags
const LIT_NULL: u8 = 1;
const LIT_BOOLEAN: u8 = 2;
const LIT_NUMBER: u8 = 3;
const LIT_STRING: u8 = 4;

/// SHA-256 of the original script source, stored in the header.
pub fn hash_source(source: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.finalize().into()
}

/// The decoded contents of a `.jyrx` blob.
#[derive(Debug, Clone, PartialEq)]
pub struct DeserializedProgram {
    pub program: Program,
    pub required_functions: Vec<String>,
    pub source_hash: [u8; 32],
    pub version: u16,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinaryWriteError {
    #[error("string of {0} bytes exceeds the 65535-byte limit")]
    StringTooLong(usize),
    #[error("list of {0} items exceeds the 10000-item limit")]
    ListTooLong(usize),
    #[error("AST nesting exceeds the depth limit of {MAX_DEPTH}")]
    DepthExceeded,
    #[error("{0} functions exceed the limit of {MAX_FUNCTIONS}")]
    TooManyFunctions(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinaryReadError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),
    #[error("file of {0} bytes exceeds the 10 MiB limit")]
    FileTooLarge(usize),
    #[error("function count {0} exceeds the limit of {MAX_FUNCTIONS}")]
    TooManyFunctions(u32),
    #[error("list of {0} items exceeds the 10000-item limit")]
    ListTooLong(u32),
    #[error("AST nesting exceeds the depth limit of {MAX_DEPTH}")]
    DepthExceeded,
    #[error("unknown {kind} tag 0x{tag:02X}")]
    UnknownTag { kind: &'static str, tag: u8 },
    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8,
    #[error("trailing bytes after program payload")]
    TrailingBytes,
}

impl BinaryReadError {
    /// Reader failures surface as Parsing-stage diagnostics.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::unpositioned(MessageCode::InvalidBinaryFormat, vec![self.to_string()])
    }
}

/// Encodes a validated program with its required-function names and source
/// hash into `.jyrx` bytes.
pub fn serialize_program(
    program: &Program,
    required_functions: &[String],
    source_hash: [u8; 32],
) -> Result<Vec<u8>, BinaryWriteError> {
    if required_functions.len() > MAX_FUNCTIONS {
        return Err(BinaryWriteError::TooManyFunctions(required_functions.len()));
    }
    let mut writer = Writer {
        buf: Vec::new(),
        depth: 0,
    };
    writer.buf.extend_from_slice(&MAGIC);
    writer.write_u16(FORMAT_VERSION);
    writer.write_u16(0); // reserved flags
    writer.buf.extend_from_slice(&source_hash);
    writer.write_u32(required_functions.len() as u32);
    for name in required_functions {
        writer.write_string(name)?;
    }
    writer.write_statement_list(&program.statements)?;
    Ok(writer.buf)
}

/// Decodes `.jyrx` bytes back into a program and its function table.
pub fn deserialize_program(bytes: &[u8]) -> Result<DeserializedProgram, BinaryReadError> {
    if bytes.len() > MAX_FILE_SIZE {
        return Err(BinaryReadError::FileTooLarge(bytes.len()));
    }
    if bytes.len() < HEADER_LEN {
        return Err(BinaryReadError::UnexpectedEof);
    }
    if bytes[..4] != MAGIC {
        return Err(BinaryReadError::BadMagic);
    }
    let mut reader = Reader {
        bytes,
        offset: 4,
        depth: 0,
    };
    let version = reader.read_u16()?;
    if version != FORMAT_VERSION {
        return Err(BinaryReadError::UnsupportedVersion(version));
    }
    let _flags = reader.read_u16()?;
    let mut source_hash = [0u8; 32];
    source_hash.copy_from_slice(reader.read_bytes(32)?);
    let function_count = reader.read_u32()?;
    if function_count as usize > MAX_FUNCTIONS {
        return Err(BinaryReadError::TooManyFunctions(function_count));
    }
    let mut required_functions = Vec::with_capacity(function_count as usize);
    for _ in 0..function_count {
        required_functions.push(reader.read_string()?);
    }
    let statements = reader.read_statement_list()?;
    if reader.offset != bytes.len() {
        return Err(BinaryReadError::TrailingBytes);
    }
    Ok(DeserializedProgram {
        program: Program::new(statements),
        required_functions,
        source_hash,
        version,
    })
}

// ============================================================================
// Writer
// ============================================================================

struct Writer {
    buf: Vec<u8>,
    depth: usize,
}

impl Writer {
    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_string(&mut self, s: &str) -> Result<(), BinaryWriteError> {
        if s.len() > MAX_STRING_LEN {
            return Err(BinaryWriteError::StringTooLong(s.len()));
        }
        self.write_u16(s.len() as u16);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn write_count(&mut self, len: usize) -> Result<(), BinaryWriteError> {
        if len > MAX_LIST_LEN {
            return Err(BinaryWriteError::ListTooLong(len));
        }
        self.write_u16(len as u16);
        Ok(())
    }

    fn write_flag(&mut self, present: bool) {
        self.write_u8(u8::from(present));
    }

    fn write_position(&mut self, pos: Position) {
        self.write_i32(pos.line as i32);
        self.write_i32(pos.column as i32);
        self.write_i32(pos.start as i32);
        self.write_i32(pos.end as i32);
    }

    fn enter(&mut self) -> Result<(), BinaryWriteError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(BinaryWriteError::DepthExceeded);
        }
        Ok(())
    }

    fn write_literal(&mut self, literal: &Literal) -> Result<(), BinaryWriteError> {
        match literal {
            Literal::Null => self.write_u8(LIT_NULL),
            Literal::Boolean(b) => {
                self.write_u8(LIT_BOOLEAN);
                self.write_u8(u8::from(*b));
            }
            Literal::Number(n) => {
                self.write_u8(LIT_NUMBER);
                self.write_f64(*n);
            }
            Literal::String(s) => {
                self.write_u8(LIT_STRING);
                self.write_string(s)?;
            }
        }
        Ok(())
    }

    fn write_expression_list(&mut self, exprs: &[Expression]) -> Result<(), BinaryWriteError> {
        self.write_count(exprs.len())?;
        for expr in exprs {
            self.write_expression(expr)?;
        }
        Ok(())
    }

    fn write_expression(&mut self, expr: &Expression) -> Result<(), BinaryWriteError> {
        self.enter()?;
        match expr {
            Expression::Literal { value, pos } => {
                self.write_u8(EXPR_LITERAL);
                self.write_position(*pos);
                self.write_literal(value)?;
            }
            Expression::Identifier { name, pos } => {
                self.write_u8(EXPR_IDENTIFIER);
                self.write_position(*pos);
                self.write_string(name)?;
            }
            Expression::Binary {
                op,
                left,
                right,
                pos,
            } => {
                self.write_u8(EXPR_BINARY);
                self.write_position(*pos);
                self.write_u8(op.tag());
                self.write_expression(left)?;
                self.write_expression(right)?;
            }
            Expression::Unary { op, operand, pos } => {
                self.write_u8(EXPR_UNARY);
                self.write_position(*pos);
                self.write_u8(op.tag());
                self.write_expression(operand)?;
            }
            Expression::Ternary {
                condition,
                then_value,
                else_value,
                pos,
            } => {
                self.write_u8(EXPR_TERNARY);
                self.write_position(*pos);
                self.write_expression(condition)?;
                self.write_expression(then_value)?;
                self.write_expression(else_value)?;
            }
            Expression::Call {
                name,
                arguments,
                pos,
            } => {
                self.write_u8(EXPR_CALL);
                self.write_position(*pos);
                self.write_string(name)?;
                self.write_expression_list(arguments)?;
            }
            Expression::PropertyAccess {
                target,
                property,
                pos,
            } => {
                self.write_u8(EXPR_PROPERTY);
                self.write_position(*pos);
                self.write_expression(target)?;
                self.write_string(property)?;
            }
            Expression::IndexAccess { target, index, pos } => {
                self.write_u8(EXPR_INDEX);
                self.write_position(*pos);
                self.write_expression(target)?;
                self.write_expression(index)?;
            }
            Expression::ObjectLiteral { entries, pos } => {
                self.write_u8(EXPR_OBJECT);
                self.write_position(*pos);
                self.write_count(entries.len())?;
                for (key, value) in entries {
                    self.write_string(key)?;
                    self.write_expression(value)?;
                }
            }
            Expression::ArrayLiteral { elements, pos } => {
                self.write_u8(EXPR_ARRAY);
                self.write_position(*pos);
                self.write_expression_list(elements)?;
            }
            Expression::Lambda {
                parameters,
                body,
                pos,
            } => {
                self.write_u8(EXPR_LAMBDA);
                self.write_position(*pos);
                self.write_count(parameters.len())?;
                for param in parameters {
                    self.write_string(param)?;
                }
                self.write_expression(body)?;
            }
            Expression::TypeCheck {
                target,
                expected,
                negated,
                pos,
            } => {
                self.write_u8(EXPR_TYPE_CHECK);
                self.write_position(*pos);
                self.write_u8(expected.tag());
                self.write_flag(*negated);
                self.write_expression(target)?;
            }
            Expression::IncrementDecrement {
                target,
                kind,
                prefix,
                pos,
            } => {
                self.write_u8(EXPR_INC_DEC);
                self.write_position(*pos);
                self.write_u8(kind.tag());
                self.write_flag(*prefix);
                self.write_expression(target)?;
            }
        }
        self.depth -= 1;
        Ok(())
    }

    fn write_statement_list(&mut self, statements: &[Statement]) -> Result<(), BinaryWriteError> {
        self.write_count(statements.len())?;
        for stmt in statements {
            self.write_statement(stmt)?;
        }
        Ok(())
    }

    fn write_statement(&mut self, stmt: &Statement) -> Result<(), BinaryWriteError> {
        self.enter()?;
        match stmt {
            Statement::VarDecl {
                name,
                type_hint,
                initializer,
                pos,
            } => {
                self.write_u8(STMT_VAR_DECL);
                self.write_position(*pos);
                self.write_string(name)?;
                self.write_flag(type_hint.is_some());
                if let Some(hint) = type_hint {
                    self.write_u8(hint.tag());
                }
                self.write_flag(initializer.is_some());
                if let Some(init) = initializer {
                    self.write_expression(init)?;
                }
            }
            Statement::Assignment {
                target,
                op,
                value,
                pos,
            } => {
                self.write_u8(STMT_ASSIGNMENT);
                self.write_position(*pos);
                self.write_u8(op.tag());
                self.write_expression(target)?;
                self.write_expression(value)?;
            }
            Statement::If {
                branches,
                else_block,
                pos,
            } => {
                self.write_u8(STMT_IF);
                self.write_position(*pos);
                self.write_count(branches.len())?;
                for (condition, block) in branches {
                    self.write_expression(condition)?;
                    self.write_statement_list(block)?;
                }
                self.write_flag(else_block.is_some());
                if let Some(block) = else_block {
                    self.write_statement_list(block)?;
                }
            }
            Statement::While {
                condition,
                body,
                pos,
            } => {
                self.write_u8(STMT_WHILE);
                self.write_position(*pos);
                self.write_expression(condition)?;
                self.write_statement_list(body)?;
            }
            Statement::ForEach {
                iterator,
                collection,
                body,
                pos,
            } => {
                self.write_u8(STMT_FOREACH);
                self.write_position(*pos);
                self.write_string(iterator)?;
                self.write_expression(collection)?;
                self.write_statement_list(body)?;
            }
            Statement::For {
                iterator,
                start,
                end,
                step,
                direction,
                body,
                pos,
            } => {
                self.write_u8(STMT_FOR);
                self.write_position(*pos);
                self.write_string(iterator)?;
                self.write_u8(direction.tag());
                self.write_expression(start)?;
                self.write_expression(end)?;
                self.write_flag(step.is_some());
                if let Some(step) = step {
                    self.write_expression(step)?;
                }
                self.write_statement_list(body)?;
            }
            Statement::Switch {
                discriminant,
                cases,
                default,
                pos,
            } => {
                self.write_u8(STMT_SWITCH);
                self.write_position(*pos);
                self.write_expression(discriminant)?;
                self.write_count(cases.len())?;
                for case in cases {
                    self.write_expression_list(&case.values)?;
                    self.write_statement_list(&case.body)?;
                }
                self.write_flag(default.is_some());
                if let Some(block) = default {
                    self.write_statement_list(block)?;
                }
            }
            Statement::Return { value, pos } => {
                self.write_u8(STMT_RETURN);
                self.write_position(*pos);
                self.write_flag(value.is_some());
                if let Some(value) = value {
                    self.write_expression(value)?;
                }
            }
            Statement::Fail { message, pos } => {
                self.write_u8(STMT_FAIL);
                self.write_position(*pos);
                self.write_flag(message.is_some());
                if let Some(message) = message {
                    self.write_expression(message)?;
                }
            }
            Statement::Break { pos } => {
                self.write_u8(STMT_BREAK);
                self.write_position(*pos);
            }
            Statement::Continue { pos } => {
                self.write_u8(STMT_CONTINUE);
                self.write_position(*pos);
            }
            Statement::ExprStmt { expression, pos } => {
                self.write_u8(STMT_EXPR);
                self.write_position(*pos);
                self.write_expression(expression)?;
            }
        }
        self.depth -= 1;
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    depth: usize,
}

impl Reader<'_> {
    fn read_bytes(&mut self, len: usize) -> Result<&[u8], BinaryReadError> {
        if self.offset + len > self.bytes.len() {
            return Err(BinaryReadError::UnexpectedEof);
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, BinaryReadError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, BinaryReadError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, BinaryReadError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, BinaryReadError> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, BinaryReadError> {
        let bytes = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(arr))
    }

    fn read_string(&mut self) -> Result<String, BinaryReadError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BinaryReadError::InvalidUtf8)
    }

    fn read_count(&mut self) -> Result<usize, BinaryReadError> {
        let count = self.read_u16()?;
        if count as usize > MAX_LIST_LEN {
            return Err(BinaryReadError::ListTooLong(count as u32));
        }
        Ok(count as usize)
    }

    fn read_flag(&mut self) -> Result<bool, BinaryReadError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_position(&mut self) -> Result<Position, BinaryReadError> {
        let line = self.read_i32()?;
        let column = self.read_i32()?;
        let start = self.read_i32()?;
        let end = self.read_i32()?;
        Ok(Position::new(
            line.max(0) as u32,
            column.max(0) as u32,
            start.max(0) as u32,
            end.max(0) as u32,
        ))
    }

    fn enter(&mut self) -> Result<(), BinaryReadError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(BinaryReadError::DepthExceeded);
        }
        Ok(())
    }

    fn read_literal(&mut self) -> Result<Literal, BinaryReadError> {
        let tag = self.read_u8()?;
        match tag {
            LIT_NULL => Ok(Literal::Null),
            LIT_BOOLEAN => Ok(Literal::Boolean(self.read_u8()? != 0)),
            LIT_NUMBER => Ok(Literal::Number(self.read_f64()?)),
            LIT_STRING => Ok(Literal::String(self.read_string()?)),
            tag => Err(BinaryReadError::UnknownTag {
                kind: "literal",
                tag,
            }),
        }
    }

    fn read_expression_list(&mut self) -> Result<Vec<Expression>, BinaryReadError> {
        let count = self.read_count()?;
        let mut exprs = Vec::with_capacity(count);
        for _ in 0..count {
            exprs.push(self.read_expression()?);
        }
        Ok(exprs)
    }

    fn read_expression(&mut self) -> Result<Expression, BinaryReadError> {
        self.enter()?;
        let tag = self.read_u8()?;
        let pos = self.read_position()?;
        let expr = match tag {
            EXPR_LITERAL => Expression::Literal {
                value: self.read_literal()?,
                pos,
            },
            EXPR_IDENTIFIER => Expression::Identifier {
                name: self.read_string()?,
                pos,
            },
            EXPR_BINARY => {
                let op_tag = self.read_u8()?;
                let op = BinaryOperator::from_tag(op_tag).ok_or(BinaryReadError::UnknownTag {
                    kind: "binary operator",
                    tag: op_tag,
                })?;
                Expression::Binary {
                    op,
                    left: Box::new(self.read_expression()?),
                    right: Box::new(self.read_expression()?),
                    pos,
                }
            }
            EXPR_UNARY => {
                let op_tag = self.read_u8()?;
                let op = UnaryOperator::from_tag(op_tag).ok_or(BinaryReadError::UnknownTag {
                    kind: "unary operator",
                    tag: op_tag,
                })?;
                Expression::Unary {
                    op,
                    operand: Box::new(self.read_expression()?),
                    pos,
                }
            }
            EXPR_TERNARY => Expression::Ternary {
                condition: Box::new(self.read_expression()?),
                then_value: Box::new(self.read_expression()?),
                else_value: Box::new(self.read_expression()?),
                pos,
            },
            EXPR_CALL => Expression::Call {
                name: self.read_string()?,
                arguments: self.read_expression_list()?,
                pos,
            },
            EXPR_PROPERTY => Expression::PropertyAccess {
                target: Box::new(self.read_expression()?),
                property: self.read_string()?,
                pos,
            },
            EXPR_INDEX => Expression::IndexAccess {
                target: Box::new(self.read_expression()?),
                index: Box::new(self.read_expression()?),
                pos,
            },
            EXPR_OBJECT => {
                let count = self.read_count()?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_string()?;
                    let value = self.read_expression()?;
                    entries.push((key, value));
                }
                Expression::ObjectLiteral { entries, pos }
            }
            EXPR_ARRAY => Expression::ArrayLiteral {
                elements: self.read_expression_list()?,
                pos,
            },
            EXPR_LAMBDA => {
                let count = self.read_count()?;
                let mut parameters = Vec::with_capacity(count);
                for _ in 0..count {
                    parameters.push(self.read_string()?);
                }
                Expression::Lambda {
                    parameters,
                    body: Box::new(self.read_expression()?),
                    pos,
                }
            }
            EXPR_TYPE_CHECK => {
                let type_tag = self.read_u8()?;
                let expected = JyroType::from_tag(type_tag).ok_or(BinaryReadError::UnknownTag {
                    kind: "type",
                    tag: type_tag,
                })?;
                let negated = self.read_flag()?;
                Expression::TypeCheck {
                    target: Box::new(self.read_expression()?),
                    expected,
                    negated,
                    pos,
                }
            }
            EXPR_INC_DEC => {
                let kind_tag = self.read_u8()?;
                let kind = IncrementKind::from_tag(kind_tag).ok_or(BinaryReadError::UnknownTag {
                    kind: "increment kind",
                    tag: kind_tag,
                })?;
                let prefix = self.read_flag()?;
                Expression::IncrementDecrement {
                    target: Box::new(self.read_expression()?),
                    kind,
                    prefix,
                    pos,
                }
            }
            tag => {
                return Err(BinaryReadError::UnknownTag {
                    kind: "expression",
                    tag,
                })
            }
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn read_statement_list(&mut self) -> Result<Vec<Statement>, BinaryReadError> {
        let count = self.read_count()?;
        let mut statements = Vec::with_capacity(count);
        for _ in 0..count {
            statements.push(self.read_statement()?);
        }
        Ok(statements)
    }

    fn read_statement(&mut self) -> Result<Statement, BinaryReadError> {
        self.enter()?;
        let tag = self.read_u8()?;
        let pos = self.read_position()?;
        let stmt = match tag {
            STMT_VAR_DECL => {
                let name = self.read_string()?;
                let type_hint = if self.read_flag()? {
                    let type_tag = self.read_u8()?;
                    Some(
                        JyroType::from_tag(type_tag).ok_or(BinaryReadError::UnknownTag {
                            kind: "type",
                            tag: type_tag,
                        })?,
                    )
                } else {
                    None
                };
                let initializer = if self.read_flag()? {
                    Some(self.read_expression()?)
                } else {
                    None
                };
                Statement::VarDecl {
                    name,
                    type_hint,
                    initializer,
                    pos,
                }
            }
            STMT_ASSIGNMENT => {
                let op_tag = self.read_u8()?;
                let op =
                    AssignmentOperator::from_tag(op_tag).ok_or(BinaryReadError::UnknownTag {
                        kind: "assignment operator",
                        tag: op_tag,
                    })?;
                Statement::Assignment {
                    op,
                    target: self.read_expression()?,
                    value: self.read_expression()?,
                    pos,
                }
            }
            STMT_IF => {
                let count = self.read_count()?;
                let mut branches = Vec::with_capacity(count);
                for _ in 0..count {
                    let condition = self.read_expression()?;
                    let block = self.read_statement_list()?;
                    branches.push((condition, block));
                }
                let else_block = if self.read_flag()? {
                    Some(self.read_statement_list()?)
                } else {
                    None
                };
                Statement::If {
                    branches,
                    else_block,
                    pos,
                }
            }
            STMT_WHILE => Statement::While {
                condition: self.read_expression()?,
                body: self.read_statement_list()?,
                pos,
            },
            STMT_FOREACH => Statement::ForEach {
                iterator: self.read_string()?,
                collection: self.read_expression()?,
                body: self.read_statement_list()?,
                pos,
            },
            STMT_FOR => {
                let iterator = self.read_string()?;
                let dir_tag = self.read_u8()?;
                let direction =
                    ForDirection::from_tag(dir_tag).ok_or(BinaryReadError::UnknownTag {
                        kind: "for direction",
                        tag: dir_tag,
                    })?;
                let start = self.read_expression()?;
                let end = self.read_expression()?;
                let step = if self.read_flag()? {
                    Some(self.read_expression()?)
                } else {
                    None
                };
                let body = self.read_statement_list()?;
                Statement::For {
                    iterator,
                    start,
                    end,
                    step,
                    direction,
                    body,
                    pos,
                }
            }
            STMT_SWITCH => {
                let discriminant = self.read_expression()?;
                let count = self.read_count()?;
                let mut cases = Vec::with_capacity(count);
                for _ in 0..count {
                    let values = self.read_expression_list()?;
                    let body = self.read_statement_list()?;
                    cases.push(SwitchCase { values, body });
                }
                let default = if self.read_flag()? {
                    Some(self.read_statement_list()?)
                } else {
                    None
                };
                Statement::Switch {
                    discriminant,
                    cases,
                    default,
                    pos,
                }
            }
            STMT_RETURN => {
                let value = if self.read_flag()? {
                    Some(self.read_expression()?)
                } else {
                    None
                };
                Statement::Return { value, pos }
            }
            STMT_FAIL => {
                let message = if self.read_flag()? {
                    Some(self.read_expression()?)
                } else {
                    None
                };
                Statement::Fail { message, pos }
            }
            STMT_BREAK => Statement::Break { pos },
            STMT_CONTINUE => Statement::Continue { pos },
            STMT_EXPR => Statement::ExprStmt {
                expression: self.read_expression()?,
                pos,
            },
            tag => {
                return Err(BinaryReadError::UnknownTag {
                    kind: "statement",
                    tag,
                })
            }
        };
        self.depth -= 1;
        Ok(stmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    const EVERY_VARIANT: &str = r#"
var hinted: number = 1
var plain = { key: [1, 'two', true, null], other: 2.5 }
plain.key[0] = hinted ?? 3
plain.key[1] += 'suffix'
if hinted > 0 then
    hinted++
elseif hinted < 0 and not (hinted is null) then
    --hinted
else
    hinted = hinted == 1 ? 2 : 3 % 2
end
while hinted < 10 do
    hinted *= 2
    continue
end
foreach item in plain.key do
    Data.last = item
end
for i = 5 downto 1 by 2 do
    break
end
switch hinted do
    case 1, 2 then Data.small = true
    case 3 then Data.medium = true
    default Data.large = Apply(x => x + 1, hinted)
end
fail 'unreachable'
return plain
"#;

    fn round_trip(source: &str) -> (Program, DeserializedProgram) {
        let program = parse_source(source).unwrap();
        let hash = hash_source(source);
        let bytes =
            serialize_program(&program, &["Apply".to_string()], hash).unwrap();
        let decoded = deserialize_program(&bytes).unwrap();
        (program, decoded)
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let (program, decoded) = round_trip(EVERY_VARIANT);
        assert_eq!(decoded.program, program);
        assert_eq!(decoded.required_functions, vec!["Apply".to_string()]);
        assert_eq!(decoded.source_hash, hash_source(EVERY_VARIANT));
        assert_eq!(decoded.version, FORMAT_VERSION);
    }

    #[test]
    fn test_header_layout() {
        let program = parse_source("Data.x = 1").unwrap();
        let bytes = serialize_program(&program, &[], [7u8; 32]).unwrap();
        assert_eq!(&bytes[..4], b"JYRX");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 2);
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 0);
        assert_eq!(&bytes[8..40], &[7u8; 32]);
        assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 0);
    }

    #[test]
    fn test_bad_magic() {
        let program = parse_source("Data.x = 1").unwrap();
        let mut bytes = serialize_program(&program, &[], [0u8; 32]).unwrap();
        bytes[0] = b'X';
        assert_eq!(
            deserialize_program(&bytes),
            Err(BinaryReadError::BadMagic)
        );
    }

    #[test]
    fn test_unsupported_version() {
        let program = parse_source("Data.x = 1").unwrap();
        let mut bytes = serialize_program(&program, &[], [0u8; 32]).unwrap();
        bytes[4] = 9;
        assert_eq!(
            deserialize_program(&bytes),
            Err(BinaryReadError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn test_truncation_detected() {
        let program = parse_source("Data.x = 1").unwrap();
        let bytes = serialize_program(&program, &[], [0u8; 32]).unwrap();
        assert_eq!(
            deserialize_program(&bytes[..bytes.len() - 1]),
            Err(BinaryReadError::UnexpectedEof)
        );
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let program = parse_source("Data.x = 1").unwrap();
        let mut bytes = serialize_program(&program, &[], [0u8; 32]).unwrap();
        bytes.push(0);
        assert_eq!(
            deserialize_program(&bytes),
            Err(BinaryReadError::TrailingBytes)
        );
    }

    #[test]
    fn test_function_count_limit() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"JYRX");
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&5000u32.to_le_bytes());
        assert_eq!(
            deserialize_program(&bytes),
            Err(BinaryReadError::TooManyFunctions(5000))
        );
    }

    #[test]
    fn test_unknown_statement_tag() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"JYRX");
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // one statement
        bytes.push(0xFF); // bogus tag
        bytes.extend_from_slice(&[0u8; 16]); // position placeholder
        assert!(matches!(
            deserialize_program(&bytes),
            Err(BinaryReadError::UnknownTag {
                kind: "statement",
                tag: 0xFF
            })
        ));
    }

    #[test]
    fn test_file_size_limit() {
        let huge = vec![0u8; MAX_FILE_SIZE + 1];
        assert!(matches!(
            deserialize_program(&huge),
            Err(BinaryReadError::FileTooLarge(_))
        ));
    }

    #[test]
    fn test_hash_source_is_stable() {
        assert_eq!(hash_source("abc"), hash_source("abc"));
        assert_ne!(hash_source("abc"), hash_source("abd"));
    }
}
