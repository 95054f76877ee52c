// ABOUTME: Typed AST for Jyro scripts, produced by the parser and consumed
// by the validator, linker, serializer and interpreter

use crate::value::JyroType;
use std::fmt;

/// Source location of a token or node. Line and column are 1-based; `start`
/// and `end` are byte offsets into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub start: u32,
    pub end: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, start: u32, end: u32) -> Self {
        Position {
            line,
            column,
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Coalesce,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Coalesce => "??",
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            BinaryOperator::Add => 1,
            BinaryOperator::Subtract => 2,
            BinaryOperator::Multiply => 3,
            BinaryOperator::Divide => 4,
            BinaryOperator::Modulo => 5,
            BinaryOperator::Equal => 6,
            BinaryOperator::NotEqual => 7,
            BinaryOperator::Less => 8,
            BinaryOperator::LessOrEqual => 9,
            BinaryOperator::Greater => 10,
            BinaryOperator::GreaterOrEqual => 11,
            BinaryOperator::And => 12,
            BinaryOperator::Or => 13,
            BinaryOperator::Coalesce => 14,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => BinaryOperator::Add,
            2 => BinaryOperator::Subtract,
            3 => BinaryOperator::Multiply,
            4 => BinaryOperator::Divide,
            5 => BinaryOperator::Modulo,
            6 => BinaryOperator::Equal,
            7 => BinaryOperator::NotEqual,
            8 => BinaryOperator::Less,
            9 => BinaryOperator::LessOrEqual,
            10 => BinaryOperator::Greater,
            11 => BinaryOperator::GreaterOrEqual,
            12 => BinaryOperator::And,
            13 => BinaryOperator::Or,
            14 => BinaryOperator::Coalesce,
            _ => return None,
        })
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "not",
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            UnaryOperator::Negate => 1,
            UnaryOperator::Not => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(UnaryOperator::Negate),
            2 => Some(UnaryOperator::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl AssignmentOperator {
    /// The binary operation a compound assignment applies, if any.
    pub fn binary_op(self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::Add => Some(BinaryOperator::Add),
            AssignmentOperator::Subtract => Some(BinaryOperator::Subtract),
            AssignmentOperator::Multiply => Some(BinaryOperator::Multiply),
            AssignmentOperator::Divide => Some(BinaryOperator::Divide),
            AssignmentOperator::Modulo => Some(BinaryOperator::Modulo),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            AssignmentOperator::Assign => 1,
            AssignmentOperator::Add => 2,
            AssignmentOperator::Subtract => 3,
            AssignmentOperator::Multiply => 4,
            AssignmentOperator::Divide => 5,
            AssignmentOperator::Modulo => 6,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => AssignmentOperator::Assign,
            2 => AssignmentOperator::Add,
            3 => AssignmentOperator::Subtract,
            4 => AssignmentOperator::Multiply,
            5 => AssignmentOperator::Divide,
            6 => AssignmentOperator::Modulo,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementKind {
    Increment,
    Decrement,
}

impl IncrementKind {
    pub fn tag(self) -> u8 {
        match self {
            IncrementKind::Increment => 1,
            IncrementKind::Decrement => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(IncrementKind::Increment),
            2 => Some(IncrementKind::Decrement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForDirection {
    Ascending,
    Descending,
}

impl ForDirection {
    pub fn tag(self) -> u8 {
        match self {
            ForDirection::Ascending => 1,
            ForDirection::Descending => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ForDirection::Ascending),
            2 => Some(ForDirection::Descending),
            _ => None,
        }
    }
}

/// Constant literal in the source. Numbers are plain f64 here; float-vs-int
/// spelling fidelity only matters for JSON data, not source literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: Literal,
        pos: Position,
    },
    Identifier {
        name: String,
        pos: Position,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        pos: Position,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
        pos: Position,
    },
    Ternary {
        condition: Box<Expression>,
        then_value: Box<Expression>,
        else_value: Box<Expression>,
        pos: Position,
    },
    Call {
        name: String,
        arguments: Vec<Expression>,
        pos: Position,
    },
    PropertyAccess {
        target: Box<Expression>,
        property: String,
        pos: Position,
    },
    IndexAccess {
        target: Box<Expression>,
        index: Box<Expression>,
        pos: Position,
    },
    ObjectLiteral {
        entries: Vec<(String, Expression)>,
        pos: Position,
    },
    ArrayLiteral {
        elements: Vec<Expression>,
        pos: Position,
    },
    Lambda {
        parameters: Vec<String>,
        body: Box<Expression>,
        pos: Position,
    },
    TypeCheck {
        target: Box<Expression>,
        expected: JyroType,
        negated: bool,
        pos: Position,
    },
    IncrementDecrement {
        target: Box<Expression>,
        kind: IncrementKind,
        prefix: bool,
        pos: Position,
    },
}

impl Expression {
    pub fn position(&self) -> Position {
        match self {
            Expression::Literal { pos, .. }
            | Expression::Identifier { pos, .. }
            | Expression::Binary { pos, .. }
            | Expression::Unary { pos, .. }
            | Expression::Ternary { pos, .. }
            | Expression::Call { pos, .. }
            | Expression::PropertyAccess { pos, .. }
            | Expression::IndexAccess { pos, .. }
            | Expression::ObjectLiteral { pos, .. }
            | Expression::ArrayLiteral { pos, .. }
            | Expression::Lambda { pos, .. }
            | Expression::TypeCheck { pos, .. }
            | Expression::IncrementDecrement { pos, .. } => *pos,
        }
    }

    /// Whether this expression can be the target of an assignment or an
    /// increment/decrement.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expression::Identifier { .. }
                | Expression::PropertyAccess { .. }
                | Expression::IndexAccess { .. }
        )
    }
}

/// One `case` arm of a `switch`: several candidate values share a body.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VarDecl {
        name: String,
        type_hint: Option<JyroType>,
        initializer: Option<Expression>,
        pos: Position,
    },
    Assignment {
        target: Expression,
        op: AssignmentOperator,
        value: Expression,
        pos: Position,
    },
    If {
        /// Condition/block pairs: the `if` arm followed by any `elseif` arms.
        branches: Vec<(Expression, Vec<Statement>)>,
        else_block: Option<Vec<Statement>>,
        pos: Position,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
        pos: Position,
    },
    ForEach {
        iterator: String,
        collection: Expression,
        body: Vec<Statement>,
        pos: Position,
    },
    For {
        iterator: String,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
        direction: ForDirection,
        body: Vec<Statement>,
        pos: Position,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Statement>>,
        pos: Position,
    },
    Return {
        value: Option<Expression>,
        pos: Position,
    },
    Fail {
        message: Option<Expression>,
        pos: Position,
    },
    Break {
        pos: Position,
    },
    Continue {
        pos: Position,
    },
    ExprStmt {
        expression: Expression,
        pos: Position,
    },
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::VarDecl { pos, .. }
            | Statement::Assignment { pos, .. }
            | Statement::If { pos, .. }
            | Statement::While { pos, .. }
            | Statement::ForEach { pos, .. }
            | Statement::For { pos, .. }
            | Statement::Switch { pos, .. }
            | Statement::Return { pos, .. }
            | Statement::Fail { pos, .. }
            | Statement::Break { pos }
            | Statement::Continue { pos }
            | Statement::ExprStmt { pos, .. } => *pos,
        }
    }

    /// Terminators abort normal flow within a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Statement::Return { .. }
                | Statement::Fail { .. }
                | Statement::Break { .. }
                | Statement::Continue { .. }
        )
    }

    /// Keyword spelling, used in diagnostics.
    pub fn keyword(&self) -> &'static str {
        match self {
            Statement::VarDecl { .. } => "var",
            Statement::Assignment { .. } => "=",
            Statement::If { .. } => "if",
            Statement::While { .. } => "while",
            Statement::ForEach { .. } => "foreach",
            Statement::For { .. } => "for",
            Statement::Switch { .. } => "switch",
            Statement::Return { .. } => "return",
            Statement::Fail { .. } => "fail",
            Statement::Break { .. } => "break",
            Statement::Continue { .. } => "continue",
            Statement::ExprStmt { .. } => "expression",
        }
    }
}

/// A parsed script: the ordered top-level statement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Program { statements }
    }
}
