// ABOUTME: Lexer turning Jyro source text into a positioned token stream

use crate::ast::Position;
use crate::diagnostics::{Diagnostic, MessageCode};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{opt, recognize, value},
    IResult, Parser,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Number(f64),
    String(String),
    Identifier(String),
    // Keywords
    Var,
    If,
    Then,
    Elseif,
    Else,
    End,
    While,
    For,
    Foreach,
    In,
    To,
    Downto,
    By,
    Do,
    Switch,
    Case,
    Default,
    Return,
    Fail,
    Break,
    Continue,
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    PlusPlus,
    MinusMinus,
    Question,
    QuestionQuestion,
    Colon,
    Comma,
    Dot,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Arrow,
    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "elseif" => TokenKind::Elseif,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "foreach" => TokenKind::Foreach,
            "in" => TokenKind::In,
            "to" => TokenKind::To,
            "downto" => TokenKind::Downto,
            "by" => TokenKind::By,
            "do" => TokenKind::Do,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "return" => TokenKind::Return,
            "fail" => TokenKind::Fail,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "is" => TokenKind::Is,
            "null" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => return None,
        })
    }

    /// Human-readable spelling for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("{}", n),
            TokenKind::String(s) => format!("'{}'", s),
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Eof => "end of input".to_string(),
            other => other.spelling().to_string(),
        }
    }

    fn spelling(&self) -> &'static str {
        match self {
            TokenKind::Var => "var",
            TokenKind::If => "if",
            TokenKind::Then => "then",
            TokenKind::Elseif => "elseif",
            TokenKind::Else => "else",
            TokenKind::End => "end",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Foreach => "foreach",
            TokenKind::In => "in",
            TokenKind::To => "to",
            TokenKind::Downto => "downto",
            TokenKind::By => "by",
            TokenKind::Do => "do",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Return => "return",
            TokenKind::Fail => "fail",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Is => "is",
            TokenKind::Null => "null",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Equal => "=",
            TokenKind::PlusEqual => "+=",
            TokenKind::MinusEqual => "-=",
            TokenKind::StarEqual => "*=",
            TokenKind::SlashEqual => "/=",
            TokenKind::PercentEqual => "%=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Question => "?",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Arrow => "=>",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Position,
}

// ============================================================================
// nom recognisers
// ============================================================================

/// Decimal or scientific number: 1, 2.5, 1e3, 2.5E-2. Leading-dot floats are
/// not numbers; `.` always means property access.
fn lex_number(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

fn lex_word(input: &str) -> IResult<&str, &str> {
    recognize((
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn lex_operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        alt((
            value(TokenKind::Arrow, tag("=>")),
            value(TokenKind::QuestionQuestion, tag("??")),
            value(TokenKind::EqualEqual, tag("==")),
            value(TokenKind::BangEqual, tag("!=")),
            value(TokenKind::LessEqual, tag("<=")),
            value(TokenKind::GreaterEqual, tag(">=")),
            value(TokenKind::PlusPlus, tag("++")),
            value(TokenKind::MinusMinus, tag("--")),
            value(TokenKind::PlusEqual, tag("+=")),
            value(TokenKind::MinusEqual, tag("-=")),
            value(TokenKind::StarEqual, tag("*=")),
            value(TokenKind::SlashEqual, tag("/=")),
            value(TokenKind::PercentEqual, tag("%=")),
        )),
        alt((
            value(TokenKind::Plus, tag("+")),
            value(TokenKind::Minus, tag("-")),
            value(TokenKind::Star, tag("*")),
            value(TokenKind::Slash, tag("/")),
            value(TokenKind::Percent, tag("%")),
            value(TokenKind::Less, tag("<")),
            value(TokenKind::Greater, tag(">")),
            value(TokenKind::Equal, tag("=")),
            value(TokenKind::Question, tag("?")),
            value(TokenKind::Colon, tag(":")),
            value(TokenKind::Comma, tag(",")),
            value(TokenKind::Dot, tag(".")),
            value(TokenKind::LeftParen, tag("(")),
            value(TokenKind::RightParen, tag(")")),
            value(TokenKind::LeftBracket, tag("[")),
            value(TokenKind::RightBracket, tag("]")),
            value(TokenKind::LeftBrace, tag("{")),
            value(TokenKind::RightBrace, tag("}")),
        )),
    ))
    .parse(input)
}

// ============================================================================
// Driver
// ============================================================================

/// Scans a string literal starting at the opening quote. Returns the
/// consumed byte count and the unescaped content, or Err on newline/EOF
/// before the closing quote.
fn scan_string(rest: &str) -> Result<(usize, String), ()> {
    let mut chars = rest.char_indices();
    let quote = match chars.next() {
        Some((_, c)) => c,
        None => return Err(()),
    };
    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((i + c.len_utf8(), out));
        }
        match c {
            '\n' => return Err(()),
            '\\' => match chars.next() {
                Some((_, esc)) => match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                None => return Err(()),
            },
            other => out.push(other),
        }
    }
    Err(())
}

struct Scanner<'a> {
    source: &'a str,
    rest: &'a str,
    line: u32,
    column: u32,
}

impl<'a> Scanner<'a> {
    fn offset(&self) -> u32 {
        (self.source.len() - self.rest.len()) as u32
    }

    /// Consumes `len` bytes, updating the line/column counters.
    fn advance(&mut self, len: usize) {
        for c in self.rest[..len].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.rest = &self.rest[len..];
    }

    /// Skips whitespace and `#` line comments.
    fn skip_trivia(&mut self) {
        loop {
            let trimmed = self.rest.trim_start_matches(|c: char| c.is_whitespace());
            let skipped = self.rest.len() - trimmed.len();
            if skipped > 0 {
                self.advance(skipped);
            }
            if self.rest.starts_with('#') {
                let len = self.rest.find('\n').unwrap_or(self.rest.len());
                self.advance(len);
                continue;
            }
            break;
        }
    }
}

/// Tokenizes a full script. On any lexing error the collected diagnostics
/// are returned instead; scanning recovers past bad characters so several
/// problems can surface from one pass.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut scanner = Scanner {
        source,
        rest: source,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    loop {
        scanner.skip_trivia();
        if scanner.rest.is_empty() {
            break;
        }
        let start_offset = scanner.offset();
        let (start_line, start_column) = (scanner.line, scanner.column);
        let first = scanner.rest.chars().next().unwrap();

        if first == '"' || first == '\'' {
            match scan_string(scanner.rest) {
                Ok((len, content)) => {
                    scanner.advance(len);
                    tokens.push(Token {
                        kind: TokenKind::String(content),
                        pos: Position::new(start_line, start_column, start_offset, scanner.offset()),
                    });
                }
                Err(()) => {
                    diagnostics.push(Diagnostic::new(
                        MessageCode::UnterminatedString,
                        start_line,
                        start_column,
                        vec![],
                    ));
                    // resume on the next line, if any
                    let len = scanner.rest.find('\n').map_or(scanner.rest.len(), |i| i + 1);
                    scanner.advance(len);
                }
            }
            continue;
        }

        if first.is_ascii_digit() {
            let (next, raw) = lex_number(scanner.rest).expect("digit-led input must lex");
            // A number immediately followed by an identifier character is a
            // malformed literal, not two tokens.
            let trailing = next
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .count();
            if trailing > 0 {
                let bad_len = raw.len() + next[..].chars().take(trailing).map(char::len_utf8).sum::<usize>();
                let bad = &scanner.rest[..bad_len];
                diagnostics.push(Diagnostic::new(
                    MessageCode::InvalidNumberFormat,
                    start_line,
                    start_column,
                    vec![bad.to_string()],
                ));
                scanner.advance(bad_len);
                continue;
            }
            match raw.parse::<f64>() {
                Ok(number) => {
                    scanner.advance(raw.len());
                    tokens.push(Token {
                        kind: TokenKind::Number(number),
                        pos: Position::new(start_line, start_column, start_offset, scanner.offset()),
                    });
                }
                Err(_) => {
                    diagnostics.push(Diagnostic::new(
                        MessageCode::InvalidNumberFormat,
                        start_line,
                        start_column,
                        vec![raw.to_string()],
                    ));
                    scanner.advance(raw.len());
                }
            }
            continue;
        }

        if first.is_ascii_alphabetic() || first == '_' {
            let (_, word) = lex_word(scanner.rest).expect("letter-led input must lex");
            let kind = TokenKind::keyword(word)
                .unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
            scanner.advance(word.len());
            tokens.push(Token {
                kind,
                pos: Position::new(start_line, start_column, start_offset, scanner.offset()),
            });
            continue;
        }

        match lex_operator(scanner.rest) {
            Ok((next, kind)) => {
                let len = scanner.rest.len() - next.len();
                scanner.advance(len);
                tokens.push(Token {
                    kind,
                    pos: Position::new(start_line, start_column, start_offset, scanner.offset()),
                });
            }
            Err(_) => {
                diagnostics.push(Diagnostic::new(
                    MessageCode::UnexpectedCharacter,
                    start_line,
                    start_column,
                    vec![first.to_string()],
                ));
                scanner.advance(first.len_utf8());
            }
        }
    }

    let end = scanner.offset();
    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: Position::new(scanner.line, scanner.column, end, end),
    });

    if diagnostics.is_empty() {
        Ok(tokens)
    } else {
        Err(diagnostics)
    }
}
