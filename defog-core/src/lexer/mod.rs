//! Tokenizer for the target-language frontend.
//!
//! Produces [`LocatedToken`]s with line/column spans. Comments and
//! whitespace are skipped as trivia; the printer re-emits canonical
//! formatting, so neither is preserved in the tree.

mod literal;
#[cfg(test)]
mod tests;

use crate::ast::Span;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, multispace1},
    combinator::{map, recognize, value},
    sequence::{pair, preceded},
    IResult,
};

use literal::{parse_number_literal, parse_string_literal};

/// Token with source location information
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub span: Span,
}

impl LocatedToken {
    pub fn new(token: Token, span: Span) -> Self {
        LocatedToken { token, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Function,
    Var,
    Let,
    Const,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    New,
    Delete,
    Void,
    TypeOf,
    InstanceOf,
    In,
    Try,
    Catch,
    Finally,
    Throw,
    This,
    Null,
    True,
    False,
    Undefined,
    Export,
    Default,

    // Identifiers and literals
    Identifier(String),
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Semicolon,
    Comma,
    Dot,
    Question,
    Colon,
    Arrow, // =>

    // Operators
    Assign,           // =
    AssignOp(String), // += -= *= /= %= &= |= ^= <<= >>= >>>=
    BinOp(String),    // + - * / % ** == != === !== < <= > >= & | ^ << >> >>>
    AndAnd,
    OrOr,
    Bang,
    Tilde,
    PlusPlus,
    MinusMinus,

    // Comments (skipped by tokenize)
    Comment(String),
}

impl Token {
    /// The textual name of a keyword token, used where the grammar allows
    /// keywords as property names (`obj.default`).
    pub fn keyword_name(&self) -> Option<&'static str> {
        let name = match self {
            Token::Function => "function",
            Token::Var => "var",
            Token::Let => "let",
            Token::Const => "const",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::While => "while",
            Token::Do => "do",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::New => "new",
            Token::Delete => "delete",
            Token::Void => "void",
            Token::TypeOf => "typeof",
            Token::InstanceOf => "instanceof",
            Token::In => "in",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Finally => "finally",
            Token::Throw => "throw",
            Token::This => "this",
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::Undefined => "undefined",
            Token::Export => "export",
            Token::Default => "default",
            _ => return None,
        };
        Some(name)
    }
}

fn parse_line_comment(input: &str) -> IResult<&str, Token> {
    map(
        preceded(tag("//"), take_while(|c| c != '\n')),
        |s: &str| Token::Comment(s.to_string()),
    )(input)
}

fn parse_block_comment(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(pair(tag("/*"), take_until("*/")), tag("*/"))),
        |s: &str| Token::Comment(s.to_string()),
    )(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn parse_identifier_or_keyword(input: &str) -> IResult<&str, Token> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Alpha,
            )))
        }
    }
    let end = chars
        .find(|(_, c)| !is_ident_continue(*c))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let (word, rest) = input.split_at(end);
    let token = match word {
        "function" => Token::Function,
        "var" => Token::Var,
        "let" => Token::Let,
        "const" => Token::Const,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "for" => Token::For,
        "while" => Token::While,
        "do" => Token::Do,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "new" => Token::New,
        "delete" => Token::Delete,
        "void" => Token::Void,
        "typeof" => Token::TypeOf,
        "instanceof" => Token::InstanceOf,
        "in" => Token::In,
        "try" => Token::Try,
        "catch" => Token::Catch,
        "finally" => Token::Finally,
        "throw" => Token::Throw,
        "this" => Token::This,
        "null" => Token::Null,
        "true" => Token::True,
        "false" => Token::False,
        "undefined" => Token::Undefined,
        "export" => Token::Export,
        "default" => Token::Default,
        _ => Token::Identifier(word.to_string()),
    };
    Ok((rest, token))
}

fn parse_operator(input: &str) -> IResult<&str, Token> {
    alt((
        alt((
            // Longest first: compound assignments and wide operators
            map(tag(">>>="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("<<="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag(">>="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("==="), |s: &str| Token::BinOp(s.to_string())),
            map(tag("!=="), |s: &str| Token::BinOp(s.to_string())),
            map(tag(">>>"), |s: &str| Token::BinOp(s.to_string())),
            value(Token::Arrow, tag("=>")),
            map(tag("=="), |s: &str| Token::BinOp(s.to_string())),
            map(tag("!="), |s: &str| Token::BinOp(s.to_string())),
            map(tag("<="), |s: &str| Token::BinOp(s.to_string())),
            map(tag(">="), |s: &str| Token::BinOp(s.to_string())),
        )),
        alt((
            value(Token::AndAnd, tag("&&")),
            value(Token::OrOr, tag("||")),
            value(Token::PlusPlus, tag("++")),
            value(Token::MinusMinus, tag("--")),
            map(tag("+="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("-="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("*="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("/="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("%="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("&="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("|="), |s: &str| Token::AssignOp(s.to_string())),
            map(tag("^="), |s: &str| Token::AssignOp(s.to_string())),
        )),
        alt((
            map(tag("**"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("<<"), |s: &str| Token::BinOp(s.to_string())),
            map(tag(">>"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("<"), |s: &str| Token::BinOp(s.to_string())),
            map(tag(">"), |s: &str| Token::BinOp(s.to_string())),
            value(Token::Assign, char('=')),
            map(tag("+"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("-"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("*"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("/"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("%"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("&"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("|"), |s: &str| Token::BinOp(s.to_string())),
            map(tag("^"), |s: &str| Token::BinOp(s.to_string())),
        )),
        alt((
            value(Token::Bang, char('!')),
            value(Token::Tilde, char('~')),
        )),
    ))(input)
}

fn parse_delimiter(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::LeftParen, char('(')),
        value(Token::RightParen, char(')')),
        value(Token::LeftBracket, char('[')),
        value(Token::RightBracket, char(']')),
        value(Token::LeftBrace, char('{')),
        value(Token::RightBrace, char('}')),
        value(Token::Semicolon, char(';')),
        value(Token::Comma, char(',')),
        value(Token::Dot, char('.')),
        value(Token::Question, char('?')),
        value(Token::Colon, char(':')),
    ))(input)
}

fn parse_token(input: &str) -> IResult<&str, Token> {
    alt((
        parse_line_comment,
        parse_block_comment,
        parse_string_literal,
        parse_number_literal,
        parse_identifier_or_keyword,
        parse_operator, // must come before Dot so "=>"/compound ops win
        parse_delimiter,
    ))(input)
}

pub fn tokenize(input: &str) -> Result<Vec<LocatedToken>, String> {
    let mut remaining = input;
    let mut tokens = Vec::new();

    // Build line offset table once for O(log n) span calculations
    let line_offsets = LineOffsets::new(input);

    while !remaining.is_empty() {
        // Skip leading whitespace
        if let Ok((rest, _)) = multispace1::<&str, nom::error::Error<&str>>(remaining) {
            remaining = rest;
            continue;
        }

        match parse_token(remaining) {
            Ok((rest, token)) => {
                // Skip comments
                if matches!(token, Token::Comment(_)) {
                    remaining = rest;
                    continue;
                }

                let span = calculate_span(input, &line_offsets, remaining, rest);
                tokens.push(LocatedToken::new(token, span));
                remaining = rest;
            }
            Err(_) if remaining.trim().is_empty() => break,
            Err(_) => {
                let offset = input.len() - remaining.len();
                let (line, col) = line_offsets.offset_to_line_col(offset);
                return Err(format!(
                    "unexpected character {:?} at {}:{} (offset {})",
                    remaining.chars().next().unwrap_or('\0'),
                    line,
                    col,
                    offset
                ));
            }
        }
    }

    Ok(tokens)
}

/// Precomputed line offset table for efficient offset-to-line-column
/// conversion. Built once per input, then binary searched per lookup.
struct LineOffsets {
    /// Byte offsets where each line starts. line_starts[0] = 0.
    line_starts: Vec<usize>,
}

impl LineOffsets {
    fn new(input: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, ch) in input.char_indices() {
            if ch == '\n' {
                line_starts.push(i + 1);
            }
        }
        LineOffsets { line_starts }
    }

    /// Convert byte offset to (line, column) - both 1-indexed.
    fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = line_idx + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }
}

/// Calculate the span of a token given the original input and the
/// before/after remainders.
fn calculate_span(original: &str, line_offsets: &LineOffsets, before: &str, after: &str) -> Span {
    let start_offset = original.len() - before.len();
    let end_offset = original.len() - after.len();

    let (start_line, start_col) = line_offsets.offset_to_line_col(start_offset);
    let (end_line, end_col) = line_offsets.offset_to_line_col(end_offset.saturating_sub(1).max(start_offset));

    Span::new(start_line, start_col, end_line, end_col)
}
