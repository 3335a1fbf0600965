//! Literal parsing for the lexer.
//!
//! - String literals: single- or double-quoted, with the escape set used by
//!   machine-generated code (`\\ \' \" \n \t \r \0 \b \f \v \xHH \uHHHH`).
//! - Numeric literals: decimal integers, decimal floats (with optional
//!   exponent), and hexadecimal integers (`0xFF`).
//!
//! Signs are not part of a literal; unary minus belongs to the parser.

use nom::{
    error::{Error, ErrorKind},
    IResult,
};

use super::Token;

/// Parse a quoted string with escape decoding. The token carries the
/// decoded value; the printer re-escapes canonically on output.
pub fn parse_string_literal(input: &str) -> IResult<&str, Token> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('"' | '\''))) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut decoded = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => {
                return Ok((&input[i + 1..], Token::StringLiteral(decoded)));
            }
            '\n' => break,
            '\\' => {
                let (_, esc) = match chars.next() {
                    Some(pair) => pair,
                    None => break,
                };
                match esc {
                    'n' => decoded.push('\n'),
                    't' => decoded.push('\t'),
                    'r' => decoded.push('\r'),
                    '0' => decoded.push('\0'),
                    'b' => decoded.push('\u{0008}'),
                    'f' => decoded.push('\u{000C}'),
                    'v' => decoded.push('\u{000B}'),
                    '\\' => decoded.push('\\'),
                    '\'' => decoded.push('\''),
                    '"' => decoded.push('"'),
                    'x' => match read_hex_escape(&mut chars, 2) {
                        Some(ch) => decoded.push(ch),
                        None => break,
                    },
                    'u' => match read_hex_escape(&mut chars, 4) {
                        Some(ch) => decoded.push(ch),
                        None => break,
                    },
                    other => decoded.push(other),
                }
            }
            other => decoded.push(other),
        }
    }

    // Unterminated string or a bad escape
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

fn read_hex_escape(chars: &mut std::str::CharIndices, digits: usize) -> Option<char> {
    let mut value: u32 = 0;
    for _ in 0..digits {
        let (_, c) = chars.next()?;
        value = value * 16 + c.to_digit(16)?;
    }
    char::from_u32(value)
}

/// Parse a numeric literal: hexadecimal integer, decimal float, or
/// decimal integer. Floats require digits on both sides of the point.
pub fn parse_number_literal(input: &str) -> IResult<&str, Token> {
    if let Some(stripped) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        let end = stripped
            .char_indices()
            .find(|(_, c)| !c.is_ascii_hexdigit())
            .map(|(i, _)| i)
            .unwrap_or(stripped.len());
        if end == 0 {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::HexDigit)));
        }
        let value = i64::from_str_radix(&stripped[..end], 16)
            .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::HexDigit)))?;
        return Ok((&stripped[end..], Token::IntLiteral(value)));
    }

    let digits_end = count_digits(input);
    if digits_end == 0 {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Digit)));
    }

    let mut end = digits_end;
    let mut is_float = false;
    let rest = &input[end..];

    // Fraction: '.' digits (digits required, so member access still lexes)
    if let Some(after_dot) = rest.strip_prefix('.') {
        let frac = count_digits(after_dot);
        if frac > 0 {
            is_float = true;
            end += 1 + frac;
        }
    }

    // Exponent: (e|E)[+|-]digits
    let rest = &input[end..];
    if let Some(after_e) = rest.strip_prefix(['e', 'E']) {
        let signed = after_e.strip_prefix(['+', '-']).unwrap_or(after_e);
        let exp = count_digits(signed);
        if exp > 0 {
            is_float = true;
            end += rest.len() - signed.len() + exp;
        }
    }

    let text = &input[..end];
    let remaining = &input[end..];
    if is_float {
        let value: f64 = text
            .parse()
            .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Float)))?;
        Ok((remaining, Token::FloatLiteral(value)))
    } else {
        match text.parse::<i64>() {
            Ok(value) => Ok((remaining, Token::IntLiteral(value))),
            // Integers beyond i64 fall back to the float representation,
            // matching the target language's single number type.
            Err(_) => {
                let value: f64 = text
                    .parse()
                    .map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Digit)))?;
                Ok((remaining, Token::FloatLiteral(value)))
            }
        }
    }
}

fn count_digits(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
