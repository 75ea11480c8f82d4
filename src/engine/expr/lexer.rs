//! Tokenizer for directive expressions.

use super::ParseError;
use compact_str::CompactString;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(CompactString),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let token = match c {
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                // A dot only belongs to the number when a digit follows it.
                if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &src[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::new(format!("invalid number `{text}`"), start))?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset: start,
                });
                continue;
            }
            b'"' | b'`' => {
                let quote = c;
                let body_start = i + 1;
                let Some(len) = bytes[body_start..].iter().position(|&b| b == quote) else {
                    return Err(ParseError::new("unterminated string", start));
                };
                i = body_start + len + 1;
                tokens.push(Spanned {
                    token: Token::Str(src[body_start..body_start + len].to_owned()),
                    offset: start,
                });
                continue;
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                tokens.push(Spanned {
                    token: Token::Ident(CompactString::from(&src[start..i])),
                    offset: start,
                });
                continue;
            }
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b',' => Token::Comma,
            b'.' => Token::Dot,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'!' if next_is(bytes, i, b'=') => {
                i += 1;
                Token::NotEq
            }
            b'!' => Token::Bang,
            b'=' if next_is(bytes, i, b'=') => {
                i += 1;
                Token::EqEq
            }
            b'<' if next_is(bytes, i, b'=') => {
                i += 1;
                Token::Le
            }
            b'<' => Token::Lt,
            b'>' if next_is(bytes, i, b'=') => {
                i += 1;
                Token::Ge
            }
            b'>' => Token::Gt,
            b'&' if next_is(bytes, i, b'&') => {
                i += 1;
                Token::AndAnd
            }
            b'|' if next_is(bytes, i, b'|') => {
                i += 1;
                Token::OrOr
            }
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(ParseError::new(format!("unexpected character `{ch}`"), start));
            }
        };

        i += 1;
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}

#[inline]
fn next_is(bytes: &[u8], i: usize, expected: u8) -> bool {
    bytes.get(i + 1) == Some(&expected)
}
