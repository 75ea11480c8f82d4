//! Character-level scanner: splits source text into literal runs and
//! directive blocks.
//!
//! ```text
//! "Hi {{ eval name }}!\n"
//!   │        │        │
//!   ▼        ▼        ▼
//! Text   Directive   Text
//! ```
//!
//! # Escapes
//!
//! | Source        | Output                              |
//! |---------------|-------------------------------------|
//! | `\{` / `\}`   | literal brace, never opens/closes   |
//! | `\` + newline | nothing (line continuation)         |
//! | `\\`          | one backslash                       |
//! | `\x`          | `x`                                 |
//!
//! The same rules apply inside a directive body. Rows and columns count
//! characters and are tracked across escapes, so every [`Location`] points at
//! the exact source character.

use super::{
    error::{Error, Result},
    location::Location,
};
use std::{iter::Peekable, path::Path, str::Chars};

/// A scanned `{{ ... }}` block.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDirective {
    /// Body with escapes applied, without the braces.
    pub body: String,
    /// Exact source text, braces included.
    pub source: String,
    /// Position of the opening `{{`.
    pub location: Location,
}

impl RawDirective {
    /// Directive name and the rest of the body.
    pub fn split(&self) -> (&str, &str) {
        let body = self.body.trim();
        body.split_once(char::is_whitespace)
            .map_or((body, ""), |(name, arg)| (name, arg.trim()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Directive(RawDirective),
}

struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    row: usize,
    col: usize,
}

impl Cursor<'_> {
    fn next(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.next();
            true
        } else {
            false
        }
    }
}

/// Scan `text` from `file` into tokens.
///
/// Fails only when a directive is still open at end of input.
pub fn scan(text: &str, file: &Path) -> Result<Vec<Token>> {
    let origin = Location::start_of(file);
    let mut cursor = Cursor {
        chars: text.chars().peekable(),
        row: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    let mut literal = String::new();

    loop {
        let (row, col) = (cursor.row, cursor.col);
        let Some(c) = cursor.next() else { break };
        match c {
            '\\' => match cursor.next() {
                Some('\n') => {}
                Some(escaped) => literal.push(escaped),
                None => literal.push('\\'),
            },
            '{' if cursor.next_if('{') => {
                if !literal.is_empty() {
                    tokens.push(Token::Text(std::mem::take(&mut literal)));
                }
                let start = origin.at(row, col);
                let directive = scan_directive(&mut cursor, start)?;
                tokens.push(Token::Directive(directive));
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Text(literal));
    }
    Ok(tokens)
}

/// Scan a directive body; the opening `{{` is already consumed.
fn scan_directive(cursor: &mut Cursor<'_>, start: Location) -> Result<RawDirective> {
    let mut body = String::new();
    let mut source = String::from("{{");

    loop {
        let Some(c) = cursor.next() else {
            return Err(Error::Parse {
                end: start.at(cursor.row, cursor.col),
                start,
            });
        };
        source.push(c);
        match c {
            '\\' => match cursor.next() {
                Some(escaped) => {
                    source.push(escaped);
                    if escaped != '\n' {
                        body.push(escaped);
                    }
                }
                None => {
                    return Err(Error::Parse {
                        end: start.at(cursor.row, cursor.col),
                        start,
                    });
                }
            },
            '}' if cursor.next_if('}') => {
                source.push('}');
                return Ok(RawDirective {
                    body,
                    source,
                    location: start,
                });
            }
            c => body.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> &'static Path {
        Path::new("/site/page.html")
    }

    fn texts(src: &str) -> Vec<Token> {
        scan(src, file()).unwrap()
    }

    fn directive(tokens: &[Token], index: usize) -> &RawDirective {
        match &tokens[index] {
            Token::Directive(d) => d,
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_round_trips() {
        let src = "line one\r\nline two { single } braces }\n";
        assert_eq!(texts(src), vec![Token::Text(src.to_owned())]);
    }

    #[test]
    fn test_text_and_directive() {
        let tokens = texts("a{{ eval x }}b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], Token::Text("a".into()));
        let d = directive(&tokens, 1);
        assert_eq!(d.body, " eval x ");
        assert_eq!(d.source, "{{ eval x }}");
        assert_eq!(d.split(), ("eval", "x"));
        assert_eq!(tokens[2], Token::Text("b".into()));
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(texts(r"\{{ x \}}"), vec![Token::Text("{{ x }}".into())]);
        assert_eq!(texts(r"\{\{"), vec![Token::Text("{{".into())]);
    }

    #[test]
    fn test_backslash_rules() {
        assert_eq!(texts("a\\\nb"), vec![Token::Text("ab".into())]);
        assert_eq!(texts("a\\\\\nb"), vec![Token::Text("a\\\nb".into())]);
        assert_eq!(texts(r"\q"), vec![Token::Text("q".into())]);
        assert_eq!(texts("end\\"), vec![Token::Text("end\\".into())]);
    }

    #[test]
    fn test_escapes_inside_directive() {
        let tokens = texts(r#"{{ eval "\}}" }}"#);
        let d = directive(&tokens, 0);
        assert_eq!(d.body, r#" eval "}}" "#);
        assert_eq!(d.source, r#"{{ eval "\}}" }}"#);
    }

    #[test]
    fn test_line_continuation_inside_directive() {
        let tokens = texts("{{ eval 1 +\\\n 2 }}");
        let d = directive(&tokens, 0);
        assert_eq!(d.body, " eval 1 + 2 ");
        assert_eq!(d.source, "{{ eval 1 +\\\n 2 }}");
    }

    #[test]
    fn test_directive_locations() {
        let tokens = texts("ab\ncd {{x}}\n\t{{y}}");
        assert_eq!(directive(&tokens, 1).location, Location::new(file(), 2, 4));
        assert_eq!(directive(&tokens, 3).location, Location::new(file(), 3, 2));
    }

    #[test]
    fn test_location_after_escapes() {
        let tokens = texts("\\{\\\n{{x}}");
        assert_eq!(directive(&tokens, 1).location, Location::new(file(), 2, 1));
    }

    #[test]
    fn test_columns_count_chars() {
        let tokens = texts("héllo {{x}}");
        assert_eq!(directive(&tokens, 1).location.col, 7);
    }

    #[test]
    fn test_unterminated_directive() {
        let err = scan("ok\n  {{ eval x }\nmore", file()).unwrap_err();
        match err {
            Error::Parse { start, end } => {
                assert_eq!((start.row, start.col), (2, 3));
                assert_eq!((end.row, end.col), (3, 5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_braces_are_not_nested() {
        let tokens = texts("{{ a {{ b }} c }}");
        assert_eq!(directive(&tokens, 0).body, " a {{ b ");
        assert_eq!(tokens[1], Token::Text(" c }}".into()));
    }

    #[test]
    fn test_split_without_argument() {
        let tokens = texts("{{end}}");
        assert_eq!(directive(&tokens, 0).split(), ("end", ""));
    }
}
