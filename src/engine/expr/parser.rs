//! Recursive-descent parser, one function per precedence level.
//!
//! ```text
//! or        := and ( "||" and )*
//! and       := equality ( "&&" equality )*
//! equality  := relation ( ("==" | "!=") relation )*
//! relation  := additive ( ("<" | "<=" | ">" | ">=") additive )*
//! additive  := term ( ("+" | "-") term )*
//! term      := unary ( ("*" | "/" | "%") unary )*
//! unary     := ("!" | "-" | "+") unary | postfix
//! postfix   := primary ( "." IDENT )*
//! primary   := NUMBER | STRING | "true" | "false" | "nil" | IDENT
//!            | "[" ( or ( "," or )* ","? )? "]" | "(" or ")"
//!            | "date" "[" or "]" | "path" "[" or "]"
//! ```

use super::{
    ParseError,
    ast::{BinaryOp, Expr, UnaryOp},
    lexer::{Spanned, Token, tokenize},
};

/// Parse a complete expression; trailing tokens are an error.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    if parser.tokens.is_empty() {
        return Err(ParseError::new("empty expression", 0));
    }
    let expr = parser.or()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ParseError::new(
            format!("unexpected {} after expression", describe(&extra.token)),
            extra.offset,
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.eat(&expected) {
            return Ok(());
        }
        let found = self.peek().map_or("end of expression", describe);
        Err(ParseError::new(
            format!("expected {}, found {found}", describe(&expected)),
            self.offset(),
        ))
    }

    /// Parse a left-associative chain of binary operators.
    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ParseError>,
        ops: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        while let Some(op) = self.peek().and_then(ops) {
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::and, |t| matches!(t, Token::OrOr).then_some(BinaryOp::Or))
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::equality, |t| {
            matches!(t, Token::AndAnd).then_some(BinaryOp::And)
        })
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::relation, |t| match t {
            Token::EqEq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::NotEq),
            _ => None,
        })
    }

    fn relation(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::additive, |t| match t {
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::term, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Dot) {
            let offset = self.offset();
            match self.advance() {
                Some(Token::Ident(name)) => expr = Expr::Property(Box::new(expr), name),
                _ => return Err(ParseError::new("expected a property name after `.`", offset)),
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(ParseError::new("unexpected end of expression", offset));
        };

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::LParen => {
                let inner = self.or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.array(),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "nil" => Ok(Expr::Nil),
                "date" if self.peek() == Some(&Token::LBracket) => {
                    Ok(Expr::Date(Box::new(self.constructor_arg()?)))
                }
                "path" if self.peek() == Some(&Token::LBracket) => {
                    Ok(Expr::Path(Box::new(self.constructor_arg()?)))
                }
                _ => Ok(Expr::Ident(name.clone())),
            },
            other => Err(ParseError::new(
                format!("unexpected {}", describe(&other)),
                offset,
            )),
        }
    }

    /// `[ expr ]` following `date` or `path`.
    fn constructor_arg(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LBracket)?;
        let arg = self.or()?;
        self.expect(Token::RBracket)?;
        Ok(arg)
    }

    /// Array literal body; the opening bracket is already consumed.
    fn array(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&Token::RBracket) {
                return Ok(Expr::Array(items));
            }
            items.push(self.or()?);
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBracket)?;
                return Ok(Expr::Array(items));
            }
        }
    }
}

fn describe(token: &Token) -> &'static str {
    match token {
        Token::Number(_) => "number",
        Token::Str(_) => "string",
        Token::Ident(_) => "identifier",
        Token::LBracket => "`[`",
        Token::RBracket => "`]`",
        Token::LParen => "`(`",
        Token::RParen => "`)`",
        Token::Comma => "`,`",
        Token::Dot => "`.`",
        Token::Plus => "`+`",
        Token::Minus => "`-`",
        Token::Star => "`*`",
        Token::Slash => "`/`",
        Token::Percent => "`%`",
        Token::Bang => "`!`",
        Token::EqEq => "`==`",
        Token::NotEq => "`!=`",
        Token::Lt => "`<`",
        Token::Le => "`<=`",
        Token::Gt => "`>`",
        Token::Ge => "`>=`",
        Token::AndAnd => "`&&`",
        Token::OrOr => "`||`",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<Expr> {
        Box::new(Expr::Number(n))
    }

    #[test]
    fn test_precedence() {
        // 10 + 10 * (2 + 4)
        let expr = parse("10 + 10 * (2 + 4)").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                num(10.0),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    num(10.0),
                    Box::new(Expr::Binary(BinaryOp::Add, num(2.0), num(4.0))),
                )),
            )
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(parse("8 - 4 - 2").unwrap().to_string(), "((8 - 4) - 2)");
    }

    #[test]
    fn test_logical_levels() {
        assert_eq!(
            parse("a || b && c == d").unwrap().to_string(),
            "(a || (b && (c == d)))"
        );
    }

    #[test]
    fn test_unary_chain() {
        assert_eq!(parse("!!x").unwrap().to_string(), "!!x");
        assert_eq!(parse("-+3").unwrap().to_string(), "-+3");
    }

    #[test]
    fn test_array_literal() {
        let expr = parse("[10, 2, 4,]").unwrap();
        assert_eq!(
            expr,
            Expr::Array(vec![Expr::Number(10.0), Expr::Number(2.0), Expr::Number(4.0)])
        );
        assert_eq!(parse("[]").unwrap(), Expr::Array(vec![]));
    }

    #[test]
    fn test_constructors() {
        assert_eq!(
            parse(r#"date["2024-01-02"]"#).unwrap(),
            Expr::Date(Box::new(Expr::Str("2024-01-02".into())))
        );
        assert_eq!(
            parse(r#"path["/a.md"].title"#).unwrap(),
            Expr::Property(
                Box::new(Expr::Path(Box::new(Expr::Str("/a.md".into())))),
                "title".into()
            )
        );
    }

    #[test]
    fn test_date_and_path_as_plain_identifiers() {
        assert_eq!(parse("date").unwrap(), Expr::Ident("date".into()));
        assert_eq!(parse("path + 1").unwrap().to_string(), "(path + 1)");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse("true").unwrap(), Expr::Bool(true));
        assert_eq!(parse("false").unwrap(), Expr::Bool(false));
        assert_eq!(parse("nil").unwrap(), Expr::Nil);
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("(1 + 2").is_err());
        assert!(parse("[1, 2").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("a.").is_err());
        assert!(parse("date[1").is_err());
    }

    #[test]
    fn test_trailing_token_offset() {
        let err = parse("1 2").unwrap_err();
        assert_eq!(err.offset, 2);
    }
}
