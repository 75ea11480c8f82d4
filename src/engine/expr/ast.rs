//! Expression syntax tree.

use compact_str::CompactString;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Plus => "+",
            Self::Not => "!",
        }
    }
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// A parsed expression. Immutable once built; evaluated on every render.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Number(f64),
    Str(String),
    Bool(bool),
    Ident(CompactString),
    Array(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `date[...]`
    Date(Box<Expr>),
    /// `path[...]`
    Path(Box<Expr>),
    /// `base.name`, only meaningful when `base` is a path
    Property(Box<Expr>, CompactString),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Ident(name) => f.write_str(name),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Unary(op, operand) => write!(f, "{}{operand}", op.symbol()),
            Self::Binary(op, left, right) => write!(f, "({left} {} {right})", op.symbol()),
            Self::Date(arg) => write!(f, "date[{arg}]"),
            Self::Path(arg) => write!(f, "path[{arg}]"),
            Self::Property(base, name) => write!(f, "{base}.{name}"),
        }
    }
}
