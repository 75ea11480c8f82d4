//! Runtime values of the expression language.

use super::EvalError;
use crate::engine::content::Fragment;
use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use compact_str::CompactString;
use std::{fmt, path::PathBuf, sync::Arc};

// ============================================================================
// Dates
// ============================================================================

/// Accepted `date[...]` layouts, longest first.
///
/// The display format of a parsed date is the layout it was parsed with.
const DATE_LAYOUTS: &[(&str, usize)] = &[
    ("%Y-%m-%dT%H:%M:%S", 19),
    ("%Y-%m-%dT%H:%M", 16),
    ("%Y-%m-%d", 10),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateValue {
    pub at: NaiveDateTime,
    pub format: &'static str,
}

impl DateValue {
    /// Parse `now` or an ISO-like timestamp with day, minute or second precision.
    ///
    /// The longest layout that fits in the input length is chosen, and the
    /// whole input must match it. A space is accepted in place of the `T`.
    pub fn parse(text: &str) -> Result<Self, EvalError> {
        let text = text.trim();
        if text == "now" {
            return Ok(Self {
                at: Local::now().naive_local().trunc_subsecs(0),
                format: DATE_LAYOUTS[0].0,
            });
        }

        let invalid = || EvalError::Date(text.to_owned());
        let &(layout, len) = DATE_LAYOUTS
            .iter()
            .find(|(_, len)| text.len() >= *len)
            .ok_or_else(invalid)?;

        let normalized = if len > 10 && text.as_bytes().get(10) == Some(&b' ') {
            format!("{}T{}", &text[..10], &text[11..])
        } else {
            text.to_owned()
        };

        let at = if len == 10 {
            NaiveDate::parse_from_str(&normalized, layout)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        } else {
            NaiveDateTime::parse_from_str(&normalized, layout).ok()
        };

        at.map(|at| Self { at, format: layout }).ok_or_else(invalid)
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.at.format(self.format))
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Reference to another managed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRef {
    /// Absolute path of the source file.
    pub source: PathBuf,
    /// Site URL of the file's output, e.g. `/posts/hello.html`.
    pub url: String,
}

// ============================================================================
// Value
// ============================================================================

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Number(f64),
    String(String),
    Bool(bool),
    Date(DateValue),
    Path(PathRef),
    /// Deferred `path.name` lookup, resolved when the value is used.
    Property(PathRef, CompactString),
    Array(Vec<Value>),
    /// Unrendered content, e.g. the body of a slot.
    Content(Fragment),
}

impl Value {
    /// The `||` rule: anything except nil, `false`, `0` and `""` passes.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Nil | Self::Bool(false) => false,
            Self::Number(n) => *n != 0.0,
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Operand form used in error messages: strings are quoted.
    pub fn describe(&self) -> String {
        match self {
            Self::Nil => "nil".to_owned(),
            Self::String(s) => format!("{s:?}"),
            Self::Property(path, name) => format!("path[{:?}].{name}", path.url),
            Self::Content(fragment) => format!("<content from {}>", fragment.location),
            Self::Array(items) => {
                let items: Vec<_> = items.iter().map(Self::describe).collect();
                format!("[{}]", items.join(", "))
            }
            other => other.to_string(),
        }
    }
}

/// Numbers print without a fractional part when they are integral.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil | Self::Content(_) => Ok(()),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Path(p) => f.write_str(&p.url),
            Self::Property(p, name) => write!(f, "{}.{name}", p.url),
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
        }
    }
}

/// Deep structural equality, used by `==` and `!=`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Path(a), Self::Path(b)) => a == b,
            (Self::Property(a, x), Self::Property(b, y)) => a == b && x == y,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Content(a), Self::Content(b)) => Arc::ptr_eq(&a.nodes, &b.nodes),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(70.0), "70");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Nil.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        let arr = Value::Array(vec![Value::from(1.0), Value::from("a")]);
        assert_eq!(arr.to_string(), "[1, a]");
        assert_eq!(arr.describe(), r#"[1, "a"]"#);
    }

    #[test]
    fn test_is_set() {
        assert!(!Value::Nil.is_set());
        assert!(!Value::Bool(false).is_set());
        assert!(!Value::Number(0.0).is_set());
        assert!(!Value::from("").is_set());
        assert!(Value::Bool(true).is_set());
        assert!(Value::from(" ").is_set());
        assert!(Value::Array(vec![]).is_set());
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::Array(vec![Value::from(1.0), Value::Array(vec![Value::from("x")])]);
        let b = Value::Array(vec![Value::from(1.0), Value::Array(vec![Value::from("x")])]);
        assert_eq!(a, b);
        assert_ne!(Value::from(1.0), Value::from("1"));
    }

    #[test]
    fn test_parse_date_precisions() {
        let day = DateValue::parse("2024-03-09").unwrap();
        assert_eq!(day.to_string(), "2024-03-09");
        assert_eq!(day.at.hour(), 0);

        let minute = DateValue::parse("2024-03-09T14:05").unwrap();
        assert_eq!(minute.to_string(), "2024-03-09T14:05");

        let second = DateValue::parse("2024-03-09 14:05:33").unwrap();
        assert_eq!(second.to_string(), "2024-03-09T14:05:33");
        assert_eq!(second.at.second(), 33);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(DateValue::parse("2024-3-9").is_err());
        assert!(DateValue::parse("2024-02-30").is_err());
        assert!(DateValue::parse("yesterday").is_err());
        assert!(DateValue::parse("2024-03-09T14:05x").is_err());
    }

    #[test]
    fn test_parse_date_now() {
        let now = DateValue::parse("now").unwrap();
        assert_eq!(now.format, "%Y-%m-%dT%H:%M:%S");
    }

    #[test]
    fn test_date_order() {
        let a = DateValue::parse("2023-12-31").unwrap();
        let b = DateValue::parse("2024-01-01T00:01").unwrap();
        assert!(a.at < b.at);
    }
}
