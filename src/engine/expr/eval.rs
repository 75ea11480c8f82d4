//! Tree-walking interpreter for [`Expr`].

use super::{
    ast::{BinaryOp, Expr, UnaryOp},
    value::{DateValue, PathRef, Value, format_number},
};
use compact_str::CompactString;
use std::cmp::Ordering;
use thiserror::Error;

/// Everything an expression can observe outside itself.
pub trait Env {
    /// Visible binding for `name`, innermost scope first.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Resolve the argument of `path[...]` relative to the current file.
    fn resolve_path(&self, raw: &str) -> Result<PathRef, EvalError>;

    /// Top-level binding `name` of the file behind `path`, or nil.
    fn property(&mut self, path: &PathRef, name: &str) -> Result<Value, EvalError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("`{0}` is not defined")]
    Undefined(CompactString),

    #[error("cannot apply `{op}` to {left} and {right}")]
    Type {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("cannot apply unary `{op}` to {operand}")]
    UnaryType { op: &'static str, operand: String },

    #[error("modulo by zero in {left} % {right}")]
    ModuloByZero { left: String, right: String },

    #[error("invalid date `{0}`, expected `YYYY-MM-DD[THH:MM[:SS]]` or `now`")]
    Date(String),

    #[error("`{name}[...]` expects a string, got {got}")]
    Constructor { name: &'static str, got: String },

    #[error("cannot resolve path `{0}`")]
    Path(String),

    #[error("property `.{name}` needs a path, got {got}")]
    NotAPath { name: CompactString, got: String },

    #[error("cannot load `{path}`: {reason}")]
    Load { path: String, reason: String },

    #[error("{0}")]
    Iterable(String),
}

fn type_error(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::Type {
        op: op.symbol(),
        left: left.describe(),
        right: right.describe(),
    }
}

/// Evaluate `expr`. The result may still be a deferred property; see [`force`].
pub fn evaluate(expr: &Expr, env: &mut dyn Env) -> Result<Value, EvalError> {
    match expr {
        Expr::Nil => Ok(Value::Nil),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => env
            .lookup(name)
            .ok_or_else(|| EvalError::Undefined(name.clone())),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate_forced(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Unary(op, operand) => {
            let value = evaluate_forced(operand, env)?;
            unary(*op, value)
        }
        Expr::Binary(op, left, right) => binary(*op, left, right, env),
        Expr::Date(arg) => match evaluate_forced(arg, env)? {
            Value::String(s) => DateValue::parse(&s).map(Value::Date),
            other => Err(EvalError::Constructor {
                name: "date",
                got: other.describe(),
            }),
        },
        Expr::Path(arg) => match evaluate_forced(arg, env)? {
            Value::String(s) => env.resolve_path(&s).map(Value::Path),
            Value::Path(p) => Ok(Value::Path(p)),
            other => Err(EvalError::Constructor {
                name: "path",
                got: other.describe(),
            }),
        },
        Expr::Property(base, name) => match evaluate_forced(base, env)? {
            Value::Path(p) => Ok(Value::Property(p, name.clone())),
            other => Err(EvalError::NotAPath {
                name: name.clone(),
                got: other.describe(),
            }),
        },
    }
}

/// Evaluate and resolve any deferred property.
pub fn evaluate_forced(expr: &Expr, env: &mut dyn Env) -> Result<Value, EvalError> {
    let value = evaluate(expr, env)?;
    force(value, env)
}

/// Resolve deferred property lookups until a concrete value remains.
pub fn force(mut value: Value, env: &mut dyn Env) -> Result<Value, EvalError> {
    while let Value::Property(path, name) = value {
        value = env.property(&path, &name)?;
    }
    Ok(value)
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => Err(EvalError::UnaryType {
            op: op.symbol(),
            operand: other.describe(),
        }),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, env: &mut dyn Env) -> Result<Value, EvalError> {
    let lhs = evaluate_forced(left, env)?;

    // Logical operators decide whether the right side is evaluated at all.
    match op {
        BinaryOp::Or => {
            return if lhs.is_set() {
                Ok(lhs)
            } else {
                evaluate_forced(right, env)
            };
        }
        BinaryOp::And => {
            return match lhs {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => match evaluate_forced(right, env)? {
                    Value::Bool(b) => Ok(Value::Bool(b)),
                    rhs => Err(type_error(op, &lhs, &rhs)),
                },
                _ => {
                    let rhs = evaluate_forced(right, env)?;
                    Err(type_error(op, &lhs, &rhs))
                }
            };
        }
        _ => {}
    }

    let rhs = evaluate_forced(right, env)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::NotEq => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(&lhs, &rhs).map_err(|_| type_error(op, &lhs, &rhs))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::Add => Ok(match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Value::String(a), Value::String(b)) => Value::String(a + &b),
            (a, b) => Value::String(format!("{a}{b}")),
        }),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&lhs, &rhs) else {
                return Err(type_error(op, &lhs, &rhs));
            };
            let (a, b) = (*a, *b);
            Ok(Value::Number(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => {
                    let (a, b) = (a.trunc() as i64, b.trunc() as i64);
                    if b == 0 {
                        return Err(EvalError::ModuloByZero {
                            left: format_number(a as f64),
                            right: format_number(b as f64),
                        });
                    }
                    a.wrapping_rem(b) as f64
                }
            }))
        }
        BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
    }
}

/// Natural ordering for numbers, strings and dates.
///
/// Shared by the relational operators and the `sort` loop modifier.
pub fn compare(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Ok(a.at.cmp(&b.at)),
        _ => Err(type_error(BinaryOp::Lt, left, right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expr::parse;
    use rustc_hash::FxHashMap;
    use std::path::PathBuf;

    /// Flat bindings plus a table of fake files for property lookups.
    #[derive(Default)]
    struct MapEnv {
        vars: FxHashMap<String, Value>,
        files: FxHashMap<String, FxHashMap<String, Value>>,
        property_calls: usize,
    }

    impl MapEnv {
        fn with(mut self, name: &str, value: Value) -> Self {
            self.vars.insert(name.to_owned(), value);
            self
        }

        fn file(mut self, url: &str, props: &[(&str, Value)]) -> Self {
            let props = props
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect();
            self.files.insert(url.to_owned(), props);
            self
        }
    }

    impl Env for MapEnv {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }

        fn resolve_path(&self, raw: &str) -> Result<PathRef, EvalError> {
            if self.files.contains_key(raw) {
                Ok(PathRef {
                    source: PathBuf::from(raw),
                    url: raw.to_owned(),
                })
            } else {
                Err(EvalError::Path(raw.to_owned()))
            }
        }

        fn property(&mut self, path: &PathRef, name: &str) -> Result<Value, EvalError> {
            self.property_calls += 1;
            Ok(self
                .files
                .get(&path.url)
                .and_then(|props| props.get(name))
                .cloned()
                .unwrap_or(Value::Nil))
        }
    }

    fn run(src: &str, env: &mut MapEnv) -> Result<Value, EvalError> {
        let expr = parse(src).unwrap();
        evaluate_forced(&expr, env)
    }

    fn ok(src: &str) -> Value {
        run(src, &mut MapEnv::default()).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(ok("10 + 10 * (2 + 4)"), Value::Number(70.0));
        assert_eq!(ok("7 / 2"), Value::Number(3.5));
        assert_eq!(ok("-3 - -4"), Value::Number(1.0));
        assert_eq!(ok("1 / 0"), Value::Number(f64::INFINITY));
    }

    #[test]
    fn test_modulo_truncates() {
        assert_eq!(ok("7.9 % 3.2"), Value::Number(1.0));
        assert_eq!(ok("-7 % 3"), Value::Number(-1.0));
        assert!(matches!(
            run("5 % 0.5", &mut MapEnv::default()),
            Err(EvalError::ModuloByZero { .. })
        ));
    }

    #[test]
    fn test_add_falls_back_to_strings() {
        assert_eq!(ok(r#""a" + "b""#), Value::from("ab"));
        assert_eq!(ok(r#""n=" + 2"#), Value::from("n=2"));
        assert_eq!(ok("true + [1, 2]"), Value::from("true[1, 2]"));
        assert_eq!(ok("nil + 1"), Value::from("1"));
    }

    #[test]
    fn test_arithmetic_type_errors() {
        let err = run(r#""a" * 2"#, &mut MapEnv::default()).unwrap_err();
        assert_eq!(
            err,
            EvalError::Type {
                op: "*",
                left: r#""a""#.into(),
                right: "2".into(),
            }
        );
        assert!(run("-true", &mut MapEnv::default()).is_err());
        assert!(run("!1", &mut MapEnv::default()).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(ok("1 < 2"), Value::Bool(true));
        assert_eq!(ok("2 <= 2"), Value::Bool(true));
        assert_eq!(ok(r#""abc" > "abd""#), Value::Bool(false));
        assert_eq!(ok(r#"date["2024-01-01"] < date["2024-01-01T00:01"]"#), Value::Bool(true));
        assert!(run(r#"1 < "2""#, &mut MapEnv::default()).is_err());
    }

    #[test]
    fn test_deep_equality() {
        assert_eq!(ok("[1, [2, 3]] == [1, [2, 3]]"), Value::Bool(true));
        assert_eq!(ok(r#"1 == "1""#), Value::Bool(false));
        assert_eq!(ok("nil != nil"), Value::Bool(false));
    }

    #[test]
    fn test_or_passes_values_through() {
        assert_eq!(ok(r#"nil || "Untitled""#), Value::from("Untitled"));
        assert_eq!(ok(r#""" || 0"#), Value::Number(0.0));
        assert_eq!(ok(r#""set" || x"#), Value::from("set"));
        assert_eq!(ok("[] || 1"), Value::Array(vec![]));
    }

    #[test]
    fn test_and_requires_booleans() {
        assert_eq!(ok("true && false"), Value::Bool(false));
        assert_eq!(ok("false && undefined_name"), Value::Bool(false));
        assert!(run("true && 1", &mut MapEnv::default()).is_err());
        assert!(run("1 && true", &mut MapEnv::default()).is_err());
    }

    #[test]
    fn test_undefined_identifier() {
        assert_eq!(
            run("missing + 1", &mut MapEnv::default()),
            Err(EvalError::Undefined("missing".into()))
        );
    }

    #[test]
    fn test_lookup() {
        let mut env = MapEnv::default().with("a", Value::Number(2.0));
        assert_eq!(run("a * a", &mut env), Ok(Value::Number(4.0)));
    }

    #[test]
    fn test_date_constructor() {
        assert!(matches!(ok(r#"date["now"]"#), Value::Date(_)));
        assert!(matches!(
            run("date[5]", &mut MapEnv::default()),
            Err(EvalError::Constructor { name: "date", .. })
        ));
        assert!(matches!(
            run(r#"date["soon"]"#, &mut MapEnv::default()),
            Err(EvalError::Date(_))
        ));
    }

    #[test]
    fn test_path_property_is_deferred() {
        let mut env = MapEnv::default().file("/a.md", &[("title", Value::from("Hello"))]);
        let expr = parse(r#"path["/a.md"].title"#).unwrap();
        let deferred = evaluate(&expr, &mut env).unwrap();
        assert!(matches!(deferred, Value::Property(..)));
        assert_eq!(env.property_calls, 0);

        assert_eq!(force(deferred, &mut env).unwrap(), Value::from("Hello"));
        assert_eq!(env.property_calls, 1);
    }

    #[test]
    fn test_missing_property_is_nil() {
        let mut env = MapEnv::default().file("/a.md", &[]);
        assert_eq!(run(r#"path["/a.md"].title || "none""#, &mut env), Ok(Value::from("none")));
    }

    #[test]
    fn test_property_on_non_path() {
        let mut env = MapEnv::default().with("n", Value::Number(1.0));
        assert!(matches!(run("n.title", &mut env), Err(EvalError::NotAPath { .. })));
    }

    #[test]
    fn test_unresolvable_path() {
        assert_eq!(
            run(r#"path["/nope"]"#, &mut MapEnv::default()),
            Err(EvalError::Path("/nope".into()))
        );
    }

    #[test]
    fn test_compare_for_sorting() {
        assert_eq!(
            compare(&Value::Number(2.0), &Value::Number(10.0)),
            Ok(Ordering::Less)
        );
        assert!(compare(&Value::Bool(true), &Value::Bool(false)).is_err());
    }
}
