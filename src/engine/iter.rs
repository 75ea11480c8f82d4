//! `for` loop sources and the modifier pipeline.
//!
//! ```text
//! {{ for post (sortBy date) (reverse limit 3) posts/ }}
//!        │    └──────────── modifiers ──────┘ └─ source
//!        └─ loop variable
//! ```
//!
//! Modifiers apply strictly left to right. Directory sources are listed in
//! name order unless the first modifier is `sortBy`.

use super::expr::{Env, EvalError, Expr, PathRef, Value, compare, evaluate_forced, force, parse};
use compact_str::CompactString;
use std::cmp::Ordering;

/// Directory listing on top of expression evaluation.
pub trait IterEnv: Env {
    /// Writable files directly inside the directory `raw`, in name order.
    fn list_dir(&self, raw: &str) -> Result<Vec<PathRef>, EvalError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Sort,
    SortBy(CompactString),
    Reverse,
    Limit(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// `[a, b, c]` or `eval <expr>`; either must produce an array.
    Expr(Expr),
    /// Directory path, resolved like an include target.
    Dir(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Iterable {
    pub modifiers: Vec<Modifier>,
    pub source: Source,
}

/// Split a `for` argument into the loop variable and its iterable.
pub fn parse_for(arg: &str) -> Result<(CompactString, Iterable), String> {
    let arg = arg.trim();
    let (var, mut rest) = arg
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected `for <name> <source>`".to_owned())?;
    if !is_identifier(var) {
        return Err(format!("`{var}` is not a valid loop variable"));
    }

    let mut modifiers = Vec::new();
    loop {
        rest = rest.trim_start();
        let Some(group) = rest.strip_prefix('(') else { break };
        let close = group
            .find(')')
            .ok_or_else(|| "unclosed `(` in loop modifiers".to_owned())?;
        parse_modifiers(&group[..close], &mut modifiers)?;
        rest = &group[close + 1..];
    }

    let rest = rest.trim();
    let source = if rest.is_empty() {
        return Err("missing loop source".to_owned());
    } else if rest.starts_with('[') {
        Source::Expr(parse(rest).map_err(|e| e.to_string())?)
    } else if let Some(expr) = strip_keyword(rest, "eval") {
        Source::Expr(parse(expr).map_err(|e| e.to_string())?)
    } else {
        Source::Dir(rest.to_owned())
    };

    Ok((CompactString::from(var), Iterable { modifiers, source }))
}

fn parse_modifiers(group: &str, out: &mut Vec<Modifier>) -> Result<(), String> {
    let mut words = group.split_whitespace();
    while let Some(word) = words.next() {
        let modifier = match word {
            "sort" => Modifier::Sort,
            "reverse" => Modifier::Reverse,
            "sortBy" => {
                let field = words.next().ok_or("`sortBy` needs a field name")?;
                Modifier::SortBy(field.into())
            }
            "limit" => {
                let n = words.next().ok_or("`limit` needs a count")?;
                let n = n
                    .parse::<usize>()
                    .map_err(|_| format!("`limit {n}`: expected a non-negative integer"))?;
                Modifier::Limit(n)
            }
            other => return Err(format!("unknown loop modifier `{other}`")),
        };
        out.push(modifier);
    }
    Ok(())
}

/// `rest` after `keyword` when `keyword` is a whole word.
pub fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

impl Iterable {
    /// Produce the loop items in order.
    pub fn resolve<E: IterEnv>(&self, env: &mut E) -> Result<Vec<Value>, EvalError> {
        match &self.source {
            Source::Expr(expr) => {
                let items = match evaluate_forced(expr, &mut *env)? {
                    Value::Array(items) => items,
                    other => {
                        return Err(EvalError::Iterable(format!(
                            "loop source must be an array, got {}",
                            other.describe()
                        )));
                    }
                };
                self.apply_array(items)
            }
            Source::Dir(raw) => {
                let entries = env.list_dir(raw)?;
                self.apply_dir(entries, env)
            }
        }
    }

    fn apply_array(&self, mut items: Vec<Value>) -> Result<Vec<Value>, EvalError> {
        for modifier in &self.modifiers {
            match modifier {
                Modifier::Sort => sort_values(&mut items)?,
                Modifier::SortBy(field) if field.as_str() == "_" => sort_values(&mut items)?,
                Modifier::SortBy(field) => {
                    return Err(EvalError::Iterable(format!(
                        "`sortBy {field}` on an array; only `sortBy _` sorts array elements"
                    )));
                }
                Modifier::Reverse => items.reverse(),
                Modifier::Limit(n) => items.truncate(*n),
            }
        }
        Ok(items)
    }

    fn apply_dir<E: IterEnv>(
        &self,
        mut entries: Vec<PathRef>,
        env: &mut E,
    ) -> Result<Vec<Value>, EvalError> {
        for modifier in &self.modifiers {
            match modifier {
                Modifier::Sort => {
                    return Err(EvalError::Iterable(
                        "`sort` needs an array; use `sortBy <field>` for directories".to_owned(),
                    ));
                }
                Modifier::SortBy(field) => {
                    let mut keyed = entries
                        .into_iter()
                        .map(|entry| -> Result<_, EvalError> {
                            let key = Value::Property(entry.clone(), field.clone());
                            let key = force(key, &mut *env)?;
                            Ok((key, entry))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    let mut failure = None;
                    keyed.sort_by(|(a, _), (b, _)| {
                        sort_key_order(a, b).unwrap_or_else(|err| {
                            failure.get_or_insert(err);
                            Ordering::Equal
                        })
                    });
                    if let Some(err) = failure {
                        return Err(err);
                    }
                    entries = keyed.into_iter().map(|(_, entry)| entry).collect();
                }
                Modifier::Reverse => entries.reverse(),
                Modifier::Limit(n) => entries.truncate(*n),
            }
        }
        Ok(entries.into_iter().map(Value::Path).collect())
    }
}

/// Files without the sort field come first.
fn sort_key_order(a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    match (a, b) {
        (Value::Nil, Value::Nil) => Ok(Ordering::Equal),
        (Value::Nil, _) => Ok(Ordering::Less),
        (_, Value::Nil) => Ok(Ordering::Greater),
        _ => compare(a, b),
    }
}

/// Stable sort by natural order; the first incomparable pair is the error.
fn sort_values(items: &mut [Value]) -> Result<(), EvalError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        compare(a, b).unwrap_or_else(|err| {
            failure.get_or_insert(err);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}
