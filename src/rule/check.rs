//! Parsed rule trees and their evaluation

use super::template::substitute;
use crate::error::{PolicyError, Result};
use crate::registry::Rules;
use crate::types::{render_value, Credentials, Target};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// One node of a parsed rule
///
/// Trees are immutable once built. Evaluating one is a pure function of the
/// target, the credentials and the rule registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Always satisfied
    True,
    /// Never satisfied
    False,
    /// Credentials hold the named role
    Role(String),
    /// `credentials[key]` equals `value` after target substitution
    Generic { key: String, value: String },
    /// The named rule in the registry holds
    Rule(String),
    And(Vec<Check>),
    Or(Vec<Check>),
    Not(Box<Check>),
}

impl Check {
    /// Evaluates this tree against a registry with no extra context
    pub fn evaluate(&self, target: &Target, creds: &Credentials, rules: &Rules) -> Result<bool> {
        Evaluator::new(rules).evaluate(self, target, creds)
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::True => write!(f, "@"),
            Check::False => write!(f, "!"),
            Check::Role(role) => write!(f, "role:{}", role),
            Check::Generic { key, value } => write!(f, "{}:{}", key, value),
            Check::Rule(name) => write!(f, "rule:{}", name),
            Check::And(children) => write_joined(f, children, " and "),
            Check::Or(children) => write_joined(f, children, " or "),
            Check::Not(child) => write!(f, "not {}", child),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Check], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

/// Walks rule trees, following `rule:` references through the registry
///
/// Keeps the chain of rules currently being evaluated so that a reference
/// back into that chain fails instead of recursing forever.
pub struct Evaluator<'r> {
    rules: &'r Rules,
    visiting: Vec<String>,
}

impl<'r> Evaluator<'r> {
    pub fn new(rules: &'r Rules) -> Self {
        Self {
            rules,
            visiting: Vec::new(),
        }
    }

    /// Evaluates the registered rule `name`
    pub fn evaluate_named(&mut self, name: &str, target: &Target, creds: &Credentials) -> Result<bool> {
        let (resolved, tree) = self.rules.resolve(name)?;

        // an unknown name is visited as the default rule it falls back to
        if self.visiting.contains(&resolved) {
            let mut cycle = self.visiting.clone();
            cycle.push(resolved);
            return Err(PolicyError::CyclicRule { cycle });
        }

        self.visiting.push(resolved);
        let result = self.evaluate(&tree, target, creds);
        self.visiting.pop();

        result
    }

    pub fn evaluate(&mut self, check: &Check, target: &Target, creds: &Credentials) -> Result<bool> {
        match check {
            Check::True => Ok(true),
            Check::False => Ok(false),
            Check::Role(role) => {
                let wanted = substitute(role, target)?.to_lowercase();
                Ok(creds.roles().iter().any(|held| held.to_lowercase() == wanted))
            }
            Check::Generic { key, value } => {
                let expected = substitute(value, target)?;
                Ok(generic_matches(key, &expected, creds))
            }
            Check::Rule(name) => {
                let result = self.evaluate_named(name, target, creds)?;
                debug!(rule = %name, result, "evaluated rule reference");
                Ok(result)
            }
            Check::And(children) => {
                for child in children {
                    if !self.evaluate(child, target, creds)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Check::Or(children) => {
                for child in children {
                    if self.evaluate(child, target, creds)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Check::Not(child) => Ok(!self.evaluate(child, target, creds)?),
        }
    }
}

fn generic_matches(key: &str, expected: &str, creds: &Credentials) -> bool {
    if let Some(literal) = literal_key(key) {
        return literal == expected;
    }

    if let Some(value) = creds.get(key) {
        return find_in(value, &[], expected);
    }

    let segments: Vec<&str> = key.split('.').collect();
    match segments.split_first() {
        Some((head, rest)) if !rest.is_empty() => creds
            .get(head)
            .is_some_and(|value| find_in(value, rest, expected)),
        _ => false,
    }
}

/// Walks `segments` below `value`; any list met on the way matches if one
/// of its elements does
fn find_in(value: &Value, segments: &[&str], expected: &str) -> bool {
    if let Value::Array(items) = value {
        return items.iter().any(|item| find_in(item, segments, expected));
    }

    match segments.split_first() {
        None => render_value(value) == expected,
        Some((head, rest)) => value
            .as_object()
            .and_then(|map| map.get(*head))
            .is_some_and(|next| find_in(next, rest, expected)),
    }
}

/// A check key written as a literal (`'Member'`, `"x"`, `True`, `7`)
/// compares the literal itself instead of a credential field
fn literal_key(key: &str) -> Option<String> {
    let quoted = key.len() >= 2
        && ((key.starts_with('\'') && key.ends_with('\''))
            || (key.starts_with('"') && key.ends_with('"')));
    if quoted {
        return Some(key[1..key.len() - 1].to_string());
    }

    match key {
        "True" => Some("true".to_string()),
        "False" => Some("false".to_string()),
        _ if is_numeric_literal(key) => Some(key.to_string()),
        _ => None,
    }
}

/// Digits with an optional sign, fraction and exponent; words such as
/// `nan` or `inf` stay field names
fn is_numeric_literal(key: &str) -> bool {
    let unsigned = key.strip_prefix(['+', '-']).unwrap_or(key);
    let starts_numeric = match unsigned.as_bytes() {
        [first, ..] if first.is_ascii_digit() => true,
        [b'.', second, ..] => second.is_ascii_digit(),
        _ => false,
    };
    starts_numeric && (key.parse::<i64>().is_ok() || key.parse::<f64>().is_ok())
}
