//! Error types for the policy engine

use crate::enforcer::Denial;
use thiserror::Error;

/// Result type alias for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;

/// A rule expression that could not be parsed
///
/// Kept separate from [`PolicyError`] so the registry can hold one per
/// malformed rule and hand out copies on every lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid rule '{rule}': {reason}")]
pub struct ParseError {
    pub rule: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced while loading or enforcing rules
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Malformed expression syntax
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A `rule:` reference names a rule that is not registered
    #[error("rule '{rule}' is not defined")]
    UnknownRule { rule: String },

    /// A chain of `rule:` references revisits a rule being evaluated
    #[error("circular rule reference: {}", cycle.join(" -> "))]
    CyclicRule { cycle: Vec<String> },

    /// A `%(field)s` placeholder names a field missing from the target
    #[error("target has no field '{field}' required by '{template}'")]
    Substitution { field: String, template: String },

    /// Evaluation finished and the rule did not hold
    #[error("{0}")]
    Denied(Box<Denial>),

    /// The policy document is not a mapping of rule names to expressions
    #[error("invalid rule definitions: {0}")]
    InvalidDefinitions(String),

    /// I/O error while reading a policy file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolicyError {
    /// True for the expected "rule evaluated to false" outcome
    pub fn is_denial(&self) -> bool {
        matches!(self, PolicyError::Denied(_))
    }
}

impl From<Denial> for PolicyError {
    fn from(denial: Denial) -> Self {
        PolicyError::Denied(Box::new(denial))
    }
}
