//! Enforcement outcomes

use crate::types::{Credentials, Target};
use serde::Serialize;
use thiserror::Error;

/// Outcome of evaluating a rule for a request
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// `Ok(())` when allowed, the denial otherwise
    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial),
        }
    }
}

/// A completed evaluation that returned false
///
/// Carries the rule identifier and both sides of the request for audit
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{rule} on {target} by {credentials} disallowed by policy")]
pub struct Denial {
    pub rule: String,
    pub target: Target,
    pub credentials: Credentials,
}

impl Denial {
    pub fn new(rule: impl Into<String>, target: &Target, credentials: &Credentials) -> Self {
        Self {
            rule: rule.into(),
            target: target.clone(),
            credentials: credentials.clone(),
        }
    }
}
