//! Enforcement entry point
//!
//! Looks a rule up by name, or parses the input as a raw expression when no
//! rule of that name is registered, and evaluates it for a target and a set
//! of credentials.

mod cache;
mod decision;

pub use cache::{CacheStats, ExpressionCache};
pub use decision::{Decision, Denial};

use crate::error::{PolicyError, Result};
use crate::registry::Rules;
use crate::rule::{parse_rule, Check, Evaluator, ParseMode};
use crate::types::{Credentials, Target};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Enforcer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Treatment of malformed rules and unknown rule references
    pub mode: ParseMode,

    /// Registered rule used when a `rule:` reference names a missing rule
    pub default_rule: Option<String>,

    /// Keep parsed raw expressions between calls
    pub cache_expressions: bool,

    /// Maximum number of cached raw expressions
    pub max_cache_size: usize,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::Strict,
            default_rule: None,
            cache_expressions: true,
            max_cache_size: 10_000,
        }
    }
}

/// Evaluates rules for targets and credentials
///
/// Immutable after construction apart from the raw-expression cache, so an
/// `Arc<Enforcer>` can be shared across threads without locking.
///
/// # Examples
///
/// ```
/// use authz_policy::{Attributes, Enforcer, EnforcerConfig};
///
/// let enforcer = Enforcer::from_definitions(
///     [("article:delete", "role:admin or user_id:%(user_id)s")],
///     EnforcerConfig::default(),
/// );
///
/// let article = Attributes::new().with("user_id", "kate");
/// let kate = Attributes::new().with("user_id", "kate").with("roles", vec!["user"]);
/// let lucy = Attributes::new().with("user_id", "lucy").with("roles", vec!["user"]);
///
/// assert!(enforcer.enforce("article:delete", &article, &kate, false).unwrap());
/// assert!(!enforcer.enforce("article:delete", &article, &lucy, false).unwrap());
/// assert!(enforcer.enforce("article:delete", &article, &lucy, true).unwrap_err().is_denial());
/// ```
pub struct Enforcer {
    rules: Rules,
    config: EnforcerConfig,
    cache: Option<ExpressionCache>,
}

impl Enforcer {
    /// Creates an enforcer over an already loaded registry
    ///
    /// The configured mode and default rule replace the registry's own.
    pub fn new(rules: Rules, config: EnforcerConfig) -> Self {
        let mut rules = rules.with_mode(config.mode);
        if let Some(default) = &config.default_rule {
            rules = rules.with_default_rule(default.clone());
        }

        let cache = config
            .cache_expressions
            .then(|| ExpressionCache::new(config.max_cache_size));

        debug!(
            rules = rules.len(),
            mode = ?config.mode,
            cache = config.cache_expressions,
            "enforcer initialized"
        );

        Self {
            rules,
            config,
            cache,
        }
    }

    pub fn from_definitions<I, K, V>(definitions: I, config: EnforcerConfig) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let rules = Rules::from_definitions(definitions, config.mode);
        Self::new(rules, config)
    }

    /// Loads rules from a JSON policy file
    pub fn load_file(path: impl AsRef<Path>, config: EnforcerConfig) -> Result<Self> {
        let rules = Rules::load_file(path, config.mode)?;
        Ok(Self::new(rules, config))
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Evaluates a registered rule name or a raw expression
    ///
    /// A name registered in the rule set is evaluated from the registry.
    /// Anything else is parsed as an expression and evaluated without being
    /// added to the registry.
    pub fn authorize(&self, rule: &str, target: &Target, creds: &Credentials) -> Result<Decision> {
        let allowed = if self.rules.contains(rule) {
            self.rules.evaluate(rule, target, creds)?
        } else {
            let check = self.parse_expression(rule)?;
            Evaluator::new(&self.rules).evaluate(&check, target, creds)?
        };

        debug!(rule = %rule, allowed, "policy decision");

        Ok(if allowed {
            Decision::Allow
        } else {
            Decision::Deny(Denial::new(rule, target, creds))
        })
    }

    /// Returns whether `rule` holds
    ///
    /// With `raise_on_deny` a false result becomes [`PolicyError::Denied`].
    pub fn enforce(
        &self,
        rule: &str,
        target: &Target,
        creds: &Credentials,
        raise_on_deny: bool,
    ) -> Result<bool> {
        match self.authorize(rule, target, creds)? {
            Decision::Allow => Ok(true),
            Decision::Deny(denial) if raise_on_deny => Err(denial.into()),
            Decision::Deny(_) => Ok(false),
        }
    }

    /// Like [`enforce`](Self::enforce) with `raise_on_deny`, mapping the
    /// denial to a caller-chosen error
    pub fn enforce_or_else<E, F>(
        &self,
        rule: &str,
        target: &Target,
        creds: &Credentials,
        on_deny: F,
    ) -> std::result::Result<(), E>
    where
        E: From<PolicyError>,
        F: FnOnce(Denial) -> E,
    {
        self.authorize(rule, target, creds)?
            .into_result()
            .map_err(on_deny)
    }

    /// Evaluates an already parsed tree
    pub fn enforce_check(&self, check: &Check, target: &Target, creds: &Credentials) -> Result<bool> {
        Evaluator::new(&self.rules).evaluate(check, target, creds)
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ExpressionCache::stats)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    fn parse_expression(&self, raw: &str) -> Result<Arc<Check>> {
        if let Some(cache) = &self.cache {
            if let Some(check) = cache.get(raw) {
                return Ok(check);
            }
        }

        let check = Arc::new(parse_rule(raw, self.config.mode)?);

        if let Some(cache) = &self.cache {
            cache.insert(raw, Arc::clone(&check));
        }

        Ok(check)
    }
}
