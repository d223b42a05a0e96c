//! Registry of named rules

use crate::error::{ParseError, PolicyError, Result};
use crate::rule::{parse_rule, Check, Evaluator, ParseMode};
use crate::types::{Credentials, Target};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of parsing one rule definition
#[derive(Debug, Clone)]
pub enum RuleEntry {
    Parsed(Arc<Check>),
    Invalid(ParseError),
}

/// Named rules, parsed once at load time
///
/// Every definition is parsed eagerly. A definition that fails to parse is
/// kept as [`RuleEntry::Invalid`] under its name and does not affect its
/// neighbours; the failure only surfaces when that rule is evaluated. Names
/// referenced through `rule:` are looked up lazily, so rules may refer to
/// rules defined after them.
///
/// # Examples
///
/// ```
/// use authz_policy::{Attributes, Rules, ParseMode};
///
/// let rules = Rules::from_definitions(
///     [("is_user", "role:user or role:admin"), ("can_edit", "rule:is_user")],
///     ParseMode::Strict,
/// );
///
/// let creds = Attributes::new().with("roles", vec!["admin"]);
/// assert!(rules.evaluate("can_edit", &Attributes::new(), &creds).unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Rules {
    entries: IndexMap<String, RuleEntry>,
    mode: ParseMode,
    default_rule: Option<String>,
}

impl Rules {
    /// Creates an empty registry
    pub fn new(mode: ParseMode) -> Self {
        Self {
            entries: IndexMap::new(),
            mode,
            default_rule: None,
        }
    }

    /// Parses every definition in `definitions`
    pub fn from_definitions<I, K, V>(definitions: I, mode: ParseMode) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut rules = Self::new(mode);
        for (name, raw) in definitions {
            rules.insert(name, raw.as_ref());
        }

        debug!(
            rules = rules.len(),
            invalid = rules.errors().count(),
            "loaded rule definitions"
        );
        rules
    }

    /// Parses a JSON object mapping rule names to expressions
    pub fn load_json(data: &str, mode: ParseMode) -> Result<Self> {
        let document: Value = serde_json::from_str(data)
            .map_err(|e| PolicyError::InvalidDefinitions(e.to_string()))?;

        let Value::Object(map) = document else {
            return Err(PolicyError::InvalidDefinitions(
                "expected a JSON object of rule names to expressions".to_string(),
            ));
        };

        let mut definitions = Vec::with_capacity(map.len());
        for (name, raw) in map {
            match raw {
                Value::String(text) => definitions.push((name, text)),
                other => {
                    return Err(PolicyError::InvalidDefinitions(format!(
                        "rule '{}' must be a string, got {}",
                        name, other
                    )))
                }
            }
        }

        Ok(Self::from_definitions(definitions, mode))
    }

    /// Reads and parses a JSON policy file
    pub fn load_file(path: impl AsRef<Path>, mode: ParseMode) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let rules = Self::load_json(&data, mode)?;
        debug!(path = %path.display(), rules = rules.len(), "loaded policy file");
        Ok(rules)
    }

    /// Rule used when a `rule:` reference names a missing rule
    pub fn with_default_rule(mut self, name: impl Into<String>) -> Self {
        self.default_rule = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    fn insert(&mut self, name: impl Into<String>, raw: &str) {
        let name = name.into();
        let entry = match parse_rule(raw, ParseMode::Strict) {
            Ok(check) => RuleEntry::Parsed(Arc::new(check)),
            Err(err) => {
                warn!(rule = %name, error = %err, "rule failed to parse");
                RuleEntry::Invalid(err)
            }
        };
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<&RuleEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn default_rule(&self) -> Option<&str> {
        self.default_rule.as_deref()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Rules that failed to parse, by name
    pub fn errors(&self) -> impl Iterator<Item = (&str, &ParseError)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            RuleEntry::Invalid(err) => Some((name.as_str(), err)),
            RuleEntry::Parsed(_) => None,
        })
    }

    /// Evaluates the registered rule `name`
    pub fn evaluate(&self, name: &str, target: &Target, creds: &Credentials) -> Result<bool> {
        Evaluator::new(self).evaluate_named(name, target, creds)
    }

    /// Finds the tree to evaluate for `name`, with the name of the rule it
    /// came from
    ///
    /// Falls back to the default rule for unknown names. In permissive mode
    /// an unknown or malformed rule resolves to [`Check::False`].
    pub(crate) fn resolve(&self, name: &str) -> Result<(String, Arc<Check>)> {
        let entry = self.entries.get_key_value(name).or_else(|| {
            self.default_rule
                .as_deref()
                .and_then(|default| self.entries.get_key_value(default))
        });

        match (entry, self.mode) {
            (Some((resolved, RuleEntry::Parsed(check))), _) => {
                Ok((resolved.clone(), Arc::clone(check)))
            }
            (Some((_, RuleEntry::Invalid(err))), ParseMode::Strict) => Err(err.clone().into()),
            (Some((resolved, RuleEntry::Invalid(err))), ParseMode::Permissive) => {
                warn!(rule = %name, error = %err, "evaluating malformed rule as deny");
                Ok((resolved.clone(), Arc::new(Check::False)))
            }
            (None, ParseMode::Strict) => Err(PolicyError::UnknownRule {
                rule: name.to_string(),
            }),
            (None, ParseMode::Permissive) => {
                warn!(rule = %name, "rule is not defined, denying");
                Ok((name.to_string(), Arc::new(Check::False)))
            }
        }
    }
}

impl fmt::Display for Rules {
    /// Pretty JSON of rule names to their rendered expressions
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: IndexMap<&str, String> = self
            .entries
            .iter()
            .map(|(name, entry)| {
                let text = match entry {
                    RuleEntry::Parsed(check) if **check == Check::True => String::new(),
                    RuleEntry::Parsed(check) => check.to_string(),
                    RuleEntry::Invalid(err) => err.rule.clone(),
                };
                (name.as_str(), text)
            })
            .collect();

        let json = serde_json::to_string_pretty(&rendered).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attributes;

    fn admin() -> Attributes {
        Attributes::new().with("roles", vec!["admin"])
    }

    #[test]
    fn test_bad_rule_does_not_block_others() {
        let rules = Rules::from_definitions(
            [("broken", "(role:admin"), ("healthy", "role:admin")],
            ParseMode::Strict,
        );

        assert_eq!(rules.len(), 2);
        assert!(rules.evaluate("healthy", &Attributes::new(), &admin()).unwrap());

        let err = rules
            .evaluate("broken", &Attributes::new(), &admin())
            .unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));

        let errors: Vec<_> = rules.errors().map(|(name, _)| name).collect();
        assert_eq!(errors, vec!["broken"]);
    }

    #[test]
    fn test_permissive_bad_rule_denies() {
        let rules = Rules::from_definitions([("broken", "role:admin or")], ParseMode::Permissive);
        assert!(!rules.evaluate("broken", &Attributes::new(), &admin()).unwrap());
        assert_eq!(rules.errors().count(), 1);
    }

    #[test]
    fn test_unknown_rule() {
        let rules = Rules::from_definitions([("a", "rule:missing")], ParseMode::Strict);
        let err = rules.evaluate("a", &Attributes::new(), &admin()).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownRule { ref rule } if rule == "missing"));

        let rules = Rules::from_definitions([("a", "rule:missing")], ParseMode::Permissive);
        assert!(!rules.evaluate("a", &Attributes::new(), &admin()).unwrap());
    }

    #[test]
    fn test_default_rule_fallback() {
        let rules = Rules::from_definitions(
            [("default", "role:admin"), ("a", "rule:missing")],
            ParseMode::Strict,
        )
        .with_default_rule("default");

        assert!(rules.evaluate("a", &Attributes::new(), &admin()).unwrap());
        assert!(!rules
            .evaluate("a", &Attributes::new(), &Attributes::new())
            .unwrap());
    }

    #[test]
    fn test_missing_default_rule_is_unknown() {
        let rules = Rules::from_definitions([("a", "rule:missing")], ParseMode::Strict)
            .with_default_rule("also_missing");
        let err = rules.evaluate("a", &Attributes::new(), &admin()).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownRule { .. }));
    }

    #[test]
    fn test_cycle_through_default_rule_names_default() {
        let rules = Rules::from_definitions(
            [("default", "rule:missing"), ("a", "rule:missing")],
            ParseMode::Strict,
        )
        .with_default_rule("default");

        let err = rules.evaluate("a", &Attributes::new(), &admin()).unwrap_err();
        match err {
            PolicyError::CyclicRule { cycle } => {
                assert_eq!(cycle, vec!["a", "default", "default"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_load_json() {
        let rules = Rules::load_json(
            r#"{ "admin_required": "role:admin", "anyone": "" }"#,
            ParseMode::Strict,
        )
        .unwrap();
        assert!(rules.contains("admin_required"));
        assert!(rules.evaluate("anyone", &Attributes::new(), &Attributes::new()).unwrap());
    }

    #[test]
    fn test_load_json_rejects_non_strings() {
        let err = Rules::load_json(r#"{ "a": 1 }"#, ParseMode::Strict).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidDefinitions(_)));

        let err = Rules::load_json(r#"["role:admin"]"#, ParseMode::Strict).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidDefinitions(_)));
    }

    #[test]
    fn test_display_dump() {
        let rules = Rules::from_definitions(
            [("anyone", ""), ("owner", "id:%(user_id)s or role:admin")],
            ParseMode::Strict,
        );
        let dumped: Value = serde_json::from_str(&rules.to_string()).unwrap();
        assert_eq!(dumped["anyone"], "");
        assert_eq!(dumped["owner"], "(id:%(user_id)s or role:admin)");
    }
}
