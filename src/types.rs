//! Target and credential data

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the credential field holding the actor's roles
pub const ROLES_FIELD: &str = "roles";

/// Key/value data a check is evaluated against
///
/// The same shape describes both sides of a request: the resource being
/// acted on (the target) and the acting identity (the credentials).
///
/// # Examples
///
/// ```
/// use authz_policy::Attributes;
///
/// let creds = Attributes::new()
///     .with("id", "U1")
///     .with("roles", vec!["user", "admin"]);
///
/// assert_eq!(creds.roles(), vec!["user", "admin"]);
/// assert_eq!(creds.get("id").unwrap(), "U1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

/// The resource instance being checked
pub type Target = Attributes;

/// The actor performing the action
pub type Credentials = Attributes;

impl Attributes {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Looks a field up by its exact name, then as a dotted path
    /// (`user.id` descends into the `user` object).
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(key) {
            return Some(value);
        }

        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Roles held by these credentials
    ///
    /// A missing `roles` field is an empty collection. A single string is
    /// treated as one role.
    pub fn roles(&self) -> Vec<String> {
        match self.0.get(ROLES_FIELD) {
            Some(Value::Array(items)) => items.iter().map(render_value).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![render_value(other)],
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl TryFrom<Value> for Attributes {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Natural string form of a value, used for every comparison
///
/// Strings render without quotes; everything else renders as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
