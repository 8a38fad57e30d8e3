//! Policies: a name and a mapping from path glob to capability descriptor.
//!
//! A [`Policy`] is an in-memory mirror of the server document. There is no
//! partial update endpoint; every write sends the whole rule set.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::error::DecodeError;
use crate::objects::{Decode, from_shape};

/// Capability descriptor for one path, e.g. `{"policy": "read"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(Map<String, Value>);

impl Rule {
    /// A rule granting one policy level (`deny`, `read`, `write`, `sudo`).
    #[must_use]
    pub fn policy(level: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("policy".to_string(), Value::String(level.into()));
        Self(map)
    }

    /// The policy level, when the rule uses one.
    #[must_use]
    pub fn level(&self) -> Option<&str> {
        self.0.get("policy").and_then(Value::as_str)
    }

    /// Look up a field of the descriptor.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The descriptor as JSON.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<&str> for Rule {
    fn from(level: &str) -> Self {
        Self::policy(level)
    }
}

impl From<String> for Rule {
    fn from(level: String) -> Self {
        Self::policy(level)
    }
}

impl From<Map<String, Value>> for Rule {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Rules keyed by path glob.
pub type Rules = BTreeMap<String, Rule>;

/// A named policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Policy name
    pub name: String,
    /// Path rules
    pub rules: Rules,
}

impl Policy {
    /// An empty policy.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Rules::new(),
        }
    }

    /// A policy with rules.
    #[must_use]
    pub fn with_rules<I, P, R>(name: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<Rule>,
    {
        let mut policy = Self::new(name);
        policy.extend(rules);
        policy
    }

    /// Set the rule for a path, returning the previous one.
    pub fn insert(&mut self, path: impl Into<String>, rule: impl Into<Rule>) -> Option<Rule> {
        self.rules.insert(path.into(), rule.into())
    }

    /// The rule for a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Rule> {
        self.rules.get(path)
    }

    /// Drop the rule for a path.
    pub fn remove(&mut self, path: &str) -> Option<Rule> {
        self.rules.remove(path)
    }

    /// Whether a path has a rule.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.rules.contains_key(path)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the policy has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over rules in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Rule)> {
        self.rules.iter()
    }

    /// The rules document as sent to the server: `{"path": {...}}`.
    #[must_use]
    pub fn document(&self) -> String {
        json!({ "path": self.rules }).to_string()
    }

    /// Parse a rules document. Anything that is not a JSON `{"path": {...}}`
    /// document yields no rules: the server omits or leaves in HCL the
    /// rules of built-in policies.
    #[must_use]
    pub fn parse_document(document: &str) -> Rules {
        #[derive(Deserialize)]
        struct Document {
            #[serde(default)]
            path: Rules,
        }

        serde_json::from_str::<Document>(document)
            .map(|doc| doc.path)
            .unwrap_or_default()
    }
}

impl<P: Into<String>, R: Into<Rule>> Extend<(P, R)> for Policy {
    fn extend<I: IntoIterator<Item = (P, R)>>(&mut self, iter: I) {
        for (path, rule) in iter {
            self.insert(path, rule);
        }
    }
}

impl PartialEq<Rules> for Policy {
    fn eq(&self, other: &Rules) -> bool {
        &self.rules == other
    }
}

impl Decode for Policy {
    const SHAPE: &'static str = "policy";

    fn decode(value: Value) -> Result<Self, DecodeError> {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            #[serde(default)]
            rules: Option<Value>,
        }

        let raw: Raw = from_shape(Self::SHAPE, value)?;
        let rules = match raw.rules {
            Some(Value::String(document)) => Self::parse_document(&document),
            _ => Rules::new(),
        };

        Ok(Self {
            name: raw.name,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_rule_becomes_policy_level() {
        let mut policy = Policy::new("foo");
        policy.insert("sys", "deny");
        assert_eq!(policy.get("sys").and_then(Rule::level), Some("deny"));
        assert_eq!(policy.get("sys"), Some(&Rule::policy("deny")));
    }

    #[test]
    fn test_document_wraps_path() {
        let policy = Policy::with_rules("foo", [("sys", "deny")]);
        let document: Value = serde_json::from_str(&policy.document()).unwrap();
        assert_eq!(document, json!({"path": {"sys": {"policy": "deny"}}}));
    }

    #[test]
    fn test_decode_unwraps_path() {
        let policy = Policy::decode(json!({
            "name": "foo",
            "rules": "{\"path\":{\"sys\":{\"policy\":\"deny\"},\"bar/baz\":{\"policy\":\"read\"}}}"
        }))
        .unwrap();

        assert_eq!(policy.name, "foo");
        assert_eq!(policy.len(), 2);
        assert!(policy.contains("bar/baz"));
    }

    #[test]
    fn test_decode_tolerates_missing_or_hcl_rules() {
        let root = Policy::decode(json!({"name": "root"})).unwrap();
        assert!(root.is_empty());

        let hcl = Policy::decode(json!({
            "name": "default",
            "rules": "path \"sys/*\" { policy = \"deny\" }"
        }))
        .unwrap();
        assert!(hcl.is_empty());

        let empty = Policy::decode(json!({"name": "x", "rules": ""})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_decode_requires_name() {
        assert!(Policy::decode(json!({"rules": "{}"})).is_err());
    }

    #[test]
    fn test_round_trip_through_document() {
        let mut policy = Policy::with_rules("foo", [("sys", "deny")]);
        policy.insert("secret/*", "write");

        let parsed = Policy::parse_document(&policy.document());
        assert_eq!(policy, parsed);
    }
}
