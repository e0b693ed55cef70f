// Copyright (c) 2025 - Cowboy AI, Inc.
//! Access Policy Documents
//!
//! Identity and resource policies in the provider's JSON document format.
//! Documents are built here and evaluated by the provider; [`PolicyStatement::allows`]
//! and [`string_like`] reproduce the matching rules so construction can be
//! checked without a provider round trip.
//!
//! # Wire Shape
//!
//! ```text
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [
//!     { "Effect": "Allow", "Action": [...], "Resource": [...],
//!       "Condition": { "StringEquals": { "<key>": ["<value>"] } } }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition block: operator → (context key → accepted values)
pub type Conditions = BTreeMap<ConditionOperator, BTreeMap<String, Vec<String>>>;

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Condition operators used by this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// Exact, case-sensitive match
    StringEquals,
    /// Case-sensitive match with `*` and `?` wildcards
    StringLike,
}

impl ConditionOperator {
    /// Evaluate the operator for one accepted value against the request value
    pub fn matches(&self, accepted: &str, actual: &str) -> bool {
        match self {
            Self::StringEquals => accepted == actual,
            Self::StringLike => string_like(accepted, actual),
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StringEquals => write!(f, "StringEquals"),
            Self::StringLike => write!(f, "StringLike"),
        }
    }
}

/// Principal allowed to assume a role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// Web identity federation through an identity provider
    Federated(String),
    /// Provider service principal such as `eks.amazonaws.com`
    Service(String),
}

/// Single policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub principal: Option<Principal>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub action: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resource: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub condition: Conditions,
}

impl PolicyStatement {
    /// Start an `Allow` statement
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            action: Vec::new(),
            resource: Vec::new(),
            condition: Conditions::new(),
        }
    }

    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn condition<I, S>(mut self, operator: ConditionOperator, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition
            .entry(operator)
            .or_default()
            .entry(key.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Check whether this statement grants `action` on `resource`
    ///
    /// Conditions are not considered; use [`PolicyStatement::conditions_hold`]
    /// for request-context checks.
    pub fn allows(&self, action: &str, resource: &str) -> bool {
        self.effect == Effect::Allow
            && self.action.iter().any(|a| string_like(a, action))
            && self.resource.iter().any(|r| string_like(r, resource))
    }

    /// Evaluate the condition block against request context values
    ///
    /// Every (operator, key) pair must be satisfied by at least one of its
    /// accepted values; a key missing from the context fails the condition.
    pub fn conditions_hold(&self, context: &BTreeMap<String, String>) -> bool {
        self.condition.iter().all(|(operator, keys)| {
            keys.iter().all(|(key, accepted)| {
                context
                    .get(key)
                    .is_some_and(|actual| accepted.iter().any(|a| operator.matches(a, actual)))
            })
        })
    }
}

/// Policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: Vec::new(),
        }
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statement.push(statement);
        self
    }

    /// Append a statement unless an identical one is already present
    pub fn add_statement(&mut self, statement: PolicyStatement) {
        if !self.statement.contains(&statement) {
            self.statement.push(statement);
        }
    }

    /// Check whether any statement grants `action` on `resource`
    pub fn allows(&self, action: &str, resource: &str) -> bool {
        self.statement.iter().any(|s| s.allows(action, resource))
    }

    pub fn is_empty(&self) -> bool {
        self.statement.is_empty()
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Wildcard match with `*` (any run, including empty) and `?` (one character)
pub fn string_like(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, v));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '?' || pattern[p] == value[v]) {
            p += 1;
            v += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            v = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("*", "", true)]
    #[test_case("*", "anything", true)]
    #[test_case("repo:o/r", "repo:o/r", true)]
    #[test_case("repo:o/r", "repo:o/r2", false)]
    #[test_case("repo:o/r/*", "repo:o/r/main", true)]
    #[test_case("repo:o/r/*", "repo:o/r/", true)]
    #[test_case("repo:o/r/*", "repo:o/r", false)]
    #[test_case("repo:o/r/*", "repo:o/rx/main", false)]
    #[test_case("eks:Describe*", "eks:DescribeCluster", true)]
    #[test_case("a?c", "abc", true)]
    #[test_case("a?c", "ac", false)]
    #[test_case("*b*", "aaabccc", true)]
    fn test_string_like(pattern: &str, value: &str, expected: bool) {
        assert_eq!(string_like(pattern, value), expected);
    }

    #[test]
    fn test_statement_serialization() {
        let statement = PolicyStatement::allow()
            .actions(["eks:DescribeCluster"])
            .resources(["arn:aws:eks:us-east-1:123456789012:cluster/demo"]);
        let doc = PolicyDocument::new().with_statement(statement);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["eks:DescribeCluster"],
                    "Resource": ["arn:aws:eks:us-east-1:123456789012:cluster/demo"]
                }]
            })
        );
    }

    #[test]
    fn test_trust_statement_serialization() {
        let statement = PolicyStatement::allow()
            .principal(Principal::Federated("arn:aws:iam::123456789012:oidc-provider/idp".into()))
            .actions(["sts:AssumeRoleWithWebIdentity"])
            .condition(ConditionOperator::StringEquals, "idp:aud", ["sts.amazonaws.com"]);

        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(
            json["Principal"],
            serde_json::json!({ "Federated": "arn:aws:iam::123456789012:oidc-provider/idp" })
        );
        assert_eq!(
            json["Condition"],
            serde_json::json!({ "StringEquals": { "idp:aud": ["sts.amazonaws.com"] } })
        );
    }

    #[test]
    fn test_allows_and_conditions() {
        let statement = PolicyStatement::allow()
            .actions(["ecr:Get*"])
            .resources(["arn:aws:ecr:*:123456789012:repository/app"])
            .condition(ConditionOperator::StringLike, "sub", ["repo:o/r/*", "repo:o/r"]);

        assert!(statement.allows("ecr:GetDownloadUrlForLayer", "arn:aws:ecr:us-east-1:123456789012:repository/app"));
        assert!(!statement.allows("ecr:PutImage", "arn:aws:ecr:us-east-1:123456789012:repository/app"));

        let mut context = BTreeMap::new();
        assert!(!statement.conditions_hold(&context));
        context.insert("sub".to_string(), "repo:o/r".to_string());
        assert!(statement.conditions_hold(&context));
        context.insert("sub".to_string(), "repo:o/other".to_string());
        assert!(!statement.conditions_hold(&context));
    }

    #[test]
    fn test_add_statement_deduplicates() {
        let mut doc = PolicyDocument::new();
        let statement = PolicyStatement::allow().actions(["s3:ListBucket"]).resources(["*"]);
        doc.add_statement(statement.clone());
        doc.add_statement(statement);
        assert_eq!(doc.statement.len(), 1);
    }
}
