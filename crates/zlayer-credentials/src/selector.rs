//! Label selector expressions
//!
//! Compiles a human readable selector such as
//! `env in (prod, staging), tier=backend, !legacy` into a [`LabelSelector`]
//! that can be rendered back into the remote store's query syntax and
//! evaluated locally against a label map.
//!
//! ## Grammar
//!
//! Comma separated clauses (commas inside `(...)` do not split), each one of:
//!
//! - `key` - label exists
//! - `!key` - label does not exist
//! - `key = value` (or `==`) - label equals value
//! - `key != value` - label absent or not equal to value
//! - `key in (v1, v2)` - label value is one of the set
//! - `key notin (v1, v2)` - label absent or value not in the set

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::SelectorError;

/// Set-based operator of a [`Requirement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    /// The key must be present
    Exists,
    /// The key must be absent
    DoesNotExist,
    /// The key must be present with one of the values
    In,
    /// The key must be absent or carry a value outside the set
    NotIn,
}

/// A single set-based clause
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    /// Label key
    pub key: String,
    /// Operator applied to the key
    pub operator: Operator,
    /// Values for `In`/`NotIn`, empty otherwise
    pub values: BTreeSet<String>,
}

impl Requirement {
    /// Label must exist
    #[must_use]
    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: Operator::Exists,
            values: BTreeSet::new(),
        }
    }

    /// Label must not exist
    #[must_use]
    pub fn does_not_exist(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: Operator::DoesNotExist,
            values: BTreeSet::new(),
        }
    }

    /// Label value must be one of `values`
    #[must_use]
    pub fn is_in<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            operator: Operator::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Label must be absent or its value outside `values`
    #[must_use]
    pub fn not_in<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            operator: Operator::NotIn,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate this clause against a label map
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &BTreeSet<String>| {
            values.iter().map(String::as_str).collect::<Vec<_>>().join(",")
        };
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::In => write!(f, "{} in ({})", self.key, join(&self.values)),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, join(&self.values)),
        }
    }
}

/// A compiled, immutable conjunction of label clauses
///
/// Equality comparison is structural: two selectors compiled from the same
/// clauses in a different order compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
    requirements: BTreeSet<Requirement>,
}

impl LabelSelector {
    /// The always-true selector
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Compile a selector expression
    ///
    /// An empty or whitespace-only expression yields [`LabelSelector::everything`].
    ///
    /// # Errors
    ///
    /// Returns a [`SelectorError`] naming the first clause that cannot be parsed.
    pub fn parse(expression: &str) -> Result<Self, SelectorError> {
        let mut selector = Self::default();
        if expression.trim().is_empty() {
            return Ok(selector);
        }

        for clause in split_clauses(expression)? {
            selector.add_clause(clause)?;
        }

        Ok(selector)
    }

    /// Add a plain `key=value` match
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_equality(key.into(), value.into());
        self
    }

    /// Add a set-based requirement
    #[must_use]
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.insert(requirement);
        self
    }

    /// Plain equality matches
    #[must_use]
    pub fn match_labels(&self) -> &BTreeMap<String, String> {
        &self.match_labels
    }

    /// Set-based requirements
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    /// Total number of clauses
    #[must_use]
    pub fn len(&self) -> usize {
        self.match_labels.len() + self.requirements.len()
    }

    /// Whether this selector matches everything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate the selector against a label map
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Render in the remote store's query syntax
    #[must_use]
    pub fn to_query_string(&self) -> String {
        self.to_string()
    }

    fn insert_equality(&mut self, key: String, value: String) {
        match self.match_labels.get(&key) {
            // A second, conflicting equality on the same key can never match;
            // keep it as a set clause so the conjunction is preserved.
            Some(existing) if *existing != value => {
                self.requirements.insert(Requirement::is_in(key, [value]));
            }
            _ => {
                self.match_labels.insert(key, value);
            }
        }
    }

    fn add_clause(&mut self, clause: &str) -> Result<(), SelectorError> {
        let normalized = normalize_operator(clause);
        let tokens = tokenize(clause, &normalized)?;

        match tokens.as_slice() {
            [single] => {
                if let Some(key) = single.strip_prefix('!') {
                    validate_key(clause, key)?;
                    self.requirements.insert(Requirement::does_not_exist(key));
                } else {
                    validate_key(clause, single)?;
                    self.requirements.insert(Requirement::exists(*single));
                }
            }
            [key, operator, value] => {
                validate_key(clause, key)?;
                match *operator {
                    "=" | "==" => {
                        let value = scalar_value(clause, value)?;
                        self.insert_equality((*key).to_string(), value.to_string());
                    }
                    "!=" => {
                        let value = scalar_value(clause, value)?;
                        self.requirements.insert(Requirement::not_in(*key, [value]));
                    }
                    "in" => {
                        let values = value_set(clause, value)?;
                        self.requirements.insert(Requirement::is_in(*key, values));
                    }
                    "notin" => {
                        let values = value_set(clause, value)?;
                        self.requirements.insert(Requirement::not_in(*key, values));
                    }
                    other => {
                        return Err(SelectorError::UnknownOperator {
                            clause: clause.trim().to_string(),
                            operator: other.to_string(),
                        });
                    }
                }
            }
            _ => {
                return Err(SelectorError::TokenCount {
                    clause: clause.trim().to_string(),
                    tokens: tokens.len(),
                });
            }
        }

        Ok(())
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses = self
            .match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .chain(self.requirements.iter().map(ToString::to_string))
            .collect::<Vec<_>>();
        f.write_str(&clauses.join(","))
    }
}

/// Split on commas that are not inside parentheses
fn split_clauses(expression: &str) -> Result<Vec<&str>, SelectorError> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in expression.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    SelectorError::malformed(expression.trim(), "unbalanced ')'")
                })?;
            }
            ',' if depth == 0 => {
                clauses.push(&expression[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(SelectorError::malformed(expression.trim(), "unclosed '('"));
    }
    clauses.push(&expression[start..]);

    for clause in &clauses {
        if clause.trim().is_empty() {
            return Err(SelectorError::malformed(expression.trim(), "empty clause"));
        }
    }

    Ok(clauses)
}

/// Pad the first `!=`, `==` or `=` with spaces so it becomes its own token
fn normalize_operator(clause: &str) -> String {
    for op in ["!=", "==", "="] {
        if let Some(pos) = clause.find(op) {
            return format!(
                "{} {} {}",
                &clause[..pos],
                op,
                &clause[pos + op.len()..]
            );
        }
    }
    clause.to_string()
}

/// Whitespace tokenization that keeps a parenthesized group as one token
fn tokenize<'a>(clause: &str, normalized: &'a str) -> Result<Vec<&'a str>, SelectorError> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_group = false;

    for (idx, ch) in normalized.char_indices() {
        if in_group {
            if ch == ')' {
                if let Some(s) = start.take() {
                    tokens.push(&normalized[s..=idx]);
                }
                in_group = false;
            }
            continue;
        }

        if ch == '(' {
            if let Some(s) = start.take() {
                tokens.push(&normalized[s..idx]);
            }
            start = Some(idx);
            in_group = true;
        } else if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(&normalized[s..idx]);
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }

    if in_group {
        return Err(SelectorError::malformed(clause.trim(), "unclosed '('"));
    }
    if let Some(s) = start {
        tokens.push(&normalized[s..]);
    }

    Ok(tokens)
}

fn validate_key(clause: &str, key: &str) -> Result<(), SelectorError> {
    if key.is_empty() {
        return Err(SelectorError::malformed(clause.trim(), "empty label key"));
    }
    if key.contains(['(', ')', '!', '=']) {
        return Err(SelectorError::malformed(
            clause.trim(),
            format!("invalid label key '{key}'"),
        ));
    }
    Ok(())
}

fn scalar_value<'a>(clause: &str, value: &'a str) -> Result<&'a str, SelectorError> {
    if value.starts_with('(') || value.contains(['=', '!']) {
        return Err(SelectorError::malformed(
            clause.trim(),
            format!("invalid label value '{value}'"),
        ));
    }
    Ok(value)
}

fn value_set<'a>(clause: &str, group: &'a str) -> Result<Vec<&'a str>, SelectorError> {
    let inner = group
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .ok_or_else(|| {
            SelectorError::malformed(clause.trim(), "set operators require a '(...)' value list")
        })?;

    let values: Vec<&str> = inner.split(',').map(str::trim).collect();
    if values.iter().any(|v| v.is_empty()) {
        return Err(SelectorError::malformed(
            clause.trim(),
            "value list contains an empty value",
        ));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_empty_expression_is_everything() {
        assert_eq!(LabelSelector::parse("").unwrap(), LabelSelector::everything());
        assert_eq!(
            LabelSelector::parse("   ").unwrap(),
            LabelSelector::everything()
        );
        assert!(LabelSelector::parse("\t ").unwrap().is_empty());
    }

    #[test]
    fn test_all_five_clause_shapes() {
        let selector = LabelSelector::parse("color=blue,env in (a,b),!foo,bar,x!=y").unwrap();

        assert_eq!(selector.len(), 5);
        assert_eq!(selector.match_labels().get("color").unwrap(), "blue");

        let reqs: Vec<&Requirement> = selector.requirements().collect();
        assert_eq!(reqs.len(), 4);
        assert!(reqs.contains(&&Requirement::is_in("env", ["a", "b"])));
        assert!(reqs.contains(&&Requirement::does_not_exist("foo")));
        assert!(reqs.contains(&&Requirement::exists("bar")));
        assert!(reqs.contains(&&Requirement::not_in("x", ["y"])));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let compact = LabelSelector::parse("tier=backend,env notin (dev,test)").unwrap();
        let spaced =
            LabelSelector::parse("  tier = backend ,  env   notin ( dev , test )  ").unwrap();
        assert_eq!(compact, spaced);
    }

    #[test]
    fn test_clause_order_does_not_matter() {
        let a = LabelSelector::parse("a=1,b,!c,d in (x,y)").unwrap();
        let b = LabelSelector::parse("d in (y,x),!c,b,a=1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let expr = "team in (infra, platform), !deprecated, owner==ops";
        assert_eq!(
            LabelSelector::parse(expr).unwrap(),
            LabelSelector::parse(expr).unwrap()
        );
    }

    #[test]
    fn test_incomplete_clause_is_rejected() {
        let err = LabelSelector::parse("partition  in").unwrap_err();
        assert_eq!(
            err,
            SelectorError::TokenCount {
                clause: "partition  in".to_string(),
                tokens: 2,
            }
        );
    }

    #[test]
    fn test_too_many_tokens_is_rejected() {
        let err = LabelSelector::parse("a b c d").unwrap_err();
        assert!(matches!(err, SelectorError::TokenCount { tokens: 4, .. }));
    }

    #[test]
    fn test_unknown_operator() {
        let err = LabelSelector::parse("env like (a)").unwrap_err();
        assert!(matches!(err, SelectorError::UnknownOperator { ref operator, .. } if operator == "like"));
    }

    #[test]
    fn test_malformed_clauses() {
        assert!(LabelSelector::parse("env in (a,b").is_err());
        assert!(LabelSelector::parse("env in a").is_err());
        assert!(LabelSelector::parse("env in (a,,b)").is_err());
        assert!(LabelSelector::parse("a,,b").is_err());
        assert!(LabelSelector::parse("a,").is_err());
        assert!(LabelSelector::parse("!").is_err());
        assert!(LabelSelector::parse("=value").is_err());
        assert!(LabelSelector::parse("key=").is_err());
    }

    #[test]
    fn test_set_without_space_before_paren() {
        let selector = LabelSelector::parse("env in(a,b)").unwrap();
        assert!(selector
            .requirements()
            .any(|r| *r == Requirement::is_in("env", ["a", "b"])));
    }

    #[test]
    fn test_matches() {
        let selector = LabelSelector::parse("color=blue,env in (a,b),!foo,bar,x!=y").unwrap();

        let good = labels(&[("color", "blue"), ("env", "a"), ("bar", "1")]);
        assert!(selector.matches(&good));

        let with_x = labels(&[("color", "blue"), ("env", "b"), ("bar", ""), ("x", "z")]);
        assert!(selector.matches(&with_x));

        let wrong_x = labels(&[("color", "blue"), ("env", "a"), ("bar", "1"), ("x", "y")]);
        assert!(!selector.matches(&wrong_x));

        let has_foo = labels(&[("color", "blue"), ("env", "a"), ("bar", "1"), ("foo", "1")]);
        assert!(!selector.matches(&has_foo));

        let wrong_env = labels(&[("color", "blue"), ("env", "c"), ("bar", "1")]);
        assert!(!selector.matches(&wrong_env));
    }

    #[test]
    fn test_conflicting_equalities_never_match() {
        let selector = LabelSelector::parse("a=1,a=2").unwrap();
        assert_eq!(selector.len(), 2);
        assert!(!selector.matches(&labels(&[("a", "1")])));
        assert!(!selector.matches(&labels(&[("a", "2")])));
    }

    #[test]
    fn test_query_string_round_trip() {
        let selector = LabelSelector::parse("color=blue, env in (b, a), !foo, bar, x != y")
            .unwrap()
            .with_requirement(Requirement::exists("zlayer.io/credentials-type"));

        let rendered = selector.to_query_string();
        assert_eq!(LabelSelector::parse(&rendered).unwrap(), selector);
    }

    #[test]
    fn test_from_str() {
        let selector: LabelSelector = "app=web".parse().unwrap();
        assert_eq!(selector, LabelSelector::everything().with_label("app", "web"));
    }
}
