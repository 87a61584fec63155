// Copyright (c) 2026 Task Orchestrator Team
// SPDX-License-Identifier: Apache-2.0

//! A deliberately tiny expression language used for workflow trigger
//! conditions and per-step guard conditions.
//!
//! Trigger conditions compare the two reserved identifiers `task_type` and
//! `scope` against string literals, combined with `&&` / `||`:
//!
//! ```text
//! task_type == "hotfix" || (task_type == "bugfix" && scope == "small")
//! ```
//!
//! Guard conditions additionally resolve variables and dotted step-output
//! paths (see [`crate::context::WorkflowContext::resolve`]) and compare them
//! against literals or the bare truthy/falsy value of a single identifier.
//!
//! This is not a general expression engine; unparseable input evaluates to
//! `false` with a warning rather than erroring the workflow.

use std::collections::HashMap;
use tracing::warn;

/// A resolver maps a bare identifier (variable name or dotted step-output
/// path) to its string representation, if any.
pub trait Resolver {
    fn resolve(&self, ident: &str) -> Option<String>;
}

/// Resolver used for trigger-condition evaluation: only `task_type` and
/// `scope` are recognized.
pub struct TriggerResolver<'a> {
    pub task_type: &'a str,
    pub scope: Option<&'a str>,
}

impl<'a> Resolver for TriggerResolver<'a> {
    fn resolve(&self, ident: &str) -> Option<String> {
        match ident {
            "task_type" => Some(self.task_type.to_string()),
            "scope" => self.scope.map(|s| s.to_string()),
            _ => None,
        }
    }
}

/// A simple map-backed resolver, used by guard-condition evaluation over
/// workflow variables.
pub struct MapResolver<'a>(pub &'a HashMap<String, String>);

impl<'a> Resolver for MapResolver<'a> {
    fn resolve(&self, ident: &str) -> Option<String> {
        self.0.get(ident).cloned()
    }
}

/// Evaluates a condition string against the given resolver.
///
/// Grammar (lowest to highest precedence): `||`, `&&`, parenthesized
/// sub-expressions, equality comparisons `ident == "literal"` or
/// `ident != "literal"`, and bare identifiers (truthy if resolved to a
/// non-empty, non-`"false"` value).
pub fn evaluate(expr: &str, resolver: &dyn Resolver) -> bool {
    match parse_or(expr.trim()) {
        Some((value, rest)) if rest.trim().is_empty() => eval_node(&value, resolver),
        _ => {
            warn!(expr = %expr, "could not parse condition expression, defaulting to false");
            false
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Or(Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Eq(String, String),
    Ne(String, String),
    Truthy(String),
    Literal(bool),
}

fn eval_node(node: &Node, resolver: &dyn Resolver) -> bool {
    match node {
        Node::Or(a, b) => eval_node(a, resolver) || eval_node(b, resolver),
        Node::And(a, b) => eval_node(a, resolver) && eval_node(b, resolver),
        Node::Eq(ident, lit) => resolver.resolve(ident).as_deref() == Some(lit.as_str()),
        Node::Ne(ident, lit) => resolver.resolve(ident).as_deref() != Some(lit.as_str()),
        Node::Truthy(ident) => match resolver.resolve(ident) {
            Some(v) => !v.is_empty() && v != "false" && v != "0",
            None => false,
        },
        Node::Literal(b) => *b,
    }
}

fn parse_or(input: &str) -> Option<(Node, &str)> {
    let (mut left, mut rest) = parse_and(input)?;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("||") {
            let (right, remainder) = parse_and(after)?;
            left = Node::Or(Box::new(left), Box::new(right));
            rest = remainder;
        } else {
            return Some((left, rest));
        }
    }
}

fn parse_and(input: &str) -> Option<(Node, &str)> {
    let (mut left, mut rest) = parse_atom(input)?;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("&&") {
            let (right, remainder) = parse_atom(after)?;
            left = Node::And(Box::new(left), Box::new(right));
            rest = remainder;
        } else {
            return Some((left, rest));
        }
    }
}

fn parse_atom(input: &str) -> Option<(Node, &str)> {
    let trimmed = input.trim_start();
    if let Some(after) = trimmed.strip_prefix('(') {
        let (node, rest) = parse_or(after)?;
        let rest = rest.trim_start();
        let rest = rest.strip_prefix(')')?;
        return Some((node, rest));
    }

    if let Some(lit) = trimmed.strip_prefix("true") {
        if is_boundary(lit) {
            return Some((Node::Literal(true), lit));
        }
    }
    if let Some(lit) = trimmed.strip_prefix("false") {
        if is_boundary(lit) {
            return Some((Node::Literal(false), lit));
        }
    }

    let ident_len = trimmed
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(trimmed.len());
    if ident_len == 0 {
        return None;
    }
    let ident = &trimmed[..ident_len];
    let after_ident = &trimmed[ident_len..];
    let after_trim = after_ident.trim_start();

    if let Some(after) = after_trim.strip_prefix("==") {
        let (lit, rest) = parse_string_literal(after)?;
        return Some((Node::Eq(ident.to_string(), lit), rest));
    }
    if let Some(after) = after_trim.strip_prefix("!=") {
        let (lit, rest) = parse_string_literal(after)?;
        return Some((Node::Ne(ident.to_string(), lit), rest));
    }

    Some((Node::Truthy(ident.to_string()), after_ident))
}

fn is_boundary(rest: &str) -> bool {
    !rest
        .chars()
        .next()
        .map(|c| c.is_alphanumeric() || c == '_')
        .unwrap_or(false)
}

fn parse_string_literal(input: &str) -> Option<(String, &str)> {
    let trimmed = input.trim_start();
    let quote = trimmed.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let body = &trimmed[1..];
    let end = body.find(quote)?;
    Some((body[..end].to_string(), &body[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_equality() {
        let r = TriggerResolver { task_type: "hotfix", scope: None };
        assert!(evaluate(r#"task_type == "hotfix""#, &r));
        assert!(!evaluate(r#"task_type == "feature""#, &r));
    }

    #[test]
    fn or_and_combinations() {
        let r = TriggerResolver { task_type: "bugfix", scope: Some("small") };
        assert!(evaluate(
            r#"task_type == "hotfix" || (task_type == "bugfix" && scope == "small")"#,
            &r
        ));
        assert!(!evaluate(
            r#"task_type == "hotfix" || (task_type == "bugfix" && scope == "large")"#,
            &r
        ));
    }

    #[test]
    fn unparseable_defaults_false() {
        let r = TriggerResolver { task_type: "hotfix", scope: None };
        assert!(!evaluate("task_type ===", &r));
    }

    #[test]
    fn variable_resolution_for_guards() {
        let mut vars = HashMap::new();
        vars.insert("ready".to_string(), "true".to_string());
        let resolver = MapResolver(&vars);
        assert!(evaluate("ready", &resolver));
        assert!(evaluate(r#"ready == "true""#, &resolver));
    }
}
