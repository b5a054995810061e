// SPDX-License-Identifier: MIT

//! Predicate evaluation against a tool call's arguments

use super::ast::{CompareOp, Expression, Literal};
use serde_json::Value;

/// Evaluate a predicate against a JSON arguments object
pub fn evaluate(expr: &Expression, args: &Value) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { path, op, value } => evaluate_compare(lookup(args, path), *op, value),
        Expression::And(left, right) => evaluate(left, args) && evaluate(right, args),
        Expression::Or(left, right) => evaluate(left, args) || evaluate(right, args),
        Expression::Not(inner) => !evaluate(inner, args),
    }
}

/// Resolve a dotted path (`source.kind`, `items.0`) inside `args`
fn lookup<'a>(args: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(args, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(segment),
    })
}

fn evaluate_compare(left: Option<&Value>, op: CompareOp, right: &Literal) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Gt => compare_numbers(left, right, |a, b| a > b),
        CompareOp::Gte => compare_numbers(left, right, |a, b| a >= b),
        CompareOp::Lt => compare_numbers(left, right, |a, b| a < b),
        CompareOp::Lte => compare_numbers(left, right, |a, b| a <= b),
        CompareOp::Contains => check_contains(left, right),
    }
}

fn literal_matches(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::Null, Literal::Null) => true,
        (Value::String(s), Literal::String(rs)) => s == rs,
        (Value::Number(n), Literal::Number(rn)) => n
            .as_f64()
            .map(|f| (f - rn).abs() < f64::EPSILON)
            .unwrap_or(false),
        (Value::Bool(b), Literal::Boolean(rb)) => b == rb,
        _ => false,
    }
}

fn values_equal(left: Option<&Value>, right: &Literal) -> bool {
    match left {
        // A missing argument compares equal to null
        None => matches!(right, Literal::Null),
        Some(value) => literal_matches(value, right),
    }
}

fn compare_numbers<F>(left: Option<&Value>, right: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (left.and_then(Value::as_f64), right) {
        (Some(f), Literal::Number(rn)) => cmp(f, *rn),
        _ => false,
    }
}

fn check_contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(substr)) => s.contains(substr.as_str()),
        (Some(Value::Array(items)), literal) => items.iter().any(|v| literal_matches(v, literal)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::condition::parse;
    use serde_json::json;

    fn check(predicate: &str, args: &Value) -> bool {
        evaluate(&parse(predicate).unwrap(), args)
    }

    #[test]
    fn test_string_equality() {
        let args = json!({"intent": "search"});
        assert!(check("intent == 'search'", &args));
        assert!(!check("intent == 'code'", &args));
        assert!(check("intent != 'code'", &args));
    }

    #[test]
    fn test_number_comparison() {
        let args = json!({"score": 7.5});
        assert!(check("score > 5", &args));
        assert!(!check("score > 10", &args));
        assert!(check("score >= 7.5", &args));
        assert!(check("score <= 7.5", &args));
        assert!(!check("score < 7", &args));
    }

    #[test]
    fn test_missing_argument_is_null() {
        let args = json!({});
        assert!(check("missing == null", &args));
        assert!(!check("missing == 'value'", &args));
        assert!(!check("missing > 1", &args));
    }

    #[test]
    fn test_contains() {
        let args = json!({
            "message": "hello world",
            "tags": ["bug", "urgent"],
            "ids": [1, 2, 3]
        });
        assert!(check("message contains 'world'", &args));
        assert!(check("tags contains 'urgent'", &args));
        assert!(!check("tags contains 'frontend'", &args));
        assert!(check("ids contains 2", &args));
    }

    #[test]
    fn test_nested_path_and_array_index() {
        let args = json!({"sources": [{"kind": "paper"}], "meta": {"draft": false}});
        assert!(check("sources.0.kind == 'paper'", &args));
        assert!(check("meta.draft == false", &args));
        assert!(!check("sources.1.kind == 'paper'", &args));
    }

    #[test]
    fn test_logical_operators() {
        let args = json!({"type": "feature", "priority": 5, "draft": true});
        assert!(check("type == 'bug' or priority > 3", &args));
        assert!(!check("type == 'bug' and priority > 3", &args));
        assert!(check("not draft == false", &args));
    }

    #[test]
    fn test_non_object_arguments() {
        assert!(!check("query == 'x'", &json!("just a string")));
        assert!(check("true", &Value::Null));
    }
}
