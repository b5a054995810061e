// SPDX-License-Identifier: MIT

//! Predicate expression parser
//!
//! Precedence from loosest to tightest: `or`, `and`, `not`, comparison.
//! Parentheses group.

use super::ast::{CompareOp, Expression, Literal};
use crate::adk::error::ConditionError;

/// Parse a predicate string into an AST
pub fn parse(input: &str) -> Result<Expression, ConditionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ConditionError::InvalidCondition(input.to_string()));
    }

    if let Some(pos) = find_top_level(input, " or ") {
        let left = parse(&input[..pos])?;
        let right = parse(&input[pos + " or ".len()..])?;
        return Ok(Expression::Or(Box::new(left), Box::new(right)));
    }

    if let Some(pos) = find_top_level(input, " and ") {
        let left = parse(&input[..pos])?;
        let right = parse(&input[pos + " and ".len()..])?;
        return Ok(Expression::And(Box::new(left), Box::new(right)));
    }

    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse(rest)?)));
    }

    if is_wrapped_in_parens(input) {
        return parse(&input[1..input.len() - 1]);
    }

    match input {
        "true" => Ok(Expression::True),
        "false" => Ok(Expression::False),
        _ => parse_comparison(input),
    }
}

fn parse_comparison(input: &str) -> Result<Expression, ConditionError> {
    // Longer operators first so `>=` is not read as `>`
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (op_str, op) in operators {
        if let Some(pos) = find_top_level(input, op_str) {
            let path = input[..pos].trim();
            if path.is_empty() || path.contains(char::is_whitespace) {
                return Err(ConditionError::InvalidCondition(input.to_string()));
            }
            let value = parse_literal(&input[pos + op_str.len()..])?;
            return Ok(Expression::Compare {
                path: path.to_string(),
                op,
                value,
            });
        }
    }

    Err(ConditionError::InvalidCondition(input.to_string()))
}

/// Byte offset of `pattern` outside quotes and parentheses
fn find_top_level(input: &str, pattern: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth == 0 && input[i..].starts_with(pattern) => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// True when the first `(` closes at the last character
fn is_wrapped_in_parens(input: &str) -> bool {
    if !(input.starts_with('(') && input.ends_with(')')) {
        return false;
    }
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let last = input.len() - 1;
    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i != last {
                        return false;
                    }
                }
                _ => {}
            },
        }
    }
    depth == 0
}

fn parse_literal(input: &str) -> Result<Literal, ConditionError> {
    let input = input.trim();

    match input {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Boolean(true)),
        "false" => return Ok(Literal::Boolean(false)),
        _ => {}
    }

    for q in ['\'', '"'] {
        if input.len() >= 2 && input.starts_with(q) && input.ends_with(q) {
            return Ok(Literal::String(input[1..input.len() - 1].to_string()));
        }
    }

    input
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| ConditionError::InvalidLiteral(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(path: &str, op: CompareOp, value: Literal) -> Expression {
        Expression::Compare {
            path: path.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_parse_simple_equality() {
        assert_eq!(
            parse("intent == 'search'").unwrap(),
            cmp("intent", CompareOp::Eq, Literal::String("search".to_string()))
        );
    }

    #[test]
    fn test_parse_numeric_operators() {
        assert_eq!(
            parse("score >= 5").unwrap(),
            cmp("score", CompareOp::Gte, Literal::Number(5.0))
        );
        assert_eq!(
            parse("priority < 3").unwrap(),
            cmp("priority", CompareOp::Lt, Literal::Number(3.0))
        );
        assert_eq!(
            parse("status != 'done'").unwrap(),
            cmp("status", CompareOp::NotEq, Literal::String("done".to_string()))
        );
    }

    #[test]
    fn test_parse_contains_and_null() {
        assert_eq!(
            parse("tags contains 'bug'").unwrap(),
            cmp("tags", CompareOp::Contains, Literal::String("bug".to_string()))
        );
        assert_eq!(
            parse("error == null").unwrap(),
            cmp("error", CompareOp::Eq, Literal::Null)
        );
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let expr = parse("a == 1 and b == 2 or c == 3").unwrap();
        match expr {
            Expression::Or(left, right) => {
                assert!(matches!(*left, Expression::And(_, _)));
                assert_eq!(*right, cmp("c", CompareOp::Eq, Literal::Number(3.0)));
            }
            other => panic!("Expected Or expression, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_and_parentheses() {
        let expr = parse("not (draft == true or pages < 2)").unwrap();
        match expr {
            Expression::Not(inner) => assert!(matches!(*inner, Expression::Or(_, _))),
            other => panic!("Expected Not expression, got {:?}", other),
        }
    }

    #[test]
    fn test_operators_inside_quotes_are_ignored() {
        assert_eq!(
            parse("title == 'x >= y and z'").unwrap(),
            cmp(
                "title",
                CompareOp::Eq,
                Literal::String("x >= y and z".to_string())
            )
        );
    }

    #[test]
    fn test_non_ascii_input() {
        assert_eq!(
            parse("city == 'Zürich'").unwrap(),
            cmp("city", CompareOp::Eq, Literal::String("Zürich".to_string()))
        );
    }

    #[test]
    fn test_parse_true_false() {
        assert_eq!(parse("true").unwrap(), Expression::True);
        assert_eq!(parse(" false ").unwrap(), Expression::False);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse("this is not valid").is_err());
        assert!(parse("").is_err());
        assert_eq!(
            parse("count > many"),
            Err(ConditionError::InvalidLiteral("many".to_string()))
        );
    }
}
